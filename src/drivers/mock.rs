// DriveMonitor - Synthetic IMU
//
// Deterministic driving signal for host runs and tests: small sinusoidal
// lateral/forward motion on top of gravity, with a braking spike every
// `MOCK_BRAKE_EVENT_TICKS` readings.

use crate::config::GRAVITY_G;
use crate::error::Result;
use crate::events::Sample;

use super::SensorSource;

const LATERAL_AMPLITUDE: f32 = 0.1;
const FORWARD_AMPLITUDE: f32 = 0.2;
const GRAVITY_VARIATION: f32 = 0.05;
pub const MOCK_BRAKE_EVENT_TICKS: u32 = 500;
const BRAKE_FORCE: f32 = -2.0;

#[derive(Debug, Default)]
pub struct MockImu {
    tick: u32,
}

impl MockImu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tick(&self) -> u32 {
        self.tick
    }

    fn next(&mut self) -> Sample {
        self.tick = self.tick.wrapping_add(1);
        let t = self.tick as f32;

        let mut sample = Sample::new(
            LATERAL_AMPLITUDE * (t * 0.05).sin(),
            FORWARD_AMPLITUDE * (t * 0.02).sin(),
            GRAVITY_G + GRAVITY_VARIATION * (t * 0.1).sin(),
        );

        if self.tick % MOCK_BRAKE_EVENT_TICKS == 0 {
            sample.y = BRAKE_FORCE;
            log::info!("Mock brake event");
        }
        sample
    }
}

impl SensorSource for MockImu {
    fn read(&mut self) -> Result<Sample> {
        Ok(self.next())
    }
}
