// DriveMonitor - Sensor Drivers
//
// The producer pulls samples through `SensorSource`; the board driver and the
// synthetic signal both implement it.

#[cfg(target_os = "espidf")]
pub mod imu;
pub mod mock;

use crate::error::Result;
use crate::events::Sample;

pub use mock::MockImu;

pub trait SensorSource: Send {
    /// One accelerometer reading in g-scaled units (Z ≈ 9.81 at rest).
    fn read(&mut self) -> Result<Sample>;
}
