// DriveMonitor - MPU6050 Accelerometer Driver
//
// Register-level driver over the I2C master. Only the accelerometer is used:
// ±2 g range, readings scaled so that 1 g reads as GRAVITY_G.

use esp_idf_hal::i2c::I2cDriver;

use crate::config::*;
use crate::error::{MonitorError, Result};
use crate::events::Sample;

use super::SensorSource;

// MPU6050 register addresses
const REG_PWR_MGMT_1: u8 = 0x6B;
const REG_ACCEL_CONFIG: u8 = 0x1C;
const REG_ACCEL_XOUT_H: u8 = 0x3B; // Start of 6-byte accel burst
const REG_WHO_AM_I: u8 = 0x75;
const WHO_AM_I_EXPECTED: u8 = 0x68;

pub struct Mpu6050 {
    bus: I2cDriver<'static>,
}

impl Mpu6050 {
    pub fn new(bus: I2cDriver<'static>) -> Self {
        Self { bus }
    }

    /// Verify the device is reachable on the I2C bus.
    pub fn is_connected(&mut self) -> bool {
        let mut buf = [0u8; 1];
        match self.bus.write_read(I2C_ADDR_MPU6050, &[REG_WHO_AM_I], &mut buf, I2C_TIMEOUT_TICKS) {
            Ok(()) => buf[0] == WHO_AM_I_EXPECTED,
            Err(_) => false,
        }
    }

    /// Wake the sensor and select the ±2 g accelerometer range.
    pub fn init(&mut self) -> anyhow::Result<()> {
        // Wake up (clear SLEEP bit)
        self.bus.write(I2C_ADDR_MPU6050, &[REG_PWR_MGMT_1, 0x00], I2C_TIMEOUT_TICKS)?;
        std::thread::sleep(std::time::Duration::from_millis(10));

        // Accelerometer: ±2 g
        self.bus.write(I2C_ADDR_MPU6050, &[REG_ACCEL_CONFIG, 0x00], I2C_TIMEOUT_TICKS)?;

        log::info!("MPU6050 initialised (±2g)");
        Ok(())
    }
}

impl SensorSource for Mpu6050 {
    fn read(&mut self) -> Result<Sample> {
        let mut raw = [0u8; 6];
        self.bus
            .write_read(I2C_ADDR_MPU6050, &[REG_ACCEL_XOUT_H], &mut raw, I2C_TIMEOUT_TICKS)
            .map_err(|e| MonitorError::SensorRead(e.to_string()))?;

        let axis =
            |hi: u8, lo: u8| i16::from_be_bytes([hi, lo]) as f32 / ACCEL_SCALE_2G * GRAVITY_G;
        Ok(Sample::new(
            axis(raw[0], raw[1]),
            axis(raw[2], raw[3]),
            axis(raw[4], raw[5]),
        ))
    }
}
