//! AXP2101 power management IC
//!
//! The panel is powered from ALDO3/ALDO4, which must be on at 3.3V before the
//! EPD is initialized. The fuel gauge percentage is only logged.

use embedded_hal::i2c::I2c;
use log::info;
use thiserror::Error;

pub const AXP2101_ADDR: u8 = 0x34;

const LDO_ONOFF_CTRL0: u8 = 0x90; // ALDO enable bits
const LDO_VOL2_CTRL: u8 = 0x94; // ALDO3 voltage
const LDO_VOL3_CTRL: u8 = 0x95; // ALDO4 voltage
const BAT_PERCENT_REG: u8 = 0xA4; // Battery percentage (0-100)

/// (3300 - 500) / 100 = 28
const ALDO_3V3: u8 = 0x1C;

#[derive(Debug, Error)]
pub enum PmuError<E: core::fmt::Debug> {
    #[error("i2c: {0:?}")]
    I2c(E),
    #[error("fuel gauge reported {0}%")]
    BadPercent(u8),
}

pub struct Axp2101<I2C> {
    i2c: I2C,
}

impl<I2C: I2c> Axp2101<I2C> {
    pub fn new(i2c: I2C) -> Self {
        Self { i2c }
    }

    /// Turn on ALDO3/ALDO4 at 3.3V for the display
    pub fn enable_display_rails(&mut self) -> Result<(), PmuError<I2C::Error>> {
        self.i2c
            .write(AXP2101_ADDR, &[LDO_VOL2_CTRL, ALDO_3V3])
            .map_err(PmuError::I2c)?;
        self.i2c
            .write(AXP2101_ADDR, &[LDO_VOL3_CTRL, ALDO_3V3])
            .map_err(PmuError::I2c)?;
        // Enable ALDO1-4; the others are already on from the bootloader
        self.i2c
            .write(AXP2101_ADDR, &[LDO_ONOFF_CTRL0, 0x0F])
            .map_err(PmuError::I2c)?;

        info!("PMIC configured - ALDO3/ALDO4 enabled at 3.3V");
        Ok(())
    }

    pub fn battery_percent(&mut self) -> Result<u8, PmuError<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.i2c
            .write_read(AXP2101_ADDR, &[BAT_PERCENT_REG], &mut buf)
            .map_err(PmuError::I2c)?;

        match buf[0] {
            percent @ 0..=100 => Ok(percent),
            other => Err(PmuError::BadPercent(other)),
        }
    }
}
