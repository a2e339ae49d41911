//! Driver for Good Display GDEP073E01 / Waveshare 7.3inch e-Paper HAT (E)
//! using E Ink Spectra 6 technology (6-color e-paper).
//!
//! Only the standard full-refresh waveform is used; a photo frame changes
//! the whole picture every time.

mod color;
mod command;

pub use color::Color;

use command::*;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin, PinState};
use embedded_hal::spi::SpiDevice;
use thiserror::Error;

/// Display width in pixels
pub const WIDTH: u32 = 800;
/// Display height in pixels
pub const HEIGHT: u32 = 480;
/// Buffer size: 4 bits per pixel, 2 pixels per byte
pub const BUFFER_SIZE: usize = (WIDTH as usize * HEIGHT as usize) / 2;

/// A full Spectra 6 refresh takes 15-20s; anything past this is a stuck panel
const BUSY_TIMEOUT_MS: u32 = 60_000;
const BUSY_POLL_MS: u32 = 10;

#[derive(Debug, Error)]
pub enum EpdError<E: core::fmt::Debug> {
    #[error("spi: {0:?}")]
    Spi(E),
    #[error("BUSY still asserted after 60s")]
    BusyTimeout,
}

/// Driver for the 7.3" Spectra 6 e-paper display
pub struct Epd7in3e<SPI, BUSY, DC, RST> {
    spi: SPI,
    busy: BUSY,
    dc: DC,
    rst: RST,
}

impl<SPI, BUSY, DC, RST> Epd7in3e<SPI, BUSY, DC, RST>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
{
    /// Reset the controller and power the panel on.
    pub fn new<DELAY: DelayNs>(
        spi: SPI,
        busy: BUSY,
        dc: DC,
        rst: RST,
        delay: &mut DELAY,
    ) -> Result<Self, EpdError<SPI::Error>> {
        let mut epd = Self { spi, busy, dc, rst };
        epd.power_up(delay)?;
        Ok(epd)
    }

    /// BUSY is active low on this controller; a pin read error counts as busy
    pub fn is_busy(&mut self) -> bool {
        self.busy.is_low().unwrap_or(true)
    }

    fn wait_ready<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        let mut waited = 0;
        while self.is_busy() {
            if waited >= BUSY_TIMEOUT_MS {
                return Err(EpdError::BusyTimeout);
            }
            delay.delay_ms(BUSY_POLL_MS);
            waited += BUSY_POLL_MS;
        }
        Ok(())
    }

    fn write(&mut self, register: u8, params: &[u8]) -> Result<(), EpdError<SPI::Error>> {
        let _ = self.dc.set_low();
        self.spi.write(&[register]).map_err(EpdError::Spi)?;
        if !params.is_empty() {
            let _ = self.dc.set_high();
            self.spi.write(params).map_err(EpdError::Spi)?;
        }
        Ok(())
    }

    /// Pulse reset, load the register table and switch the booster on
    fn power_up<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        for level in [true, false, true] {
            let _ = self.rst.set_state(PinState::from(level));
            delay.delay_ms(10);
        }

        for (register, params) in INIT_SEQUENCE {
            self.write(*register, params)?;
        }
        self.write(POWER_ON, &[])?;
        self.wait_ready(delay)
    }

    /// Push a packed 4bpp frame (`BUFFER_SIZE` bytes) and refresh.
    ///
    /// Blocks for the whole refresh and powers the panel off after.
    pub fn display<DELAY: DelayNs>(
        &mut self,
        frame: &[u8],
        delay: &mut DELAY,
    ) -> Result<(), EpdError<SPI::Error>> {
        self.write(DATA_START, frame)?;

        self.write(POWER_ON, &[])?;
        self.wait_ready(delay)?;
        self.write(BOOSTER_SOFT_START_2, &BOOSTER_2_PARAMS)?;
        self.write(DISPLAY_REFRESH, &[0x00])?;
        delay.delay_ms(1);
        self.wait_ready(delay)?;

        self.write(POWER_OFF, &[0x00])?;
        self.wait_ready(delay)
    }

    /// Power off and enter deep sleep; only a reset brings the panel back
    pub fn sleep<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.write(POWER_OFF, &[0x00])?;
        self.wait_ready(delay)?;
        self.write(DEEP_SLEEP, &[DEEP_SLEEP_CHECK])?;
        delay.delay_ms(100);
        Ok(())
    }

    pub fn wake_up<DELAY: DelayNs>(&mut self, delay: &mut DELAY) -> Result<(), EpdError<SPI::Error>> {
        self.power_up(delay)
    }
}
