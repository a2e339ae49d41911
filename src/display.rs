//! Panel side of a rotation: PNG decode into the framebuffer and full refresh
//!
//! Gallery images are pre-dithered to the six panel colors and stored as
//! indexed PNGs, so decoding yields palette indices that map straight onto
//! the 4-bit framebuffer.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;
use log::{debug, info};
use photoframe_core::FrameDisplay;
use thiserror::Error;

use crate::epd::{Color, Epd7in3e, EpdError, HEIGHT, WIDTH};
use crate::framebuffer::Framebuffer;

/// Size of the encoded image buffer
pub const PNG_BUF_SIZE: usize = 256 * 1024;
/// Size of the decode scratch buffer (800x480, room for RGBA)
pub const DECODE_BUF_SIZE: usize = WIDTH as usize * HEIGHT as usize * 4;

/// The frame hangs with the panel's origin at the bottom right
const ROTATE_180: bool = true;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("png: {0}")]
    Png(&'static str),
    #[error("image is {width}x{height}, panel is 800x480")]
    Dimensions { width: u32, height: u32 },
    #[error("panel SPI transfer failed")]
    Spi,
    #[error("panel stuck busy")]
    PanelTimeout,
}

/// Decode a PNG into the framebuffer
pub fn decode_png_to_framebuffer(
    png_data: &[u8],
    framebuffer: &mut Framebuffer,
    decode_buf: &mut [u8],
) -> Result<(), DisplayError> {
    let header = minipng::decode_png_header(png_data)
        .map_err(|_| DisplayError::Png("invalid PNG header"))?;

    debug!(
        "PNG: {}x{} {:?}",
        header.width(),
        header.height(),
        header.color_type()
    );

    if header.width() != WIDTH || header.height() != HEIGHT {
        return Err(DisplayError::Dimensions {
            width: header.width(),
            height: header.height(),
        });
    }
    if header.required_bytes() > decode_buf.len() {
        return Err(DisplayError::Png("decode buffer too small"));
    }

    let image = minipng::decode_png(png_data, decode_buf)
        .map_err(|_| DisplayError::Png("PNG decode failed"))?;

    let width = image.width() as usize;
    let pixels = image.pixels();

    for (y, row) in pixels.chunks_exact(width).enumerate() {
        framebuffer.write_row(y as u32, row, ROTATE_180);
    }

    Ok(())
}

/// The e-paper panel as a [`FrameDisplay`]
pub struct PanelDisplay<'a, SPI, BUSY, DC, RST, DELAY> {
    epd: &'a mut Epd7in3e<SPI, BUSY, DC, RST>,
    framebuffer: &'a mut Framebuffer,
    decode_buf: &'a mut [u8],
    delay: &'a mut DELAY,
}

impl<'a, SPI, BUSY, DC, RST, DELAY> PanelDisplay<'a, SPI, BUSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    pub fn new(
        epd: &'a mut Epd7in3e<SPI, BUSY, DC, RST>,
        framebuffer: &'a mut Framebuffer,
        decode_buf: &'a mut [u8],
        delay: &'a mut DELAY,
    ) -> Self {
        Self {
            epd,
            framebuffer,
            decode_buf,
            delay,
        }
    }
}

impl<SPI, BUSY, DC, RST, DELAY> FrameDisplay for PanelDisplay<'_, SPI, BUSY, DC, RST, DELAY>
where
    SPI: SpiDevice,
    BUSY: InputPin,
    DC: OutputPin,
    RST: OutputPin,
    DELAY: DelayNs,
{
    type Error = DisplayError;

    fn is_busy(&mut self) -> bool {
        self.epd.is_busy()
    }

    fn render(&mut self, image: &[u8]) -> Result<(), DisplayError> {
        self.framebuffer.clear(Color::White);
        decode_png_to_framebuffer(image, self.framebuffer, self.decode_buf)?;

        info!("Updating display (full refresh)...");
        self.epd
            .display(self.framebuffer.as_slice(), self.delay)
            .map_err(|e| match e {
                EpdError::Spi(_) => DisplayError::Spi,
                EpdError::BusyTimeout => DisplayError::PanelTimeout,
            })?;
        info!("Display updated");
        Ok(())
    }
}
