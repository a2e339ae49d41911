//! Framebuffer for the 7.3" e-paper display
//!
//! The display is 800x480 pixels with 4 bits per pixel (6 colors).
//! Two pixels are packed per byte: high nibble = left pixel, low nibble = right pixel.
//!
//! The framebuffer is allocated from PSRAM to avoid exhausting internal SRAM.

extern crate alloc;

use alloc::boxed::Box;

use crate::epd::{BUFFER_SIZE, Color, HEIGHT, WIDTH};

const BYTES_PER_ROW: usize = WIDTH as usize / 2;

pub struct Framebuffer {
    buffer: Box<[u8; BUFFER_SIZE]>,
}

impl Framebuffer {
    /// Create a new framebuffer initialized to white.
    /// Call after the PSRAM heap is initialized.
    pub fn new() -> Self {
        let mut buffer = Box::new([0u8; BUFFER_SIZE]);
        buffer.fill(Color::White.to_dual_pixel());
        Self { buffer }
    }

    pub fn clear(&mut self, color: Color) {
        self.buffer.fill(color.to_dual_pixel());
    }

    /// Raw buffer for sending to the display
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer[..]
    }

    #[inline]
    pub fn set_pixel(&mut self, x: u32, y: u32, color: Color) {
        if x >= WIDTH || y >= HEIGHT {
            return;
        }

        let byte_idx = y as usize * BYTES_PER_ROW + x as usize / 2;
        let byte = &mut self.buffer[byte_idx];
        if x % 2 == 0 {
            *byte = (*byte & 0x0F) | (color.to_4bit() << 4);
        } else {
            *byte = (*byte & 0xF0) | color.to_4bit();
        }
    }

    /// Write one row of PNG palette indices starting at x = 0.
    ///
    /// With `rotate_180` the row lands mirrored on the opposite edge, for
    /// panels mounted upside down.
    pub fn write_row(&mut self, y: u32, pixels: &[u8], rotate_180: bool) {
        if y >= HEIGHT {
            return;
        }

        let width = pixels.len().min(WIDTH as usize);
        if !rotate_180 && width % 2 == 0 {
            // Fast path: pack pairs straight into the row
            let start = y as usize * BYTES_PER_ROW;
            for (i, pair) in pixels[..width].chunks_exact(2).enumerate() {
                let high = Color::from_palette_index(pair[0]).to_4bit();
                let low = Color::from_palette_index(pair[1]).to_4bit();
                self.buffer[start + i] = (high << 4) | low;
            }
            return;
        }

        for (x, &index) in pixels[..width].iter().enumerate() {
            let color = Color::from_palette_index(index);
            let x = x as u32;
            if rotate_180 {
                self.set_pixel(WIDTH - 1 - x, HEIGHT - 1 - y, color);
            } else {
                self.set_pixel(x, y, color);
            }
        }
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
