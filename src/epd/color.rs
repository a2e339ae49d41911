//! Spectra 6 panel colors and the mapping from image palette indices

/// 6-color palette for Spectra 6 e-paper
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Color {
    Black = 0x00,
    #[default]
    White = 0x01,
    Yellow = 0x02,
    Red = 0x03,
    Blue = 0x05,
    Green = 0x06,
}

impl Color {
    /// Palette order of the pre-dithered gallery PNGs
    pub const PALETTE: [Color; 6] = [
        Color::Black,
        Color::White,
        Color::Red,
        Color::Yellow,
        Color::Blue,
        Color::Green,
    ];

    /// Map a PNG palette index; anything outside the palette becomes white
    #[inline]
    pub const fn from_palette_index(index: u8) -> Self {
        if (index as usize) < Self::PALETTE.len() {
            Self::PALETTE[index as usize]
        } else {
            Color::White
        }
    }

    /// Get the 4-bit color value
    #[inline]
    pub const fn to_4bit(self) -> u8 {
        self as u8
    }

    /// Get a byte with this color in both pixel positions (for fills)
    #[inline]
    pub const fn to_dual_pixel(self) -> u8 {
        let c = self as u8;
        (c << 4) | c
    }
}
