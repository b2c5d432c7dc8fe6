//! Packed ARGB color type shared by overlay objects, layout, and the GPU seam.

use serde::{Deserialize, Serialize};

/// A 32-bit color in `0xAARRGGBB` layout, matching the packing the host API
/// hands overlay objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Argb(pub u32);

impl Argb {
    pub const BLACK: Self = Self::new(0xFF, 0x00, 0x00, 0x00);
    pub const WHITE: Self = Self::new(0xFF, 0xFF, 0xFF, 0xFF);

    pub const fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Self((a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub const fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub const fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub const fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Low 24 bits — the RGB part without alpha.
    pub const fn rgb(self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Replace the color channels, keeping this color's alpha byte.
    /// This is how markup tags inherit the base color's opacity.
    pub const fn with_rgb(self, rgb: u32) -> Self {
        Self((self.0 & 0xFF00_0000) | (rgb & 0x00FF_FFFF))
    }

    /// Unpack to straight (non-premultiplied) RGBA floats for vertex data.
    pub fn to_f32_rgba(self) -> [f32; 4] {
        [
            f32::from(self.red()) / 255.0,
            f32::from(self.green()) / 255.0,
            f32::from(self.blue()) / 255.0,
            f32::from(self.alpha()) / 255.0,
        ]
    }
}

impl From<u32> for Argb {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}
