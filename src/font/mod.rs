//! Logical font identity, glyph rasterization, per-font glyph caches, and
//! the process-wide shared font pool.

mod cache;
mod pool;
pub mod raster;

pub(crate) use cache::char_code;
pub use cache::{Glyph, GlyphCache};
pub use pool::{FontHandle, FontPool};
pub use raster::{Bitmap, FontBackend, FontRasterizer, Rasterize, SystemFonts};

/// Style axes a logical font can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn new(bold: bool, italic: bool) -> Self {
        match (bold, italic) {
            (true, true) => Self::BoldItalic,
            (true, false) => Self::Bold,
            (false, true) => Self::Italic,
            (false, false) => Self::Regular,
        }
    }

    pub fn bold(self) -> bool {
        matches!(self, Self::Bold | Self::BoldItalic)
    }

    pub fn italic(self) -> bool {
        matches!(self, Self::Italic | Self::BoldItalic)
    }
}

/// Identity of a logical font: family, pixel height, and style.
///
/// Two descriptors compare equal exactly when all fields match — no fuzzy
/// family matching. Every overlay object whose descriptor matches shares one
/// glyph cache through the pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FontDesc {
    pub family: String,
    pub height: u32,
    pub style: FontStyle,
}

impl FontDesc {
    pub fn new(family: impl Into<String>, height: u32, bold: bool, italic: bool) -> Self {
        Self {
            family: family.into(),
            height,
            style: FontStyle::new(bold, italic),
        }
    }

    pub fn regular(family: impl Into<String>, height: u32) -> Self {
        Self {
            family: family.into(),
            height,
            style: FontStyle::Regular,
        }
    }

    /// The same identity at a different pixel height.
    pub fn with_height(&self, height: u32) -> Self {
        Self {
            family: self.family.clone(),
            height,
            style: self.style,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_from_flags() {
        assert_eq!(FontStyle::new(false, false), FontStyle::Regular);
        assert_eq!(FontStyle::new(true, false), FontStyle::Bold);
        assert_eq!(FontStyle::new(false, true), FontStyle::Italic);
        assert_eq!(FontStyle::new(true, true), FontStyle::BoldItalic);
        assert!(FontStyle::BoldItalic.bold());
        assert!(FontStyle::BoldItalic.italic());
        assert!(!FontStyle::Bold.italic());
    }

    #[test]
    fn identity_is_exact() {
        let a = FontDesc::new("Arial", 14, true, false);
        let b = FontDesc::new("Arial", 14, true, false);
        let c = FontDesc::new("Arial", 15, true, false);
        let d = FontDesc::new("arial", 14, true, false);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }
}
