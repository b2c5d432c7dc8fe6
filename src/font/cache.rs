//! Per-logical-font glyph cache: lazily rasterized, GPU-resident, memoized.

use std::collections::HashMap;

use crate::error::OverlayError;
use crate::gpu::{Device, TextureId};

use super::raster::Rasterize;
use super::FontDesc;

/// One cached character: its GPU texture and measured cell size.
#[derive(Debug, Clone, Copy)]
pub struct Glyph {
    pub texture: TextureId,
    pub width: f32,
    pub height: f32,
}

/// Glyph store for one logical font, shared by every object that resolved
/// the same [`FontDesc`] through the pool.
///
/// Entries are created at most once per character: a miss rasterizes and
/// uploads, a hit returns the stored entry untouched. Entries live until the
/// cache is torn down by a device-loss `invalidate` or final destruction.
pub struct GlyphCache {
    raster: Box<dyn Rasterize>,
    glyphs: HashMap<u16, Glyph>,
}

impl GlyphCache {
    pub(crate) fn new(raster: Box<dyn Rasterize>) -> Self {
        Self {
            raster,
            glyphs: HashMap::new(),
        }
    }

    pub fn desc(&self) -> &FontDesc {
        self.raster.desc()
    }

    /// Look up a character, rasterizing and uploading on first use.
    #[allow(clippy::map_entry, reason = "miss path needs &mut self for upload")]
    pub fn glyph(&mut self, dev: &mut dyn Device, code: u16) -> Result<&Glyph, OverlayError> {
        if !self.glyphs.contains_key(&code) {
            let bitmap = self.raster.rasterize(code)?;
            let texels = pack_texels(&bitmap.coverage);
            let texture = dev.create_glyph_texture(bitmap.width, bitmap.height, &texels)?;
            log::trace!(
                "cache: rasterized U+{code:04X} for {:?} ({}x{})",
                self.desc().family,
                bitmap.width,
                bitmap.height,
            );
            self.glyphs.insert(
                code,
                Glyph {
                    texture,
                    width: bitmap.width as f32,
                    height: bitmap.height as f32,
                },
            );
        }
        Ok(self.glyphs.get(&code).expect("glyph just inserted"))
    }

    /// Measured cell size of a character, populating the cache on first use.
    pub fn size(&mut self, dev: &mut dyn Device, code: u16) -> Result<(f32, f32), OverlayError> {
        let glyph = self.glyph(dev, code)?;
        Ok((glyph.width, glyph.height))
    }

    /// Number of distinct characters cached so far.
    pub fn len(&self) -> usize {
        self.glyphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Release every GPU texture and forget all entries. The cache refills
    /// lazily after the device comes back.
    pub(crate) fn invalidate(&mut self, dev: &mut dyn Device) {
        for glyph in self.glyphs.values() {
            dev.destroy_texture(glyph.texture);
        }
        self.glyphs.clear();
    }

    /// Final teardown when the pool drops the last reference.
    pub(crate) fn destroy(&mut self, dev: &mut dyn Device) {
        self.invalidate(dev);
    }
}

/// Convert 8-bit coverage to the packed 16bpp glyph texel format: 4-bit
/// alpha in the top nibble over white color bits, fully transparent when
/// coverage rounds to zero.
fn pack_texels(coverage: &[u8]) -> Vec<u16> {
    coverage
        .iter()
        .map(|&c| {
            let alpha = u16::from(c >> 4);
            if alpha > 0 {
                (alpha << 12) | 0x0fff
            } else {
                0x0000
            }
        })
        .collect()
}

/// Map a character to its 16-bit cache code. Characters beyond the
/// representable range are reported so callers can skip them.
pub(crate) fn char_code(ch: char) -> Result<u16, OverlayError> {
    u16::try_from(u32::from(ch)).map_err(|_| OverlayError::UnsupportedCharacter(u32::from(ch)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{block_cache, failing_cache, RecordingDevice};

    #[test]
    fn texel_packing_quantizes_to_four_bits() {
        let texels = pack_texels(&[0x00, 0x0F, 0x10, 0x80, 0xFF]);
        // 0x00 and 0x0F both round to zero alpha → transparent texel.
        assert_eq!(texels[0], 0x0000);
        assert_eq!(texels[1], 0x0000);
        // 0x10 → alpha nibble 1 over white.
        assert_eq!(texels[2], 0x1fff);
        assert_eq!(texels[3], 0x8fff);
        assert_eq!(texels[4], 0xffff);
    }

    #[test]
    fn glyph_is_rasterized_once_and_texture_is_stable() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut cache = block_cache(&FontDesc::regular("Test", 16));

        let first = *cache.glyph(&mut dev, u16::from(b'A')).expect("glyph");
        let uploads = dev.texture_uploads;
        let second = *cache.glyph(&mut dev, u16::from(b'A')).expect("glyph");

        assert_eq!(first.texture, second.texture);
        assert_eq!(dev.texture_uploads, uploads, "no re-rasterization on hit");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn size_populates_like_glyph() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut cache = block_cache(&FontDesc::regular("Test", 16));
        let (w, h) = cache.size(&mut dev, u16::from(b'M')).expect("size");
        assert!(w > 0.0 && h > 0.0);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn rasterizer_failure_creates_no_entry() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut cache = failing_cache(&FontDesc::regular("Test", 16), &['q']);
        let err = cache.glyph(&mut dev, u16::from(b'q')).unwrap_err();
        assert!(matches!(err, OverlayError::RasterizationFailed { .. }));
        assert!(cache.is_empty());
        assert_eq!(dev.live_textures(), 0);
    }

    #[test]
    fn invalidate_frees_textures_and_refills_lazily() {
        let mut dev = RecordingDevice::new(800, 600);
        let mut cache = block_cache(&FontDesc::regular("Test", 16));
        cache.glyph(&mut dev, u16::from(b'A')).expect("glyph");
        cache.glyph(&mut dev, u16::from(b'B')).expect("glyph");
        assert_eq!(dev.live_textures(), 2);

        cache.invalidate(&mut dev);
        assert_eq!(dev.live_textures(), 0);
        assert!(cache.is_empty());

        cache.glyph(&mut dev, u16::from(b'A')).expect("refill");
        assert_eq!(dev.live_textures(), 1);
    }

    #[test]
    fn char_code_range() {
        assert_eq!(char_code('A').expect("ascii"), 0x41);
        assert_eq!(char_code('\u{FFFD}').expect("bmp"), 0xFFFD);
        assert!(matches!(
            char_code('\u{1F600}'),
            Err(OverlayError::UnsupportedCharacter(0x1F600))
        ));
    }
}
