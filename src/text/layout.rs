//! Markup-aware text layout: one walk shared by measurement and item
//! generation, so the two can never disagree about geometry.

use crate::color::Argb;
use crate::error::OverlayError;
use crate::font::{char_code, GlyphCache};
use crate::gpu::Device;

use super::markup::{self, Token};

const SPACE: u16 = 0x20;

/// Per-character draw record, produced transiently for one draw or measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutItem {
    /// 16-bit character code (glyph cache key).
    pub code: u16,
    /// Effective color after markup, alpha always the base color's.
    pub color: Argb,
    /// Quad width — the character's full cell width.
    pub width: f32,
    /// Quad height — the font's cell height.
    pub height: f32,
    /// Pen x relative to the string origin.
    pub x: f32,
    /// Pen y relative to the string origin.
    pub y: f32,
}

/// Walk a markup string once: advance the pen, track the running color, and
/// hand every character item (spaces included) to `emit`. Returns the
/// bounding extent.
fn walk(
    cache: &mut GlyphCache,
    dev: &mut dyn Device,
    markup_text: &str,
    base: Argb,
    mut emit: impl FnMut(LayoutItem),
) -> Result<(f32, f32), OverlayError> {
    // Row height comes from the space glyph; fetching it up front also
    // fails fast on an unusable font.
    let (_, row_height) = glyph_size(cache, dev, SPACE)?;

    let mut pen_x = 0.0f32;
    let mut pen_y = 0.0f32;
    let mut width = 0.0f32;
    let mut height = row_height;
    let mut color = base;

    for token in markup::tokenize(markup_text) {
        match token {
            Token::Color(Some(raw)) => {
                // The tag's color channels under the base color's alpha —
                // markup can never change opacity.
                color = base.with_rgb(raw);
            }
            Token::Color(None) => {}
            Token::Newline => {
                pen_x = 0.0;
                pen_y += row_height;
                height += row_height;
            }
            Token::Glyph(c) => {
                // Characters beyond the 16-bit cache range are skipped, not
                // fatal.
                let Ok(code) = char_code(c) else { continue };
                let (w, h) = glyph_size(cache, dev, code)?;
                emit(LayoutItem {
                    code,
                    color,
                    width: w,
                    height: h,
                    x: pen_x,
                    y: pen_y,
                });
                pen_x += w;
                if pen_x > width {
                    width = pen_x;
                }
            }
        }
    }

    Ok((width, height))
}

fn glyph_size(
    cache: &mut GlyphCache,
    dev: &mut dyn Device,
    code: u16,
) -> Result<(f32, f32), OverlayError> {
    cache.size(dev, code).map_err(|err| match err {
        OverlayError::RasterizationFailed { code, .. } => OverlayError::GlyphUnavailable { code },
        other => other,
    })
}

/// Bounding extent of a markup string: (max row width, rows × row height).
pub fn measure(
    cache: &mut GlyphCache,
    dev: &mut dyn Device,
    markup_text: &str,
) -> Result<(f32, f32), OverlayError> {
    walk(cache, dev, markup_text, Argb::WHITE, |_| {})
}

/// Produce the layout items for a markup string. Space items are included —
/// they advance the pen but are never drawn.
pub fn layout(
    cache: &mut GlyphCache,
    dev: &mut dyn Device,
    markup_text: &str,
    base: Argb,
) -> Result<Vec<LayoutItem>, OverlayError> {
    let mut items = Vec::with_capacity(markup_text.len());
    walk(cache, dev, markup_text, base, |item| items.push(item))?;
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::FontDesc;
    use crate::testutil::{block_cache, failing_cache, RecordingDevice, BLOCK_ADVANCE, BLOCK_HEIGHT};

    fn fixture() -> (RecordingDevice, GlyphCache) {
        (
            RecordingDevice::new(800, 600),
            block_cache(&FontDesc::regular("Test", 16)),
        )
    }

    #[test]
    fn measure_empty_string_is_one_row() {
        let (mut dev, mut cache) = fixture();
        let (w, h) = measure(&mut cache, &mut dev, "").expect("measure");
        assert_eq!(w, 0.0);
        assert_eq!(h, BLOCK_HEIGHT);
    }

    #[test]
    fn measure_counts_advances_and_rows() {
        let (mut dev, mut cache) = fixture();
        let (w, h) = measure(&mut cache, &mut dev, "abc").expect("measure");
        assert_eq!(w, 3.0 * BLOCK_ADVANCE);
        assert_eq!(h, BLOCK_HEIGHT);

        let (w, h) = measure(&mut cache, &mut dev, "ab\ncdef").expect("measure");
        assert_eq!(w, 4.0 * BLOCK_ADVANCE, "widest row wins");
        assert_eq!(h, 2.0 * BLOCK_HEIGHT);
    }

    #[test]
    fn measure_agrees_with_layout_bbox() {
        let (mut dev, mut cache) = fixture();
        for text in ["hello world", "a\nbb\nccc", "{FF0000}tag{00FF00}ged", "{ZZ}\n{}x"] {
            let (mw, mh) = measure(&mut cache, &mut dev, text).expect("measure");
            let items = layout(&mut cache, &mut dev, text, Argb::WHITE).expect("layout");
            let bw = items.iter().map(|i| i.x + i.width).fold(0.0f32, f32::max);
            let bh = items.iter().map(|i| i.y + i.height).fold(0.0f32, f32::max);
            assert_eq!(mw, bw, "width mismatch for {text:?}");
            assert_eq!(mh, bh, "height mismatch for {text:?}");
        }
    }

    #[test]
    fn newline_resets_x_and_advances_one_row() {
        let (mut dev, mut cache) = fixture();
        let items = layout(&mut cache, &mut dev, "AB\nCD", Argb::WHITE).expect("layout");
        assert_eq!(items.len(), 4);
        let c = &items[2];
        let d = &items[3];
        assert_eq!(c.x, 0.0, "C returns to the starting x");
        assert_eq!(c.y, BLOCK_HEIGHT, "C sits one space-height down");
        assert_eq!(d.x, BLOCK_ADVANCE);
        assert_eq!(d.y, BLOCK_HEIGHT);
    }

    #[test]
    fn color_tag_applies_base_alpha() {
        let (mut dev, mut cache) = fixture();
        let base = Argb::new(0xFF, 0, 0, 0);
        let items = layout(&mut cache, &mut dev, "{FF0000}A", base).expect("layout");
        assert_eq!(items.len(), 1, "tag consumed, only the glyph remains");
        assert_eq!(items[0].color.rgb(), 0x00FF_0000);
        assert_eq!(items[0].color.alpha(), 0xFF);
    }

    #[test]
    fn eight_digit_tag_cannot_override_alpha() {
        let (mut dev, mut cache) = fixture();
        let base = Argb::new(0xCC, 0xFF, 0xFF, 0xFF);
        let items = layout(&mut cache, &mut dev, "{11223344}A", base).expect("layout");
        assert_eq!(items[0].color, Argb(0xCC22_3344));
    }

    #[test]
    fn tag_color_persists_until_next_tag() {
        let (mut dev, mut cache) = fixture();
        let base = Argb::new(0xFF, 0xFF, 0xFF, 0xFF);
        let items =
            layout(&mut cache, &mut dev, "a{FF0000}bc{0000FF}d", base).expect("layout");
        assert_eq!(items[0].color, base);
        assert_eq!(items[1].color, Argb(0xFFFF_0000));
        assert_eq!(items[2].color, Argb(0xFFFF_0000));
        assert_eq!(items[3].color, Argb(0xFF00_00FF));
    }

    #[test]
    fn malformed_tag_emits_literal_characters() {
        let (mut dev, mut cache) = fixture();
        let items = layout(&mut cache, &mut dev, "{ZZ}", Argb::WHITE).expect("layout");
        let codes: Vec<u16> = items.iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![
                u16::from(b'{'),
                u16::from(b'Z'),
                u16::from(b'Z'),
                u16::from(b'}'),
            ]
        );
    }

    #[test]
    fn empty_tag_keeps_current_color() {
        let (mut dev, mut cache) = fixture();
        let base = Argb::new(0xFF, 0x10, 0x20, 0x30);
        let items = layout(&mut cache, &mut dev, "{FF0000}a{}b", base).expect("layout");
        assert_eq!(items[0].color, items[1].color, "empty tag changes nothing");
    }

    #[test]
    fn space_advances_but_is_emitted_for_callers_to_skip() {
        let (mut dev, mut cache) = fixture();
        let items = layout(&mut cache, &mut dev, "a b", Argb::WHITE).expect("layout");
        assert_eq!(items.len(), 3);
        assert_eq!(items[1].code, 0x20);
        assert_eq!(items[2].x, 2.0 * BLOCK_ADVANCE);
    }

    #[test]
    fn supplementary_plane_characters_are_skipped() {
        let (mut dev, mut cache) = fixture();
        let items = layout(&mut cache, &mut dev, "a\u{1F600}b", Argb::WHITE).expect("layout");
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].x, BLOCK_ADVANCE, "skipped character adds no advance");
    }

    #[test]
    fn failing_glyph_aborts_with_no_items() {
        let (mut dev, mut cache) = (
            RecordingDevice::new(800, 600),
            failing_cache(&FontDesc::regular("Test", 16), &['x']),
        );
        let err = layout(&mut cache, &mut dev, "ax", Argb::WHITE).unwrap_err();
        assert!(matches!(err, OverlayError::GlyphUnavailable { code } if code == u16::from(b'x')));
        let err = measure(&mut cache, &mut dev, "ax").unwrap_err();
        assert!(matches!(err, OverlayError::GlyphUnavailable { .. }));
    }
}
