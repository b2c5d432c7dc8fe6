//! Error taxonomy for the overlay core.
//!
//! Every failure is reported to the immediate caller; none is fatal and none
//! is retried automatically. Device loss is *not* an error — it is a state
//! transition driven by the host through `lifecycle::DeviceResource`.

use thiserror::Error;

/// Errors surfaced by font, layout, and draw operations.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// No usable font face could be resolved for a family at all.
    /// Surfaces at `bind_device` time, before any glyph work happens.
    #[error("no usable font face for family {family:?}")]
    FontUnavailable { family: String },

    /// The font facility cannot produce a glyph for this character —
    /// the face is broken or the character has no outline.
    #[error("failed to rasterize U+{code:04X} with font {family:?}")]
    RasterizationFailed { family: String, code: u16 },

    /// Character code outside the 16-bit range glyph caches can store.
    /// Layout skips such characters rather than aborting.
    #[error("character U+{0:X} outside the 16-bit glyph range")]
    UnsupportedCharacter(u32),

    /// Layout needed a glyph that failed to rasterize. The whole
    /// measure/layout/draw call aborts with no partial output.
    #[error("glyph for U+{code:04X} unavailable")]
    GlyphUnavailable { code: u16 },

    /// A draw or resource operation was attempted while no device is bound
    /// or while device-dependent resources are released mid-reset.
    #[error("graphics device not available")]
    DeviceUnavailable,
}
