//! The trait boundary between the overlay and the host-owned graphics device.
//!
//! The overlay never owns the device. Everything it creates through this
//! trait — glyph textures, the dynamic vertex buffer, render-state
//! snapshots — is referred to by an opaque id and must be released through
//! the same trait before the host resets or destroys the device.

use crate::error::OverlayError;

/// Opaque handle to a GPU glyph texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Opaque handle to a dynamic vertex buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(pub u32);

/// Opaque handle to a captured render-state snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateBlockId(pub u32);

/// Texture sampling mode for glyph draws.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    /// Nearest-texel sampling. The overlay's default.
    #[default]
    Point,
    /// Bilinear sampling, selected per draw call via `DrawFlags::FILTERED`.
    Linear,
}

/// Which render-state snapshot a state block holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateBlockKind {
    /// Whatever the host pipeline was using. Captured at the start of every
    /// overlay draw and re-applied at the end so the host sees its state
    /// untouched.
    HostSaved,
    /// The overlay's required state: alpha blend on, alpha test on, solid
    /// fill, no fog, modulate texture by vertex color, point sampling.
    OverlayDraw,
}

/// Host graphics device, as much of it as the overlay needs.
///
/// All calls happen on the single thread that owns the device. Glyph texel
/// data arrives packed 16 bits per pixel: 4-bit alpha in the top nibble,
/// white color in the low 12 bits (`0x0fff`), zero for transparent texels.
pub trait Device {
    /// Current backbuffer size in pixels.
    fn viewport(&self) -> (u32, u32);

    /// Create an immutable glyph texture from packed 16bpp texels,
    /// row-major, `width * height` entries.
    fn create_glyph_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
    ) -> Result<TextureId, OverlayError>;

    fn destroy_texture(&mut self, id: TextureId);

    /// Create a write-only dynamic vertex buffer of `size` bytes.
    fn create_vertex_buffer(&mut self, size: u64) -> Result<BufferId, OverlayError>;

    fn destroy_buffer(&mut self, id: BufferId);

    /// Replace the buffer's contents for the next draws, discarding what any
    /// in-flight draws already consumed.
    fn write_vertices(&mut self, id: BufferId, bytes: &[u8]);

    /// Draw `quad_count` quads from the buffer with one texture, starting at
    /// quad index `first_quad`. Vertices are laid out four per quad in
    /// fan order (top-left, top-right, bottom-right, bottom-left).
    fn draw_quads(&mut self, buffer: BufferId, texture: TextureId, first_quad: u32, quad_count: u32);

    /// Record a new state block of the given kind.
    fn create_state_block(&mut self, kind: StateBlockKind) -> Result<StateBlockId, OverlayError>;

    fn destroy_state_block(&mut self, id: StateBlockId);

    /// Snapshot the device's *current* state into an existing block.
    fn capture_state(&mut self, id: StateBlockId);

    /// Apply a block's recorded state to the device.
    fn apply_state(&mut self, id: StateBlockId);

    /// Select the sampling mode for subsequent glyph draws.
    fn set_filter(&mut self, filter: Filter);
}
