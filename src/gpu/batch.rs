//! Bounded quad batching and draw submission for markup text.
//!
//! A `TextBatch` owns the per-object device resources: one dynamic vertex
//! buffer sized for a fixed maximum number of quads and the two render-state
//! snapshots that bracket every draw. Quads accumulate in source-string
//! order and are submitted one draw call per run of consecutive quads that
//! share a glyph texture.

use bitflags::bitflags;

use crate::color::Argb;
use crate::error::OverlayError;
use crate::font::GlyphCache;
use crate::text::layout;

use super::device::{BufferId, Device, Filter, StateBlockId, StateBlockKind, TextureId};
use super::quad::{QuadWriter, QUAD_STRIDE};

/// Vertex-buffer capacity in quads; reaching it flushes mid-string.
pub const MAX_BATCH_QUADS: usize = 300;

const SPACE: u16 = 0x20;

bitflags! {
    /// Per-call draw options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct DrawFlags: u32 {
        /// Sample glyph textures with linear filtering for this call.
        const FILTERED = 1 << 0;
        /// Apply inline `{RRGGBB}` markup colors. Without this the tags are
        /// still consumed but every glyph uses the call's base color.
        const COLOR_TABLE = 1 << 1;
    }
}

/// A quad scheduled for submission: geometry, color, and its glyph texture.
struct PendingQuad {
    texture: TextureId,
    x: f32,
    y: f32,
    w: f32,
    h: f32,
    color: Argb,
}

/// Device-dependent draw resources for one overlay text object.
#[derive(Debug, Default)]
pub struct TextBatch {
    vertex_buffer: Option<BufferId>,
    saved_state: Option<StateBlockId>,
    draw_state: Option<StateBlockId>,
    writer: QuadWriter,
    textures: Vec<TextureId>,
}

impl TextBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the size-dependent resources exist and draws may proceed.
    pub fn is_restored(&self) -> bool {
        self.vertex_buffer.is_some()
    }

    /// Create the vertex buffer and the two state snapshots. Idempotent.
    pub fn restore(&mut self, dev: &mut dyn Device) -> Result<(), OverlayError> {
        if self.is_restored() {
            return Ok(());
        }

        let buffer = dev.create_vertex_buffer((MAX_BATCH_QUADS * QUAD_STRIDE) as u64)?;
        let saved = match dev.create_state_block(StateBlockKind::HostSaved) {
            Ok(id) => id,
            Err(err) => {
                dev.destroy_buffer(buffer);
                return Err(err);
            }
        };
        let draw = match dev.create_state_block(StateBlockKind::OverlayDraw) {
            Ok(id) => id,
            Err(err) => {
                dev.destroy_state_block(saved);
                dev.destroy_buffer(buffer);
                return Err(err);
            }
        };

        self.vertex_buffer = Some(buffer);
        self.saved_state = Some(saved);
        self.draw_state = Some(draw);
        Ok(())
    }

    /// Release the vertex buffer and state snapshots. Safe in any state,
    /// including after a `restore` that never completed.
    pub fn invalidate(&mut self, dev: &mut dyn Device) {
        if let Some(id) = self.vertex_buffer.take() {
            dev.destroy_buffer(id);
        }
        if let Some(id) = self.saved_state.take() {
            dev.destroy_state_block(id);
        }
        if let Some(id) = self.draw_state.take() {
            dev.destroy_state_block(id);
        }
        self.writer.clear();
        self.textures.clear();
    }

    /// Lay out `markup` and submit its quads at `(x, y)` in device pixels.
    ///
    /// Nothing is submitted and no device state is touched unless every
    /// glyph the string needs is available.
    pub fn draw_text(
        &mut self,
        dev: &mut dyn Device,
        cache: &mut GlyphCache,
        x: f32,
        y: f32,
        base: Argb,
        markup: &str,
        flags: DrawFlags,
    ) -> Result<(), OverlayError> {
        let (Some(saved), Some(draw)) = (self.saved_state, self.draw_state) else {
            return Err(OverlayError::DeviceUnavailable);
        };

        // Resolve layout and every glyph texture before touching any device
        // state, so a failing glyph leaves the host untouched.
        let items = layout::layout(cache, dev, markup, base)?;
        let mut pending = Vec::with_capacity(items.len());
        for item in &items {
            if item.code == SPACE {
                continue;
            }
            let texture = cache.glyph(dev, item.code)?.texture;
            let color = if flags.contains(DrawFlags::COLOR_TABLE) {
                item.color
            } else {
                base
            };
            pending.push(PendingQuad {
                texture,
                x: x + item.x,
                y: y + item.y,
                w: item.width,
                h: item.height,
                color,
            });
        }

        dev.capture_state(saved);
        dev.apply_state(draw);
        if flags.contains(DrawFlags::FILTERED) {
            dev.set_filter(Filter::Linear);
        }

        for quad in &pending {
            self.writer.push_quad(quad.x, quad.y, quad.w, quad.h, quad.color);
            self.textures.push(quad.texture);
            if self.writer.quad_count() >= MAX_BATCH_QUADS {
                self.flush(dev);
            }
        }
        self.flush(dev);

        // Hand the host its state back, point sampling included.
        dev.apply_state(saved);
        Ok(())
    }

    /// Upload accumulated quads and issue one draw call per run of
    /// consecutive quads sharing a texture, in append order.
    fn flush(&mut self, dev: &mut dyn Device) {
        if self.writer.is_empty() {
            return;
        }
        let buffer = self
            .vertex_buffer
            .expect("flush only runs on a restored batch");
        dev.write_vertices(buffer, self.writer.as_bytes());

        let mut start = 0;
        while start < self.textures.len() {
            let texture = self.textures[start];
            let mut end = start + 1;
            while end < self.textures.len() && self.textures[end] == texture {
                end += 1;
            }
            dev.draw_quads(buffer, texture, start as u32, (end - start) as u32);
            start = end;
        }

        log::trace!("batch: flushed {} quads", self.textures.len());
        self.writer.clear();
        self.textures.clear();
    }
}
