//! Shared test doubles: a recording graphics device and a deterministic
//! procedural font backend, so every component test runs headless with no
//! GPU and no font files.

use std::collections::{HashMap, HashSet};

use crate::error::OverlayError;
use crate::font::{Bitmap, FontBackend, FontDesc, FontPool, GlyphCache, Rasterize};
use crate::gpu::{
    BufferId, Device, Filter, StateBlockId, StateBlockKind, TextureId, VERTEX_STRIDE,
};

/// Advance of every block glyph at the 16px test height.
pub(crate) const BLOCK_ADVANCE: f32 = 8.0;
/// Cell height of every block glyph at the 16px test height.
pub(crate) const BLOCK_HEIGHT: f32 = 16.0;

// Recording device

#[derive(Debug, Clone, Copy)]
pub(crate) struct DrawCall {
    pub buffer: BufferId,
    pub texture: TextureId,
    pub first_quad: u32,
    pub quad_count: u32,
}

/// Device double that hands out ids, tracks live resources, and records
/// every submission for assertions.
pub(crate) struct RecordingDevice {
    width: u32,
    height: u32,
    next_id: u32,
    textures: HashSet<u32>,
    buffers: HashSet<u32>,
    blocks: HashMap<u32, (StateBlockKind, Filter)>,
    /// Total glyph texture uploads ever performed (hits don't add).
    pub texture_uploads: usize,
    /// Byte payload of every vertex upload, in order.
    pub vertex_writes: Vec<Vec<u8>>,
    pub draw_calls: Vec<DrawCall>,
    /// Every filter selected via `set_filter`, in order.
    pub filters_seen: Vec<Filter>,
    /// The currently applied filter.
    pub filter: Filter,
    pub state_captures: Vec<StateBlockId>,
    pub state_applies: Vec<StateBlockId>,
    /// Releases of ids that were not live — must stay zero.
    pub double_frees: u32,
}

impl RecordingDevice {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            next_id: 1,
            textures: HashSet::new(),
            buffers: HashSet::new(),
            blocks: HashMap::new(),
            texture_uploads: 0,
            vertex_writes: Vec::new(),
            draw_calls: Vec::new(),
            filters_seen: Vec::new(),
            filter: Filter::Point,
            state_captures: Vec::new(),
            state_applies: Vec::new(),
            double_frees: 0,
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_state_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl Device for RecordingDevice {
    fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_glyph_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
    ) -> Result<TextureId, OverlayError> {
        assert_eq!(texels.len() as u32, width * height, "texel payload matches dimensions");
        let id = self.next();
        self.textures.insert(id);
        self.texture_uploads += 1;
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        if !self.textures.remove(&id.0) {
            self.double_frees += 1;
        }
    }

    fn create_vertex_buffer(&mut self, _size: u64) -> Result<BufferId, OverlayError> {
        let id = self.next();
        self.buffers.insert(id);
        Ok(BufferId(id))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        if !self.buffers.remove(&id.0) {
            self.double_frees += 1;
        }
    }

    fn write_vertices(&mut self, id: BufferId, bytes: &[u8]) {
        assert!(self.buffers.contains(&id.0), "write to a live buffer");
        self.vertex_writes.push(bytes.to_vec());
    }

    fn draw_quads(
        &mut self,
        buffer: BufferId,
        texture: TextureId,
        first_quad: u32,
        quad_count: u32,
    ) {
        self.draw_calls.push(DrawCall {
            buffer,
            texture,
            first_quad,
            quad_count,
        });
    }

    fn create_state_block(&mut self, kind: StateBlockKind) -> Result<StateBlockId, OverlayError> {
        let id = self.next();
        let filter = match kind {
            StateBlockKind::HostSaved => self.filter,
            StateBlockKind::OverlayDraw => Filter::Point,
        };
        self.blocks.insert(id, (kind, filter));
        Ok(StateBlockId(id))
    }

    fn destroy_state_block(&mut self, id: StateBlockId) {
        if self.blocks.remove(&id.0).is_none() {
            self.double_frees += 1;
        }
    }

    fn capture_state(&mut self, id: StateBlockId) {
        let current = self.filter;
        if let Some(block) = self.blocks.get_mut(&id.0) {
            block.1 = current;
        }
        self.state_captures.push(id);
    }

    fn apply_state(&mut self, id: StateBlockId) {
        if let Some(&(_, filter)) = self.blocks.get(&id.0) {
            self.filter = filter;
        }
        self.state_applies.push(id);
    }

    fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
        self.filters_seen.push(filter);
    }
}

// Block font backend

/// Rasterizer producing solid rectangles: every glyph is a fully covered
/// cell of `height / 2` × `height` pixels, spaces fully transparent.
struct BlockRaster {
    desc: FontDesc,
    fail_on: Vec<u16>,
}

impl Rasterize for BlockRaster {
    fn desc(&self) -> &FontDesc {
        &self.desc
    }

    fn rasterize(&mut self, code: u16) -> Result<Bitmap, OverlayError> {
        if self.fail_on.contains(&code) {
            return Err(OverlayError::RasterizationFailed {
                family: self.desc.family.clone(),
                code,
            });
        }
        let height = self.desc.height.max(2);
        let width = (height / 2).max(1);
        let fill = if code == 0x20 { 0x00 } else { 0xFF };
        Ok(Bitmap {
            width,
            height,
            coverage: vec![fill; (width * height) as usize],
        })
    }
}

/// Backend opening block rasterizers for any descriptor.
struct BlockFonts;

impl FontBackend for BlockFonts {
    fn open(&self, desc: &FontDesc) -> Result<Box<dyn Rasterize>, OverlayError> {
        Ok(Box::new(BlockRaster {
            desc: desc.clone(),
            fail_on: Vec::new(),
        }))
    }
}

/// A pool over the block backend.
pub(crate) fn block_pool() -> FontPool {
    FontPool::new(Box::new(BlockFonts))
}

/// A standalone cache over a block rasterizer.
pub(crate) fn block_cache(desc: &FontDesc) -> GlyphCache {
    GlyphCache::new(Box::new(BlockRaster {
        desc: desc.clone(),
        fail_on: Vec::new(),
    }))
}

/// A cache whose rasterizer fails for the given characters.
pub(crate) fn failing_cache(desc: &FontDesc, fail_on: &[char]) -> GlyphCache {
    GlyphCache::new(Box::new(BlockRaster {
        desc: desc.clone(),
        fail_on: fail_on.iter().map(|&c| c as u16).collect(),
    }))
}

// Vertex decoding helpers

fn read_f32(bytes: &[u8], offset: usize) -> f32 {
    f32::from_ne_bytes(bytes[offset..offset + 4].try_into().expect("f32 slice"))
}

/// Position of the first vertex in an uploaded vertex payload.
pub(crate) fn decode_first_vertex_pos(bytes: &[u8]) -> [f32; 2] {
    assert!(bytes.len() >= VERTEX_STRIDE);
    [read_f32(bytes, 0), read_f32(bytes, 4)]
}

/// Color of the first vertex in an uploaded vertex payload.
pub(crate) fn decode_first_vertex_color(bytes: &[u8]) -> [f32; 4] {
    assert!(bytes.len() >= VERTEX_STRIDE);
    [
        read_f32(bytes, 16),
        read_f32(bytes, 20),
        read_f32(bytes, 24),
        read_f32(bytes, 28),
    ]
}
