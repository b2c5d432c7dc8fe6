//! `wgpu` implementation of the device seam.
//!
//! The host hands over its `wgpu::Device`/`wgpu::Queue` and target surface
//! format; the backend records overlay draw commands as they arrive and
//! replays them into one render pass per frame via [`WgpuDevice::render`].
//! Render-state snapshots reduce to sampler selection here — blend, cull,
//! and fill state are baked into the overlay's own pipeline and cannot leak
//! into the host's passes.

use std::collections::HashMap;
use std::ops::Range;

use crate::error::OverlayError;

use super::batch::MAX_BATCH_QUADS;
use super::device::{BufferId, Device, Filter, StateBlockId, StateBlockKind, TextureId};
use super::quad::VERTEX_STRIDE;

const SHADER_SRC: &str = "
struct Uniforms {
    projection: mat4x4<f32>,
}

@group(0) @binding(0) var<uniform> uniforms: Uniforms;
@group(1) @binding(0) var glyph_texture: texture_2d<f32>;
@group(1) @binding(1) var glyph_sampler: sampler;

struct VertexInput {
    @location(0) pos: vec2<f32>,
    @location(1) uv: vec2<f32>,
    @location(2) color: vec4<f32>,
}

struct VertexOutput {
    @builtin(position) position: vec4<f32>,
    @location(0) uv: vec2<f32>,
    @location(1) color: vec4<f32>,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.position = uniforms.projection * vec4<f32>(input.pos, 0.0, 1.0);
    out.uv = input.uv;
    out.color = input.color;
    return out;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    // Texture red channel is glyph alpha; color is modulated per vertex.
    // Premultiplied output to match the blend state.
    let coverage = textureSample(glyph_texture, glyph_sampler, input.uv).r;
    let a = input.color.a * coverage;
    return vec4<f32>(input.color.rgb * a, a);
}
";

/// Vertex attributes matching `quad::VERTEX_STRIDE`.
const VERTEX_ATTRS: [wgpu::VertexAttribute; 3] = [
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 0,
        shader_location: 0,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x2,
        offset: 8,
        shader_location: 1,
    },
    wgpu::VertexAttribute {
        format: wgpu::VertexFormat::Float32x4,
        offset: 16,
        shader_location: 2,
    },
];

fn vertex_buffer_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: VERTEX_STRIDE as u64,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRS,
    }
}

/// Build an orthographic projection matrix (pixels to NDC) as 64 bytes.
/// Maps (0,0)-(w,h) to (-1,1)-(1,-1), column-major for WGSL mat4x4.
fn ortho_projection(w: f32, h: f32) -> [u8; 64] {
    let proj: [f32; 16] = [
        2.0 / w,
        0.0,
        0.0,
        0.0,
        0.0,
        -2.0 / h,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
        0.0,
        -1.0,
        1.0,
        0.0,
        1.0,
    ];

    let mut bytes = [0u8; 64];
    for (i, &v) in proj.iter().enumerate() {
        bytes[i * 4..i * 4 + 4].copy_from_slice(&v.to_ne_bytes());
    }
    bytes
}

/// Quad index pattern: two triangles per quad over fan-ordered vertices.
fn quad_indices(quads: usize) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(quads * 6 * 2);
    for q in 0..quads as u16 {
        let base = q * 4;
        for i in [base, base + 1, base + 2, base, base + 2, base + 3] {
            bytes.extend_from_slice(&i.to_ne_bytes());
        }
    }
    bytes
}

struct GlyphTexture {
    // Bind groups keep the texture and view alive.
    point_bind: wgpu::BindGroup,
    linear_bind: wgpu::BindGroup,
}

/// A logical dynamic vertex buffer. Every `write_vertices` lands in a fresh
/// (or recycled) GPU buffer so earlier draws in the same frame keep the data
/// they referenced — the discard-and-refill contract of the seam.
struct VertexSlot {
    capacity: u64,
    generations: Vec<wgpu::Buffer>,
    free: Vec<wgpu::Buffer>,
}

struct StateSnapshot {
    filter: Filter,
}

struct DrawCmd {
    vertices: wgpu::Buffer,
    bind: wgpu::BindGroup,
    indices: Range<u32>,
}

/// Device seam over a host-provided `wgpu` device and queue.
pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    width: u32,
    height: u32,
    pipeline: wgpu::RenderPipeline,
    glyph_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    point_sampler: wgpu::Sampler,
    linear_sampler: wgpu::Sampler,
    index_buffer: wgpu::Buffer,
    filter: Filter,
    next_id: u32,
    textures: HashMap<u32, GlyphTexture>,
    buffers: HashMap<u32, VertexSlot>,
    blocks: HashMap<u32, StateSnapshot>,
    commands: Vec<DrawCmd>,
}

impl WgpuDevice {
    /// Wrap a host device for a target of `format` at `width` × `height`.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("overlay_text_shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER_SRC.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay_uniform_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let glyph_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("overlay_glyph_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("overlay_pipeline_layout"),
            bind_group_layouts: &[&uniform_layout, &glyph_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("overlay_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                buffers: &[vertex_buffer_layout()],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: wgpu::PipelineCompilationOptions::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState {
                        // Premultiplied alpha: shader outputs (rgb * a, a)
                        color: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                        alpha: wgpu::BlendComponent {
                            src_factor: wgpu::BlendFactor::One,
                            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
                            operation: wgpu::BlendOperation::Add,
                        },
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: wgpu::PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay_uniforms"),
            size: 64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &uniform_buffer,
            0,
            &ortho_projection(width as f32, height as f32),
        );

        let uniform_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_uniform_bind_group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let point_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_point_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });
        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("overlay_linear_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let indices = quad_indices(MAX_BATCH_QUADS);
        let index_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("overlay_quad_indices"),
            size: indices.len() as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(&index_buffer, 0, &indices);

        Self {
            device,
            queue,
            width,
            height,
            pipeline,
            glyph_layout,
            uniform_buffer,
            uniform_bind_group,
            point_sampler,
            linear_sampler,
            index_buffer,
            filter: Filter::Point,
            next_id: 1,
            textures: HashMap::new(),
            buffers: HashMap::new(),
            blocks: HashMap::new(),
            commands: Vec::new(),
        }
    }

    /// Track a resized backbuffer: update the projection for new frames.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.queue.write_buffer(
            &self.uniform_buffer,
            0,
            &ortho_projection(width as f32, height as f32),
        );
    }

    /// Number of draw commands recorded and not yet rendered.
    pub fn pending_draws(&self) -> usize {
        self.commands.len()
    }

    /// Replay all recorded overlay draws into one render pass over the
    /// host's target, on top of whatever the host already rendered.
    pub fn render(&mut self, encoder: &mut wgpu::CommandEncoder, target: &wgpu::TextureView) {
        if self.commands.is_empty() {
            return;
        }

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("overlay_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    depth_slice: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &self.uniform_bind_group, &[]);
            rpass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
            for cmd in &self.commands {
                rpass.set_vertex_buffer(0, cmd.vertices.slice(..));
                rpass.set_bind_group(1, &cmd.bind, &[]);
                rpass.draw_indexed(cmd.indices.clone(), 0, 0..1);
            }
        }

        self.commands.clear();
        // Frame over: every generation buffer becomes reusable.
        for slot in self.buffers.values_mut() {
            let mut spent = std::mem::take(&mut slot.generations);
            slot.free.append(&mut spent);
        }
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn bind_for(&self, view: &wgpu::TextureView, sampler: &wgpu::Sampler) -> wgpu::BindGroup {
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("overlay_glyph_bind_group"),
            layout: &self.glyph_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }
}

impl Device for WgpuDevice {
    fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_glyph_texture(
        &mut self,
        width: u32,
        height: u32,
        texels: &[u16],
    ) -> Result<TextureId, OverlayError> {
        // Expand the packed 4-bit alpha nibble to 8 bits; the white color
        // bits live in the shader's per-vertex modulation instead.
        let alpha: Vec<u8> = texels.iter().map(|&t| ((t >> 12) as u8) * 17).collect();

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("overlay_glyph"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &alpha,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let entry = GlyphTexture {
            point_bind: self.bind_for(&view, &self.point_sampler),
            linear_bind: self.bind_for(&view, &self.linear_sampler),
        };
        let id = self.next();
        self.textures.insert(id, entry);
        Ok(TextureId(id))
    }

    fn destroy_texture(&mut self, id: TextureId) {
        self.textures.remove(&id.0);
    }

    fn create_vertex_buffer(&mut self, size: u64) -> Result<BufferId, OverlayError> {
        let id = self.next();
        self.buffers.insert(
            id,
            VertexSlot {
                capacity: size,
                generations: Vec::new(),
                free: Vec::new(),
            },
        );
        Ok(BufferId(id))
    }

    fn destroy_buffer(&mut self, id: BufferId) {
        self.buffers.remove(&id.0);
    }

    fn write_vertices(&mut self, id: BufferId, bytes: &[u8]) {
        let Some(slot) = self.buffers.get_mut(&id.0) else {
            log::warn!("wgpu: vertex write to unknown buffer {id:?}");
            return;
        };
        let needed = (bytes.len() as u64).max(VERTEX_STRIDE as u64);
        let buffer = match slot.free.iter().position(|b| b.size() >= needed) {
            Some(i) => slot.free.swap_remove(i),
            None => self.device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("overlay_vertices"),
                size: slot.capacity.max(needed),
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        };
        if !bytes.is_empty() {
            self.queue.write_buffer(&buffer, 0, bytes);
        }
        slot.generations.push(buffer);
    }

    fn draw_quads(
        &mut self,
        buffer: BufferId,
        texture: TextureId,
        first_quad: u32,
        quad_count: u32,
    ) {
        let Some(slot) = self.buffers.get(&buffer.0) else {
            log::warn!("wgpu: draw from unknown buffer {buffer:?}");
            return;
        };
        let Some(vertices) = slot.generations.last() else {
            log::warn!("wgpu: draw before any vertex write");
            return;
        };
        let vertices = vertices.clone();
        let Some(glyph) = self.textures.get(&texture.0) else {
            log::warn!("wgpu: draw with unknown texture {texture:?}");
            return;
        };
        let bind = match self.filter {
            Filter::Point => glyph.point_bind.clone(),
            Filter::Linear => glyph.linear_bind.clone(),
        };
        self.commands.push(DrawCmd {
            vertices,
            bind,
            indices: first_quad * 6..(first_quad + quad_count) * 6,
        });
    }

    fn create_state_block(&mut self, kind: StateBlockKind) -> Result<StateBlockId, OverlayError> {
        let filter = match kind {
            StateBlockKind::HostSaved => self.filter,
            StateBlockKind::OverlayDraw => Filter::Point,
        };
        let id = self.next();
        self.blocks.insert(id, StateSnapshot { filter });
        Ok(StateBlockId(id))
    }

    fn destroy_state_block(&mut self, id: StateBlockId) {
        self.blocks.remove(&id.0);
    }

    fn capture_state(&mut self, id: StateBlockId) {
        let current = self.filter;
        if let Some(block) = self.blocks.get_mut(&id.0) {
            block.filter = current;
        }
    }

    fn apply_state(&mut self, id: StateBlockId) {
        if let Some(block) = self.blocks.get(&id.0) {
            self.filter = block.filter;
        }
    }

    fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_index_pattern_is_two_fan_triangles() {
        let bytes = quad_indices(2);
        let indices: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(indices, vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7]);
    }

    #[test]
    fn ortho_projection_maps_corners() {
        let bytes = ortho_projection(800.0, 600.0);
        let m: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        // Column-major: x' = x * m[0] + m[12], y' = y * m[5] + m[13].
        let map = |x: f32, y: f32| (x * m[0] + m[12], y * m[5] + m[13]);
        assert_eq!(map(0.0, 0.0), (-1.0, 1.0));
        assert_eq!(map(800.0, 600.0), (1.0, -1.0));
        assert_eq!(map(400.0, 300.0), (0.0, 0.0));
    }
}
