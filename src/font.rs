use std::collections::HashMap;
use std::rc::Rc;

use cosmic_text::{Attrs, Buffer, Family, FontSystem, Metrics, Shaping, Wrap};
use freetype::Library;
use freetype::face::LoadFlag;

use crate::error::LoadError;
use crate::ui::{TextAlign, TextCommand};

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct TextUniforms {
    pub projection: [[f32; 4]; 4],
}

#[derive(Clone, Copy)]
pub struct GlyphInfo {
    pub width: u32,
    pub height: u32,
    pub bearing_x: i32,
    pub bearing_y: i32,
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl GlyphInfo {
    const EMPTY: GlyphInfo = GlyphInfo {
        width: 0,
        height: 0,
        bearing_x: 0,
        bearing_y: 0,
        u0: 0.0,
        v0: 0.0,
        u1: 0.0,
        v1: 0.0,
    };
}

/// Glyphs are rasterized per pixel size, since labels, bubbles and the
/// status strip use different sizes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct GlyphKey {
    glyph_id: u32,
    size_px: u32,
}

struct PendingGlyphUpload {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

const ATLAS_WIDTH: u32 = 1024;
const ATLAS_HEIGHT: u32 = 1024;

pub struct FontRenderer {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    uniform_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    frame_vertices: Vec<TextVertex>,

    // shaping and wrapping
    font_system: FontSystem,
    family: String,

    glyphs: HashMap<GlyphKey, GlyphInfo>,

    // rasterizer; the face outlives every cached glyph
    _ft_lib: Library,
    ft_face: freetype::Face,
    ft_load_flags: LoadFlag,
    question_glyph: Option<u32>,

    atlas_texture: wgpu::Texture,
    atlas_shelf_x: u32,
    atlas_shelf_y: u32,
    atlas_shelf_height: u32,
    pending_atlas_uploads: Vec<PendingGlyphUpload>,
}

impl FontRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        surface_format: wgpu::TextureFormat,
        font_bytes: Vec<u8>,
    ) -> Result<Self, LoadError> {
        let ft_lib = Library::init()?;
        let ft_face = ft_lib.new_memory_face(Rc::new(font_bytes.clone()), 0)?;
        let question_glyph = ft_face.get_char_index('?' as usize);

        let mut db = cosmic_text::fontdb::Database::new();
        db.load_font_data(font_bytes);
        let family = db
            .faces()
            .find_map(|face| face.families.first().map(|(name, _)| name.clone()))
            .unwrap_or_else(|| "sans-serif".to_string());
        let font_system = FontSystem::new_with_locale_and_db("en-US".to_string(), db);

        let atlas_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("glyph_atlas"),
            size: wgpu::Extent3d {
                width: ATLAS_WIDTH,
                height: ATLAS_HEIGHT,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::R8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        // Start from a cleared atlas; glyphs arrive as sub-region writes.
        let blank = vec![0u8; (ATLAS_WIDTH * ATLAS_HEIGHT) as usize];
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &atlas_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &blank,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(ATLAS_WIDTH),
                rows_per_image: Some(ATLAS_HEIGHT),
            },
            wgpu::Extent3d {
                width: ATLAS_WIDTH,
                height: ATLAS_HEIGHT,
                depth_or_array_layers: 1,
            },
        );

        let atlas_view = atlas_texture.create_view(&wgpu::TextureViewDescriptor::default());

        let atlas_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("glyph_sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("text_uniforms"),
            size: std::mem::size_of::<TextUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let initial_capacity = 2048;
        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("text_vertices"),
            size: (initial_capacity * std::mem::size_of::<TextVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("text_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: false },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::NonFiltering),
                    count: None,
                },
            ],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("text_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&atlas_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&atlas_sampler),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("text_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("text.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("text_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("text_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<TextVertex>() as u64,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        wgpu::VertexAttribute {
                            offset: 0,
                            shader_location: 0,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: 8,
                            shader_location: 1,
                            format: wgpu::VertexFormat::Float32x2,
                        },
                        wgpu::VertexAttribute {
                            offset: 16,
                            shader_location: 2,
                            format: wgpu::VertexFormat::Float32x4,
                        },
                    ],
                }],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Ok(Self {
            pipeline,
            bind_group,
            uniform_buffer,
            vertex_buffer,
            vertex_capacity: initial_capacity,
            frame_vertices: Vec::new(),
            font_system,
            family,
            glyphs: HashMap::new(),
            _ft_lib: ft_lib,
            ft_face,
            ft_load_flags: LoadFlag::RENDER | LoadFlag::TARGET_LIGHT,
            question_glyph,
            atlas_texture,
            atlas_shelf_x: 0,
            atlas_shelf_y: 0,
            atlas_shelf_height: 0,
            pending_atlas_uploads: Vec::new(),
        })
    }

    /// Reset the frame's vertices and upload the projection for a `width` x `height` target.
    pub fn begin_frame(&mut self, queue: &wgpu::Queue, screen_w: u32, screen_h: u32) {
        self.frame_vertices.clear();

        let sw = screen_w.max(1) as f32;
        let sh = screen_h.max(1) as f32;

        #[rustfmt::skip]
        let projection: [[f32; 4]; 4] = [
            [2.0 / sw,  0.0,        0.0, 0.0],
            [0.0,      -2.0 / sh,   0.0, 0.0],
            [0.0,       0.0,        1.0, 0.0],
            [-1.0,      1.0,        0.0, 1.0],
        ];

        let uniforms = TextUniforms { projection };
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&uniforms));
    }

    /// Lay out `cmd` with cosmic-text and append its glyph quads.
    pub fn prepare(&mut self, cmd: &TextCommand) {
        if cmd.text.is_empty() || cmd.color[3] <= 0.0 {
            return;
        }

        let metrics = Metrics::new(cmd.font_size, cmd.line_height);
        let mut buffer = Buffer::new(&mut self.font_system, metrics);
        match cmd.wrap_width {
            Some(width) => {
                buffer.set_wrap(&mut self.font_system, Wrap::WordOrGlyph);
                buffer.set_size(&mut self.font_system, Some(width), None);
            }
            None => buffer.set_size(&mut self.font_system, None, None),
        }
        let attrs = Attrs::new().family(Family::Name(&self.family));
        buffer.set_text(&mut self.font_system, &cmd.text, &attrs, Shaping::Advanced, None);
        buffer.shape_until_scroll(&mut self.font_system, false);

        // Buffer borrows font_system; gather placements first.
        let mut glyph_positions: Vec<(u32, i32, i32)> = Vec::new();
        for run in buffer.layout_runs() {
            let origin_x = line_origin(cmd.align, cmd.x, run.line_w);
            for glyph in run.glyphs.iter() {
                let physical = glyph.physical((origin_x, cmd.y + run.line_y), 1.0);
                glyph_positions.push((physical.cache_key.glyph_id as u32, physical.x, physical.y));
            }
        }
        drop(buffer);

        let size_px = cmd.font_size.round().max(1.0) as u32;
        let color = premultiplied(cmd.color);
        let question = self.question_glyph;

        for (glyph_id, px, py) in glyph_positions {
            // .notdef falls back to '?'
            let mut info = if glyph_id == 0 {
                None
            } else {
                self.glyph(glyph_id, size_px)
            };
            if info.is_none()
                && let Some(q) = question
            {
                info = self.glyph(q, size_px);
            }
            let Some(info) = info else {
                continue;
            };
            if info.width == 0 || info.height == 0 {
                continue;
            }

            let x0 = (px as f32 + info.bearing_x as f32).floor();
            let y0 = (py as f32 - info.bearing_y as f32).floor();
            let x1 = x0 + info.width as f32;
            let y1 = y0 + info.height as f32;

            let quad = [
                ([x0, y0], [info.u0, info.v0]),
                ([x1, y0], [info.u1, info.v0]),
                ([x0, y1], [info.u0, info.v1]),
                ([x1, y0], [info.u1, info.v0]),
                ([x1, y1], [info.u1, info.v1]),
                ([x0, y1], [info.u0, info.v1]),
            ];
            self.frame_vertices
                .extend(quad.into_iter().map(|(position, uv)| TextVertex {
                    position,
                    uv,
                    color,
                }));
        }
    }

    /// Push this frame's glyph quads and any new atlas regions. The returned
    /// count goes to `render`.
    pub fn flush(&mut self, queue: &wgpu::Queue, device: &wgpu::Device) -> u32 {
        // Glyphs rasterized this frame.
        for upload in self.pending_atlas_uploads.drain(..) {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &self.atlas_texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: upload.x,
                        y: upload.y,
                        z: 0,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &upload.pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(upload.width),
                    rows_per_image: Some(upload.height),
                },
                wgpu::Extent3d {
                    width: upload.width,
                    height: upload.height,
                    depth_or_array_layers: 1,
                },
            );
        }

        let vertex_count = self.frame_vertices.len() as u32;
        if self.frame_vertices.is_empty() {
            return 0;
        }

        if self.frame_vertices.len() > self.vertex_capacity {
            self.vertex_capacity = self.frame_vertices.len().next_power_of_two();
            self.vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("text_vertices"),
                size: (self.vertex_capacity * std::mem::size_of::<TextVertex>()) as u64,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
        }

        queue.write_buffer(
            &self.vertex_buffer,
            0,
            bytemuck::cast_slice(&self.frame_vertices),
        );

        vertex_count
    }

    /// Cached glyph, rasterizing it into the atlas on first use.
    fn glyph(&mut self, glyph_id: u32, size_px: u32) -> Option<GlyphInfo> {
        let key = GlyphKey { glyph_id, size_px };
        if let Some(info) = self.glyphs.get(&key) {
            return Some(*info);
        }

        if self.ft_face.set_pixel_sizes(0, size_px).is_err()
            || self.ft_face.load_glyph(glyph_id, self.ft_load_flags).is_err()
        {
            return None;
        }

        let glyph_slot = self.ft_face.glyph();
        let bitmap = glyph_slot.bitmap();
        let w = bitmap.width() as u32;
        let h = bitmap.rows() as u32;

        if w == 0 || h == 0 {
            self.glyphs.insert(key, GlyphInfo::EMPTY);
            return Some(GlyphInfo::EMPTY);
        }

        let padding: u32 = 1;

        // New shelf when the row is full.
        if self.atlas_shelf_x + w + padding > ATLAS_WIDTH {
            self.atlas_shelf_y += self.atlas_shelf_height + padding;
            self.atlas_shelf_x = 0;
            self.atlas_shelf_height = 0;
        }

        if self.atlas_shelf_y + h > ATLAS_HEIGHT {
            log::warn!("glyph atlas full, cannot add glyph_id {} at {}px", glyph_id, size_px);
            return None;
        }

        let pos_x = self.atlas_shelf_x;
        let pos_y = self.atlas_shelf_y;
        self.atlas_shelf_height = self.atlas_shelf_height.max(h);
        self.atlas_shelf_x += w + padding;

        // FreeType rows may be padded or stored bottom-up.
        let pitch = bitmap.pitch();
        let buf = bitmap.buffer();
        let abs_pitch = pitch.unsigned_abs() as usize;
        let mut pixels = Vec::with_capacity((w * h) as usize);
        for row in 0..h {
            let src_row = if pitch >= 0 {
                row as usize
            } else {
                (h - 1 - row) as usize
            };
            let start = src_row * abs_pitch;
            let end = start + w as usize;
            pixels.extend_from_slice(&buf[start..end]);
        }

        self.pending_atlas_uploads.push(PendingGlyphUpload {
            x: pos_x,
            y: pos_y,
            width: w,
            height: h,
            pixels,
        });

        let aw = ATLAS_WIDTH as f32;
        let ah = ATLAS_HEIGHT as f32;
        let info = GlyphInfo {
            width: w,
            height: h,
            bearing_x: glyph_slot.bitmap_left(),
            bearing_y: glyph_slot.bitmap_top(),
            u0: pos_x as f32 / aw,
            v0: pos_y as f32 / ah,
            u1: (pos_x + w) as f32 / aw,
            v1: (pos_y + h) as f32 / ah,
        };
        self.glyphs.insert(key, info);
        Some(info)
    }

    pub fn render<'a>(&'a self, render_pass: &mut wgpu::RenderPass<'a>, vertex_count: u32) {
        if vertex_count == 0 {
            return;
        }
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        render_pass.draw(0..vertex_count, 0..1);
    }
}

/// Left edge of a laid-out line of width `line_w` anchored at `x`.
fn line_origin(align: TextAlign, x: f32, line_w: f32) -> f32 {
    match align {
        TextAlign::Left => x,
        TextAlign::Center => (x - line_w / 2.0).round(),
    }
}

fn premultiplied(c: [f32; 4]) -> [f32; 4] {
    [c[0] * c[3], c[1] * c[3], c[2] * c[3], c[3]]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_lines_straddle_anchor() {
        assert_eq!(line_origin(TextAlign::Center, 500.0, 80.0), 460.0);
        assert_eq!(line_origin(TextAlign::Left, 500.0, 80.0), 500.0);
    }

    #[test]
    fn premultiply_scales_rgb_by_alpha() {
        assert_eq!(premultiplied([1.0, 0.5, 0.0, 0.5]), [0.5, 0.25, 0.0, 0.5]);
    }
}
