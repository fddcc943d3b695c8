use bytemuck::{Pod, Zeroable};

use crate::gfx::{QuadVertex, TextureTarget};

// ── uniform ───────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct ColorMatrixUniform {
    pub rows: [[f32; 4]; 4],
    pub const_add: [f32; 4],
}

impl ColorMatrixUniform {
    pub fn new(matrix: &[f32; 16], const_add: &[f32; 4]) -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (r, row) in rows.iter_mut().enumerate() {
            row.copy_from_slice(&matrix[r * 4..r * 4 + 4]);
        }
        Self { rows, const_add: *const_add }
    }
}

impl Default for ColorMatrixUniform {
    fn default() -> Self {
        let mut rows = [[0.0; 4]; 4];
        for (i, row) in rows.iter_mut().enumerate() {
            row[i] = 1.0;
        }
        Self { rows, const_add: [0.0; 4] }
    }
}

// ── vertices ──────────────────────────────────────────────────────────────

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub(crate) struct CopyVertex {
    pub pos: [f32; 2],
    pub uv: [f32; 2],
}

impl CopyVertex {
    const ATTRS: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<CopyVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRS,
        }
    }
}

const QUAD_INDICES: [u16; 6] = [0, 1, 2, 0, 2, 3];

/// Converts API quad vertices to wgpu conventions.
///
/// The API renders clip-space y = -1 into row 0 of the target; wgpu renders
/// y = +1 there, so y is negated. Rectangle sources take texel coordinates
/// and are normalized by the source size.
pub(crate) fn to_copy_vertices(
    vertices: &[QuadVertex; 4],
    source_target: TextureTarget,
    source_size: (u32, u32),
) -> [CopyVertex; 4] {
    let (sx, sy) = match source_target {
        TextureTarget::Rect => (1.0 / source_size.0.max(1) as f32, 1.0 / source_size.1.max(1) as f32),
        TextureTarget::Tex2D => (1.0, 1.0),
    };
    vertices.map(|v| CopyVertex {
        pos: [v.pos[0], -v.pos[1]],
        uv: [v.tex[0] * sx, v.tex[1] * sy],
    })
}

/// Clips `(x, y, w, h)` to a `target` sized attachment. `None` if nothing is left.
pub(crate) fn clip_viewport(viewport: (i32, i32, u32, u32), target: (u32, u32)) -> Option<[f32; 4]> {
    let (x, y, w, h) = viewport;
    let x0 = x.max(0) as i64;
    let y0 = y.max(0) as i64;
    let x1 = (x as i64 + w as i64).min(target.0 as i64);
    let y1 = (y as i64 + h as i64).min(target.1 as i64);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some([x0 as f32, y0 as f32, (x1 - x0) as f32, (y1 - y0) as f32])
}

// ── pipeline ──────────────────────────────────────────────────────────────

/// Inputs of one color-matrix draw.
pub(crate) struct CopyPass<'a> {
    pub source: &'a wgpu::TextureView,
    pub sampler: &'a wgpu::Sampler,
    pub target: &'a wgpu::TextureView,
    pub viewport: [f32; 4],
    pub vertices: [CopyVertex; 4],
    pub uniform: ColorMatrixUniform,
}

/// Pipeline and buffers for the color-matrix program, built for one target format.
pub(crate) struct ColorMatrixPipeline {
    format: wgpu::TextureFormat,
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    ubo: wgpu::Buffer,
    vbo: wgpu::Buffer,
    ibo: wgpu::Buffer,
}

impl ColorMatrixPipeline {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat) -> Self {
        use wgpu::util::DeviceExt;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gxtex color matrix shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/color_matrix.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gxtex color matrix bgl"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: wgpu::BufferSize::new(
                            std::mem::size_of::<ColorMatrixUniform>() as u64,
                        ),
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gxtex color matrix pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("gxtex color matrix pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[CopyVertex::layout()],
            },

            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },

            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let ubo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gxtex color matrix ubo"),
            size: std::mem::size_of::<ColorMatrixUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let vbo = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gxtex copy quad vbo"),
            size: std::mem::size_of::<[CopyVertex; 4]>() as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let ibo = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gxtex copy quad ibo"),
            contents: bytemuck::cast_slice(&QUAD_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        });

        Self { format, pipeline, bind_group_layout, ubo, vbo, ibo }
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    /// Records and submits one pass drawing the quad into `pass.target`.
    pub fn draw(&self, device: &wgpu::Device, queue: &wgpu::Queue, pass: &CopyPass<'_>) {
        queue.write_buffer(&self.ubo, 0, bytemuck::bytes_of(&pass.uniform));
        queue.write_buffer(&self.vbo, 0, bytemuck::cast_slice(&pass.vertices));

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gxtex color matrix bind group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.ubo.as_entire_binding() },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(pass.source),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(pass.sampler),
                },
            ],
        });

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("gxtex copy encoder"),
        });

        {
            let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("gxtex copy pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: pass.target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            let [x, y, w, h] = pass.viewport;
            rpass.set_viewport(x, y, w, h, 0.0, 1.0);
            rpass.set_pipeline(&self.pipeline);
            rpass.set_bind_group(0, &bind_group, &[]);
            rpass.set_vertex_buffer(0, self.vbo.slice(..));
            rpass.set_index_buffer(self.ibo.slice(..), wgpu::IndexFormat::Uint16);
            rpass.draw_indexed(0..6, 0, 0..1);
        }

        queue.submit(std::iter::once(encoder.finish()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_is_std140_sized() {
        assert_eq!(std::mem::size_of::<ColorMatrixUniform>(), 80);
        assert_eq!(std::mem::size_of::<CopyVertex>(), 16);
    }

    #[test]
    fn uniform_rows_follow_matrix() {
        let m: [f32; 16] = std::array::from_fn(|i| i as f32);
        let u = ColorMatrixUniform::new(&m, &[0.5; 4]);
        assert_eq!(u.rows[1], [4.0, 5.0, 6.0, 7.0]);
        assert_eq!(u.const_add, [0.5; 4]);
        assert_eq!(ColorMatrixUniform::default().rows[2], [0.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn rect_sources_are_normalized_and_flipped() {
        let quad = [
            QuadVertex { pos: [-1.0, 1.0], tex: [0.0, 264.0] },
            QuadVertex { pos: [-1.0, -1.0], tex: [0.0, 528.0] },
            QuadVertex { pos: [1.0, -1.0], tex: [320.0, 528.0] },
            QuadVertex { pos: [1.0, 1.0], tex: [320.0, 264.0] },
        ];
        let v = to_copy_vertices(&quad, TextureTarget::Rect, (640, 528));
        assert_eq!(v[0], CopyVertex { pos: [-1.0, -1.0], uv: [0.0, 0.5] });
        assert_eq!(v[2], CopyVertex { pos: [1.0, 1.0], uv: [0.5, 1.0] });

        let v = to_copy_vertices(&quad, TextureTarget::Tex2D, (640, 528));
        assert_eq!(v[1].uv, [0.0, 528.0]);
    }

    #[test]
    fn viewport_clipping() {
        assert_eq!(clip_viewport((0, 0, 64, 32), (128, 128)), Some([0.0, 0.0, 64.0, 32.0]));
        assert_eq!(clip_viewport((-8, 0, 64, 32), (32, 16)), Some([0.0, 0.0, 32.0, 16.0]));
        assert_eq!(clip_viewport((200, 0, 64, 32), (128, 128)), None);
        assert_eq!(clip_viewport((0, 0, 0, 32), (128, 128)), None);
    }
}
