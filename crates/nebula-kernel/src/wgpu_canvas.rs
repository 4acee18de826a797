//! wgpu backend of the 2D canvas.
//!
//! Canvas commands are tessellated by [`TriangleBatch`]; `present` uploads
//! the triangles and draws them into an offscreen layer target with one
//! pipeline per compositing mode.

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use nebula_common::{EngineResult, SurfaceId};
use tracing::{debug, info};

use crate::batch::{TriangleBatch, Vertex2d};
use crate::canvas::{Canvas2d, CanvasSurface, CompositeMode};
use crate::layer::{GpuContext, LayerHost, LayerTarget, LAYER_FORMAT};

/// Initial vertex capacity of the upload buffer.
const INITIAL_VERTEX_CAPACITY: usize = 4096;

/// Pixel-space triangles to clip space.
pub const CANVAS_SHADER: &str = r"
struct Viewport {
    size: vec2<f32>,
    _pad: vec2<f32>,
}

@group(0) @binding(0) var<uniform> viewport: Viewport;

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) color: vec4<f32>,
}

@vertex
fn vs_main(@location(0) position: vec2<f32>, @location(1) color: vec4<f32>) -> VertexOutput {
    var out: VertexOutput;
    let ndc = position / viewport.size * 2.0 - 1.0;
    out.clip = vec4<f32>(ndc.x, -ndc.y, 0.0, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    return in.color;
}
";

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ViewportUniform {
    size: [f32; 2],
    _pad: [f32; 2],
}

/// Additive blending for the "lighter" compositing mode.
const LIGHTER_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::One,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

struct CanvasPipelines {
    source_over: wgpu::RenderPipeline,
    lighter: wgpu::RenderPipeline,
    viewport_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl CanvasPipelines {
    fn new(device: &wgpu::Device) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Canvas Shader"),
            source: wgpu::ShaderSource::Wgsl(CANVAS_SHADER.into()),
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Canvas Viewport Layout"),
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
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Canvas Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let make = |label: &str, blend: wgpu::BlendState| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<Vertex2d>() as u64,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &[
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x2,
                                offset: 0,
                                shader_location: 0,
                            },
                            wgpu::VertexAttribute {
                                format: wgpu::VertexFormat::Float32x4,
                                offset: 8,
                                shader_location: 1,
                            },
                        ],
                    }],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: LAYER_FORMAT,
                        blend: Some(blend),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
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
                multiview: None,
                cache: None,
            })
        };
        let source_over = make("Canvas Source-Over Pipeline", wgpu::BlendState::ALPHA_BLENDING);
        let lighter = make("Canvas Lighter Pipeline", LIGHTER_BLEND);

        let viewport_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Canvas Viewport Buffer"),
            size: std::mem::size_of::<ViewportUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Canvas Viewport Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: viewport_buffer.as_entire_binding(),
            }],
        });

        Self {
            source_over,
            lighter,
            viewport_buffer,
            bind_group,
        }
    }

    fn pipeline(&self, mode: CompositeMode) -> &wgpu::RenderPipeline {
        match mode {
            CompositeMode::SourceOver => &self.source_over,
            CompositeMode::Lighter => &self.lighter,
        }
    }
}

/// A canvas surface drawn with wgpu into the background layer.
pub struct WgpuCanvasSurface {
    id: SurfaceId,
    gpu: Arc<GpuContext>,
    layer: LayerHost,
    batch: TriangleBatch,
    pipelines: CanvasPipelines,
    target: Option<LayerTarget>,
    vertex_buffer: wgpu::Buffer,
    vertex_capacity: usize,
    released: bool,
}

impl WgpuCanvasSurface {
    /// Creates an unsized surface. It holds no target, and yields no
    /// context, until [`CanvasSurface::set_size`] attaches it to the layer.
    #[must_use]
    pub fn new(gpu: Arc<GpuContext>, layer: LayerHost) -> Self {
        let pipelines = CanvasPipelines::new(&gpu.device);
        let vertex_buffer = create_vertex_buffer(&gpu.device, INITIAL_VERTEX_CAPACITY);
        Self {
            id: SurfaceId::new(),
            gpu,
            layer,
            batch: TriangleBatch::new(0, 0),
            pipelines,
            target: None,
            vertex_buffer,
            vertex_capacity: INITIAL_VERTEX_CAPACITY,
            released: false,
        }
    }

    fn upload(&mut self) {
        let vertices = self.batch.vertices();
        if vertices.len() > self.vertex_capacity {
            self.vertex_capacity = vertices.len().next_power_of_two();
            self.vertex_buffer = create_vertex_buffer(&self.gpu.device, self.vertex_capacity);
            debug!("Canvas vertex buffer grown to {} vertices", self.vertex_capacity);
        }
        self.gpu
            .queue
            .write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(vertices));

        let (w, h) = self.batch.size();
        let viewport = ViewportUniform {
            size: [w.max(1) as f32, h.max(1) as f32],
            _pad: [0.0; 2],
        };
        self.gpu.queue.write_buffer(
            &self.pipelines.viewport_buffer,
            0,
            bytemuck::bytes_of(&viewport),
        );
    }
}

fn create_vertex_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Canvas Vertex Buffer"),
        size: (capacity * std::mem::size_of::<Vertex2d>()) as u64,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl CanvasSurface for WgpuCanvasSurface {
    type Context = TriangleBatch;

    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn set_size(&mut self, width: u32, height: u32) {
        if self.released {
            return;
        }
        self.batch.set_size(width, height);
        let target = LayerTarget::new(&self.gpu.device, "Canvas Layer Target", width, height);
        match self
            .layer
            .attach(self.id, Arc::clone(&target.view), target.size)
        {
            Ok(()) => self.target = Some(target),
            Err(e) => {
                debug!("Canvas surface not attached: {}", e);
                self.target = None;
            }
        }
    }

    fn context_2d(&mut self) -> Option<&mut TriangleBatch> {
        if self.released || self.target.is_none() {
            return None;
        }
        Some(&mut self.batch)
    }

    fn present(&mut self) -> EngineResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        self.upload();
        let Some(target) = self.target.as_ref() else {
            return Ok(());
        };

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Canvas Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Canvas Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_bind_group(0, &self.pipelines.bind_group, &[]);
            pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
            for batch in self.batch.batches() {
                pass.set_pipeline(self.pipelines.pipeline(batch.mode));
                pass.draw(batch.vertices.clone(), 0..1);
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.layer.detach(self.id);
        if let Some(target) = self.target.take() {
            target.texture.destroy();
        }
        info!("Canvas surface {} released", self.id.raw());
    }
}

impl std::fmt::Debug for WgpuCanvasSurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuCanvasSurface")
            .field("id", &self.id)
            .field("size", &self.batch.size())
            .field("attached", &self.target.is_some())
            .field("vertex_capacity", &self.vertex_capacity)
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}
