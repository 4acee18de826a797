//! [`GpuDevice`] implemented on wgpu.
//!
//! The field renders into an offscreen color target with a depth buffer.
//! The color target is attached to the background layer, where the
//! compositor picks it up.

use std::collections::HashMap;
use std::sync::Arc;

use nebula_common::{BufferId, EngineError, EngineResult, GpuError, ProgramId, SurfaceId};
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

use super::device::{
    BlendMode, BufferDesc, BufferUsage, FaceCulling, GpuDevice, ProgramDesc, ProgramKind,
    RenderFrame,
};
use crate::layer::{GpuContext, LayerHost, LayerTarget, LAYER_FORMAT};

/// Depth format of the field's surface.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const ADDITIVE_BLEND: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

static POINT_ATTRIBUTES: [[wgpu::VertexAttribute; 1]; 4] = [
    wgpu::vertex_attr_array![0 => Float32x3],
    wgpu::vertex_attr_array![1 => Float32x3],
    wgpu::vertex_attr_array![2 => Float32],
    wgpu::vertex_attr_array![3 => Float32],
];

static SHELL_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

fn vertex_layouts(kind: ProgramKind) -> Vec<wgpu::VertexBufferLayout<'static>> {
    match kind {
        ProgramKind::PointSprites => POINT_ATTRIBUTES
            .iter()
            .zip([12, 12, 4, 4])
            .map(|(attributes, stride)| wgpu::VertexBufferLayout {
                array_stride: stride,
                step_mode: wgpu::VertexStepMode::Instance,
                attributes,
            })
            .collect(),
        ProgramKind::NebulaShell => vec![wgpu::VertexBufferLayout {
            array_stride: 12,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &SHELL_ATTRIBUTES,
        }],
    }
}

fn blend_state(mode: BlendMode) -> wgpu::BlendState {
    match mode {
        BlendMode::Additive => ADDITIVE_BLEND,
    }
}

fn cull_mode(culling: FaceCulling) -> Option<wgpu::Face> {
    match culling {
        FaceCulling::None => None,
        FaceCulling::Front => Some(wgpu::Face::Front),
    }
}

struct FieldSurface {
    id: SurfaceId,
    color: LayerTarget,
    depth: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl FieldSurface {
    fn new(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::with_id(device, SurfaceId::new(), width, height)
    }

    fn with_id(device: &wgpu::Device, id: SurfaceId, width: u32, height: u32) -> Self {
        let color = LayerTarget::new(device, "Particle Field Target", width, height);
        let depth = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Particle Field Depth"),
            size: wgpu::Extent3d {
                width: color.size.0,
                height: color.size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            id,
            color,
            depth,
            depth_view,
        }
    }

    fn destroy(self) {
        self.color.texture.destroy();
        self.depth.destroy();
    }
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// wgpu-backed device for the particle field.
pub struct WgpuDevice {
    gpu: Arc<GpuContext>,
    layer: LayerHost,
    surface: Option<FieldSurface>,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    programs: HashMap<ProgramId, Program>,
    next_id: u32,
}

impl WgpuDevice {
    /// Creates a device drawing into `layer`.
    #[must_use]
    pub fn new(gpu: Arc<GpuContext>, layer: LayerHost) -> Self {
        Self {
            gpu,
            layer,
            surface: None,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            next_id: 1,
        }
    }

    fn allocate_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn attach_to_layer(&self, surface: &FieldSurface) -> EngineResult<()> {
        self.layer.attach(
            surface.id,
            Arc::clone(&surface.color.view),
            surface.color.size,
        )
    }

    fn build_program(&self, desc: &ProgramDesc<'_>) -> Program {
        let device = &self.gpu.device;
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(desc.label),
            source: wgpu::ShaderSource::Wgsl(desc.source.into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(desc.label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(desc.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let layouts = vertex_layouts(desc.kind);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(desc.label),
            layout: Some(&layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &layouts,
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: LAYER_FORMAT,
                    blend: Some(blend_state(desc.blend)),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: cull_mode(desc.culling),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: desc.depth_write,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(desc.label),
            size: desc.uniform_size.max(16),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(desc.label),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        Program {
            pipeline,
            uniform_buffer,
            bind_group,
        }
    }
}

impl GpuDevice for WgpuDevice {
    fn attach_surface(&mut self, width: u32, height: u32) -> EngineResult<SurfaceId> {
        if self.surface.is_some() {
            return Err(GpuError::InitFailed("surface already attached".into()).into());
        }
        let surface = FieldSurface::new(&self.gpu.device, width, height);
        if let Err(e) = self.attach_to_layer(&surface) {
            surface.destroy();
            return Err(EngineError::ContextUnavailable(e.to_string()));
        }
        let id = surface.id;
        info!("Particle field surface attached ({}x{})", width, height);
        self.surface = Some(surface);
        Ok(id)
    }

    fn detach_surface(&mut self) {
        if let Some(surface) = self.surface.take() {
            self.layer.detach(surface.id);
            surface.destroy();
            info!("Particle field surface detached");
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        let Some(old) = self.surface.take() else {
            return;
        };
        if old.color.size == (width.max(1), height.max(1)) {
            self.surface = Some(old);
            return;
        }
        let resized = FieldSurface::with_id(&self.gpu.device, old.id, width, height);
        old.destroy();
        if let Err(e) = self.attach_to_layer(&resized) {
            warn!("Resized field surface not attached: {}", e);
        }
        debug!("Particle field surface resized to {}x{}", width, height);
        self.surface = Some(resized);
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: &[u8]) -> EngineResult<BufferId> {
        if contents.is_empty() {
            return Err(GpuError::BufferAlloc(format!("'{}' is empty", desc.label)).into());
        }
        let usage = match desc.usage {
            BufferUsage::Vertex => wgpu::BufferUsages::VERTEX,
            BufferUsage::Index => wgpu::BufferUsages::INDEX,
        };

        let device = &self.gpu.device;
        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(desc.label),
            contents,
            usage,
        });
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            buffer.destroy();
            return Err(GpuError::BufferAlloc(format!("'{}': {}", desc.label, error)).into());
        }

        let id = BufferId::from_raw(self.allocate_id());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn release_buffer(&mut self, id: BufferId) {
        if let Some(buffer) = self.buffers.remove(&id) {
            buffer.destroy();
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> EngineResult<ProgramId> {
        self.gpu
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let program = self.build_program(desc);
        if let Some(error) = pollster::block_on(self.gpu.device.pop_error_scope()) {
            program.uniform_buffer.destroy();
            return Err(GpuError::ShaderError(format!("'{}': {}", desc.label, error)).into());
        }

        let id = ProgramId::from_raw(self.allocate_id());
        self.programs.insert(id, program);
        Ok(id)
    }

    fn release_program(&mut self, id: ProgramId) {
        if let Some(program) = self.programs.remove(&id) {
            program.uniform_buffer.destroy();
        }
    }

    fn write_uniforms(&mut self, program: ProgramId, bytes: &[u8]) -> EngineResult<()> {
        let program = self
            .programs
            .get(&program)
            .ok_or_else(|| GpuError::UnknownResource(format!("program {}", program.raw())))?;
        self.gpu
            .queue
            .write_buffer(&program.uniform_buffer, 0, bytes);
        Ok(())
    }

    fn render(&mut self, frame: &RenderFrame<'_>) -> EngineResult<()> {
        let surface = self
            .surface
            .as_ref()
            .ok_or_else(|| GpuError::SurfaceError("no surface attached".into()))?;

        // Resolve every id before recording so a bad frame records nothing
        let mut resolved = Vec::with_capacity(frame.draws.len());
        for draw in frame.draws {
            let program = self.programs.get(&draw.program).ok_or_else(|| {
                GpuError::UnknownResource(format!("program {}", draw.program.raw()))
            })?;
            let vertex_buffers = draw
                .vertex_buffers
                .iter()
                .map(|id| {
                    self.buffers
                        .get(id)
                        .ok_or_else(|| GpuError::UnknownResource(format!("buffer {}", id.raw())))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let index_buffer = draw
                .index_buffer
                .map(|id| {
                    self.buffers
                        .get(&id)
                        .ok_or_else(|| GpuError::UnknownResource(format!("buffer {}", id.raw())))
                })
                .transpose()?;
            resolved.push((draw, program, vertex_buffers, index_buffer));
        }

        let [r, g, b, a] = frame.clear.to_array();
        let mut encoder =
            self.gpu
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("Particle Field Encoder"),
                });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Particle Field Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface.color.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: f64::from(r),
                            g: f64::from(g),
                            b: f64::from(b),
                            a: f64::from(a),
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &surface.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            for (draw, program, vertex_buffers, index_buffer) in resolved {
                pass.set_pipeline(&program.pipeline);
                pass.set_bind_group(0, &program.bind_group, &[]);
                for (slot, buffer) in vertex_buffers.into_iter().enumerate() {
                    pass.set_vertex_buffer(slot as u32, buffer.slice(..));
                }
                match index_buffer {
                    Some(indices) => {
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..draw.element_count, 0, 0..draw.instance_count);
                    }
                    None => pass.draw(0..draw.element_count, 0..draw.instance_count),
                }
            }
        }
        self.gpu.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }
}

impl std::fmt::Debug for WgpuDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WgpuDevice")
            .field("surface", &self.surface.as_ref().map(|s| s.color.size))
            .field("buffers", &self.buffers.len())
            .field("programs", &self.programs.len())
            .finish_non_exhaustive()
    }
}
