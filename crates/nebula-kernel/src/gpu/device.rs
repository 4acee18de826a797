//! GPU device abstraction used by the particle field.
//!
//! The field never touches wgpu directly. It allocates buffers and programs
//! through [`GpuDevice`], receives opaque ids, and describes each frame as
//! a list of [`DrawCall`]s. This keeps ownership explicit: every id handed
//! out must come back through a `release_*` call.

use nebula_common::{BufferId, EngineResult, ProgramId, Rgba, SurfaceId};
use tracing::debug;

/// How a buffer will be bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Per-vertex or per-instance attributes.
    Vertex,
    /// `u32` triangle indices.
    Index,
}

/// Buffer creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Binding usage.
    pub usage: BufferUsage,
}

/// Program families. Each fixes a vertex input layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKind {
    /// Instanced point sprites: position (vec3), color (vec3), size (f32)
    /// and rotation seed (f32) per instance, six generated vertices each.
    PointSprites,
    /// Indexed triangle mesh with a vec3 position per vertex.
    NebulaShell,
}

/// Color blending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    /// `src·alpha + dst`.
    Additive,
}

/// Which faces are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaceCulling {
    /// Draw both sides.
    None,
    /// Discard front faces, keeping the inside of closed meshes.
    Front,
}

/// Program creation parameters.
#[derive(Debug, Clone, Copy)]
pub struct ProgramDesc<'a> {
    /// Debug label.
    pub label: &'a str,
    /// Vertex layout family.
    pub kind: ProgramKind,
    /// WGSL source with `vs_main` and `fs_main` entry points.
    pub source: &'a str,
    /// Blend mode.
    pub blend: BlendMode,
    /// Face culling.
    pub culling: FaceCulling,
    /// Whether fragments write depth.
    pub depth_write: bool,
    /// Size in bytes of the program's uniform block.
    pub uniform_size: u64,
}

/// One draw of a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawCall {
    /// Program to draw with.
    pub program: ProgramId,
    /// Vertex buffers, in the order the program's layout expects.
    pub vertex_buffers: Vec<BufferId>,
    /// Index buffer for indexed draws.
    pub index_buffer: Option<BufferId>,
    /// Index count for indexed draws, vertex count otherwise.
    pub element_count: u32,
    /// Instance count.
    pub instance_count: u32,
}

/// Everything needed to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrame<'a> {
    /// Clear color.
    pub clear: Rgba,
    /// Draws in submission order.
    pub draws: &'a [DrawCall],
}

/// A GPU context bound to one drawing surface.
pub trait GpuDevice {
    /// Creates the drawing surface and attaches it to the host layer.
    /// Fails with `ContextUnavailable` if no GPU context can be created.
    fn attach_surface(&mut self, width: u32, height: u32) -> EngineResult<SurfaceId>;

    /// Detaches the drawing surface from the host layer.
    fn detach_surface(&mut self);

    /// Resizes the drawing surface.
    fn resize_surface(&mut self, width: u32, height: u32);

    /// Uploads an immutable buffer.
    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: &[u8]) -> EngineResult<BufferId>;

    /// Frees a buffer. Unknown ids are ignored.
    fn release_buffer(&mut self, id: BufferId);

    /// Compiles a program.
    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> EngineResult<ProgramId>;

    /// Frees a program. Unknown ids are ignored.
    fn release_program(&mut self, id: ProgramId);

    /// Replaces a program's uniform block.
    fn write_uniforms(&mut self, program: ProgramId, bytes: &[u8]) -> EngineResult<()>;

    /// Clears the surface and executes the draws.
    fn render(&mut self, frame: &RenderFrame<'_>) -> EngineResult<()>;
}

/// Ids allocated from a device, released together.
#[derive(Debug, Default)]
pub struct OwnedResources {
    buffers: Vec<BufferId>,
    programs: Vec<ProgramId>,
}

impl OwnedResources {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads a buffer and records its id.
    pub fn buffer<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        desc: &BufferDesc<'_>,
        contents: &[u8],
    ) -> EngineResult<BufferId> {
        let id = device.create_buffer(desc, contents)?;
        debug!("Created buffer '{}' ({} bytes)", desc.label, contents.len());
        self.buffers.push(id);
        Ok(id)
    }

    /// Compiles a program and records its id.
    pub fn program<D: GpuDevice + ?Sized>(
        &mut self,
        device: &mut D,
        desc: &ProgramDesc<'_>,
    ) -> EngineResult<ProgramId> {
        let id = device.create_program(desc)?;
        debug!("Compiled program '{}'", desc.label);
        self.programs.push(id);
        Ok(id)
    }

    /// Number of live buffers.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Number of live programs.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Releases everything recorded.
    pub fn release_all<D: GpuDevice + ?Sized>(&mut self, device: &mut D) {
        for id in self.buffers.drain(..) {
            device.release_buffer(id);
        }
        for id in self.programs.drain(..) {
            device.release_program(id);
        }
    }
}
