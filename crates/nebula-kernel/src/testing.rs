//! Resource-tracking doubles for the host, canvas and GPU device.
//!
//! Every double reports into a shared [`ResourceLedger`], so a test can
//! assert after any sequence of engine operations that nothing leaked.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use glam::Vec2;
use nebula_common::{
    BufferId, EngineError, EngineResult, FrameHandle, GpuError, ListenerId, ProgramId, Rgba,
    SurfaceId,
};

use crate::batch::TriangleBatch;
use crate::canvas::{Canvas2d, CanvasSurface, CompositeMode, LinearGradient};
use crate::gpu::device::{BufferDesc, BufferUsage, GpuDevice, ProgramDesc, ProgramKind, RenderFrame};
use crate::host::{HostWindow, ListenerKind};

/// Counters kept by a [`ResourceLedger`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedgerCounts {
    /// Canvas surfaces created and not yet released.
    pub live_canvases: usize,
    /// Canvas surfaces ever created.
    pub canvases_created: usize,
    /// Fill commands issued on any canvas.
    pub fills: u64,
    /// Canvas frames presented.
    pub presents: u64,
    /// GPU buffers allocated and not yet released.
    pub live_buffers: usize,
    /// GPU programs compiled and not yet released.
    pub live_programs: usize,
    /// GPU drawing surfaces attached to the layer.
    pub attached_surfaces: usize,
    /// GPU frames rendered.
    pub renders: u64,
}

/// Shared resource counters.
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    counts: Rc<RefCell<LedgerCounts>>,
}

impl ResourceLedger {
    /// Creates a ledger with all counters at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> LedgerCounts {
        *self.counts.borrow()
    }

    /// Whether every acquired resource has been released.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        let c = self.snapshot();
        c.live_canvases == 0
            && c.live_buffers == 0
            && c.live_programs == 0
            && c.attached_surfaces == 0
    }

    fn update(&self, f: impl FnOnce(&mut LedgerCounts)) {
        f(&mut self.counts.borrow_mut());
    }
}

/// A host window that records listeners and frame requests.
#[derive(Debug)]
pub struct TrackingHost {
    size: (u32, u32),
    next_id: u32,
    listeners: Vec<(ListenerKind, ListenerId)>,
    frames: Vec<FrameHandle>,
    frames_requested: u64,
    frames_cancelled: u64,
}

impl TrackingHost {
    /// Creates a host of the given inner size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            size: (width, height),
            next_id: 0,
            listeners: Vec::new(),
            frames: Vec::new(),
            frames_requested: 0,
            frames_cancelled: 0,
        }
    }

    /// Changes the reported inner size.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.size = (width, height);
    }

    /// Registered listeners.
    #[must_use]
    pub fn active_listeners(&self) -> usize {
        self.listeners.len()
    }

    /// Registered listeners of one kind.
    #[must_use]
    pub fn listeners_of(&self, kind: ListenerKind) -> usize {
        self.listeners.iter().filter(|(k, _)| *k == kind).count()
    }

    /// Frame requests not yet cancelled or delivered.
    #[must_use]
    pub fn pending_frames(&self) -> usize {
        self.frames.len()
    }

    /// Total frame requests.
    #[must_use]
    pub fn frames_requested(&self) -> u64 {
        self.frames_requested
    }

    /// Total frame cancellations.
    #[must_use]
    pub fn frames_cancelled(&self) -> u64 {
        self.frames_cancelled
    }

    /// Delivers all pending frames, as the host does before invoking the
    /// frame callbacks.
    pub fn deliver_frames(&mut self) -> usize {
        let n = self.frames.len();
        self.frames.clear();
        n
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl HostWindow for TrackingHost {
    fn inner_size(&self) -> (u32, u32) {
        self.size
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId::from_raw(self.next());
        self.listeners.push((kind, id));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(_, l)| *l != id);
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle::from_raw(u64::from(self.next()));
        self.frames.push(handle);
        self.frames_requested += 1;
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let before = self.frames.len();
        self.frames.retain(|f| *f != handle);
        if self.frames.len() != before {
            self.frames_cancelled += 1;
        }
    }
}

/// Turns a surface's context on and off from outside the engine.
#[derive(Debug, Clone)]
pub struct ContextSwitch(Rc<Cell<bool>>);

impl ContextSwitch {
    /// Sets whether a context is available.
    pub fn set(&self, available: bool) {
        self.0.set(available);
    }

    /// Whether a context is available.
    #[must_use]
    pub fn is_on(&self) -> bool {
        self.0.get()
    }
}

/// A 2D context that records triangles and counts fills.
#[derive(Debug)]
pub struct RecordingContext {
    batch: TriangleBatch,
    ledger: ResourceLedger,
}

impl RecordingContext {
    /// Triangles recorded since the last clear.
    #[must_use]
    pub fn batch(&self) -> &TriangleBatch {
        &self.batch
    }

    fn count_fill(&self) {
        self.ledger.update(|c| c.fills += 1);
    }
}

impl Canvas2d for RecordingContext {
    fn size(&self) -> (u32, u32) {
        self.batch.size()
    }

    fn clear(&mut self) {
        self.batch.clear();
    }

    fn fill_rect_gradient(&mut self, origin: Vec2, extent: Vec2, gradient: &LinearGradient) {
        self.count_fill();
        self.batch.fill_rect_gradient(origin, extent, gradient);
    }

    fn save(&mut self) {
        self.batch.save();
    }

    fn restore(&mut self) {
        self.batch.restore();
    }

    fn translate(&mut self, offset: Vec2) {
        self.batch.translate(offset);
    }

    fn rotate(&mut self, radians: f32) {
        self.batch.rotate(radians);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.batch.set_global_alpha(alpha);
    }

    fn set_composite(&mut self, mode: CompositeMode) {
        self.batch.set_composite(mode);
    }

    fn set_shadow(&mut self, blur: f32, color: Rgba) {
        self.batch.set_shadow(blur, color);
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Rgba) {
        self.count_fill();
        self.batch.fill_polygon(points, color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        self.count_fill();
        self.batch.fill_circle(center, radius, color);
    }
}

/// A canvas surface that reports its lifetime to a ledger.
#[derive(Debug)]
pub struct TrackingCanvas {
    id: SurfaceId,
    context: RecordingContext,
    available: ContextSwitch,
    released: bool,
}

impl TrackingCanvas {
    /// Creates a surface with a working context.
    #[must_use]
    pub fn new(ledger: &ResourceLedger) -> Self {
        ledger.update(|c| {
            c.live_canvases += 1;
            c.canvases_created += 1;
        });
        Self {
            id: SurfaceId::new(),
            context: RecordingContext {
                batch: TriangleBatch::new(0, 0),
                ledger: ledger.clone(),
            },
            available: ContextSwitch(Rc::new(Cell::new(true))),
            released: false,
        }
    }

    /// Creates a surface that never yields a 2D context.
    #[must_use]
    pub fn without_context(ledger: &ResourceLedger) -> Self {
        let canvas = Self::new(ledger);
        canvas.available.set(false);
        canvas
    }

    /// Handle for toggling context availability later.
    #[must_use]
    pub fn context_switch(&self) -> ContextSwitch {
        self.available.clone()
    }

    /// Current backing store size.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        self.context.batch.size()
    }

    /// Whether `release` has been called.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.released
    }

    /// The recording context, regardless of availability.
    #[must_use]
    pub fn recording(&self) -> &RecordingContext {
        &self.context
    }
}

impl CanvasSurface for TrackingCanvas {
    type Context = RecordingContext;

    fn surface_id(&self) -> SurfaceId {
        self.id
    }

    fn set_size(&mut self, width: u32, height: u32) {
        self.context.batch.set_size(width, height);
    }

    fn context_2d(&mut self) -> Option<&mut Self::Context> {
        (self.available.is_on() && !self.released).then_some(&mut self.context)
    }

    fn present(&mut self) -> EngineResult<()> {
        self.context.ledger.update(|c| c.presents += 1);
        Ok(())
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.context.ledger.update(|c| c.live_canvases -= 1);
        }
    }
}

/// A GPU device that validates ids and reports allocations to a ledger.
#[derive(Debug)]
pub struct TrackingDevice {
    ledger: ResourceLedger,
    context_available: bool,
    failing_program: Option<ProgramKind>,
    next_id: u32,
    surface: Option<(SurfaceId, u32, u32)>,
    buffers: HashMap<BufferId, (BufferUsage, usize)>,
    programs: HashMap<ProgramId, ProgramKind>,
    uniforms: HashMap<ProgramId, Vec<u8>>,
    last_frame: Option<(Rgba, usize)>,
}

impl TrackingDevice {
    /// Creates a device with a working context.
    #[must_use]
    pub fn new(ledger: &ResourceLedger) -> Self {
        Self {
            ledger: ledger.clone(),
            context_available: true,
            failing_program: None,
            next_id: 0,
            surface: None,
            buffers: HashMap::new(),
            programs: HashMap::new(),
            uniforms: HashMap::new(),
            last_frame: None,
        }
    }

    /// Creates a device whose surface can never be attached.
    #[must_use]
    pub fn without_context(ledger: &ResourceLedger) -> Self {
        Self {
            context_available: false,
            ..Self::new(ledger)
        }
    }

    /// Makes compilation of one program kind fail.
    #[must_use]
    pub fn failing_program(mut self, kind: ProgramKind) -> Self {
        self.failing_program = Some(kind);
        self
    }

    /// Attached surface size.
    #[must_use]
    pub fn surface_size(&self) -> Option<(u32, u32)> {
        self.surface.map(|(_, w, h)| (w, h))
    }

    /// Live buffers on this device.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Live buffers of one usage and their byte sizes.
    #[must_use]
    pub fn buffer_sizes(&self, usage: BufferUsage) -> Vec<usize> {
        let mut sizes: Vec<usize> = self
            .buffers
            .values()
            .filter(|(u, _)| *u == usage)
            .map(|(_, len)| *len)
            .collect();
        sizes.sort_unstable();
        sizes
    }

    /// Live programs on this device.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    /// Last uniform block written for a program.
    #[must_use]
    pub fn uniforms_of(&self, program: ProgramId) -> Option<&[u8]> {
        self.uniforms.get(&program).map(Vec::as_slice)
    }

    /// Clear color and draw count of the last rendered frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<(Rgba, usize)> {
        self.last_frame
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }
}

impl GpuDevice for TrackingDevice {
    fn attach_surface(&mut self, width: u32, height: u32) -> EngineResult<SurfaceId> {
        if !self.context_available {
            return Err(EngineError::ContextUnavailable(
                "no GPU adapter for this surface".into(),
            ));
        }
        if self.surface.is_some() {
            return Err(GpuError::InitFailed("surface already attached".into()).into());
        }
        let id = SurfaceId::new();
        self.surface = Some((id, width, height));
        self.ledger.update(|c| c.attached_surfaces += 1);
        Ok(id)
    }

    fn detach_surface(&mut self) {
        if self.surface.take().is_some() {
            self.ledger.update(|c| c.attached_surfaces -= 1);
        }
    }

    fn resize_surface(&mut self, width: u32, height: u32) {
        if let Some((id, _, _)) = self.surface {
            self.surface = Some((id, width, height));
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc<'_>, contents: &[u8]) -> EngineResult<BufferId> {
        if contents.is_empty() {
            return Err(GpuError::BufferAlloc(format!("'{}' is empty", desc.label)).into());
        }
        let id = BufferId::from_raw(self.next());
        self.buffers.insert(id, (desc.usage, contents.len()));
        self.ledger.update(|c| c.live_buffers += 1);
        Ok(id)
    }

    fn release_buffer(&mut self, id: BufferId) {
        if self.buffers.remove(&id).is_some() {
            self.ledger.update(|c| c.live_buffers -= 1);
        }
    }

    fn create_program(&mut self, desc: &ProgramDesc<'_>) -> EngineResult<ProgramId> {
        if self.failing_program == Some(desc.kind) {
            return Err(GpuError::ShaderError(format!("'{}' failed to compile", desc.label)).into());
        }
        let id = ProgramId::from_raw(self.next());
        self.programs.insert(id, desc.kind);
        self.ledger.update(|c| c.live_programs += 1);
        Ok(id)
    }

    fn release_program(&mut self, id: ProgramId) {
        if self.programs.remove(&id).is_some() {
            self.uniforms.remove(&id);
            self.ledger.update(|c| c.live_programs -= 1);
        }
    }

    fn write_uniforms(&mut self, program: ProgramId, bytes: &[u8]) -> EngineResult<()> {
        if !self.programs.contains_key(&program) {
            return Err(GpuError::UnknownResource(format!("{program:?}")).into());
        }
        self.uniforms.insert(program, bytes.to_vec());
        Ok(())
    }

    fn render(&mut self, frame: &RenderFrame<'_>) -> EngineResult<()> {
        if self.surface.is_none() {
            return Err(GpuError::SurfaceError("no surface attached".into()).into());
        }
        for draw in frame.draws {
            if !self.programs.contains_key(&draw.program) {
                return Err(GpuError::UnknownResource(format!("{:?}", draw.program)).into());
            }
            let buffers = draw.vertex_buffers.iter().chain(draw.index_buffer.iter());
            for id in buffers {
                if !self.buffers.contains_key(id) {
                    return Err(GpuError::UnknownResource(format!("{id:?}")).into());
                }
            }
        }
        self.last_frame = Some((frame.clear, frame.draws.len()));
        self.ledger.update(|c| c.renders += 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_release_is_counted_once() {
        let ledger = ResourceLedger::new();
        let mut canvas = TrackingCanvas::new(&ledger);
        assert_eq!(ledger.snapshot().live_canvases, 1);
        canvas.release();
        canvas.release();
        assert!(canvas.is_released());
        assert!(canvas.context_2d().is_none());
        assert!(ledger.is_clean());
    }

    #[test]
    fn test_device_rejects_second_surface() {
        let ledger = ResourceLedger::new();
        let mut device = TrackingDevice::new(&ledger);
        device.attach_surface(10, 10).expect("attach");
        let err = device.attach_surface(10, 10).expect_err("second surface");
        assert!(matches!(err, EngineError::Gpu(GpuError::InitFailed(_))));
        device.detach_surface();
        assert!(ledger.is_clean());
    }

    #[test]
    fn test_host_cancel_counts_only_pending() {
        let mut host = TrackingHost::new(1, 1);
        let frame = host.request_frame();
        host.cancel_frame(frame);
        host.cancel_frame(frame);
        assert_eq!(host.frames_cancelled(), 1);
        assert_eq!(host.pending_frames(), 0);
    }
}
