//! winit window as the engines' host, and the factory for the wgpu backends.

use std::sync::Arc;

use nebula_common::{EngineError, EngineResult, FrameHandle, ListenerId};
use nebula_kernel::{
    GpuContext, HostWindow, LayerHost, ListenerKind, WgpuCanvasSurface, WgpuDevice,
};
use tracing::debug;
use winit::window::Window;

use nebula_engine::EngineFactory;

/// Host window backed by a winit window.
///
/// Listener registrations are bookkeeping only: the event loop forwards
/// every event to the controller, which filters by what is registered.
/// Frame requests become redraw requests.
#[derive(Debug)]
pub struct WindowHost {
    window: Arc<Window>,
    next_id: u32,
    listeners: Vec<(ListenerKind, ListenerId)>,
    pending_frames: Vec<FrameHandle>,
}

impl WindowHost {
    /// Wraps a window.
    #[must_use]
    pub fn new(window: Arc<Window>) -> Self {
        Self {
            window,
            next_id: 0,
            listeners: Vec::new(),
            pending_frames: Vec::new(),
        }
    }

    /// Takes the pending frame requests. Returns whether any were pending.
    pub fn take_frames(&mut self) -> bool {
        let due = !self.pending_frames.is_empty();
        self.pending_frames.clear();
        due
    }

    fn next(&mut self) -> u32 {
        self.next_id = self.next_id.wrapping_add(1);
        self.next_id
    }
}

impl HostWindow for WindowHost {
    fn inner_size(&self) -> (u32, u32) {
        let size = self.window.inner_size();
        (size.width, size.height)
    }

    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId {
        let id = ListenerId::from_raw(self.next());
        self.listeners.push((kind, id));
        debug!("Listener {:?} registered as {}", kind, id.raw());
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.listeners.retain(|(_, l)| *l != id);
    }

    fn request_frame(&mut self) -> FrameHandle {
        let handle = FrameHandle::from_raw(u64::from(self.next()));
        self.pending_frames.push(handle);
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        self.pending_frames.retain(|f| *f != handle);
    }
}

/// Builds wgpu canvas surfaces and devices drawing into the background
/// layer.
#[derive(Debug, Default)]
pub struct WgpuEngineFactory {
    gpu: Option<Arc<GpuContext>>,
    layer: LayerHost,
}

impl WgpuEngineFactory {
    /// A factory with no GPU yet. Construction defers until
    /// [`Self::set_gpu`] is called.
    #[must_use]
    pub fn new(layer: LayerHost) -> Self {
        Self { gpu: None, layer }
    }

    /// Provides the GPU context once the window and renderer exist.
    pub fn set_gpu(&mut self, gpu: Arc<GpuContext>) {
        self.gpu = Some(gpu);
    }

    fn gpu(&self) -> EngineResult<Arc<GpuContext>> {
        self.gpu
            .as_ref()
            .map(Arc::clone)
            .ok_or(EngineError::EnvironmentUnavailable)
    }
}

impl EngineFactory for WgpuEngineFactory {
    type Surface = WgpuCanvasSurface;
    type Device = WgpuDevice;

    fn surface_ready(&self) -> bool {
        self.gpu.is_some()
    }

    fn create_canvas(&mut self) -> EngineResult<WgpuCanvasSurface> {
        Ok(WgpuCanvasSurface::new(self.gpu()?, self.layer.clone()))
    }

    fn create_device(&mut self) -> EngineResult<WgpuDevice> {
        Ok(WgpuDevice::new(self.gpu()?, self.layer.clone()))
    }
}
