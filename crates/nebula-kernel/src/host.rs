//! Host window abstraction.
//!
//! Engines never talk to a windowing system directly. They register
//! listeners and request animation frames through [`HostWindow`], and keep
//! every handle they receive in a [`Subscriptions`] ledger so that dispose
//! can hand all of them back.

use nebula_common::{FrameHandle, ListenerId};
use tracing::debug;

/// Kinds of host events an engine or controller can listen for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    /// Pointer moved over the window.
    PointerMove,
    /// Window was resized.
    Resize,
    /// Key pressed.
    KeyDown,
}

/// The host environment: window size, event listeners and the native
/// animation-frame facility.
pub trait HostWindow {
    /// Current inner size of the window in physical pixels.
    fn inner_size(&self) -> (u32, u32);

    /// Registers interest in an event kind.
    fn add_listener(&mut self, kind: ListenerKind) -> ListenerId;

    /// Removes a previously registered listener. Unknown ids are ignored.
    fn remove_listener(&mut self, id: ListenerId);

    /// Schedules one frame callback at the host's refresh rate.
    fn request_frame(&mut self) -> FrameHandle;

    /// Cancels a pending frame callback. Unknown handles are ignored.
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// Listener registrations and the pending frame owned by one engine.
#[derive(Debug, Default)]
pub struct Subscriptions {
    listeners: Vec<(ListenerKind, ListenerId)>,
    pending_frame: Option<FrameHandle>,
}

impl Subscriptions {
    /// Creates an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener with the host and records it.
    pub fn listen(&mut self, host: &mut dyn HostWindow, kind: ListenerKind) {
        if self.is_listening(kind) {
            return;
        }
        let id = host.add_listener(kind);
        self.listeners.push((kind, id));
    }

    /// Whether a listener of this kind is registered.
    #[must_use]
    pub fn is_listening(&self, kind: ListenerKind) -> bool {
        self.listeners.iter().any(|(k, _)| *k == kind)
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Requests the next frame unless one is already pending.
    pub fn schedule_frame(&mut self, host: &mut dyn HostWindow) {
        if self.pending_frame.is_none() {
            self.pending_frame = Some(host.request_frame());
        }
    }

    /// Marks the pending frame as delivered. Called at the start of a tick.
    pub fn frame_delivered(&mut self) -> Option<FrameHandle> {
        self.pending_frame.take()
    }

    /// The frame request currently outstanding, if any.
    #[must_use]
    pub const fn pending_frame(&self) -> Option<FrameHandle> {
        self.pending_frame
    }

    /// Cancels the pending frame and removes every listener.
    pub fn release(&mut self, host: &mut dyn HostWindow) {
        if let Some(handle) = self.pending_frame.take() {
            host.cancel_frame(handle);
        }
        for (kind, id) in self.listeners.drain(..) {
            debug!("Removing {:?} listener {:?}", kind, id);
            host.remove_listener(id);
        }
    }
}
