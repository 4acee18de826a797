//! Debug control overlay.
//!
//! A single button that switches engines plus a line of help text. Alt+B
//! shows and hides it; it never changes the engine by itself.

use nebula_kernel::EngineVariant;

/// Help text shown under the button.
pub const HELP_TEXT: &str = "Press Alt+B to toggle controls";

/// Button label for the active variant.
#[must_use]
pub const fn button_label(active: EngineVariant) -> &'static str {
    match active {
        EngineVariant::Particles2D => "Switch to 3D Background",
        EngineVariant::GpuField => "Switch to Particle Background",
    }
}

/// Accessible label for the active variant.
#[must_use]
pub const fn aria_label(active: EngineVariant) -> &'static str {
    match active {
        EngineVariant::Particles2D => "Switch to three.js background",
        EngineVariant::GpuField => "Switch to particles background",
    }
}

/// Overlay visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OverlayState {
    visible: bool,
}

impl OverlayState {
    /// Creates the overlay, shown or hidden.
    #[must_use]
    pub const fn new(visible: bool) -> Self {
        Self { visible }
    }

    /// Flips visibility and returns the new state.
    pub fn toggle(&mut self) -> bool {
        self.visible = !self.visible;
        self.visible
    }

    /// Whether the overlay is shown.
    #[must_use]
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// What to draw this frame, or `None` while hidden.
    #[must_use]
    pub fn view(&self, active: EngineVariant) -> Option<OverlayView> {
        self.visible.then(|| OverlayView {
            button_label: button_label(active),
            aria_label: aria_label(active),
            help_text: HELP_TEXT,
        })
    }
}

/// Text content of the visible overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayView {
    /// Button caption.
    pub button_label: &'static str,
    /// Accessible name of the button.
    pub aria_label: &'static str,
    /// Static help line.
    pub help_text: &'static str,
}
