//! Background controller.
//!
//! Mounts exactly one background engine, swaps engines on request, routes
//! host input to whichever engine is active and owns the control overlay.
//! Engines are built through an [`EngineFactory`] so that the same
//! controller drives the wgpu backends in the binary and the tracking
//! doubles in tests.

use nebula_common::{EngineError, EngineResult};
use nebula_kernel::{
    CanvasSurface, EngineVariant, FieldSettings, FrameTime, GpuDevice, GpuParticleField,
    HostWindow, Lifecycle, ListenerKind, Particle2DEngine, Particle2DSettings, Subscriptions,
    TickOutcome,
};
use tracing::{debug, info, warn};

use crate::adapters::{to_ndc, HostEvent};
use crate::overlay::{OverlayState, OverlayView};

/// Builds drawing surfaces and GPU devices for the engines.
pub trait EngineFactory {
    /// Canvas surface for the 2D engine.
    type Surface: CanvasSurface;
    /// Device for the GPU field.
    type Device: GpuDevice;

    /// Whether a renderable surface exists yet.
    fn surface_ready(&self) -> bool;

    /// Creates a canvas surface. `EnvironmentUnavailable` defers.
    fn create_canvas(&mut self) -> EngineResult<Self::Surface>;

    /// Creates a GPU device. `ContextUnavailable` means no GPU.
    fn create_device(&mut self) -> EngineResult<Self::Device>;
}

/// Controller settings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControllerSettings {
    /// Engine mounted first.
    pub initial: EngineVariant,
    /// Whether the overlay starts visible.
    pub overlay_visible: bool,
    /// Build the 2D engine when the GPU field cannot get a context.
    pub fallback_to_2d: bool,
    /// Seed for both engines; `None` seeds from entropy.
    pub seed: Option<u64>,
    /// 2D engine settings.
    pub particles: Particle2DSettings,
    /// GPU field settings.
    pub field: FieldSettings,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            initial: EngineVariant::Particles2D,
            overlay_visible: false,
            fallback_to_2d: true,
            seed: None,
            particles: Particle2DSettings::default(),
            field: FieldSettings::default(),
        }
    }
}

/// The engine currently bound to the layer.
pub enum ActiveEngine<F: EngineFactory> {
    /// CPU 2D particles.
    Particles(Particle2DEngine<F::Surface>),
    /// GPU point field.
    Field(GpuParticleField<F::Device>),
}

impl<F: EngineFactory> ActiveEngine<F> {
    fn variant(&self) -> EngineVariant {
        match self {
            Self::Particles(_) => EngineVariant::Particles2D,
            Self::Field(_) => EngineVariant::GpuField,
        }
    }

    fn subscriptions(&self) -> Option<&Subscriptions> {
        match self {
            Self::Particles(engine) => engine.subscriptions(),
            Self::Field(engine) => engine.subscriptions(),
        }
    }

    fn listens(&self, kind: ListenerKind) -> bool {
        self.subscriptions().is_some_and(|subs| subs.is_listening(kind))
    }

    fn tick(&mut self, host: &mut dyn HostWindow, now: FrameTime) -> TickOutcome {
        match self {
            Self::Particles(engine) => engine.tick(host, now),
            Self::Field(engine) => engine.tick(host, now),
        }
    }

    fn dispose(&mut self, host: &mut dyn HostWindow) {
        match self {
            Self::Particles(engine) => engine.dispose(host),
            Self::Field(engine) => engine.dispose(host),
        }
    }
}

/// Where engine construction stands.
enum EngineSlot<F: EngineFactory> {
    /// Waiting for a renderable surface.
    Pending,
    /// Bound and running.
    Running(ActiveEngine<F>),
    /// Construction failed; the background renders nothing.
    Failed,
}

struct Mounted<F: EngineFactory> {
    variant: EngineVariant,
    slot: EngineSlot<F>,
    keyboard: Subscriptions,
    overlay: OverlayState,
}

/// Mounts one background engine at a time and owns the overlay.
pub struct BackgroundController<F: EngineFactory> {
    factory: F,
    settings: ControllerSettings,
    state: Lifecycle<Mounted<F>>,
}

impl<F: EngineFactory> BackgroundController<F> {
    /// Creates an unmounted controller.
    #[must_use]
    pub fn new(factory: F, settings: ControllerSettings) -> Self {
        Self {
            factory,
            settings,
            state: Lifecycle::Uninitialized,
        }
    }

    /// Registers the keyboard listener and activates the initial variant.
    /// The engine itself is built once the factory reports a surface.
    pub fn mount(&mut self, host: &mut dyn HostWindow) {
        match self.state {
            Lifecycle::Running(_) => {
                debug!("{}", EngineError::AlreadyInitialized);
                return;
            }
            Lifecycle::Disposed => {
                debug!("{}", EngineError::DisposedMisuse("mount"));
                return;
            }
            Lifecycle::Uninitialized => {}
        }

        let mut keyboard = Subscriptions::new();
        keyboard.listen(host, ListenerKind::KeyDown);
        self.state = Lifecycle::Running(Mounted {
            variant: self.settings.initial,
            slot: EngineSlot::Pending,
            keyboard,
            overlay: OverlayState::new(self.settings.overlay_visible),
        });
        info!(
            "Background controller mounted with {}",
            self.settings.initial.name()
        );
        self.construct_pending(host);
    }

    /// Retries a deferred engine construction.
    pub fn on_environment_ready(&mut self, host: &mut dyn HostWindow) {
        if self.state.is_disposed() {
            debug!("{}", EngineError::DisposedMisuse("on_environment_ready"));
            return;
        }
        self.construct_pending(host);
    }

    /// Disposes the active engine completely, then builds the other one.
    pub fn toggle_engine(&mut self, host: &mut dyn HostWindow) {
        let Some(mounted) = self.state.running_mut() else {
            debug!("{}", EngineError::DisposedMisuse("toggle_engine"));
            return;
        };
        if let EngineSlot::Running(engine) = &mut mounted.slot {
            engine.dispose(host);
        }
        mounted.slot = EngineSlot::Pending;
        mounted.variant = mounted.variant.other();
        info!("Switching background to {}", mounted.variant.name());
        self.construct_pending(host);
    }

    /// Shows or hides the overlay. Returns the new visibility.
    pub fn toggle_overlay(&mut self) -> bool {
        match self.state.running_mut() {
            Some(mounted) => {
                let visible = mounted.overlay.toggle();
                debug!("Background controls {}", if visible { "shown" } else { "hidden" });
                visible
            }
            None => {
                debug!("{}", EngineError::DisposedMisuse("toggle_overlay"));
                false
            }
        }
    }

    /// The overlay button. Ignored while the overlay is hidden.
    pub fn click_overlay_button(&mut self, host: &mut dyn HostWindow) {
        let visible = self
            .state
            .running()
            .is_some_and(|mounted| mounted.overlay.is_visible());
        if visible {
            self.toggle_engine(host);
        } else {
            debug!("Overlay button clicked while hidden");
        }
    }

    /// Routes host input. Pointer and resize events reach the engine only
    /// if it listens for them; Alt+B reaches the overlay only while the
    /// keyboard listener is registered.
    pub fn handle_event(&mut self, host: &mut dyn HostWindow, event: HostEvent) {
        let Some(mounted) = self.state.running_mut() else {
            debug!("{}", EngineError::DisposedMisuse("handle_event"));
            return;
        };

        match event {
            HostEvent::KeyDown(press) => {
                if press.is_overlay_toggle() && mounted.keyboard.is_listening(ListenerKind::KeyDown)
                {
                    let visible = mounted.overlay.toggle();
                    debug!("Alt+B: controls {}", if visible { "shown" } else { "hidden" });
                }
            }
            HostEvent::PointerMove { x, y } => {
                let EngineSlot::Running(engine) = &mut mounted.slot else {
                    return;
                };
                if !engine.listens(ListenerKind::PointerMove) {
                    return;
                }
                match engine {
                    ActiveEngine::Particles(engine) => engine.on_pointer_move(x, y),
                    ActiveEngine::Field(engine) => {
                        let (w, h) = host.inner_size();
                        let (nx, ny) = to_ndc(x, y, w, h);
                        engine.on_pointer_move(nx, ny);
                    }
                }
            }
            HostEvent::Resize { width, height } => {
                let EngineSlot::Running(engine) = &mut mounted.slot else {
                    return;
                };
                if !engine.listens(ListenerKind::Resize) {
                    return;
                }
                match engine {
                    ActiveEngine::Particles(engine) => engine.resize(width, height),
                    ActiveEngine::Field(engine) => engine.resize(width, height),
                }
            }
        }
    }

    /// Delivers an animation frame. Deferred construction is retried first.
    pub fn on_animation_frame(&mut self, host: &mut dyn HostWindow, now: FrameTime) -> TickOutcome {
        if !self.state.is_running() {
            return TickOutcome::Stopped;
        }
        self.construct_pending(host);
        match self.state.running_mut().map(|mounted| &mut mounted.slot) {
            Some(EngineSlot::Running(engine)) => engine.tick(host, now),
            _ => TickOutcome::Stopped,
        }
    }

    /// Disposes the engine, removes the keyboard listener and retires the
    /// controller. Safe to call more than once.
    pub fn unmount(&mut self, host: &mut dyn HostWindow) {
        let Some(mut mounted) = self.state.dispose() else {
            debug!("{}", EngineError::DisposedMisuse("unmount"));
            return;
        };
        if let EngineSlot::Running(engine) = &mut mounted.slot {
            engine.dispose(host);
        }
        mounted.keyboard.release(host);
        info!("Background controller unmounted");
    }

    fn construct_pending(&mut self, host: &mut dyn HostWindow) {
        let Some(mounted) = self.state.running_mut() else {
            return;
        };
        if !matches!(mounted.slot, EngineSlot::Pending) {
            return;
        }
        if !self.factory.surface_ready() {
            debug!("{}, engine construction deferred", EngineError::EnvironmentUnavailable);
            return;
        }

        let settings = self.settings;
        let (width, height) = host.inner_size();
        let built = match mounted.variant {
            EngineVariant::Particles2D => {
                build_particles(&mut self.factory, host, &settings, width, height)
            }
            EngineVariant::GpuField => {
                match build_field(&mut self.factory, host, &settings, width, height) {
                    Err(e) if settings.fallback_to_2d && falls_back(&e) => {
                        warn!("GPU background unavailable ({}), falling back to 2D", e);
                        mounted.variant = EngineVariant::Particles2D;
                        build_particles(&mut self.factory, host, &settings, width, height)
                    }
                    other => other,
                }
            }
        };

        mounted.slot = match built {
            Ok(engine) => {
                debug!("{} bound to background layer", engine.variant().name());
                EngineSlot::Running(engine)
            }
            Err(e) if e.is_deferral() => {
                debug!("Engine construction deferred: {}", e);
                EngineSlot::Pending
            }
            Err(e) => {
                warn!("Background disabled: {}", e);
                EngineSlot::Failed
            }
        };
    }

    /// Whether the controller is mounted.
    #[must_use]
    pub fn is_mounted(&self) -> bool {
        self.state.is_running()
    }

    /// Whether the controller has been unmounted.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// The active variant, even while its engine is still deferred.
    #[must_use]
    pub fn active_variant(&self) -> Option<EngineVariant> {
        self.state.running().map(|mounted| mounted.variant)
    }

    /// The running engine, if one is bound.
    #[must_use]
    pub fn engine(&self) -> Option<&ActiveEngine<F>> {
        match self.state.running().map(|mounted| &mounted.slot) {
            Some(EngineSlot::Running(engine)) => Some(engine),
            _ => None,
        }
    }

    /// Whether construction is waiting for a surface.
    #[must_use]
    pub fn is_deferred(&self) -> bool {
        matches!(
            self.state.running().map(|mounted| &mounted.slot),
            Some(EngineSlot::Pending)
        )
    }

    /// Whether the last construction failed for good.
    #[must_use]
    pub fn has_failed(&self) -> bool {
        matches!(
            self.state.running().map(|mounted| &mounted.slot),
            Some(EngineSlot::Failed)
        )
    }

    /// Whether the overlay is shown.
    #[must_use]
    pub fn overlay_visible(&self) -> bool {
        self.state
            .running()
            .is_some_and(|mounted| mounted.overlay.is_visible())
    }

    /// What the overlay shows this frame.
    #[must_use]
    pub fn overlay_view(&self) -> Option<OverlayView> {
        self.state
            .running()
            .and_then(|mounted| mounted.overlay.view(mounted.variant))
    }

    /// The engine factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The engine factory, mutably.
    pub fn factory_mut(&mut self) -> &mut F {
        &mut self.factory
    }
}

impl<F: EngineFactory> std::fmt::Debug for BackgroundController<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundController")
            .field("mounted", &self.is_mounted())
            .field("disposed", &self.is_disposed())
            .field("variant", &self.active_variant())
            .field("engine_running", &self.engine().is_some())
            .field("overlay_visible", &self.overlay_visible())
            .finish()
    }
}

/// Errors that trigger the 2D fallback: no GPU context, or a device that
/// could not allocate the field's resources.
fn falls_back(error: &EngineError) -> bool {
    matches!(
        error,
        EngineError::ContextUnavailable(_) | EngineError::Gpu(_)
    )
}

fn build_particles<F: EngineFactory>(
    factory: &mut F,
    host: &mut dyn HostWindow,
    settings: &ControllerSettings,
    width: u32,
    height: u32,
) -> EngineResult<ActiveEngine<F>> {
    let surface = factory.create_canvas()?;
    let mut engine = Particle2DEngine::new(settings.particles, settings.seed);
    engine.init(host, surface, width, height)?;
    Ok(ActiveEngine::Particles(engine))
}

fn build_field<F: EngineFactory>(
    factory: &mut F,
    host: &mut dyn HostWindow,
    settings: &ControllerSettings,
    width: u32,
    height: u32,
) -> EngineResult<ActiveEngine<F>> {
    let device = factory.create_device()?;
    let mut engine = GpuParticleField::new(settings.field, settings.seed);
    engine.init(host, device, width, height)?;
    Ok(ActiveEngine::Field(engine))
}
