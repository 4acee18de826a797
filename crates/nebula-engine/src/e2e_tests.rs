//! End-to-end tests for the background controller.
//!
//! These drive the controller the way the window host does, with the
//! resource-tracking doubles standing in for the canvas, the GPU device and
//! the window, and check that nothing leaks across mounts and switches.

#![cfg(test)]

use glam::Vec2;
use nebula_common::{EngineError, EngineResult};
use nebula_kernel::testing::{ResourceLedger, TrackingCanvas, TrackingDevice, TrackingHost};
use nebula_kernel::{EngineVariant, FrameTime, ListenerKind, TickOutcome};

use crate::adapters::{HostEvent, KeyPress};
use crate::controller::{ActiveEngine, BackgroundController, ControllerSettings, EngineFactory};

/// Builds tracking doubles that all report to one ledger.
#[derive(Debug)]
struct TrackingFactory {
    ledger: ResourceLedger,
    ready: bool,
    gpu_available: bool,
    canvas_context: bool,
    canvases_built: usize,
    devices_built: usize,
}

impl TrackingFactory {
    fn new(ledger: &ResourceLedger) -> Self {
        Self {
            ledger: ledger.clone(),
            ready: true,
            gpu_available: true,
            canvas_context: true,
            canvases_built: 0,
            devices_built: 0,
        }
    }

    fn not_ready(mut self) -> Self {
        self.ready = false;
        self
    }

    fn without_gpu(mut self) -> Self {
        self.gpu_available = false;
        self
    }

    fn without_canvas_context(mut self) -> Self {
        self.canvas_context = false;
        self
    }
}

impl EngineFactory for TrackingFactory {
    type Surface = TrackingCanvas;
    type Device = TrackingDevice;

    fn surface_ready(&self) -> bool {
        self.ready
    }

    fn create_canvas(&mut self) -> EngineResult<TrackingCanvas> {
        if !self.ready {
            return Err(EngineError::EnvironmentUnavailable);
        }
        self.canvases_built += 1;
        Ok(if self.canvas_context {
            TrackingCanvas::new(&self.ledger)
        } else {
            TrackingCanvas::without_context(&self.ledger)
        })
    }

    fn create_device(&mut self) -> EngineResult<TrackingDevice> {
        if !self.ready {
            return Err(EngineError::EnvironmentUnavailable);
        }
        self.devices_built += 1;
        Ok(if self.gpu_available {
            TrackingDevice::new(&self.ledger)
        } else {
            TrackingDevice::without_context(&self.ledger)
        })
    }
}

fn settings() -> ControllerSettings {
    let mut settings = ControllerSettings {
        seed: Some(42),
        ..ControllerSettings::default()
    };
    settings.field.point_count = 256;
    settings
}

fn mounted(
    factory: TrackingFactory,
    settings: ControllerSettings,
) -> (BackgroundController<TrackingFactory>, TrackingHost) {
    let mut host = TrackingHost::new(1200, 800);
    let mut controller = BackgroundController::new(factory, settings);
    controller.mount(&mut host);
    (controller, host)
}

/// Delivers the pending frame and ticks, as the host's frame callback does.
fn frame(
    controller: &mut BackgroundController<TrackingFactory>,
    host: &mut TrackingHost,
    millis: f64,
) -> TickOutcome {
    host.deliver_frames();
    controller.on_animation_frame(host, FrameTime::from_millis(millis))
}

const ALT_B: HostEvent = HostEvent::KeyDown(KeyPress {
    letter: Some('b'),
    alt: true,
});

mod mount_tests {
    use super::*;

    #[test]
    fn e2e_mount_starts_2d_engine() {
        let ledger = ResourceLedger::new();
        let (controller, host) = mounted(TrackingFactory::new(&ledger), settings());

        assert_eq!(controller.active_variant(), Some(EngineVariant::Particles2D));
        let Some(ActiveEngine::Particles(engine)) = controller.engine() else {
            panic!("2D engine should be running after mount");
        };
        assert_eq!(engine.particle_count(), 106, "1200x800 seeds 106 particles");

        assert_eq!(host.listeners_of(ListenerKind::KeyDown), 1);
        assert_eq!(host.listeners_of(ListenerKind::PointerMove), 1);
        assert_eq!(host.listeners_of(ListenerKind::Resize), 1);
        assert_eq!(host.pending_frames(), 1, "exactly one frame pending");
        assert_eq!(ledger.snapshot().live_canvases, 1);
    }

    #[test]
    fn e2e_mount_defers_until_surface_exists() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) =
            mounted(TrackingFactory::new(&ledger).not_ready(), settings());

        assert!(controller.is_mounted());
        assert!(controller.is_deferred(), "no surface yet, construction deferred");
        assert!(controller.engine().is_none());
        assert_eq!(host.listeners_of(ListenerKind::KeyDown), 1);
        assert_eq!(host.pending_frames(), 0);

        assert_eq!(frame(&mut controller, &mut host, 16.0), TickOutcome::Stopped);
        assert_eq!(controller.factory().canvases_built, 0);

        controller.factory_mut().ready = true;
        controller.on_environment_ready(&mut host);
        assert!(controller.engine().is_some(), "engine built once the surface exists");
        assert_eq!(host.pending_frames(), 1);
    }

    #[test]
    fn e2e_deferred_construction_retried_on_frame() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) =
            mounted(TrackingFactory::new(&ledger).not_ready(), settings());
        assert_eq!(host.pending_frames(), 0, "nothing asks for a frame while deferred");

        controller.factory_mut().ready = true;
        assert_eq!(frame(&mut controller, &mut host, 16.0), TickOutcome::Rendered);
        assert!(controller.engine().is_some());
    }

    #[test]
    fn e2e_mount_twice_is_ignored() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        controller.mount(&mut host);

        assert_eq!(host.listeners_of(ListenerKind::KeyDown), 1);
        assert_eq!(ledger.snapshot().canvases_created, 1);
    }

    #[test]
    fn e2e_missing_2d_context_renders_nothing() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(
            TrackingFactory::new(&ledger).without_canvas_context(),
            settings(),
        );

        assert!(controller.has_failed());
        assert!(controller.engine().is_none());
        assert_eq!(ledger.snapshot().live_canvases, 0, "failed canvas released");
        assert_eq!(host.pending_frames(), 0);
        assert_eq!(frame(&mut controller, &mut host, 16.0), TickOutcome::Stopped);
        assert_eq!(ledger.snapshot().canvases_created, 1, "failure is not retried");
    }
}

mod switching_tests {
    use super::*;

    #[test]
    fn e2e_toggle_switches_to_gpu_field() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        controller.toggle_engine(&mut host);

        assert_eq!(controller.active_variant(), Some(EngineVariant::GpuField));
        assert!(matches!(controller.engine(), Some(ActiveEngine::Field(_))));
        let counts = ledger.snapshot();
        assert_eq!(counts.live_canvases, 0, "2D surface released before the switch");
        assert_eq!(counts.attached_surfaces, 1);
        assert_eq!(counts.live_buffers, 6);
        assert_eq!(counts.live_programs, 2);
        assert_eq!(host.pending_frames(), 1, "one engine, one pending frame");
        assert_eq!(host.active_listeners(), 3);
    }

    #[test]
    fn e2e_switch_back_and_forth_leaks_nothing() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        for i in 0..3 {
            frame(&mut controller, &mut host, f64::from(i) * 16.0);
            controller.toggle_engine(&mut host);
            frame(&mut controller, &mut host, f64::from(i) * 16.0 + 8.0);
            controller.toggle_engine(&mut host);
        }

        assert_eq!(controller.active_variant(), Some(EngineVariant::Particles2D));
        let counts = ledger.snapshot();
        assert_eq!(counts.live_canvases, 1);
        assert_eq!(counts.live_buffers, 0);
        assert_eq!(counts.live_programs, 0);
        assert_eq!(counts.attached_surfaces, 0);
        assert_eq!(host.active_listeners(), 3, "keyboard plus the 2D engine's two");
        assert_eq!(host.pending_frames(), 1);
    }

    #[test]
    fn e2e_gpu_unavailable_falls_back_to_2d() {
        let ledger = ResourceLedger::new();
        let settings = ControllerSettings {
            initial: EngineVariant::GpuField,
            ..settings()
        };
        let (controller, _host) = mounted(TrackingFactory::new(&ledger).without_gpu(), settings);

        assert_eq!(controller.active_variant(), Some(EngineVariant::Particles2D));
        assert!(matches!(controller.engine(), Some(ActiveEngine::Particles(_))));
        assert_eq!(ledger.snapshot().attached_surfaces, 0);
        assert_eq!(controller.factory().devices_built, 1);
    }

    #[test]
    fn e2e_gpu_unavailable_without_fallback_renders_nothing() {
        let ledger = ResourceLedger::new();
        let settings = ControllerSettings {
            initial: EngineVariant::GpuField,
            fallback_to_2d: false,
            ..settings()
        };
        let (mut controller, mut host) =
            mounted(TrackingFactory::new(&ledger).without_gpu(), settings);

        assert!(controller.has_failed());
        assert_eq!(controller.active_variant(), Some(EngineVariant::GpuField));
        assert_eq!(frame(&mut controller, &mut host, 16.0), TickOutcome::Stopped);
        assert_eq!(host.active_listeners(), 1, "only the keyboard listener");
        assert!(ledger.is_clean());

        // switching away from a failed engine still works
        controller.toggle_engine(&mut host);
        assert!(matches!(controller.engine(), Some(ActiveEngine::Particles(_))));
    }
}

mod overlay_tests {
    use super::*;

    #[test]
    fn e2e_alt_b_toggles_overlay_only() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());
        assert!(!controller.overlay_visible(), "overlay starts hidden");

        controller.handle_event(&mut host, ALT_B);

        assert!(controller.overlay_visible());
        assert_eq!(controller.active_variant(), Some(EngineVariant::Particles2D));
        assert_eq!(ledger.snapshot().canvases_created, 1, "engine untouched");

        controller.handle_event(&mut host, ALT_B);
        assert!(!controller.overlay_visible());
    }

    #[test]
    fn e2e_plain_b_does_nothing() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        controller.handle_event(&mut host, HostEvent::KeyDown(KeyPress::letter('b', false)));

        assert!(!controller.overlay_visible());
    }

    #[test]
    fn e2e_overlay_button_switches_engine() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());
        controller.toggle_overlay();

        let view = controller.overlay_view().expect("overlay visible");
        assert_eq!(view.button_label, "Switch to 3D Background");
        assert_eq!(view.help_text, "Press Alt+B to toggle controls");

        controller.click_overlay_button(&mut host);

        assert_eq!(controller.active_variant(), Some(EngineVariant::GpuField));
        let view = controller.overlay_view().expect("overlay still visible");
        assert_eq!(view.button_label, "Switch to Particle Background");
        assert_eq!(view.aria_label, "Switch to particles background");
    }

    #[test]
    fn e2e_hidden_button_cannot_be_clicked() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        controller.click_overlay_button(&mut host);

        assert_eq!(controller.active_variant(), Some(EngineVariant::Particles2D));
        assert!(controller.overlay_view().is_none());
    }
}

mod routing_tests {
    use super::*;

    #[test]
    fn e2e_pointer_reaches_2d_engine_in_pixels() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        controller.handle_event(&mut host, HostEvent::PointerMove { x: 300.0, y: 200.0 });

        let Some(ActiveEngine::Particles(engine)) = controller.engine() else {
            panic!("2D engine should be running");
        };
        assert_eq!(engine.pointer(), Some(Vec2::new(300.0, 200.0)));
    }

    #[test]
    fn e2e_pointer_reaches_gpu_field_in_ndc() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());
        controller.toggle_engine(&mut host);

        controller.handle_event(&mut host, HostEvent::PointerMove { x: 0.0, y: 0.0 });

        let Some(ActiveEngine::Field(field)) = controller.engine() else {
            panic!("GPU field should be running");
        };
        assert_eq!(field.pointer(), Some(Vec2::new(-1.0, 1.0)));
    }

    #[test]
    fn e2e_resize_applies_at_next_frame() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        host.set_size(600, 400);
        controller.handle_event(&mut host, HostEvent::Resize { width: 900, height: 900 });
        controller.handle_event(&mut host, HostEvent::Resize { width: 600, height: 400 });

        let Some(ActiveEngine::Particles(engine)) = controller.engine() else {
            panic!("2D engine should be running");
        };
        assert_eq!(engine.size(), Some((1200, 800)), "resize waits for the tick");

        frame(&mut controller, &mut host, 16.0);

        let Some(ActiveEngine::Particles(engine)) = controller.engine() else {
            panic!("2D engine should be running");
        };
        assert_eq!(engine.size(), Some((600, 400)), "latest resize wins");
        assert_eq!(engine.particle_count(), 26);
    }

    #[test]
    fn e2e_frames_render_continuously() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());

        for i in 0..10 {
            assert_eq!(
                frame(&mut controller, &mut host, f64::from(i) * 16.7),
                TickOutcome::Rendered
            );
            assert_eq!(host.pending_frames(), 1);
        }
        assert_eq!(ledger.snapshot().presents, 10);
    }
}

mod unmount_tests {
    use super::*;

    #[test]
    fn e2e_unmount_releases_everything() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());
        controller.toggle_engine(&mut host);
        frame(&mut controller, &mut host, 16.0);

        controller.unmount(&mut host);

        assert!(controller.is_disposed());
        assert!(ledger.is_clean());
        assert_eq!(host.active_listeners(), 0);
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn e2e_calls_after_unmount_are_ignored() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) = mounted(TrackingFactory::new(&ledger), settings());
        controller.unmount(&mut host);
        let requested = host.frames_requested();
        let presents = ledger.snapshot().presents;

        assert_eq!(frame(&mut controller, &mut host, 16.0), TickOutcome::Stopped);
        controller.handle_event(&mut host, ALT_B);
        controller.handle_event(&mut host, HostEvent::PointerMove { x: 1.0, y: 1.0 });
        controller.toggle_engine(&mut host);
        controller.mount(&mut host);
        controller.unmount(&mut host);

        assert_eq!(host.frames_requested(), requested, "no frame requested");
        assert_eq!(ledger.snapshot().presents, presents, "nothing drawn");
        assert_eq!(ledger.snapshot().canvases_created, 1);
        assert!(!controller.overlay_visible());
        assert!(ledger.is_clean());
    }

    #[test]
    fn e2e_unmount_while_deferred() {
        let ledger = ResourceLedger::new();
        let (mut controller, mut host) =
            mounted(TrackingFactory::new(&ledger).not_ready(), settings());

        controller.unmount(&mut host);

        assert_eq!(host.active_listeners(), 0);
        controller.factory_mut().ready = true;
        controller.on_environment_ready(&mut host);
        assert!(controller.engine().is_none());
        assert_eq!(ledger.snapshot().canvases_created, 0);
    }
}
