//! Application lifecycle management.
//!
//! Event loop wiring the background controller to a winit window.

use std::sync::Arc;

use anyhow::Result;
use nebula_kernel::{LayerHost, TickOutcome};
use tracing::{debug, info, warn};
use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::ModifiersState,
    window::{Window, WindowId},
};

use nebula_engine::{adapters::translate_window_event, BackgroundController, NebulaConfig};

use crate::renderer::Compositor;
use crate::timing::{FpsCounter, FrameClock};
use crate::ui::draw_overlay;
use crate::window_host::{WgpuEngineFactory, WindowHost};

/// Application state.
struct NebulaApp {
    /// Configuration
    config: NebulaConfig,
    /// Window handle (created after resume)
    window: Option<Arc<Window>>,
    /// Compositor (initialized after window creation)
    compositor: Option<Compositor>,
    /// Host adapter for the engines
    host: Option<WindowHost>,
    /// Background engine owner
    controller: BackgroundController<WgpuEngineFactory>,
    /// Layer the engines draw into
    layer: LayerHost,
    /// Frame timestamps
    clock: FrameClock,
    /// FPS counter for the overlay
    fps_counter: FpsCounter,
    /// Current keyboard modifiers
    modifiers: ModifiersState,
}

impl NebulaApp {
    fn new(config: NebulaConfig) -> Self {
        let layer = LayerHost::new();
        let controller = BackgroundController::new(
            WgpuEngineFactory::new(layer.clone()),
            config.controller_settings(),
        );
        Self {
            config,
            window: None,
            compositor: None,
            host: None,
            controller,
            layer,
            clock: FrameClock::new(),
            fps_counter: FpsCounter::new(),
            modifiers: ModifiersState::empty(),
        }
    }

    fn redraw(&mut self) {
        let (Some(window), Some(host)) = (&self.window, &mut self.host) else {
            return;
        };

        let requested = host.take_frames();
        if background_frame_due(requested, self.controller.is_deferred()) {
            let outcome = self.controller.on_animation_frame(host, self.clock.now());
            if outcome == TickOutcome::Skipped {
                debug!("Background frame skipped");
            }
        }

        let Some(compositor) = &mut self.compositor else {
            return;
        };
        let (fps, _) = self.fps_counter.tick();
        let view = self.controller.overlay_view();
        let mut clicked = false;
        let result = compositor.render(window, &self.layer, |ctx| {
            if let Some(view) = &view {
                clicked = draw_overlay(ctx, view, fps);
            }
        });
        if let Err(e) = result {
            warn!("Render error: {e:#}");
        }
        if clicked {
            self.controller.click_overlay_button(host);
        }
    }
}

/// Whether a redraw runs a background frame: the engine asked for one, or
/// construction is still waiting and nothing will ask until it succeeds.
fn background_frame_due(requested: bool, deferred: bool) -> bool {
    requested || deferred
}

impl ApplicationHandler for NebulaApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        info!("Application resumed, creating window...");

        let window_attrs = Window::default_attributes()
            .with_title("Nebula")
            .with_inner_size(PhysicalSize::new(
                self.config.window_width,
                self.config.window_height,
            ));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                warn!("Failed to create window: {e}");
                event_loop.exit();
                return;
            }
        };
        info!("Window created successfully");

        match pollster::block_on(Compositor::new(Arc::clone(&window), self.config.vsync)) {
            Ok(compositor) => {
                self.controller.factory_mut().set_gpu(compositor.gpu());
                self.compositor = Some(compositor);
            }
            Err(e) => warn!("Failed to initialize compositor: {e:#}"),
        }

        let mut host = WindowHost::new(Arc::clone(&window));
        self.clock.reset();
        if self.controller.is_mounted() {
            self.controller.on_environment_ready(&mut host);
        } else {
            self.controller.mount(&mut host);
        }
        self.host = Some(host);
        window.request_redraw();
        self.window = Some(window);

        info!(
            "Nebula ready - {}x{}",
            self.config.window_width, self.config.window_height
        );
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let consumed = match (&self.window, &mut self.compositor) {
            (Some(window), Some(compositor)) => compositor.handle_overlay_event(window, &event),
            _ => false,
        };

        if let WindowEvent::ModifiersChanged(modifiers) = &event {
            self.modifiers = modifiers.state();
        }

        if !consumed {
            if let (Some(host), Some(host_event)) = (
                &mut self.host,
                translate_window_event(&event, self.modifiers),
            ) {
                self.controller.handle_event(host, host_event);
            }
        }

        match event {
            WindowEvent::CloseRequested => {
                info!("Close requested, shutting down...");
                if let Some(host) = &mut self.host {
                    self.controller.unmount(host);
                }
                if let Err(e) = self.config.save() {
                    warn!("Failed to save config: {e}");
                }
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(compositor) = &mut self.compositor {
                    compositor.resize(new_size);
                }
                self.config.window_width = new_size.width;
                self.config.window_height = new_size.height;
            }
            WindowEvent::RedrawRequested => {
                self.redraw();
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            _ => {}
        }
    }
}

/// Runs the application.
pub fn run() -> Result<()> {
    let mut config = NebulaConfig::load();
    config.validate();

    info!("Configuration loaded:");
    info!("  Window: {}x{}", config.window_width, config.window_height);
    info!("  VSync: {}", config.vsync);
    info!("  Initial engine: {}", config.initial_engine.name());

    info!("Creating event loop...");
    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = NebulaApp::new(config);

    info!("Starting event loop...");
    event_loop.run_app(&mut app)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deferred_mount_gets_frames_without_requests() {
        assert!(background_frame_due(false, true));
        assert!(background_frame_due(true, false));
        assert!(!background_frame_due(false, false));
    }
}
