//! egui overlay: the engine switch button and its help line.

use egui::{Context, FullOutput, ViewportId};
use nebula_engine::OverlayView;

/// egui state and renderer for the control overlay.
pub struct OverlayPainter {
    /// The egui context.
    context: Context,
    /// Egui-winit state for event handling.
    state: egui_winit::State,
    /// Egui-wgpu renderer.
    renderer: egui_wgpu::Renderer,
}

impl std::fmt::Debug for OverlayPainter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayPainter")
            .field("context", &"<egui::Context>")
            .field("state", &"<egui_winit::State>")
            .field("renderer", &"<egui_wgpu::Renderer>")
            .finish()
    }
}

impl OverlayPainter {
    /// Creates the painter for a window and render target format.
    #[must_use]
    pub fn new(
        device: &wgpu::Device,
        output_format: wgpu::TextureFormat,
        window: &winit::window::Window,
    ) -> Self {
        let context = Context::default();
        context.set_pixels_per_point(window.scale_factor() as f32);

        let state = egui_winit::State::new(
            context.clone(),
            ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(device, output_format, None, 1, false);

        Self {
            context,
            state,
            renderer,
        }
    }

    /// Feeds a window event to egui. Returns `true` if egui consumed it.
    pub fn handle_event(
        &mut self,
        window: &winit::window::Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Runs the UI closure for one frame.
    pub fn run(
        &mut self,
        window: &winit::window::Window,
        ui: impl FnOnce(&Context),
    ) -> FullOutput {
        let raw_input = self.state.take_egui_input(window);
        self.context.begin_pass(raw_input);
        ui(&self.context);
        let output = self.context.end_pass();
        self.state
            .handle_platform_output(window, output.platform_output.clone());
        output
    }

    /// Uploads textures and buffers. Call before the render pass begins.
    pub fn prepare(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        output: FullOutput,
    ) -> Vec<egui::ClippedPrimitive> {
        for (id, image_delta) in &output.textures_delta.set {
            self.renderer
                .update_texture(device, queue, *id, image_delta);
        }

        let paint_jobs = self
            .context
            .tessellate(output.shapes, output.pixels_per_point);

        self.renderer
            .update_buffers(device, queue, encoder, &paint_jobs, screen_descriptor);

        for id in &output.textures_delta.free {
            self.renderer.free_texture(id);
        }

        paint_jobs
    }

    /// Draws prepared paint jobs into a pass.
    pub fn render(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        paint_jobs: &[egui::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.renderer
            .render(render_pass, paint_jobs, screen_descriptor);
    }

    /// Screen descriptor for the current window size.
    #[must_use]
    pub fn screen_descriptor(&self, width: u32, height: u32) -> egui_wgpu::ScreenDescriptor {
        egui_wgpu::ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: self.context.pixels_per_point(),
        }
    }
}

/// Draws the overlay in the bottom-right corner. Returns whether the
/// switch button was clicked.
pub fn draw_overlay(ctx: &Context, view: &OverlayView, fps: f32) -> bool {
    let mut clicked = false;
    egui::Area::new(egui::Id::new("background_controls"))
        .anchor(egui::Align2::RIGHT_BOTTOM, egui::vec2(-16.0, -16.0))
        .show(ctx, |ui| {
            egui::Frame::popup(ui.style()).show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    let response = ui.button(view.button_label);
                    response.widget_info(|| {
                        egui::WidgetInfo::labeled(egui::WidgetType::Button, true, view.aria_label)
                    });
                    clicked = response.clicked();
                    ui.small(view.help_text);
                    ui.weak(format!("{fps:.0} fps"));
                });
            });
        });
    clicked
}
