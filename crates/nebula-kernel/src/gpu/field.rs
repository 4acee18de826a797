//! GPU 3D particle field.
//!
//! Ten thousand additive point sprites drifting inside a noise nebula,
//! with the whole scene turning gently toward the pointer.

use glam::Vec2;
use nebula_common::{EngineError, EngineResult, SurfaceId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::device::GpuDevice;
use super::point_cloud::{GpuPointCloud, CLOUD_RADIUS, POINT_COUNT};
use super::scene::SceneState;
use crate::host::{HostWindow, ListenerKind, Subscriptions};
use crate::lifecycle::{FrameTime, Lifecycle, TickOutcome};

/// Settings for the GPU field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldSettings {
    /// Number of points in the cloud.
    pub point_count: usize,
    /// Radius of the ball the points spawn in.
    pub cloud_radius: f32,
    /// Device pixels per sprite pixel.
    pub pixel_ratio: f32,
}

impl Default for FieldSettings {
    fn default() -> Self {
        Self {
            point_count: POINT_COUNT,
            cloud_radius: CLOUD_RADIUS,
            pixel_ratio: 1.0,
        }
    }
}

struct RunningField<D> {
    device: D,
    surface: SurfaceId,
    cloud: GpuPointCloud,
    scene: SceneState,
    width: u32,
    height: u32,
    pending_resize: Option<(u32, u32)>,
    pointer: Vec2,
    subs: Subscriptions,
    frames: u64,
}

/// The GPU particle field, generic over its device.
pub struct GpuParticleField<D: GpuDevice> {
    settings: FieldSettings,
    rng: fastrand::Rng,
    state: Lifecycle<RunningField<D>>,
}

impl<D: GpuDevice> GpuParticleField<D> {
    /// Creates an uninitialized field. A seed makes the cloud reproducible.
    #[must_use]
    pub fn new(settings: FieldSettings, seed: Option<u64>) -> Self {
        Self {
            settings,
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
            state: Lifecycle::Uninitialized,
        }
    }

    /// Attaches the device's surface, builds the scene, registers listeners
    /// and requests the first frame.
    ///
    /// Fails with `ContextUnavailable` if the device has no GPU context. On
    /// any failure the surface is detached and nothing stays allocated.
    pub fn init(
        &mut self,
        host: &mut dyn HostWindow,
        mut device: D,
        width: u32,
        height: u32,
    ) -> EngineResult<()> {
        match self.state {
            Lifecycle::Running(_) => return Err(EngineError::AlreadyInitialized),
            Lifecycle::Disposed => return Err(EngineError::DisposedMisuse("init")),
            Lifecycle::Uninitialized => {}
        }

        let surface = device.attach_surface(width, height).map_err(|e| {
            warn!("GPU field unavailable: {}", e);
            e
        })?;

        let cloud = GpuPointCloud::generate(
            &mut self.rng,
            self.settings.point_count,
            self.settings.cloud_radius,
        );
        let scene = match SceneState::build(
            &mut device,
            &cloud,
            (width, height),
            self.settings.pixel_ratio,
        ) {
            Ok(scene) => scene,
            Err(e) => {
                device.detach_surface();
                warn!("Failed to build GPU scene: {}", e);
                return Err(e);
            }
        };

        let mut subs = Subscriptions::new();
        subs.listen(host, ListenerKind::PointerMove);
        subs.listen(host, ListenerKind::Resize);
        subs.schedule_frame(host);

        info!(
            "GPU particle field started: {}x{}, {} points",
            width,
            height,
            cloud.len()
        );

        self.state = Lifecycle::Running(RunningField {
            device,
            surface,
            cloud,
            scene,
            width,
            height,
            pending_resize: None,
            pointer: Vec2::ZERO,
            subs,
            frames: 0,
        });
        Ok(())
    }

    /// Queues new dimensions for the next tick. No-op unless running.
    pub fn resize(&mut self, width: u32, height: u32) {
        match self.state.running_mut() {
            Some(run) => run.pending_resize = Some((width, height)),
            None => debug!("Ignoring resize on inactive GPU field"),
        }
    }

    /// Records the pointer in normalized device coordinates.
    pub fn on_pointer_move(&mut self, ndc_x: f32, ndc_y: f32) {
        if let Some(run) = self.state.running_mut() {
            run.pointer = Vec2::new(ndc_x, ndc_y);
        }
    }

    /// Renders one frame at `now` and requests the next.
    pub fn tick(&mut self, host: &mut dyn HostWindow, now: FrameTime) -> TickOutcome {
        let Some(run) = self.state.running_mut() else {
            debug!("{}", EngineError::DisposedMisuse("tick"));
            return TickOutcome::Stopped;
        };
        run.subs.frame_delivered();

        if let Some((width, height)) = run.pending_resize.take() {
            run.width = width;
            run.height = height;
            run.device.resize_surface(width, height);
            run.scene.set_viewport(width, height);
            debug!("GPU field resized to {}x{}", width, height);
        }

        let t = now.secs() as f32;
        run.scene.update(run.pointer, t);

        let outcome = match run.scene.render(&mut run.device, t) {
            Ok(()) => {
                run.frames += 1;
                TickOutcome::Rendered
            }
            Err(e) => {
                warn!("GPU field frame skipped: {}", e);
                TickOutcome::Skipped
            }
        };

        run.subs.schedule_frame(host);
        outcome
    }

    /// Releases buffers and programs, detaches the surface, removes
    /// listeners and cancels the pending frame. Safe to call more than once.
    pub fn dispose(&mut self, host: &mut dyn HostWindow) {
        match self.state.dispose() {
            Some(mut run) => {
                run.scene.release(&mut run.device);
                run.device.detach_surface();
                run.subs.release(host);
                info!(
                    "GPU particle field disposed after {} frames (surface {})",
                    run.frames,
                    run.surface.raw()
                );
            }
            None => debug!("GPU field dispose with nothing to release"),
        }
    }

    /// Whether the field is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Whether the field has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Points in the cloud, zero unless running.
    #[must_use]
    pub fn point_count(&self) -> usize {
        self.state.running().map_or(0, |run| run.cloud.len())
    }

    /// The point cloud.
    #[must_use]
    pub fn cloud(&self) -> Option<&GpuPointCloud> {
        self.state.running().map(|run| &run.cloud)
    }

    /// Scene state.
    #[must_use]
    pub fn scene(&self) -> Option<&SceneState> {
        self.state.running().map(|run| &run.scene)
    }

    /// The bound device.
    #[must_use]
    pub fn device(&self) -> Option<&D> {
        self.state.running().map(|run| &run.device)
    }

    /// Applied surface size.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.state.running().map(|run| (run.width, run.height))
    }

    /// Last pointer position in NDC.
    #[must_use]
    pub fn pointer(&self) -> Option<Vec2> {
        self.state.running().map(|run| run.pointer)
    }

    /// Listener and frame bookkeeping.
    #[must_use]
    pub fn subscriptions(&self) -> Option<&Subscriptions> {
        self.state.running().map(|run| &run.subs)
    }

    /// Frames rendered so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.state.running().map_or(0, |run| run.frames)
    }
}

impl<D: GpuDevice> std::fmt::Debug for GpuParticleField<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuParticleField")
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .field("points", &self.point_count())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::scene::CLEAR_COLOR;
    use crate::testing::{ResourceLedger, TrackingDevice, TrackingHost};

    fn small_field() -> GpuParticleField<TrackingDevice> {
        GpuParticleField::new(
            FieldSettings {
                point_count: 256,
                ..FieldSettings::default()
            },
            Some(2),
        )
    }

    fn frame(
        field: &mut GpuParticleField<TrackingDevice>,
        host: &mut TrackingHost,
        now: FrameTime,
    ) -> TickOutcome {
        host.deliver_frames();
        field.tick(host, now)
    }

    #[test]
    fn test_default_settings() {
        let s = FieldSettings::default();
        assert_eq!(s.point_count, 10_000);
        assert_eq!(s.cloud_radius, 500.0);
    }

    #[test]
    fn test_init_allocates_scene() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(1024, 768);
        let mut field = small_field();

        field
            .init(&mut host, TrackingDevice::new(&ledger), 1024, 768)
            .expect("init");

        let counts = ledger.snapshot();
        assert_eq!(counts.attached_surfaces, 1);
        assert_eq!(counts.live_buffers, 6);
        assert_eq!(counts.live_programs, 2);
        assert_eq!(host.active_listeners(), 2);
        assert_eq!(host.pending_frames(), 1);
        assert_eq!(field.point_count(), 256);
    }

    #[test]
    fn test_init_without_context() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(1024, 768);
        let mut field = small_field();

        let err = field
            .init(&mut host, TrackingDevice::without_context(&ledger), 1024, 768)
            .expect_err("no context");

        assert!(matches!(err, EngineError::ContextUnavailable(_)));
        assert!(ledger.is_clean());
        assert_eq!(host.active_listeners(), 0);
        assert_eq!(host.pending_frames(), 0);
    }

    #[test]
    fn test_shader_failure_detaches_surface() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(1024, 768);
        let mut field = small_field();
        let device =
            TrackingDevice::new(&ledger).failing_program(crate::gpu::device::ProgramKind::PointSprites);

        let err = field.init(&mut host, device, 1024, 768).expect_err("shader");

        assert!(matches!(err, EngineError::Gpu(_)));
        assert!(ledger.is_clean());
        assert!(!field.is_running());
    }

    #[test]
    fn test_tick_renders_and_eases_rotation() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(800, 600);
        let mut field = small_field();
        field
            .init(&mut host, TrackingDevice::new(&ledger), 800, 600)
            .expect("init");
        field.on_pointer_move(1.0, -1.0);

        let outcome = frame(&mut field, &mut host, FrameTime::from_secs(1.0));

        assert_eq!(outcome, TickOutcome::Rendered);
        assert_eq!(host.pending_frames(), 1);
        assert_eq!(ledger.snapshot().renders, 1);
        let device = field.device().expect("device");
        assert_eq!(device.last_frame(), Some((CLEAR_COLOR, 2)));
        let rotation = field.scene().expect("scene").rotation();
        assert!(rotation.y > 0.0 && rotation.x < 0.0);
    }

    #[test]
    fn test_resize_updates_camera_at_tick() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(800, 600);
        let mut field = small_field();
        field
            .init(&mut host, TrackingDevice::new(&ledger), 800, 600)
            .expect("init");

        field.resize(1000, 1000);
        field.resize(1200, 600);
        assert_eq!(field.size(), Some((800, 600)));

        frame(&mut field, &mut host, FrameTime::from_secs(0.5));

        assert_eq!(field.size(), Some((1200, 600)));
        assert_eq!(field.scene().map(|s| s.camera().aspect), Some(2.0));
        assert_eq!(
            field.device().and_then(TrackingDevice::surface_size),
            Some((1200, 600))
        );
    }

    #[test]
    fn test_dispose_releases_everything() {
        let ledger = ResourceLedger::new();
        let mut host = TrackingHost::new(800, 600);
        let mut field = small_field();
        field
            .init(&mut host, TrackingDevice::new(&ledger), 800, 600)
            .expect("init");
        frame(&mut field, &mut host, FrameTime::from_secs(0.1));

        field.dispose(&mut host);
        let renders = ledger.snapshot().renders;

        assert!(ledger.is_clean());
        assert_eq!(host.active_listeners(), 0);
        assert_eq!(host.pending_frames(), 0);

        assert_eq!(
            field.tick(&mut host, FrameTime::from_secs(0.2)),
            TickOutcome::Stopped
        );
        field.resize(10, 10);
        field.dispose(&mut host);
        assert_eq!(ledger.snapshot().renders, renders);
        assert_eq!(host.pending_frames(), 0);
        assert!(field.is_disposed());
        assert!(matches!(
            field.init(&mut host, TrackingDevice::new(&ledger), 800, 600),
            Err(EngineError::DisposedMisuse("init"))
        ));
    }
}
