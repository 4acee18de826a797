//! CPU 2D particle background.
//!
//! A population of star glyphs over a slowly cycling gradient, attracted
//! by the pointer, with a pulsing additive circle at the center. One tick
//! runs per host animation frame.

use glam::Vec2;
use nebula_common::{EngineError, EngineResult, Hsl, Rgba};
use tracing::{debug, info, warn};

use crate::canvas::{Canvas2d, CanvasSurface, CompositeMode, LinearGradient};
use crate::host::{HostWindow, ListenerKind, Subscriptions};
use crate::lifecycle::{FrameTime, Lifecycle, TickOutcome};
use crate::particle::{ParticleEntity, GLOW_BLUR};
use crate::pool::{Particle2DSettings, ParticlePool};

/// Milliseconds per full turn of the background gradient hue.
const GRADIENT_PERIOD_MS: f64 = 10_000.0;

/// Base radius of the center pulse.
const PULSE_RADIUS: f32 = 50.0;

/// Radius swing of the center pulse.
const PULSE_SWING: f32 = 20.0;

struct Running2D<S> {
    surface: S,
    pool: ParticlePool,
    width: u32,
    height: u32,
    pending_resize: Option<(u32, u32)>,
    pointer: Vec2,
    subs: Subscriptions,
    frames: u64,
}

/// The 2D particle engine, generic over its drawing surface.
pub struct Particle2DEngine<S: CanvasSurface> {
    settings: Particle2DSettings,
    rng: fastrand::Rng,
    state: Lifecycle<Running2D<S>>,
}

impl<S: CanvasSurface> Particle2DEngine<S> {
    /// Creates an uninitialized engine. A seed makes spawning reproducible.
    #[must_use]
    pub fn new(settings: Particle2DSettings, seed: Option<u64>) -> Self {
        Self {
            settings,
            rng: seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed),
            state: Lifecycle::Uninitialized,
        }
    }

    /// Binds the surface, seeds the population, registers pointer and
    /// resize listeners and requests the first frame.
    ///
    /// On failure the surface is released and no loop is started.
    pub fn init(
        &mut self,
        host: &mut dyn HostWindow,
        mut surface: S,
        width: u32,
        height: u32,
    ) -> EngineResult<()> {
        match self.state {
            Lifecycle::Running(_) => {
                surface.release();
                return Err(EngineError::AlreadyInitialized);
            }
            Lifecycle::Disposed => {
                surface.release();
                return Err(EngineError::DisposedMisuse("init"));
            }
            Lifecycle::Uninitialized => {}
        }

        surface.set_size(width, height);
        if surface.context_2d().is_none() {
            surface.release();
            warn!("2D context unavailable, background disabled");
            return Err(EngineError::SurfaceUnavailable(
                "surface returned no 2D context".into(),
            ));
        }

        let pool = ParticlePool::seeded(&mut self.rng, width, height, &self.settings);
        let mut subs = Subscriptions::new();
        subs.listen(host, ListenerKind::PointerMove);
        subs.listen(host, ListenerKind::Resize);
        subs.schedule_frame(host);

        info!(
            "2D particle engine started: {}x{}, {} particles",
            width,
            height,
            pool.len()
        );

        self.state = Lifecycle::Running(Running2D {
            surface,
            pool,
            width,
            height,
            pending_resize: None,
            pointer: Vec2::ZERO,
            subs,
            frames: 0,
        });
        Ok(())
    }

    /// Queues new dimensions, applied at the next tick. Latest call wins.
    pub fn resize(&mut self, width: u32, height: u32) {
        match self.state.running_mut() {
            Some(run) => run.pending_resize = Some((width, height)),
            None => debug!("Ignoring resize on inactive 2D engine"),
        }
    }

    /// Records the pointer position in surface pixels.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if let Some(run) = self.state.running_mut() {
            run.pointer = Vec2::new(x, y);
        }
    }

    /// Simulates and draws one frame, then requests the next.
    pub fn tick(&mut self, host: &mut dyn HostWindow, now: FrameTime) -> TickOutcome {
        let Some(run) = self.state.running_mut() else {
            debug!("{}", EngineError::DisposedMisuse("tick"));
            return TickOutcome::Stopped;
        };
        run.subs.frame_delivered();

        if let Some((width, height)) = run.pending_resize.take() {
            run.width = width;
            run.height = height;
            run.surface.set_size(width, height);
            run.pool
                .reseed(&mut self.rng, width, height, &self.settings);
        }

        let (w, h) = (run.width as f32, run.height as f32);
        let pointer = run.pointer;

        let drawn = match run.surface.context_2d() {
            Some(ctx) => {
                paint_backdrop(ctx, now, w, h);
                for particle in run.pool.iter_mut() {
                    particle.step(pointer, w, h);
                    paint_particle(ctx, particle);
                }
                paint_pulse(ctx, now, w, h);
                true
            }
            None => {
                for particle in run.pool.iter_mut() {
                    particle.step(pointer, w, h);
                }
                false
            }
        };

        let outcome = if !drawn {
            debug!("2D context lost, frame skipped");
            TickOutcome::Skipped
        } else if let Err(e) = run.surface.present() {
            warn!("Failed to present 2D frame: {}", e);
            TickOutcome::Skipped
        } else {
            run.frames += 1;
            TickOutcome::Rendered
        };

        run.subs.schedule_frame(host);
        outcome
    }

    /// Cancels the pending frame, removes listeners and releases the
    /// surface. Safe to call more than once.
    pub fn dispose(&mut self, host: &mut dyn HostWindow) {
        match self.state.dispose() {
            Some(mut run) => {
                run.subs.release(host);
                run.surface.release();
                info!("2D particle engine disposed after {} frames", run.frames);
            }
            None => debug!("2D engine dispose with nothing to release"),
        }
    }

    /// Whether the engine is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    /// Whether the engine has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.state.is_disposed()
    }

    /// Live particle count, zero unless running.
    #[must_use]
    pub fn particle_count(&self) -> usize {
        self.state.running().map_or(0, |run| run.pool.len())
    }

    /// Current particles.
    #[must_use]
    pub fn particles(&self) -> &[ParticleEntity] {
        self.state.running().map_or(&[], |run| run.pool.as_slice())
    }

    /// Applied surface size.
    #[must_use]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.state.running().map(|run| (run.width, run.height))
    }

    /// Last known pointer position.
    #[must_use]
    pub fn pointer(&self) -> Option<Vec2> {
        self.state.running().map(|run| run.pointer)
    }

    /// Listener and frame bookkeeping.
    #[must_use]
    pub fn subscriptions(&self) -> Option<&Subscriptions> {
        self.state.running().map(|run| &run.subs)
    }

    /// The bound surface.
    #[must_use]
    pub fn surface(&self) -> Option<&S> {
        self.state.running().map(|run| &run.surface)
    }

    /// Frames presented so far.
    #[must_use]
    pub fn frames_rendered(&self) -> u64 {
        self.state.running().map_or(0, |run| run.frames)
    }
}

impl<S: CanvasSurface> std::fmt::Debug for Particle2DEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Particle2DEngine")
            .field("running", &self.is_running())
            .field("disposed", &self.is_disposed())
            .field("particles", &self.particle_count())
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

/// Gradient stops for time `now`: hue `c·360` and its complement.
#[must_use]
pub fn backdrop_colors(now: FrameTime) -> (Hsl, Hsl) {
    let turns = now.millis() / GRADIENT_PERIOD_MS;
    let hue = (turns * 360.0).rem_euclid(360.0) as f32;
    (Hsl::new(hue, 0.7, 0.05), Hsl::new(hue + 180.0, 0.7, 0.10))
}

/// Center pulse radius and alpha for time `now`.
#[must_use]
pub fn pulse_shape(now: FrameTime) -> (f32, f32) {
    let s = now.secs().sin() as f32;
    (PULSE_RADIUS + PULSE_SWING * s, 0.05 + 0.03 * s)
}

fn paint_backdrop<C: Canvas2d>(ctx: &mut C, now: FrameTime, w: f32, h: f32) {
    let (from, to) = backdrop_colors(now);
    let gradient = LinearGradient::two_stop(
        Vec2::ZERO,
        Vec2::new(w, h),
        from.with_alpha(1.0),
        to.with_alpha(1.0),
    );
    ctx.clear();
    ctx.fill_rect_gradient(Vec2::ZERO, Vec2::new(w, h), &gradient);
}

fn paint_particle<C: Canvas2d>(ctx: &mut C, particle: &ParticleEntity) {
    let outline = particle.star_outline();
    let color = particle.fill_color();

    ctx.save();
    ctx.translate(particle.position);
    ctx.rotate(particle.rotation);
    ctx.set_global_alpha(particle.opacity);
    ctx.fill_polygon(&outline, color);
    ctx.set_shadow(GLOW_BLUR, color);
    ctx.fill_polygon(&outline, color);
    ctx.restore();
}

fn paint_pulse<C: Canvas2d>(ctx: &mut C, now: FrameTime, w: f32, h: f32) {
    let (radius, alpha) = pulse_shape(now);
    ctx.save();
    ctx.set_composite(CompositeMode::Lighter);
    ctx.fill_circle(Vec2::new(w / 2.0, h / 2.0), radius, Rgba::WHITE.fade(alpha));
    ctx.restore();
}
