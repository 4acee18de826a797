//! CPU particle model for the 2D background.
//!
//! Each particle drifts with a constant-ish velocity, is pulled toward the
//! pointer when close, wraps around the surface edges and slowly cycles
//! its hue. Units are surface pixels and frames.

use std::f32::consts::TAU;

use glam::Vec2;
use nebula_common::{Hsl, Rgba};

/// Speed limit in pixels per frame.
pub const MAX_SPEED: f32 = 2.0;

/// Distance beyond an edge at which a particle re-enters on the other side.
pub const WRAP_MARGIN: f32 = 50.0;

/// Pointer attraction only acts inside this radius.
pub const ATTRACTION_RADIUS: f32 = 200.0;

/// Magnitude of the per-frame pointer impulse.
pub const ATTRACTION_STRENGTH: f32 = 0.5;

/// Hue advance per frame, in degrees.
pub const HUE_STEP: f32 = 0.5;

/// Number of points of the star glyph.
pub const STAR_SPIKES: usize = 5;

/// Glow blur radius of the second fill pass, in pixels.
pub const GLOW_BLUR: f32 = 15.0;

/// Saturation a particle's color settles to after the first hue step.
pub const SETTLED_SATURATION: f32 = 0.7;

/// Lightness a particle's color settles to after the first hue step.
pub const SETTLED_LIGHTNESS: f32 = 0.6;

/// A single star-shaped particle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleEntity {
    /// Position in surface pixels.
    pub position: Vec2,
    /// Outer radius of the star, `[5, 15)`.
    pub size: f32,
    /// Velocity in pixels per frame.
    pub velocity: Vec2,
    /// Current color.
    pub color: Hsl,
    /// Opacity, `[0.2, 0.8)`, fixed at spawn.
    pub opacity: f32,
    /// Rotation in radians.
    pub rotation: f32,
    /// Rotation per frame, `[-0.01, 0.01)`, fixed at spawn.
    pub rotation_speed: f32,
}

impl ParticleEntity {
    /// Spawns a particle uniformly over a `width × height` surface.
    pub fn spawn(rng: &mut fastrand::Rng, width: f32, height: f32) -> Self {
        Self {
            position: Vec2::new(rng.f32() * width, rng.f32() * height),
            size: rng.f32() * 10.0 + 5.0,
            velocity: Vec2::new(rng.f32() * 2.0 - 1.0, rng.f32() * 2.0 - 1.0),
            color: psychedelic_color(rng),
            opacity: rng.f32() * 0.6 + 0.2,
            rotation: rng.f32() * TAU,
            rotation_speed: rng.f32() * 0.02 - 0.01,
        }
    }

    /// Current speed.
    #[must_use]
    pub fn speed(&self) -> f32 {
        self.velocity.length()
    }

    /// Moves by one frame of velocity and spins.
    pub fn integrate(&mut self) {
        self.position += self.velocity;
        self.rotation += self.rotation_speed;
    }

    /// Pulls toward `pointer` if it is close enough. Returns whether an
    /// impulse was applied.
    pub fn attract_to(&mut self, pointer: Vec2) -> bool {
        let delta = pointer - self.position;
        let distance = delta.length();
        if distance >= ATTRACTION_RADIUS || distance <= f32::EPSILON {
            return false;
        }
        self.velocity += delta * (ATTRACTION_STRENGTH / distance);
        true
    }

    /// Toroidal wrap with [`WRAP_MARGIN`].
    pub fn wrap(&mut self, width: f32, height: f32) {
        self.position.x = wrap_axis(self.position.x, width);
        self.position.y = wrap_axis(self.position.y, height);
    }

    /// Scales the velocity down to [`MAX_SPEED`] if needed.
    pub fn clamp_speed(&mut self) {
        self.velocity = self.velocity.clamp_length_max(MAX_SPEED);
    }

    /// Advances the hue by [`HUE_STEP`] and settles saturation and lightness.
    pub fn advance_hue(&mut self) {
        self.color = Hsl::new(
            self.color.hue + HUE_STEP,
            SETTLED_SATURATION,
            SETTLED_LIGHTNESS,
        );
    }

    /// One frame of simulation: integrate, attract, wrap, clamp, recolor.
    pub fn step(&mut self, pointer: Vec2, width: f32, height: f32) {
        self.integrate();
        self.attract_to(pointer);
        self.wrap(width, height);
        self.clamp_speed();
        self.advance_hue();
    }

    /// Star outline in local coordinates: alternating outer and inner
    /// vertices, vertex `i` at angle `2π·i/10`.
    #[must_use]
    pub fn star_outline(&self) -> [Vec2; STAR_SPIKES * 2] {
        let step = TAU / (STAR_SPIKES * 2) as f32;
        std::array::from_fn(|i| {
            let radius = if i % 2 == 0 { self.size } else { self.size / 2.0 };
            Vec2::from_angle(i as f32 * step) * radius
        })
    }

    /// Fill color. Opacity is applied as global alpha by the renderer.
    #[must_use]
    pub fn fill_color(&self) -> Rgba {
        self.color.with_alpha(1.0)
    }
}

fn wrap_axis(value: f32, extent: f32) -> f32 {
    if value < -WRAP_MARGIN {
        extent + WRAP_MARGIN
    } else if value > extent + WRAP_MARGIN {
        -WRAP_MARGIN
    } else {
        value
    }
}

/// Random saturated color: hue in whole degrees `[0, 360)`, saturation
/// `[70, 100)`%, lightness `[50, 70)`%.
pub fn psychedelic_color(rng: &mut fastrand::Rng) -> Hsl {
    Hsl::new(
        rng.u32(0..360) as f32,
        rng.u32(70..100) as f32 / 100.0,
        rng.u32(50..70) as f32 / 100.0,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn particle_at(x: f32, y: f32) -> ParticleEntity {
        ParticleEntity {
            position: Vec2::new(x, y),
            size: 10.0,
            velocity: Vec2::ZERO,
            color: Hsl::new(10.0, 0.8, 0.5),
            opacity: 0.5,
            rotation: 0.0,
            rotation_speed: 0.0,
        }
    }

    #[test]
    fn test_spawn_ranges() {
        let mut rng = fastrand::Rng::with_seed(42);
        for _ in 0..500 {
            let p = ParticleEntity::spawn(&mut rng, 1200.0, 800.0);
            assert!((0.0..1200.0).contains(&p.position.x));
            assert!((0.0..800.0).contains(&p.position.y));
            assert!((5.0..15.0).contains(&p.size));
            assert!((0.2..0.8).contains(&p.opacity));
            assert!((-0.01..0.01).contains(&p.rotation_speed));
            assert!(p.velocity.x.abs() <= 1.0 && p.velocity.y.abs() <= 1.0);
            assert_eq!(p.color.hue.fract(), 0.0);
        }
    }

    #[test]
    fn test_pointer_attraction_radius() {
        let pointer = Vec2::ZERO;
        let mut near = particle_at(100.0, 100.0);
        let mut far = particle_at(1000.0, 1000.0);

        assert!(near.attract_to(pointer));
        assert!(!far.attract_to(pointer));

        assert!((near.speed() - ATTRACTION_STRENGTH).abs() < 1e-5);
        assert!(near.velocity.x < 0.0 && near.velocity.y < 0.0);
        assert_eq!(far.velocity, Vec2::ZERO);
    }

    #[test]
    fn test_pointer_on_particle_has_no_effect() {
        let mut p = particle_at(5.0, 5.0);
        assert!(!p.attract_to(Vec2::new(5.0, 5.0)));
        assert!(p.velocity.is_finite());
    }

    #[test]
    fn test_wrap_all_edges() {
        let (w, h) = (800.0, 600.0);
        let mut p = particle_at(w + 51.0, 10.0);
        p.wrap(w, h);
        assert_eq!(p.position.x, -WRAP_MARGIN);

        let mut p = particle_at(-51.0, 10.0);
        p.wrap(w, h);
        assert_eq!(p.position.x, w + WRAP_MARGIN);

        let mut p = particle_at(10.0, h + 51.0);
        p.wrap(w, h);
        assert_eq!(p.position.y, -WRAP_MARGIN);

        let mut p = particle_at(10.0, -51.0);
        p.wrap(w, h);
        assert_eq!(p.position.y, h + WRAP_MARGIN);

        let mut p = particle_at(w + 50.0, -50.0);
        p.wrap(w, h);
        assert_eq!(p.position, Vec2::new(w + 50.0, -50.0));
    }

    #[test]
    fn test_hue_advances_and_settles() {
        let mut p = particle_at(0.0, 0.0);
        p.color = Hsl::new(359.75, 0.9, 0.55);
        p.advance_hue();
        assert!((p.color.hue - 0.25).abs() < 1e-3);
        assert_eq!(p.color.saturation, SETTLED_SATURATION);
        assert_eq!(p.color.lightness, SETTLED_LIGHTNESS);
    }

    #[test]
    fn test_star_outline_alternates_radius() {
        let p = particle_at(0.0, 0.0);
        let outline = p.star_outline();
        assert_eq!(outline.len(), 10);
        for (i, v) in outline.iter().enumerate() {
            let expected = if i % 2 == 0 { 10.0 } else { 5.0 };
            assert!((v.length() - expected).abs() < 1e-4);
        }
        assert!((outline[0] - Vec2::new(10.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_step_spins() {
        let mut p = particle_at(100.0, 100.0);
        p.rotation_speed = 0.005;
        p.step(Vec2::new(5000.0, 5000.0), 800.0, 600.0);
        assert!((p.rotation - 0.005).abs() < 1e-7);
    }

    proptest! {
        #[test]
        fn speed_bounded_after_step(
            x in -100.0f32..1300.0,
            y in -100.0f32..900.0,
            vx in -10.0f32..10.0,
            vy in -10.0f32..10.0,
            px in 0.0f32..1200.0,
            py in 0.0f32..800.0,
        ) {
            let mut p = particle_at(x, y);
            p.velocity = Vec2::new(vx, vy);
            p.step(Vec2::new(px, py), 1200.0, 800.0);
            prop_assert!(p.speed() <= MAX_SPEED + 1e-4);
        }

        #[test]
        fn position_stays_inside_margin_band(
            seed in any::<u64>(),
            frames in 1usize..300,
        ) {
            let (w, h) = (640.0, 480.0);
            let mut rng = fastrand::Rng::with_seed(seed);
            let mut p = ParticleEntity::spawn(&mut rng, w, h);
            for _ in 0..frames {
                p.step(Vec2::ZERO, w, h);
                prop_assert!(p.position.x >= -WRAP_MARGIN && p.position.x <= w + WRAP_MARGIN);
                prop_assert!(p.position.y >= -WRAP_MARGIN && p.position.y <= h + WRAP_MARGIN);
            }
        }
    }
}
