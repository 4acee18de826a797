//! CPU reference of the field's shader math.
//!
//! These functions mirror the WGSL in [`super::shaders`] one to one. The
//! GPU never calls them; they exist so the per-vertex and per-fragment
//! behavior can be unit tested without a device.

use glam::{Vec2, Vec3, Vec4};

/// Amplitude of the per-point drift, in world units.
pub const DRIFT_AMPLITUDE: f32 = 10.0;

/// Numerator of the perspective size attenuation.
pub const SIZE_ATTENUATION: f32 = 300.0;

/// Smallest sprite-center distance used, to keep the falloff finite.
pub const MIN_SPRITE_DISTANCE: f32 = 1e-4;

/// Depth of the sprite brightness pulse, `1 + depth·sin(2t)`.
pub const PULSE_DEPTH: f32 = 0.3;

/// Nebula density above which clouds brighten toward white.
pub const SPARKLE_THRESHOLD: f32 = 0.7;

/// Brightening per unit of density above the threshold.
pub const SPARKLE_GAIN: f32 = 3.0;

/// Nebula alpha per unit of density.
pub const NEBULA_ALPHA: f32 = 0.3;

/// GLSL-style `fract`: `x - floor(x)`, always in `[0, 1)`.
#[must_use]
pub fn fract(x: f32) -> f32 {
    x - x.floor()
}

fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Displaced position of a point stored at `p`, at time `t` seconds.
#[must_use]
pub fn displace(p: Vec3, t: f32) -> Vec3 {
    let n = (p.x * 0.05 + t).sin() * (p.y * 0.05 + t).cos() * (p.z * 0.05 + t).sin();
    p + Vec3::new(
        (t * 0.5 + p.z * 0.02).sin() * DRIFT_AMPLITUDE,
        (t * 0.4 + p.x * 0.01).cos() * DRIFT_AMPLITUDE,
        n * DRIFT_AMPLITUDE,
    )
}

/// Sprite size in pixels for a point of `size` at view-space depth `view_z`
/// (negative in front of the camera).
#[must_use]
pub fn point_size_px(size: f32, view_z: f32) -> f32 {
    size * (SIZE_ATTENUATION / -view_z)
}

/// Color of one sprite fragment.
///
/// `point_coord` is the fragment's position inside the sprite, `(0,0)` at
/// one corner and `(1,1)` at the other. The result is premultiplied by
/// `strength`, with `strength` as alpha.
#[must_use]
pub fn point_fragment(base: Vec3, point_coord: Vec2, t: f32) -> Vec4 {
    let dist = (point_coord - Vec2::splat(0.5))
        .length()
        .max(MIN_SPRITE_DISTANCE);
    let strength = 0.05 / dist * (1.0 + PULSE_DEPTH * (t * 2.0).sin());

    let color = Vec3::new(
        base.x + 0.2 * (t * 2.0 + base.y * 5.0).sin(),
        base.y + 0.2 * (t * 1.5 + base.z * 5.0).cos(),
        base.z + 0.2 * (t + base.x * 5.0).sin(),
    );

    let hue = t * 0.1 + dist * 2.0;
    let glow = Vec3::new(hue.cos(), (hue + 2.0).cos(), (hue + 4.0).cos()) * 0.5 + 0.5;

    (color.lerp(glow, 0.5) * strength).extend(strength)
}

/// Hash of a 2D lattice point into `[0, 1)`.
#[must_use]
pub fn rand2(n: Vec2) -> f32 {
    fract(n.dot(Vec2::new(12.9898, 4.1414)).sin() * 43758.5453)
}

/// Smoothstep-interpolated value noise, squared.
#[must_use]
pub fn value_noise(p: Vec2) -> f32 {
    let ip = p.floor();
    let f = p - ip;
    let u = f * f * (Vec2::splat(3.0) - 2.0 * f);

    let res = mix(
        mix(rand2(ip), rand2(ip + Vec2::X), u.x),
        mix(rand2(ip + Vec2::Y), rand2(ip + Vec2::ONE), u.x),
        u.y,
    );
    res * res
}

/// Density of the nebula at object-space `position`, in `[0, 1)`.
#[must_use]
pub fn nebula_density(position: Vec3, t: f32) -> f32 {
    let q = position.normalize_or_zero() * 5.0;
    let s = t * 0.1;
    value_noise(Vec2::new(q.x + s, q.y - s))
        * value_noise(Vec2::new(q.z - s, q.x + s))
        * value_noise(Vec2::new(q.y + s, q.z - s))
}

/// Color of a nebula fragment at object-space `position`.
#[must_use]
pub fn nebula_fragment(position: Vec3, t: f32) -> Vec4 {
    nebula_color(nebula_density(position, t), t)
}

/// Nebula color for density `n` at time `t`.
#[must_use]
pub fn nebula_color(n: f32, t: f32) -> Vec4 {
    let s = t * 0.1;
    let c1 = Vec3::new(s.sin(), (s + 2.0).sin(), (s + 4.0).sin()) * 0.5 + 0.5;
    let c2 = Vec3::new((s + 1.0).cos(), (s + 3.0).cos(), (s + 5.0).cos()) * 0.5 + 0.5;

    let mut rgb = c1.lerp(c2, n);
    if n > SPARKLE_THRESHOLD {
        rgb += Vec3::splat((n - SPARKLE_THRESHOLD) * SPARKLE_GAIN);
    }
    rgb.extend(NEBULA_ALPHA * n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_displace_at_origin() {
        let d = displace(Vec3::ZERO, 0.0);
        // sin(0)=0, cos(0)=1, noise term sin(0)·cos(0)·sin(0)=0
        assert!((d - Vec3::new(0.0, 10.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_displacement_is_bounded() {
        for i in 0..100 {
            let p = Vec3::new(i as f32 * 7.0 - 350.0, 120.0, -40.0 + i as f32);
            let d = displace(p, i as f32 * 0.37) - p;
            assert!(d.x.abs() <= 10.0 + 1e-4);
            assert!(d.y.abs() <= 10.0 + 1e-4);
            assert!(d.z.abs() <= 10.0 + 1e-4);
        }
    }

    #[test]
    fn test_point_size_attenuates_with_depth() {
        assert!((point_size_px(2.0, -300.0) - 2.0).abs() < 1e-6);
        assert!((point_size_px(2.0, -600.0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_point_fragment_falls_off_from_center() {
        let base = Vec3::new(0.3, 0.6, 0.9);
        let near = point_fragment(base, Vec2::new(0.55, 0.5), 0.0);
        let far = point_fragment(base, Vec2::new(0.95, 0.5), 0.0);
        assert!((near.w - 1.0).abs() < 1e-4);
        assert!(near.w > far.w);
        // premultiplied: rgb scales with alpha
        assert!(near.x > far.x);
    }

    #[test]
    fn test_point_fragment_center_is_finite() {
        let c = point_fragment(Vec3::ONE, Vec2::splat(0.5), 1.0);
        assert!(c.is_finite());
    }

    #[test]
    fn test_fract_negative() {
        assert!((fract(-0.25) - 0.75).abs() < 1e-6);
        assert!((fract(2.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_noise_matches_lattice_at_integers() {
        let p = Vec2::new(3.0, -2.0);
        let r = rand2(p);
        assert!((value_noise(p) - r * r).abs() < 1e-5);
    }

    #[test]
    fn test_nebula_alpha_tracks_density() {
        let pos = Vec3::new(100.0, -250.0, 700.0);
        let c = nebula_fragment(pos, 4.0);
        let n = nebula_density(pos, 4.0);
        assert!((c.w - 0.3 * n).abs() < 1e-6);
        // only direction matters
        assert!((nebula_density(pos * 3.0, 4.0) - n).abs() < 1e-4);
    }

    #[test]
    fn test_point_fragment_pulse() {
        let base = Vec3::new(0.2, 0.4, 0.6);
        let coord = Vec2::new(0.55, 0.5);
        let rest = point_fragment(base, coord, 0.0);
        let peak = point_fragment(base, coord, std::f32::consts::FRAC_PI_4);
        // dist 0.05: strength 1.0 at rest, 1.3 at the pulse peak
        assert!((rest.w - 1.0).abs() < 1e-4);
        assert!((peak.w - 1.3).abs() < 1e-4);
    }

    #[test]
    fn test_nebula_sparkle_only_above_threshold() {
        let s = 0.0f32;
        let c1 = Vec3::new(s.sin(), (s + 2.0).sin(), (s + 4.0).sin()) * 0.5 + 0.5;
        let c2 = Vec3::new((s + 1.0).cos(), (s + 3.0).cos(), (s + 5.0).cos()) * 0.5 + 0.5;

        let below = nebula_color(0.5, 0.0);
        assert!((below.truncate() - c1.lerp(c2, 0.5)).length() < 1e-5);
        assert!((below.w - 0.15).abs() < 1e-6);

        let at = nebula_color(SPARKLE_THRESHOLD, 0.0);
        assert!((at.truncate() - c1.lerp(c2, SPARKLE_THRESHOLD)).length() < 1e-5);

        let above = nebula_color(0.9, 0.0);
        let expected = c1.lerp(c2, 0.9) + Vec3::splat(0.6);
        assert!((above.truncate() - expected).length() < 1e-5);
    }

    #[test]
    fn test_wgsl_uses_the_same_constants() {
        use crate::gpu::shaders::{NEBULA_SHADER, POINT_SHADER};

        let point = [
            format!("sin(t * 0.5 + p.z * 0.02) * {DRIFT_AMPLITUDE:.1}"),
            format!("cos(t * 0.4 + p.x * 0.01) * {DRIFT_AMPLITUDE:.1}"),
            format!("({SIZE_ATTENUATION:.1} / -mv.z)"),
            format!("{MIN_SPRITE_DISTANCE:.4})"),
            format!("1.0 + {PULSE_DEPTH:.1} * sin(t * 2.0)"),
        ];
        for snippet in &point {
            assert!(POINT_SHADER.contains(snippet.as_str()), "missing `{snippet}`");
        }

        let nebula = [
            format!("n > {SPARKLE_THRESHOLD:.1}"),
            format!("(n - {SPARKLE_THRESHOLD:.1}) * {SPARKLE_GAIN:.1}"),
            format!("{NEBULA_ALPHA:.1} * n"),
            "vec2<f32>(12.9898, 4.1414)".to_owned(),
            "43758.5453".to_owned(),
        ];
        for snippet in &nebula {
            assert!(NEBULA_SHADER.contains(snippet.as_str()), "missing `{snippet}`");
        }
    }

    proptest! {
        #[test]
        fn noise_in_unit_range(x in -100.0f32..100.0, y in -100.0f32..100.0) {
            let n = value_noise(Vec2::new(x, y));
            prop_assert!((0.0..=1.0).contains(&n));
        }
    }
}
