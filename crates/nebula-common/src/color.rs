//! Color types used by both engines.
//!
//! Particles carry their color as HSL so the hue can be cycled cheaply;
//! everything handed to a renderer is converted to linear RGBA floats.

use std::fmt;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// HSL color. Hue in degrees, saturation and lightness in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hsl {
    /// Hue in degrees, kept in `[0, 360)`.
    pub hue: f32,
    /// Saturation (0.0-1.0).
    pub saturation: f32,
    /// Lightness (0.0-1.0).
    pub lightness: f32,
}

/// Wraps degrees into `[0, 360)`. `rem_euclid` rounds tiny negative
/// inputs up to exactly 360.
fn wrap_hue(degrees: f32) -> f32 {
    let wrapped = degrees.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

impl Hsl {
    /// Creates a color, wrapping the hue into `[0, 360)`.
    #[must_use]
    pub fn new(hue: f32, saturation: f32, lightness: f32) -> Self {
        Self {
            hue: wrap_hue(hue),
            saturation: saturation.clamp(0.0, 1.0),
            lightness: lightness.clamp(0.0, 1.0),
        }
    }

    /// Creates a color from a hue expressed as a fraction of a full turn.
    #[must_use]
    pub fn from_unit_hue(turns: f32, saturation: f32, lightness: f32) -> Self {
        Self::new(turns.rem_euclid(1.0) * 360.0, saturation, lightness)
    }

    /// Returns this color with the hue advanced by `degrees`.
    #[must_use]
    pub fn rotated(self, degrees: f32) -> Self {
        Self::new(self.hue + degrees, self.saturation, self.lightness)
    }

    /// Converts to RGB (each channel 0.0-1.0).
    #[must_use]
    pub fn to_rgb(self) -> [f32; 3] {
        let h = self.hue / 360.0;
        let s = self.saturation;
        let l = self.lightness;

        if s <= 0.0 {
            return [l, l, l];
        }

        let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
        let p = 2.0 * l - q;
        [
            hue_to_channel(p, q, h + 1.0 / 3.0),
            hue_to_channel(p, q, h),
            hue_to_channel(p, q, h - 1.0 / 3.0),
        ]
    }

    /// Converts to RGBA with the given alpha.
    #[must_use]
    pub fn with_alpha(self, alpha: f32) -> Rgba {
        let [r, g, b] = self.to_rgb();
        Rgba::new(r, g, b, alpha)
    }
}

impl fmt::Display for Hsl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "hsl({:.1}, {:.0}%, {:.0}%)",
            self.hue,
            self.saturation * 100.0,
            self.lightness * 100.0
        )
    }
}

fn hue_to_channel(p: f32, q: f32, t: f32) -> f32 {
    let t = t.rem_euclid(1.0);
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 0.5 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

/// Straight (non-premultiplied) RGBA color, GPU compatible.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
#[repr(C)]
pub struct Rgba {
    /// Red component (0.0-1.0 range)
    pub r: f32,
    /// Green component (0.0-1.0 range)
    pub g: f32,
    /// Blue component (0.0-1.0 range)
    pub b: f32,
    /// Alpha component (0.0-1.0 range)
    pub a: f32,
}

impl Rgba {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    /// Fully transparent black.
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a new color.
    #[must_use]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Returns the same color with alpha multiplied by `factor`.
    #[must_use]
    pub fn fade(self, factor: f32) -> Self {
        Self {
            a: (self.a * factor).clamp(0.0, 1.0),
            ..self
        }
    }

    /// Linear interpolation between two colors.
    #[must_use]
    pub fn lerp(self, other: Self, t: f32) -> Self {
        Self {
            r: self.r + (other.r - self.r) * t,
            g: self.g + (other.g - self.g) * t,
            b: self.b + (other.b - self.b) * t,
            a: self.a + (other.a - self.a) * t,
        }
    }

    /// Returns the color as an array.
    #[must_use]
    pub const fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: [f32; 3], b: [f32; 3]) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() < 1e-4)
    }

    #[test]
    fn test_tiny_negative_hue_stays_below_360() {
        for hue in [-1e-6, -f32::EPSILON, -1e-30] {
            let c = Hsl::new(hue, 0.7, 0.6);
            assert!((0.0..360.0).contains(&c.hue), "hue {hue} wrapped to {}", c.hue);
        }
        let unit = Hsl::from_unit_hue(-1e-9, 0.7, 0.6);
        assert!((0.0..360.0).contains(&unit.hue));
    }

    #[test]
    fn test_primary_hues() {
        assert!(approx(Hsl::new(0.0, 1.0, 0.5).to_rgb(), [1.0, 0.0, 0.0]));
        assert!(approx(Hsl::new(120.0, 1.0, 0.5).to_rgb(), [0.0, 1.0, 0.0]));
        assert!(approx(Hsl::new(240.0, 1.0, 0.5).to_rgb(), [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_grey_when_unsaturated() {
        assert!(approx(Hsl::new(200.0, 0.0, 0.3).to_rgb(), [0.3, 0.3, 0.3]));
    }

    #[test]
    fn test_hue_wraps() {
        let c = Hsl::new(359.8, 0.7, 0.6).rotated(0.5);
        assert!((c.hue - 0.3).abs() < 1e-3);
        assert!((Hsl::new(-90.0, 1.0, 0.5).hue - 270.0).abs() < 1e-4);
    }

    #[test]
    fn test_unit_hue() {
        let c = Hsl::from_unit_hue(1.25, 0.8, 0.5);
        assert!((c.hue - 90.0).abs() < 1e-3);
    }

    #[test]
    fn test_display_matches_css() {
        assert_eq!(Hsl::new(120.0, 0.7, 0.6).to_string(), "hsl(120.0, 70%, 60%)");
    }

    #[test]
    fn test_rgba_helpers() {
        let c = Rgba::WHITE.fade(0.25);
        assert!((c.a - 0.25).abs() < f32::EPSILON);
        let mid = Rgba::TRANSPARENT.lerp(Rgba::WHITE, 0.5);
        assert!((mid.r - 0.5).abs() < f32::EPSILON);
        assert_eq!(std::mem::size_of::<Rgba>(), 16);
    }
}
