//! Immediate-mode 2D drawing abstraction.
//!
//! The 2D engine draws through [`Canvas2d`], a small subset of a
//! canvas-style API: a transform and alpha state stack, gradient fills,
//! filled polygons and circles, an optional glow, and two compositing
//! modes. A [`CanvasSurface`] owns the backing store and hands out the
//! context.

use glam::Vec2;
use nebula_common::{EngineResult, Rgba, SurfaceId};

/// How new pixels combine with what is already drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CompositeMode {
    /// Normal alpha blending.
    #[default]
    SourceOver,
    /// Additive blending.
    Lighter,
}

/// A two-stop-or-more linear gradient in surface pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearGradient {
    /// Gradient axis start.
    pub start: Vec2,
    /// Gradient axis end.
    pub end: Vec2,
    /// Color stops as `(offset, color)`, offsets in `0.0..=1.0`, ascending.
    pub stops: Vec<(f32, Rgba)>,
}

impl LinearGradient {
    /// Creates a gradient with a start and end color.
    #[must_use]
    pub fn two_stop(start: Vec2, end: Vec2, from: Rgba, to: Rgba) -> Self {
        Self {
            start,
            end,
            stops: vec![(0.0, from), (1.0, to)],
        }
    }

    /// Color at point `p`, projected onto the gradient axis.
    #[must_use]
    pub fn sample(&self, p: Vec2) -> Rgba {
        let axis = self.end - self.start;
        let len_sq = axis.length_squared();
        let t = if len_sq > f32::EPSILON {
            ((p - self.start).dot(axis) / len_sq).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.color_at(t)
    }

    /// Color at axis offset `t`.
    #[must_use]
    pub fn color_at(&self, t: f32) -> Rgba {
        let Some(&(first_offset, first)) = self.stops.first() else {
            return Rgba::TRANSPARENT;
        };
        if t <= first_offset {
            return first;
        }
        for pair in self.stops.windows(2) {
            let (o0, c0) = pair[0];
            let (o1, c1) = pair[1];
            if t <= o1 {
                let span = (o1 - o0).max(f32::EPSILON);
                return c0.lerp(c1, (t - o0) / span);
            }
        }
        self.stops.last().map_or(first, |&(_, c)| c)
    }
}

/// A canvas-style 2D drawing context.
pub trait Canvas2d {
    /// Drawing area in pixels.
    fn size(&self) -> (u32, u32);

    /// Erases everything drawn this frame.
    fn clear(&mut self);

    /// Fills the axis-aligned rectangle with a gradient.
    fn fill_rect_gradient(&mut self, origin: Vec2, extent: Vec2, gradient: &LinearGradient);

    /// Pushes the current transform, alpha, composite and shadow state.
    fn save(&mut self);

    /// Pops the state pushed by the matching `save`.
    fn restore(&mut self);

    /// Translates the current transform.
    fn translate(&mut self, offset: Vec2);

    /// Rotates the current transform by `radians`.
    fn rotate(&mut self, radians: f32);

    /// Sets the global alpha multiplier.
    fn set_global_alpha(&mut self, alpha: f32);

    /// Sets the compositing mode.
    fn set_composite(&mut self, mode: CompositeMode);

    /// Enables a glow of `blur` pixels in `color`. A blur of zero disables it.
    fn set_shadow(&mut self, blur: f32, color: Rgba);

    /// Fills a closed polygon given in local coordinates.
    fn fill_polygon(&mut self, points: &[Vec2], color: Rgba);

    /// Fills a circle given in local coordinates.
    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba);
}

/// The drawing surface a 2D engine renders into.
pub trait CanvasSurface {
    /// Context type handed out for drawing.
    type Context: Canvas2d;

    /// Identity of this surface in the host layer.
    fn surface_id(&self) -> SurfaceId;

    /// Resizes the backing store.
    fn set_size(&mut self, width: u32, height: u32);

    /// Returns the 2D context, or `None` if the surface cannot provide one.
    fn context_2d(&mut self) -> Option<&mut Self::Context>;

    /// Makes everything drawn since the last `clear` visible.
    fn present(&mut self) -> EngineResult<()>;

    /// Releases the backing store and detaches from the host layer.
    fn release(&mut self);
}
