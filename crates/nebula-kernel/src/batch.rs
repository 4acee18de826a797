//! Tessellating implementation of [`Canvas2d`].
//!
//! Every canvas command is turned into colored triangles in surface pixel
//! space. Consecutive triangles sharing a compositing mode form one
//! [`DrawBatch`], so a backend needs one pipeline switch per batch.

use std::ops::Range;

use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Vec2};
use nebula_common::Rgba;

use crate::canvas::{Canvas2d, CompositeMode, LinearGradient};

/// Segments used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 48;

/// A colored vertex in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Vertex2d {
    /// Position in pixels, origin top-left.
    pub position: [f32; 2],
    /// Straight RGBA color.
    pub color: [f32; 4],
}

impl Vertex2d {
    fn new(position: Vec2, color: Rgba) -> Self {
        Self {
            position: position.to_array(),
            color: color.to_array(),
        }
    }
}

/// A run of vertices drawn with one compositing mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrawBatch {
    /// Compositing mode for the run.
    pub mode: CompositeMode,
    /// Vertex range, three vertices per triangle.
    pub vertices: Range<u32>,
}

#[derive(Debug, Clone, Copy)]
struct DrawState {
    transform: Affine2,
    alpha: f32,
    composite: CompositeMode,
    shadow: Option<(f32, Rgba)>,
}

impl Default for DrawState {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            alpha: 1.0,
            composite: CompositeMode::SourceOver,
            shadow: None,
        }
    }
}

/// Canvas context that records triangles instead of rasterizing.
#[derive(Debug, Default)]
pub struct TriangleBatch {
    width: u32,
    height: u32,
    vertices: Vec<Vertex2d>,
    batches: Vec<DrawBatch>,
    state: DrawState,
    stack: Vec<DrawState>,
}

impl TriangleBatch {
    /// Creates an empty batch for a surface of the given size.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Changes the logical surface size.
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
    }

    /// All recorded vertices.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex2d] {
        &self.vertices
    }

    /// Recorded batches in draw order.
    #[must_use]
    pub fn batches(&self) -> &[DrawBatch] {
        &self.batches
    }

    /// Number of recorded triangles.
    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.vertices.len() / 3
    }

    /// Whether nothing has been recorded since the last clear.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Depth of the save stack.
    #[must_use]
    pub fn save_depth(&self) -> usize {
        self.stack.len()
    }

    fn push_triangle(&mut self, a: Vertex2d, b: Vertex2d, c: Vertex2d) {
        let mode = self.state.composite;
        let start = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&[a, b, c]);
        let end = start + 3;
        match self.batches.last_mut() {
            Some(batch) if batch.mode == mode => batch.vertices.end = end,
            _ => self.batches.push(DrawBatch {
                mode,
                vertices: start..end,
            }),
        }
    }

    fn apply_alpha(&self, color: Rgba) -> Rgba {
        color.fade(self.state.alpha)
    }

    /// Fan from the centroid; valid for shapes star-shaped around it.
    fn fill_fan(&mut self, outline: &[Vec2], color: Rgba) {
        if outline.len() < 3 {
            return;
        }
        let center = centroid(outline);

        if let Some((blur, glow)) = self.state.shadow {
            self.fill_halo(outline, center, blur, self.apply_alpha(glow));
        }

        let color = self.apply_alpha(color);
        let c = Vertex2d::new(center, color);
        for i in 0..outline.len() {
            let a = outline[i];
            let b = outline[(i + 1) % outline.len()];
            self.push_triangle(c, Vertex2d::new(a, color), Vertex2d::new(b, color));
        }
    }

    /// A ring around the outline fading to transparent over `blur` pixels.
    fn fill_halo(&mut self, outline: &[Vec2], center: Vec2, blur: f32, color: Rgba) {
        let clear = color.fade(0.0);
        let outer: Vec<Vec2> = outline
            .iter()
            .map(|&p| p + (p - center).normalize_or_zero() * blur)
            .collect();
        for i in 0..outline.len() {
            let j = (i + 1) % outline.len();
            let (a, b) = (outline[i], outline[j]);
            let (oa, ob) = (outer[i], outer[j]);
            self.push_triangle(
                Vertex2d::new(a, color),
                Vertex2d::new(b, color),
                Vertex2d::new(ob, clear),
            );
            self.push_triangle(
                Vertex2d::new(a, color),
                Vertex2d::new(ob, clear),
                Vertex2d::new(oa, clear),
            );
        }
    }

    fn to_surface(&self, points: impl IntoIterator<Item = Vec2>) -> Vec<Vec2> {
        points
            .into_iter()
            .map(|p| self.state.transform.transform_point2(p))
            .collect()
    }
}

fn centroid(points: &[Vec2]) -> Vec2 {
    points.iter().copied().sum::<Vec2>() / points.len() as f32
}

impl Canvas2d for TriangleBatch {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self) {
        self.vertices.clear();
        self.batches.clear();
    }

    fn fill_rect_gradient(&mut self, origin: Vec2, extent: Vec2, gradient: &LinearGradient) {
        let local = [
            origin,
            origin + Vec2::new(extent.x, 0.0),
            origin + extent,
            origin + Vec2::new(0.0, extent.y),
        ];
        let colors = local.map(|p| self.apply_alpha(gradient.sample(p)));
        let corners = self.to_surface(local);
        let v: Vec<Vertex2d> = corners
            .iter()
            .zip(colors)
            .map(|(&p, c)| Vertex2d::new(p, c))
            .collect();
        self.push_triangle(v[0], v[1], v[2]);
        self.push_triangle(v[0], v[2], v[3]);
    }

    fn save(&mut self) {
        self.stack.push(self.state);
    }

    fn restore(&mut self) {
        if let Some(state) = self.stack.pop() {
            self.state = state;
        }
    }

    fn translate(&mut self, offset: Vec2) {
        self.state.transform = self.state.transform * Affine2::from_translation(offset);
    }

    fn rotate(&mut self, radians: f32) {
        self.state.transform = self.state.transform * Affine2::from_angle(radians);
    }

    fn set_global_alpha(&mut self, alpha: f32) {
        self.state.alpha = alpha.clamp(0.0, 1.0);
    }

    fn set_composite(&mut self, mode: CompositeMode) {
        self.state.composite = mode;
    }

    fn set_shadow(&mut self, blur: f32, color: Rgba) {
        self.state.shadow = (blur > 0.0).then_some((blur, color));
    }

    fn fill_polygon(&mut self, points: &[Vec2], color: Rgba) {
        let outline = self.to_surface(points.iter().copied());
        self.fill_fan(&outline, color);
    }

    fn fill_circle(&mut self, center: Vec2, radius: f32, color: Rgba) {
        let step = std::f32::consts::TAU / CIRCLE_SEGMENTS as f32;
        let outline = self.to_surface(
            (0..CIRCLE_SEGMENTS).map(|i| center + Vec2::from_angle(i as f32 * step) * radius),
        );
        self.fill_fan(&outline, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> [Vec2; 4] {
        [
            Vec2::new(-1.0, -1.0),
            Vec2::new(1.0, -1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(-1.0, 1.0),
        ]
    }

    #[test]
    fn test_polygon_fans_one_triangle_per_edge() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.fill_polygon(&square(), Rgba::WHITE);
        assert_eq!(batch.triangle_count(), 4);
        assert_eq!(batch.batches().len(), 1);
    }

    #[test]
    fn test_transform_applies_and_restores() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.save();
        batch.translate(Vec2::new(10.0, 20.0));
        batch.fill_polygon(&square(), Rgba::WHITE);
        batch.restore();
        assert_eq!(batch.save_depth(), 0);

        // centroid vertex of the first triangle
        assert_eq!(batch.vertices()[0].position, [10.0, 20.0]);

        batch.clear();
        batch.fill_polygon(&square(), Rgba::WHITE);
        assert_eq!(batch.vertices()[0].position, [0.0, 0.0]);
    }

    #[test]
    fn test_rotation_composes_after_translation() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.translate(Vec2::new(50.0, 50.0));
        batch.rotate(std::f32::consts::FRAC_PI_2);
        batch.fill_polygon(
            &[Vec2::new(10.0, 0.0), Vec2::new(0.0, 1.0), Vec2::new(0.0, -1.0)],
            Rgba::WHITE,
        );
        let p = batch.vertices()[1].position;
        assert!((p[0] - 50.0).abs() < 1e-4);
        assert!((p[1] - 60.0).abs() < 1e-4);
    }

    #[test]
    fn test_global_alpha_multiplies() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.set_global_alpha(0.5);
        batch.fill_polygon(&square(), Rgba::new(1.0, 0.0, 0.0, 0.8));
        assert!((batch.vertices()[0].color[3] - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_composite_change_starts_new_batch() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.fill_polygon(&square(), Rgba::WHITE);
        batch.set_composite(CompositeMode::Lighter);
        batch.fill_circle(Vec2::new(50.0, 50.0), 10.0, Rgba::WHITE);
        batch.set_composite(CompositeMode::SourceOver);
        batch.fill_polygon(&square(), Rgba::WHITE);

        let modes: Vec<_> = batch.batches().iter().map(|b| b.mode).collect();
        assert_eq!(
            modes,
            vec![
                CompositeMode::SourceOver,
                CompositeMode::Lighter,
                CompositeMode::SourceOver
            ]
        );
        assert_eq!(batch.batches()[1].vertices.len(), CIRCLE_SEGMENTS * 3);
    }

    #[test]
    fn test_shadow_adds_fading_halo() {
        let mut batch = TriangleBatch::new(100, 100);
        batch.set_shadow(15.0, Rgba::WHITE);
        batch.fill_polygon(&square(), Rgba::WHITE);
        // halo: two triangles per edge, then the fill fan
        assert_eq!(batch.triangle_count(), 4 * 2 + 4);
        assert!(batch.vertices().iter().any(|v| v.color[3] == 0.0));

        batch.clear();
        batch.set_shadow(0.0, Rgba::WHITE);
        batch.fill_polygon(&square(), Rgba::WHITE);
        assert_eq!(batch.triangle_count(), 4);
    }

    #[test]
    fn test_gradient_rect_corner_colors() {
        let mut batch = TriangleBatch::new(200, 100);
        let g = LinearGradient::two_stop(
            Vec2::ZERO,
            Vec2::new(200.0, 100.0),
            Rgba::new(0.0, 0.0, 0.0, 1.0),
            Rgba::new(1.0, 1.0, 1.0, 1.0),
        );
        batch.fill_rect_gradient(Vec2::ZERO, Vec2::new(200.0, 100.0), &g);
        assert_eq!(batch.triangle_count(), 2);
        assert_eq!(batch.vertices()[0].color[0], 0.0);
        assert!((batch.vertices()[2].color[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_unbalanced_restore_is_ignored() {
        let mut batch = TriangleBatch::new(10, 10);
        batch.restore();
        assert_eq!(batch.save_depth(), 0);
        assert_eq!(batch.size(), (10, 10));
    }
}
