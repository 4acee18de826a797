//! Scene state of the GPU particle field.
//!
//! Camera, light, scene rotation, the nebula shell mesh and every GPU
//! resource the field allocates. [`SceneState`] is the sole owner of those
//! resources and must be released through [`SceneState::release`].

use std::f32::consts::PI;

use glam::{EulerRot, Mat4, Vec2, Vec3};
use nebula_common::{BufferId, EngineResult, Hsl, ProgramId, Rgba};
use tracing::debug;

use super::device::{
    BlendMode, BufferDesc, BufferUsage, DrawCall, FaceCulling, GpuDevice, OwnedResources,
    ProgramDesc, ProgramKind, RenderFrame,
};
use super::point_cloud::{GpuPointCloud, PointCloudBuffers};
use super::shaders::{FieldUniforms, NEBULA_SHADER, POINT_SHADER};

/// Clear color: black at 10% alpha so the page behind shows through.
pub const CLEAR_COLOR: Rgba = Rgba::new(0.0, 0.0, 0.0, 0.1);

/// Radius of the nebula shell.
pub const NEBULA_RADIUS: f32 = 800.0;

/// Segments around and along the nebula shell.
pub const NEBULA_SEGMENTS: u32 = 32;

/// Fraction of the remaining distance the rotation covers per frame.
pub const ROTATION_EASING: f32 = 0.05;

/// Radians of rotation per unit of pointer offset.
pub const ROTATION_PER_POINTER: f32 = 0.01;

/// Perspective camera looking down `-z`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Width over height.
    pub aspect: f32,
    /// Near plane.
    pub near: f32,
    /// Far plane.
    pub far: f32,
    /// World-space position.
    pub position: Vec3,
}

impl PerspectiveCamera {
    /// Camera for a viewport, at `z = 500`.
    #[must_use]
    pub fn for_viewport(width: u32, height: u32) -> Self {
        Self {
            fov_degrees: 75.0,
            aspect: aspect_ratio(width, height),
            near: 0.1,
            far: 2000.0,
            position: Vec3::new(0.0, 0.0, 500.0),
        }
    }

    /// Updates the aspect ratio.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_ratio(width, height);
    }

    /// Projection matrix with a `[0, 1]` depth range.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    /// World-to-view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        Mat4::from_translation(-self.position)
    }
}

fn aspect_ratio(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}

/// Pulsing, hue-cycling point light at the origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    /// Current color.
    pub color: Hsl,
    /// Current intensity.
    pub intensity: f32,
    /// Distance at which the light's contribution reaches zero.
    pub range: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Hsl::new(0.0, 0.0, 1.0),
            intensity: 2.0,
            range: 500.0,
        }
    }
}

impl PointLight {
    /// Sets intensity `1.5 + 0.5·sin 2t` and hue `(0.1·t) mod 1`.
    pub fn update(&mut self, t: f32) {
        self.intensity = 1.5 + 0.5 * (t * 2.0).sin();
        self.color = Hsl::from_unit_hue(t * 0.1, 0.8, 0.5);
    }
}

/// Scene rotation eased toward the pointer.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SceneRotation {
    /// Rotation about the x axis, radians.
    pub x: f32,
    /// Rotation about the y axis, radians.
    pub y: f32,
}

impl SceneRotation {
    /// Moves [`ROTATION_EASING`] of the way toward the pointer target.
    pub fn ease_toward(&mut self, pointer: Vec2) {
        self.x += (pointer.y * ROTATION_PER_POINTER - self.x) * ROTATION_EASING;
        self.y += (pointer.x * ROTATION_PER_POINTER - self.y) * ROTATION_EASING;
    }

    /// Model matrix, x rotation applied last.
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_euler(EulerRot::XYZ, self.x, self.y, 0.0)
    }
}

/// UV sphere with `segments + 1` rings of `segments + 1` vertices.
#[derive(Debug, Clone, PartialEq)]
pub struct SphereMesh {
    /// Packed `vec3` positions.
    pub positions: Vec<f32>,
    /// Triangle indices, counter-clockwise seen from outside.
    pub indices: Vec<u32>,
}

impl SphereMesh {
    /// Builds the mesh. Degenerate triangles at the poles are skipped.
    #[must_use]
    pub fn new(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let row = width_segments + 1;
        let mut positions = Vec::with_capacity((row * (height_segments + 1) * 3) as usize);
        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let (sin_u, cos_u) = (u * 2.0 * PI).sin_cos();
                let (sin_v, cos_v) = (v * PI).sin_cos();
                positions.extend_from_slice(&[
                    -radius * cos_u * sin_v,
                    radius * cos_v,
                    radius * sin_u * sin_v,
                ]);
            }
        }

        let mut indices = Vec::new();
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = iy * row + ix + 1;
                let b = iy * row + ix;
                let c = (iy + 1) * row + ix;
                let d = (iy + 1) * row + ix + 1;
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        Self { positions, indices }
    }

    /// Number of vertices.
    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }
}

#[derive(Debug, Clone, Copy)]
struct ShellBuffers {
    vertices: BufferId,
    indices: BufferId,
    index_count: u32,
}

/// Everything the field draws, plus the GPU resources behind it.
#[derive(Debug)]
pub struct SceneState {
    camera: PerspectiveCamera,
    light: PointLight,
    rotation: SceneRotation,
    cloud: PointCloudBuffers,
    point_count: u32,
    shell: ShellBuffers,
    point_program: ProgramId,
    nebula_program: ProgramId,
    owned: OwnedResources,
    viewport: (u32, u32),
    pixel_ratio: f32,
}

impl SceneState {
    /// Uploads the cloud and shell and compiles both programs.
    ///
    /// On failure, whatever was allocated is released before returning.
    pub fn build<D: GpuDevice + ?Sized>(
        device: &mut D,
        cloud: &GpuPointCloud,
        viewport: (u32, u32),
        pixel_ratio: f32,
    ) -> EngineResult<Self> {
        let mut owned = OwnedResources::new();
        match Self::allocate(device, &mut owned, cloud) {
            Ok((cloud_buffers, shell, point_program, nebula_program)) => {
                debug!(
                    "Scene built: {} points, {} shell indices, {} buffers",
                    cloud.len(),
                    shell.index_count,
                    owned.buffer_count()
                );
                Ok(Self {
                    camera: PerspectiveCamera::for_viewport(viewport.0, viewport.1),
                    light: PointLight::default(),
                    rotation: SceneRotation::default(),
                    cloud: cloud_buffers,
                    point_count: cloud.len() as u32,
                    shell,
                    point_program,
                    nebula_program,
                    owned,
                    viewport,
                    pixel_ratio,
                })
            }
            Err(e) => {
                owned.release_all(device);
                Err(e)
            }
        }
    }

    fn allocate<D: GpuDevice + ?Sized>(
        device: &mut D,
        owned: &mut OwnedResources,
        cloud: &GpuPointCloud,
    ) -> EngineResult<(PointCloudBuffers, ShellBuffers, ProgramId, ProgramId)> {
        let cloud_buffers = cloud.upload(device, owned)?;

        let point_program = owned.program(
            device,
            &ProgramDesc {
                label: "Point Sprites",
                kind: ProgramKind::PointSprites,
                source: POINT_SHADER,
                blend: BlendMode::Additive,
                culling: FaceCulling::None,
                depth_write: false,
                uniform_size: std::mem::size_of::<FieldUniforms>() as u64,
            },
        )?;

        let nebula_program = owned.program(
            device,
            &ProgramDesc {
                label: "Nebula Shell",
                kind: ProgramKind::NebulaShell,
                source: NEBULA_SHADER,
                blend: BlendMode::Additive,
                culling: FaceCulling::Front,
                depth_write: true,
                uniform_size: std::mem::size_of::<FieldUniforms>() as u64,
            },
        )?;

        let mesh = SphereMesh::new(NEBULA_RADIUS, NEBULA_SEGMENTS, NEBULA_SEGMENTS);
        let vertices = owned.buffer(
            device,
            &BufferDesc {
                label: "Nebula Vertices",
                usage: BufferUsage::Vertex,
            },
            bytemuck::cast_slice(&mesh.positions),
        )?;
        let indices = owned.buffer(
            device,
            &BufferDesc {
                label: "Nebula Indices",
                usage: BufferUsage::Index,
            },
            bytemuck::cast_slice(&mesh.indices),
        )?;

        let shell = ShellBuffers {
            vertices,
            indices,
            index_count: mesh.indices.len() as u32,
        };
        Ok((cloud_buffers, shell, point_program, nebula_program))
    }

    /// Updates the camera aspect for a new viewport.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
        self.camera.set_viewport(width, height);
    }

    /// Advances the rotation toward the pointer and animates the light.
    pub fn update(&mut self, pointer: Vec2, t: f32) {
        self.rotation.ease_toward(pointer);
        self.light.update(t);
    }

    /// Uniform block for time `t`.
    #[must_use]
    pub fn uniforms(&self, t: f32) -> FieldUniforms {
        let model_view = self.camera.view() * self.rotation.matrix();
        FieldUniforms::new(model_view, self.camera.projection(), self.viewport, t)
            .with_pixel_ratio(self.pixel_ratio)
    }

    /// Draws in submission order: the shell, then the points.
    #[must_use]
    pub fn draw_calls(&self) -> Vec<DrawCall> {
        vec![
            DrawCall {
                program: self.nebula_program,
                vertex_buffers: vec![self.shell.vertices],
                index_buffer: Some(self.shell.indices),
                element_count: self.shell.index_count,
                instance_count: 1,
            },
            DrawCall {
                program: self.point_program,
                vertex_buffers: self.cloud.as_vec(),
                index_buffer: None,
                element_count: 6,
                instance_count: self.point_count,
            },
        ]
    }

    /// Writes uniforms and renders one frame.
    pub fn render<D: GpuDevice + ?Sized>(&self, device: &mut D, t: f32) -> EngineResult<()> {
        let uniforms = self.uniforms(t);
        let bytes = bytemuck::bytes_of(&uniforms);
        device.write_uniforms(self.nebula_program, bytes)?;
        device.write_uniforms(self.point_program, bytes)?;

        let draws = self.draw_calls();
        device.render(&RenderFrame {
            clear: CLEAR_COLOR,
            draws: &draws,
        })
    }

    /// Releases every buffer and program.
    pub fn release<D: GpuDevice + ?Sized>(mut self, device: &mut D) {
        debug!(
            "Releasing scene: {} buffers, {} programs",
            self.owned.buffer_count(),
            self.owned.program_count()
        );
        self.owned.release_all(device);
    }

    /// Camera.
    #[must_use]
    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    /// Point light.
    #[must_use]
    pub fn light(&self) -> &PointLight {
        &self.light
    }

    /// Scene rotation.
    #[must_use]
    pub fn rotation(&self) -> SceneRotation {
        self.rotation
    }

    /// Live buffers owned by the scene.
    #[must_use]
    pub fn buffer_count(&self) -> usize {
        self.owned.buffer_count()
    }

    /// Live programs owned by the scene.
    #[must_use]
    pub fn program_count(&self) -> usize {
        self.owned.program_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::point_cloud::CLOUD_RADIUS;
    use crate::testing::{ResourceLedger, TrackingDevice};

    fn cloud() -> GpuPointCloud {
        let mut rng = fastrand::Rng::with_seed(9);
        GpuPointCloud::generate(&mut rng, 64, CLOUD_RADIUS)
    }

    #[test]
    fn test_sphere_topology() {
        let mesh = SphereMesh::new(NEBULA_RADIUS, 32, 32);
        assert_eq!(mesh.vertex_count(), 33 * 33);
        // 62 triangles per segment column once the pole rows drop one each
        assert_eq!(mesh.indices.len(), 32 * 62 * 3);
        assert!(mesh.indices.iter().all(|&i| (i as usize) < mesh.vertex_count()));
        for v in mesh.positions.chunks(3) {
            let r = Vec3::new(v[0], v[1], v[2]).length();
            assert!((r - NEBULA_RADIUS).abs() < 0.05);
        }
    }

    #[test]
    fn test_sphere_faces_point_outward() {
        let mesh = SphereMesh::new(1.0, 8, 8);
        let p = |i: u32| Vec3::from_slice(&mesh.positions[i as usize * 3..i as usize * 3 + 3]);
        for tri in mesh.indices.chunks(3) {
            let (a, b, c) = (p(tri[0]), p(tri[1]), p(tri[2]));
            let normal = (b - a).cross(c - a);
            let center = (a + b + c) / 3.0;
            assert!(normal.dot(center) > 0.0);
        }
    }

    #[test]
    fn test_rotation_eases_toward_pointer() {
        let mut rot = SceneRotation::default();
        rot.ease_toward(Vec2::new(0.5, -1.0));
        assert!((rot.x - (-0.01 * 0.05)).abs() < 1e-7);
        assert!((rot.y - (0.005 * 0.05)).abs() < 1e-7);

        for _ in 0..500 {
            rot.ease_toward(Vec2::new(0.5, -1.0));
        }
        assert!((rot.x + 0.01).abs() < 1e-5);
        assert!((rot.y - 0.005).abs() < 1e-5);
    }

    #[test]
    fn test_light_animation() {
        let mut light = PointLight::default();
        light.update(0.0);
        assert!((light.intensity - 1.5).abs() < 1e-6);
        light.update(12.5);
        // hue (0.1·12.5) mod 1 = 0.25 turns
        assert!((light.color.hue - 90.0).abs() < 1e-3);
        assert!((light.color.saturation - 0.8).abs() < 1e-6);
        assert_eq!(light.range, 500.0);
    }

    #[test]
    fn test_camera_defaults() {
        let mut camera = PerspectiveCamera::for_viewport(1600, 800);
        assert_eq!(camera.aspect, 2.0);
        assert_eq!(camera.position.z, 500.0);
        camera.set_viewport(800, 800);
        assert_eq!(camera.aspect, 1.0);
        let origin = camera.projection() * camera.view() * glam::Vec4::new(0.0, 0.0, 0.0, 1.0);
        // the origin is in front of the camera
        assert!(origin.w > 0.0 && origin.z / origin.w < 1.0);
    }

    #[test]
    fn test_build_and_release() {
        let ledger = ResourceLedger::new();
        let mut device = TrackingDevice::new(&ledger);
        let scene = SceneState::build(&mut device, &cloud(), (800, 600), 1.0).expect("scene");

        assert_eq!(scene.buffer_count(), 6);
        assert_eq!(scene.program_count(), 2);
        assert_eq!(device.buffer_sizes(BufferUsage::Index).len(), 1);

        let draws = scene.draw_calls();
        assert_eq!(draws.len(), 2);
        assert!(draws[0].index_buffer.is_some());
        assert_eq!(draws[1].instance_count, 64);

        scene.release(&mut device);
        assert!(ledger.is_clean());
    }

    #[test]
    fn test_build_failure_releases_partial_allocation() {
        let ledger = ResourceLedger::new();
        let mut device = TrackingDevice::new(&ledger).failing_program(ProgramKind::NebulaShell);

        let err = SceneState::build(&mut device, &cloud(), (800, 600), 1.0).expect_err("fails");

        assert!(err.to_string().contains("Nebula Shell"));
        assert!(ledger.is_clean());
        assert_eq!(device.buffer_count(), 0);
    }

    #[test]
    fn test_render_writes_uniforms_and_clear() {
        let ledger = ResourceLedger::new();
        let mut device = TrackingDevice::new(&ledger);
        device.attach_surface(800, 600).expect("attach");
        let scene = SceneState::build(&mut device, &cloud(), (800, 600), 1.0).expect("scene");

        scene.render(&mut device, 2.0).expect("render");

        assert_eq!(device.last_frame(), Some((CLEAR_COLOR, 2)));
        let uniforms: FieldUniforms = bytemuck::pod_read_unaligned(
            device
                .uniforms_of(scene.draw_calls()[1].program)
                .expect("uniforms written"),
        );
        assert_eq!(uniforms.time, 2.0);
        assert_eq!(uniforms.viewport, [800.0, 600.0]);

        scene.release(&mut device);
        device.detach_surface();
        assert!(ledger.is_clean());
    }
}
