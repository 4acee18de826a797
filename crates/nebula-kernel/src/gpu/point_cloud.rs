//! Immutable point cloud for the GPU field.
//!
//! Stored as a structure of arrays so each attribute uploads as its own
//! tightly packed instance buffer.

use std::f32::consts::TAU;

use glam::Vec3;
use nebula_common::{BufferId, EngineResult};

use super::device::{BufferDesc, BufferUsage, GpuDevice, OwnedResources};
use super::shading;

/// Default number of points.
pub const POINT_COUNT: usize = 10_000;

/// Default radius of the ball the points are spawned in.
pub const CLOUD_RADIUS: f32 = 500.0;

/// Instance buffers of an uploaded cloud, in shader location order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointCloudBuffers {
    /// `vec3` positions.
    pub positions: BufferId,
    /// `vec3` base colors.
    pub colors: BufferId,
    /// `f32` sizes.
    pub sizes: BufferId,
    /// `f32` rotation seeds.
    pub rotations: BufferId,
}

impl PointCloudBuffers {
    /// Buffers in binding order.
    #[must_use]
    pub fn as_vec(&self) -> Vec<BufferId> {
        vec![self.positions, self.colors, self.sizes, self.rotations]
    }
}

/// Point positions, colors, sizes and rotation seeds.
#[derive(Debug, Clone, Default)]
pub struct GpuPointCloud {
    positions: Vec<f32>,
    colors: Vec<f32>,
    sizes: Vec<f32>,
    rotations: Vec<f32>,
}

impl GpuPointCloud {
    /// Generates `count` points in a ball of `radius`.
    ///
    /// The radius is uniform (so points cluster toward the center) and the
    /// direction is uniform on the sphere.
    pub fn generate(rng: &mut fastrand::Rng, count: usize, radius: f32) -> Self {
        let mut cloud = Self {
            positions: Vec::with_capacity(count * 3),
            colors: Vec::with_capacity(count * 3),
            sizes: Vec::with_capacity(count),
            rotations: Vec::with_capacity(count),
        };

        for _ in 0..count {
            let r = rng.f32() * radius;
            let theta = rng.f32() * TAU;
            let phi = (2.0 * rng.f32() - 1.0).acos();

            cloud.positions.extend_from_slice(&[
                r * phi.sin() * theta.cos(),
                r * phi.sin() * theta.sin(),
                r * phi.cos(),
            ]);
            cloud
                .colors
                .extend_from_slice(&[rng.f32(), rng.f32(), rng.f32()]);
            cloud.sizes.push(rng.f32() * 5.0 + 1.0);
            cloud.rotations.push(rng.f32() * TAU);
        }

        cloud
    }

    /// Number of points.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Whether the cloud is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Stored position of point `i`.
    #[must_use]
    pub fn position(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.positions[i * 3..i * 3 + 3])
    }

    /// Base color of point `i`.
    #[must_use]
    pub fn color(&self, i: usize) -> Vec3 {
        Vec3::from_slice(&self.colors[i * 3..i * 3 + 3])
    }

    /// Size of point `i`.
    #[must_use]
    pub fn size(&self, i: usize) -> f32 {
        self.sizes[i]
    }

    /// Rotation seed of point `i`.
    #[must_use]
    pub fn rotation(&self, i: usize) -> f32 {
        self.rotations[i]
    }

    /// Where the vertex stage draws point `i` at time `t`. The stored
    /// position is never modified.
    #[must_use]
    pub fn displaced_position(&self, i: usize, t: f32) -> Vec3 {
        shading::displace(self.position(i), t)
    }

    /// Uploads the four attribute arrays as instance buffers.
    pub fn upload<D: GpuDevice + ?Sized>(
        &self,
        device: &mut D,
        owned: &mut OwnedResources,
    ) -> EngineResult<PointCloudBuffers> {
        let mut upload = |label: &str, data: &[f32]| {
            owned.buffer(
                device,
                &BufferDesc {
                    label,
                    usage: BufferUsage::Vertex,
                },
                bytemuck::cast_slice(data),
            )
        };
        Ok(PointCloudBuffers {
            positions: upload("Point Positions", &self.positions)?,
            colors: upload("Point Colors", &self.colors)?,
            sizes: upload("Point Sizes", &self.sizes)?,
            rotations: upload("Point Rotations", &self.rotations)?,
        })
    }
}
