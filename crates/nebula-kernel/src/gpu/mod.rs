//! GPU particle field.
//!
//! [`field::GpuParticleField`] drives a [`device::GpuDevice`]; the scene,
//! point cloud and shaders it draws live in the sibling modules. The
//! [`shading`] module mirrors the shader math on the CPU.

pub mod device;
pub mod field;
pub mod point_cloud;
pub mod scene;
pub mod shaders;
pub mod shading;
pub mod wgpu_device;

pub use device::{
    BlendMode, BufferDesc, BufferUsage, DrawCall, FaceCulling, GpuDevice, OwnedResources,
    ProgramDesc, ProgramKind, RenderFrame,
};
pub use field::{FieldSettings, GpuParticleField};
pub use point_cloud::{GpuPointCloud, PointCloudBuffers};
pub use scene::{PerspectiveCamera, PointLight, SceneRotation, SceneState, SphereMesh};
pub use shaders::FieldUniforms;
pub use wgpu_device::WgpuDevice;
