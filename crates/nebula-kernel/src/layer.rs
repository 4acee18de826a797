//! The background layer and the wgpu context shared by its surfaces.
//!
//! The layer is a full-viewport, non-interactive element that holds at
//! most one engine drawing surface. Engines render into an offscreen
//! texture they own; the layer only keeps a view of it for compositing.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use nebula_common::{EngineResult, GpuError, SurfaceId};
use tracing::debug;

/// Texture format of every layer surface.
pub const LAYER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Device and queue shared by the compositor and all engine backends.
#[derive(Debug)]
pub struct GpuContext {
    /// wgpu device.
    pub device: wgpu::Device,
    /// wgpu queue.
    pub queue: wgpu::Queue,
}

impl GpuContext {
    /// Wraps an existing device and queue.
    #[must_use]
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Arc<Self> {
        Arc::new(Self { device, queue })
    }
}

/// An offscreen color target sized to the layer.
#[derive(Debug)]
pub struct LayerTarget {
    /// Backing texture.
    pub texture: wgpu::Texture,
    /// View shared with the layer.
    pub view: Arc<wgpu::TextureView>,
    /// Size in pixels.
    pub size: (u32, u32),
}

impl LayerTarget {
    /// Allocates a target. Zero dimensions are bumped to one.
    #[must_use]
    pub fn new(device: &wgpu::Device, label: &str, width: u32, height: u32) -> Self {
        let size = (width.max(1), height.max(1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size.0,
                height: size.1,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: LAYER_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let view = Arc::new(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Self {
            texture,
            view,
            size,
        }
    }
}

/// The surface currently attached to the layer.
#[derive(Debug, Clone)]
pub struct LayerChild<V> {
    /// Which surface this is.
    pub surface: SurfaceId,
    /// What to composite.
    pub view: V,
    /// Size in pixels.
    pub size: (u32, u32),
}

/// Single-child background layer.
///
/// Handles are cheap clones of one shared slot. `V` is what the compositor
/// samples, a texture view for the wgpu backends.
#[derive(Debug)]
pub struct LayerHost<V = Arc<wgpu::TextureView>> {
    child: Rc<RefCell<Option<LayerChild<V>>>>,
}

impl<V> Clone for LayerHost<V> {
    fn clone(&self) -> Self {
        Self {
            child: Rc::clone(&self.child),
        }
    }
}

impl<V> Default for LayerHost<V> {
    fn default() -> Self {
        Self {
            child: Rc::new(RefCell::new(None)),
        }
    }
}

impl<V: Clone> LayerHost<V> {
    /// Creates an empty layer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches a surface, or refreshes the view of the one already
    /// attached. Fails if a different surface is attached.
    pub fn attach(&self, surface: SurfaceId, view: V, size: (u32, u32)) -> EngineResult<()> {
        let mut child = self.child.borrow_mut();
        if let Some(existing) = child.as_ref() {
            if existing.surface != surface {
                return Err(GpuError::SurfaceError(format!(
                    "background layer already holds surface {}",
                    existing.surface.raw()
                ))
                .into());
            }
        }
        *child = Some(LayerChild {
            surface,
            view,
            size,
        });
        debug!("Surface {} attached to background layer", surface.raw());
        Ok(())
    }

    /// Detaches `surface` if it is the current child.
    pub fn detach(&self, surface: SurfaceId) {
        let mut child = self.child.borrow_mut();
        if child.as_ref().is_some_and(|c| c.surface == surface) {
            *child = None;
            debug!("Surface {} detached from background layer", surface.raw());
        }
    }

    /// Whether a surface is attached.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.child.borrow().is_some()
    }

    /// Id of the attached surface.
    #[must_use]
    pub fn child_id(&self) -> Option<SurfaceId> {
        self.child.borrow().as_ref().map(|c| c.surface)
    }

    /// A copy of the current child.
    #[must_use]
    pub fn child(&self) -> Option<LayerChild<V>> {
        self.child.borrow().clone()
    }
}
