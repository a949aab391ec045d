//! Graphics context collaborator.

use std::sync::Arc;

use crate::backend::metal::MetalContext;
use crate::backend::opengl::GlApi;
use crate::backend::vulkan::VulkanContext;
use crate::types::ApiVersion;

/// Per-API rendering context owned by the windowing layer.
///
/// A context reports which API it drives and exposes the capability object of
/// that API. The accessors for other APIs keep their default `None`.
pub trait GraphicsContext {
    /// The API this context drives.
    fn api_version(&self) -> ApiVersion;

    /// OpenGL entry points, for OpenGL contexts.
    fn gl(&self) -> Option<Arc<dyn GlApi>> {
        None
    }

    /// Vulkan frame state, for Vulkan contexts.
    fn vulkan(&mut self) -> Option<&mut dyn VulkanContext> {
        None
    }

    /// Metal device and encoder, for Metal contexts.
    fn metal(&mut self) -> Option<&mut dyn MetalContext> {
        None
    }
}
