//! Mesh backend configuration.

/// Tunables applied when a [`MeshObject`](crate::MeshObject) selects its backend.
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Use a vertex array object on OpenGL when the driver supports one.
    /// When false the per-bind attribute setup path is always taken.
    pub use_vertex_array_objects: bool,
    /// Maximum number of vertex buffers a Vulkan mesh may bind.
    pub max_binding_info: usize,
    /// Number of frames the GPU may be working on concurrently. Sizes the
    /// per-frame descriptor set cache.
    pub frames_in_flight: usize,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            use_vertex_array_objects: true,
            max_binding_info: 16,
            frames_in_flight: 3,
        }
    }
}
