//! # RedLilium Mesh
//!
//! Index-free mesh objects drawn through OpenGL, Vulkan or Metal.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`MeshObject`] - Vertex buffers, attribute layouts and textures behind one
//!   build / bind / draw / unbind interface
//! - [`MeshBackend`] - The operations each GPU API implements
//! - [`backend::vulkan`] - Staging uploads, barriers, per-frame descriptor sets
//!   and deferred destruction for Vulkan
//! - [`backend::dummy`] - GPU-free implementations of every collaborator
//!
//! The backend is chosen once, from the API the [`GraphicsContext`] reports
//! when the mesh is created.
//!
//! ## Example
//!
//! ```ignore
//! use redlilium_mesh::{DrawPrimitive, MeshObject};
//!
//! let mut mesh = MeshObject::new(&mut context, DrawPrimitive::Triangles)?;
//! mesh.set_buffer(0, positions, 12);
//! mesh.set_attribute("a_position", 0, 0, 3);
//!
//! // Every frame:
//! mesh.render(&mut context, &program, &state, &params_setter, &params)?;
//! ```

pub mod backend;
pub mod config;
pub mod context;
pub mod error;
pub mod mesh;
pub mod program;
pub mod texture;
pub mod types;

// Re-export main types for convenience
pub use backend::{Backend, MeshBackend};
pub use config::MeshConfig;
pub use context::GraphicsContext;
pub use error::{MeshError, MeshResult, ResourceError};
pub use mesh::{generate_normals_for_triangles, MeshData, MeshObject};
pub use program::{GpuProgram, ParamsSetter, RenderState};
pub use types::{ApiVersion, AttributeMapping, DrawPrimitive, VertexBuffer};

/// Mesh library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the mesh subsystem.
///
/// Only logs the version; meshes work without it.
pub fn init() {
    log::info!("RedLilium Mesh v{} initialized", VERSION);
}
