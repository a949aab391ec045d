//! Mesh objects.
//!
//! - [`MeshObject`] - caller-facing facade owning CPU data and one backend
//! - [`MeshData`] - the CPU data, handed to backends as a read-only view
//! - [`generate_normals_for_triangles`] - flat normals for triangle lists

mod data;
mod normals;
mod object;

pub use data::MeshData;
pub use normals::generate_normals_for_triangles;
pub use object::MeshObject;
