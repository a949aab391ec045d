//! GPU backend abstraction for mesh objects.
//!
//! Each backend implements [`MeshBackend`], the six operations a mesh object
//! needs from a GPU API:
//! - `build` / `reset`: create and release GPU resources for the mesh
//! - `update_buffer`: re-upload one buffer of an already built mesh
//! - `bind` / `unbind`: persistent binding state (OpenGL only)
//! - `draw_primitives`: record or issue the non-indexed draw
//!
//! # Available Backends
//!
//! - [`opengl`]: OpenGL / OpenGL ES through the `gl` crate
//! - [`vulkan`]: Vulkan through `ash`, with staging uploads and barriers
//! - [`metal`]: Metal through the [`metal::MetalDevice`] seam
//! - [`dummy`]: recording implementations of every seam, for tests and tooling
//!
//! The concrete backend is chosen once, when the mesh object is created, from
//! the API its context reports. [`Backend`] is the closed set of choices.

pub mod metal;
pub mod opengl;
pub mod vulkan;

pub mod dummy;

use crate::config::MeshConfig;
use crate::context::GraphicsContext;
use crate::error::{MeshError, MeshResult};
use crate::mesh::MeshData;
use crate::program::GpuProgram;
use crate::types::ApiVersion;

use self::metal::MetalMeshBackend;
use self::opengl::GlMeshBackend;
use self::vulkan::VulkanMeshBackend;

/// API-specific realization of a mesh object's GPU resources.
///
/// Backends never own the mesh data: every call receives a read-only view of
/// the owning mesh object.
pub trait MeshBackend {
    /// Allocate and upload GPU resources for every buffer and texture.
    fn build(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()>;

    /// Release every GPU resource created by `build`.
    fn reset(&mut self);

    /// Re-upload the data of one buffer without touching the layout.
    fn update_buffer(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        buffer_index: usize,
    ) -> MeshResult<()>;

    /// Bind vertex state before drawing.
    fn bind(&mut self, mesh: &MeshData, program: &dyn GpuProgram);

    /// Undo `bind`.
    fn unbind(&mut self);

    /// Issue a non-indexed draw of `vertex_count` vertices starting at vertex 0.
    fn draw_primitives(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        vertex_count: u32,
    ) -> MeshResult<()>;
}

/// The backend a mesh object owns.
pub enum Backend {
    OpenGl(GlMeshBackend),
    Vulkan(VulkanMeshBackend),
    Metal(MetalMeshBackend),
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Backend::{}", self.name())
    }
}

impl Backend {
    /// Create the backend matching the API reported by `context`.
    pub fn for_context(
        context: &mut dyn GraphicsContext,
        config: &MeshConfig,
    ) -> MeshResult<Self> {
        let reported = context.api_version();
        let backend = match reported {
            ApiVersion::OpenGLES2 | ApiVersion::OpenGLES3 => {
                let gl = context.gl().ok_or(MeshError::ContextMismatch {
                    backend: "OpenGL",
                    reported,
                })?;
                Self::OpenGl(GlMeshBackend::new(gl, config))
            }
            ApiVersion::Vulkan => {
                let vulkan = context.vulkan().ok_or(MeshError::ContextMismatch {
                    backend: "Vulkan",
                    reported,
                })?;
                Self::Vulkan(VulkanMeshBackend::new(vulkan.object_manager(), config))
            }
            ApiVersion::Metal => {
                let metal = context.metal().ok_or(MeshError::ContextMismatch {
                    backend: "Metal",
                    reported,
                })?;
                Self::Metal(MetalMeshBackend::new(metal.device()))
            }
        };

        log::debug!("Selected {} mesh backend for {:?}", backend.name(), reported);
        Ok(backend)
    }

    /// Get the backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenGl(_) => "OpenGL",
            Self::Vulkan(_) => "Vulkan",
            Self::Metal(_) => "Metal",
        }
    }
}

impl MeshBackend for Backend {
    fn build(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        match self {
            Self::OpenGl(backend) => backend.build(mesh, context, program),
            Self::Vulkan(backend) => backend.build(mesh, context, program),
            Self::Metal(backend) => backend.build(mesh, context, program),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::OpenGl(backend) => backend.reset(),
            Self::Vulkan(backend) => backend.reset(),
            Self::Metal(backend) => backend.reset(),
        }
    }

    fn update_buffer(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        buffer_index: usize,
    ) -> MeshResult<()> {
        match self {
            Self::OpenGl(backend) => backend.update_buffer(mesh, context, buffer_index),
            Self::Vulkan(backend) => backend.update_buffer(mesh, context, buffer_index),
            Self::Metal(backend) => backend.update_buffer(mesh, context, buffer_index),
        }
    }

    fn bind(&mut self, mesh: &MeshData, program: &dyn GpuProgram) {
        match self {
            Self::OpenGl(backend) => backend.bind(mesh, program),
            Self::Vulkan(backend) => backend.bind(mesh, program),
            Self::Metal(backend) => backend.bind(mesh, program),
        }
    }

    fn unbind(&mut self) {
        match self {
            Self::OpenGl(backend) => backend.unbind(),
            Self::Vulkan(backend) => backend.unbind(),
            Self::Metal(backend) => backend.unbind(),
        }
    }

    fn draw_primitives(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        vertex_count: u32,
    ) -> MeshResult<()> {
        match self {
            Self::OpenGl(backend) => backend.draw_primitives(mesh, context, vertex_count),
            Self::Vulkan(backend) => backend.draw_primitives(mesh, context, vertex_count),
            Self::Metal(backend) => backend.draw_primitives(mesh, context, vertex_count),
        }
    }
}
