//! The mesh object facade.

use crate::backend::{Backend, MeshBackend};
use crate::config::MeshConfig;
use crate::context::GraphicsContext;
use crate::error::MeshResult;
use crate::program::{GpuProgram, ParamsSetter, RenderState};
use crate::types::DrawPrimitive;

use super::data::MeshData;
use super::normals;

/// An index-free mesh drawn through the backend of the context it was
/// created with.
///
/// The object is either unbuilt or built. Any `set_*` call or [`reset`]
/// drops the GPU resources and returns it to unbuilt; [`build`], or the first
/// [`render`], builds it again.
///
/// [`reset`]: Self::reset
/// [`build`]: Self::build
/// [`render`]: Self::render
pub struct MeshObject {
    data: MeshData,
    backend: Backend,
    initialized: bool,
}

impl MeshObject {
    /// Create a mesh for the API reported by `context`.
    pub fn new(
        context: &mut dyn GraphicsContext,
        draw_primitive: DrawPrimitive,
    ) -> MeshResult<Self> {
        Self::with_config(context, draw_primitive, &MeshConfig::default())
    }

    /// Create a mesh for the API reported by `context`, with explicit backend
    /// tunables.
    pub fn with_config(
        context: &mut dyn GraphicsContext,
        draw_primitive: DrawPrimitive,
        config: &MeshConfig,
    ) -> MeshResult<Self> {
        Ok(Self {
            data: MeshData::new(draw_primitive),
            backend: Backend::for_context(context, config)?,
            initialized: false,
        })
    }

    /// Store buffer `index`, or append it if `index` is the next free index.
    ///
    /// # Panics
    ///
    /// Panics if `index` is past the next free index, if `stride` is zero or
    /// if the data is not a whole number of `stride`-byte vertices.
    pub fn set_buffer(&mut self, index: usize, data: Vec<f32>, stride: u32) {
        self.data.set_buffer(index, data, stride);
        self.reset();
    }

    /// Describe one attribute of buffer `buffer_index`.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist, `component_count` is not in
    /// `1..=4` or the attribute overruns the stride.
    pub fn set_attribute(
        &mut self,
        name: &str,
        buffer_index: usize,
        offset: u32,
        component_count: u32,
    ) {
        self.data
            .set_attribute(name, buffer_index, offset, component_count);
        self.reset();
    }

    /// Store texture `index`, or append it if `index` is the next free index.
    pub fn set_texture(&mut self, index: usize, path: impl Into<String>) {
        self.data.set_texture(index, path.into());
        self.reset();
    }

    /// Replace the data of one buffer of a built mesh and re-upload it.
    ///
    /// Layout, attributes and the other buffers are untouched. If the upload
    /// fails the buffer keeps its previous data.
    ///
    /// # Panics
    ///
    /// Panics if the mesh is not built, if `data` is empty or if its length
    /// differs from the buffer's current length.
    pub fn update_buffer(
        &mut self,
        context: &mut dyn GraphicsContext,
        index: usize,
        data: Vec<f32>,
    ) -> MeshResult<()> {
        assert!(self.initialized, "cannot update buffer {index} of a mesh that is not built");
        assert!(!data.is_empty(), "buffer {index} update has no data");

        let previous = self.data.replace_buffer_data(index, data);
        if let Err(e) = self.backend.update_buffer(&self.data, context, index) {
            log::warn!("{} buffer {index} update failed: {e}", self.backend.name());
            self.data.replace_buffer_data(index, previous);
            return Err(e);
        }
        Ok(())
    }

    /// Create GPU resources for every buffer and texture, dropping any
    /// existing ones first.
    ///
    /// On error the mesh is left unbuilt with nothing allocated.
    pub fn build(
        &mut self,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        self.reset();

        if let Err(e) = self.backend.build(&self.data, context, program) {
            log::warn!("{} mesh build failed: {e}", self.backend.name());
            self.backend.reset();
            return Err(e);
        }

        self.initialized = true;
        Ok(())
    }

    /// Release GPU resources. The next render rebuilds them.
    pub fn reset(&mut self) {
        self.backend.reset();
        self.initialized = false;
    }

    /// Bind `program`, build if needed, then bind the mesh's vertex state.
    pub fn bind(
        &mut self,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        program.bind();
        if !self.initialized {
            self.build(context, program)?;
        }
        self.backend.bind(&self.data, program);
        Ok(())
    }

    /// Draw every vertex of the first buffer. A mesh without vertices draws
    /// nothing.
    pub fn draw_primitives(&mut self, context: &mut dyn GraphicsContext) -> MeshResult<()> {
        let vertex_count = self.data.vertex_count();
        if vertex_count == 0 {
            log::trace!("Skipping draw of an empty mesh");
            return Ok(());
        }
        self.backend
            .draw_primitives(&self.data, context, vertex_count)
    }

    /// Unbind `program` and the mesh's vertex state.
    pub fn unbind(&mut self, program: &dyn GpuProgram) {
        program.unbind();
        self.backend.unbind();
    }

    /// Draw the mesh with `program`.
    ///
    /// Binds the program, builds on first use, applies `state` and `params`,
    /// draws and unbinds, in that order: building resolves attributes against
    /// the bound program and both `apply` steps need it current. The program
    /// is unbound even if a step fails.
    pub fn render<P, S>(
        &mut self,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
        state: &dyn RenderState,
        params_setter: &S,
        params: &P,
    ) -> MeshResult<()>
    where
        P: ?Sized,
        S: ParamsSetter<P> + ?Sized,
    {
        let result = self.bind(context, program).and_then(|()| {
            state.apply(context, program);
            params_setter.apply(context, program, params);
            self.draw_primitives(context)
        });

        self.unbind(program);
        result
    }

    /// See [`generate_normals_for_triangles`](crate::generate_normals_for_triangles).
    pub fn generate_normals_for_triangles(
        vertices: &[f32],
        components_per_vertex: usize,
    ) -> Vec<f32> {
        normals::generate_normals_for_triangles(vertices, components_per_vertex)
    }

    /// Whether GPU resources are built and current.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Primitive topology fixed at construction.
    pub fn draw_primitive(&self) -> DrawPrimitive {
        self.data.draw_primitive()
    }

    /// Index the next appended buffer gets.
    pub fn next_buffer_index(&self) -> usize {
        self.data.next_buffer_index()
    }

    /// Index the next appended texture gets.
    pub fn next_texture_index(&self) -> usize {
        self.data.next_texture_index()
    }

    /// Name of the backend chosen at construction.
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// The backend, for inspecting API-specific state.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    /// CPU-side buffers, attributes and textures.
    pub fn data(&self) -> &MeshData {
        &self.data
    }
}

impl std::fmt::Debug for MeshObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MeshObject")
            .field("backend", &self.backend)
            .field("draw_primitive", &self.data.draw_primitive())
            .field("buffers", &self.data.buffers().len())
            .field("textures", &self.data.textures().len())
            .field("initialized", &self.initialized)
            .finish()
    }
}

impl Drop for MeshObject {
    fn drop(&mut self) {
        self.backend.reset();
    }
}
