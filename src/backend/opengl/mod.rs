//! OpenGL mesh backend.
//!
//! With vertex array objects the attribute layout is captured once at build
//! time and a bind is a single VAO bind. Without them every bind re-binds each
//! buffer and re-specifies its attribute pointers.

mod api;

pub use api::{GlApi, NativeGl};

use std::sync::Arc;

use gl::types::{GLenum, GLint, GLsizei, GLuint};

use super::MeshBackend;
use crate::config::MeshConfig;
use crate::context::GraphicsContext;
use crate::error::MeshResult;
use crate::mesh::MeshData;
use crate::program::{resolve_attribute, GpuProgram};
use crate::types::{DrawPrimitive, VertexBuffer};

/// GL draw mode for a primitive kind.
pub fn draw_mode(primitive: DrawPrimitive) -> GLenum {
    match primitive {
        DrawPrimitive::Triangles => gl::TRIANGLES,
        DrawPrimitive::TriangleStrip => gl::TRIANGLE_STRIP,
        DrawPrimitive::LineStrip => gl::LINE_STRIP,
    }
}

/// OpenGL realization of a mesh object.
pub struct GlMeshBackend {
    gl: Arc<dyn GlApi>,
    use_vao: bool,
    vao: GLuint,
    /// One entry per mesh buffer, 0 for buffers that were empty at build time.
    buffer_ids: Vec<GLuint>,
}

impl GlMeshBackend {
    /// Backend issuing calls through `gl`. Vertex array objects are used only
    /// when the driver supports them and `config` allows it.
    pub fn new(gl: Arc<dyn GlApi>, config: &MeshConfig) -> Self {
        let supported = gl.supports_vertex_array_objects();
        if config.use_vertex_array_objects && !supported {
            log::debug!("Vertex array objects unavailable, attributes are set up on every bind");
        }

        Self {
            use_vao: config.use_vertex_array_objects && supported,
            gl,
            vao: 0,
            buffer_ids: Vec::new(),
        }
    }

    /// Whether the layout is captured in a vertex array object.
    pub fn uses_vertex_array_object(&self) -> bool {
        self.use_vao
    }

    /// GL buffer name of a mesh buffer, 0 if it has none.
    pub fn buffer_id(&self, buffer_index: usize) -> GLuint {
        self.buffer_ids.get(buffer_index).copied().unwrap_or(0)
    }

    fn specify_attributes(&self, buffer: &VertexBuffer, program: &dyn GpuProgram) {
        for attribute in buffer.attributes() {
            let location = resolve_attribute(program, &attribute.name);
            self.gl.enable_vertex_attribute(location);
            self.gl.vertex_attribute_pointer(
                location,
                attribute.component_count as GLint,
                gl::FLOAT,
                false,
                buffer.stride() as GLsizei,
                attribute.offset,
            );
        }
    }
}

impl MeshBackend for GlMeshBackend {
    fn build(
        &mut self,
        mesh: &MeshData,
        _context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        if self.use_vao {
            self.vao = self.gl.gen_vertex_array();
            self.gl.bind_vertex_array(self.vao);
        }

        self.buffer_ids.clear();
        for buffer in mesh.buffers() {
            if buffer.is_empty() {
                self.buffer_ids.push(0);
                continue;
            }

            let id = self.gl.gen_buffer();
            self.gl.bind_buffer(gl::ARRAY_BUFFER, id);
            self.gl
                .buffer_data(gl::ARRAY_BUFFER, buffer.bytes(), gl::STATIC_DRAW);
            self.buffer_ids.push(id);

            if self.use_vao {
                self.specify_attributes(buffer, program);
            }
        }

        if self.use_vao {
            self.gl.bind_vertex_array(0);
        }
        self.gl.bind_buffer(gl::ARRAY_BUFFER, 0);

        log::debug!(
            "Built OpenGL mesh: {} buffers, vao={}",
            self.buffer_ids.len(),
            self.vao
        );
        Ok(())
    }

    fn reset(&mut self) {
        for id in self.buffer_ids.drain(..) {
            if id != 0 {
                self.gl.delete_buffer(id);
            }
        }

        if self.vao != 0 {
            self.gl.delete_vertex_array(self.vao);
            self.vao = 0;
        }
    }

    fn update_buffer(
        &mut self,
        mesh: &MeshData,
        _context: &mut dyn GraphicsContext,
        buffer_index: usize,
    ) -> MeshResult<()> {
        let id = self.buffer_id(buffer_index);
        assert_ne!(id, 0, "buffer {buffer_index} has no GL buffer to update");

        self.gl.bind_buffer(gl::ARRAY_BUFFER, id);
        self.gl.buffer_data(
            gl::ARRAY_BUFFER,
            mesh.buffers()[buffer_index].bytes(),
            gl::STATIC_DRAW,
        );
        self.gl.bind_buffer(gl::ARRAY_BUFFER, 0);
        Ok(())
    }

    fn bind(&mut self, mesh: &MeshData, program: &dyn GpuProgram) {
        if self.use_vao {
            self.gl.bind_vertex_array(self.vao);
            return;
        }

        for (buffer, &id) in mesh.buffers().iter().zip(&self.buffer_ids) {
            if id == 0 {
                continue;
            }
            self.gl.bind_buffer(gl::ARRAY_BUFFER, id);
            self.specify_attributes(buffer, program);
        }
    }

    fn unbind(&mut self) {
        if self.use_vao {
            self.gl.bind_vertex_array(0);
        }
        self.gl.bind_buffer(gl::ARRAY_BUFFER, 0);
    }

    fn draw_primitives(
        &mut self,
        mesh: &MeshData,
        _context: &mut dyn GraphicsContext,
        vertex_count: u32,
    ) -> MeshResult<()> {
        log::trace!("OpenGL draw: {vertex_count} vertices");
        self.gl
            .draw_arrays(draw_mode(mesh.draw_primitive()), 0, vertex_count as GLsizei);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyContext, DummyGl, DummyProgram, GlCall};

    fn triangle_mesh() -> MeshData {
        let mut mesh = MeshData::new(DrawPrimitive::Triangles);
        mesh.set_buffer(0, vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0], 12);
        mesh.set_attribute("a_pos", 0, 0, 3);
        mesh
    }

    fn build(gl: &Arc<DummyGl>, mesh: &MeshData, config: &MeshConfig) -> GlMeshBackend {
        let mut context = DummyContext::opengl(gl.clone());
        let program = DummyProgram::new(&[("a_pos", 0)]);
        let mut backend = GlMeshBackend::new(gl.clone(), config);
        backend.build(mesh, &mut context, &program).unwrap();
        backend
    }

    #[test]
    fn test_draw_mode() {
        assert_eq!(draw_mode(DrawPrimitive::Triangles), gl::TRIANGLES);
        assert_eq!(draw_mode(DrawPrimitive::TriangleStrip), gl::TRIANGLE_STRIP);
        assert_eq!(draw_mode(DrawPrimitive::LineStrip), gl::LINE_STRIP);
    }

    #[test]
    fn test_build_with_vao_captures_layout() {
        let gl = Arc::new(DummyGl::new(true));
        let mesh = triangle_mesh();
        let backend = build(&gl, &mesh, &MeshConfig::default());

        assert!(backend.uses_vertex_array_object());
        let id = backend.buffer_id(0);
        assert_ne!(id, 0);
        assert_eq!(gl.buffer_contents(id).unwrap(), mesh.buffers()[0].bytes());
        assert!(gl.calls().contains(&GlCall::VertexAttributePointer {
            location: 0,
            component_count: 3,
            stride: 12,
            offset: 0,
        }));
        assert_eq!(gl.calls().last(), Some(&GlCall::BindBuffer(0)));
    }

    #[test]
    fn test_bind_with_vao_is_single_call() {
        let gl = Arc::new(DummyGl::new(true));
        let mesh = triangle_mesh();
        let mut backend = build(&gl, &mesh, &MeshConfig::default());
        gl.clear_calls();

        backend.bind(&mesh, &DummyProgram::new(&[("a_pos", 0)]));
        assert_eq!(gl.calls(), vec![GlCall::BindVertexArray(backend.vao)]);
    }

    #[test]
    fn test_bind_without_vao_respecifies_attributes() {
        let gl = Arc::new(DummyGl::new(false));
        let mesh = triangle_mesh();
        let mut backend = build(&gl, &mesh, &MeshConfig::default());
        assert!(!backend.uses_vertex_array_object());
        assert!(!gl
            .calls()
            .iter()
            .any(|call| matches!(call, GlCall::VertexAttributePointer { .. })));
        gl.clear_calls();

        let program = DummyProgram::new(&[("a_pos", 0)]);
        backend.bind(&mesh, &program);
        backend.bind(&mesh, &program);
        let pointer_calls = gl
            .calls()
            .iter()
            .filter(|call| matches!(call, GlCall::VertexAttributePointer { .. }))
            .count();
        assert_eq!(pointer_calls, 2);
    }

    #[test]
    fn test_config_can_disable_vao() {
        let gl = Arc::new(DummyGl::new(true));
        let config = MeshConfig {
            use_vertex_array_objects: false,
            ..MeshConfig::default()
        };
        let backend = build(&gl, &triangle_mesh(), &config);
        assert!(!backend.uses_vertex_array_object());
        assert!(!gl
            .calls()
            .iter()
            .any(|call| matches!(call, GlCall::GenVertexArray(_))));
    }

    #[test]
    fn test_empty_buffer_is_skipped() {
        let gl = Arc::new(DummyGl::new(true));
        let mut mesh = triangle_mesh();
        mesh.set_buffer(1, Vec::new(), 12);
        let backend = build(&gl, &mesh, &MeshConfig::default());

        assert_ne!(backend.buffer_id(0), 0);
        assert_eq!(backend.buffer_id(1), 0);
        assert_eq!(gl.live_buffer_count(), 1);
    }

    #[test]
    fn test_reset_deletes_everything() {
        let gl = Arc::new(DummyGl::new(true));
        let mut backend = build(&gl, &triangle_mesh(), &MeshConfig::default());
        assert_eq!(gl.live_buffer_count(), 1);
        assert_eq!(gl.live_vertex_array_count(), 1);

        backend.reset();
        assert_eq!(gl.live_buffer_count(), 0);
        assert_eq!(gl.live_vertex_array_count(), 0);
        assert_eq!(backend.buffer_id(0), 0);

        // A second reset has nothing left to release.
        gl.clear_calls();
        backend.reset();
        assert!(gl.calls().is_empty());
    }

    #[test]
    fn test_update_buffer_reuploads_data() {
        let gl = Arc::new(DummyGl::new(true));
        let mut mesh = triangle_mesh();
        let mut backend = build(&gl, &mesh, &MeshConfig::default());
        let id = backend.buffer_id(0);

        mesh.replace_buffer_data(0, vec![2.0; 9]);
        let mut context = DummyContext::opengl(gl.clone());
        backend.update_buffer(&mesh, &mut context, 0).unwrap();

        assert_eq!(backend.buffer_id(0), id);
        assert_eq!(
            gl.buffer_contents(id).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[2.0; 9])
        );
    }

    #[test]
    fn test_draw_primitives_issues_draw_arrays() {
        let gl = Arc::new(DummyGl::new(true));
        let mesh = triangle_mesh();
        let mut backend = build(&gl, &mesh, &MeshConfig::default());
        let mut context = DummyContext::opengl(gl.clone());
        gl.clear_calls();

        backend.draw_primitives(&mesh, &mut context, 3).unwrap();
        assert_eq!(
            gl.calls(),
            vec![GlCall::DrawArrays {
                mode: gl::TRIANGLES,
                first: 0,
                count: 3
            }]
        );
    }

    #[test]
    #[should_panic(expected = "attribute `a_pos` is not declared")]
    fn test_unresolved_attribute_is_fatal() {
        let gl = Arc::new(DummyGl::new(true));
        let mut context = DummyContext::opengl(gl.clone());
        let mut backend = GlMeshBackend::new(gl, &MeshConfig::default());
        backend
            .build(&triangle_mesh(), &mut context, &DummyProgram::new(&[]))
            .unwrap();
    }
}
