//! Recording OpenGL implementation.

use std::collections::{HashMap, HashSet};

use gl::types::{GLenum, GLint, GLsizei, GLuint};
use parking_lot::Mutex;

use crate::backend::opengl::GlApi;

/// A GL call observed by [`DummyGl`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GlCall {
    GenBuffer(GLuint),
    BindBuffer(GLuint),
    BufferData {
        buffer: GLuint,
        size: usize,
        usage: GLenum,
    },
    DeleteBuffer(GLuint),
    GenVertexArray(GLuint),
    BindVertexArray(GLuint),
    DeleteVertexArray(GLuint),
    EnableVertexAttribute(GLuint),
    VertexAttributePointer {
        location: GLuint,
        component_count: GLint,
        stride: GLsizei,
        offset: u32,
    },
    DrawArrays {
        mode: GLenum,
        first: GLint,
        count: GLsizei,
    },
}

#[derive(Default)]
struct GlState {
    next_name: GLuint,
    bound_buffer: GLuint,
    buffers: HashMap<GLuint, Vec<u8>>,
    vertex_arrays: HashSet<GLuint>,
    calls: Vec<GlCall>,
}

/// [`GlApi`] that records every call and keeps buffer contents in memory.
pub struct DummyGl {
    vertex_array_objects: bool,
    state: Mutex<GlState>,
}

impl DummyGl {
    pub fn new(vertex_array_objects: bool) -> Self {
        Self {
            vertex_array_objects,
            state: Mutex::new(GlState {
                next_name: 1,
                ..GlState::default()
            }),
        }
    }

    /// Calls made so far, oldest first.
    pub fn calls(&self) -> Vec<GlCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Data last uploaded into a live buffer.
    pub fn buffer_contents(&self, buffer: GLuint) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_vertex_array_count(&self) -> usize {
        self.state.lock().vertex_arrays.len()
    }

    pub fn draw_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, GlCall::DrawArrays { .. }))
            .count()
    }
}

impl GlApi for DummyGl {
    fn supports_vertex_array_objects(&self) -> bool {
        self.vertex_array_objects
    }

    fn gen_buffer(&self) -> GLuint {
        let mut state = self.state.lock();
        let name = state.next_name;
        state.next_name += 1;
        state.buffers.insert(name, Vec::new());
        state.calls.push(GlCall::GenBuffer(name));
        name
    }

    fn bind_buffer(&self, _target: GLenum, buffer: GLuint) {
        let mut state = self.state.lock();
        state.bound_buffer = buffer;
        state.calls.push(GlCall::BindBuffer(buffer));
    }

    fn buffer_data(&self, _target: GLenum, data: &[u8], usage: GLenum) {
        let mut state = self.state.lock();
        let buffer = state.bound_buffer;
        match state.buffers.get_mut(&buffer) {
            Some(contents) => *contents = data.to_vec(),
            None => panic!("glBufferData without a live buffer bound (bound: {buffer})"),
        }
        state.calls.push(GlCall::BufferData {
            buffer,
            size: data.len(),
            usage,
        });
    }

    fn delete_buffer(&self, buffer: GLuint) {
        let mut state = self.state.lock();
        state.buffers.remove(&buffer);
        state.calls.push(GlCall::DeleteBuffer(buffer));
    }

    fn gen_vertex_array(&self) -> GLuint {
        assert!(self.vertex_array_objects, "vertex array objects are not supported");
        let mut state = self.state.lock();
        let name = state.next_name;
        state.next_name += 1;
        state.vertex_arrays.insert(name);
        state.calls.push(GlCall::GenVertexArray(name));
        name
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        self.state.lock().calls.push(GlCall::BindVertexArray(vao));
    }

    fn delete_vertex_array(&self, vao: GLuint) {
        let mut state = self.state.lock();
        state.vertex_arrays.remove(&vao);
        state.calls.push(GlCall::DeleteVertexArray(vao));
    }

    fn enable_vertex_attribute(&self, location: GLuint) {
        self.state
            .lock()
            .calls
            .push(GlCall::EnableVertexAttribute(location));
    }

    fn vertex_attribute_pointer(
        &self,
        location: GLuint,
        component_count: GLint,
        _component_type: GLenum,
        _normalized: bool,
        stride: GLsizei,
        offset: u32,
    ) {
        self.state.lock().calls.push(GlCall::VertexAttributePointer {
            location,
            component_count,
            stride,
            offset,
        });
    }

    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei) {
        self.state
            .lock()
            .calls
            .push(GlCall::DrawArrays { mode, first, count });
    }
}
