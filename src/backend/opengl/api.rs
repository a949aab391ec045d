//! OpenGL entry points used by the mesh backend.

use std::ffi::{c_void, CStr};
use std::marker::PhantomData;

use gl::types::{GLenum, GLint, GLsizei, GLsizeiptr, GLuint};

/// The subset of OpenGL the mesh backend calls.
///
/// All calls target the context current on the calling thread.
pub trait GlApi {
    /// Whether vertex array objects are available on this context.
    fn supports_vertex_array_objects(&self) -> bool;

    fn gen_buffer(&self) -> GLuint;
    fn bind_buffer(&self, target: GLenum, buffer: GLuint);
    fn buffer_data(&self, target: GLenum, data: &[u8], usage: GLenum);
    fn delete_buffer(&self, buffer: GLuint);

    fn gen_vertex_array(&self) -> GLuint;
    fn bind_vertex_array(&self, vao: GLuint);
    fn delete_vertex_array(&self, vao: GLuint);

    fn enable_vertex_attribute(&self, location: GLuint);
    #[allow(clippy::too_many_arguments)]
    fn vertex_attribute_pointer(
        &self,
        location: GLuint,
        component_count: GLint,
        component_type: GLenum,
        normalized: bool,
        stride: GLsizei,
        offset: u32,
    );

    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei);
}

/// [`GlApi`] over the process-wide function pointers of the `gl` crate.
///
/// Not `Send`: it must stay on the thread that owns the GL context.
#[derive(Debug)]
pub struct NativeGl {
    vertex_array_objects: bool,
    _gl_thread: PhantomData<*const ()>,
}

impl NativeGl {
    /// Load GL function pointers and probe context capabilities.
    ///
    /// # Safety
    ///
    /// * must be called from the GL thread with a current context
    pub unsafe fn load_with<F>(loader: F) -> Self
    where
        F: FnMut(&'static str) -> *const c_void,
    {
        gl::load_with(loader);
        let vertex_array_objects = unsafe { detect_vertex_array_objects() };
        log::debug!("OpenGL vertex array objects supported: {vertex_array_objects}");

        Self {
            vertex_array_objects,
            _gl_thread: PhantomData,
        }
    }
}

/// VAOs are core since GL 3.0 / GLES 3.0; older contexts need an extension.
unsafe fn detect_vertex_array_objects() -> bool {
    if !gl::GenVertexArrays::is_loaded() || !gl::BindVertexArray::is_loaded() {
        return false;
    }

    let mut major = 0;
    unsafe { gl::GetIntegerv(gl::MAJOR_VERSION, &mut major) };
    if major >= 3 {
        return true;
    }

    let extensions = unsafe { gl::GetString(gl::EXTENSIONS) };
    if extensions.is_null() {
        return false;
    }
    let extensions = unsafe { CStr::from_ptr(extensions as *const _) }.to_string_lossy();
    extensions.split_ascii_whitespace().any(|name| {
        matches!(
            name,
            "GL_OES_vertex_array_object"
                | "GL_ARB_vertex_array_object"
                | "GL_APPLE_vertex_array_object"
        )
    })
}

// SAFETY (all methods): a NativeGl only exists on the GL thread, after
// `load_with` populated the function pointers.
impl GlApi for NativeGl {
    fn supports_vertex_array_objects(&self) -> bool {
        self.vertex_array_objects
    }

    fn gen_buffer(&self) -> GLuint {
        let mut buffer = 0;
        unsafe { gl::GenBuffers(1, &mut buffer) };
        buffer
    }

    fn bind_buffer(&self, target: GLenum, buffer: GLuint) {
        unsafe { gl::BindBuffer(target, buffer) };
    }

    fn buffer_data(&self, target: GLenum, data: &[u8], usage: GLenum) {
        unsafe {
            gl::BufferData(
                target,
                data.len() as GLsizeiptr,
                data.as_ptr() as *const c_void,
                usage,
            )
        };
    }

    fn delete_buffer(&self, buffer: GLuint) {
        unsafe { gl::DeleteBuffers(1, &buffer) };
    }

    fn gen_vertex_array(&self) -> GLuint {
        let mut vao = 0;
        unsafe { gl::GenVertexArrays(1, &mut vao) };
        vao
    }

    fn bind_vertex_array(&self, vao: GLuint) {
        unsafe { gl::BindVertexArray(vao) };
    }

    fn delete_vertex_array(&self, vao: GLuint) {
        unsafe { gl::DeleteVertexArrays(1, &vao) };
    }

    fn enable_vertex_attribute(&self, location: GLuint) {
        unsafe { gl::EnableVertexAttribArray(location) };
    }

    fn vertex_attribute_pointer(
        &self,
        location: GLuint,
        component_count: GLint,
        component_type: GLenum,
        normalized: bool,
        stride: GLsizei,
        offset: u32,
    ) {
        unsafe {
            gl::VertexAttribPointer(
                location,
                component_count,
                component_type,
                if normalized { gl::TRUE } else { gl::FALSE },
                stride,
                offset as usize as *const c_void,
            )
        };
    }

    fn draw_arrays(&self, mode: GLenum, first: GLint, count: GLsizei) {
        unsafe { gl::DrawArrays(mode, first, count) };
    }
}
