//! Shared helpers for mesh integration tests.
//!
//! Every test runs against the dummy collaborators, so no GPU is needed. The
//! [`TestContext`] wraps a dummy context for one backend and reads back what
//! the backend did through the backend-specific dummies.

#![allow(dead_code)]

use std::cell::RefCell;
use std::path::Path;
use std::sync::Arc;

use redlilium_mesh::backend::dummy::{
    DummyContext, DummyGl, DummyMetalContext, DummyMetalDevice, DummyObjectManager,
    DummyProgram, DummyVulkanContext, GlCall, MetalCall, RecordedCommand,
};
use redlilium_mesh::{
    Backend as MeshBackendKind, DrawPrimitive, GpuProgram, GraphicsContext, MeshConfig,
    MeshObject, ParamsSetter, RenderState,
};

/// Backend a test runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenGl,
    /// OpenGL on a context without vertex array objects.
    OpenGlWithoutVao,
    Vulkan,
    Metal,
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A dummy graphics context plus handles to inspect it.
pub struct TestContext {
    pub backend: Backend,
    pub context: DummyContext,
    gl: Option<Arc<DummyGl>>,
    vulkan_objects: Option<Arc<DummyObjectManager>>,
    metal_device: Option<Arc<DummyMetalDevice>>,
}

impl TestContext {
    pub fn new(backend: Backend) -> Self {
        init_logging();
        match backend {
            Backend::OpenGl | Backend::OpenGlWithoutVao => {
                let gl = Arc::new(DummyGl::new(backend == Backend::OpenGl));
                Self {
                    backend,
                    context: DummyContext::opengl(gl.clone()),
                    gl: Some(gl),
                    vulkan_objects: None,
                    metal_device: None,
                }
            }
            Backend::Vulkan => Self::vulkan_with_staging(DummyVulkanContext::new),
            Backend::Metal => {
                let device = Arc::new(DummyMetalDevice::default());
                Self {
                    backend,
                    context: DummyContext::metal(DummyMetalContext::new(device.clone())),
                    gl: None,
                    vulkan_objects: None,
                    metal_device: Some(device),
                }
            }
        }
    }

    /// A Vulkan context whose shared staging buffer holds `capacity` bytes.
    pub fn vulkan_with_staging_capacity(capacity: u32) -> Self {
        init_logging();
        Self::vulkan_with_staging(|manager| {
            DummyVulkanContext::with_staging_capacity(manager, capacity)
        })
    }

    fn vulkan_with_staging(
        make: impl FnOnce(Arc<DummyObjectManager>) -> DummyVulkanContext,
    ) -> Self {
        let manager = Arc::new(DummyObjectManager::new());
        Self {
            backend: Backend::Vulkan,
            context: DummyContext::vulkan(make(manager.clone())),
            gl: None,
            vulkan_objects: Some(manager),
            metal_device: None,
        }
    }

    pub fn mesh(&mut self, primitive: DrawPrimitive) -> MeshObject {
        match MeshObject::with_config(&mut self.context, primitive, &MeshConfig::default()) {
            Ok(mesh) => mesh,
            Err(e) => panic!("failed to create mesh for {:?}: {e}", self.backend),
        }
    }

    pub fn vulkan_objects(&self) -> &Arc<DummyObjectManager> {
        match &self.vulkan_objects {
            Some(manager) => manager,
            None => panic!("{:?} test context has no Vulkan objects", self.backend),
        }
    }

    pub fn gl(&self) -> &Arc<DummyGl> {
        match &self.gl {
            Some(gl) => gl,
            None => panic!("{:?} test context has no GL", self.backend),
        }
    }

    /// Vertex counts of every draw issued so far, oldest first.
    pub fn draws(&self) -> Vec<u32> {
        match self.backend {
            Backend::OpenGl | Backend::OpenGlWithoutVao => self
                .gl()
                .calls()
                .into_iter()
                .filter_map(|call| match call {
                    GlCall::DrawArrays { count, .. } => Some(count as u32),
                    _ => None,
                })
                .collect(),
            Backend::Vulkan => self
                .context
                .vulkan_state()
                .recorder()
                .commands()
                .into_iter()
                .filter_map(|command| match command {
                    RecordedCommand::Draw { vertex_count, .. } => Some(vertex_count),
                    _ => None,
                })
                .collect(),
            Backend::Metal => self
                .context
                .metal_state()
                .calls()
                .into_iter()
                .filter_map(|call| match call {
                    MetalCall::DrawPrimitives { vertex_count, .. } => Some(vertex_count),
                    _ => None,
                })
                .collect(),
        }
    }

    /// GPU-side contents of buffer `index` of `mesh`, `None` if it has none.
    pub fn buffer_contents(&self, mesh: &MeshObject, index: usize) -> Option<Vec<u8>> {
        match mesh.backend() {
            MeshBackendKind::OpenGl(backend) => {
                let id = backend.buffer_id(index);
                if id == 0 {
                    return None;
                }
                self.gl().buffer_contents(id)
            }
            MeshBackendKind::Vulkan(backend) => {
                let buffer = backend.geometry_buffer(index)?;
                self.vulkan_objects().buffer_contents(buffer)
            }
            MeshBackendKind::Metal(backend) => {
                let buffer = backend.buffer(index)?;
                self.metal_device.as_ref()?.buffer_contents(buffer)
            }
        }
    }

    /// Number of GPU buffers the backend currently holds for meshes.
    pub fn live_mesh_buffers(&self) -> usize {
        match self.backend {
            Backend::OpenGl | Backend::OpenGlWithoutVao => self.gl().live_buffer_count(),
            // The context's shared staging buffer is not a mesh buffer.
            Backend::Vulkan => self.vulkan_objects().live_buffer_count() - 1,
            Backend::Metal => self
                .metal_device
                .as_ref()
                .map_or(0, |device| device.live_buffer_count()),
        }
    }
}

/// Three vertices of a right triangle, 3 floats each.
pub const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

pub fn bytes(data: &[f32]) -> Vec<u8> {
    bytemuck::cast_slice(data).to_vec()
}

/// Write a small RGBA image and return its path.
pub fn write_texture(dir: &Path, name: &str, width: u32, height: u32) -> String {
    let path = dir.join(name);
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8 * 40, y as u8 * 40, 200, 255])
    });
    image.save(&path).unwrap();
    path.to_str().unwrap().to_string()
}

/// Program that logs bind/unbind/lookup events.
pub struct LoggingProgram<'a> {
    inner: DummyProgram,
    log: &'a EventLog,
}

impl<'a> LoggingProgram<'a> {
    pub fn new(attributes: &[(&str, u32)], log: &'a EventLog) -> Self {
        Self {
            inner: DummyProgram::new(attributes),
            log,
        }
    }

    pub fn is_bound(&self) -> bool {
        self.inner.is_bound()
    }
}

impl GpuProgram for LoggingProgram<'_> {
    fn attribute_location(&self, name: &str) -> Option<u32> {
        self.log.push(format!("resolve {name}"));
        self.inner.attribute_location(name)
    }

    fn bind(&self) {
        self.log.push("program bind");
        self.inner.bind();
    }

    fn unbind(&self) {
        self.log.push("program unbind");
        self.inner.unbind();
    }
}

/// Ordered record of collaborator calls.
#[derive(Default)]
pub struct EventLog(RefCell<Vec<String>>);

impl EventLog {
    pub fn push(&self, event: impl Into<String>) {
        self.0.borrow_mut().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.0.borrow().clone()
    }
}

/// Render state that logs its application.
pub struct LoggingState<'a>(pub &'a EventLog);

impl RenderState for LoggingState<'_> {
    fn apply(&self, _context: &mut dyn GraphicsContext, _program: &dyn GpuProgram) {
        self.0.push("state");
    }
}

/// Parameters applied to a draw.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorParams {
    pub color: [f32; 4],
}

/// Params setter that logs the parameters it applied.
pub struct LoggingParams<'a>(pub &'a EventLog);

impl ParamsSetter<ColorParams> for LoggingParams<'_> {
    fn apply(
        &self,
        _context: &mut dyn GraphicsContext,
        _program: &dyn GpuProgram,
        params: &ColorParams,
    ) {
        self.0.push(format!("params {:?}", params.color));
    }
}
