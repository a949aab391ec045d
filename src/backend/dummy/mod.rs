//! Dummy backend collaborators for testing and tooling.
//!
//! Every seam a mesh talks to has an in-memory implementation here that
//! records what it was asked to do. None of them need a GPU or a window.

mod metal;
mod opengl;
mod vulkan;

pub use self::metal::{DummyMetalContext, DummyMetalDevice, MetalCall};
pub use self::opengl::{DummyGl, GlCall};
pub use self::vulkan::{
    DummyCommandRecorder, DummyObjectManager, DummyVulkanContext, RecordedBufferBarrier,
    RecordedCommand, RecordedCopy, RecordedImageBarrier,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::backend::metal::MetalContext;
use crate::backend::opengl::GlApi;
use crate::backend::vulkan::VulkanContext;
use crate::context::GraphicsContext;
use crate::program::GpuProgram;
use crate::types::ApiVersion;

/// Program with a fixed attribute table.
#[derive(Debug, Default)]
pub struct DummyProgram {
    attributes: HashMap<String, u32>,
    bound: AtomicBool,
    bind_count: AtomicUsize,
}

impl DummyProgram {
    pub fn new(attributes: &[(&str, u32)]) -> Self {
        Self {
            attributes: attributes
                .iter()
                .map(|(name, location)| (name.to_string(), *location))
                .collect(),
            ..Self::default()
        }
    }

    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Relaxed)
    }

    /// How many times the program was bound.
    pub fn bind_count(&self) -> usize {
        self.bind_count.load(Ordering::Relaxed)
    }
}

impl GpuProgram for DummyProgram {
    fn attribute_location(&self, name: &str) -> Option<u32> {
        self.attributes.get(name).copied()
    }

    fn bind(&self) {
        self.bound.store(true, Ordering::Relaxed);
        self.bind_count.fetch_add(1, Ordering::Relaxed);
    }

    fn unbind(&self) {
        self.bound.store(false, Ordering::Relaxed);
    }
}

/// Graphics context for one API, backed by the dummy collaborators.
pub struct DummyContext {
    api_version: ApiVersion,
    gl: Option<Arc<DummyGl>>,
    vulkan: Option<DummyVulkanContext>,
    metal: Option<DummyMetalContext>,
}

impl DummyContext {
    /// An OpenGL ES 3 context.
    pub fn opengl(gl: Arc<DummyGl>) -> Self {
        Self {
            gl: Some(gl),
            ..Self::bare(ApiVersion::OpenGLES3)
        }
    }

    pub fn vulkan(vulkan: DummyVulkanContext) -> Self {
        Self {
            vulkan: Some(vulkan),
            ..Self::bare(ApiVersion::Vulkan)
        }
    }

    pub fn metal(metal: DummyMetalContext) -> Self {
        Self {
            metal: Some(metal),
            ..Self::bare(ApiVersion::Metal)
        }
    }

    /// A context reporting `api_version` without providing that API.
    pub fn bare(api_version: ApiVersion) -> Self {
        Self {
            api_version,
            gl: None,
            vulkan: None,
            metal: None,
        }
    }

    /// Report a different API version, keeping the collaborators.
    pub fn with_api_version(mut self, api_version: ApiVersion) -> Self {
        self.api_version = api_version;
        self
    }

    pub fn vulkan_state(&self) -> &DummyVulkanContext {
        match &self.vulkan {
            Some(vulkan) => vulkan,
            None => panic!("{:?} context has no Vulkan state", self.api_version),
        }
    }

    pub fn vulkan_state_mut(&mut self) -> &mut DummyVulkanContext {
        let api_version = self.api_version;
        match &mut self.vulkan {
            Some(vulkan) => vulkan,
            None => panic!("{api_version:?} context has no Vulkan state"),
        }
    }

    pub fn metal_state(&self) -> &DummyMetalContext {
        match &self.metal {
            Some(metal) => metal,
            None => panic!("{:?} context has no Metal state", self.api_version),
        }
    }
}

impl GraphicsContext for DummyContext {
    fn api_version(&self) -> ApiVersion {
        self.api_version
    }

    fn gl(&self) -> Option<Arc<dyn GlApi>> {
        self.gl.clone().map(|gl| gl as Arc<dyn GlApi>)
    }

    fn vulkan(&mut self) -> Option<&mut dyn VulkanContext> {
        self.vulkan
            .as_mut()
            .map(|vulkan| vulkan as &mut dyn VulkanContext)
    }

    fn metal(&mut self) -> Option<&mut dyn MetalContext> {
        self.metal.as_mut().map(|metal| metal as &mut dyn MetalContext)
    }
}
