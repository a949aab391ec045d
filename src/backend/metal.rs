//! Metal mesh backend.
//!
//! Metal has no persistent vertex binding state, so like Vulkan all binding
//! happens inside the draw. Device and encoder access go through the
//! [`MetalDevice`] and [`MetalContext`] seams, implemented by the platform
//! layer on top of the Objective-C runtime.

use std::sync::Arc;

use super::MeshBackend;
use crate::context::GraphicsContext;
use crate::error::{MeshError, MeshResult};
use crate::mesh::MeshData;
use crate::program::{resolve_attribute, GpuProgram};
use crate::texture::load_rgba8;
use crate::types::DrawPrimitive;

/// Handle to an `MTLBuffer` owned by a [`MetalDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetalBufferId(pub u64);

/// Handle to an `MTLTexture` owned by a [`MetalDevice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetalTextureId(pub u64);

/// `MTLPrimitiveType` subset used by meshes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetalPrimitiveType {
    Triangle,
    TriangleStrip,
    LineStrip,
}

impl From<DrawPrimitive> for MetalPrimitiveType {
    fn from(primitive: DrawPrimitive) -> Self {
        match primitive {
            DrawPrimitive::Triangles => Self::Triangle,
            DrawPrimitive::TriangleStrip => Self::TriangleStrip,
            DrawPrimitive::LineStrip => Self::LineStrip,
        }
    }
}

/// Resource creation on an `MTLDevice`.
pub trait MetalDevice {
    /// Create a shared-storage buffer initialized with `data`.
    fn new_buffer(&self, data: &[u8]) -> MetalBufferId;

    /// Overwrite the contents of a buffer. `data` has the buffer's length.
    fn replace_buffer_contents(&self, buffer: MetalBufferId, data: &[u8]);

    /// Create an RGBA8 texture initialized with `pixels`.
    fn new_texture_rgba8(&self, width: u32, height: u32, pixels: &[u8]) -> MetalTextureId;

    fn release_buffer(&self, buffer: MetalBufferId);

    fn release_texture(&self, texture: MetalTextureId);
}

/// Metal half of a graphics context: the device and the render command
/// encoder of the current pass.
pub trait MetalContext {
    fn device(&self) -> Arc<dyn MetalDevice>;

    fn set_vertex_buffer(&mut self, buffer: MetalBufferId, offset: u64, index: u32);

    fn set_fragment_texture(&mut self, texture: MetalTextureId, index: u32);

    fn draw_primitives(
        &mut self,
        primitive: MetalPrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
    );
}

/// Metal realization of a mesh object.
pub struct MetalMeshBackend {
    device: Arc<dyn MetalDevice>,
    /// One entry per mesh buffer, `None` for buffers that were empty at build time.
    buffers: Vec<Option<MetalBufferId>>,
    textures: Vec<MetalTextureId>,
}

impl MetalMeshBackend {
    /// Backend allocating through `device`. Nothing is created until build.
    pub fn new(device: Arc<dyn MetalDevice>) -> Self {
        Self {
            device,
            buffers: Vec::new(),
            textures: Vec::new(),
        }
    }

    /// Device buffer of a mesh buffer, `None` if it has none.
    pub fn buffer(&self, buffer_index: usize) -> Option<MetalBufferId> {
        self.buffers.get(buffer_index).copied().flatten()
    }

    /// Textures created by the last build, in mesh texture order.
    pub fn textures(&self) -> &[MetalTextureId] {
        &self.textures
    }
}

impl MeshBackend for MetalMeshBackend {
    fn build(
        &mut self,
        mesh: &MeshData,
        _context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        for buffer in mesh.buffers() {
            // The vertex descriptor lives in the pipeline; resolving here keeps
            // the unresolved-attribute failure at build time on every API.
            for attribute in buffer.attributes() {
                resolve_attribute(program, &attribute.name);
            }

            if buffer.is_empty() {
                self.buffers.push(None);
            } else {
                self.buffers.push(Some(self.device.new_buffer(buffer.bytes())));
            }
        }

        for path in mesh.textures().iter().filter(|path| !path.is_empty()) {
            let image = load_rgba8(path)?;
            self.textures
                .push(self.device.new_texture_rgba8(image.width, image.height, &image.pixels));
        }

        log::debug!(
            "Built Metal mesh: {} buffers, {} textures",
            self.buffers.len(),
            self.textures.len()
        );
        Ok(())
    }

    fn reset(&mut self) {
        for buffer in self.buffers.drain(..).flatten() {
            self.device.release_buffer(buffer);
        }
        for texture in self.textures.drain(..) {
            self.device.release_texture(texture);
        }
    }

    fn update_buffer(
        &mut self,
        mesh: &MeshData,
        _context: &mut dyn GraphicsContext,
        buffer_index: usize,
    ) -> MeshResult<()> {
        let Some(buffer) = self.buffer(buffer_index) else {
            panic!("buffer {buffer_index} has no Metal buffer to update");
        };
        self.device
            .replace_buffer_contents(buffer, mesh.buffers()[buffer_index].bytes());
        Ok(())
    }

    fn bind(&mut self, _mesh: &MeshData, _program: &dyn GpuProgram) {}

    fn unbind(&mut self) {}

    fn draw_primitives(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        vertex_count: u32,
    ) -> MeshResult<()> {
        let reported = context.api_version();
        let metal = context.metal().ok_or(MeshError::ContextMismatch {
            backend: "Metal",
            reported,
        })?;

        for (index, buffer) in self.buffers.iter().enumerate() {
            if let Some(buffer) = buffer {
                metal.set_vertex_buffer(*buffer, 0, index as u32);
            }
        }
        for (index, texture) in self.textures.iter().enumerate() {
            metal.set_fragment_texture(*texture, index as u32);
        }

        log::trace!("Metal draw: {vertex_count} vertices");
        metal.draw_primitives(mesh.draw_primitive().into(), 0, vertex_count);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{
        DummyContext, DummyMetalContext, DummyMetalDevice, DummyProgram, MetalCall,
    };

    fn line_mesh() -> MeshData {
        let mut mesh = MeshData::new(DrawPrimitive::LineStrip);
        mesh.set_buffer(0, vec![0.0, 0.0, 1.0, 1.0], 8);
        mesh.set_attribute("a_pos", 0, 0, 2);
        mesh
    }

    fn setup() -> (Arc<DummyMetalDevice>, DummyContext) {
        let device = Arc::new(DummyMetalDevice::default());
        let context = DummyContext::metal(DummyMetalContext::new(device.clone()));
        (device, context)
    }

    #[test]
    fn test_build_and_draw() {
        let (device, mut context) = setup();
        let mesh = line_mesh();
        let mut backend = MetalMeshBackend::new(device.clone());
        backend
            .build(&mesh, &mut context, &DummyProgram::new(&[("a_pos", 0)]))
            .unwrap();
        let buffer = backend.buffer(0).unwrap();
        assert_eq!(device.buffer_contents(buffer).unwrap(), mesh.buffers()[0].bytes());

        backend.draw_primitives(&mesh, &mut context, 2).unwrap();
        assert_eq!(
            context.metal_state().calls(),
            vec![
                MetalCall::SetVertexBuffer {
                    buffer,
                    offset: 0,
                    index: 0
                },
                MetalCall::DrawPrimitives {
                    primitive: MetalPrimitiveType::LineStrip,
                    vertex_start: 0,
                    vertex_count: 2
                },
            ]
        );
    }

    #[test]
    fn test_update_and_reset() {
        let (device, mut context) = setup();
        let mut mesh = line_mesh();
        let mut backend = MetalMeshBackend::new(device.clone());
        backend
            .build(&mesh, &mut context, &DummyProgram::new(&[("a_pos", 0)]))
            .unwrap();
        let buffer = backend.buffer(0).unwrap();

        mesh.replace_buffer_data(0, vec![3.0; 4]);
        backend.update_buffer(&mesh, &mut context, 0).unwrap();
        assert_eq!(
            device.buffer_contents(buffer).unwrap(),
            bytemuck::cast_slice::<f32, u8>(&[3.0; 4])
        );

        backend.reset();
        assert_eq!(device.live_buffer_count(), 0);
        assert!(backend.buffer(0).is_none());
    }

    #[test]
    #[should_panic(expected = "attribute `a_pos` is not declared")]
    fn test_unresolved_attribute_is_fatal() {
        let (device, mut context) = setup();
        let mut backend = MetalMeshBackend::new(device);
        let _ = backend.build(&line_mesh(), &mut context, &DummyProgram::new(&[]));
    }
}
