//! Recording Metal collaborators.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::backend::metal::{
    MetalBufferId, MetalContext, MetalDevice, MetalPrimitiveType, MetalTextureId,
};

#[derive(Default)]
struct DeviceState {
    next_id: u64,
    buffers: HashMap<MetalBufferId, Vec<u8>>,
    textures: HashMap<MetalTextureId, (u32, u32, Vec<u8>)>,
}

/// [`MetalDevice`] keeping buffers and textures in host memory.
#[derive(Default)]
pub struct DummyMetalDevice {
    state: Mutex<DeviceState>,
}

impl DummyMetalDevice {
    pub fn buffer_contents(&self, buffer: MetalBufferId) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer).cloned()
    }

    /// Width, height and pixels of a live texture.
    pub fn texture(&self, texture: MetalTextureId) -> Option<(u32, u32, Vec<u8>)> {
        self.state.lock().textures.get(&texture).cloned()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    pub fn live_texture_count(&self) -> usize {
        self.state.lock().textures.len()
    }

    fn next_id(state: &mut DeviceState) -> u64 {
        state.next_id += 1;
        state.next_id
    }
}

impl MetalDevice for DummyMetalDevice {
    fn new_buffer(&self, data: &[u8]) -> MetalBufferId {
        let mut state = self.state.lock();
        let id = MetalBufferId(Self::next_id(&mut state));
        state.buffers.insert(id, data.to_vec());
        id
    }

    fn replace_buffer_contents(&self, buffer: MetalBufferId, data: &[u8]) {
        let mut state = self.state.lock();
        let Some(contents) = state.buffers.get_mut(&buffer) else {
            panic!("{buffer:?} is not a live buffer");
        };
        assert_eq!(contents.len(), data.len(), "buffer length cannot change");
        contents.copy_from_slice(data);
    }

    fn new_texture_rgba8(&self, width: u32, height: u32, pixels: &[u8]) -> MetalTextureId {
        let mut state = self.state.lock();
        let id = MetalTextureId(Self::next_id(&mut state));
        state.textures.insert(id, (width, height, pixels.to_vec()));
        id
    }

    fn release_buffer(&self, buffer: MetalBufferId) {
        self.state.lock().buffers.remove(&buffer);
    }

    fn release_texture(&self, texture: MetalTextureId) {
        self.state.lock().textures.remove(&texture);
    }
}

/// A call observed by [`DummyMetalContext`]'s encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetalCall {
    SetVertexBuffer {
        buffer: MetalBufferId,
        offset: u64,
        index: u32,
    },
    SetFragmentTexture {
        texture: MetalTextureId,
        index: u32,
    },
    DrawPrimitives {
        primitive: MetalPrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
    },
}

/// [`MetalContext`] recording encoder calls.
pub struct DummyMetalContext {
    device: Arc<DummyMetalDevice>,
    calls: Vec<MetalCall>,
}

impl DummyMetalContext {
    pub fn new(device: Arc<DummyMetalDevice>) -> Self {
        Self {
            device,
            calls: Vec::new(),
        }
    }

    pub fn calls(&self) -> Vec<MetalCall> {
        self.calls.clone()
    }
}

impl MetalContext for DummyMetalContext {
    fn device(&self) -> Arc<dyn MetalDevice> {
        self.device.clone()
    }

    fn set_vertex_buffer(&mut self, buffer: MetalBufferId, offset: u64, index: u32) {
        self.calls.push(MetalCall::SetVertexBuffer {
            buffer,
            offset,
            index,
        });
    }

    fn set_fragment_texture(&mut self, texture: MetalTextureId, index: u32) {
        self.calls
            .push(MetalCall::SetFragmentTexture { texture, index });
    }

    fn draw_primitives(
        &mut self,
        primitive: MetalPrimitiveType,
        vertex_start: u32,
        vertex_count: u32,
    ) {
        self.calls.push(MetalCall::DrawPrimitives {
            primitive,
            vertex_start,
            vertex_count,
        });
    }
}
