//! Recording Vulkan collaborators.
//!
//! Buffers are plain byte vectors and commands execute the moment they are
//! recorded, so a test can look at buffer contents right after an upload.

use std::collections::HashMap;
use std::sync::Arc;

use ash::vk;
use ash::vk::Handle;
use parking_lot::Mutex;

use crate::backend::vulkan::{
    BindingInfo, CommandRecorder, DeferredReleaseQueue, ObjectManager, ParamDescriptor,
    ResourceType, StagingBuffer, VulkanContext, VulkanObject,
};
use crate::error::ResourceError;

const DEFAULT_STAGING_CAPACITY: u32 = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBufferBarrier {
    pub buffer: vk::Buffer,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedImageBarrier {
    pub image: vk::Image,
    pub old_layout: vk::ImageLayout,
    pub new_layout: vk::ImageLayout,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedCopy {
    pub src_offset: vk::DeviceSize,
    pub dst_offset: vk::DeviceSize,
    pub size: vk::DeviceSize,
}

/// A command observed by [`DummyCommandRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    PipelineBarrier {
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: Vec<RecordedBufferBarrier>,
        image_barriers: Vec<RecordedImageBarrier>,
    },
    CopyBuffer {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: Vec<RecordedCopy>,
    },
    CopyBufferToImage {
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        buffer_offset: vk::DeviceSize,
        width: u32,
        height: u32,
    },
    BindDescriptorSets {
        layout: vk::PipelineLayout,
        sets: Vec<vk::DescriptorSet>,
        dynamic_offsets: Vec<u32>,
    },
    BindPipeline(vk::Pipeline),
    BindVertexBuffers {
        first_binding: u32,
        buffers: Vec<vk::Buffer>,
        offsets: Vec<vk::DeviceSize>,
    },
    Draw {
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    },
}

/// [`CommandRecorder`] that records commands and executes copies against a
/// [`DummyObjectManager`].
#[derive(Default)]
pub struct DummyCommandRecorder {
    object_manager: Option<Arc<DummyObjectManager>>,
    commands: Mutex<Vec<RecordedCommand>>,
    images: Mutex<HashMap<vk::Image, Vec<u8>>>,
}

impl DummyCommandRecorder {
    /// A recorder whose copies read and write `object_manager`'s buffers.
    pub fn with_object_manager(object_manager: Arc<DummyObjectManager>) -> Self {
        Self {
            object_manager: Some(object_manager),
            ..Self::default()
        }
    }

    pub fn commands(&self) -> Vec<RecordedCommand> {
        self.commands.lock().clone()
    }

    pub fn clear(&self) {
        self.commands.lock().clear();
    }

    /// Pixels last copied into an image.
    pub fn image_contents(&self, image: vk::Image) -> Option<Vec<u8>> {
        self.images.lock().get(&image).cloned()
    }

    fn record(&self, command: RecordedCommand) {
        self.commands.lock().push(command);
    }
}

impl CommandRecorder for DummyCommandRecorder {
    fn pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        self.record(RecordedCommand::PipelineBarrier {
            cmd,
            src_stage,
            dst_stage,
            buffer_barriers: buffer_barriers
                .iter()
                .map(|barrier| RecordedBufferBarrier {
                    buffer: barrier.buffer,
                    src_access: barrier.src_access_mask,
                    dst_access: barrier.dst_access_mask,
                    offset: barrier.offset,
                    size: barrier.size,
                })
                .collect(),
            image_barriers: image_barriers
                .iter()
                .map(|barrier| RecordedImageBarrier {
                    image: barrier.image,
                    old_layout: barrier.old_layout,
                    new_layout: barrier.new_layout,
                    src_access: barrier.src_access_mask,
                    dst_access: barrier.dst_access_mask,
                })
                .collect(),
        });
    }

    fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        if let Some(manager) = &self.object_manager {
            for region in regions {
                let bytes = manager.read(src, region.src_offset, region.size);
                manager.store(dst, region.dst_offset, &bytes);
            }
        }

        self.record(RecordedCommand::CopyBuffer {
            cmd,
            src,
            dst,
            regions: regions
                .iter()
                .map(|region| RecordedCopy {
                    src_offset: region.src_offset,
                    dst_offset: region.dst_offset,
                    size: region.size,
                })
                .collect(),
        });
    }

    fn copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        for region in regions {
            let extent = region.image_extent;
            if let Some(manager) = &self.object_manager {
                let size = extent.width as u64 * extent.height as u64 * 4;
                let pixels = manager.read(src, region.buffer_offset, size);
                self.images.lock().insert(image, pixels);
            }

            self.record(RecordedCommand::CopyBufferToImage {
                cmd,
                src,
                image,
                layout,
                buffer_offset: region.buffer_offset,
                width: extent.width,
                height: extent.height,
            });
        }
    }

    fn bind_descriptor_sets(
        &self,
        _cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        self.record(RecordedCommand::BindDescriptorSets {
            layout,
            sets: sets.to_vec(),
            dynamic_offsets: dynamic_offsets.to_vec(),
        });
    }

    fn bind_pipeline(&self, _cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        self.record(RecordedCommand::BindPipeline(pipeline));
    }

    fn bind_vertex_buffers(
        &self,
        _cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        self.record(RecordedCommand::BindVertexBuffers {
            first_binding,
            buffers: buffers.to_vec(),
            offsets: offsets.to_vec(),
        });
    }

    fn draw(
        &self,
        _cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        self.record(RecordedCommand::Draw {
            vertex_count,
            instance_count,
            first_vertex,
            first_instance,
        });
    }
}

enum PendingRelease {
    Buffer(vk::Buffer),
    DescriptorSet(vk::DescriptorSet),
}

struct ObjectState {
    next_handle: u64,
    buffers: HashMap<u64, Vec<u8>>,
    descriptor_sets: HashMap<vk::DescriptorSet, Vec<ParamDescriptor>>,
    destroyed_buffers: Vec<vk::Buffer>,
    destroyed_descriptor_sets: Vec<vk::DescriptorSet>,
    pending: DeferredReleaseQueue<PendingRelease>,
    freed_buffers: Vec<vk::Buffer>,
    flush_count: usize,
    fail_buffer_creation: bool,
}

/// [`ObjectManager`] keeping buffers in host memory.
///
/// Released objects go through the same frame-indexed deferral as on a
/// device: they leave the live set immediately but are only freed by
/// [`advance_frame`](Self::advance_frame) once their frame retired.
pub struct DummyObjectManager {
    state: Mutex<ObjectState>,
}

impl Default for DummyObjectManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyObjectManager {
    pub fn new() -> Self {
        Self::with_frames_in_flight(3)
    }

    pub fn with_frames_in_flight(frames_in_flight: usize) -> Self {
        Self {
            state: Mutex::new(ObjectState {
                next_handle: 1,
                buffers: HashMap::new(),
                descriptor_sets: HashMap::new(),
                destroyed_buffers: Vec::new(),
                destroyed_descriptor_sets: Vec::new(),
                pending: DeferredReleaseQueue::new(frames_in_flight),
                freed_buffers: Vec::new(),
                flush_count: 0,
                fail_buffer_creation: false,
            }),
        }
    }

    /// Contents of a live buffer.
    pub fn buffer_contents(&self, buffer: vk::Buffer) -> Option<Vec<u8>> {
        self.state.lock().buffers.get(&buffer.as_raw()).cloned()
    }

    pub fn live_buffer_count(&self) -> usize {
        self.state.lock().buffers.len()
    }

    /// Buffers handed to [`ObjectManager::destroy_object`], in order.
    pub fn destroyed_buffers(&self) -> Vec<vk::Buffer> {
        self.state.lock().destroyed_buffers.clone()
    }

    /// Buffers whose deferred release has completed.
    pub fn freed_buffers(&self) -> Vec<vk::Buffer> {
        self.state.lock().freed_buffers.clone()
    }

    /// Objects released but still waiting for their frame to retire.
    pub fn pending_release_count(&self) -> usize {
        self.state.lock().pending.pending_count()
    }

    pub fn live_descriptor_set_count(&self) -> usize {
        self.state.lock().descriptor_sets.len()
    }

    pub fn descriptor_set_contents(&self, set: vk::DescriptorSet) -> Option<Vec<ParamDescriptor>> {
        self.state.lock().descriptor_sets.get(&set).cloned()
    }

    pub fn destroyed_descriptor_sets(&self) -> Vec<vk::DescriptorSet> {
        self.state.lock().destroyed_descriptor_sets.clone()
    }

    pub fn flush_count(&self) -> usize {
        self.state.lock().flush_count
    }

    /// Make every following [`ObjectManager::create_buffer`] call fail with
    /// [`ResourceError::AllocationFailed`], as an exhausted device would.
    pub fn set_fail_buffer_creation(&self, fail: bool) {
        self.state.lock().fail_buffer_creation = fail;
    }

    /// Retire the oldest frame and free what it released.
    pub fn advance_frame(&self) {
        let mut state = self.state.lock();
        for item in state.pending.advance_frame() {
            match item {
                PendingRelease::Buffer(buffer) => state.freed_buffers.push(buffer),
                PendingRelease::DescriptorSet(_) => {}
            }
        }
    }

    fn read(&self, buffer: vk::Buffer, offset: vk::DeviceSize, size: vk::DeviceSize) -> Vec<u8> {
        let state = self.state.lock();
        let Some(contents) = state.buffers.get(&buffer.as_raw()) else {
            panic!("read from unknown buffer {buffer:?}");
        };
        contents[offset as usize..(offset + size) as usize].to_vec()
    }

    fn store(&self, buffer: vk::Buffer, offset: vk::DeviceSize, bytes: &[u8]) {
        let mut state = self.state.lock();
        let Some(contents) = state.buffers.get_mut(&buffer.as_raw()) else {
            panic!("write to unknown buffer {buffer:?}");
        };
        let start = offset as usize;
        contents[start..start + bytes.len()].copy_from_slice(bytes);
    }
}

impl ObjectManager for DummyObjectManager {
    fn create_buffer(
        &self,
        resource_type: ResourceType,
        size: u32,
        _batcher_hash: u64,
    ) -> Result<VulkanObject, ResourceError> {
        let mut state = self.state.lock();
        if state.fail_buffer_creation {
            return Err(ResourceError::AllocationFailed(format!(
                "out of device memory for a {size}-byte {resource_type:?} buffer"
            )));
        }
        let id = state.next_handle;
        state.next_handle += 1;
        state.buffers.insert(id, vec![0; size as usize]);
        Ok(VulkanObject {
            id,
            resource_type,
            buffer: vk::Buffer::from_raw(id),
            size,
        })
    }

    fn write(
        &self,
        object: &VulkanObject,
        offset: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        let contents = state
            .buffers
            .get_mut(&object.id)
            .ok_or(ResourceError::UnknownObject(object.id))?;
        let start = offset as usize;
        assert!(
            start + data.len() <= contents.len(),
            "write of {} bytes at offset {offset} overflows buffer of {} bytes",
            data.len(),
            contents.len()
        );
        contents[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }

    fn flush(&self, object: &VulkanObject, _offset: u32, _size: u32) -> Result<(), ResourceError> {
        let mut state = self.state.lock();
        if !state.buffers.contains_key(&object.id) {
            return Err(ResourceError::UnknownObject(object.id));
        }
        state.flush_count += 1;
        Ok(())
    }

    fn destroy_object(&self, object: VulkanObject) {
        let mut state = self.state.lock();
        if state.buffers.remove(&object.id).is_some() {
            state.destroyed_buffers.push(object.buffer);
            state.pending.release(PendingRelease::Buffer(object.buffer));
        }
    }

    fn create_descriptor_set(
        &self,
        _layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, ResourceError> {
        let mut state = self.state.lock();
        let set = vk::DescriptorSet::from_raw(state.next_handle);
        state.next_handle += 1;
        state.descriptor_sets.insert(set, Vec::new());
        Ok(set)
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, descriptors: &[ParamDescriptor]) {
        if let Some(contents) = self.state.lock().descriptor_sets.get_mut(&set) {
            *contents = descriptors.to_vec();
        }
    }

    fn destroy_descriptor_set(&self, set: vk::DescriptorSet) {
        let mut state = self.state.lock();
        if state.descriptor_sets.remove(&set).is_some() {
            state.destroyed_descriptor_sets.push(set);
            state.pending.release(PendingRelease::DescriptorSet(set));
        }
    }
}

/// [`VulkanContext`] over dummy collaborators with fixed pipeline handles.
pub struct DummyVulkanContext {
    object_manager: Arc<DummyObjectManager>,
    recorder: DummyCommandRecorder,
    staging: StagingBuffer,
    param_descriptors: Vec<ParamDescriptor>,
    frame_index: usize,
    recording: bool,
    topology: Option<vk::PrimitiveTopology>,
    binding_info: Vec<BindingInfo>,
    dynamic_offset: u32,
}

impl DummyVulkanContext {
    pub const MEMORY_COMMAND_BUFFER: u64 = 0xC0;
    pub const RENDERING_COMMAND_BUFFER: u64 = 0xC1;
    pub const PIPELINE: u64 = 0xD0;
    pub const PIPELINE_LAYOUT: u64 = 0xD1;
    pub const DESCRIPTOR_SET_LAYOUT: u64 = 0xD2;

    pub fn new(object_manager: Arc<DummyObjectManager>) -> Self {
        Self::with_staging_capacity(object_manager, DEFAULT_STAGING_CAPACITY)
    }

    /// A context whose shared staging buffer holds `capacity` bytes.
    pub fn with_staging_capacity(object_manager: Arc<DummyObjectManager>, capacity: u32) -> Self {
        let staging = match StagingBuffer::new(object_manager.clone(), capacity) {
            Ok(staging) => staging,
            Err(e) => panic!("dummy staging allocation cannot fail: {e}"),
        };

        Self {
            recorder: DummyCommandRecorder::with_object_manager(object_manager.clone()),
            object_manager,
            staging,
            param_descriptors: Vec::new(),
            frame_index: 0,
            recording: true,
            topology: None,
            binding_info: Vec::new(),
            dynamic_offset: 0,
        }
    }

    pub fn recorder(&self) -> &DummyCommandRecorder {
        &self.recorder
    }

    pub fn default_staging(&self) -> &StagingBuffer {
        &self.staging
    }

    pub fn set_param_descriptors(&mut self, descriptors: Vec<ParamDescriptor>) {
        self.param_descriptors = descriptors;
    }

    pub fn set_frame_index(&mut self, frame_index: usize) {
        self.frame_index = frame_index;
    }

    pub fn set_dynamic_buffer_offset(&mut self, offset: u32) {
        self.dynamic_offset = offset;
    }

    /// Topology set by the last draw.
    pub fn primitive_topology(&self) -> Option<vk::PrimitiveTopology> {
        self.topology
    }

    /// Binding info set by the last draw.
    pub fn binding_info(&self) -> &[BindingInfo] {
        &self.binding_info
    }

    /// Stop recording: command buffer accessors return null handles.
    pub fn end_frame(&mut self) {
        self.recording = false;
    }

    /// Submit the frame and start the next one. The shared staging buffer is
    /// reclaimed and the oldest frame's releases are freed.
    pub fn advance_frame(&mut self) {
        self.frame_index += 1;
        self.recording = true;
        self.staging.reset();
        self.recorder.clear();
        self.object_manager.advance_frame();
    }

    fn command_buffer(&self, raw: u64) -> vk::CommandBuffer {
        if self.recording {
            vk::CommandBuffer::from_raw(raw)
        } else {
            vk::CommandBuffer::null()
        }
    }
}

impl VulkanContext for DummyVulkanContext {
    fn commands(&self) -> &dyn CommandRecorder {
        &self.recorder
    }

    fn object_manager(&self) -> Arc<dyn ObjectManager> {
        self.object_manager.clone()
    }

    fn current_memory_command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer(Self::MEMORY_COMMAND_BUFFER)
    }

    fn current_rendering_command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer(Self::RENDERING_COMMAND_BUFFER)
    }

    fn default_staging_buffer(&mut self) -> &mut StagingBuffer {
        &mut self.staging
    }

    fn current_param_descriptors(&self) -> &[ParamDescriptor] {
        &self.param_descriptors
    }

    fn current_descriptor_set_layout(&self) -> vk::DescriptorSetLayout {
        vk::DescriptorSetLayout::from_raw(Self::DESCRIPTOR_SET_LAYOUT)
    }

    fn current_frame_index(&self) -> usize {
        self.frame_index
    }

    fn set_primitive_topology(&mut self, topology: vk::PrimitiveTopology) {
        self.topology = Some(topology);
    }

    fn set_binding_info(&mut self, binding_info: &[BindingInfo]) {
        self.binding_info = binding_info.to_vec();
    }

    fn current_pipeline_layout(&self) -> vk::PipelineLayout {
        vk::PipelineLayout::from_raw(Self::PIPELINE_LAYOUT)
    }

    fn current_pipeline(&mut self) -> vk::Pipeline {
        vk::Pipeline::from_raw(Self::PIPELINE)
    }

    fn current_dynamic_buffer_offset(&self) -> u32 {
        self.dynamic_offset
    }
}
