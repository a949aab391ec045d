//! Frame state a Vulkan mesh consumes from its context.

use std::sync::Arc;

use ash::vk;

use super::binding::BindingInfo;
use super::descriptors::ParamDescriptor;
use super::object_manager::ObjectManager;
use super::staging::StagingBuffer;

/// Vulkan half of a graphics context.
///
/// The frame owner acquires command buffers, owns the default staging buffer
/// and builds pipelines from the state meshes set on it. All of it is valid
/// for the frame being recorded only.
pub trait VulkanContext {
    /// Command recording entry points.
    fn commands(&self) -> &dyn CommandRecorder;

    /// Manager owning every buffer and descriptor set meshes create.
    fn object_manager(&self) -> Arc<dyn ObjectManager>;

    /// Command buffer recording uploads for this frame, null outside a frame.
    fn current_memory_command_buffer(&self) -> vk::CommandBuffer;

    /// Command buffer recording draws for this frame, null outside a frame.
    fn current_rendering_command_buffer(&self) -> vk::CommandBuffer;

    /// Staging buffer shared by every upload of this frame.
    fn default_staging_buffer(&mut self) -> &mut StagingBuffer;

    /// Resources bound to the mesh pipeline this frame.
    fn current_param_descriptors(&self) -> &[ParamDescriptor];

    fn current_descriptor_set_layout(&self) -> vk::DescriptorSetLayout;

    /// Index of the frame being recorded. Increases by one per frame.
    fn current_frame_index(&self) -> usize;

    fn set_primitive_topology(&mut self, topology: vk::PrimitiveTopology);

    /// Vertex input layout for the next [`current_pipeline`](Self::current_pipeline).
    fn set_binding_info(&mut self, binding_info: &[BindingInfo]);

    fn current_pipeline_layout(&self) -> vk::PipelineLayout;

    /// Pipeline matching the program, topology and binding info currently set.
    fn current_pipeline(&mut self) -> vk::Pipeline;

    /// Offset of this draw's parameters in the dynamic uniform buffer.
    fn current_dynamic_buffer_offset(&self) -> u32;
}

/// The Vulkan commands a mesh records.
///
/// `cmd` is always a command buffer in the recording state.
pub trait CommandRecorder {
    fn pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    );

    fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    );

    fn copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    );

    fn bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    );

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline);

    fn bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    );

    fn draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    );
}

impl CommandRecorder for ash::Device {
    fn pipeline_barrier(
        &self,
        cmd: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
        image_barriers: &[vk::ImageMemoryBarrier<'_>],
    ) {
        unsafe {
            self.cmd_pipeline_barrier(
                cmd,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                buffer_barriers,
                image_barriers,
            );
        }
    }

    fn copy_buffer(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: &[vk::BufferCopy],
    ) {
        unsafe { self.cmd_copy_buffer(cmd, src, dst, regions) };
    }

    fn copy_buffer_to_image(
        &self,
        cmd: vk::CommandBuffer,
        src: vk::Buffer,
        image: vk::Image,
        layout: vk::ImageLayout,
        regions: &[vk::BufferImageCopy],
    ) {
        unsafe { self.cmd_copy_buffer_to_image(cmd, src, image, layout, regions) };
    }

    fn bind_descriptor_sets(
        &self,
        cmd: vk::CommandBuffer,
        layout: vk::PipelineLayout,
        sets: &[vk::DescriptorSet],
        dynamic_offsets: &[u32],
    ) {
        unsafe {
            self.cmd_bind_descriptor_sets(
                cmd,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                0,
                sets,
                dynamic_offsets,
            );
        }
    }

    fn bind_pipeline(&self, cmd: vk::CommandBuffer, pipeline: vk::Pipeline) {
        unsafe { self.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline) };
    }

    fn bind_vertex_buffers(
        &self,
        cmd: vk::CommandBuffer,
        first_binding: u32,
        buffers: &[vk::Buffer],
        offsets: &[vk::DeviceSize],
    ) {
        unsafe { self.cmd_bind_vertex_buffers(cmd, first_binding, buffers, offsets) };
    }

    fn draw(
        &self,
        cmd: vk::CommandBuffer,
        vertex_count: u32,
        instance_count: u32,
        first_vertex: u32,
        first_instance: u32,
    ) {
        unsafe {
            self.cmd_draw(
                cmd,
                vertex_count,
                instance_count,
                first_vertex,
                first_instance,
            );
        }
    }
}
