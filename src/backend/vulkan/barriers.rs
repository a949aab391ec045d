//! Pipeline barriers recorded around mesh uploads.
//!
//! Texture uploads move the destination image through
//! `Undefined -> TransferDst -> ShaderReadOnly`; buffer updates make the
//! transfer write visible to vertex input before the next draw.

use ash::vk;

use super::context::CommandRecorder;

/// Image layouts a mesh texture passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureLayout {
    /// Contents are undefined and may be discarded.
    Undefined,
    /// Destination of a buffer-to-image copy.
    TransferDst,
    /// Sampled by the fragment shader.
    ShaderReadOnly,
}

impl TextureLayout {
    /// The matching Vulkan image layout.
    pub fn to_vk(self) -> vk::ImageLayout {
        match self {
            Self::Undefined => vk::ImageLayout::UNDEFINED,
            Self::TransferDst => vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            Self::ShaderReadOnly => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Accesses that must complete before leaving this layout.
    pub fn src_access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
        }
    }

    /// Accesses that wait for the transition into this layout.
    pub fn dst_access_mask(self) -> vk::AccessFlags {
        match self {
            Self::Undefined => vk::AccessFlags::empty(),
            Self::TransferDst => vk::AccessFlags::TRANSFER_WRITE,
            Self::ShaderReadOnly => vk::AccessFlags::SHADER_READ,
        }
    }

    /// Stage that must finish before leaving this layout.
    pub fn src_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
        }
    }

    /// Stage that waits for the transition into this layout.
    pub fn dst_stage(self) -> vk::PipelineStageFlags {
        match self {
            Self::Undefined => vk::PipelineStageFlags::TOP_OF_PIPE,
            Self::TransferDst => vk::PipelineStageFlags::TRANSFER,
            Self::ShaderReadOnly => vk::PipelineStageFlags::FRAGMENT_SHADER,
        }
    }
}

/// Subresource range of the single mip level and layer of a mesh texture.
pub fn color_subresource_range() -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        base_mip_level: 0,
        level_count: 1,
        base_array_layer: 0,
        layer_count: 1,
    }
}

/// Record a layout transition of a color image.
///
/// Does nothing if `old_layout == new_layout`.
pub fn record_image_transition(
    recorder: &dyn CommandRecorder,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    old_layout: TextureLayout,
    new_layout: TextureLayout,
) {
    if old_layout == new_layout {
        return;
    }

    let barrier = vk::ImageMemoryBarrier::default()
        .old_layout(old_layout.to_vk())
        .new_layout(new_layout.to_vk())
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(color_subresource_range())
        .src_access_mask(old_layout.src_access_mask())
        .dst_access_mask(new_layout.dst_access_mask());

    recorder.pipeline_barrier(
        cmd,
        old_layout.src_stage(),
        new_layout.dst_stage(),
        &[],
        &[barrier],
    );
}

/// Record a barrier making a transfer write into a vertex buffer visible to
/// vertex attribute fetch.
pub fn record_vertex_buffer_write_barrier(
    recorder: &dyn CommandRecorder,
    cmd: vk::CommandBuffer,
    buffer: vk::Buffer,
    size: vk::DeviceSize,
) {
    let barrier = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::VERTEX_ATTRIBUTE_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(size);

    recorder.pipeline_barrier(
        cmd,
        vk::PipelineStageFlags::TRANSFER,
        vk::PipelineStageFlags::VERTEX_INPUT,
        &[barrier],
        &[],
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyCommandRecorder, RecordedCommand};
    use ash::vk::Handle;

    #[test]
    fn test_layout_masks() {
        assert_eq!(
            TextureLayout::Undefined.src_access_mask(),
            vk::AccessFlags::empty()
        );
        assert_eq!(
            TextureLayout::TransferDst.dst_access_mask(),
            vk::AccessFlags::TRANSFER_WRITE
        );
        assert_eq!(
            TextureLayout::ShaderReadOnly.dst_stage(),
            vk::PipelineStageFlags::FRAGMENT_SHADER
        );
        assert_eq!(
            TextureLayout::ShaderReadOnly.to_vk(),
            vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL
        );
    }

    #[test]
    fn test_same_layout_records_nothing() {
        let recorder = DummyCommandRecorder::default();
        record_image_transition(
            &recorder,
            vk::CommandBuffer::from_raw(1),
            vk::Image::from_raw(7),
            TextureLayout::ShaderReadOnly,
            TextureLayout::ShaderReadOnly,
        );
        assert!(recorder.commands().is_empty());
    }

    #[test]
    fn test_image_transition_stages() {
        let recorder = DummyCommandRecorder::default();
        record_image_transition(
            &recorder,
            vk::CommandBuffer::from_raw(1),
            vk::Image::from_raw(7),
            TextureLayout::Undefined,
            TextureLayout::TransferDst,
        );

        let commands = recorder.commands();
        assert_eq!(commands.len(), 1);
        let RecordedCommand::PipelineBarrier {
            src_stage,
            dst_stage,
            image_barriers,
            buffer_barriers,
            ..
        } = &commands[0]
        else {
            panic!("expected a pipeline barrier, got {:?}", commands[0]);
        };
        assert_eq!(*src_stage, vk::PipelineStageFlags::TOP_OF_PIPE);
        assert_eq!(*dst_stage, vk::PipelineStageFlags::TRANSFER);
        assert!(buffer_barriers.is_empty());
        assert_eq!(image_barriers.len(), 1);
        assert_eq!(image_barriers[0].old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(
            image_barriers[0].new_layout,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL
        );
        assert_eq!(image_barriers[0].image, vk::Image::from_raw(7));
    }

    #[test]
    fn test_vertex_buffer_barrier() {
        let recorder = DummyCommandRecorder::default();
        record_vertex_buffer_write_barrier(
            &recorder,
            vk::CommandBuffer::from_raw(1),
            vk::Buffer::from_raw(3),
            36,
        );

        let commands = recorder.commands();
        let RecordedCommand::PipelineBarrier {
            src_stage,
            dst_stage,
            buffer_barriers,
            ..
        } = &commands[0]
        else {
            panic!("expected a pipeline barrier, got {:?}", commands[0]);
        };
        assert_eq!(*src_stage, vk::PipelineStageFlags::TRANSFER);
        assert_eq!(*dst_stage, vk::PipelineStageFlags::VERTEX_INPUT);
        assert_eq!(buffer_barriers[0].src_access, vk::AccessFlags::TRANSFER_WRITE);
        assert_eq!(
            buffer_barriers[0].dst_access,
            vk::AccessFlags::VERTEX_ATTRIBUTE_READ
        );
        assert_eq!(buffer_barriers[0].size, 36);
    }
}
