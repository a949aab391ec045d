//! Vulkan mesh backend.
//!
//! Geometry lives in host-visible buffers filled at build time. Later updates
//! go through a staging buffer and a transfer, so they are ordered with the
//! draws already recorded this frame. Nothing is bound persistently: every
//! draw sets topology and vertex layout on the context, refreshes the frame's
//! descriptor set and records the binds itself.
//!
//! # Module Structure
//!
//! - [`context`]: [`VulkanContext`] frame state and the [`CommandRecorder`] seam
//! - [`object_manager`]: buffer and descriptor set ownership
//! - [`staging`]: linear staging allocator
//! - [`descriptors`]: per-frame descriptor set caching
//! - [`binding`]: vertex input layout
//! - [`barriers`]: upload synchronization
//! - [`deferred`]: frame-indexed release queue

pub mod barriers;
pub mod binding;
pub mod context;
pub mod deferred;
pub mod descriptors;
pub mod object_manager;
pub mod staging;

pub use binding::{BindingDecl, BindingInfo, ComponentType};
pub use context::{CommandRecorder, VulkanContext};
pub use deferred::DeferredReleaseQueue;
pub use descriptors::{DescriptorSetUpdater, ParamDescriptor};
pub use object_manager::{ObjectManager, ResourceType, VulkanObject, VulkanObjectManager};
pub use staging::{StagingBuffer, StagingData};

use std::sync::Arc;

use ash::vk;

use self::barriers::{record_image_transition, record_vertex_buffer_write_barrier, TextureLayout};
use super::MeshBackend;
use crate::config::MeshConfig;
use crate::context::GraphicsContext;
use crate::error::{MeshError, MeshResult, ResourceError};
use crate::mesh::MeshData;
use crate::program::GpuProgram;
use crate::texture::{load_rgba8, DecodedImage};
use crate::types::{ApiVersion, DrawPrimitive};

/// Topology for a primitive kind.
pub fn primitive_topology(primitive: DrawPrimitive) -> vk::PrimitiveTopology {
    match primitive {
        DrawPrimitive::Triangles => vk::PrimitiveTopology::TRIANGLE_LIST,
        DrawPrimitive::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        DrawPrimitive::LineStrip => vk::PrimitiveTopology::LINE_STRIP,
    }
}

fn vulkan_context(context: &mut dyn GraphicsContext) -> MeshResult<&mut dyn VulkanContext> {
    let reported = context.api_version();
    context.vulkan().ok_or(MeshError::ContextMismatch {
        backend: "Vulkan",
        reported,
    })
}

/// Vulkan realization of a mesh object.
pub struct VulkanMeshBackend {
    object_manager: Arc<dyn ObjectManager>,
    /// One entry per mesh buffer, `None` for buffers that were empty at build time.
    geometry_buffers: Vec<Option<VulkanObject>>,
    binding_info: Vec<BindingInfo>,
    descriptor_updater: DescriptorSetUpdater,
    max_binding_info: usize,
}

impl VulkanMeshBackend {
    pub fn new(object_manager: Arc<dyn ObjectManager>, config: &MeshConfig) -> Self {
        Self {
            descriptor_updater: DescriptorSetUpdater::new(
                object_manager.clone(),
                config.frames_in_flight,
            ),
            object_manager,
            geometry_buffers: Vec::new(),
            binding_info: Vec::new(),
            max_binding_info: config.max_binding_info,
        }
    }

    /// Vertex input layout captured by the last build.
    pub fn binding_info(&self) -> &[BindingInfo] {
        &self.binding_info
    }

    /// Device buffer of a mesh buffer, `None` if it has none.
    pub fn geometry_buffer(&self, buffer_index: usize) -> Option<vk::Buffer> {
        self.geometry_buffers
            .get(buffer_index)
            .and_then(Option::as_ref)
            .map(|object| object.buffer)
    }

    fn build_geometry(&mut self, mesh: &MeshData, program: &dyn GpuProgram) -> MeshResult<()> {
        for (i, buffer) in mesh.buffers().iter().enumerate() {
            if buffer.is_empty() {
                self.geometry_buffers.push(None);
                continue;
            }

            let object = self.object_manager.create_buffer(
                ResourceType::Geometry,
                buffer.size_in_bytes(),
                0,
            )?;
            let filled = self.object_manager.fill(&object, buffer.bytes());
            self.geometry_buffers.push(Some(object));
            filled?;

            self.binding_info
                .push(BindingInfo::from_vertex_buffer(i, buffer, program));
        }
        Ok(())
    }

    fn upload_texture(&self, vulkan: &mut dyn VulkanContext, path: &str) -> MeshResult<()> {
        let decoded = load_rgba8(path)?;

        let cmd = vulkan.current_memory_command_buffer();
        if cmd == vk::CommandBuffer::null() {
            return Err(MeshError::MissingCommandBuffer("memory"));
        }

        let image = vulkan
            .current_param_descriptors()
            .iter()
            .find_map(ParamDescriptor::texture_image)
            .ok_or(ResourceError::DescriptorNotFound)?;

        // Released through the object manager when it goes out of scope, so the
        // memory survives until the copy below has executed. Staged before any
        // command is recorded: a failure here leaves the command buffer as it was.
        let mut staging =
            StagingBuffer::new(self.object_manager.clone(), decoded.size_in_bytes())?;
        let data = staging.push(&decoded.pixels)?;
        staging.flush()?;

        let recorder = vulkan.commands();
        record_image_transition(
            recorder,
            cmd,
            image,
            TextureLayout::Undefined,
            TextureLayout::TransferDst,
        );
        recorder.copy_buffer_to_image(
            cmd,
            data.buffer,
            image,
            TextureLayout::TransferDst.to_vk(),
            &[image_copy_region(&decoded, data.offset)],
        );

        record_image_transition(
            recorder,
            cmd,
            image,
            TextureLayout::TransferDst,
            TextureLayout::ShaderReadOnly,
        );

        log::debug!(
            "Uploaded mesh texture {path} ({}x{}, {} bytes)",
            decoded.width,
            decoded.height,
            decoded.size_in_bytes()
        );
        Ok(())
    }
}

fn image_copy_region(image: &DecodedImage, buffer_offset: u32) -> vk::BufferImageCopy {
    vk::BufferImageCopy {
        buffer_offset: buffer_offset as vk::DeviceSize,
        buffer_row_length: 0,
        buffer_image_height: 0,
        image_subresource: vk::ImageSubresourceLayers {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            mip_level: 0,
            base_array_layer: 0,
            layer_count: 1,
        },
        image_offset: vk::Offset3D { x: 0, y: 0, z: 0 },
        image_extent: vk::Extent3D {
            width: image.width,
            height: image.height,
            depth: 1,
        },
    }
}

impl MeshBackend for VulkanMeshBackend {
    fn build(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        program: &dyn GpuProgram,
    ) -> MeshResult<()> {
        assert!(
            mesh.buffers().len() <= self.max_binding_info,
            "mesh has {} buffers, at most {} vertex bindings are supported",
            mesh.buffers().len(),
            self.max_binding_info
        );

        self.build_geometry(mesh, program)?;

        let textures: Vec<&str> = mesh
            .textures()
            .iter()
            .map(String::as_str)
            .filter(|path| !path.is_empty())
            .collect();
        if !textures.is_empty() {
            let vulkan = vulkan_context(context)?;
            for path in textures {
                self.upload_texture(vulkan, path)?;
            }
        }

        log::debug!(
            "Built Vulkan mesh: {} buffers, {} bindings, {} textures",
            self.geometry_buffers.len(),
            self.binding_info.len(),
            mesh.textures().len()
        );
        Ok(())
    }

    fn reset(&mut self) {
        self.descriptor_updater.destroy();
        for object in self.geometry_buffers.drain(..).flatten() {
            self.object_manager.destroy_object(object);
        }
        self.binding_info.clear();
    }

    fn update_buffer(
        &mut self,
        mesh: &MeshData,
        context: &mut dyn GraphicsContext,
        buffer_index: usize,
    ) -> MeshResult<()> {
        assert!(
            buffer_index < self.geometry_buffers.len(),
            "buffer index {buffer_index} out of range ({} buffers built)",
            self.geometry_buffers.len()
        );
        let Some(target) = self.geometry_buffers[buffer_index].as_ref() else {
            panic!("buffer {buffer_index} was empty at build time and has no device buffer");
        };

        let vulkan = vulkan_context(context)?;
        let cmd = vulkan.current_memory_command_buffer();
        if cmd == vk::CommandBuffer::null() {
            return Err(MeshError::MissingCommandBuffer("memory"));
        }

        let bytes = mesh.buffers()[buffer_index].bytes();
        let size = bytes.len() as u32;

        // A late update in a busy frame may find the shared buffer full.
        let mut temporary = None;
        let data = {
            let shared = vulkan.default_staging_buffer();
            if shared.has_enough_space(size) {
                let data = shared.push(bytes)?;
                shared.flush()?;
                data
            } else {
                log::trace!("Shared staging buffer full, staging {size} bytes separately");
                let staging =
                    temporary.insert(StagingBuffer::new(self.object_manager.clone(), size)?);
                let data = staging.push(bytes)?;
                staging.flush()?;
                data
            }
        };

        let recorder = vulkan.commands();
        recorder.copy_buffer(
            cmd,
            data.buffer,
            target.buffer,
            &[vk::BufferCopy {
                src_offset: data.offset as vk::DeviceSize,
                dst_offset: 0,
                size: size as vk::DeviceSize,
            }],
        );
        record_vertex_buffer_write_barrier(recorder, cmd, target.buffer, size as vk::DeviceSize);

        drop(temporary);
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
        let vulkan = vulkan_context(context)?;
        let cmd = vulkan.current_rendering_command_buffer();
        if cmd == vk::CommandBuffer::null() {
            return Err(MeshError::MissingCommandBuffer("rendering"));
        }

        vulkan.set_primitive_topology(primitive_topology(mesh.draw_primitive()));
        vulkan.set_binding_info(&self.binding_info);

        self.descriptor_updater.update(vulkan)?;
        let pipeline = vulkan.current_pipeline();
        let layout = vulkan.current_pipeline_layout();
        let dynamic_offset = vulkan.current_dynamic_buffer_offset();

        let recorder = vulkan.commands();
        if let Some(set) = self.descriptor_updater.descriptor_set() {
            recorder.bind_descriptor_sets(cmd, layout, &[set], &[dynamic_offset]);
        }
        recorder.bind_pipeline(cmd, pipeline);

        for (binding, object) in self.geometry_buffers.iter().enumerate() {
            if let Some(object) = object {
                recorder.bind_vertex_buffers(cmd, binding as u32, &[object.buffer], &[0]);
            }
        }

        log::trace!("Vulkan draw: {vertex_count} vertices");
        recorder.draw(cmd, vertex_count, 1, 0, 0);
        Ok(())
    }
}
