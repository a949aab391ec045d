//! Vulkan buffer and descriptor set ownership.
//!
//! Every GPU object a mesh creates goes through an [`ObjectManager`]. The
//! manager hands out [`VulkanObject`] handles and takes them back through
//! [`ObjectManager::destroy_object`], which never destroys synchronously: the
//! object is parked until the frame that may still reference it has retired.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use ash::vk;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme, Allocator};
use gpu_allocator::MemoryLocation;
use parking_lot::Mutex;

use super::deferred::DeferredReleaseQueue;
use super::descriptors::ParamDescriptor;
use crate::error::ResourceError;

/// What a buffer is used for. Decides usage flags and memory placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// Vertex data read by the input assembler, written by transfers.
    Geometry,
    /// Host-visible transfer source.
    Staging,
}

impl ResourceType {
    /// Usage flags a buffer of this type is created with.
    pub fn buffer_usage(self) -> vk::BufferUsageFlags {
        match self {
            Self::Geometry => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            Self::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Geometry => "mesh geometry",
            Self::Staging => "mesh staging",
        }
    }
}

/// Handle to a buffer owned by an [`ObjectManager`].
///
/// A handle has a single owner. Passing it to
/// [`ObjectManager::destroy_object`] consumes it, so it cannot be used or
/// released again.
#[derive(Debug, PartialEq, Eq)]
pub struct VulkanObject {
    pub id: u64,
    pub resource_type: ResourceType,
    pub buffer: vk::Buffer,
    pub size: u32,
}

/// Creates, fills and releases the Vulkan objects used by meshes.
pub trait ObjectManager {
    /// Create a host-writable buffer of `size` bytes.
    ///
    /// `batcher_hash` groups allocations that are likely to be drawn together;
    /// managers are free to ignore it.
    fn create_buffer(
        &self,
        resource_type: ResourceType,
        size: u32,
        batcher_hash: u64,
    ) -> Result<VulkanObject, ResourceError>;

    /// Copy `data` into the buffer at `offset` without flushing.
    fn write(&self, object: &VulkanObject, offset: u32, data: &[u8])
        -> Result<(), ResourceError>;

    /// Make host writes in `[offset, offset + size)` visible to the device.
    fn flush(&self, object: &VulkanObject, offset: u32, size: u32) -> Result<(), ResourceError>;

    /// Write `data` at the start of the buffer and flush it.
    fn fill(&self, object: &VulkanObject, data: &[u8]) -> Result<(), ResourceError> {
        self.write(object, 0, data)?;
        self.flush(object, 0, data.len() as u32)
    }

    /// Release a buffer once the GPU can no longer be using it.
    fn destroy_object(&self, object: VulkanObject);

    /// Allocate a descriptor set with the given layout.
    fn create_descriptor_set(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, ResourceError>;

    /// Write every descriptor into `set`.
    fn update_descriptor_set(&self, set: vk::DescriptorSet, descriptors: &[ParamDescriptor]);

    /// Release a descriptor set once the GPU can no longer be using it.
    fn destroy_descriptor_set(&self, set: vk::DescriptorSet);
}

enum PendingRelease {
    Buffer {
        buffer: vk::Buffer,
        allocation: Allocation,
    },
    DescriptorSet(vk::DescriptorSet),
}

/// [`ObjectManager`] on top of `ash` and `gpu-allocator`.
///
/// Buffers live in `CpuToGpu` memory so that geometry can be filled directly
/// and staging buffers can be written without an extra copy.
pub struct VulkanObjectManager {
    device: ash::Device,
    allocator: Arc<Mutex<Allocator>>,
    descriptor_pool: vk::DescriptorPool,
    non_coherent_atom_size: u64,
    next_id: AtomicU64,
    buffers: Mutex<HashMap<u64, (vk::Buffer, Allocation)>>,
    pending: Mutex<DeferredReleaseQueue<PendingRelease>>,
}

impl VulkanObjectManager {
    /// Create a manager.
    ///
    /// `descriptor_pool` must be created with
    /// `FREE_DESCRIPTOR_SET` so that individual sets can be returned.
    pub fn new(
        device: ash::Device,
        allocator: Arc<Mutex<Allocator>>,
        descriptor_pool: vk::DescriptorPool,
        limits: &vk::PhysicalDeviceLimits,
        frames_in_flight: usize,
    ) -> Self {
        Self {
            device,
            allocator,
            descriptor_pool,
            non_coherent_atom_size: limits.non_coherent_atom_size.max(1),
            next_id: AtomicU64::new(1),
            buffers: Mutex::new(HashMap::new()),
            pending: Mutex::new(DeferredReleaseQueue::new(frames_in_flight)),
        }
    }

    /// Called once per frame, after waiting on the fence of the frame slot
    /// that is about to be reused. Releases what that slot parked.
    ///
    /// # Safety
    ///
    /// The GPU must have finished every command buffer submitted
    /// `frames_in_flight` frames ago.
    pub unsafe fn advance_frame(&self) {
        let retired = self.pending.lock().advance_frame();
        if !retired.is_empty() {
            log::trace!("Releasing {} deferred mesh objects", retired.len());
        }
        for item in retired {
            self.release(item);
        }
    }

    /// Release everything, including objects still in use by live meshes.
    ///
    /// # Safety
    ///
    /// The device must be idle.
    pub unsafe fn destroy_all(&self) {
        let pending = self.pending.lock().drain_all();
        for item in pending {
            self.release(item);
        }

        let live: Vec<_> = self.buffers.lock().drain().collect();
        if !live.is_empty() {
            log::warn!("Destroying {} mesh buffers that were never released", live.len());
        }
        for (_, (buffer, allocation)) in live {
            self.release(PendingRelease::Buffer { buffer, allocation });
        }
    }

    /// Number of objects waiting for their frame to retire.
    pub fn pending_release_count(&self) -> usize {
        self.pending.lock().pending_count()
    }

    fn release(&self, item: PendingRelease) {
        match item {
            PendingRelease::Buffer { buffer, allocation } => {
                if let Err(e) = self.allocator.lock().free(allocation) {
                    log::error!("Failed to free mesh buffer memory: {e}");
                }
                unsafe { self.device.destroy_buffer(buffer, None) };
            }
            PendingRelease::DescriptorSet(set) => {
                let result = unsafe {
                    self.device
                        .free_descriptor_sets(self.descriptor_pool, &[set])
                };
                if let Err(e) = result {
                    log::error!("Failed to free descriptor set: {e:?}");
                }
            }
        }
    }

}

/// Range of a non-coherent memory flush covering `[offset, offset + size)` of
/// an allocation placed at `allocation_offset` in its memory object.
///
/// The range is widened to `atom`-aligned bounds. When the aligned end runs
/// past the allocation it may also run past the memory object, so the range
/// extends to the end of the memory object instead.
fn flush_range(
    atom: vk::DeviceSize,
    allocation_offset: vk::DeviceSize,
    allocation_size: vk::DeviceSize,
    offset: u32,
    size: u32,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let start = allocation_offset + offset as vk::DeviceSize;
    let end = start + size as vk::DeviceSize;
    let aligned_start = start / atom * atom;
    let aligned_end = end.div_ceil(atom) * atom;

    if aligned_end > allocation_offset + allocation_size {
        (aligned_start, vk::WHOLE_SIZE)
    } else {
        (aligned_start, aligned_end - aligned_start)
    }
}

impl ObjectManager for VulkanObjectManager {
    fn create_buffer(
        &self,
        resource_type: ResourceType,
        size: u32,
        _batcher_hash: u64,
    ) -> Result<VulkanObject, ResourceError> {
        let buffer_info = vk::BufferCreateInfo::default()
            .size(size as vk::DeviceSize)
            .usage(resource_type.buffer_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None) }?;
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let allocation = self
            .allocator
            .lock()
            .allocate(&AllocationCreateDesc {
                name: resource_type.label(),
                requirements,
                location: MemoryLocation::CpuToGpu,
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
            .map_err(|e| {
                unsafe { self.device.destroy_buffer(buffer, None) };
                ResourceError::AllocationFailed(e.to_string())
            })?;

        let bound = unsafe {
            self.device
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };
        if let Err(e) = bound {
            self.release(PendingRelease::Buffer { buffer, allocation });
            return Err(e.into());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.buffers.lock().insert(id, (buffer, allocation));
        log::trace!("Created {} buffer {id} ({size} bytes)", resource_type.label());

        Ok(VulkanObject {
            id,
            resource_type,
            buffer,
            size,
        })
    }

    fn write(
        &self,
        object: &VulkanObject,
        offset: u32,
        data: &[u8],
    ) -> Result<(), ResourceError> {
        let mut buffers = self.buffers.lock();
        let (_, allocation) = buffers
            .get_mut(&object.id)
            .ok_or(ResourceError::UnknownObject(object.id))?;

        let mapped = allocation.mapped_slice_mut().ok_or_else(|| {
            ResourceError::AllocationFailed(format!("buffer {} is not host visible", object.id))
        })?;

        let start = offset as usize;
        let end = start + data.len();
        assert!(
            end <= object.size as usize,
            "write of {} bytes at offset {offset} overflows buffer of {} bytes",
            data.len(),
            object.size
        );
        mapped[start..end].copy_from_slice(data);
        Ok(())
    }

    fn flush(&self, object: &VulkanObject, offset: u32, size: u32) -> Result<(), ResourceError> {
        let buffers = self.buffers.lock();
        let (_, allocation) = buffers
            .get(&object.id)
            .ok_or(ResourceError::UnknownObject(object.id))?;

        if allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(());
        }

        let (range_offset, range_size) = flush_range(
            self.non_coherent_atom_size,
            allocation.offset(),
            allocation.size(),
            offset,
            size,
        );
        let range = vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(range_offset)
            .size(range_size);
        unsafe { self.device.flush_mapped_memory_ranges(&[range]) }?;
        Ok(())
    }

    fn destroy_object(&self, object: VulkanObject) {
        let Some((buffer, allocation)) = self.buffers.lock().remove(&object.id) else {
            log::warn!("Ignoring release of unknown buffer {}", object.id);
            return;
        };
        self.pending
            .lock()
            .release(PendingRelease::Buffer { buffer, allocation });
    }

    fn create_descriptor_set(
        &self,
        layout: vk::DescriptorSetLayout,
    ) -> Result<vk::DescriptorSet, ResourceError> {
        let layouts = [layout];
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.descriptor_pool)
            .set_layouts(&layouts);

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }?;
        Ok(sets[0])
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, descriptors: &[ParamDescriptor]) {
        // Infos must outlive the writes that point into them.
        let buffer_infos: Vec<[vk::DescriptorBufferInfo; 1]> = descriptors
            .iter()
            .map(|descriptor| match descriptor {
                ParamDescriptor::DynamicUniformBuffer { buffer, range, .. } => {
                    [vk::DescriptorBufferInfo {
                        buffer: *buffer,
                        offset: 0,
                        range: *range,
                    }]
                }
                ParamDescriptor::Texture { .. } => [vk::DescriptorBufferInfo::default()],
            })
            .collect();
        let image_infos: Vec<[vk::DescriptorImageInfo; 1]> = descriptors
            .iter()
            .map(|descriptor| match descriptor {
                ParamDescriptor::Texture { view, sampler, .. } => [vk::DescriptorImageInfo {
                    sampler: *sampler,
                    image_view: *view,
                    image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                }],
                ParamDescriptor::DynamicUniformBuffer { .. } => {
                    [vk::DescriptorImageInfo::default()]
                }
            })
            .collect();

        let writes: Vec<vk::WriteDescriptorSet> = descriptors
            .iter()
            .enumerate()
            .map(|(i, descriptor)| match descriptor {
                ParamDescriptor::DynamicUniformBuffer { binding, .. } => {
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(*binding)
                        .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC)
                        .buffer_info(&buffer_infos[i])
                }
                ParamDescriptor::Texture { binding, .. } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(&image_infos[i]),
            })
            .collect();

        if !writes.is_empty() {
            unsafe { self.device.update_descriptor_sets(&writes, &[]) };
        }
    }

    fn destroy_descriptor_set(&self, set: vk::DescriptorSet) {
        self.pending.lock().release(PendingRelease::DescriptorSet(set));
    }
}

impl Drop for VulkanObjectManager {
    fn drop(&mut self) {
        let pending = self.pending.get_mut().pending_count();
        let live = self.buffers.get_mut().len();
        if pending + live > 0 {
            log::warn!(
                "VulkanObjectManager dropped with {live} live and {pending} pending buffers; call destroy_all first"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_usage() {
        assert!(ResourceType::Geometry
            .buffer_usage()
            .contains(vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST));
        assert_eq!(
            ResourceType::Staging.buffer_usage(),
            vk::BufferUsageFlags::TRANSFER_SRC
        );
    }

    #[test]
    fn test_flush_range_aligns_to_atom() {
        assert_eq!(flush_range(64, 256, 512, 10, 20), (256, 64));
        assert_eq!(flush_range(64, 256, 512, 60, 10), (256, 128));
        assert_eq!(flush_range(1, 256, 512, 10, 20), (266, 20));
    }

    #[test]
    fn test_flush_range_never_passes_allocation_end() {
        // Allocation [100, 136) with 64-byte atoms: aligning the end to 192
        // would leave the allocation, and possibly the memory object.
        assert_eq!(flush_range(64, 100, 36, 0, 36), (64, vk::WHOLE_SIZE));

        // Ending exactly on an atom boundary inside the allocation is kept.
        assert_eq!(flush_range(64, 0, 128, 0, 128), (0, 128));
    }
}
