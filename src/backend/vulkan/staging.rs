//! Host-visible linear staging allocator.
//!
//! A staging buffer hands out sub-ranges of one transfer-source buffer.
//! Reservations are bump-allocated and only reclaimed all at once by
//! [`StagingBuffer::reset`], which the frame owner calls once the frame that
//! consumed the copies has retired.

use std::sync::Arc;

use super::object_manager::{ObjectManager, ResourceType, VulkanObject};
use crate::error::ResourceError;
use ash::vk;

const RESERVE_ALIGNMENT: u32 = 16;

/// A range reserved inside a staging buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingData {
    /// The staging buffer to copy from.
    pub buffer: vk::Buffer,
    /// Byte offset of the reservation.
    pub offset: u32,
    /// Byte length of the reservation.
    pub size: u32,
}

/// Linear allocator over one staging [`VulkanObject`].
pub struct StagingBuffer {
    object_manager: Arc<dyn ObjectManager>,
    object: Option<VulkanObject>,
    capacity: u32,
    offset: u32,
}

impl StagingBuffer {
    /// Allocate a staging buffer of `capacity` bytes.
    pub fn new(
        object_manager: Arc<dyn ObjectManager>,
        capacity: u32,
    ) -> Result<Self, ResourceError> {
        let object = object_manager.create_buffer(ResourceType::Staging, capacity, 0)?;
        Ok(Self {
            object_manager,
            object: Some(object),
            capacity,
            offset: 0,
        })
    }

    fn object(&self) -> &VulkanObject {
        self.object
            .as_ref()
            .unwrap_or_else(|| unreachable!("staging object is only taken on drop"))
    }

    /// Whether a reservation of `size` bytes would fit.
    pub fn has_enough_space(&self, size: u32) -> bool {
        let start = self.offset.next_multiple_of(RESERVE_ALIGNMENT);
        start
            .checked_add(size)
            .is_some_and(|end| end <= self.capacity)
    }

    /// Reserve `size` bytes.
    pub fn reserve(&mut self, size: u32) -> Result<StagingData, ResourceError> {
        if !self.has_enough_space(size) {
            return Err(ResourceError::OutOfStagingSpace {
                requested: size,
                available: self.available(),
            });
        }

        let offset = self.offset.next_multiple_of(RESERVE_ALIGNMENT);
        self.offset = offset + size;
        Ok(StagingData {
            buffer: self.object().buffer,
            offset,
            size,
        })
    }

    /// Copy `bytes` into a reservation. `bytes` must not exceed its size.
    pub fn write(&self, data: &StagingData, bytes: &[u8]) -> Result<(), ResourceError> {
        assert!(
            bytes.len() <= data.size as usize,
            "{} bytes do not fit a {}-byte reservation",
            bytes.len(),
            data.size
        );
        self.object_manager.write(self.object(), data.offset, bytes)
    }

    /// Reserve space for `bytes` and copy them in.
    pub fn push(&mut self, bytes: &[u8]) -> Result<StagingData, ResourceError> {
        let data = self.reserve(bytes.len() as u32)?;
        self.write(&data, bytes)?;
        Ok(data)
    }

    /// Make every write since the last reset visible to the device.
    pub fn flush(&self) -> Result<(), ResourceError> {
        if self.offset == 0 {
            return Ok(());
        }
        self.object_manager.flush(self.object(), 0, self.offset)
    }

    /// Reclaim every reservation.
    pub fn reset(&mut self) {
        self.offset = 0;
    }

    /// The backing buffer.
    pub fn buffer(&self) -> vk::Buffer {
        self.object().buffer
    }

    /// Size of the backing buffer in bytes.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Bytes reserved since the last reset.
    pub fn used(&self) -> u32 {
        self.offset
    }

    fn available(&self) -> u32 {
        self.capacity
            .saturating_sub(self.offset.next_multiple_of(RESERVE_ALIGNMENT))
    }
}

impl std::fmt::Debug for StagingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingBuffer")
            .field("object", &self.object)
            .field("capacity", &self.capacity)
            .field("offset", &self.offset)
            .finish()
    }
}

impl Drop for StagingBuffer {
    fn drop(&mut self) {
        if let Some(object) = self.object.take() {
            self.object_manager.destroy_object(object);
        }
    }
}
