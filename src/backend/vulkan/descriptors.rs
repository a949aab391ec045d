//! Per-frame descriptor sets for mesh draws.
//!
//! The frame owner publishes the parameters of the current frame as a list of
//! [`ParamDescriptor`]s. A mesh keeps one descriptor set per frame slot and
//! rewrites it only when that slot's parameters changed since it was last
//! used. A replaced set is released through the deferred path, since the
//! frame that last used it may still be executing.

use std::sync::Arc;

use ash::vk;

use super::context::VulkanContext;
use super::object_manager::ObjectManager;
use crate::error::ResourceError;

/// One resource bound to the mesh pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamDescriptor {
    /// Uniform buffer addressed through a dynamic offset at bind time.
    DynamicUniformBuffer {
        binding: u32,
        buffer: vk::Buffer,
        range: vk::DeviceSize,
    },
    /// Sampled texture.
    Texture {
        binding: u32,
        image: vk::Image,
        view: vk::ImageView,
        sampler: vk::Sampler,
    },
}

impl ParamDescriptor {
    /// Binding slot within the set.
    pub fn binding(&self) -> u32 {
        match self {
            Self::DynamicUniformBuffer { binding, .. } | Self::Texture { binding, .. } => *binding,
        }
    }

    /// The image of a texture slot.
    pub fn texture_image(&self) -> Option<vk::Image> {
        match self {
            Self::Texture { image, .. } => Some(*image),
            Self::DynamicUniformBuffer { .. } => None,
        }
    }
}

#[derive(Debug)]
struct FrameDescriptors {
    descriptors: Vec<ParamDescriptor>,
    set: vk::DescriptorSet,
}

/// Keeps the descriptor sets of one mesh up to date across frames.
pub struct DescriptorSetUpdater {
    object_manager: Arc<dyn ObjectManager>,
    frames: Vec<Option<FrameDescriptors>>,
    current: Option<vk::DescriptorSet>,
}

impl DescriptorSetUpdater {
    /// Updater keeping one descriptor set per frame in flight, allocated
    /// through `object_manager`.
    ///
    /// # Panics
    ///
    /// Panics if `frames_in_flight` is zero.
    pub fn new(object_manager: Arc<dyn ObjectManager>, frames_in_flight: usize) -> Self {
        assert!(frames_in_flight > 0, "at least one frame must be in flight");
        Self {
            object_manager,
            frames: (0..frames_in_flight).map(|_| None).collect(),
            current: None,
        }
    }

    /// Make the descriptor set of the context's current frame match the
    /// frame's parameters.
    pub fn update(&mut self, context: &mut dyn VulkanContext) -> Result<(), ResourceError> {
        let slot = context.current_frame_index() % self.frames.len();
        let descriptors = context.current_param_descriptors();

        if let Some(frame) = &self.frames[slot] {
            if frame.descriptors == descriptors {
                self.current = Some(frame.set);
                return Ok(());
            }
        }

        let set = self
            .object_manager
            .create_descriptor_set(context.current_descriptor_set_layout())?;
        self.object_manager.update_descriptor_set(set, descriptors);
        log::trace!("Rewrote mesh descriptor set for frame slot {slot}");

        let replaced = self.frames[slot].replace(FrameDescriptors {
            descriptors: descriptors.to_vec(),
            set,
        });
        if let Some(old) = replaced {
            self.object_manager.destroy_descriptor_set(old.set);
        }

        self.current = Some(set);
        Ok(())
    }

    /// The set selected by the last [`update`](Self::update).
    pub fn descriptor_set(&self) -> Option<vk::DescriptorSet> {
        self.current
    }

    /// Release every set this updater allocated.
    pub fn destroy(&mut self) {
        for frame in self.frames.iter_mut().filter_map(Option::take) {
            self.object_manager.destroy_descriptor_set(frame.set);
        }
        self.current = None;
    }
}

impl Drop for DescriptorSetUpdater {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::dummy::{DummyObjectManager, DummyVulkanContext};
    use ash::vk::Handle;

    fn uniform(buffer: u64) -> ParamDescriptor {
        ParamDescriptor::DynamicUniformBuffer {
            binding: 0,
            buffer: vk::Buffer::from_raw(buffer),
            range: 64,
        }
    }

    #[test]
    fn test_texture_image() {
        let texture = ParamDescriptor::Texture {
            binding: 1,
            image: vk::Image::from_raw(5),
            view: vk::ImageView::from_raw(6),
            sampler: vk::Sampler::from_raw(7),
        };
        assert_eq!(texture.texture_image(), Some(vk::Image::from_raw(5)));
        assert_eq!(texture.binding(), 1);
        assert_eq!(uniform(1).texture_image(), None);
    }

    #[test]
    fn test_set_is_reused_while_parameters_are_unchanged() {
        let manager = Arc::new(DummyObjectManager::new());
        let mut context = DummyVulkanContext::new(manager.clone());
        context.set_param_descriptors(vec![uniform(1)]);
        let mut updater = DescriptorSetUpdater::new(manager.clone(), 2);

        updater.update(&mut context).unwrap();
        let first = updater.descriptor_set().unwrap();
        updater.update(&mut context).unwrap();

        assert_eq!(updater.descriptor_set(), Some(first));
        assert_eq!(manager.live_descriptor_set_count(), 1);
    }

    #[test]
    fn test_each_frame_slot_has_its_own_set() {
        let manager = Arc::new(DummyObjectManager::new());
        let mut context = DummyVulkanContext::new(manager.clone());
        context.set_param_descriptors(vec![uniform(1)]);
        let mut updater = DescriptorSetUpdater::new(manager.clone(), 2);

        updater.update(&mut context).unwrap();
        let frame0 = updater.descriptor_set().unwrap();
        context.set_frame_index(1);
        updater.update(&mut context).unwrap();
        let frame1 = updater.descriptor_set().unwrap();

        assert_ne!(frame0, frame1);
        assert_eq!(manager.live_descriptor_set_count(), 2);
    }

    #[test]
    fn test_changed_parameters_replace_the_set() {
        let manager = Arc::new(DummyObjectManager::new());
        let mut context = DummyVulkanContext::new(manager.clone());
        context.set_param_descriptors(vec![uniform(1)]);
        let mut updater = DescriptorSetUpdater::new(manager.clone(), 2);

        updater.update(&mut context).unwrap();
        let old = updater.descriptor_set().unwrap();
        context.set_param_descriptors(vec![uniform(2)]);
        updater.update(&mut context).unwrap();

        assert_ne!(updater.descriptor_set(), Some(old));
        assert_eq!(manager.destroyed_descriptor_sets(), vec![old]);
        assert_eq!(
            manager.descriptor_set_contents(updater.descriptor_set().unwrap()),
            Some(vec![uniform(2)])
        );
    }

    #[test]
    fn test_destroy_releases_all_sets() {
        let manager = Arc::new(DummyObjectManager::new());
        let mut context = DummyVulkanContext::new(manager.clone());
        let mut updater = DescriptorSetUpdater::new(manager.clone(), 3);
        for frame in 0..3 {
            context.set_frame_index(frame);
            updater.update(&mut context).unwrap();
        }
        assert_eq!(manager.live_descriptor_set_count(), 3);

        updater.destroy();
        assert_eq!(manager.live_descriptor_set_count(), 0);
        assert_eq!(updater.descriptor_set(), None);
    }
}
