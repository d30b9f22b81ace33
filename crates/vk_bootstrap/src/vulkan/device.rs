//! Logical device creation
//!
//! One queue is created per distinct family at priority 1.0; shared graphics/present families
//! collapse into a single queue-create entry.

use ash::extensions::khr;
use ash::{vk, Device, Instance};
use std::collections::BTreeMap;

use crate::vulkan::error::{VulkanError, VulkanResult};
use crate::vulkan::ffi::NameList;
use crate::vulkan::physical_device::SelectedDevice;
use crate::vulkan::queue_family::QueueFamilyIndices;

static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// What the device is created with beyond the selected physical device
#[derive(Debug, Clone, Default)]
pub struct DeviceRequest {
    /// Device extensions to enable
    pub extensions: Vec<String>,
    /// Layers to enable, matching the instance's layers
    pub layers: Vec<String>,
    /// Features to enable; defaults to none
    pub features: vk::PhysicalDeviceFeatures,
}

/// One create-info per family, each asking for a single queue at priority 1.0
///
/// `families` must already be free of duplicates.
pub fn queue_create_infos(families: &[u32]) -> Vec<vk::DeviceQueueCreateInfo> {
    families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::builder()
                .queue_family_index(family)
                .queue_priorities(&QUEUE_PRIORITIES)
                .build()
        })
        .collect()
}

/// Logical device with one queue per distinct family
pub struct LogicalDevice {
    device: Device,
    physical_device: vk::PhysicalDevice,
    queue_families: QueueFamilyIndices,
    queues: BTreeMap<u32, vk::Queue>,
    swapchain_loader: khr::Swapchain,
}

impl LogicalDevice {
    /// Create the device and fetch its queues
    pub fn new(
        instance: &Instance,
        selected: &SelectedDevice,
        request: &DeviceRequest,
    ) -> VulkanResult<Self> {
        let families = selected.queue_families.unique_families();
        let queue_infos = queue_create_infos(&families);

        // Both name lists live until the end of this function, on every path
        let extensions = NameList::from_strs(&request.extensions)?;
        let layers = NameList::from_strs(&request.layers)?;

        // Device layers are deprecated but still honoured by older loaders
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(extensions.as_ptrs())
            .enabled_layer_names(layers.as_ptrs())
            .enabled_features(&request.features);

        let device = unsafe {
            instance
                .create_device(selected.descriptor.handle, &create_info, None)
                .map_err(VulkanError::DeviceCreationFailed)?
        };

        let queues = families
            .iter()
            .map(|&family| (family, unsafe { device.get_device_queue(family, 0) }))
            .collect();

        let swapchain_loader = khr::Swapchain::new(instance, &device);

        log::info!(
            "Logical device created with {} queue(s), extensions {:?}",
            families.len(),
            extensions.to_strings()
        );

        Ok(Self {
            device,
            physical_device: selected.descriptor.handle,
            queue_families: selected.queue_families,
            queues,
            swapchain_loader,
        })
    }

    /// Get the raw device
    pub fn raw(&self) -> &Device {
        &self.device
    }

    /// Physical device the logical device was created from
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    /// Queue families the queues were created on
    pub fn queue_families(&self) -> QueueFamilyIndices {
        self.queue_families
    }

    /// Queue created for `family`, if any
    pub fn queue(&self, family: u32) -> Option<vk::Queue> {
        self.queues.get(&family).copied()
    }

    /// Get the graphics queue
    pub fn graphics_queue(&self) -> vk::Queue {
        self.queues[&self.queue_families.graphics_family]
    }

    /// Get the present queue
    pub fn present_queue(&self) -> vk::Queue {
        self.queues[&self.queue_families.present_family]
    }

    /// Number of distinct queues held
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// Get the swapchain loader
    pub fn swapchain_loader(&self) -> &khr::Swapchain {
        &self.swapchain_loader
    }

    /// Block until the device has no pending work
    pub fn wait_idle(&self) -> VulkanResult<()> {
        unsafe { self.device.device_wait_idle().map_err(VulkanError::Api) }
    }

    /// Destroy the device; everything created from it must already be gone
    pub fn destroy(&mut self) {
        unsafe {
            if let Err(e) = self.device.device_wait_idle() {
                log::warn!("device_wait_idle failed before device destruction: {:?}", e);
            }
            self.device.destroy_device(None);
        }
        self.queues.clear();
        log::debug!("Logical device destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priorities(info: &vk::DeviceQueueCreateInfo) -> &[f32] {
        unsafe { std::slice::from_raw_parts(info.p_queue_priorities, info.queue_count as usize) }
    }

    #[test]
    fn test_shared_family_gets_one_queue_info() {
        let shared = QueueFamilyIndices {
            graphics_family: 2,
            present_family: 2,
        };
        let infos = queue_create_infos(&shared.unique_families());

        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 2);
        assert_eq!(infos[0].queue_count, 1);
        assert_eq!(priorities(&infos[0]), &[1.0]);
    }

    #[test]
    fn test_split_families_get_one_queue_info_each() {
        let split = QueueFamilyIndices {
            graphics_family: 3,
            present_family: 1,
        };
        let infos = queue_create_infos(&split.unique_families());

        let families: Vec<u32> = infos.iter().map(|info| info.queue_family_index).collect();
        assert_eq!(families, vec![1, 3]);
        for info in &infos {
            assert_eq!(info.queue_count, 1);
            assert_eq!(priorities(info), &[1.0]);
        }
    }
}
