//! Queue family resolution
//!
//! Maps the graphics and presentation roles onto concrete queue-family indices of a device.

use ash::vk;

use crate::vulkan::error::VulkanResult;

/// Resolved graphics and presentation queue families
///
/// Only produced once both roles are resolved; the two indices may be equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueueFamilyIndices {
    /// Index of the first family with graphics support
    pub graphics_family: u32,
    /// Index of the first family able to present to the surface
    pub present_family: u32,
}

/// How swapchain images are shared between the resolved families
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharingPolicy {
    /// Exclusive when one family does both jobs, concurrent otherwise
    pub mode: vk::SharingMode,
    /// Families sharing the images; empty in exclusive mode
    pub family_indices: Vec<u32>,
}

impl QueueFamilyIndices {
    /// Whether graphics and presentation run on one family
    pub fn is_shared(&self) -> bool {
        self.graphics_family == self.present_family
    }

    /// Distinct families in ascending order, one entry per queue to create
    pub fn unique_families(&self) -> Vec<u32> {
        if self.is_shared() {
            vec![self.graphics_family]
        } else {
            let mut families = vec![self.graphics_family, self.present_family];
            families.sort_unstable();
            families
        }
    }

    /// Image sharing policy for a swapchain used by these families
    pub fn sharing_policy(&self) -> SharingPolicy {
        if self.is_shared() {
            SharingPolicy {
                mode: vk::SharingMode::EXCLUSIVE,
                family_indices: Vec::new(),
            }
        } else {
            SharingPolicy {
                mode: vk::SharingMode::CONCURRENT,
                family_indices: vec![self.graphics_family, self.present_family],
            }
        }
    }
}

#[derive(Default)]
struct PartialIndices {
    graphics_family: Option<u32>,
    present_family: Option<u32>,
}

impl PartialIndices {
    fn complete(&self) -> Option<QueueFamilyIndices> {
        Some(QueueFamilyIndices {
            graphics_family: self.graphics_family?,
            present_family: self.present_family?,
        })
    }
}

/// Scan `families` in index order for the graphics and present roles
///
/// `supports_present` answers the surface-support query for a family index. Returns `None`
/// when either role cannot be filled.
pub fn resolve_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> VulkanResult<Option<QueueFamilyIndices>>
where
    F: FnMut(u32) -> VulkanResult<bool>,
{
    let mut found = PartialIndices::default();

    for (index, family) in (0u32..).zip(families) {
        if family.queue_count == 0 {
            continue;
        }

        if found.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            found.graphics_family = Some(index);
        }

        if found.present_family.is_none() && supports_present(index)? {
            found.present_family = Some(index);
        }

        if found.complete().is_some() {
            break;
        }
    }

    Ok(found.complete())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn family(flags: vk::QueueFlags, count: u32) -> vk::QueueFamilyProperties {
        vk::QueueFamilyProperties {
            queue_flags: flags,
            queue_count: count,
            ..Default::default()
        }
    }

    #[test]
    fn test_single_family_does_both() {
        let families = [family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, 16)];
        let indices = resolve_queue_families(&families, |_| Ok(true)).unwrap().unwrap();
        assert_eq!(indices.graphics_family, 0);
        assert_eq!(indices.present_family, 0);
        assert!(indices.is_shared());
        assert_eq!(indices.unique_families(), vec![0]);
    }

    #[test]
    fn test_first_matching_index_wins() {
        let families = [
            family(vk::QueueFlags::TRANSFER, 2),
            family(vk::QueueFlags::GRAPHICS, 0),
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 4),
        ];
        let indices = resolve_queue_families(&families, |i| Ok(i >= 3)).unwrap().unwrap();
        // Family 1 has no queues, so graphics lands on 2
        assert_eq!(indices.graphics_family, 2);
        assert_eq!(indices.present_family, 3);
        assert_eq!(indices.unique_families(), vec![2, 3]);
    }

    #[test]
    fn test_missing_present_support_is_incomplete() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        assert!(resolve_queue_families(&families, |_| Ok(false)).unwrap().is_none());
    }

    #[test]
    fn test_missing_graphics_is_incomplete() {
        let families = [family(vk::QueueFlags::COMPUTE, 1), family(vk::QueueFlags::TRANSFER, 1)];
        assert!(resolve_queue_families(&families, |_| Ok(true)).unwrap().is_none());
    }

    #[test]
    fn test_stops_querying_once_complete() {
        let families = [
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let mut queried = Vec::new();
        let indices = resolve_queue_families(&families, |i| {
            queried.push(i);
            Ok(true)
        })
        .unwrap()
        .unwrap();
        assert_eq!(indices.present_family, 0);
        assert_eq!(queried, vec![0]);
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let families = [
            family(vk::QueueFlags::COMPUTE, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
            family(vk::QueueFlags::GRAPHICS, 1),
        ];
        let present = |i: u32| -> VulkanResult<bool> { Ok(i != 1) };
        let first = resolve_queue_families(&families, present).unwrap();
        let second = resolve_queue_families(&families, present).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first,
            Some(QueueFamilyIndices {
                graphics_family: 1,
                present_family: 0
            })
        );
    }

    #[test]
    fn test_sharing_policy() {
        let shared = QueueFamilyIndices { graphics_family: 0, present_family: 0 };
        let policy = shared.sharing_policy();
        assert_eq!(policy.mode, vk::SharingMode::EXCLUSIVE);
        assert!(policy.family_indices.is_empty());

        let split = QueueFamilyIndices { graphics_family: 0, present_family: 2 };
        let policy = split.sharing_policy();
        assert_eq!(policy.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(policy.family_indices, vec![0, 2]);
    }

    #[test]
    fn test_query_error_propagates() {
        let families = [family(vk::QueueFlags::GRAPHICS, 1)];
        let err = resolve_queue_families(&families, |_| {
            Err(crate::vulkan::error::VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR))
        })
        .unwrap_err();
        assert_eq!(err, crate::vulkan::error::VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR));
    }
}
