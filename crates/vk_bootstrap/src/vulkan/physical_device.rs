//! Physical device selection
//!
//! Devices are described once (queue families, extensions, surface support) and then checked
//! against the hard requirements in enumeration order. The first device that passes every check
//! wins; there is no scoring between qualifying devices.

use ash::extensions::khr;
use ash::{vk, Instance};
use std::collections::HashSet;
use std::fmt;

use crate::vulkan::error::{VulkanError, VulkanResult};
use crate::vulkan::ffi::fixed_name_to_string;
use crate::vulkan::queue_family::{resolve_queue_families, QueueFamilyIndices};

/// Surface capability query results for one device/surface pair
#[derive(Debug, Clone, Default)]
pub struct SurfaceSupport {
    /// Image count, extent and transform limits
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    /// Supported format/color-space pairs
    pub formats: Vec<vk::SurfaceFormatKHR>,
    /// Supported presentation modes
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SurfaceSupport {
    /// Query the surface support of `device`
    pub fn query(
        surface_loader: &khr::Surface,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> VulkanResult<Self> {
        unsafe {
            Ok(Self {
                capabilities: surface_loader
                    .get_physical_device_surface_capabilities(device, surface)
                    .map_err(VulkanError::Api)?,
                formats: surface_loader
                    .get_physical_device_surface_formats(device, surface)
                    .map_err(VulkanError::Api)?,
                present_modes: surface_loader
                    .get_physical_device_surface_present_modes(device, surface)
                    .map_err(VulkanError::Api)?,
            })
        }
    }

    /// At least one format and one present mode are available
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Cached query results for one physical device
#[derive(Debug, Clone)]
pub struct PhysicalDeviceDescriptor {
    /// Driver handle
    pub handle: vk::PhysicalDevice,
    /// Human-readable device name
    pub name: String,
    /// Discrete, integrated, virtual, CPU or other
    pub device_type: vk::PhysicalDeviceType,
    /// Queue family properties in index order
    pub queue_families: Vec<vk::QueueFamilyProperties>,
    /// Presentation support per queue family for the queried surface
    pub present_support: Vec<bool>,
    /// Names of the supported device extensions
    pub extensions: Vec<String>,
    /// Surface support, when a surface was supplied
    pub surface: Option<SurfaceSupport>,
}

impl PhysicalDeviceDescriptor {
    /// Query everything selection needs to know about `device`
    pub fn query(
        instance: &Instance,
        surface: Option<(&khr::Surface, vk::SurfaceKHR)>,
        device: vk::PhysicalDevice,
    ) -> VulkanResult<Self> {
        let properties = unsafe { instance.get_physical_device_properties(device) };
        let queue_families =
            unsafe { instance.get_physical_device_queue_family_properties(device) };
        let extensions = unsafe {
            instance
                .enumerate_device_extension_properties(device)
                .map_err(VulkanError::Api)?
        }
        .iter()
        .map(|ext| fixed_name_to_string(&ext.extension_name))
        .collect();

        let (present_support, surface) = match surface {
            Some((loader, surface)) => {
                let support = (0u32..)
                    .take(queue_families.len())
                    .map(|index| unsafe {
                        loader
                            .get_physical_device_surface_support(device, index, surface)
                            .map_err(VulkanError::Api)
                    })
                    .collect::<VulkanResult<Vec<_>>>()?;
                (support, Some(SurfaceSupport::query(loader, device, surface)?))
            }
            None => (vec![false; queue_families.len()], None),
        };

        Ok(Self {
            handle: device,
            name: fixed_name_to_string(&properties.device_name),
            device_type: properties.device_type,
            queue_families,
            present_support,
            extensions,
            surface,
        })
    }

    /// Resolve the graphics and present families from the cached queries
    pub fn queue_family_indices(&self) -> Option<QueueFamilyIndices> {
        resolve_queue_families(&self.queue_families, |index| {
            Ok(self.present_support.get(index as usize).copied().unwrap_or(false))
        })
        .ok()
        .flatten()
    }
}

/// Why a device failed selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Graphics or present family could not be resolved
    IncompleteQueueFamilies,
    /// Required device extensions are missing
    MissingExtensions(Vec<String>),
    /// No surface formats or no present modes for the surface
    InadequateSurface,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IncompleteQueueFamilies => {
                write!(f, "graphics/present queue families not available")
            }
            Self::MissingExtensions(missing) => write!(f, "missing extensions {missing:?}"),
            Self::InadequateSurface => write!(f, "no surface formats or present modes"),
        }
    }
}

/// A device that passed selection with its resolved queue families
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    /// Cached device queries
    pub descriptor: PhysicalDeviceDescriptor,
    /// Resolved queue families
    pub queue_families: QueueFamilyIndices,
}

/// First-match physical device selector
#[derive(Debug, Clone)]
pub struct PhysicalDeviceSelector {
    required_extensions: Vec<String>,
    require_presentation: bool,
}

impl PhysicalDeviceSelector {
    /// Selector requiring the given device extensions
    pub fn new<I, S>(required_extensions: I, require_presentation: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            required_extensions: required_extensions.into_iter().map(Into::into).collect(),
            require_presentation,
        }
    }

    /// Device extensions every candidate must support
    pub fn required_extensions(&self) -> &[String] {
        &self.required_extensions
    }

    /// Check one device against every requirement
    pub fn evaluate(
        &self,
        device: &PhysicalDeviceDescriptor,
    ) -> Result<QueueFamilyIndices, Rejection> {
        let indices = device
            .queue_family_indices()
            .ok_or(Rejection::IncompleteQueueFamilies)?;

        let supported: HashSet<&str> = device.extensions.iter().map(String::as_str).collect();
        let missing: Vec<String> = self
            .required_extensions
            .iter()
            .filter(|ext| !supported.contains(ext.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(Rejection::MissingExtensions(missing));
        }

        if self.require_presentation
            && !device.surface.as_ref().is_some_and(SurfaceSupport::is_adequate)
        {
            return Err(Rejection::InadequateSurface);
        }

        Ok(indices)
    }

    /// Pick the first qualifying device in enumeration order
    pub fn select<I>(&self, candidates: I) -> VulkanResult<SelectedDevice>
    where
        I: IntoIterator<Item = PhysicalDeviceDescriptor>,
    {
        let mut seen = 0usize;
        for descriptor in candidates {
            seen += 1;
            match self.evaluate(&descriptor) {
                Ok(queue_families) => {
                    log::info!(
                        "Selected GPU: {} ({:?}), graphics family {}, present family {}",
                        descriptor.name,
                        descriptor.device_type,
                        queue_families.graphics_family,
                        queue_families.present_family
                    );
                    return Ok(SelectedDevice {
                        descriptor,
                        queue_families,
                    });
                }
                Err(reason) => log::debug!("Rejected GPU {}: {}", descriptor.name, reason),
            }
        }

        if seen == 0 {
            Err(VulkanError::NoDevicesFound)
        } else {
            Err(VulkanError::NoSuitableDevice)
        }
    }
}

/// Enumerate the instance's devices and select one for `surface`
pub fn select_physical_device(
    instance: &Instance,
    surface: Option<(&khr::Surface, vk::SurfaceKHR)>,
    selector: &PhysicalDeviceSelector,
) -> VulkanResult<SelectedDevice> {
    let devices = unsafe { instance.enumerate_physical_devices().map_err(VulkanError::Api)? };
    if devices.is_empty() {
        return Err(VulkanError::NoDevicesFound);
    }
    log::debug!("Found {} physical device(s)", devices.len());

    let candidates = devices.into_iter().filter_map(|device| {
        match PhysicalDeviceDescriptor::query(instance, surface, device) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                log::warn!("Skipping physical device {:?}: {}", device, e);
                None
            }
        }
    });

    match selector.select(candidates) {
        Err(VulkanError::NoDevicesFound) => Err(VulkanError::NoSuitableDevice),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn descriptor(id: u64, extensions: &[&str], presentable: bool) -> PhysicalDeviceDescriptor {
        PhysicalDeviceDescriptor {
            handle: vk::PhysicalDevice::from_raw(id),
            name: format!("GPU {id}"),
            device_type: vk::PhysicalDeviceType::DISCRETE_GPU,
            queue_families: vec![vk::QueueFamilyProperties {
                queue_flags: vk::QueueFlags::GRAPHICS,
                queue_count: 1,
                ..Default::default()
            }],
            present_support: vec![presentable],
            extensions: extensions.iter().map(|e| (*e).to_string()).collect(),
            surface: Some(SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: vec![vk::SurfaceFormatKHR {
                    format: vk::Format::B8G8R8A8_UNORM,
                    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
                }],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            }),
        }
    }

    fn swapchain_selector() -> PhysicalDeviceSelector {
        PhysicalDeviceSelector::new(["VK_KHR_swapchain"], true)
    }

    #[test]
    fn test_empty_device_list() {
        let err = swapchain_selector().select(Vec::new()).unwrap_err();
        assert_eq!(err, VulkanError::NoDevicesFound);
    }

    #[test]
    fn test_first_fully_qualifying_device_wins() {
        let devices = vec![
            descriptor(1, &["VK_KHR_maintenance1"], true),
            descriptor(2, &["VK_KHR_swapchain", "VK_KHR_maintenance1"], true),
            descriptor(3, &["VK_KHR_swapchain"], true),
        ];
        let selected = swapchain_selector().select(devices).unwrap();
        assert_eq!(selected.descriptor.name, "GPU 2");
        assert_eq!(selected.queue_families.graphics_family, 0);
    }

    #[test]
    fn test_extension_match_is_exact() {
        // A longer name that merely contains the required one must not count
        let devices = vec![descriptor(1, &["VK_KHR_swapchain_mutable_format"], true)];
        let selector = swapchain_selector();
        assert_eq!(
            selector.evaluate(&devices[0]),
            Err(Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]))
        );
        assert_eq!(selector.select(devices).unwrap_err(), VulkanError::NoSuitableDevice);
    }

    #[test]
    fn test_device_without_present_family_rejected() {
        let device = descriptor(1, &["VK_KHR_swapchain"], false);
        assert_eq!(
            swapchain_selector().evaluate(&device),
            Err(Rejection::IncompleteQueueFamilies)
        );
    }

    #[test]
    fn test_inadequate_surface_rejected() {
        let mut no_formats = descriptor(1, &["VK_KHR_swapchain"], true);
        no_formats.surface.as_mut().unwrap().formats.clear();
        let mut no_modes = descriptor(2, &["VK_KHR_swapchain"], true);
        no_modes.surface.as_mut().unwrap().present_modes.clear();

        let selector = swapchain_selector();
        assert_eq!(selector.evaluate(&no_formats), Err(Rejection::InadequateSurface));
        assert_eq!(selector.evaluate(&no_modes), Err(Rejection::InadequateSurface));
        assert_eq!(
            selector.select(vec![no_formats, no_modes]).unwrap_err(),
            VulkanError::NoSuitableDevice
        );
    }

    #[test]
    fn test_surface_checks_skipped_without_presentation() {
        let mut device = descriptor(1, &[], true);
        device.surface = None;
        let selector = PhysicalDeviceSelector::new(Vec::<String>::new(), false);
        assert!(selector.evaluate(&device).is_ok());
    }

    #[test]
    fn test_rejection_messages() {
        assert_eq!(
            Rejection::MissingExtensions(vec!["VK_KHR_swapchain".to_string()]).to_string(),
            "missing extensions [\"VK_KHR_swapchain\"]"
        );
    }
}
