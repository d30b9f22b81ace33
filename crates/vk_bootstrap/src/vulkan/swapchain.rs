//! Vulkan swapchain configuration and management
//!
//! Swapchain parameters are derived deterministically from the surface support queries, then
//! the chain and one color view per image are created. Views are released before the chain.

use ash::extensions::khr;
use ash::{vk, Device};

use crate::vulkan::error::{VulkanError, VulkanResult};
use crate::vulkan::physical_device::SurfaceSupport;
use crate::vulkan::queue_family::{QueueFamilyIndices, SharingPolicy};

/// Format picked when the surface leaves the choice open or offers the pair
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_UNORM,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Choose the surface format
///
/// A single `UNDEFINED` entry means any format is acceptable, so the preferred pair is used.
/// Otherwise an exact match for the preferred pair wins, then the first listed format.
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    if let [only] = formats {
        if only.format == vk::Format::UNDEFINED {
            return Some(PREFERRED_SURFACE_FORMAT);
        }
    }

    formats
        .iter()
        .find(|candidate| {
            candidate.format == PREFERRED_SURFACE_FORMAT.format
                && candidate.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| formats.first())
        .copied()
}

/// Choose the present mode: mailbox, then immediate, then fifo
pub fn choose_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    let mut best = vk::PresentModeKHR::FIFO;
    for &mode in modes {
        if mode == vk::PresentModeKHR::MAILBOX {
            return mode;
        }
        if mode == vk::PresentModeKHR::IMMEDIATE {
            best = mode;
        }
    }
    best
}

/// Choose the image extent
///
/// The surface's current extent is authoritative unless its width is the `u32::MAX` sentinel,
/// in which case the requested size is clamped to the supported range per axis.
pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        return capabilities.current_extent;
    }

    vk::Extent2D {
        width: requested.width.clamp(
            capabilities.min_image_extent.width,
            capabilities.max_image_extent.width.max(capabilities.min_image_extent.width),
        ),
        height: requested.height.clamp(
            capabilities.min_image_extent.height,
            capabilities.max_image_extent.height.max(capabilities.min_image_extent.height),
        ),
    }
}

/// Choose the image count: one more than the minimum, capped by a non-zero maximum
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let desired = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        desired.min(capabilities.max_image_count)
    } else {
        desired
    }
}

/// Parameters the swapchain is created with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapchainDescriptor {
    /// Image format and color space
    pub surface_format: vk::SurfaceFormatKHR,
    /// Presentation mode
    pub present_mode: vk::PresentModeKHR,
    /// Image size
    pub extent: vk::Extent2D,
    /// Minimum number of images requested
    pub image_count: u32,
    /// Image sharing between the graphics and present families
    pub sharing: SharingPolicy,
    /// Surface transform to apply
    pub pre_transform: vk::SurfaceTransformFlagsKHR,
}

impl SwapchainDescriptor {
    /// Derive the descriptor from the surface support of the selected device
    pub fn derive(
        support: &SurfaceSupport,
        queue_families: &QueueFamilyIndices,
        requested_extent: vk::Extent2D,
    ) -> VulkanResult<Self> {
        let surface_format = choose_surface_format(&support.formats).ok_or_else(|| {
            VulkanError::SwapchainCreationFailed("surface reports no formats".to_string())
        })?;

        Ok(Self {
            surface_format,
            present_mode: choose_present_mode(&support.present_modes),
            extent: choose_extent(&support.capabilities, requested_extent),
            image_count: choose_image_count(&support.capabilities),
            sharing: queue_families.sharing_policy(),
            pre_transform: support.capabilities.current_transform,
        })
    }

    /// Image color space
    pub fn color_space(&self) -> vk::ColorSpaceKHR {
        self.surface_format.color_space
    }
}

/// Swapchain handle with its images
pub struct Swapchain {
    loader: khr::Swapchain,
    handle: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    descriptor: SwapchainDescriptor,
}

impl Swapchain {
    /// Create a swapchain on `surface` described by `descriptor`
    pub fn new(
        loader: &khr::Swapchain,
        surface: vk::SurfaceKHR,
        descriptor: SwapchainDescriptor,
    ) -> VulkanResult<Self> {
        let mut create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(surface)
            .min_image_count(descriptor.image_count)
            .image_format(descriptor.surface_format.format)
            .image_color_space(descriptor.surface_format.color_space)
            .image_extent(descriptor.extent)
            .image_array_layers(1)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(descriptor.sharing.mode)
            .pre_transform(descriptor.pre_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(descriptor.present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        // Concurrent mode must name its families, exclusive mode must not
        if descriptor.sharing.mode == vk::SharingMode::CONCURRENT {
            create_info = create_info.queue_family_indices(&descriptor.sharing.family_indices);
        }

        let handle = unsafe {
            loader
                .create_swapchain(&create_info, None)
                .map_err(|e| {
                    VulkanError::SwapchainCreationFailed(format!("vkCreateSwapchainKHR: {e:?}"))
                })?
        };

        let images = match unsafe { loader.get_swapchain_images(handle) } {
            Ok(images) => images,
            Err(e) => {
                unsafe { loader.destroy_swapchain(handle, None) };
                return Err(VulkanError::SwapchainCreationFailed(format!(
                    "vkGetSwapchainImagesKHR: {e:?}"
                )));
            }
        };

        log::info!(
            "Swapchain created: {}x{}, {:?}/{:?}, {:?}, {} image(s)",
            descriptor.extent.width,
            descriptor.extent.height,
            descriptor.surface_format.format,
            descriptor.surface_format.color_space,
            descriptor.present_mode,
            images.len()
        );

        Ok(Self {
            loader: loader.clone(),
            handle,
            images,
            descriptor,
        })
    }

    /// Get swapchain handle
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.handle
    }

    /// Get swapchain loader
    pub fn loader(&self) -> &khr::Swapchain {
        &self.loader
    }

    /// Images owned by the chain
    pub fn images(&self) -> &[vk::Image] {
        &self.images
    }

    /// Parameters the chain was created with
    pub fn descriptor(&self) -> &SwapchainDescriptor {
        &self.descriptor
    }

    /// Get swapchain extent
    pub fn extent(&self) -> vk::Extent2D {
        self.descriptor.extent
    }

    /// Get surface format
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.descriptor.surface_format
    }

    /// Destroy the chain; its image views must already be gone
    pub fn destroy(&mut self) {
        if self.handle != vk::SwapchainKHR::null() {
            unsafe { self.loader.destroy_swapchain(self.handle, None) };
            self.handle = vk::SwapchainKHR::null();
            self.images.clear();
            log::debug!("Swapchain destroyed");
        }
    }
}

/// One 2D color view per swapchain image
pub struct ImageViews {
    device: Device,
    views: Vec<vk::ImageView>,
}

impl ImageViews {
    /// Create views for every image of `swapchain`
    ///
    /// Views created before a failure are destroyed before the error is returned.
    pub fn new(device: &Device, swapchain: &Swapchain) -> VulkanResult<Self> {
        let mut views = Self {
            device: device.clone(),
            views: Vec::with_capacity(swapchain.images().len()),
        };

        for &image in swapchain.images() {
            let create_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(swapchain.format().format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });

            match unsafe { device.create_image_view(&create_info, None) } {
                Ok(view) => views.views.push(view),
                Err(e) => {
                    views.destroy();
                    return Err(VulkanError::SwapchainCreationFailed(format!(
                        "vkCreateImageView: {e:?}"
                    )));
                }
            }
        }

        Ok(views)
    }

    /// Get image views
    pub fn views(&self) -> &[vk::ImageView] {
        &self.views
    }

    /// Destroy every view
    pub fn destroy(&mut self) {
        for view in self.views.drain(..) {
            unsafe { self.device.destroy_image_view(view, None) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn capabilities(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: vk::Extent2D { width: 800, height: 600 },
            min_image_extent: vk::Extent2D { width: 1, height: 1 },
            max_image_extent: vk::Extent2D { width: 4096, height: 4096 },
            ..Default::default()
        }
    }

    #[test]
    fn test_undefined_format_picks_preferred_pair() {
        let formats = [format(vk::Format::UNDEFINED, vk::ColorSpaceKHR::SRGB_NONLINEAR)];
        assert_eq!(choose_surface_format(&formats), Some(PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_preferred_pair_beats_first_listed() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
            PREFERRED_SURFACE_FORMAT,
        ];
        assert_eq!(choose_surface_format(&formats), Some(PREFERRED_SURFACE_FORMAT));
    }

    #[test]
    fn test_fallback_to_first_format() {
        let formats = [
            format(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::A2B10G10R10_UNORM_PACK32, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn test_present_mode_preference() {
        use vk::PresentModeKHR as Mode;
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::MAILBOX]), Mode::MAILBOX);
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE]), Mode::IMMEDIATE);
        assert_eq!(choose_present_mode(&[Mode::FIFO]), Mode::FIFO);
        assert_eq!(
            choose_present_mode(&[Mode::IMMEDIATE, Mode::FIFO_RELAXED, Mode::MAILBOX]),
            Mode::MAILBOX
        );
    }

    #[test]
    fn test_current_extent_used_verbatim() {
        let caps = capabilities(2, 8);
        let extent = choose_extent(&caps, vk::Extent2D { width: 1, height: 1 });
        assert_eq!(extent, vk::Extent2D { width: 800, height: 600 });
    }

    #[test]
    fn test_extent_clamped_when_unset() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D { width: u32::MAX, height: u32::MAX },
            min_image_extent: vk::Extent2D { width: 200, height: 200 },
            max_image_extent: vk::Extent2D { width: 4000, height: 4000 },
            ..Default::default()
        };
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 100, height: 50 }),
            vk::Extent2D { width: 200, height: 200 }
        );
        assert_eq!(
            choose_extent(&caps, vk::Extent2D { width: 5000, height: 1080 }),
            vk::Extent2D { width: 4000, height: 1080 }
        );
    }

    #[test]
    fn test_image_count() {
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 2)), 2);
        // Zero maximum means unbounded
        assert_eq!(choose_image_count(&capabilities(3, 0)), 4);
    }

    #[test]
    fn test_image_count_saturates_on_extreme_minimum() {
        assert_eq!(choose_image_count(&capabilities(u32::MAX, 0)), u32::MAX);
        assert_eq!(choose_image_count(&capabilities(u32::MAX, u32::MAX)), u32::MAX);
    }

    #[test]
    fn test_descriptor_sharing_follows_families() {
        let support = SurfaceSupport {
            capabilities: capabilities(2, 0),
            formats: vec![PREFERRED_SURFACE_FORMAT],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let requested = vk::Extent2D { width: 800, height: 600 };

        let shared = QueueFamilyIndices { graphics_family: 0, present_family: 0 };
        let descriptor = SwapchainDescriptor::derive(&support, &shared, requested).unwrap();
        assert_eq!(descriptor.sharing.mode, vk::SharingMode::EXCLUSIVE);
        assert!(descriptor.sharing.family_indices.is_empty());
        assert_eq!(descriptor.image_count, 3);

        let split = QueueFamilyIndices { graphics_family: 0, present_family: 1 };
        let descriptor = SwapchainDescriptor::derive(&support, &split, requested).unwrap();
        assert_eq!(descriptor.sharing.mode, vk::SharingMode::CONCURRENT);
        assert_eq!(descriptor.sharing.family_indices, vec![0, 1]);
    }

    #[test]
    fn test_descriptor_requires_a_format() {
        let support = SurfaceSupport {
            capabilities: capabilities(2, 0),
            formats: Vec::new(),
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        let shared = QueueFamilyIndices { graphics_family: 0, present_family: 0 };
        let err =
            SwapchainDescriptor::derive(&support, &shared, vk::Extent2D::default()).unwrap_err();
        assert!(matches!(err, VulkanError::SwapchainCreationFailed(_)));
    }
}
