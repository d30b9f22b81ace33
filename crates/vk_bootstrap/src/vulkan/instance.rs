//! Vulkan instance context
//!
//! Loads the Vulkan library, negotiates layers and extensions and creates the instance. The
//! instance context is the only owner of the surface loader, so every surface is destroyed
//! through it.

use ash::extensions::{ext::DebugUtils, khr};
use ash::{vk, Entry, Instance};
use std::ffi::CString;

use crate::vulkan::error::{VulkanError, VulkanResult};
use crate::vulkan::ffi::{fixed_name_to_string, NameList};
use crate::vulkan::negotiation::{negotiate, CapabilityRequest, EnabledCapabilities};

/// Application identity passed to the driver
#[derive(Debug, Clone)]
pub struct ApplicationIdentity {
    /// Application name
    pub application_name: String,
    /// Engine name
    pub engine_name: String,
}

/// Loaded entry points, live instance and the negotiated capability set
pub struct InstanceContext {
    entry: Entry,
    instance: Instance,
    surface_loader: khr::Surface,
    enabled: EnabledCapabilities,
}

impl InstanceContext {
    /// Create an instance enabling `surface_extensions` and, with diagnostics, the debug
    /// extension and the requested validation layers
    pub fn new(
        identity: &ApplicationIdentity,
        surface_extensions: &[String],
        enable_diagnostics: bool,
        requested_layers: &[String],
    ) -> VulkanResult<Self> {
        let entry =
            unsafe { Entry::load() }.map_err(|e| VulkanError::LoaderUnavailable(e.to_string()))?;

        let layers: &[String] = if enable_diagnostics { requested_layers } else { &[] };
        let debug_extension = DebugUtils::name().to_string_lossy();
        let request = CapabilityRequest {
            surface_extensions,
            debug_extension: enable_diagnostics.then_some(debug_extension.as_ref()),
            requested_layers: layers,
        };

        let available_layers = if layers.is_empty() {
            Vec::new()
        } else {
            Self::available_layers(&entry)?
        };
        let enabled = negotiate(&request, &available_layers)?;

        let app_name = CString::new(identity.application_name.as_str())
            .map_err(|_| VulkanError::InvalidName(identity.application_name.clone()))?;
        let engine_name = CString::new(identity.engine_name.as_str())
            .map_err(|_| VulkanError::InvalidName(identity.engine_name.clone()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_0);

        let extension_names = NameList::from_strs(&enabled.extensions)?;
        let layer_names = NameList::from_strs(&enabled.layers)?;

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(extension_names.as_ptrs())
            .enabled_layer_names(layer_names.as_ptrs());

        let instance = unsafe {
            entry
                .create_instance(&create_info, None)
                .map_err(VulkanError::InstanceCreationFailed)?
        };

        let surface_loader = khr::Surface::new(&entry, &instance);

        log::info!(
            "Vulkan instance created ({} extension(s), {} layer(s))",
            enabled.extensions.len(),
            enabled.layers.len()
        );

        Ok(Self {
            entry,
            instance,
            surface_loader,
            enabled,
        })
    }

    fn available_layers(entry: &Entry) -> VulkanResult<Vec<String>> {
        let properties = entry
            .enumerate_instance_layer_properties()
            .map_err(VulkanError::Api)?;
        Ok(properties
            .iter()
            .map(|layer| fixed_name_to_string(&layer.layer_name))
            .collect())
    }

    /// Get a reference to the Vulkan entry
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Get a reference to the Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Raw instance handle, as the windowing library expects it
    pub fn handle(&self) -> vk::Instance {
        self.instance.handle()
    }

    /// Get the surface loader
    pub fn surface_loader(&self) -> &khr::Surface {
        &self.surface_loader
    }

    /// Extensions and layers that were enabled
    pub fn enabled(&self) -> &EnabledCapabilities {
        &self.enabled
    }

    /// Destroy a surface created against this instance
    pub fn destroy_surface(&self, surface: vk::SurfaceKHR) {
        unsafe { self.surface_loader.destroy_surface(surface, None) };
        log::debug!("Surface destroyed");
    }

    /// Destroy the instance; devices, surfaces and messengers must already be gone
    pub fn destroy(&mut self) {
        unsafe { self.instance.destroy_instance(None) };
        log::debug!("Vulkan instance destroyed");
    }
}
