//! Instance capability negotiation
//!
//! Resolves the final instance extension and layer lists from what the window system needs,
//! whether diagnostics were requested, and which layers the loader actually has installed.
//! Negotiation performs no API calls itself; callers feed it the available-layer query result.

use std::collections::HashSet;

use crate::vulkan::error::{VulkanError, VulkanResult};

/// Inputs to instance capability negotiation
#[derive(Debug, Clone, Default)]
pub struct CapabilityRequest<'a> {
    /// Extensions the windowing surface requires
    pub surface_extensions: &'a [String],
    /// Debug extension to enable when diagnostics are requested
    pub debug_extension: Option<&'a str>,
    /// Validation layers to enable
    pub requested_layers: &'a [String],
}

/// Extension and layer lists that passed negotiation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EnabledCapabilities {
    /// Instance extensions, surface extensions first, without duplicates
    pub extensions: Vec<String>,
    /// Validation layers, in request order
    pub layers: Vec<String>,
}

impl EnabledCapabilities {
    /// Whether the given extension is part of the enabled set
    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.iter().any(|ext| ext == name)
    }
}

/// Negotiate the enabled instance capabilities
///
/// Every requested layer must be present in `available_layers`; the first missing one aborts
/// with [`VulkanError::UnsupportedLayer`] and nothing is enabled.
pub fn negotiate(
    request: &CapabilityRequest<'_>,
    available_layers: &[String],
) -> VulkanResult<EnabledCapabilities> {
    let available: HashSet<&str> = available_layers.iter().map(String::as_str).collect();

    if let Some(missing) = request
        .requested_layers
        .iter()
        .find(|layer| !available.contains(layer.as_str()))
    {
        return Err(VulkanError::UnsupportedLayer {
            name: missing.clone(),
        });
    }

    let mut extensions: Vec<String> = Vec::with_capacity(request.surface_extensions.len() + 1);
    let candidates = request
        .surface_extensions
        .iter()
        .map(String::as_str)
        .chain(request.debug_extension);
    for name in candidates {
        if !extensions.iter().any(|ext| ext == name) {
            extensions.push(name.to_string());
        }
    }

    let mut layers: Vec<String> = Vec::with_capacity(request.requested_layers.len());
    for layer in request.requested_layers {
        if !layers.contains(layer) {
            layers.push(layer.clone());
        }
    }

    log::debug!("Negotiated instance extensions: {:?}", extensions);
    log::debug!("Negotiated instance layers: {:?}", layers);

    Ok(EnabledCapabilities { extensions, layers })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_requested_layers_subset_of_available() {
        let surface = names(&["VK_KHR_surface", "VK_KHR_xcb_surface"]);
        let requested = names(&["VK_LAYER_KHRONOS_validation"]);
        let request = CapabilityRequest {
            surface_extensions: &surface,
            debug_extension: Some("VK_EXT_debug_utils"),
            requested_layers: &requested,
        };
        let available = names(&["VK_LAYER_KHRONOS_validation", "VK_LAYER_MESA_overlay"]);

        let enabled = negotiate(&request, &available).unwrap();
        assert_eq!(
            enabled.extensions,
            names(&["VK_KHR_surface", "VK_KHR_xcb_surface", "VK_EXT_debug_utils"])
        );
        assert_eq!(enabled.layers, requested);
        assert!(enabled.has_extension("VK_EXT_debug_utils"));
    }

    #[test]
    fn test_missing_layer_fails_whole_negotiation() {
        let requested = names(&["VK_LAYER_KHRONOS_validation", "VK_LAYER_LUNARG_api_dump"]);
        let request = CapabilityRequest {
            surface_extensions: &[],
            debug_extension: None,
            requested_layers: &requested,
        };
        let available = names(&["VK_LAYER_KHRONOS_validation"]);

        let err = negotiate(&request, &available).unwrap_err();
        assert_eq!(
            err,
            VulkanError::UnsupportedLayer {
                name: "VK_LAYER_LUNARG_api_dump".to_string()
            }
        );
    }

    #[test]
    fn test_no_layers_requested_always_succeeds() {
        let surface = names(&["VK_KHR_surface"]);
        let request = CapabilityRequest {
            surface_extensions: &surface,
            debug_extension: None,
            requested_layers: &[],
        };

        let enabled = negotiate(&request, &[]).unwrap();
        assert_eq!(enabled.extensions, surface);
        assert!(enabled.layers.is_empty());
        assert!(!enabled.has_extension("VK_EXT_debug_utils"));
    }

    #[test]
    fn test_debug_extension_not_duplicated() {
        let surface = names(&["VK_KHR_surface", "VK_EXT_debug_utils"]);
        let request = CapabilityRequest {
            surface_extensions: &surface,
            debug_extension: Some("VK_EXT_debug_utils"),
            requested_layers: &[],
        };

        let enabled = negotiate(&request, &[]).unwrap();
        assert_eq!(enabled.extensions, surface);
    }
}
