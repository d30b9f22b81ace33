//! Vulkan bootstrap error types
//!
//! Every failure during context establishment is terminal for the current attempt. The
//! sequencer surfaces the first error it hits and tears down whatever was already built.

use ash::vk;
use std::fmt;
use thiserror::Error;

use crate::vulkan::lifecycle::Stage;

/// Vulkan-specific error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VulkanError {
    /// The driver enumerated zero physical devices
    #[error("No GPUs with Vulkan support were found")]
    NoDevicesFound,

    /// Devices exist but none satisfies every hard requirement
    #[error("No suitable GPU found")]
    NoSuitableDevice,

    /// A requested validation layer is not installed
    #[error("Requested validation layer is not available: {name}")]
    UnsupportedLayer {
        /// Name of the first missing layer
        name: String,
    },

    /// Driver-level logical device creation failed
    #[error("Logical device creation failed: {0:?}")]
    DeviceCreationFailed(vk::Result),

    /// Swapchain or one of its image views could not be created
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreationFailed(String),

    /// A debug-callback entry point could not be resolved by name
    #[error("Debug extension entry point unavailable: {entry_point}")]
    DebugExtensionUnavailable {
        /// Name of the entry point that failed to resolve
        entry_point: String,
    },

    /// The windowing collaborator failed to create a presentation surface
    #[error("Surface creation failed: {0}")]
    SurfaceCreationFailed(String),

    /// The Vulkan loader library could not be loaded
    #[error("Failed to load Vulkan: {0}")]
    LoaderUnavailable(String),

    /// Instance creation was rejected by the driver
    #[error("Instance creation failed: {0:?}")]
    InstanceCreationFailed(vk::Result),

    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// A layer or extension name could not be marshalled to a C string
    #[error("Invalid layer or extension name: {0:?}")]
    InvalidName(String),

    /// An operation was requested in a lifecycle stage that does not allow it
    #[error("Operation requires stage {expected:?}, context is in {actual:?}")]
    InvalidStage {
        /// Stage the operation requires
        expected: Stage,
        /// Stage the context was actually in
        actual: Stage,
    },
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// A failed bootstrap attempt as reported to the application layer
///
/// Carries the error kind together with whatever error-severity messages the driver emitted
/// through the diagnostics bridge before teardown began. Without diagnostics the message list
/// is always empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapFailure {
    /// The first error encountered
    pub error: VulkanError,
    /// Error-severity driver messages captured before teardown
    pub driver_messages: Vec<String>,
}

impl BootstrapFailure {
    /// Failure without any driver messages attached
    pub fn new(error: VulkanError) -> Self {
        Self {
            error,
            driver_messages: Vec::new(),
        }
    }
}

impl fmt::Display for BootstrapFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        for message in &self.driver_messages {
            write!(f, "\n  driver: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for BootstrapFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

impl From<VulkanError> for BootstrapFailure {
    fn from(error: VulkanError) -> Self {
        Self::new(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_display_without_messages() {
        let failure = BootstrapFailure::new(VulkanError::NoSuitableDevice);
        assert_eq!(failure.to_string(), "No suitable GPU found");
    }

    #[test]
    fn test_failure_display_with_driver_messages() {
        let failure = BootstrapFailure {
            error: VulkanError::DeviceCreationFailed(vk::Result::ERROR_FEATURE_NOT_PRESENT),
            driver_messages: vec!["VUID-vkCreateDevice: feature missing".to_string()],
        };
        let text = failure.to_string();
        assert!(text.starts_with("Logical device creation failed"));
        assert!(text.contains("driver: VUID-vkCreateDevice: feature missing"));
    }
}
