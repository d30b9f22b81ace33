//! Vulkan bootstrap
//!
//! Instance and capability negotiation, diagnostics, device selection, the logical device, the
//! swapchain and the lifecycle that ties their creation and destruction together.

pub mod context;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod ffi;
pub mod instance;
pub mod lifecycle;
pub mod negotiation;
pub mod physical_device;
/// Queue family discovery and sharing policy
pub mod queue_family;
pub mod swapchain;

// Re-export commonly used types
pub use context::{Context, SwapchainDependent, VulkanStages};
pub use device::{DeviceRequest, LogicalDevice};
pub use diagnostics::{DiagnosticsBridge, MessageSeverity};
pub use error::{BootstrapFailure, VulkanError, VulkanResult};
pub use instance::{ApplicationIdentity, InstanceContext};
pub use lifecycle::{LifecycleSequencer, ResourceKind, Stage, StageDriver, TeardownLedger};
pub use negotiation::{negotiate, CapabilityRequest, EnabledCapabilities};
pub use physical_device::{
    PhysicalDeviceDescriptor, PhysicalDeviceSelector, Rejection, SelectedDevice, SurfaceSupport,
};
pub use queue_family::{resolve_queue_families, QueueFamilyIndices, SharingPolicy};
pub use swapchain::{ImageViews, Swapchain, SwapchainDescriptor};
