//! Window management for presentation
//!
//! The bootstrap only needs a narrow slice of the windowing library: the instance extensions it
//! requires, a surface for a live instance, the framebuffer size and the event pump. That slice
//! is the [`PresentationSurface`] trait; [`GlfwWindow`] implements it on top of GLFW.
//!
//! Dropping a window destroys the native window and, once the last handle goes, terminates the
//! windowing library.

pub mod glfw_window;

pub use glfw_window::GlfwWindow;

use ash::vk;
use thiserror::Error;

/// Window management errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WindowError {
    /// The windowing library failed to initialise
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The native window could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// The windowing library cannot drive Vulkan on this system
    #[error("Vulkan is not supported by the windowing system")]
    VulkanUnsupported,

    /// Any other windowing library error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Window-system collaborator the bootstrap consumes
pub trait PresentationSurface {
    /// Instance extensions the window system needs for presentation
    fn required_instance_extensions(&self) -> WindowResult<Vec<String>>;

    /// Create a presentation surface for `instance`
    ///
    /// The caller owns the returned surface and destroys it through the instance.
    fn create_surface(&mut self, instance: vk::Instance) -> WindowResult<vk::SurfaceKHR>;

    /// Drawable size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Whether the user asked to close the window
    fn should_close(&self) -> bool;

    /// Process pending window-system events
    fn poll_events(&mut self);
}
