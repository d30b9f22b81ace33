//! # Vulkan Bootstrap
//!
//! Brings a Vulkan rendering context up to the point where frames can be recorded and presented:
//! instance, optional validation diagnostics, presentation surface, physical and logical device,
//! swapchain and image views. Everything is torn down in reverse creation order, on failure as
//! well as on shutdown.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use vk_bootstrap::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ContextConfig::new("Demo").with_env_overrides();
//!     let window = GlfwWindow::new(&config.window)?;
//!     let mut context = Context::bootstrap_with_config(window, config)?;
//!
//!     while context.window().is_some_and(|w| !w.should_close()) {
//!         if let Some(window) = context.window_mut() {
//!             window.poll_events();
//!         }
//!     }
//!
//!     context.teardown();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod foundation;
pub mod vulkan;
pub mod window;

/// Common imports for bootstrap users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, ConfigFormat},
        core::{ContextConfig, WindowConfig},
        foundation::logging,
        vulkan::{BootstrapFailure, Context, ResourceKind, Stage, SwapchainDependent, VulkanError},
        window::{GlfwWindow, PresentationSurface, WindowError},
    };
}
