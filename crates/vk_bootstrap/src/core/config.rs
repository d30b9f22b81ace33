//! # Bootstrap Configuration
//!
//! Window size, application identity, the diagnostics toggle and the layer/extension lists the
//! bootstrap requests. Loadable from TOML or RON through [`Config`]; every field has a default,
//! so a file only needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};

/// Environment variable overriding the diagnostics toggle
pub const DIAGNOSTICS_ENV_VAR: &str = "VK_BOOTSTRAP_DIAGNOSTICS";

/// Khronos validation layer
pub const KHRONOS_VALIDATION_LAYER: &str = "VK_LAYER_KHRONOS_validation";

/// Swapchain device extension
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// # Window Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// Initial width in screen coordinates
    pub width: u32,
    /// Initial height in screen coordinates
    pub height: u32,
    /// Title bar text
    pub title: String,
    /// Whether the user may resize the window
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            title: "Vulkan".to_string(),
            resizable: true,
        }
    }
}

/// # Context Configuration
///
/// Everything the bootstrap needs besides the window itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Application name reported to the driver
    pub application_name: String,
    /// Engine name reported to the driver
    pub engine_name: String,
    /// Install validation layers and the debug messenger
    pub enable_diagnostics: bool,
    /// Validation layers requested when diagnostics are on
    pub validation_layers: Vec<String>,
    /// Device extensions every selected GPU must support
    pub device_extensions: Vec<String>,
    /// Window settings
    pub window: WindowConfig,
    /// Default log level when `RUST_LOG` is unset
    pub log_level: String,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            application_name: "Vulkan Bootstrap".to_string(),
            engine_name: "No Engine".to_string(),
            enable_diagnostics: cfg!(debug_assertions),
            validation_layers: vec![KHRONOS_VALIDATION_LAYER.to_string()],
            device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            window: WindowConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl ContextConfig {
    /// Create a configuration with defaults for the given application name
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            application_name: app_name.into(),
            ..Self::default()
        }
    }

    /// Enable or disable diagnostics
    pub fn with_diagnostics(mut self, enabled: bool) -> Self {
        self.enable_diagnostics = enabled;
        self
    }

    /// Set the initial window size
    pub fn with_window_size(mut self, width: u32, height: u32) -> Self {
        self.window.width = width;
        self.window.height = height;
        self
    }

    /// Set the window title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.window.title = title.into();
        self
    }

    /// Apply the diagnostics override from the process environment
    pub fn with_env_overrides(self) -> Self {
        let value = std::env::var(DIAGNOSTICS_ENV_VAR).ok();
        self.with_diagnostics_override(value.as_deref())
    }

    /// Apply a diagnostics override value; unrecognised values are ignored
    pub fn with_diagnostics_override(mut self, value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("1" | "true" | "on" | "yes") => self.enable_diagnostics = true,
            Some("0" | "false" | "off" | "no") => self.enable_diagnostics = false,
            Some(other) => log::warn!("Ignoring {}={:?}", DIAGNOSTICS_ENV_VAR, other),
            None => {}
        }
        self
    }

    /// Validation layers that will actually be requested
    pub fn requested_layers(&self) -> &[String] {
        if self.enable_diagnostics {
            &self.validation_layers
        } else {
            &[]
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.application_name.is_empty() {
            return Err(ConfigError::Invalid("Application name cannot be empty".to_string()));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "Window size must be non-zero, got {}x{}",
                self.window.width, self.window.height
            )));
        }
        if let Some(name) = self
            .validation_layers
            .iter()
            .chain(&self.device_extensions)
            .find(|name| name.is_empty() || name.contains('\0'))
        {
            return Err(ConfigError::Invalid(format!("Invalid layer or extension name {name:?}")));
        }
        Ok(())
    }
}

impl Config for ContextConfig {}
