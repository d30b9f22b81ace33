//! Bootstrap demo application
//!
//! Opens a window, brings up the Vulkan context and keeps the swapchain matched to the window
//! until the window is closed (or Escape is pressed).
//!
//! Usage: `bootstrap_app [config.toml|config.ron]`

use vk_bootstrap::prelude::*;

/// Settings from `path`, or the demo defaults; environment overrides are not applied yet
fn load_config(path: Option<&str>) -> Result<ContextConfig, ConfigError> {
    match path {
        Some(path) => ContextConfig::load_from_file(path),
        None => Ok(ContextConfig::new("Vulkan Bootstrap Demo")),
    }
}

fn run(config: ContextConfig) -> Result<(), Box<dyn std::error::Error>> {
    let window = GlfwWindow::new(&config.window)?;
    let mut context = Context::bootstrap_with_config(window, config)?;

    if let Some(swapchain) = context.swapchain() {
        let extent = swapchain.extent();
        log::info!(
            "Swapchain ready: {} images, {}x{}, {:?}",
            swapchain.images().len(),
            extent.width,
            extent.height,
            swapchain.format().format
        );
    }

    loop {
        let Some(window) = context.window_mut() else {
            break;
        };
        window.poll_events();
        if window.should_close() {
            break;
        }
        if !window.take_resized() {
            continue;
        }

        // A minimised window has a zero-sized framebuffer; wait until it is restored
        let mut size = window.framebuffer_size();
        while (size.0 == 0 || size.1 == 0) && !window.should_close() {
            window.wait_events();
            size = window.framebuffer_size();
        }
        if window.should_close() {
            break;
        }

        log::info!("Recreating swapchain for {}x{}", size.0, size.1);
        context.recreate_swapchain()?;
    }

    context.teardown();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args().nth(1);
    let config = load_config(path.as_deref())?;

    // Logging comes up before the environment overrides so their warnings are visible
    logging::init(logging::parse_level(&config.log_level));
    let config = config.with_env_overrides();
    config.validate()?;

    log::info!("Starting {}", config.application_name);

    match run(config) {
        Ok(()) => {
            log::info!("Bootstrap demo finished successfully");
            Ok(())
        }
        Err(e) => {
            log::error!("Application error: {}", e);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = load_config(None).unwrap();
        assert_eq!(config.application_name, "Vulkan Bootstrap Demo");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override_waits_for_logging() {
        let flipped = if cfg!(debug_assertions) { "0" } else { "1" };
        std::env::set_var(vk_bootstrap::core::config::DIAGNOSTICS_ENV_VAR, flipped);

        let config = load_config(None).unwrap();
        assert_eq!(config.enable_diagnostics, cfg!(debug_assertions));
        assert_eq!(config.with_env_overrides().enable_diagnostics, !cfg!(debug_assertions));
    }

    #[test]
    fn test_unknown_config_format_rejected() {
        let err = load_config(Some("bootstrap.json")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }
}
