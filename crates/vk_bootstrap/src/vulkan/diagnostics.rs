//! Diagnostics bridge for driver validation messages
//!
//! The debug-utils messenger is not part of the core API, so its create/destroy entry points are
//! looked up by name against the instance's function table. A failed lookup is fatal only when
//! diagnostics were requested; a disabled bridge holds nothing and tears down as a no-op.

use ash::vk;
use ash::{Entry, Instance};
use std::collections::VecDeque;
use std::ffi::{c_void, CStr};
use std::sync::Mutex;

use crate::vulkan::error::{VulkanError, VulkanResult};

const CREATE_MESSENGER: &CStr = c"vkCreateDebugUtilsMessengerEXT";
const DESTROY_MESSENGER: &CStr = c"vkDestroyDebugUtilsMessengerEXT";

/// Number of error messages kept for failure reports
const MAX_CAPTURED_ERRORS: usize = 16;

/// Severity classes a driver message is sorted into before logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageSeverity {
    /// API misuse or a failed operation
    Error,
    /// Suspicious but legal usage
    Warning,
    /// Legal usage with a performance cost
    PerformanceWarning,
    /// Informational driver output
    Information,
    /// Verbose loader and layer chatter
    Verbose,
}

impl MessageSeverity {
    /// Classify a messenger callback's severity and type flags
    pub fn classify(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    ) -> Self {
        if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
            Self::Error
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING) {
            if message_type.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
                Self::PerformanceWarning
            } else {
                Self::Warning
            }
        } else if severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::INFO) {
            Self::Information
        } else {
            Self::Verbose
        }
    }

    fn log(self, message: &str) {
        match self {
            Self::Error => log::error!("[Vulkan] {}", message),
            Self::Warning => log::warn!("[Vulkan] {}", message),
            Self::PerformanceWarning => log::warn!("[Vulkan performance] {}", message),
            Self::Information => log::debug!("[Vulkan] {}", message),
            Self::Verbose => log::trace!("[Vulkan] {}", message),
        }
    }
}

/// Bounded record of recent error-severity messages
#[derive(Debug, Default)]
pub struct DriverMessageLog {
    errors: Mutex<VecDeque<String>>,
}

impl DriverMessageLog {
    /// Forward a message to the logger, keeping it if it is an error
    pub fn record(&self, severity: MessageSeverity, message: &str) {
        severity.log(message);
        if severity != MessageSeverity::Error {
            return;
        }
        if let Ok(mut errors) = self.errors.lock() {
            if errors.len() == MAX_CAPTURED_ERRORS {
                errors.pop_front();
            }
            errors.push_back(message.to_string());
        }
    }

    /// Take every captured error message, oldest first
    pub fn drain(&self) -> Vec<String> {
        self.errors
            .lock()
            .map(|mut errors| errors.drain(..).collect())
            .unwrap_or_default()
    }
}

/// Debug messenger entry points resolved from the instance
#[derive(Clone, Copy)]
pub struct DebugEntryPoints {
    create: vk::PFN_vkCreateDebugUtilsMessengerEXT,
    destroy: vk::PFN_vkDestroyDebugUtilsMessengerEXT,
}

impl DebugEntryPoints {
    /// Resolve both entry points through a by-name lookup
    ///
    /// `lookup` mirrors `vkGetInstanceProcAddr`: it returns `None` when the symbol is absent.
    pub fn resolve<F>(mut lookup: F) -> VulkanResult<Self>
    where
        F: FnMut(&CStr) -> vk::PFN_vkVoidFunction,
    {
        let create = lookup(CREATE_MESSENGER).ok_or_else(|| unavailable(CREATE_MESSENGER))?;
        let destroy = lookup(DESTROY_MESSENGER).ok_or_else(|| unavailable(DESTROY_MESSENGER))?;

        // SAFETY: the loader returned these symbols for exactly these names, so they have the
        // signatures the extension defines for them.
        unsafe {
            Ok(Self {
                create: std::mem::transmute::<
                    unsafe extern "system" fn(),
                    vk::PFN_vkCreateDebugUtilsMessengerEXT,
                >(create),
                destroy: std::mem::transmute::<
                    unsafe extern "system" fn(),
                    vk::PFN_vkDestroyDebugUtilsMessengerEXT,
                >(destroy),
            })
        }
    }
}

fn unavailable(name: &CStr) -> VulkanError {
    VulkanError::DebugExtensionUnavailable {
        entry_point: name.to_string_lossy().into_owned(),
    }
}

struct Registration {
    instance: vk::Instance,
    entry_points: DebugEntryPoints,
    messenger: vk::DebugUtilsMessengerEXT,
    // Boxed so the pointer handed to the driver as user data stays put
    log: Box<DriverMessageLog>,
}

/// Installed (or inert) debug messenger
#[derive(Default)]
pub struct DiagnosticsBridge {
    registration: Option<Registration>,
}

impl DiagnosticsBridge {
    /// Bridge that holds no resources
    pub fn inert() -> Self {
        Self::default()
    }

    /// Register the debug callback on `instance`
    ///
    /// Returns an inert bridge when `enabled` is false without touching the driver.
    pub fn install(entry: &Entry, instance: &Instance, enabled: bool) -> VulkanResult<Self> {
        if !enabled {
            return Ok(Self::inert());
        }

        let handle = instance.handle();
        let entry_points = DebugEntryPoints::resolve(|name| unsafe {
            entry.get_instance_proc_addr(handle, name.as_ptr())
        })?;

        let log = Box::new(DriverMessageLog::default());
        let user_data = std::ptr::addr_of!(*log).cast_mut().cast::<c_void>();

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR
                    | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::INFO
                    | vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback))
            .user_data(user_data);

        let mut messenger = vk::DebugUtilsMessengerEXT::null();
        let messenger = unsafe {
            (entry_points.create)(handle, &*create_info, std::ptr::null(), &mut messenger)
                .result_with_success(messenger)
                .map_err(VulkanError::Api)?
        };

        log::debug!("Debug messenger registered");

        Ok(Self {
            registration: Some(Registration {
                instance: handle,
                entry_points,
                messenger,
                log,
            }),
        })
    }

    /// Whether a messenger is currently registered
    pub fn is_active(&self) -> bool {
        self.registration.is_some()
    }

    /// Take the error messages captured so far
    pub fn drain_errors(&self) -> Vec<String> {
        self.registration
            .as_ref()
            .map(|registration| registration.log.drain())
            .unwrap_or_default()
    }

    /// Unregister the messenger; a no-op for an inert bridge
    ///
    /// Must run before the owning instance is destroyed.
    pub fn destroy(&mut self) {
        if let Some(registration) = self.registration.take() {
            unsafe {
                (registration.entry_points.destroy)(
                    registration.instance,
                    registration.messenger,
                    std::ptr::null(),
                );
            }
            log::debug!("Debug messenger destroyed");
        }
    }
}

unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    user_data: *mut c_void,
) -> vk::Bool32 {
    if callback_data.is_null() || (*callback_data).p_message.is_null() {
        return vk::FALSE;
    }
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();
    let severity = MessageSeverity::classify(message_severity, message_type);

    match user_data.cast::<DriverMessageLog>().as_ref() {
        Some(log) => log.record(severity, &message),
        None => severity.log(&message),
    }

    vk::FALSE
}

#[cfg(test)]
mod tests {
    use super::*;

    unsafe extern "system" fn placeholder() {}

    #[test]
    fn test_classify_by_severity() {
        let general = vk::DebugUtilsMessageTypeFlagsEXT::GENERAL;
        assert_eq!(
            MessageSeverity::classify(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR, general),
            MessageSeverity::Error
        );
        assert_eq!(
            MessageSeverity::classify(vk::DebugUtilsMessageSeverityFlagsEXT::WARNING, general),
            MessageSeverity::Warning
        );
        assert_eq!(
            MessageSeverity::classify(vk::DebugUtilsMessageSeverityFlagsEXT::INFO, general),
            MessageSeverity::Information
        );
        assert_eq!(
            MessageSeverity::classify(vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE, general),
            MessageSeverity::Verbose
        );
    }

    #[test]
    fn test_performance_warning_classification() {
        assert_eq!(
            MessageSeverity::classify(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING,
                vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            ),
            MessageSeverity::PerformanceWarning
        );
        // Errors stay errors regardless of message type
        assert_eq!(
            MessageSeverity::classify(
                vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
                vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE
            ),
            MessageSeverity::Error
        );
    }

    #[test]
    fn test_log_keeps_only_errors() {
        let log = DriverMessageLog::default();
        log.record(MessageSeverity::Warning, "warning");
        log.record(MessageSeverity::Error, "first");
        log.record(MessageSeverity::Information, "info");
        log.record(MessageSeverity::Error, "second");

        assert_eq!(log.drain(), vec!["first".to_string(), "second".to_string()]);
        assert!(log.drain().is_empty());
    }

    #[test]
    fn test_log_is_bounded() {
        let log = DriverMessageLog::default();
        for i in 0..(MAX_CAPTURED_ERRORS + 4) {
            log.record(MessageSeverity::Error, &format!("error {i}"));
        }
        let captured = log.drain();
        assert_eq!(captured.len(), MAX_CAPTURED_ERRORS);
        assert_eq!(captured[0], "error 4");
    }

    #[test]
    fn test_missing_create_entry_point() {
        let err = DebugEntryPoints::resolve(|_| None).err().unwrap();
        assert_eq!(
            err,
            VulkanError::DebugExtensionUnavailable {
                entry_point: "vkCreateDebugUtilsMessengerEXT".to_string()
            }
        );
    }

    #[test]
    fn test_missing_destroy_entry_point() {
        let err = DebugEntryPoints::resolve(|name| {
            if name == CREATE_MESSENGER {
                Some(placeholder as unsafe extern "system" fn())
            } else {
                None
            }
        })
        .err()
        .unwrap();
        assert_eq!(
            err,
            VulkanError::DebugExtensionUnavailable {
                entry_point: "vkDestroyDebugUtilsMessengerEXT".to_string()
            }
        );
    }

    #[test]
    fn test_both_entry_points_resolved() {
        let mut looked_up = Vec::new();
        let resolved = DebugEntryPoints::resolve(|name| {
            looked_up.push(name.to_owned());
            Some(placeholder as unsafe extern "system" fn())
        });
        assert!(resolved.is_ok());
        assert_eq!(looked_up, vec![CREATE_MESSENGER.to_owned(), DESTROY_MESSENGER.to_owned()]);
    }

    #[test]
    fn test_inert_bridge() {
        let mut bridge = DiagnosticsBridge::inert();
        assert!(!bridge.is_active());
        assert!(bridge.drain_errors().is_empty());
        bridge.destroy();
        assert!(!bridge.is_active());
    }
}
