// Diagnostic channel - validation layer message sink
//
// Lifecycle: Uninitialized -> Active -> Destroyed. A channel only becomes
// Active when diagnostics are enabled; otherwise every operation is a no-op.
// The messenger is a child of the instance and must be destroyed before it.

use super::error::{BootstrapError, BootstrapResult};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::borrow::Cow;
use std::ffi::{c_void, CStr};
use std::io::{self, Write};

const CREATE_MESSENGER_FN: &CStr = c"vkCreateDebugUtilsMessengerEXT";
const DESTROY_MESSENGER_FN: &CStr = c"vkDestroyDebugUtilsMessengerEXT";

/// Messenger configuration, fixed at construction.
#[derive(Clone, Copy)]
pub struct ChannelConfig {
    pub severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    pub categories: vk::DebugUtilsMessageTypeFlagsEXT,
    pub callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    pub user_data: *mut c_void,
}

impl Default for ChannelConfig {
    /// INFO is left out of the severity mask; it floods the sink with
    /// resource-creation chatter.
    fn default() -> Self {
        Self {
            severity: vk::DebugUtilsMessageSeverityFlagsEXT::VERBOSE
                | vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            categories: vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            callback: Some(diagnostic_callback),
            user_data: std::ptr::null_mut(),
        }
    }
}

impl ChannelConfig {
    /// Descriptor used both for the standalone messenger and for chaining
    /// into instance creation.
    pub fn create_info(&self) -> vk::DebugUtilsMessengerCreateInfoEXT {
        vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(self.severity)
            .message_type(self.categories)
            .pfn_user_callback(self.callback)
            .user_data(self.user_data)
            .build()
    }
}

/// Creates and destroys messengers on behalf of a channel.
pub trait MessengerBackend {
    fn create(
        &self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> BootstrapResult<vk::DebugUtilsMessengerEXT>;

    fn destroy(&self, messenger: vk::DebugUtilsMessengerEXT);
}

/// Live backend resolved through the instance's function lookup.
pub struct DebugUtilsBackend {
    loader: DebugUtils,
    destroy_available: bool,
}

impl DebugUtilsBackend {
    /// Fails with `ExtensionNotPresent` when the instance cannot resolve the
    /// create entry point (debug-utils not enabled, or unsupported driver).
    pub fn load(entry: &Entry, instance: &ash::Instance) -> BootstrapResult<Self> {
        if lookup(entry, instance, CREATE_MESSENGER_FN).is_none() {
            return Err(BootstrapError::ExtensionNotPresent("vkCreateDebugUtilsMessengerEXT"));
        }
        let destroy_available = lookup(entry, instance, DESTROY_MESSENGER_FN).is_some();

        Ok(Self {
            loader: DebugUtils::new(entry, instance),
            destroy_available,
        })
    }
}

fn lookup(entry: &Entry, instance: &ash::Instance, name: &CStr) -> vk::PFN_vkVoidFunction {
    unsafe { entry.get_instance_proc_addr(instance.handle(), name.as_ptr()) }
}

impl MessengerBackend for DebugUtilsBackend {
    fn create(
        &self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT,
    ) -> BootstrapResult<vk::DebugUtilsMessengerEXT> {
        let messenger = unsafe { self.loader.create_debug_utils_messenger(info, None) }?;
        Ok(messenger)
    }

    fn destroy(&self, messenger: vk::DebugUtilsMessengerEXT) {
        // Missing entry point means the messenger is already gone with the loader
        if !self.destroy_available {
            log::debug!("vkDestroyDebugUtilsMessengerEXT not present, skipping");
            return;
        }
        unsafe { self.loader.destroy_debug_utils_messenger(messenger, None) };
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Active(vk::DebugUtilsMessengerEXT),
    Destroyed,
}

pub struct DiagnosticChannel<B: MessengerBackend> {
    config: ChannelConfig,
    backend: Option<B>,
    state: ChannelState,
}

impl<B: MessengerBackend> DiagnosticChannel<B> {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            backend: None,
            state: ChannelState::Uninitialized,
        }
    }

    /// Bring the channel up. When `enabled` is false the backend is never
    /// loaded and the channel stays Uninitialized.
    pub fn setup(
        &mut self,
        enabled: bool,
        load_backend: impl FnOnce() -> BootstrapResult<B>,
    ) -> BootstrapResult<()> {
        if !enabled || self.state != ChannelState::Uninitialized {
            return Ok(());
        }

        let backend = load_backend()?;
        let messenger = backend.create(&self.config.create_info())?;
        self.backend = Some(backend);
        self.state = ChannelState::Active(messenger);

        log::info!("Diagnostic messenger active");
        Ok(())
    }

    pub fn destroy(&mut self) {
        if let ChannelState::Active(messenger) = self.state {
            if let Some(backend) = self.backend.take() {
                backend.destroy(messenger);
            }
            self.state = ChannelState::Destroyed;
            log::debug!("Diagnostic messenger destroyed");
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ChannelState::Active(_))
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }
}

impl<B: MessengerBackend> Drop for DiagnosticChannel<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Write one diagnostic line in the sink's format.
pub fn write_message<W: Write>(out: &mut W, text: &str) -> io::Result<()> {
    writeln!(out, "validation layer: {}", text)
}

/// Callback handed to the driver. Never asks the driver to abort the call
/// that produced the message.
pub unsafe extern "system" fn diagnostic_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut c_void,
) -> vk::Bool32 {
    let (message, object_count) = if p_callback_data.is_null() {
        (Cow::Borrowed("<no message>"), 0)
    } else {
        let data = &*p_callback_data;
        let text = if data.p_message.is_null() {
            Cow::Borrowed("<no message>")
        } else {
            CStr::from_ptr(data.p_message).to_string_lossy()
        };
        (text, data.object_count)
    };

    let _ = write_message(&mut io::stderr().lock(), &message);

    if message_severity.contains(vk::DebugUtilsMessageSeverityFlagsEXT::ERROR) {
        log::error!("[Vulkan {:?}] {} ({} objects)", message_type, message, object_count);
    }

    vk::FALSE
}
