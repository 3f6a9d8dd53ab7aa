// Instance creation
//
// Layer support is checked before anything is created. When diagnostics are
// on, a messenger descriptor is chained into the create call so messages
// emitted during vkCreateInstance / vkDestroyInstance are captured too.

use super::capability;
use super::debug::ChannelConfig;
use super::error::{BootstrapError, BootstrapResult};
use crate::config::BootstrapConfig;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

/// Everything passed to `vkCreateInstance`, computed before the call.
#[derive(Debug, Clone, PartialEq)]
pub struct InstancePlan {
    pub extensions: Vec<&'static CStr>,
    pub layers: Vec<CString>,
    /// Chain a messenger descriptor into the create call.
    pub chain_diagnostics: bool,
}

impl InstancePlan {
    /// Fails with `ValidationLayersUnavailable` when diagnostics are on and
    /// a configured layer is not in `available_layers`.
    pub fn new(
        config: &BootstrapConfig,
        surface_extensions: &[&'static CStr],
        available_layers: &[vk::LayerProperties],
    ) -> BootstrapResult<Self> {
        let enabled = config.diagnostics_enabled;

        if enabled && !capability::check_layer_support(available_layers, &config.layers) {
            let missing = capability::missing_layers(available_layers, &config.layers);
            return Err(BootstrapError::ValidationLayersUnavailable { missing });
        }

        Ok(Self {
            extensions: capability::required_extensions(surface_extensions, enabled),
            layers: if enabled { config.layers.clone() } else { Vec::new() },
            chain_diagnostics: enabled,
        })
    }

    /// Query the host and build the plan. Layers are only enumerated when
    /// diagnostics are on.
    pub fn negotiate(
        entry: &Entry,
        config: &BootstrapConfig,
        surface_extensions: &[&'static CStr],
    ) -> BootstrapResult<Self> {
        let available = if config.diagnostics_enabled {
            capability::available_layers(entry)?
        } else {
            Vec::new()
        };
        Self::new(config, surface_extensions, &available)
    }
}

pub fn create_instance(
    entry: &Entry,
    config: &BootstrapConfig,
    plan: &InstancePlan,
    channel: &ChannelConfig,
) -> BootstrapResult<ash::Instance> {
    let app = &config.application;

    let app_info = vk::ApplicationInfo::builder()
        .application_name(&app.name)
        .application_version(app.version)
        .engine_name(&app.engine_name)
        .engine_version(app.engine_version)
        .api_version(app.api_version);

    let extensions: Vec<_> = plan.extensions.iter().map(|e| e.as_ptr()).collect();
    let layers: Vec<_> = plan.layers.iter().map(|l| l.as_ptr()).collect();

    // Must outlive the create call it is chained into
    let mut debug_info = channel.create_info();

    let mut create_info = vk::InstanceCreateInfo::builder()
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    if plan.chain_diagnostics {
        create_info = create_info.push_next(&mut debug_info);
    }

    let instance = unsafe { entry.create_instance(&create_info, None) }
        .map_err(BootstrapError::InstanceCreationFailed)?;

    log::info!(
        "Instance created ({} extensions, {} layers)",
        extensions.len(),
        layers.len()
    );
    for ext in &plan.extensions {
        log::debug!("  extension: {}", ext.to_string_lossy());
    }

    Ok(instance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::capability::{fake_layer, VALIDATION_LAYER};
    use ash::extensions::ext::DebugUtils;
    use ash::extensions::khr::Surface;

    fn config(diagnostics_enabled: bool) -> BootstrapConfig {
        BootstrapConfig {
            diagnostics_enabled,
            ..BootstrapConfig::default()
        }
    }

    #[test]
    fn missing_validation_layer_fails_before_creation() {
        let host = [fake_layer("VK_LAYER_LUNARG_monitor")];
        let err = InstancePlan::new(&config(true), &[Surface::name()], &host).unwrap_err();
        match err {
            BootstrapError::ValidationLayersUnavailable { missing } => {
                assert_eq!(missing, vec!["VK_LAYER_KHRONOS_validation"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn diagnostics_plan_enables_layer_extension_and_chain() {
        let host = [fake_layer("VK_LAYER_KHRONOS_validation")];
        let plan = InstancePlan::new(&config(true), &[Surface::name()], &host).unwrap();
        assert_eq!(plan.extensions, vec![Surface::name(), DebugUtils::name()]);
        assert_eq!(plan.layers, vec![CString::from(VALIDATION_LAYER)]);
        assert!(plan.chain_diagnostics);
    }

    #[test]
    fn plain_plan_skips_layer_check() {
        let plan = InstancePlan::new(&config(false), &[Surface::name()], &[]).unwrap();
        assert_eq!(plan.extensions, vec![Surface::name()]);
        assert!(plan.layers.is_empty());
        assert!(!plan.chain_diagnostics);
    }
}
