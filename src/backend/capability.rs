// Capability negotiation
//
// Answers two questions before an instance exists:
// - are the requested diagnostic layers installed on this host?
// - which instance extensions must be enabled?

use super::error::BootstrapResult;
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{CStr, CString};

/// The standard Khronos validation layer.
pub const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";

/// Enumerate every instance layer the loader knows about.
pub fn available_layers(entry: &Entry) -> BootstrapResult<Vec<vk::LayerProperties>> {
    let layers = entry.enumerate_instance_layer_properties()?;
    log::debug!("Host exposes {} instance layers", layers.len());
    Ok(layers)
}

/// Name of a layer as reported by the host.
pub fn layer_name(props: &vk::LayerProperties) -> &CStr {
    // The API guarantees a NUL-terminated name inside the fixed array
    unsafe { CStr::from_ptr(props.layer_name.as_ptr()) }
}

/// Requested layers absent from `available`, in request order.
///
/// Matching is exact and case-sensitive.
pub fn missing_layers(available: &[vk::LayerProperties], requested: &[CString]) -> Vec<String> {
    requested
        .iter()
        .filter(|wanted| {
            !available
                .iter()
                .any(|props| layer_name(props) == wanted.as_c_str())
        })
        .map(|wanted| wanted.to_string_lossy().into_owned())
        .collect()
}

/// True iff every requested layer is present on the host.
pub fn check_layer_support(available: &[vk::LayerProperties], requested: &[CString]) -> bool {
    missing_layers(available, requested).is_empty()
}

/// Instance extensions to enable: the surface provider's list, followed by
/// the debug-utils extension when diagnostics are on.
pub fn required_extensions(
    surface_extensions: &[&'static CStr],
    diagnostics_enabled: bool,
) -> Vec<&'static CStr> {
    let mut extensions = surface_extensions.to_vec();
    if diagnostics_enabled && !extensions.contains(&DebugUtils::name()) {
        extensions.push(DebugUtils::name());
    }
    extensions
}

#[cfg(test)]
pub(crate) fn fake_layer(name: &str) -> vk::LayerProperties {
    let mut props = vk::LayerProperties::default();
    for (dst, src) in props.layer_name.iter_mut().zip(name.bytes()) {
        *dst = src as std::ffi::c_char;
    }
    props
}
