//! Vulkan bootstrap: instance, diagnostics, surface, physical device
//! selection and logical device creation, torn down in reverse order.

pub mod backend;
pub mod config;
