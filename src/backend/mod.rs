// Backend module - Vulkan bootstrap
//
// Design: Thin wrapper around ash; host queries sit behind small traits so
// selection and planning run without a driver.

pub mod capability;
pub mod context;
pub mod debug;
pub mod device;
pub mod error;
pub mod instance;
pub mod queue;
pub mod selector;
pub mod surface;

pub use context::VulkanContext;
pub use error::{BootstrapError, BootstrapResult};
pub use selector::SelectionPolicy;
