// Bootstrap errors
//
// Every variant is fatal to the bootstrap sequence. Nothing in the backend
// retries or recovers; the caller decides whether to exit or report.

use ash::vk;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BootstrapError {
    /// The Vulkan loader library could not be opened.
    #[error("failed to load the Vulkan library: {0}")]
    LoaderUnavailable(#[from] ash::LoadingError),

    /// Diagnostics were requested but at least one layer is missing on this host.
    #[error("validation layers requested, but not available: {missing:?}")]
    ValidationLayersUnavailable { missing: Vec<String> },

    #[error("failed to create instance")]
    InstanceCreationFailed(#[source] vk::Result),

    #[error("failed to create window surface")]
    SurfaceCreationFailed(#[source] vk::Result),

    #[error("failed to create logical device")]
    LogicalDeviceCreationFailed(#[source] vk::Result),

    /// An instance-level extension entry point could not be resolved.
    #[error("extension function not present: {0}")]
    ExtensionNotPresent(&'static str),

    #[error("failed to find GPUs with Vulkan support")]
    NoGpuFound,

    #[error("failed to find a suitable GPU")]
    NoSuitableGpu,

    /// A host query (enumeration or support check) returned an error code.
    #[error("vulkan query failed")]
    Vulkan(#[from] vk::Result),

    #[error("name contains an interior NUL byte: {0:?}")]
    InvalidName(String),
}

pub type BootstrapResult<T> = std::result::Result<T, BootstrapError>;
