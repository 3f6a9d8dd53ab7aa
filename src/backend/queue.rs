// Queue family resolution
//
// Graphics capability and presentation support are resolved independently,
// first match wins for each. A family supporting both is not preferred over
// two separate families.

use super::error::BootstrapResult;
use ash::vk;

/// Family indices resolved against one physical device. Meaningless for any
/// other device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics_family: Option<u32>,
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Both a graphics and a present family were found.
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Both indices, if complete.
    pub fn complete(&self) -> Option<(u32, u32)> {
        Some((self.graphics_family?, self.present_family?))
    }
}

/// Walk `families` in index order. `supports_present` is asked once per
/// visited index; iteration stops as soon as both indices are set.
pub fn resolve(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: impl FnMut(u32) -> BootstrapResult<bool>,
) -> BootstrapResult<QueueFamilyIndices> {
    let mut indices = QueueFamilyIndices::default();

    for (i, family) in (0u32..).zip(families) {
        if indices.graphics_family.is_none()
            && family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
        {
            indices.graphics_family = Some(i);
        }

        if indices.present_family.is_none() && supports_present(i)? {
            indices.present_family = Some(i);
        }

        if indices.is_complete() {
            break;
        }
    }

    Ok(indices)
}

#[cfg(test)]
pub(crate) fn family(flags: vk::QueueFlags) -> vk::QueueFamilyProperties {
    vk::QueueFamilyProperties {
        queue_flags: flags,
        queue_count: 1,
        ..Default::default()
    }
}
