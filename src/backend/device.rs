// Logical device creation
//
// Responsibilities:
// - One queue-creation descriptor per distinct family index
// - Device-level layers mirrored from the instance when diagnostics are on
// - Queue handle retrieval (queue 0 of each family)

use super::error::{BootstrapError, BootstrapResult};
use super::queue::QueueFamilyIndices;
use super::selector::SelectedDevice;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CString;

/// Every queue we request gets full priority.
static QUEUE_PRIORITIES: [f32; 1] = [1.0];

/// Everything passed to `vkCreateDevice`, computed before the call.
#[derive(Debug, Clone, PartialEq)]
pub struct DevicePlan {
    pub graphics_family: u32,
    pub present_family: u32,
    /// Distinct family indices, ascending.
    pub queue_families: Vec<u32>,
    /// Device layers. Ignored by current loaders, still set for older ones
    /// that distinguished instance and device layers.
    pub layers: Vec<CString>,
}

impl DevicePlan {
    pub fn new(
        indices: &QueueFamilyIndices,
        layers: &[CString],
        diagnostics_enabled: bool,
    ) -> BootstrapResult<Self> {
        let (graphics_family, present_family) =
            indices.complete().ok_or(BootstrapError::NoSuitableGpu)?;

        let unique: BTreeSet<u32> = [graphics_family, present_family].into_iter().collect();

        Ok(Self {
            graphics_family,
            present_family,
            queue_families: unique.into_iter().collect(),
            layers: if diagnostics_enabled {
                layers.to_vec()
            } else {
                Vec::new()
            },
        })
    }

    /// One descriptor per distinct family, one queue each.
    pub fn queue_create_infos(&self) -> Vec<vk::DeviceQueueCreateInfo> {
        self.queue_families
            .iter()
            .map(|&family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&QUEUE_PRIORITIES)
                    .build()
            })
            .collect()
    }
}

/// Logical device plus the queues retrieved from it. The two queues alias
/// when both families are the same.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub graphics_family: u32,
    pub present_family: u32,
}

pub fn create_logical_device(
    instance: &ash::Instance,
    selected: &SelectedDevice,
    plan: &DevicePlan,
) -> BootstrapResult<LogicalDevice> {
    let queue_create_infos = plan.queue_create_infos();
    let layer_names: Vec<_> = plan.layers.iter().map(|l| l.as_ptr()).collect();
    let features = vk::PhysicalDeviceFeatures::default();

    // No device extensions: nothing past device creation is needed yet
    let create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_create_infos)
        .enabled_layer_names(&layer_names)
        .enabled_features(&features);

    let device = unsafe { instance.create_device(selected.candidate.handle, &create_info, None) }
        .map_err(BootstrapError::LogicalDeviceCreationFailed)?;

    let graphics_queue = unsafe { device.get_device_queue(plan.graphics_family, 0) };
    let present_queue = unsafe { device.get_device_queue(plan.present_family, 0) };

    log::info!(
        "Logical device created: {} queue famil{} (graphics {}, present {})",
        plan.queue_families.len(),
        if plan.queue_families.len() == 1 { "y" } else { "ies" },
        plan.graphics_family,
        plan.present_family
    );

    Ok(LogicalDevice {
        device,
        graphics_queue,
        present_queue,
        graphics_family: plan.graphics_family,
        present_family: plan.present_family,
    })
}

impl LogicalDevice {
    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> BootstrapResult<()> {
        unsafe { self.device.device_wait_idle() }?;
        Ok(())
    }

    pub fn destroy(self) {
        report_idle_failure(self.wait_idle());
        unsafe { self.device.destroy_device(None) };
    }
}

/// Teardown proceeds regardless; the failure (usually device loss) is
/// only made visible. Returns true when the wait failed.
fn report_idle_failure(result: BootstrapResult<()>) -> bool {
    match result {
        Ok(()) => false,
        Err(e) => {
            log::warn!("wait_idle failed before device destruction: {}", e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_failure_before_destroy_is_reported() {
        assert!(report_idle_failure(Err(vk::Result::ERROR_DEVICE_LOST.into())));
        assert!(!report_idle_failure(Ok(())));
    }

    fn indices(graphics: u32, present: u32) -> QueueFamilyIndices {
        QueueFamilyIndices {
            graphics_family: Some(graphics),
            present_family: Some(present),
        }
    }

    fn validation() -> Vec<CString> {
        vec![CString::from(crate::backend::capability::VALIDATION_LAYER)]
    }

    #[test]
    fn shared_family_emits_one_descriptor() {
        let plan = DevicePlan::new(&indices(0, 0), &[], false).unwrap();
        let infos = plan.queue_create_infos();
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[0].queue_count, 1);
    }

    #[test]
    fn distinct_families_emit_two_descriptors() {
        let plan = DevicePlan::new(&indices(0, 1), &[], false).unwrap();
        let infos = plan.queue_create_infos();
        assert_eq!(infos.len(), 2);
        let families: Vec<u32> = infos.iter().map(|i| i.queue_family_index).collect();
        assert_eq!(families, vec![0, 1]);
    }

    #[test]
    fn descriptors_request_full_priority() {
        let plan = DevicePlan::new(&indices(2, 1), &[], false).unwrap();
        for info in plan.queue_create_infos() {
            assert_eq!(info.queue_count, 1);
            let priority = unsafe { *info.p_queue_priorities };
            assert_eq!(priority, 1.0);
        }
    }

    #[test]
    fn queue_roles_survive_dedup_ordering() {
        let plan = DevicePlan::new(&indices(3, 1), &[], false).unwrap();
        assert_eq!(plan.queue_families, vec![1, 3]);
        assert_eq!(plan.graphics_family, 3);
        assert_eq!(plan.present_family, 1);
    }

    #[test]
    fn layers_propagate_only_with_diagnostics() {
        let with = DevicePlan::new(&indices(0, 0), &validation(), true).unwrap();
        assert_eq!(with.layers, validation());

        let without = DevicePlan::new(&indices(0, 0), &validation(), false).unwrap();
        assert!(without.layers.is_empty());
    }

    #[test]
    fn selected_combined_family_plans_one_queue() {
        use crate::backend::queue::family;
        use crate::backend::selector::{fake::FakeHost, pick_device, SelectionPolicy};
        use ash::vk::Handle;

        let host = FakeHost::new().with_device(
            "Combined",
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vec![family(vk::QueueFlags::GRAPHICS)],
            vec![0],
        );
        let selected = pick_device(&host, vk::SurfaceKHR::from_raw(1), SelectionPolicy::FirstSuitable)
            .unwrap();
        let plan = DevicePlan::new(&selected.indices, &validation(), true).unwrap();
        assert_eq!(plan.queue_create_infos().len(), 1);
    }

    #[test]
    fn selected_split_families_plan_two_queues() {
        use crate::backend::queue::family;
        use crate::backend::selector::{fake::FakeHost, pick_device, SelectionPolicy};
        use ash::vk::Handle;

        let host = FakeHost::new().with_device(
            "Split",
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vec![family(vk::QueueFlags::GRAPHICS), family(vk::QueueFlags::TRANSFER)],
            vec![1],
        );
        let selected = pick_device(&host, vk::SurfaceKHR::from_raw(1), SelectionPolicy::FirstSuitable)
            .unwrap();
        assert_eq!(selected.indices.complete(), Some((0, 1)));
        let plan = DevicePlan::new(&selected.indices, &[], false).unwrap();
        assert_eq!(plan.queue_create_infos().len(), 2);
    }

    #[test]
    fn incomplete_indices_are_rejected() {
        let partial = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: None,
        };
        let err = DevicePlan::new(&partial, &[], false).unwrap_err();
        assert!(matches!(err, BootstrapError::NoSuitableGpu));
    }
}
