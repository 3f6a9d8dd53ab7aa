// Physical device selection
//
// Candidates are logged in enumeration order, then filtered by queue family
// completeness. Default policy is first-suitable: the first candidate that
// resolves a complete set of families wins and later ones are never queried.

use super::error::{BootstrapError, BootstrapResult};
use super::queue::{self, QueueFamilyIndices};
use ash::extensions::khr::Surface;
use ash::vk;
use std::ffi::CStr;
use std::fmt;

/// An enumerated accelerator with its static properties.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub api_version: u32,
    pub driver_version: u32,
    pub vendor_id: u32,
    pub device_id: u32,
    pub device_type: vk::PhysicalDeviceType,
    pub queue_families: Vec<vk::QueueFamilyProperties>,
}

impl fmt::Display for PhysicalDeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Device Name:      {}", self.name)?;
        writeln!(
            f,
            "API Version:      {}.{}.{}",
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            vk::api_version_patch(self.api_version)
        )?;
        writeln!(f, "Driver Version:   {}", self.driver_version)?;
        writeln!(f, "Vendor ID:        {:#06x}", self.vendor_id)?;
        write!(f, "Device ID:        {:#06x}", self.device_id)
    }
}

/// Where candidates come from and how presentation support is answered.
pub trait DeviceSource {
    fn candidates(&self) -> BootstrapResult<Vec<PhysicalDeviceCandidate>>;

    fn presentation_support(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> BootstrapResult<bool>;
}

/// Live source: an instance plus the surface loader bound to it.
pub struct InstanceDevices<'a> {
    pub instance: &'a ash::Instance,
    pub surface_loader: &'a Surface,
}

impl DeviceSource for InstanceDevices<'_> {
    fn candidates(&self) -> BootstrapResult<Vec<PhysicalDeviceCandidate>> {
        let devices = unsafe { self.instance.enumerate_physical_devices() }?;

        let candidates = devices
            .into_iter()
            .map(|handle| {
                let props = unsafe { self.instance.get_physical_device_properties(handle) };
                let queue_families = unsafe {
                    self.instance.get_physical_device_queue_family_properties(handle)
                };
                PhysicalDeviceCandidate {
                    handle,
                    name: unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
                        .to_string_lossy()
                        .into_owned(),
                    api_version: props.api_version,
                    driver_version: props.driver_version,
                    vendor_id: props.vendor_id,
                    device_id: props.device_id,
                    device_type: props.device_type,
                    queue_families,
                }
            })
            .collect();

        Ok(candidates)
    }

    fn presentation_support(
        &self,
        device: vk::PhysicalDevice,
        family_index: u32,
        surface: vk::SurfaceKHR,
    ) -> BootstrapResult<bool> {
        let supported = unsafe {
            self.surface_loader
                .get_physical_device_surface_support(device, family_index, surface)
        }?;
        Ok(supported)
    }
}

/// How to choose between suitable candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SelectionPolicy {
    /// First suitable candidate in enumeration order. No ranking.
    #[default]
    FirstSuitable,
    /// Score every suitable candidate by device type, highest wins.
    PreferDiscrete,
}

/// The chosen device with the indices resolved against it.
#[derive(Debug, Clone)]
pub struct SelectedDevice {
    pub candidate: PhysicalDeviceCandidate,
    pub indices: QueueFamilyIndices,
}

/// Resolve queue families for one candidate against `surface`.
pub fn find_queue_families(
    source: &impl DeviceSource,
    candidate: &PhysicalDeviceCandidate,
    surface: vk::SurfaceKHR,
) -> BootstrapResult<QueueFamilyIndices> {
    queue::resolve(&candidate.queue_families, |i| {
        source.presentation_support(candidate.handle, i, surface)
    })
}

pub fn pick_device(
    source: &impl DeviceSource,
    surface: vk::SurfaceKHR,
    policy: SelectionPolicy,
) -> BootstrapResult<SelectedDevice> {
    let candidates = source.candidates()?;

    if candidates.is_empty() {
        return Err(BootstrapError::NoGpuFound);
    }

    for (n, candidate) in candidates.iter().enumerate() {
        log::info!("Physical device {}\n{}", n + 1, candidate);
    }

    let selected = match policy {
        SelectionPolicy::FirstSuitable => first_suitable(source, candidates, surface)?,
        SelectionPolicy::PreferDiscrete => prefer_discrete(source, candidates, surface)?,
    };

    let selected = selected.ok_or(BootstrapError::NoSuitableGpu)?;
    log::info!("Suitable device chosen: {}", selected.candidate.name);
    Ok(selected)
}

fn first_suitable(
    source: &impl DeviceSource,
    candidates: Vec<PhysicalDeviceCandidate>,
    surface: vk::SurfaceKHR,
) -> BootstrapResult<Option<SelectedDevice>> {
    for candidate in candidates {
        // Suitable iff the families resolve completely
        let indices = find_queue_families(source, &candidate, surface)?;
        if indices.is_complete() {
            return Ok(Some(SelectedDevice { candidate, indices }));
        }
        log::debug!("Rejected {}: incomplete queue families {:?}", candidate.name, indices);
    }
    Ok(None)
}

fn device_score(device_type: vk::PhysicalDeviceType) -> u32 {
    match device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 1000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 100,
        _ => 1,
    }
}

fn prefer_discrete(
    source: &impl DeviceSource,
    candidates: Vec<PhysicalDeviceCandidate>,
    surface: vk::SurfaceKHR,
) -> BootstrapResult<Option<SelectedDevice>> {
    let mut best: Option<(u32, SelectedDevice)> = None;

    for candidate in candidates {
        let indices = find_queue_families(source, &candidate, surface)?;
        if !indices.is_complete() {
            log::debug!("Rejected {}: incomplete queue families {:?}", candidate.name, indices);
            continue;
        }

        // Strictly greater, so ties keep the earlier candidate
        let score = device_score(candidate.device_type);
        if best.as_ref().map_or(true, |(best_score, _)| score > *best_score) {
            best = Some((score, SelectedDevice { candidate, indices }));
        }
    }

    Ok(best.map(|(_, selected)| selected))
}


#[cfg(test)]
mod tests {
    use super::fake::FakeHost;
    use super::*;
    use crate::backend::queue::family;
    use ash::vk::Handle;

    const G: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
    const T: vk::QueueFlags = vk::QueueFlags::TRANSFER;

    fn surface() -> vk::SurfaceKHR {
        vk::SurfaceKHR::from_raw(0x5f)
    }

    #[test]
    fn single_combined_family_device_is_selected() {
        let host = FakeHost::new().with_device(
            "Combined",
            vk::PhysicalDeviceType::DISCRETE_GPU,
            vec![family(G)],
            vec![0],
        );
        let selected = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap();
        assert_eq!(selected.candidate.name, "Combined");
        assert_eq!(selected.indices.complete(), Some((0, 0)));
    }

    #[test]
    fn split_families_device_is_selected() {
        let host = FakeHost::new().with_device(
            "Split",
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            vec![family(G), family(T)],
            vec![1],
        );
        let selected = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap();
        assert_eq!(selected.indices.graphics_family, Some(0));
        assert_eq!(selected.indices.present_family, Some(1));
    }

    #[test]
    fn empty_enumeration_is_no_gpu_found() {
        let host = FakeHost::new();
        let err = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap_err();
        assert!(matches!(err, BootstrapError::NoGpuFound));
    }

    #[test]
    fn unsuitable_first_candidate_is_skipped() {
        let host = FakeHost::new()
            .with_device("Headless", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![])
            .with_device("Windowed", vk::PhysicalDeviceType::INTEGRATED_GPU, vec![family(G)], vec![0]);
        let selected = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap();
        assert_eq!(selected.candidate.name, "Windowed");
        assert_eq!(selected.candidate.handle, vk::PhysicalDevice::from_raw(2));
    }

    #[test]
    fn no_suitable_candidate() {
        let host = FakeHost::new()
            .with_device("A", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![])
            .with_device("B", vk::PhysicalDeviceType::CPU, vec![family(T)], vec![0]);
        let err = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap_err();
        assert!(matches!(err, BootstrapError::NoSuitableGpu));
    }

    #[test]
    fn first_suitable_stops_evaluating() {
        let host = FakeHost::new()
            .with_device("First", vk::PhysicalDeviceType::INTEGRATED_GPU, vec![family(G)], vec![0])
            .with_device("Second", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![0]);
        let selected = pick_device(&host, surface(), SelectionPolicy::FirstSuitable).unwrap();
        assert_eq!(selected.candidate.name, "First");
        assert_eq!(host.queried_devices(), vec![vk::PhysicalDevice::from_raw(1)]);
    }

    #[test]
    fn prefer_discrete_ranks_suitable_candidates() {
        let host = FakeHost::new()
            .with_device("Integrated", vk::PhysicalDeviceType::INTEGRATED_GPU, vec![family(G)], vec![0])
            .with_device("Discrete", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![0])
            .with_device("Unsuitable", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(T)], vec![]);
        let selected = pick_device(&host, surface(), SelectionPolicy::PreferDiscrete).unwrap();
        assert_eq!(selected.candidate.name, "Discrete");
    }

    #[test]
    fn prefer_discrete_ties_keep_enumeration_order() {
        let host = FakeHost::new()
            .with_device("One", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![0])
            .with_device("Two", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![0]);
        let selected = pick_device(&host, surface(), SelectionPolicy::PreferDiscrete).unwrap();
        assert_eq!(selected.candidate.name, "One");
    }

    #[test]
    fn suitability_predicate_matches_completeness() {
        let host = FakeHost::new()
            .with_device("A", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![0])
            .with_device("B", vk::PhysicalDeviceType::DISCRETE_GPU, vec![family(G)], vec![]);
        let candidates = host.candidates().unwrap();
        assert!(find_queue_families(&host, &candidates[0], surface()).unwrap().is_complete());
        assert!(!find_queue_families(&host, &candidates[1], surface()).unwrap().is_complete());
    }

    #[test]
    fn candidate_report_lists_identity() {
        let host = FakeHost::new().with_device("Card", vk::PhysicalDeviceType::DISCRETE_GPU, vec![], vec![]);
        let report = host.candidates().unwrap()[0].to_string();
        assert!(report.contains("Device Name:      Card"));
        assert!(report.contains("API Version:      1.3.0"));
        assert!(report.contains("Vendor ID:        0x10de"));
        assert!(report.contains("Device ID:        0x2684"));
    }
}
