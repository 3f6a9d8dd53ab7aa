// Bootstrap sequence
//
// instance -> diagnostic channel -> surface -> physical device -> logical device
//
// Each step blocks until done and any failure aborts the whole sequence.
// Whatever was created before the failure is still torn down by Drop, in
// strict reverse order, skipping anything that never came to exist.

use super::debug::{ChannelConfig, DebugUtilsBackend, DiagnosticChannel};
use super::device::{create_logical_device, DevicePlan, LogicalDevice};
use super::error::BootstrapResult;
use super::instance::{create_instance, InstancePlan};
use super::selector::{pick_device, InstanceDevices, SelectedDevice};
use super::surface::SurfaceProvider;
use crate::config::BootstrapConfig;
use ash::extensions::khr::Surface;
use ash::{vk, Entry};

/// Owns every handle created during bootstrap.
///
/// IMPORTANT: no child handle may outlive `instance`. Drop enforces the
/// order; do not move handles out.
pub struct VulkanContext {
    device: Option<LogicalDevice>,
    selected: Option<SelectedDevice>,
    surface: Option<vk::SurfaceKHR>,
    surface_loader: Option<Surface>,
    channel: DiagnosticChannel<DebugUtilsBackend>,
    instance: Option<ash::Instance>,
    _entry: Entry,
}

impl VulkanContext {
    pub fn new(config: &BootstrapConfig, provider: &impl SurfaceProvider) -> BootstrapResult<Self> {
        log::info!("Initializing Vulkan...");

        let entry = unsafe { Entry::load() }?;
        let mut context = Self {
            device: None,
            selected: None,
            surface: None,
            surface_loader: None,
            channel: DiagnosticChannel::new(ChannelConfig::default()),
            instance: None,
            _entry: entry,
        };

        // On error `context` drops here and releases the partial state
        context.init(config, provider)?;

        log::info!("Vulkan initialized successfully!");
        Ok(context)
    }

    fn init(&mut self, config: &BootstrapConfig, provider: &impl SurfaceProvider) -> BootstrapResult<()> {
        let entry = &self._entry;

        // STEP 1: Instance
        let surface_extensions = provider.required_extensions()?;
        let plan = InstancePlan::negotiate(entry, config, &surface_extensions)?;
        let instance = create_instance(entry, config, &plan, self.channel.config())?;
        let instance = &*self.instance.insert(instance);

        // STEP 2: Diagnostic channel
        self.channel
            .setup(config.diagnostics_enabled, || DebugUtilsBackend::load(entry, instance))?;

        // STEP 3: Surface
        let surface_loader = &*self.surface_loader.insert(Surface::new(entry, instance));
        let surface = *self.surface.insert(provider.create_surface(entry, instance)?);

        // STEP 4: Physical device
        let source = InstanceDevices {
            instance,
            surface_loader,
        };
        let selected = pick_device(&source, surface, config.selection)?;

        // STEP 5: Logical device + queues
        let plan = DevicePlan::new(&selected.indices, &config.layers, config.diagnostics_enabled)?;
        let device = create_logical_device(instance, &selected, &plan)?;

        self.selected = Some(selected);
        self.device = Some(device);
        Ok(())
    }

    pub fn selected(&self) -> Option<&SelectedDevice> {
        self.selected.as_ref()
    }

    /// Wait for the device to go idle; no-op before a device exists.
    pub fn wait_idle(&self) -> BootstrapResult<()> {
        match &self.device {
            Some(device) => device.wait_idle(),
            None => Ok(()),
        }
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan context...");

        let mut live = LiveTeardown {
            surface_loader: self.surface_loader.as_ref(),
            channel: &mut self.channel,
        };
        teardown(&mut live, &mut self.device, &mut self.surface, &mut self.instance);

        log::info!("Cleanup complete");
    }
}

/// Destruction of each handle the context owns.
pub(crate) trait Teardown {
    type Device;
    type Surface;
    type Instance;

    fn destroy_device(&mut self, device: Self::Device);
    fn destroy_surface(&mut self, surface: Self::Surface);
    fn destroy_channel(&mut self);
    fn destroy_instance(&mut self, instance: Self::Instance);
}

/// Destroy in strict reverse creation order: device, surface, channel,
/// instance. Absent handles are skipped; the channel can only exist
/// alongside an instance. Handles are taken, so a second call is a no-op.
pub(crate) fn teardown<T: Teardown>(
    ops: &mut T,
    device: &mut Option<T::Device>,
    surface: &mut Option<T::Surface>,
    instance: &mut Option<T::Instance>,
) {
    if let Some(device) = device.take() {
        ops.destroy_device(device);
        log::debug!("Logical device destroyed");
    }

    if let Some(surface) = surface.take() {
        ops.destroy_surface(surface);
        log::debug!("Surface destroyed");
    }

    if let Some(instance) = instance.take() {
        ops.destroy_channel();
        ops.destroy_instance(instance);
        log::debug!("Instance destroyed");
    }
}

struct LiveTeardown<'a> {
    surface_loader: Option<&'a Surface>,
    channel: &'a mut DiagnosticChannel<DebugUtilsBackend>,
}

impl Teardown for LiveTeardown<'_> {
    type Device = LogicalDevice;
    type Surface = vk::SurfaceKHR;
    type Instance = ash::Instance;

    fn destroy_device(&mut self, device: LogicalDevice) {
        device.destroy();
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = self.surface_loader {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn destroy_channel(&mut self) {
        self.channel.destroy();
    }

    fn destroy_instance(&mut self, instance: ash::Instance) {
        unsafe { instance.destroy_instance(None) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        steps: Vec<&'static str>,
    }

    impl Teardown for Recorder {
        type Device = ();
        type Surface = ();
        type Instance = ();

        fn destroy_device(&mut self, _: ()) {
            self.steps.push("device");
        }

        fn destroy_surface(&mut self, _: ()) {
            self.steps.push("surface");
        }

        fn destroy_channel(&mut self) {
            self.steps.push("channel");
        }

        fn destroy_instance(&mut self, _: ()) {
            self.steps.push("instance");
        }
    }

    fn run(device: Option<()>, surface: Option<()>, instance: Option<()>) -> Vec<&'static str> {
        let (mut device, mut surface, mut instance) = (device, surface, instance);
        let mut recorder = Recorder::default();
        teardown(&mut recorder, &mut device, &mut surface, &mut instance);
        recorder.steps
    }

    #[test]
    fn full_teardown_reverses_creation() {
        assert_eq!(
            run(Some(()), Some(()), Some(())),
            vec!["device", "surface", "channel", "instance"]
        );
    }

    #[test]
    fn failure_after_instance_destroys_channel_and_instance() {
        assert_eq!(run(None, None, Some(())), vec!["channel", "instance"]);
    }

    #[test]
    fn failure_after_surface_skips_device() {
        assert_eq!(run(None, Some(()), Some(())), vec!["surface", "channel", "instance"]);
    }

    #[test]
    fn nothing_created_destroys_nothing() {
        assert!(run(None, None, None).is_empty());
    }

    #[test]
    fn second_teardown_is_a_no_op() {
        let (mut device, mut surface, mut instance) = (Some(()), Some(()), Some(()));
        let mut recorder = Recorder::default();
        teardown(&mut recorder, &mut device, &mut surface, &mut instance);
        teardown(&mut recorder, &mut device, &mut surface, &mut instance);
        assert_eq!(recorder.steps.len(), 4);
    }
}
