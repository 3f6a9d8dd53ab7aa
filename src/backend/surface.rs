// Surface binding - window connection
//
// The window system decides which instance extensions are needed and how
// the presentation surface is created. The bootstrap only sees this trait.

use super::error::{BootstrapError, BootstrapResult};
use ash::{vk, Entry};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::CStr;

pub trait SurfaceProvider {
    /// Instance extensions the window system needs, in its order.
    fn required_extensions(&self) -> BootstrapResult<Vec<&'static CStr>>;

    fn create_surface(&self, entry: &Entry, instance: &ash::Instance)
        -> BootstrapResult<vk::SurfaceKHR>;
}

/// Surface provider backed by a winit window through ash-window.
pub struct WindowSurface<'a> {
    window: &'a winit::window::Window,
}

impl<'a> WindowSurface<'a> {
    pub fn new(window: &'a winit::window::Window) -> Self {
        Self { window }
    }
}

impl SurfaceProvider for WindowSurface<'_> {
    fn required_extensions(&self) -> BootstrapResult<Vec<&'static CStr>> {
        let names = ash_window::enumerate_required_extensions(self.window.raw_display_handle())?;
        // ash-window hands out pointers to static extension-name constants
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) })
            .collect())
    }

    fn create_surface(
        &self,
        entry: &Entry,
        instance: &ash::Instance,
    ) -> BootstrapResult<vk::SurfaceKHR> {
        let surface = unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.window.raw_display_handle(),
                self.window.raw_window_handle(),
                None,
            )
        }
        .map_err(BootstrapError::SurfaceCreationFailed)?;

        log::info!("Window surface created");
        Ok(surface)
    }
}
