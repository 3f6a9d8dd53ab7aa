// =============================================================================
// VULKAN BOOTSTRAP - window, instance, device
// =============================================================================
//
// Brings up a Vulkan context against a window and then idles in the event
// loop until the window is closed.
//
// BOOTSTRAP FLOW:
// 1. Instance (validation layers + debug-utils in debug builds)
// 2. Diagnostic messenger
// 3. Window surface
// 4. Physical device selection (queue family completeness)
// 5. Logical device + graphics/present queues
//
// Teardown runs in exact reverse order when the context drops.
//
// =============================================================================

use anyhow::{Context, Result};
use vk_bootstrap_app::backend::surface::WindowSurface;
use vk_bootstrap_app::backend::VulkanContext;
use vk_bootstrap_app::config::{BootstrapConfig, Config};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowAttributes},
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<()> {
    // Load configuration from config.toml
    let (config, load_error) = Config::load();

    init_logging(&config);
    if let Some(e) = load_error {
        log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
    }
    log::debug!("Config: {:?}", config);
    log::info!("Starting Vulkan bootstrap");
    log::info!(
        "Window: {}x{} \"{}\"",
        config.window.width,
        config.window.height,
        config.window.title
    );

    let bootstrap = config
        .bootstrap()
        .context("Invalid bootstrap configuration")?;
    log::info!(
        "Validation layers: {}",
        if bootstrap.diagnostics_enabled { "enabled" } else { "disabled" }
    );

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, bootstrap);
    event_loop.run_app(&mut app)?;

    match app.failure.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Initialize logging; RUST_LOG overrides the configured level
fn init_logging(config: &Config) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(&config.debug.log_level);
    if let Ok(filter) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filter);
    }
    builder.init();
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The context holds a surface
/// bound to the window, so it must drop first.
struct App {
    context: Option<VulkanContext>,
    window: Option<Window>,
    config: Config,
    bootstrap: BootstrapConfig,
    /// Bootstrap error to report once the event loop has exited
    failure: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config, bootstrap: BootstrapConfig) -> Self {
        Self {
            context: None,
            window: None,
            config,
            bootstrap,
            failure: None,
        }
    }

    fn init_vulkan(&mut self, window: &Window) -> Result<()> {
        let context = VulkanContext::new(&self.bootstrap, &WindowSurface::new(window))
            .context("Failed to initialize Vulkan")?;

        if let Some(selected) = context.selected() {
            log::info!(
                "Using {} (graphics family {:?}, present family {:?})",
                selected.candidate.name,
                selected.indices.graphics_family,
                selected.indices.present_family
            );
        }

        self.context = Some(context);
        Ok(())
    }

    fn shutdown(&mut self, event_loop: &ActiveEventLoop) {
        if let Some(ref context) = self.context {
            if let Err(e) = context.wait_idle() {
                log::warn!("wait_idle failed during shutdown: {}", e);
            }
        }
        // Context before window
        self.context = None;
        self.window = None;
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    /// Called when the application is ready to create windows.
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        let window_attributes = WindowAttributes::default()
            .with_title(&self.config.window.title)
            .with_inner_size(winit::dpi::PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ))
            .with_resizable(self.config.window.resizable);

        let window = match event_loop.create_window(window_attributes) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to create window: {:?}", e);
                self.failure = Some(anyhow::anyhow!("Failed to create window: {e}"));
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.init_vulkan(&window) {
            log::error!("{:?}", e);
            self.failure = Some(e);
            event_loop.exit();
            return;
        }

        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _id: winit::window::WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                self.shutdown(event_loop);
            }

            WindowEvent::KeyboardInput { event, .. } => {
                use winit::keyboard::{KeyCode, PhysicalKey};

                if event.state.is_pressed()
                    && event.physical_key == PhysicalKey::Code(KeyCode::Escape)
                {
                    log::info!("ESC pressed, exiting...");
                    self.shutdown(event_loop);
                }
            }

            _ => {}
        }
    }
}
