// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// This module handles loading and parsing configuration from config.toml.
// Provides sensible defaults if config file is missing or has errors.
// `BootstrapConfig` is the resolved, read-only view the backend consumes.

use crate::backend::capability::VALIDATION_LAYER;
use crate::backend::error::{BootstrapError, BootstrapResult};
use crate::backend::selector::SelectionPolicy;
use anyhow::{Context, Result};
use ash::vk;
use serde::Deserialize;
use std::ffi::CString;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub application: ApplicationConfig,
    pub debug: DebugConfig,
    pub device: DeviceConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: false,
        }
    }
}

/// Identity reported to the driver
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub engine_name: String,
    pub version: [u32; 3],
    pub engine_version: [u32; 3],
    /// Target API version as [major, minor]
    pub api_version: [u32; 2],
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Hello Triangle".to_string(),
            engine_name: "No Engine".to_string(),
            version: [1, 0, 0],
            engine_version: [1, 0, 0],
            api_version: [1, 0],
        }
    }
}

/// Debug settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub validation_layers: bool,
    pub layers: Vec<String>,
    pub log_level: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            layers: vec![VALIDATION_LAYER.to_string_lossy().into_owned()],
            log_level: "info".to_string(),
        }
    }
}

/// Physical device selection
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    pub selection: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            selection: "first_suitable".to_string(),
        }
    }
}

impl Config {
    /// Load config.toml, falling back to defaults. Runs before logging is
    /// up, so any load error is handed back for the caller to report.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default("config.toml")
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path; a missing file yields defaults
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Get selection policy as backend enum
    pub fn selection_policy(&self) -> SelectionPolicy {
        match self.device.selection.to_lowercase().as_str() {
            "first_suitable" => SelectionPolicy::FirstSuitable,
            "prefer_discrete" => SelectionPolicy::PreferDiscrete,
            _ => {
                log::warn!(
                    "Unknown selection policy '{}', defaulting to first_suitable",
                    self.device.selection
                );
                SelectionPolicy::FirstSuitable
            }
        }
    }

    /// Resolve into the backend's view. Validation is only ever enabled in
    /// debug builds.
    pub fn bootstrap(&self) -> BootstrapResult<BootstrapConfig> {
        let app = &self.application;
        let [major, minor] = app.api_version;

        Ok(BootstrapConfig {
            diagnostics_enabled: cfg!(debug_assertions) && self.debug.validation_layers,
            layers: self
                .debug
                .layers
                .iter()
                .map(|name| c_name(name))
                .collect::<BootstrapResult<_>>()?,
            application: ApplicationInfo {
                name: c_name(&app.name)?,
                engine_name: c_name(&app.engine_name)?,
                version: make_version(app.version),
                engine_version: make_version(app.engine_version),
                api_version: vk::make_api_version(0, major, minor, 0),
            },
            selection: self.selection_policy(),
        })
    }
}

fn c_name(name: &str) -> BootstrapResult<CString> {
    CString::new(name).map_err(|_| BootstrapError::InvalidName(name.to_string()))
}

fn make_version([major, minor, patch]: [u32; 3]) -> u32 {
    vk::make_api_version(0, major, minor, patch)
}

/// Resolved application identity
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationInfo {
    pub name: CString,
    pub engine_name: CString,
    pub version: u32,
    pub engine_version: u32,
    pub api_version: u32,
}

/// Read-only settings for one bootstrap run
#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapConfig {
    pub diagnostics_enabled: bool,
    /// Layers for instance and device creation when diagnostics are on
    pub layers: Vec<CString>,
    pub application: ApplicationInfo,
    pub selection: SelectionPolicy,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            diagnostics_enabled: cfg!(debug_assertions),
            layers: vec![CString::from(VALIDATION_LAYER)],
            application: ApplicationInfo {
                name: CString::from(c"Hello Triangle"),
                engine_name: CString::from(c"No Engine"),
                version: vk::make_api_version(0, 1, 0, 0),
                engine_version: vk::make_api_version(0, 1, 0, 0),
                api_version: vk::API_VERSION_1_0,
            },
            selection: SelectionPolicy::FirstSuitable,
        }
    }
}
