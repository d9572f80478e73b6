//! Viewer configuration

use std::path::{Path, PathBuf};

use mesh::{FramingConfig, DEFAULT_DIAMETER};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors reading an explicit configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Perspective camera settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraSettings {
    /// Vertical field of view (degrees)
    pub fov_degrees: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Camera distance before any mesh is installed
    pub initial_distance: f32,
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            near: 0.1,
            far: 1000.0,
            initial_distance: 5.0,
        }
    }
}

/// Orbit navigation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitSettings {
    /// Fraction of the pending motion applied per tick (0..=1)
    pub damping: f32,
    /// Degrees of rotation per dragged pixel
    pub rotate_speed: f32,
    /// Zoom sensitivity per scroll unit
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub pan_enabled: bool,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            damping: 0.05,
            rotate_speed: 0.5,
            zoom_speed: 0.01,
            min_distance: 1.0,
            max_distance: 100.0,
            pan_enabled: true,
        }
    }
}

/// Canonical viewing volume
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeSettings {
    /// Size of the largest axis after normalization
    pub diameter: f32,
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            diameter: DEFAULT_DIAMETER,
        }
    }
}

/// Colors, material and lights
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppearanceSettings {
    /// Background color RGB
    pub background_color: [u8; 3],
    /// Mesh diffuse color RGB
    pub mesh_color: [u8; 3],
    /// Specular highlight color RGB
    pub specular_color: [u8; 3],
    pub shininess: f32,
    /// Ambient light color RGB
    pub ambient_color: [u8; 3],
    /// Directional light color RGB
    pub light_color: [u8; 3],
    pub light_intensity: f32,
    /// Position the directional light shines from
    pub light_direction: [f32; 3],
}

impl Default for AppearanceSettings {
    fn default() -> Self {
        Self {
            background_color: [0xf8, 0xfa, 0xfc],
            mesh_color: [0x0e, 0xa5, 0xe9],
            specular_color: [0x11, 0x11, 0x11],
            shininess: 200.0,
            ambient_color: [0x40, 0x40, 0x40],
            light_color: [0xff, 0xff, 0xff],
            light_intensity: 0.5,
            light_direction: [1.0, 1.0, 1.0],
        }
    }
}

/// Idle spin of the displayed mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoRotateSettings {
    pub enabled: bool,
    /// Radians added to the X and Y rotation every render tick
    pub speed: f32,
}

impl Default for AutoRotateSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 0.005,
        }
    }
}

/// Where relative mesh references resolve to
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    /// Base URL prepended to references that are not absolute URLs
    pub base_url: Option<String>,
}

/// All viewer settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub camera: CameraSettings,
    pub orbit: OrbitSettings,
    pub normalize: NormalizeSettings,
    pub framing: FramingConfig,
    pub appearance: AppearanceSettings,
    pub auto_rotate: AutoRotateSettings,
    pub source: SourceSettings,
}

impl ViewerConfig {
    /// Load `config.json` from the platform config dir, or defaults when it
    /// is missing or unreadable.
    pub fn load() -> Self {
        if let Some(path) = Self::default_path() {
            if path.exists() {
                match Self::load_from(&path) {
                    Ok(config) => return config,
                    Err(e) => tracing::warn!("Ignoring config: {e}"),
                }
            }
        }
        Self::default()
    }

    /// Load an explicit config file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "stl-viewer", "stl-viewer")
            .map(|dirs| dirs.config_dir().join("config.json"))
    }
}

/// 8-bit RGB to float RGB in 0..=1
pub fn rgb(c: [u8; 3]) -> [f32; 3] {
    [
        c[0] as f32 / 255.0,
        c[1] as f32 / 255.0,
        c[2] as f32 / 255.0,
    ]
}
