//! Demo settings
//!
//! Read from the path given as the first command-line argument, otherwise from
//! `~/.config/impact/settings.toml`. Every section is optional.

use std::fs;
use std::path::{Path, PathBuf};

use glam::Vec3;
use impact_collision::CcdConfig;
use impact_core::BlendMode;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::camera::CameraConfig;

/// All demo settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoSettings {
    pub scene: SceneSettings,
    pub collision: CcdConfig,
    pub motion: MotionSettings,
    pub camera: CameraConfig,
    pub window: WindowSettings,
    pub run: RunSettings,
}

impl DemoSettings {
    /// Default settings file location
    fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("impact").join("settings.toml"))
    }

    /// Load settings from `path`, or the default location when `None`.
    ///
    /// A missing or unreadable file falls back to defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    warn!("Could not determine config directory");
                    return Self::default();
                }
            },
        };

        if !path.exists() {
            info!("No settings file at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match Self::parse(&content) {
                Ok(settings) => {
                    info!("Loaded settings from {:?}", path);
                    settings
                }
                Err(e) => {
                    warn!("Failed to parse settings: {}, using defaults", e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read settings file: {}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

/// Which meshes to load; a missing path selects the built-in procedural mesh
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneSettings {
    /// Directory relative paths are resolved against
    pub asset_root: PathBuf,
    /// Skinned body scene file
    pub humanoid: Option<PathBuf>,
    pub humanoid_mesh: usize,
    /// Animation sampled for the before (first frame) and after (last frame) poses
    pub animation: usize,
    /// Rigid tool scene file
    pub tool: Option<PathBuf>,
    pub tool_mesh: usize,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            asset_root: PathBuf::from("assets"),
            humanoid: None,
            humanoid_mesh: 0,
            animation: 0,
            tool: None,
            tool_mesh: 0,
        }
    }
}

/// A tool pose given as a viewpoint, the way a capture would record it
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToolPose {
    pub position: Vec3,
    /// Radians
    #[serde(default)]
    pub yaw: f32,
    /// Radians, positive looks down
    #[serde(default)]
    pub pitch: f32,
}

/// Pose interpolation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionSettings {
    /// Length of one before-to-after sweep in seconds
    pub cycle_seconds: f32,
    pub blend_mode: BlendMode,
    /// Uniform scale applied to the tool
    pub tool_scale: f32,
    /// Initial start pose of the tool (default: the camera's start view)
    pub tool_before: Option<ToolPose>,
    /// Initial end pose of the tool (default: the camera's start view)
    pub tool_after: Option<ToolPose>,
}

impl Default for MotionSettings {
    fn default() -> Self {
        Self {
            cycle_seconds: 1.0,
            blend_mode: BlendMode::Matrix,
            tool_scale: 0.3,
            tool_before: None,
            tool_after: None,
        }
    }
}

/// Window settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "impact".to_string(),
        }
    }
}

/// How the demo loop is driven
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSettings {
    /// Run this many frames without a window, then exit
    pub headless_frames: Option<u64>,
    /// Frame delta used in headless mode, in seconds
    pub fixed_delta: f32,
    /// Longest frame delta fed to the simulation, in seconds
    pub max_delta_time: f32,
    /// Simulated seconds per real second
    pub time_scale: f32,
    /// Prefer the compute-shader skinner when it is available
    pub prefer_gpu: bool,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            headless_frames: None,
            fixed_delta: 1.0 / 60.0,
            max_delta_time: 0.25,
            time_scale: 1.0,
            prefer_gpu: true,
        }
    }
}
