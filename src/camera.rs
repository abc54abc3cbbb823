//! Fly camera with mouse look
//!
//! Yaw turns about +Y and pitch tilts down for positive values; with both at
//! zero the camera looks along -Z. The tool capture uses the same convention,
//! so a captured tool points where the camera looks.

use glam::{Mat4, Quat, Vec3};
use impact_core::Transform;
use serde::{Deserialize, Serialize};

use crate::input::{DemoAction, InputState};

/// Camera configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Where the camera starts
    pub start_position: Vec3,
    /// Movement speed in units per second
    pub move_speed: f32,
    /// Movement speed while the slow modifier is held
    pub slow_speed: f32,
    /// Mouse sensitivity (radians per pixel)
    pub sensitivity: f32,
    /// Pitch limit in degrees, applied symmetrically
    pub pitch_limit: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            start_position: Vec3::new(0.0, 0.0, 5.0),
            move_speed: 2.0,
            slow_speed: 0.5,
            sensitivity: 0.003,
            pitch_limit: 90.0,
        }
    }
}

/// Free-flying camera
#[derive(Debug, Clone)]
pub struct FlyCamera {
    pub config: CameraConfig,
    position: Vec3,
    /// Yaw rotation in radians (horizontal)
    pub yaw: f32,
    /// Pitch rotation in radians, positive looks down
    pub pitch: f32,
}

impl Default for FlyCamera {
    fn default() -> Self {
        Self::new(CameraConfig::default())
    }
}

impl FlyCamera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            position: config.start_position,
            config,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    fn rotation(&self) -> Quat {
        Quat::from_rotation_y(-self.yaw) * Quat::from_rotation_x(-self.pitch)
    }

    /// View direction
    pub fn forward(&self) -> Vec3 {
        self.rotation() * Vec3::NEG_Z
    }

    /// Horizontal right direction
    pub fn right(&self) -> Vec3 {
        Vec3::new(self.yaw.cos(), 0.0, self.yaw.sin())
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        let limit = self.config.pitch_limit.to_radians();
        self.pitch = pitch.clamp(-limit, limit);
    }

    /// Tool transform for a pose captured from the current view
    pub fn tool_transform(&self, scale: f32) -> Mat4 {
        Transform::from_view(self.position, self.yaw, self.pitch, scale).matrix()
    }

    /// Apply mouse look and movement for one frame
    pub fn update(&mut self, input: &InputState, dt: f32) {
        if input.cursor_captured {
            self.yaw += input.mouse_delta.x * self.config.sensitivity;
            self.set_pitch(self.pitch + input.mouse_delta.y * self.config.sensitivity);
        }

        let speed = if input.is_held(DemoAction::Slow) {
            self.config.slow_speed
        } else {
            self.config.move_speed
        };

        let forward = Vec3::new(self.yaw.sin(), 0.0, -self.yaw.cos());
        let right = self.right();
        let mut direction = Vec3::ZERO;
        if input.is_held(DemoAction::MoveForward) {
            direction += forward;
        }
        if input.is_held(DemoAction::MoveBackward) {
            direction -= forward;
        }
        if input.is_held(DemoAction::MoveRight) {
            direction += right;
        }
        if input.is_held(DemoAction::MoveLeft) {
            direction -= right;
        }
        if input.is_held(DemoAction::Ascend) {
            direction += Vec3::Y;
        }
        if input.is_held(DemoAction::Descend) {
            direction -= Vec3::Y;
        }

        self.position += direction * speed * dt;
    }
}
