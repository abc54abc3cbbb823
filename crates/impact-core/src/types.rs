//! Core types used throughout the impact crates

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position, rotation and scale of a rigid object
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Transform placed at a viewer position and oriented by yaw/pitch.
    ///
    /// Equivalent to `translate(position) * rotY(-yaw) * rotX(-pitch - PI/2) * scale`,
    /// which lays a tool modelled along +Y out along the view direction.
    pub fn from_view(position: Vec3, yaw: f32, pitch: f32, scale: f32) -> Self {
        let rotation = Quat::from_rotation_y(-yaw)
            * Quat::from_rotation_x(-pitch - std::f32::consts::FRAC_PI_2);
        Self {
            position,
            rotation,
            scale: Vec3::splat(scale),
        }
    }

    /// Compute the model matrix for this transform
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl From<Transform> for Mat4 {
    fn from(value: Transform) -> Self {
        value.matrix()
    }
}
