//! Per-vertex skinning data and GPU buffer layouts

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Up to four bones influencing one vertex, with their weights.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct BoneInfluence {
    pub joints: [u32; 4],
    pub weights: [f32; 4],
}

impl BoneInfluence {
    pub fn new(joints: [u32; 4], weights: [f32; 4]) -> Self {
        Self { joints, weights }
    }

    /// Fully bound to a single bone
    pub fn single(bone: u32) -> Self {
        Self {
            joints: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }

    /// `(bone, weight)` pairs with a nonzero weight
    pub fn active(&self) -> impl Iterator<Item = (u32, f32)> + '_ {
        self.joints
            .iter()
            .zip(self.weights.iter())
            .filter(|(_, &weight)| weight != 0.0)
            .map(|(&joint, &weight)| (joint, weight))
    }
}

/// Pad a 3-vector to a std430 `vec4`.
pub fn pad(v: Vec3, w: f32) -> [f32; 4] {
    v.extend(w).to_array()
}

/// Column-major matrix as uploaded to the bone buffer.
pub fn matrix_columns(m: &Mat4) -> [[f32; 4]; 4] {
    m.to_cols_array_2d()
}
