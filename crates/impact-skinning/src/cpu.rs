use glam::{Mat4, Vec3};
use tracing::trace;

use crate::dispatch::{SkinnedBuffers, SkinningDispatcher, SkinningInput};
use crate::error::SkinningError;

/// Single-threaded reference dispatcher.
#[derive(Debug, Clone, Default)]
pub struct CpuSkinner;

impl CpuSkinner {
    pub fn new() -> Self {
        Self
    }
}

impl SkinningDispatcher for CpuSkinner {
    fn name(&self) -> &str {
        "cpu"
    }

    fn dispatch(&mut self, input: &SkinningInput, pose: &[Mat4]) -> Result<SkinnedBuffers, SkinningError> {
        input.check_pose(pose.len())?;

        let mut positions = Vec::with_capacity(input.vertex_count());
        let mut normals = Vec::with_capacity(input.vertex_count());

        for ((position, normal), influence) in input
            .positions()
            .iter()
            .zip(input.normals())
            .zip(input.influences())
        {
            let mut skinned_position = Vec3::ZERO;
            let mut skinned_normal = Vec3::ZERO;
            for (bone, weight) in influence.active() {
                let matrix = &pose[bone as usize];
                skinned_position += weight * matrix.transform_point3(*position);
                skinned_normal += weight * matrix.transform_vector3(*normal);
            }
            positions.push(skinned_position);
            normals.push(skinned_normal.normalize_or_zero());
        }

        trace!("Skinned {} vertices against {} bones", positions.len(), pose.len());
        Ok(SkinnedBuffers { positions, normals })
    }
}
