//! The skinning contract shared by every dispatcher
//!
//! A dispatcher takes the static per-mesh [`SkinningInput`] plus one pose
//! (a matrix per bone) and returns the deformed buffers. `dispatch` only
//! returns once the computation has fully completed, so callers may read the
//! result immediately, e.g. feed it to collision detection.

use std::sync::atomic::{AtomicU64, Ordering};

use glam::{Mat4, Vec3};

use impact_assets::MeshAsset;

use crate::error::SkinningError;
use crate::vertex::BoneInfluence;

static NEXT_INPUT_ID: AtomicU64 = AtomicU64::new(0);

/// Static skinning data of one mesh, loaded once.
///
/// The data is immutable after construction, so a dispatcher may keep its own
/// copy keyed by [`SkinningInput::id`].
#[derive(Debug, Clone)]
pub struct SkinningInput {
    id: u64,
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    influences: Vec<BoneInfluence>,
}

impl PartialEq for SkinningInput {
    fn eq(&self, other: &Self) -> bool {
        self.positions == other.positions
            && self.normals == other.normals
            && self.influences == other.influences
    }
}

impl SkinningInput {
    pub fn new(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        influences: Vec<BoneInfluence>,
    ) -> Result<Self, SkinningError> {
        if normals.len() != positions.len() || influences.len() != positions.len() {
            return Err(SkinningError::BufferLengthMismatch {
                positions: positions.len(),
                normals: normals.len(),
                influences: influences.len(),
            });
        }
        Ok(Self {
            id: NEXT_INPUT_ID.fetch_add(1, Ordering::Relaxed),
            positions,
            normals,
            influences,
        })
    }

    /// Every vertex bound to bone 0 with weight 1, for rigid meshes driven by
    /// a single transform.
    pub fn rigid(positions: Vec<Vec3>, normals: Vec<Vec3>) -> Result<Self, SkinningError> {
        let influences = vec![BoneInfluence::single(0); positions.len()];
        Self::new(positions, normals, influences)
    }

    /// Skinning input for a loaded mesh; meshes without skin data are rigid.
    pub fn from_mesh(mesh: &MeshAsset) -> Result<Self, SkinningError> {
        match &mesh.skin {
            Some(skin) => {
                let influences = skin
                    .joints
                    .iter()
                    .zip(&skin.weights)
                    .map(|(&joints, &weights)| BoneInfluence::new(joints, weights))
                    .collect::<Vec<_>>();
                if influences.len() != mesh.positions.len() {
                    return Err(SkinningError::BufferLengthMismatch {
                        positions: mesh.positions.len(),
                        normals: mesh.normals.len(),
                        influences: skin.joints.len().min(skin.weights.len()),
                    });
                }
                Self::new(mesh.positions.clone(), mesh.normals.clone(), influences)
            }
            None => Self::rigid(mesh.positions.clone(), mesh.normals.clone()),
        }
    }

    /// Identity of this input; clones share it.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    pub fn influences(&self) -> &[BoneInfluence] {
        &self.influences
    }

    /// Fail if any weighted influence names a bone the pose does not have.
    pub fn check_pose(&self, bone_count: usize) -> Result<(), SkinningError> {
        for (vertex, influence) in self.influences.iter().enumerate() {
            if let Some((bone, _)) = influence.active().find(|&(bone, _)| bone as usize >= bone_count) {
                return Err(SkinningError::BoneOutOfRange {
                    vertex,
                    bone,
                    bone_count,
                });
            }
        }
        Ok(())
    }
}

/// Deformed vertex buffers produced by one dispatch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinnedBuffers {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
}

impl SkinnedBuffers {
    /// Unpack buffers read back as flat `vec4` arrays, dropping each w.
    pub fn from_padded(positions: &[f32], normals: &[f32]) -> Result<Self, SkinningError> {
        Ok(Self {
            positions: strip_w(positions)?,
            normals: strip_w(normals)?,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }
}

fn strip_w(padded: &[f32]) -> Result<Vec<Vec3>, SkinningError> {
    if padded.len() % 4 != 0 {
        return Err(SkinningError::PaddedBufferLength(padded.len()));
    }
    Ok(padded
        .chunks_exact(4)
        .map(|v| Vec3::new(v[0], v[1], v[2]))
        .collect())
}

/// Runs linear blend skinning for one pose.
pub trait SkinningDispatcher {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Skin `input` with one matrix per bone.
    ///
    /// Vertex `v` ends up at `sum_b weight[v][b] * (pose[joint[v][b]] * position[v])`.
    /// Weights are used as given, without renormalisation. Blocks until the
    /// result is complete.
    fn dispatch(&mut self, input: &SkinningInput, pose: &[Mat4]) -> Result<SkinnedBuffers, SkinningError>;
}

#[cfg(test)]
mod tests {
    use impact_assets::procedural;

    use super::*;

    #[test]
    fn test_mismatched_buffers_are_rejected() {
        let result = SkinningInput::new(vec![Vec3::ZERO; 3], vec![Vec3::Z; 2], vec![BoneInfluence::single(0); 3]);
        assert_eq!(
            result,
            Err(SkinningError::BufferLengthMismatch {
                positions: 3,
                normals: 2,
                influences: 3
            })
        );
    }

    #[test]
    fn test_input_ids() {
        let a = SkinningInput::rigid(vec![Vec3::ZERO], vec![Vec3::Z]).unwrap();
        let b = SkinningInput::rigid(vec![Vec3::ZERO], vec![Vec3::Z]).unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_check_pose_ignores_zero_weights() {
        let input = SkinningInput::new(
            vec![Vec3::ZERO; 2],
            vec![Vec3::Z; 2],
            vec![
                BoneInfluence::new([0, 9, 0, 0], [1.0, 0.0, 0.0, 0.0]),
                BoneInfluence::new([1, 2, 0, 0], [0.5, 0.5, 0.0, 0.0]),
            ],
        )
        .unwrap();

        assert!(input.check_pose(3).is_ok());
        assert_eq!(
            input.check_pose(2),
            Err(SkinningError::BoneOutOfRange {
                vertex: 1,
                bone: 2,
                bone_count: 2
            })
        );
    }

    #[test]
    fn test_from_mesh_uses_skin_or_rigid() {
        let limb = procedural::jointed_limb().unwrap();
        let input = SkinningInput::from_mesh(&limb.mesh).unwrap();
        assert_eq!(input.vertex_count(), limb.mesh.vertex_count());
        assert!(input.influences().iter().any(|i| i.joints[0] == 1));

        let tool = procedural::tool_scene();
        let rigid = SkinningInput::from_mesh(&tool.mesh).unwrap();
        assert!(rigid.influences().iter().all(|i| *i == BoneInfluence::single(0)));
    }

    #[test]
    fn test_from_padded_strips_w() {
        let buffers = SkinnedBuffers::from_padded(
            &[1.0, 2.0, 3.0, 1.0, 4.0, 5.0, 6.0, 1.0],
            &[0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        )
        .unwrap();
        assert_eq!(buffers.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(4.0, 5.0, 6.0)]);
        assert_eq!(buffers.normals, vec![Vec3::Z, Vec3::X]);

        assert_eq!(
            SkinnedBuffers::from_padded(&[0.0; 6], &[]),
            Err(SkinningError::PaddedBufferLength(6))
        );
    }
}
