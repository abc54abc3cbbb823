//! Bone hierarchy and pose evaluation

use glam::Mat4;
use tracing::debug;

use crate::animation::Animation;
use crate::error::AssetError;

/// A single bone in the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct Bone {
    pub name: String,
    /// Index of the parent bone, `None` for roots.
    pub parent: Option<usize>,
    /// Rest (bind) transform relative to the parent.
    pub rest: Mat4,
    /// Maps model space into this bone's space at bind time.
    pub inverse_bind: Mat4,
}

impl Bone {
    pub fn new(name: impl Into<String>, parent: Option<usize>, rest: Mat4) -> Self {
        Self {
            name: name.into(),
            parent,
            rest,
            inverse_bind: Mat4::IDENTITY,
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    Pending,
    InChain,
    Done,
}

/// Bone hierarchy (a forest; roots have no parent).
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    bones: Vec<Bone>,
    /// Bone indices ordered so every parent precedes its children.
    order: Vec<usize>,
}

impl Skeleton {
    /// Build a skeleton, validating the parent relation.
    pub fn new(bones: Vec<Bone>) -> Result<Self, AssetError> {
        for (index, bone) in bones.iter().enumerate() {
            match bone.parent {
                Some(parent) if parent >= bones.len() => {
                    return Err(AssetError::InvalidSkeleton(format!(
                        "bone '{}' ({index}) has parent {parent} but only {} bones exist",
                        bone.name,
                        bones.len()
                    )));
                }
                Some(parent) if parent == index => {
                    return Err(AssetError::InvalidSkeleton(format!(
                        "bone '{}' ({index}) is its own parent",
                        bone.name
                    )));
                }
                _ => {}
            }
        }

        let order = evaluation_order(&bones)?;
        debug!("Skeleton with {} bones", bones.len());
        Ok(Self { bones, order })
    }

    /// Build a skeleton whose inverse bind matrices are derived from the rest pose,
    /// so the rest pose yields identity skinning matrices.
    pub fn from_rest_pose(bones: Vec<Bone>) -> Result<Self, AssetError> {
        let mut skeleton = Self::new(bones)?;
        let globals = skeleton.model_transforms(&skeleton.rest_locals());
        for (bone, global) in skeleton.bones.iter_mut().zip(globals) {
            bone.inverse_bind = global.inverse();
        }
        Ok(skeleton)
    }

    pub fn bones(&self) -> &[Bone] {
        &self.bones
    }

    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }


    /// Rest transforms of every bone, relative to their parents.
    pub fn rest_locals(&self) -> Vec<Mat4> {
        self.bones.iter().map(|bone| bone.rest).collect()
    }

    /// Concatenate local transforms down the hierarchy into model space.
    /// Bones missing from `locals` use their rest transform.
    pub fn model_transforms(&self, locals: &[Mat4]) -> Vec<Mat4> {
        let mut globals = vec![Mat4::IDENTITY; self.bones.len()];
        for &index in &self.order {
            let bone = &self.bones[index];
            let local = locals.get(index).copied().unwrap_or(bone.rest);
            globals[index] = match bone.parent {
                Some(parent) => globals[parent] * local,
                None => local,
            };
        }
        globals
    }

    /// Skinning matrices for the given local transforms (model transform x inverse bind).
    pub fn skinning_matrices(&self, locals: &[Mat4]) -> Vec<Mat4> {
        self.model_transforms(locals)
            .into_iter()
            .zip(&self.bones)
            .map(|(global, bone)| global * bone.inverse_bind)
            .collect()
    }

    /// Skinning matrices of the rest pose.
    pub fn bind_pose_matrices(&self) -> Vec<Mat4> {
        self.skinning_matrices(&self.rest_locals())
    }

    /// Skinning matrices for one frame of an animation.
    /// Frames past the end clamp to the last key frame.
    pub fn pose_matrices(&self, animation: &Animation, frame: usize) -> Vec<Mat4> {
        self.skinning_matrices(&animation.local_transforms(frame, self))
    }

    /// Model-space bone transforms for one frame, e.g. for joint markers.
    pub fn joint_transforms(&self, animation: &Animation, frame: usize) -> Vec<Mat4> {
        self.model_transforms(&animation.local_transforms(frame, self))
    }
}

fn evaluation_order(bones: &[Bone]) -> Result<Vec<usize>, AssetError> {
    let mut order = Vec::with_capacity(bones.len());
    let mut state = vec![Visit::Pending; bones.len()];
    let mut chain = Vec::new();

    for start in 0..bones.len() {
        chain.clear();
        let mut current = Some(start);

        // Walk towards the root until reaching an already ordered bone.
        while let Some(index) = current {
            match state[index] {
                Visit::Done => break,
                Visit::InChain => {
                    return Err(AssetError::InvalidSkeleton(format!(
                        "bone '{}' ({index}) is part of a parent cycle",
                        bones[index].name
                    )));
                }
                Visit::Pending => {
                    state[index] = Visit::InChain;
                    chain.push(index);
                    current = bones[index].parent;
                }
            }
        }

        for &index in chain.iter().rev() {
            state[index] = Visit::Done;
            order.push(index);
        }
    }

    Ok(order)
}
