//! Pose sets and before/after interpolation
//!
//! A [`PoseSet`] is one 4x4 matrix per bone for a single instant. Each frame
//! produces three of them (before, after and blended) for the skinned body,
//! and three single-matrix sets for the rigid tool.

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::time::AnimationPhase;

/// Errors raised while blending pose sets
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PoseError {
    #[error("cannot blend pose sets of different sizes ({before} vs {after} bones)")]
    LengthMismatch { before: usize, after: usize },
}

/// How two matrices are blended
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendMode {
    /// Component-wise lerp of all 16 entries.
    ///
    /// Cheap, but large rotations between the endpoints shear and shrink the
    /// intermediate matrices.
    #[default]
    Matrix,
    /// Lerp scale and translation, slerp rotation.
    Decomposed,
}

/// Component-wise matrix lerp, exact at both endpoints.
pub fn lerp_matrix(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    // a*(1-t) + b*t rather than a + (b-a)*t so t = 1 reproduces b bit for bit
    let s = 1.0 - t;
    Mat4::from_cols(
        a.x_axis * s + b.x_axis * t,
        a.y_axis * s + b.y_axis * t,
        a.z_axis * s + b.z_axis * t,
        a.w_axis * s + b.w_axis * t,
    )
}

fn blend_decomposed(a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
    if t == 0.0 {
        return *a;
    }
    if t == 1.0 {
        return *b;
    }
    let (scale_a, rotation_a, translation_a) = a.to_scale_rotation_translation();
    let (scale_b, rotation_b, translation_b) = b.to_scale_rotation_translation();
    Mat4::from_scale_rotation_translation(
        scale_a.lerp(scale_b, t),
        rotation_a.slerp(rotation_b, t),
        translation_a.lerp(translation_b, t),
    )
}

impl BlendMode {
    /// Blend two matrices at parameter `t`
    pub fn blend(self, a: &Mat4, b: &Mat4, t: f32) -> Mat4 {
        match self {
            BlendMode::Matrix => lerp_matrix(a, b, t),
            BlendMode::Decomposed => blend_decomposed(a, b, t),
        }
    }
}

/// One matrix per bone, for a single point in time
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoseSet {
    matrices: Vec<Mat4>,
}

impl PoseSet {
    pub fn new(matrices: Vec<Mat4>) -> Self {
        Self { matrices }
    }

    /// A single-matrix set, used for rigid meshes
    pub fn rigid(matrix: Mat4) -> Self {
        Self {
            matrices: vec![matrix],
        }
    }

    /// `count` identity matrices
    pub fn identity(count: usize) -> Self {
        Self {
            matrices: vec![Mat4::IDENTITY; count],
        }
    }

    pub fn matrices(&self) -> &[Mat4] {
        &self.matrices
    }

    pub fn len(&self) -> usize {
        self.matrices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matrices.is_empty()
    }

    /// Blend every bone towards `after` at parameter `t`
    pub fn blend(&self, after: &PoseSet, t: f32, mode: BlendMode) -> Result<PoseSet, PoseError> {
        if self.len() != after.len() {
            return Err(PoseError::LengthMismatch {
                before: self.len(),
                after: after.len(),
            });
        }

        Ok(PoseSet {
            matrices: self
                .matrices
                .iter()
                .zip(&after.matrices)
                .map(|(before, after)| mode.blend(before, after, t))
                .collect(),
        })
    }
}

impl From<Vec<Mat4>> for PoseSet {
    fn from(matrices: Vec<Mat4>) -> Self {
        Self::new(matrices)
    }
}

/// The three pose sets needed for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct PoseTriple {
    pub before: PoseSet,
    pub after: PoseSet,
    pub blended: PoseSet,
}

/// Owns the per-frame interpolation state: captured tool poses, the looping
/// animation phase and the blend mode.
#[derive(Debug, Clone)]
pub struct PoseInterpolator {
    before_tool: Mat4,
    after_tool: Mat4,
    phase: AnimationPhase,
    blend_mode: BlendMode,
}

impl PoseInterpolator {
    pub fn new(before_tool: Mat4, after_tool: Mat4, phase: AnimationPhase, blend_mode: BlendMode) -> Self {
        Self {
            before_tool,
            after_tool,
            phase,
            blend_mode,
        }
    }

    /// Replace the tool pose the sweep starts from
    pub fn capture_before(&mut self, transform: Mat4) {
        self.before_tool = transform;
    }

    /// Replace the tool pose the sweep ends at
    pub fn capture_after(&mut self, transform: Mat4) {
        self.after_tool = transform;
    }

    pub fn before_tool(&self) -> Mat4 {
        self.before_tool
    }

    pub fn after_tool(&self) -> Mat4 {
        self.after_tool
    }

    pub fn blend_mode(&self) -> BlendMode {
        self.blend_mode
    }

    /// Current animation phase in `[0, 1)`
    pub fn phase(&self) -> f32 {
        self.phase.value()
    }

    /// Accumulate frame time into the looping phase
    pub fn advance(&mut self, delta: f32) {
        self.phase.advance(delta);
    }

    /// Blend parameter to display this frame.
    ///
    /// Motion never proceeds past the first contact: the phase is clamped to the
    /// detected contact time, and "no contact" permits the full sweep.
    pub fn display_t(&self, collision_t: Option<f32>) -> f32 {
        let limit = collision_t.map_or(1.0, |t| t.clamp(0.0, 1.0));
        self.phase.value().min(limit)
    }

    /// Before, after and blended bone sets at parameter `t`
    pub fn bone_poses(&self, before: PoseSet, after: PoseSet, t: f32) -> Result<PoseTriple, PoseError> {
        let blended = before.blend(&after, t, self.blend_mode)?;
        Ok(PoseTriple {
            before,
            after,
            blended,
        })
    }

    /// Before, after and blended tool transforms at parameter `t`
    pub fn tool_poses(&self, t: f32) -> PoseTriple {
        PoseTriple {
            before: PoseSet::rigid(self.before_tool),
            after: PoseSet::rigid(self.after_tool),
            blended: PoseSet::rigid(self.blend_mode.blend(&self.before_tool, &self.after_tool, t)),
        }
    }
}
