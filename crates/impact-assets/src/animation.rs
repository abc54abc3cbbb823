use glam::Mat4;

use crate::error::AssetError;
use crate::skeleton::Skeleton;

/// Frame rate animations are resampled at when loaded.
pub const DEFAULT_FRAME_RATE: f32 = 30.0;

/// Local bone transforms for one sampled frame.
///
/// `None` leaves the bone at its rest transform.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyFrame {
    pub locals: Vec<Option<Mat4>>,
}

impl KeyFrame {
    pub fn new(locals: Vec<Option<Mat4>>) -> Self {
        Self { locals }
    }
}

/// A skeletal animation sampled at a fixed frame rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub name: String,
    pub frames_per_second: f32,
    pub key_frames: Vec<KeyFrame>,
}

impl Animation {
    pub fn new(name: impl Into<String>, frames_per_second: f32, key_frames: Vec<KeyFrame>) -> Self {
        Self {
            name: name.into(),
            frames_per_second,
            key_frames,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.key_frames.len()
    }

    /// Index of the last key frame (0 for an empty animation).
    pub fn last_frame(&self) -> usize {
        self.frame_count().saturating_sub(1)
    }

    /// Length in seconds.
    pub fn duration(&self) -> f32 {
        if self.frames_per_second <= 0.0 {
            return 0.0;
        }
        self.last_frame() as f32 / self.frames_per_second
    }

    /// Local transform of every bone at `frame`, falling back to the rest
    /// pose for bones the frame does not drive. Frames past the end clamp to
    /// the last key frame.
    pub fn local_transforms(&self, frame: usize, skeleton: &Skeleton) -> Vec<Mat4> {
        let key_frame = self.key_frames.get(frame.min(self.last_frame()));

        skeleton
            .bones()
            .iter()
            .enumerate()
            .map(|(index, bone)| {
                key_frame
                    .and_then(|key| key.locals.get(index).copied().flatten())
                    .unwrap_or(bone.rest)
            })
            .collect()
    }

    /// Check that every key frame fits the skeleton.
    pub fn validate_for(&self, skeleton: &Skeleton) -> Result<(), AssetError> {
        if self.key_frames.is_empty() {
            return Err(AssetError::InvalidAnimation {
                name: self.name.clone(),
                reason: "no key frames".into(),
            });
        }

        if let Some((frame, key)) = self
            .key_frames
            .iter()
            .enumerate()
            .find(|(_, key)| key.locals.len() > skeleton.bone_count())
        {
            return Err(AssetError::InvalidAnimation {
                name: self.name.clone(),
                reason: format!(
                    "frame {frame} drives {} bones but the skeleton has {}",
                    key.locals.len(),
                    skeleton.bone_count()
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::skeleton::Bone;

    fn two_bones() -> Skeleton {
        Skeleton::from_rest_pose(vec![
            Bone::new("root", None, Mat4::IDENTITY),
            Bone::new("tip", Some(0), Mat4::from_translation(Vec3::Y)),
        ])
        .unwrap()
    }

    fn slide() -> Animation {
        let frames = (0..3)
            .map(|i| {
                KeyFrame::new(vec![Some(Mat4::from_translation(Vec3::new(i as f32, 0.0, 0.0)))])
            })
            .collect();
        Animation::new("slide", 30.0, frames)
    }

    #[test]
    fn test_undriven_bones_keep_rest_pose() {
        let skeleton = two_bones();
        let locals = slide().local_transforms(1, &skeleton);
        assert_eq!(locals[0], Mat4::from_translation(Vec3::X));
        assert_eq!(locals[1], Mat4::from_translation(Vec3::Y));
    }

    #[test]
    fn test_frames_past_the_end_clamp() {
        let skeleton = two_bones();
        let animation = slide();
        assert_eq!(
            animation.local_transforms(99, &skeleton),
            animation.local_transforms(2, &skeleton)
        );
    }

    #[test]
    fn test_duration_counts_intervals() {
        assert!((slide().duration() - 2.0 / 30.0).abs() < 1e-6);
        assert_eq!(Animation::new("empty", 30.0, Vec::new()).duration(), 0.0);
    }

    #[test]
    fn test_validate_rejects_oversized_frames() {
        let skeleton = two_bones();
        assert!(slide().validate_for(&skeleton).is_ok());

        let wide = Animation::new("wide", 30.0, vec![KeyFrame::new(vec![None; 3])]);
        assert!(wide.validate_for(&skeleton).is_err());

        let empty = Animation::new("empty", 30.0, Vec::new());
        assert!(empty.validate_for(&skeleton).is_err());
    }
}
