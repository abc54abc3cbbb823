//! Procedural test scenes
//!
//! Lets the demo and tests run without any asset files: a rigid box-shaped
//! tool and a skinned two-bone limb with a bend animation.

use std::f32::consts::FRAC_PI_2;

use glam::{Mat4, Vec3};

use crate::animation::{Animation, KeyFrame, DEFAULT_FRAME_RATE};
use crate::error::AssetError;
use crate::gltf_loader::SceneAsset;
use crate::mesh::{MeshAsset, SkinWeights};
use crate::skeleton::{Bone, Skeleton};

const LIMB_HALF_WIDTH: f32 = 0.15;
const LIMB_SEGMENT_LENGTH: f32 = 1.0;
const LIMB_RINGS_PER_SEGMENT: usize = 4;
const BEND_FRAMES: usize = 31;

/// Axis-aligned box between `min` and `max`, with flat per-face normals.
pub fn box_mesh(name: &str, min: Vec3, max: Vec3) -> MeshAsset {
    // (normal, four corners counter-clockwise seen from outside)
    let faces = [
        (Vec3::X, [[1, 0, 0], [1, 1, 0], [1, 1, 1], [1, 0, 1]]),
        (Vec3::NEG_X, [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]]),
        (Vec3::Y, [[0, 1, 0], [0, 1, 1], [1, 1, 1], [1, 1, 0]]),
        (Vec3::NEG_Y, [[0, 0, 0], [1, 0, 0], [1, 0, 1], [0, 0, 1]]),
        (Vec3::Z, [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]]),
        (Vec3::NEG_Z, [[0, 0, 0], [0, 1, 0], [1, 1, 0], [1, 0, 0]]),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, corners) in faces {
        let base = positions.len() as u32;
        for [x, y, z] in corners {
            positions.push(Vec3::new(
                if x == 0 { min.x } else { max.x },
                if y == 0 { min.y } else { max.y },
                if z == 0 { min.z } else { max.z },
            ));
            normals.push(normal);
        }
        indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshAsset::new(name, positions, normals, indices)
}

/// Rigid stick modelled along +Y, the way a held tool is laid out.
pub fn tool_scene() -> SceneAsset {
    SceneAsset {
        mesh: box_mesh("tool", Vec3::new(-0.1, 0.0, -0.1), Vec3::new(0.1, 2.0, 0.1)),
        skeleton: None,
        animations: Vec::new(),
    }
}

/// A square limb along +Y with an upper and a lower bone.
///
/// The single animation, `bend`, rotates the lower bone a quarter turn about
/// +Z over one second.
pub fn jointed_limb() -> Result<SceneAsset, AssetError> {
    let ring_count = LIMB_RINGS_PER_SEGMENT * 2 + 1;
    let ring_spacing = LIMB_SEGMENT_LENGTH / LIMB_RINGS_PER_SEGMENT as f32;
    let w = LIMB_HALF_WIDTH;
    let corners = [(-w, -w), (w, -w), (w, w), (-w, w)];

    let mut positions = Vec::with_capacity(ring_count * 4);
    let mut joints = Vec::with_capacity(ring_count * 4);
    let mut weights = Vec::with_capacity(ring_count * 4);

    for ring in 0..ring_count {
        let y = ring as f32 * ring_spacing;
        let influence = match ring.cmp(&LIMB_RINGS_PER_SEGMENT) {
            std::cmp::Ordering::Less => ([0, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]),
            std::cmp::Ordering::Equal => ([0, 1, 0, 0], [0.5, 0.5, 0.0, 0.0]),
            std::cmp::Ordering::Greater => ([1, 0, 0, 0], [1.0, 0.0, 0.0, 0.0]),
        };
        for (x, z) in corners {
            positions.push(Vec3::new(x, y, z));
            joints.push(influence.0);
            weights.push(influence.1);
        }
    }

    let mut indices = Vec::new();
    for ring in 0..ring_count as u32 - 1 {
        let lower = ring * 4;
        let upper = lower + 4;
        for side in 0..4 {
            let next = (side + 1) % 4;
            indices.extend([
                lower + side,
                upper + next,
                lower + next,
                lower + side,
                upper + side,
                upper + next,
            ]);
        }
    }
    let top = (ring_count as u32 - 1) * 4;
    indices.extend([0, 1, 2, 0, 2, 3]);
    indices.extend([top, top + 3, top + 2, top, top + 2, top + 1]);

    let mesh = MeshAsset::new("limb", positions, Vec::new(), indices)
        .with_skin(SkinWeights { joints, weights });

    let elbow = Mat4::from_translation(Vec3::new(0.0, LIMB_SEGMENT_LENGTH, 0.0));
    let skeleton = Skeleton::from_rest_pose(vec![
        Bone::new("upper", None, Mat4::IDENTITY),
        Bone::new("lower", Some(0), elbow),
    ])?;

    let key_frames = (0..BEND_FRAMES)
        .map(|frame| {
            let angle = FRAC_PI_2 * frame as f32 / (BEND_FRAMES - 1) as f32;
            KeyFrame::new(vec![None, Some(elbow * Mat4::from_rotation_z(angle))])
        })
        .collect();

    let scene = SceneAsset {
        mesh,
        skeleton: Some(skeleton),
        animations: vec![Animation::new("bend", DEFAULT_FRAME_RATE, key_frames)],
    };
    scene.mesh.validate()?;
    Ok(scene)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_is_closed_and_valid() {
        let mesh = box_mesh("box", Vec3::splat(-1.0), Vec3::splat(1.0));
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.triangle_count(), 12);

        // Every triangle winds outwards.
        for triangle in mesh.indices.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|i| mesh.positions[triangle[i] as usize]);
            let face = (b - a).cross(c - a);
            assert!(face.dot(mesh.normals[triangle[0] as usize]) > 0.0);
        }
    }

    #[test]
    fn test_limb_is_valid_and_skinned() {
        let scene = jointed_limb().unwrap();
        assert!(scene.mesh.validate().is_ok());
        assert!(scene.mesh.is_skinned());

        let skeleton = scene.skeleton.as_ref().unwrap();
        assert_eq!(skeleton.bone_count(), 2);
        let animation = scene.animation(0).unwrap();
        assert_eq!(animation.frame_count(), BEND_FRAMES);
        assert!(animation.validate_for(skeleton).is_ok());
    }

    #[test]
    fn test_bend_swings_the_tip() {
        let scene = jointed_limb().unwrap();
        let skeleton = scene.skeleton.as_ref().unwrap();
        let animation = scene.animation(0).unwrap();

        let first = skeleton.pose_matrices(animation, 0);
        let last = skeleton.pose_matrices(animation, animation.last_frame());
        let tip = Vec3::new(0.0, 2.0 * LIMB_SEGMENT_LENGTH, 0.0);

        assert!((first[1].transform_point3(tip) - tip).length() < 1e-5);
        let bent = last[1].transform_point3(tip);
        assert!((bent - Vec3::new(-1.0, 1.0, 0.0)).length() < 1e-5, "{bent}");
    }
}
