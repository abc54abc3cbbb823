use std::collections::HashMap;
use std::path::Path;

use glam::{Mat4, Quat, Vec3, Vec4};
use gltf::animation::util::ReadOutputs;
use gltf::animation::{Interpolation, Property};
use gltf::mesh::Mode;
use tracing::{debug, info, warn};

use crate::animation::{Animation, KeyFrame, DEFAULT_FRAME_RATE};
use crate::error::AssetError;
use crate::mesh::{MeshAsset, SkinWeights};
use crate::skeleton::{Bone, Skeleton};

/// Everything the demo needs from one glTF mesh.
#[derive(Debug, Clone)]
pub struct SceneAsset {
    pub mesh: MeshAsset,
    /// Present when a node instantiating the mesh carries a skin.
    pub skeleton: Option<Skeleton>,
    /// Animations of that skin, resampled at [`DEFAULT_FRAME_RATE`].
    pub animations: Vec<Animation>,
}

impl SceneAsset {
    pub fn animation(&self, index: usize) -> Option<&Animation> {
        self.animations.get(index)
    }
}

/// Load mesh `mesh_index` of a glTF 2.0 file (.gltf or .glb) with its skin and animations.
pub fn load_scene(path: &Path, mesh_index: usize) -> Result<SceneAsset, AssetError> {
    let (document, buffers, _images) = gltf::import(path)
        .map_err(|e| AssetError::GltfLoadFailed(path.to_path_buf(), e.to_string()))?;

    let mesh_count = document.meshes().count();
    let gltf_mesh = document
        .meshes()
        .nth(mesh_index)
        .ok_or_else(|| AssetError::MeshIndexOutOfRange {
            path: path.to_path_buf(),
            index: mesh_index,
            count: mesh_count,
        })?;

    let mut mesh = read_mesh(&gltf_mesh, &buffers)?;

    let skin = document
        .nodes()
        .filter(|node| node.mesh().is_some_and(|m| m.index() == mesh_index))
        .find_map(|node| node.skin());

    let (skeleton, animations) = match skin {
        Some(skin) => {
            let (skeleton, prefixes) = read_skeleton(&document, &skin, &buffers)?;
            let animations = document
                .animations()
                .map(|animation| {
                    sample_animation(&animation, &skin, &buffers, &prefixes, DEFAULT_FRAME_RATE)
                })
                .collect::<Result<Vec<_>, _>>()?;
            for animation in &animations {
                animation.validate_for(&skeleton)?;
            }
            (Some(skeleton), animations)
        }
        None => (None, Vec::new()),
    };

    if skeleton.is_none() && mesh.skin.take().is_some() {
        warn!("Mesh '{}' has skin attributes but no skinned node; treating as rigid", mesh.name);
    }

    mesh.validate()?;

    info!(
        "Loaded '{}' mesh {}: {} vertices, {} triangles, {} bones, {} animations",
        path.display(),
        mesh_index,
        mesh.vertex_count(),
        mesh.triangle_count(),
        skeleton.as_ref().map_or(0, Skeleton::bone_count),
        animations.len()
    );

    Ok(SceneAsset {
        mesh,
        skeleton,
        animations,
    })
}

/// Merge all triangle primitives of a mesh into one indexed buffer.
fn read_mesh(mesh: &gltf::Mesh, buffers: &[gltf::buffer::Data]) -> Result<MeshAsset, AssetError> {
    let name = mesh.name().unwrap_or("unnamed").to_string();

    let mut positions: Vec<Vec3> = Vec::new();
    let mut normals: Vec<Vec3> = Vec::new();
    let mut indices: Vec<u32> = Vec::new();
    let mut joints: Vec<[u32; 4]> = Vec::new();
    let mut weights: Vec<[f32; 4]> = Vec::new();
    let mut all_normals = true;
    let mut all_skinned = true;

    for primitive in mesh.primitives() {
        if primitive.mode() != Mode::Triangles {
            warn!("Skipping non-triangle primitive {} of '{}'", primitive.index(), name);
            continue;
        }

        let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));

        let Some(primitive_positions) = reader.read_positions() else {
            warn!("Skipping primitive {} of '{}' without positions", primitive.index(), name);
            continue;
        };

        let base = positions.len() as u32;
        positions.extend(primitive_positions.map(Vec3::from));
        let count = positions.len() - base as usize;

        match reader.read_normals() {
            Some(iter) => normals.extend(iter.map(Vec3::from)),
            None => all_normals = false,
        }

        match (reader.read_joints(0), reader.read_weights(0)) {
            (Some(j), Some(w)) => {
                joints.extend(j.into_u16().map(|q| q.map(u32::from)));
                weights.extend(w.into_f32());
            }
            _ => all_skinned = false,
        }

        match reader.read_indices() {
            Some(read) => indices.extend(read.into_u32().map(|i| i + base)),
            None => indices.extend(base..base + count as u32),
        }
    }

    if !all_normals {
        debug!("Mesh '{}' is missing normals; computing them", name);
        normals.clear();
    }

    let skin = if all_skinned && !joints.is_empty() {
        Some(SkinWeights { joints, weights })
    } else {
        if !joints.is_empty() {
            warn!("Mesh '{}' has partial skin data; ignoring joints and weights", name);
        }
        None
    };

    let mut asset = MeshAsset::new(name, positions, normals, indices);
    asset.skin = skin;
    Ok(asset)
}

/// Build the skeleton of a skin.
///
/// Also returns, per bone, the transform of non-joint nodes between the bone
/// and its nearest joint ancestor (or the scene root), which animated locals
/// must be prefixed with.
fn read_skeleton(
    document: &gltf::Document,
    skin: &gltf::Skin,
    buffers: &[gltf::buffer::Data],
) -> Result<(Skeleton, Vec<Mat4>), AssetError> {
    let joints: Vec<gltf::Node> = skin.joints().collect();
    let joint_map: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(bone, node)| (node.index(), bone))
        .collect();

    let mut node_parent: HashMap<usize, gltf::Node> = HashMap::new();
    for node in document.nodes() {
        for child in node.children() {
            node_parent.insert(child.index(), node.clone());
        }
    }

    let reader = skin.reader(|buffer| Some(&buffers[buffer.index()]));
    let inverse_binds: Vec<Mat4> = match reader.read_inverse_bind_matrices() {
        Some(iter) => iter.map(|m| Mat4::from_cols_array_2d(&m)).collect(),
        None => vec![Mat4::IDENTITY; joints.len()],
    };
    if inverse_binds.len() != joints.len() {
        return Err(AssetError::InvalidSkeleton(format!(
            "skin has {} joints but {} inverse bind matrices",
            joints.len(),
            inverse_binds.len()
        )));
    }

    let mut bones = Vec::with_capacity(joints.len());
    let mut prefixes = Vec::with_capacity(joints.len());

    for (joint, inverse_bind) in joints.iter().zip(inverse_binds) {
        let mut prefix = Mat4::IDENTITY;
        let mut parent = None;
        let mut current = node_parent.get(&joint.index());
        while let Some(node) = current {
            if let Some(&bone) = joint_map.get(&node.index()) {
                parent = Some(bone);
                break;
            }
            prefix = Mat4::from_cols_array_2d(&node.transform().matrix()) * prefix;
            current = node_parent.get(&node.index());
        }

        let local = Mat4::from_cols_array_2d(&joint.transform().matrix());
        let name = joint
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| format!("joint_{}", joint.index()));

        let mut bone = Bone::new(name, parent, prefix * local);
        bone.inverse_bind = inverse_bind;
        bones.push(bone);
        prefixes.push(prefix);
    }

    Ok((Skeleton::new(bones)?, prefixes))
}

#[derive(Clone, Copy)]
struct Trs {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

impl Trs {
    fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Sample every channel of an animation that targets a joint of `skin` at a fixed rate.
fn sample_animation(
    animation: &gltf::Animation,
    skin: &gltf::Skin,
    buffers: &[gltf::buffer::Data],
    prefixes: &[Mat4],
    frame_rate: f32,
) -> Result<Animation, AssetError> {
    let name = animation
        .name()
        .map(str::to_string)
        .unwrap_or_else(|| format!("animation_{}", animation.index()));

    let joints: Vec<gltf::Node> = skin.joints().collect();
    let joint_map: HashMap<usize, usize> = joints
        .iter()
        .enumerate()
        .map(|(bone, node)| (node.index(), bone))
        .collect();

    struct Track {
        bone: usize,
        property: Property,
        interpolation: Interpolation,
        times: Vec<f32>,
        values: Vec<[f32; 4]>,
    }

    let mut tracks = Vec::new();
    let mut duration = 0.0f32;

    for channel in animation.channels() {
        let target = channel.target();
        let Some(&bone) = joint_map.get(&target.node().index()) else {
            continue;
        };

        let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
        let times: Vec<f32> = match reader.read_inputs() {
            Some(iter) => iter.collect(),
            None => continue,
        };
        let values: Vec<[f32; 4]> = match reader.read_outputs() {
            Some(ReadOutputs::Translations(iter)) => iter.map(|[x, y, z]| [x, y, z, 0.0]).collect(),
            Some(ReadOutputs::Scales(iter)) => iter.map(|[x, y, z]| [x, y, z, 0.0]).collect(),
            Some(ReadOutputs::Rotations(rotations)) => rotations.into_f32().collect(),
            // Morph target weights do not affect the skeleton.
            _ => continue,
        };

        let interpolation = channel.sampler().interpolation();
        let expected = match interpolation {
            Interpolation::CubicSpline => times.len() * 3,
            _ => times.len(),
        };
        if times.is_empty() || values.len() != expected {
            return Err(AssetError::InvalidAnimation {
                name,
                reason: format!(
                    "channel on bone {bone} has {} key times and {} values",
                    times.len(),
                    values.len()
                ),
            });
        }

        duration = duration.max(times.last().copied().unwrap_or(0.0));
        tracks.push(Track {
            bone,
            property: target.property(),
            interpolation,
            times,
            values,
        });
    }

    let frame_count = (duration * frame_rate).round() as usize + 1;
    let rest: Vec<Trs> = joints
        .iter()
        .map(|joint| {
            let (translation, rotation, scale) = joint.transform().decomposed();
            Trs {
                translation: Vec3::from(translation),
                rotation: Quat::from_array(rotation),
                scale: Vec3::from(scale),
            }
        })
        .collect();
    let mut driven = vec![false; joints.len()];
    for track in &tracks {
        driven[track.bone] = true;
    }

    let key_frames = (0..frame_count)
        .map(|frame| {
            let time = frame as f32 / frame_rate;
            let mut pose = rest.clone();
            for track in &tracks {
                let rotation = matches!(track.property, Property::Rotation);
                let value = sample(&track.times, &track.values, time, track.interpolation, rotation);
                let trs = &mut pose[track.bone];
                match track.property {
                    Property::Translation => trs.translation = Vec3::new(value[0], value[1], value[2]),
                    Property::Scale => trs.scale = Vec3::new(value[0], value[1], value[2]),
                    Property::Rotation => trs.rotation = Quat::from_array(value).normalize(),
                    Property::MorphTargetWeights => {}
                }
            }

            let locals = pose
                .iter()
                .enumerate()
                .map(|(bone, trs)| driven[bone].then(|| prefixes[bone] * trs.matrix()))
                .collect();
            KeyFrame::new(locals)
        })
        .collect();

    let animation = Animation::new(name, frame_rate, key_frames);
    debug!(
        "Sampled animation '{}': {} channels, {} frames at {} fps ({:.2}s)",
        animation.name,
        tracks.len(),
        animation.frame_count(),
        frame_rate,
        animation.duration()
    );

    Ok(animation)
}

/// Sample a keyed track at `time`. Vector tracks are padded to 4 components
/// and lerped; rotation tracks are slerped.
fn sample(
    times: &[f32],
    values: &[[f32; 4]],
    time: f32,
    interpolation: Interpolation,
    rotation: bool,
) -> [f32; 4] {
    let value_at = |key: usize| match interpolation {
        // Cubic spline stores [in-tangent, value, out-tangent] per key.
        Interpolation::CubicSpline => values[key * 3 + 1],
        _ => values[key],
    };

    let last = times.len() - 1;
    if time <= times[0] {
        return value_at(0);
    }
    if time >= times[last] {
        return value_at(last);
    }

    let next = times.partition_point(|&t| t <= time);
    let prev = next - 1;
    let span = times[next] - times[prev];
    let factor = if span > 0.0 { (time - times[prev]) / span } else { 0.0 };

    let (a, b) = (value_at(prev), value_at(next));
    match interpolation {
        Interpolation::Step => a,
        _ if rotation => Quat::from_array(a)
            .normalize()
            .slerp(Quat::from_array(b).normalize(), factor)
            .to_array(),
        _ => Vec4::from_array(a).lerp(Vec4::from_array(b), factor).to_array(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    /// Two triangles in two primitives, skinned to a two-joint skin whose
    /// joints are each separated from their parent by a plain node.
    const SKINNED_GLTF: &str = r#"{
        "asset": { "version": "2.0" },
        "scene": 0,
        "scenes": [{ "nodes": [0, 4] }],
        "nodes": [
            { "name": "root", "translation": [0.0, 1.0, 0.0], "children": [1] },
            { "name": "hip", "translation": [1.0, 0.0, 0.0], "children": [2] },
            { "name": "offset", "translation": [0.0, 2.0, 0.0], "children": [3] },
            { "name": "knee", "translation": [0.0, 0.0, 3.0] },
            { "name": "body", "mesh": 0, "skin": 0 }
        ],
        "meshes": [{
            "name": "body",
            "primitives": [
                { "attributes": { "POSITION": 0, "JOINTS_0": 3, "WEIGHTS_0": 4 }, "indices": 2 },
                { "attributes": { "POSITION": 1, "JOINTS_0": 3, "WEIGHTS_0": 4 }, "indices": 2 }
            ]
        }],
        "skins": [{ "joints": [1, 3], "inverseBindMatrices": 5 }],
        "animations": [{
            "name": "extend",
            "samplers": [{ "input": 6, "output": 7, "interpolation": "LINEAR" }],
            "channels": [{ "sampler": 0, "target": { "node": 3, "path": "translation" } }]
        }],
        "buffers": [{ "uri": "body.bin", "byteLength": 312 }],
        "bufferViews": [
            { "buffer": 0, "byteOffset": 0, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 36, "byteLength": 36 },
            { "buffer": 0, "byteOffset": 72, "byteLength": 6 },
            { "buffer": 0, "byteOffset": 80, "byteLength": 24 },
            { "buffer": 0, "byteOffset": 104, "byteLength": 48 },
            { "buffer": 0, "byteOffset": 152, "byteLength": 128 },
            { "buffer": 0, "byteOffset": 280, "byteLength": 8 },
            { "buffer": 0, "byteOffset": 288, "byteLength": 24 }
        ],
        "accessors": [
            { "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 0.0], "max": [1.0, 1.0, 0.0] },
            { "bufferView": 1, "componentType": 5126, "count": 3, "type": "VEC3",
              "min": [0.0, 0.0, 1.0], "max": [1.0, 1.0, 1.0] },
            { "bufferView": 2, "componentType": 5123, "count": 3, "type": "SCALAR" },
            { "bufferView": 3, "componentType": 5123, "count": 3, "type": "VEC4" },
            { "bufferView": 4, "componentType": 5126, "count": 3, "type": "VEC4" },
            { "bufferView": 5, "componentType": 5126, "count": 2, "type": "MAT4" },
            { "bufferView": 6, "componentType": 5126, "count": 2, "type": "SCALAR",
              "min": [0.0], "max": [1.0] },
            { "bufferView": 7, "componentType": 5126, "count": 2, "type": "VEC3" }
        ]
    }"#;

    fn push_f32s(bytes: &mut Vec<u8>, values: &[f32]) {
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn push_u16s(bytes: &mut Vec<u8>, values: &[u16]) {
        for value in values {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
    }

    fn skinned_buffer() -> Vec<u8> {
        let mut bytes = Vec::new();
        push_f32s(&mut bytes, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
        push_f32s(&mut bytes, &[0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 0.0, 1.0, 1.0]);
        push_u16s(&mut bytes, &[0, 1, 2, 0]);
        for _ in 0..3 {
            push_u16s(&mut bytes, &[1, 0, 0, 0]);
        }
        for _ in 0..3 {
            push_f32s(&mut bytes, &[1.0, 0.0, 0.0, 0.0]);
        }
        push_f32s(&mut bytes, &Mat4::from_translation(Vec3::new(-1.0, -1.0, 0.0)).to_cols_array());
        push_f32s(&mut bytes, &Mat4::from_translation(Vec3::new(-1.0, -3.0, -3.0)).to_cols_array());
        push_f32s(&mut bytes, &[0.0, 1.0]);
        push_f32s(&mut bytes, &[0.0, 0.0, 3.0, 0.0, 0.0, 5.0]);
        assert_eq!(bytes.len(), 312);
        bytes
    }

    fn write_skinned_scene(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("impact-gltf-{}-{}", tag, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("body.bin"), skinned_buffer()).unwrap();
        let path = dir.join("body.gltf");
        std::fs::write(&path, SKINNED_GLTF).unwrap();
        path
    }

    #[test]
    fn test_load_skinned_scene() {
        let path = write_skinned_scene("load");
        let scene = load_scene(&path, 0).unwrap();

        // Primitives are merged and the second one's indices rebased.
        let mesh = &scene.mesh;
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.indices, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(mesh.positions[4], Vec3::new(1.0, 0.0, 1.0));

        // No normals in the file, so they are computed from the faces.
        assert_eq!(mesh.normals.len(), 6);
        for normal in &mesh.normals {
            assert!(normal.abs_diff_eq(Vec3::Z, 1e-6), "{normal:?}");
        }

        let skin = mesh.skin.as_ref().unwrap();
        assert_eq!(skin.joints, vec![[1, 0, 0, 0]; 6]);
        assert_eq!(skin.weights[5], [1.0, 0.0, 0.0, 0.0]);

        // Plain nodes between joints fold into the rest transforms.
        let skeleton = scene.skeleton.as_ref().unwrap();
        let bones = skeleton.bones();
        assert_eq!(bones.len(), 2);
        assert_eq!(bones[0].name, "hip");
        assert_eq!(bones[0].parent, None);
        assert!(bones[0].rest.abs_diff_eq(Mat4::from_translation(Vec3::new(1.0, 1.0, 0.0)), 1e-6));
        assert_eq!(bones[1].parent, Some(0));
        assert!(bones[1].rest.abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 2.0, 3.0)), 1e-6));
        assert!(bones[1]
            .inverse_bind
            .abs_diff_eq(Mat4::from_translation(Vec3::new(-1.0, -3.0, -3.0)), 1e-6));

        // One second of animation resampled at 30 fps.
        assert_eq!(scene.animations.len(), 1);
        let animation = scene.animation(0).unwrap();
        assert_eq!(animation.name, "extend");
        assert_eq!(animation.frame_count(), 31);
        assert!(animation.key_frames[0].locals[0].is_none());

        let knee_at = |frame: usize| animation.key_frames[frame].locals[1].unwrap();
        assert!(knee_at(0).abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 2.0, 3.0)), 1e-5));
        assert!(knee_at(15).abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 2.0, 4.0)), 1e-5));
        assert!(knee_at(30).abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, 2.0, 5.0)), 1e-5));

        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_mesh_index_out_of_range() {
        let path = write_skinned_scene("range");
        let result = load_scene(&path, 1);
        assert!(matches!(
            result,
            Err(AssetError::MeshIndexOutOfRange { index: 1, count: 1, .. })
        ));
        std::fs::remove_dir_all(path.parent().unwrap()).unwrap();
    }

    #[test]
    fn test_missing_file_fails_to_load() {
        let result = load_scene(Path::new("/nonexistent/humanoid.glb"), 0);
        assert!(matches!(result, Err(AssetError::GltfLoadFailed(path, _)) if path == PathBuf::from("/nonexistent/humanoid.glb")));
    }

    #[test]
    fn test_linear_vector_sampling() {
        let times = [0.0, 1.0];
        let values = [[0.0, 0.0, 0.0, 0.0], [2.0, 4.0, 6.0, 0.0]];
        let mid = sample(&times, &values, 0.5, Interpolation::Linear, false);
        assert_eq!(mid, [1.0, 2.0, 3.0, 0.0]);
        assert_eq!(sample(&times, &values, 5.0, Interpolation::Linear, false), values[1]);
        assert_eq!(sample(&times, &values, -1.0, Interpolation::Linear, false), values[0]);
    }

    #[test]
    fn test_step_sampling_holds_previous_key() {
        let times = [0.0, 1.0];
        let values = [[1.0, 0.0, 0.0, 0.0], [2.0, 0.0, 0.0, 0.0]];
        assert_eq!(sample(&times, &values, 0.9, Interpolation::Step, false), values[0]);
    }

    #[test]
    fn test_rotation_sampling_slerps() {
        let times = [0.0, 1.0];
        let a = Quat::IDENTITY.to_array();
        let b = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2).to_array();
        let mid = Quat::from_array(sample(&times, &[a, b], 0.5, Interpolation::Linear, true));
        let expected = Quat::from_rotation_y(std::f32::consts::FRAC_PI_4);
        assert!(mid.abs_diff_eq(expected, 1e-5), "{mid:?}");
    }

    #[test]
    fn test_cubic_spline_uses_key_values() {
        let times = [0.0, 1.0];
        let values = [
            [9.0, 9.0, 9.0, 0.0],
            [1.0, 1.0, 1.0, 0.0],
            [9.0, 9.0, 9.0, 0.0],
            [9.0, 9.0, 9.0, 0.0],
            [3.0, 3.0, 3.0, 0.0],
            [9.0, 9.0, 9.0, 0.0],
        ];
        assert_eq!(sample(&times, &values, 0.0, Interpolation::CubicSpline, false), values[1]);
        assert_eq!(sample(&times, &values, 0.5, Interpolation::CubicSpline, false), [2.0, 2.0, 2.0, 0.0]);
    }
}
