use glam::Vec3;

use crate::error::AssetError;

/// Per-vertex bone influences, aligned by vertex index with the mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SkinWeights {
    /// Up to four influencing bone indices per vertex
    pub joints: Vec<[u32; 4]>,
    /// Matching weights; expected to sum to at most 1
    pub weights: Vec<[f32; 4]>,
}

impl SkinWeights {
    /// Bind every one of `vertex_count` vertices fully to `bone`
    pub fn single_bone(vertex_count: usize, bone: u32) -> Self {
        Self {
            joints: vec![[bone, 0, 0, 0]; vertex_count],
            weights: vec![[1.0, 0.0, 0.0, 0.0]; vertex_count],
        }
    }
}

/// A loaded triangle mesh (renderer-agnostic), optionally skinned.
#[derive(Debug, Clone)]
pub struct MeshAsset {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub skin: Option<SkinWeights>,
}

impl MeshAsset {
    /// Build a mesh; missing normals (an empty vector) are computed from the triangles.
    pub fn new(
        name: impl Into<String>,
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        indices: Vec<u32>,
    ) -> Self {
        let normals = if normals.is_empty() {
            compute_normals(&positions, &indices)
        } else {
            normals
        };

        Self {
            name: name.into(),
            positions,
            normals,
            indices,
            skin: None,
        }
    }

    pub fn with_skin(mut self, skin: SkinWeights) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_skinned(&self) -> bool {
        self.skin.is_some()
    }

    /// Check topology and per-vertex buffer sizes.
    pub fn validate(&self) -> Result<(), AssetError> {
        let invalid = |reason: String| AssetError::InvalidMesh {
            name: self.name.clone(),
            reason,
        };

        if self.indices.len() % 3 != 0 {
            return Err(invalid(format!(
                "index count {} is not a multiple of 3",
                self.indices.len()
            )));
        }

        let vertex_count = self.positions.len();
        if let Some((position, index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index as usize >= vertex_count)
        {
            return Err(invalid(format!(
                "index {index} at position {position} exceeds vertex count {vertex_count}"
            )));
        }

        if self.normals.len() != vertex_count {
            return Err(invalid(format!(
                "{} normals for {vertex_count} vertices",
                self.normals.len()
            )));
        }

        if let Some(skin) = &self.skin {
            if skin.joints.len() != vertex_count || skin.weights.len() != vertex_count {
                return Err(invalid(format!(
                    "{} joint and {} weight entries for {vertex_count} vertices",
                    skin.joints.len(),
                    skin.weights.len()
                )));
            }
        }

        Ok(())
    }
}

/// Area-weighted vertex normals. Vertices touched only by degenerate
/// triangles get a zero normal.
pub fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];

    for triangle in indices.chunks_exact(3) {
        let [a, b, c] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let (Some(&pa), Some(&pb), Some(&pc)) = (positions.get(a), positions.get(b), positions.get(c))
        else {
            continue;
        };

        // Unnormalised cross product, so larger faces weigh more.
        let face = (pb - pa).cross(pc - pa);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }

    normals.iter().map(|n| n.normalize_or_zero()).collect()
}
