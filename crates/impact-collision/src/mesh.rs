use glam::Vec3;

use crate::bounds::Aabb;
use crate::error::CollisionError;

/// Indexed triangle mesh with validated topology.
#[derive(Debug, Clone, PartialEq)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    indices: Vec<u32>,
}

impl TriangleMesh {
    /// Build a mesh, failing fast on malformed topology.
    pub fn new(positions: Vec<Vec3>, indices: Vec<u32>) -> Result<Self, CollisionError> {
        if indices.len() % 3 != 0 {
            return Err(CollisionError::IndexCountNotTriangles(indices.len()));
        }

        let vertex_count = positions.len();
        if let Some((position, &index)) = indices
            .iter()
            .enumerate()
            .find(|(_, &index)| index as usize >= vertex_count)
        {
            return Err(CollisionError::IndexOutOfRange {
                index,
                position,
                vertex_count,
            });
        }

        Ok(Self { positions, indices })
    }

    /// Same topology, new vertex positions.
    pub fn with_positions(&self, positions: Vec<Vec3>) -> Result<Self, CollisionError> {
        if positions.len() != self.positions.len() {
            return Err(CollisionError::VertexCountMismatch {
                start: self.positions.len(),
                end: positions.len(),
            });
        }
        Ok(Self {
            positions,
            indices: self.indices.clone(),
        })
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Corner positions of triangle `index`
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        triangle_from(&self.positions, &self.indices, index)
    }
}

fn triangle_from(positions: &[Vec3], indices: &[u32], index: usize) -> [Vec3; 3] {
    let base = index * 3;
    [
        positions[indices[base] as usize],
        positions[indices[base + 1] as usize],
        positions[indices[base + 2] as usize],
    ]
}

/// A mesh sampled at the start and end of an interval. Vertices move on
/// straight lines between the two samples.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingMesh {
    start: Vec<Vec3>,
    end: Vec<Vec3>,
    indices: Vec<u32>,
}

impl MovingMesh {
    /// Pair two samples of the same mesh.
    pub fn new(start: &TriangleMesh, end: &TriangleMesh) -> Result<Self, CollisionError> {
        if start.vertex_count() != end.vertex_count() {
            return Err(CollisionError::VertexCountMismatch {
                start: start.vertex_count(),
                end: end.vertex_count(),
            });
        }
        if start.indices != end.indices {
            return Err(CollisionError::TopologyMismatch);
        }

        Ok(Self {
            start: start.positions.clone(),
            end: end.positions.clone(),
            indices: start.indices.clone(),
        })
    }

    /// A mesh that does not move over the interval.
    pub fn stationary(mesh: &TriangleMesh) -> Self {
        Self {
            start: mesh.positions.clone(),
            end: mesh.positions.clone(),
            indices: mesh.indices.clone(),
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex positions at time `t` in `[0, 1]`, exact at both ends.
    pub fn positions_at(&self, t: f32) -> Vec<Vec3> {
        let s = 1.0 - t;
        self.start
            .iter()
            .zip(&self.end)
            .map(|(&p0, &p1)| p0 * s + p1 * t)
            .collect()
    }

    /// Corner positions of triangle `index` at time `t`.
    pub fn triangle_at(&self, index: usize, t: f32) -> [Vec3; 3] {
        let s = 1.0 - t;
        let start = triangle_from(&self.start, &self.indices, index);
        let end = triangle_from(&self.end, &self.indices, index);
        [0, 1, 2].map(|i| start[i] * s + end[i] * t)
    }

    /// Triangle `index` of an already evaluated position buffer.
    pub fn triangle_in(&self, positions: &[Vec3], index: usize) -> [Vec3; 3] {
        triangle_from(positions, &self.indices, index)
    }

    /// Conservative bounds of every triangle over the whole interval.
    ///
    /// Linear motion keeps each vertex inside the box spanned by its start
    /// and end positions, so the union of both samples suffices.
    pub fn swept_bounds(&self) -> Vec<Aabb> {
        (0..self.triangle_count())
            .map(|index| {
                let start = triangle_from(&self.start, &self.indices, index);
                let end = triangle_from(&self.end, &self.indices, index);
                Aabb::from_points(start.iter().chain(end.iter()).copied())
            })
            .collect()
    }
}
