/// Errors raised while building collision meshes or detectors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollisionError {
    #[error("index count {0} is not a multiple of 3")]
    IndexCountNotTriangles(usize),

    #[error("index {index} at position {position} exceeds vertex count {vertex_count}")]
    IndexOutOfRange {
        index: u32,
        position: usize,
        vertex_count: usize,
    },

    #[error("start mesh has {start} vertices but end mesh has {end}")]
    VertexCountMismatch { start: usize, end: usize },

    #[error("start and end meshes have different triangle indices")]
    TopologyMismatch,

    #[error("invalid collision config: {0}")]
    InvalidConfig(String),
}
