use std::path::PathBuf;

/// Errors that can occur during asset loading.
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    #[error("asset not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load glTF file '{0}': {1}")]
    GltfLoadFailed(PathBuf, String),

    #[error("mesh index {index} out of range for '{path}' ({count} meshes)")]
    MeshIndexOutOfRange {
        path: PathBuf,
        index: usize,
        count: usize,
    },

    #[error("invalid mesh '{name}': {reason}")]
    InvalidMesh { name: String, reason: String },

    #[error("invalid skeleton: {0}")]
    InvalidSkeleton(String),

    #[error("invalid animation '{name}': {reason}")]
    InvalidAnimation { name: String, reason: String },
}
