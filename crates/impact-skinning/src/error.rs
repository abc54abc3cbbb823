/// Errors raised while preparing or running a skinning dispatch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SkinningError {
    #[error("skinning input has {positions} positions, {normals} normals and {influences} bone influences")]
    BufferLengthMismatch {
        positions: usize,
        normals: usize,
        influences: usize,
    },

    #[error("vertex {vertex} is weighted to bone {bone} but the pose has {bone_count} matrices")]
    BoneOutOfRange {
        vertex: usize,
        bone: u32,
        bone_count: usize,
    },

    #[error("padded buffer length {0} is not a multiple of 4")]
    PaddedBufferLength(usize),

    #[error("no usable compute device: {0}")]
    NoDevice(String),

    #[error("compute dispatch failed: {0}")]
    Compute(String),
}
