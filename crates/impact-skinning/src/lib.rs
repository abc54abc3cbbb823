//! Impact Skinning - Linear blend skinning dispatch
//!
//! Deforms a mesh's rest vertices by a per-bone pose. The CPU dispatcher is
//! always available; the Vulkan compute dispatcher is behind the `gpu` feature.

mod cpu;
mod dispatch;
mod error;
#[cfg(feature = "gpu")]
mod gpu;
mod vertex;

pub use cpu::CpuSkinner;
pub use dispatch::{SkinnedBuffers, SkinningDispatcher, SkinningInput};
pub use error::SkinningError;
#[cfg(feature = "gpu")]
pub use gpu::GpuSkinner;
pub use vertex::{matrix_columns, pad, BoneInfluence};
