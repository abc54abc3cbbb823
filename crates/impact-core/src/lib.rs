//! Impact Core - Core types shared by the impact crates
//!
//! This crate provides the foundational types used throughout the demo:
//! - Mathematical primitives (re-exported from glam)
//! - Transform used to build rigid tool poses
//! - Frame clock and the looping animation phase
//! - Pose sets, matrix blending and the per-frame pose interpolator

pub mod pose;
pub mod time;
pub mod types;

pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
pub use pose::{lerp_matrix, BlendMode, PoseError, PoseInterpolator, PoseSet, PoseTriple};
pub use time::{AnimationPhase, FrameClock, TimeConfig};
pub use types::Transform;
