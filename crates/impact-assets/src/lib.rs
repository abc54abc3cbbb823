//! Impact Assets - Scene loading and management
//!
//! Provides glTF 2.0 scene loading (meshes, skins, animations), the skeleton
//! and animation data model, procedural test meshes, and a caching asset
//! server for the impact demo.

mod animation;
mod error;
mod gltf_loader;
mod mesh;
pub mod procedural;
mod server;
mod skeleton;

pub use animation::{Animation, KeyFrame};
pub use error::AssetError;
pub use gltf_loader::{load_scene, SceneAsset};
pub use mesh::{MeshAsset, SkinWeights};
pub use server::{AssetServer, SceneHandle};
pub use skeleton::{Bone, Skeleton};
