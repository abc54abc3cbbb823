use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::AssetError;
use crate::gltf_loader::{self, SceneAsset};

/// Typed index of a scene held by an [`AssetServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(usize);

/// Central scene registry. Loads, caches, and provides access to scenes.
pub struct AssetServer {
    base_path: PathBuf,
    scenes: Vec<SceneAsset>,
    path_to_scene: HashMap<(PathBuf, usize), SceneHandle>,
}

impl AssetServer {
    /// Create a new AssetServer rooted at the given base path.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        info!("AssetServer created with base path: {}", base_path.display());
        Self {
            base_path,
            scenes: Vec::new(),
            path_to_scene: HashMap::new(),
        }
    }

    /// Resolve a relative asset path against the base path.
    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_path.join(path)
        }
    }

    /// Load one mesh of a glTF file with its skin and animations.
    /// Subsequent loads of the same path and mesh return the cached handle.
    pub fn load_scene(&mut self, path: &Path, mesh_index: usize) -> Result<SceneHandle, AssetError> {
        let full_path = self.resolve(path);
        let key = (full_path, mesh_index);

        if let Some(&handle) = self.path_to_scene.get(&key) {
            debug!("Scene '{}' mesh {} already loaded", key.0.display(), mesh_index);
            return Ok(handle);
        }

        if !key.0.exists() {
            return Err(AssetError::NotFound(key.0));
        }

        let scene = gltf_loader::load_scene(&key.0, mesh_index)?;
        let handle = self.insert(scene);
        self.path_to_scene.insert(key, handle);

        Ok(handle)
    }

    /// Register a scene that was built in memory.
    pub fn insert(&mut self, scene: SceneAsset) -> SceneHandle {
        let handle = SceneHandle(self.scenes.len());
        self.scenes.push(scene);
        handle
    }

    /// Get a reference to a loaded scene by its handle.
    pub fn get(&self, handle: SceneHandle) -> Option<&SceneAsset> {
        self.scenes.get(handle.0)
    }

    /// Number of scenes held.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// The base path this server resolves relative paths against.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::procedural;

    #[test]
    fn test_missing_file_returns_error() {
        let mut server = AssetServer::new("/nonexistent");
        let result = server.load_scene(Path::new("does_not_exist.glb"), 0);
        match result.unwrap_err() {
            AssetError::NotFound(path) => {
                assert_eq!(path, PathBuf::from("/nonexistent/does_not_exist.glb"));
            }
            other => panic!("expected NotFound, got: {:?}", other),
        }
        assert!(server.is_empty());
    }

    #[test]
    fn test_resolve_absolute_path() {
        let server = AssetServer::new("/home/user/assets");
        assert_eq!(
            server.resolve(Path::new("/absolute/path.glb")),
            PathBuf::from("/absolute/path.glb")
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        let server = AssetServer::new("/home/user/assets");
        assert_eq!(
            server.resolve(Path::new("models/humanoid.glb")),
            PathBuf::from("/home/user/assets/models/humanoid.glb")
        );
    }

    #[test]
    fn test_inserted_scenes_get_distinct_handles() {
        let mut server = AssetServer::new(".");
        let limb = server.insert(procedural::jointed_limb().unwrap());
        let tool = server.insert(procedural::tool_scene());

        assert_ne!(limb, tool);
        assert_eq!(server.len(), 2);
        assert!(server.get(limb).is_some_and(|scene| scene.skeleton.is_some()));
        assert!(server.get(tool).is_some_and(|scene| scene.skeleton.is_none()));
        assert!(server.get(SceneHandle(7)).is_none());
    }
}
