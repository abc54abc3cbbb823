//! Impact Collision - Continuous collision detection between triangle meshes
//!
//! Given two meshes sampled at the start and end of an interval, finds the
//! earliest time at which any triangle of one touches any triangle of the
//! other, assuming every vertex moves on a straight line.

mod bounds;
mod ccd;
mod error;
mod mesh;
mod triangle;

pub use bounds::{overlapping_pairs, total_bounds, Aabb};
pub use ccd::{intersection_time, ContinuousDetector};
pub use error::CollisionError;
pub use mesh::{MovingMesh, TriangleMesh};
pub use triangle::{is_degenerate, triangles_intersect};

use serde::{Deserialize, Serialize};

/// Upper bound on bisection steps; beyond this f32 time values stop changing.
const MAX_REFINE_ITERATIONS: u32 = 24;

/// Continuous detection configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CcdConfig {
    /// Number of equal time slices tested statically (default: 64)
    pub substeps: u32,
    /// Bisection steps inside the first overlapping slice (default: 8)
    pub refine_iterations: u32,
    /// Cull triangle pairs whose swept bounds do not overlap (default: true)
    pub broad_phase: bool,
}

impl Default for CcdConfig {
    fn default() -> Self {
        Self {
            substeps: 64,
            refine_iterations: 8,
            broad_phase: true,
        }
    }
}

impl CcdConfig {
    /// Worst-case distance between a reported and the true contact time,
    /// `1 / (substeps * 2^refine_iterations)`.
    pub fn tolerance(&self) -> f32 {
        1.0 / (self.substeps.max(1) as f32 * 2f32.powi(self.refine_iterations as i32))
    }

    pub fn validate(&self) -> Result<(), CollisionError> {
        if self.substeps == 0 {
            return Err(CollisionError::InvalidConfig("substeps must be at least 1".into()));
        }
        if self.refine_iterations > MAX_REFINE_ITERATIONS {
            return Err(CollisionError::InvalidConfig(format!(
                "refine_iterations must be at most {MAX_REFINE_ITERATIONS}, got {}",
                self.refine_iterations
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CcdConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tolerance(), 1.0 / 16384.0);
    }

    #[test]
    fn test_invalid_config() {
        let zero = CcdConfig {
            substeps: 0,
            ..Default::default()
        };
        assert!(matches!(zero.validate(), Err(CollisionError::InvalidConfig(_))));
        assert!(ContinuousDetector::new(zero).is_err());

        let deep = CcdConfig {
            refine_iterations: 40,
            ..Default::default()
        };
        assert!(deep.validate().is_err());
    }

    #[test]
    fn test_tolerance_without_refinement() {
        let config = CcdConfig {
            substeps: 10,
            refine_iterations: 0,
            broad_phase: false,
        };
        assert!((config.tolerance() - 0.1).abs() < 1e-7);
    }
}
