//! Continuous detection over a linear-motion interval
//!
//! The interval `[0, 1]` is sliced into `substeps` equal steps. At each step
//! boundary the candidate triangle pairs are tested statically; the first
//! boundary with an overlap brackets the first contact, which is then narrowed
//! by bisection per overlapping pair. Motion that crosses a thin feature
//! entirely between two boundaries is missed (tunneling).

use tracing::{debug, trace};

use crate::bounds::{overlapping_pairs, total_bounds};
use crate::error::CollisionError;
use crate::mesh::{MovingMesh, TriangleMesh};
use crate::triangle::triangles_intersect;
use crate::CcdConfig;

/// Finds the earliest time two moving meshes touch.
///
/// Stateless apart from its configuration: the result depends only on the
/// meshes passed in.
#[derive(Debug, Clone, Default)]
pub struct ContinuousDetector {
    config: CcdConfig,
}

impl ContinuousDetector {
    pub fn new(config: CcdConfig) -> Result<Self, CollisionError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &CcdConfig {
        &self.config
    }

    /// Earliest `t` in `[0, 1]` at which a triangle of `a` touches a triangle
    /// of `b`, or `None` when they stay apart over the whole interval.
    ///
    /// Returns `Some(0.0)` when the meshes already overlap at the start.
    /// Otherwise the result is an upper bound on the contact time, within
    /// [`CcdConfig::tolerance`] of it.
    pub fn intersection_time(&self, a: &MovingMesh, b: &MovingMesh) -> Option<f32> {
        let candidates = self.candidate_pairs(a, b);
        if candidates.is_empty() {
            trace!("No candidate triangle pairs");
            return None;
        }

        let substeps = self.config.substeps;
        let mut previous = 0.0;

        for step in 0..=substeps {
            let t = step as f32 / substeps as f32;
            let positions_a = a.positions_at(t);
            let positions_b = b.positions_at(t);

            let hits: Vec<(usize, usize)> = candidates
                .iter()
                .copied()
                .filter(|&(i, j)| {
                    triangles_intersect(&a.triangle_in(&positions_a, i), &b.triangle_in(&positions_b, j))
                })
                .collect();

            if hits.is_empty() {
                previous = t;
                continue;
            }

            if step == 0 {
                debug!("Meshes overlap at the start of the interval ({} pairs)", hits.len());
                return Some(0.0);
            }

            let contact = hits
                .iter()
                .map(|&(i, j)| self.refine(a, b, i, j, previous, t))
                .fold(t, f32::min);

            debug!(
                "First contact at t = {:.5} ({} pairs overlapping at step {}/{})",
                contact,
                hits.len(),
                step,
                substeps
            );
            return Some(contact);
        }

        None
    }

    fn candidate_pairs(&self, a: &MovingMesh, b: &MovingMesh) -> Vec<(usize, usize)> {
        if !self.config.broad_phase {
            let count_b = b.triangle_count();
            return (0..a.triangle_count())
                .flat_map(|i| (0..count_b).map(move |j| (i, j)))
                .collect();
        }

        let bounds_a = a.swept_bounds();
        let bounds_b = b.swept_bounds();
        let whole_a = total_bounds(&bounds_a);
        let whole_b = total_bounds(&bounds_b);
        if whole_a.is_empty() || whole_b.is_empty() || !whole_a.padded().overlaps(&whole_b.padded()) {
            return Vec::new();
        }

        let pairs = overlapping_pairs(&bounds_a, &bounds_b);
        trace!(
            "Broad phase kept {} of {} triangle pairs",
            pairs.len(),
            bounds_a.len() * bounds_b.len()
        );
        pairs
    }

    /// Bisect the contact of one pair inside `[lo, hi]`, where the pair is
    /// apart at `lo` and overlapping at `hi`.
    fn refine(&self, a: &MovingMesh, b: &MovingMesh, i: usize, j: usize, mut lo: f32, mut hi: f32) -> f32 {
        for _ in 0..self.config.refine_iterations {
            let mid = 0.5 * (lo + hi);
            if triangles_intersect(&a.triangle_at(i, mid), &b.triangle_at(j, mid)) {
                hi = mid;
            } else {
                lo = mid;
            }
        }
        hi
    }
}

/// Earliest contact time between mesh A moving from `a_start` to `a_end` and
/// mesh B moving from `b_start` to `b_end`, with the default configuration.
pub fn intersection_time(
    a_start: &TriangleMesh,
    a_end: &TriangleMesh,
    b_start: &TriangleMesh,
    b_end: &TriangleMesh,
) -> Result<Option<f32>, CollisionError> {
    let a = MovingMesh::new(a_start, a_end)?;
    let b = MovingMesh::new(b_start, b_end)?;
    Ok(ContinuousDetector::default().intersection_time(&a, &b))
}
