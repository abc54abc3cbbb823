//! Axis-aligned bounds and the swept-bounds broad phase

use glam::Vec3;

/// Relative padding applied to boxes before the overlap test, so pairs the
/// narrow phase would call touching are never culled.
const BROAD_PHASE_MARGIN: f32 = 1e-4;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// An inverted box that any point or union will replace.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        points.into_iter().fold(Self::EMPTY, |aabb, p| Aabb {
            min: aabb.min.min(p),
            max: aabb.max.max(p),
        })
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpgt(self.max).any()
    }

    /// Grow the box by `margin` on every side.
    pub fn expanded(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Closed-interval overlap; boxes that only touch overlap.
    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Padding used by the broad phase, proportional to size and distance from the origin.
    pub(crate) fn padded(&self) -> Aabb {
        let extent = (self.max - self.min).max_element().max(0.0);
        let reach = self.min.abs().max(self.max.abs()).max_element();
        self.expanded(BROAD_PHASE_MARGIN * (1.0 + extent + reach))
    }
}

/// Union of a set of boxes ([`Aabb::EMPTY`] for none)
pub fn total_bounds(boxes: &[Aabb]) -> Aabb {
    boxes.iter().fold(Aabb::EMPTY, |acc, aabb| acc.union(aabb))
}

/// Candidate pairs `(index in a, index in b)` whose boxes overlap, found by
/// sorting both sets along x and sweeping. Pairs are returned sorted.
pub fn overlapping_pairs(a: &[Aabb], b: &[Aabb]) -> Vec<(usize, usize)> {
    let a: Vec<Aabb> = a.iter().map(Aabb::padded).collect();
    let b: Vec<Aabb> = b.iter().map(Aabb::padded).collect();

    let sorted = |boxes: &[Aabb]| {
        let mut order: Vec<usize> = (0..boxes.len()).collect();
        order.sort_by(|&i, &j| boxes[i].min.x.total_cmp(&boxes[j].min.x));
        order
    };
    let order_a = sorted(&a);
    let order_b = sorted(&b);

    let mut pairs = Vec::new();
    let mut active_a: Vec<usize> = Vec::new();
    let mut active_b: Vec<usize> = Vec::new();
    let (mut next_a, mut next_b) = (0, 0);

    while next_a < order_a.len() || next_b < order_b.len() {
        let take_a = next_b >= order_b.len()
            || (next_a < order_a.len() && a[order_a[next_a]].min.x <= b[order_b[next_b]].min.x);

        if take_a {
            let i = order_a[next_a];
            next_a += 1;
            let entering = a[i];
            // Boxes that end before this one starts cannot overlap anything later.
            active_b.retain(|&j| b[j].max.x >= entering.min.x);
            pairs.extend(
                active_b
                    .iter()
                    .filter(|&&j| entering.overlaps(&b[j]))
                    .map(|&j| (i, j)),
            );
            active_a.push(i);
        } else {
            let j = order_b[next_b];
            next_b += 1;
            let entering = b[j];
            active_a.retain(|&i| a[i].max.x >= entering.min.x);
            pairs.extend(
                active_a
                    .iter()
                    .filter(|&&i| entering.overlaps(&a[i]))
                    .map(|&i| (i, j)),
            );
            active_b.push(j);
        }
    }

    pairs.sort_unstable();
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cube(center: Vec3, half: f32) -> Aabb {
        Aabb {
            min: center - Vec3::splat(half),
            max: center + Vec3::splat(half),
        }
    }

    fn brute_force(a: &[Aabb], b: &[Aabb]) -> Vec<(usize, usize)> {
        let a: Vec<Aabb> = a.iter().map(Aabb::padded).collect();
        let b: Vec<Aabb> = b.iter().map(Aabb::padded).collect();
        let mut pairs = Vec::new();
        for (i, box_a) in a.iter().enumerate() {
            for (j, box_b) in b.iter().enumerate() {
                if box_a.overlaps(box_b) {
                    pairs.push((i, j));
                }
            }
        }
        pairs
    }

    #[test]
    fn test_touching_boxes_overlap() {
        let a = cube(Vec3::ZERO, 0.5);
        let b = cube(Vec3::X, 0.5);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&cube(Vec3::new(1.5, 0.0, 0.0), 0.4)));
    }

    #[test]
    fn test_empty_and_union() {
        assert!(Aabb::EMPTY.is_empty());
        assert!(total_bounds(&[]).is_empty());

        let total = total_bounds(&[cube(Vec3::ZERO, 1.0), cube(Vec3::splat(3.0), 1.0)]);
        assert_eq!(total.min, Vec3::splat(-1.0));
        assert_eq!(total.max, Vec3::splat(4.0));
    }

    #[test]
    fn test_sweep_matches_brute_force() {
        // A deterministic scatter with overlaps in some axes but not others.
        let a: Vec<Aabb> = (0..40)
            .map(|i| {
                let f = i as f32;
                cube(Vec3::new((f * 0.37) % 5.0, (f * 0.71) % 3.0, (f * 0.13) % 2.0), 0.3)
            })
            .collect();
        let b: Vec<Aabb> = (0..25)
            .map(|i| {
                let f = i as f32;
                cube(Vec3::new((f * 0.53) % 5.0, (f * 0.29) % 3.0, (f * 0.61) % 2.0), 0.25)
            })
            .collect();

        let swept = overlapping_pairs(&a, &b);
        assert!(!swept.is_empty());
        assert_eq!(swept, brute_force(&a, &b));
    }

    #[test]
    fn test_disjoint_sets_produce_no_pairs() {
        let a = [cube(Vec3::ZERO, 0.5), cube(Vec3::Y, 0.5)];
        let b = [cube(Vec3::new(10.0, 0.0, 0.0), 0.5)];
        assert!(overlapping_pairs(&a, &b).is_empty());
        assert!(overlapping_pairs(&a, &[]).is_empty());
    }
}
