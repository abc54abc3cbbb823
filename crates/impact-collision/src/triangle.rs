//! Static triangle/triangle overlap via the separating axis theorem
//!
//! Candidate axes are the two face normals, the nine edge/edge cross
//! products and, last, the six in-plane edge normals. The in-plane axes only
//! matter for (near) coplanar pairs, where every cross product collapses onto
//! the shared normal; they are tested after everything else because a
//! non-coplanar pair is almost always separated earlier.

use glam::Vec3;

/// Separation, relative to the pair's extent, below which triangles count as touching.
const TOUCH_EPSILON: f32 = 1e-6;

/// Squared sine of the smallest corner angle below which a triangle is degenerate.
const DEGENERATE_EPSILON: f32 = 1e-12;

/// Cross products shorter than this (relative to the extent) carry no direction.
const AXIS_EPSILON: f32 = 1e-14;

/// True when the triangle has (numerically) zero area.
pub fn is_degenerate(triangle: &[Vec3; 3]) -> bool {
    let e1 = triangle[1] - triangle[0];
    let e2 = triangle[2] - triangle[0];
    let area2 = e1.cross(e2).length_squared();
    area2 <= DEGENERATE_EPSILON * e1.length_squared() * e2.length_squared()
}

/// True when the closed triangles `p` and `q` share at least one point.
///
/// Degenerate triangles never intersect anything.
pub fn triangles_intersect(p: &[Vec3; 3], q: &[Vec3; 3]) -> bool {
    if is_degenerate(p) || is_degenerate(q) {
        return false;
    }

    // Work relative to p[0] to keep magnitudes small.
    let origin = p[0];
    let p = p.map(|v| v - origin);
    let q = q.map(|v| v - origin);

    let scale = p
        .iter()
        .chain(q.iter())
        .map(|v| v.abs().max_element())
        .fold(0.0f32, f32::max);
    let tolerance = TOUCH_EPSILON * scale;
    let min_axis = AXIS_EPSILON * scale * scale * scale * scale;

    let edges_p = [p[1] - p[0], p[2] - p[1], p[0] - p[2]];
    let edges_q = [q[1] - q[0], q[2] - q[1], q[0] - q[2]];
    let normal_p = edges_p[0].cross(-edges_p[2]);
    let normal_q = edges_q[0].cross(-edges_q[2]);

    let separates = |axis: Vec3| {
        let length_squared = axis.length_squared();
        if length_squared <= min_axis {
            return false;
        }
        let (min_p, max_p) = project(&p, axis);
        let (min_q, max_q) = project(&q, axis);
        let slack = tolerance * length_squared.sqrt();
        max_p + slack < min_q || max_q + slack < min_p
    };

    if separates(normal_p) || separates(normal_q) {
        return false;
    }

    for edge_p in &edges_p {
        for edge_q in &edges_q {
            if separates(edge_p.cross(*edge_q)) {
                return false;
            }
        }
    }

    let in_plane_p = edges_p.iter().map(|edge| normal_p.cross(*edge));
    let in_plane_q = edges_q.iter().map(|edge| normal_q.cross(*edge));
    for axis in in_plane_p.chain(in_plane_q) {
        if separates(axis) {
            return false;
        }
    }

    true
}

fn project(triangle: &[Vec3; 3], axis: Vec3) -> (f32, f32) {
    let a = triangle[0].dot(axis);
    let b = triangle[1].dot(axis);
    let c = triangle[2].dot(axis);
    (a.min(b).min(c), a.max(b).max(c))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(a: [f32; 3], b: [f32; 3], c: [f32; 3]) -> [Vec3; 3] {
        [Vec3::from(a), Vec3::from(b), Vec3::from(c)]
    }

    fn unit_at(z: f32) -> [Vec3; 3] {
        tri([0.0, 0.0, z], [1.0, 0.0, z], [0.0, 1.0, z])
    }

    #[test]
    fn test_crossing_triangles_intersect() {
        let flat = unit_at(0.0);
        let upright = tri([0.2, 0.2, -1.0], [0.3, 0.2, 1.0], [0.2, 0.3, 1.0]);
        assert!(triangles_intersect(&flat, &upright));
        assert!(triangles_intersect(&upright, &flat));
    }

    #[test]
    fn test_parallel_planes_do_not_intersect() {
        assert!(!triangles_intersect(&unit_at(0.0), &unit_at(0.01)));
    }

    #[test]
    fn test_coplanar_overlap_and_separation() {
        let a = unit_at(0.0);
        assert!(triangles_intersect(&a, &a));

        let shifted = tri([0.5, 0.5, 0.0], [1.5, 0.5, 0.0], [0.5, 1.5, 0.0]);
        // Touches a only at its hypotenuse midpoint.
        assert!(triangles_intersect(&a, &shifted));

        let apart = tri([0.6, 0.6, 0.0], [1.6, 0.6, 0.0], [0.6, 1.6, 0.0]);
        assert!(!triangles_intersect(&a, &apart));
    }

    #[test]
    fn test_vertex_touching_face_counts() {
        let a = unit_at(0.0);
        let above = tri([0.25, 0.25, 0.0], [0.5, 0.25, 1.0], [0.25, 0.5, 1.0]);
        assert!(triangles_intersect(&a, &above));

        let lifted = tri([0.25, 0.25, 0.001], [0.5, 0.25, 1.0], [0.25, 0.5, 1.0]);
        assert!(!triangles_intersect(&a, &lifted));
    }

    #[test]
    fn test_edge_straddling_without_contact() {
        // q pierces p's plane but beside p, past its hypotenuse.
        let a = unit_at(0.0);
        let beside = tri([0.8, 0.8, -1.0], [0.9, 0.8, 1.0], [0.8, 0.9, 1.0]);
        assert!(!triangles_intersect(&a, &beside));
    }

    #[test]
    fn test_degenerate_triangles_never_intersect() {
        let sliver = tri([0.0, 0.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]);
        assert!(is_degenerate(&sliver));
        assert!(!triangles_intersect(&sliver, &unit_at(0.0)));

        let point = tri([0.1, 0.1, 0.0], [0.1, 0.1, 0.0], [0.1, 0.1, 0.0]);
        assert!(is_degenerate(&point));
        assert!(!triangles_intersect(&unit_at(0.0), &point));
    }
}
