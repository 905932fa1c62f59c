//! Bending resistance over consecutive node triples.

use glam::DVec3;

use crate::{
    config::BendingModel,
    core::rope::Rope,
    utils::math::{try_direction, DEGENERATE_EPSILON},
};

pub fn solve_bending(rope: &mut Rope) {
    match rope.config.bending_model {
        BendingModel::DistanceProjection => solve_distance_projection(rope),
        BendingModel::Dihedral => solve_dihedral(rope),
    }
}

/// Pulls each interior node toward the chord joining its neighbours.
pub fn solve_distance_projection(rope: &mut Rope) {
    let stiffness = rope.config.bending_stiffness;
    let max_angle = rope.config.max_bend_angle;
    let squared = stiffness * stiffness;

    for i in 1..rope.links.len() {
        let before = rope.nodes[i - 1].position;
        let current = rope.nodes[i].position;
        let after = rope.nodes[i + 1].position;

        let d1 = current - before;
        let d2 = after - current;
        let (Some(n1), Some(n2)) = (try_direction(d1), try_direction(d2)) else {
            continue;
        };

        let phi = n1.dot(n2).clamp(-1.0, 1.0).acos();
        let k = if max_angle == 0.0 || phi <= max_angle {
            stiffness
        } else {
            stiffness * max_angle / phi
        };

        let r = after - before;
        let rr = r.length_squared();
        if rr <= DEGENERATE_EPSILON {
            continue;
        }
        let alpha1 = d2.dot(r).clamp(0.0, rr) / rr;
        let alpha2 = d1.dot(r).clamp(0.0, rr) / rr;

        let d = alpha1 * before + alpha2 * after - current;
        let distance = d.length();
        let Some(dir) = try_direction(d) else {
            continue;
        };

        let im_before = rope.nodes[i - 1].inverse_mass;
        let im_current = rope.nodes[i].inverse_mass;
        let im_after = rope.nodes[i + 1].inverse_mass;
        let w = im_before * alpha1 * alpha1 + im_current + im_after * alpha2 * alpha2;
        if w <= DEGENERATE_EPSILON {
            continue;
        }

        let lambda = -k * (1.0 / w) * distance * squared;
        rope.nodes[i - 1].position += im_before * lambda * alpha1 * dir;
        rope.nodes[i].position -= im_current * lambda * dir;
        rope.nodes[i + 1].position += im_after * lambda * alpha2 * dir;
    }
}

/// Dihedral bending against a virtual point lifted off the triple's plane.
/// Collinear triples are already straight and are skipped.
pub fn solve_dihedral(rope: &mut Rope) {
    let stiffness = rope.config.bending_stiffness;

    for i in 1..rope.links.len() {
        let p0 = rope.nodes[i - 1].position;
        let p1 = rope.nodes[i + 1].position;
        let p2 = rope.nodes[i].position;

        let Some(axis) = try_direction((p0 - p2).cross(p1 - p2)) else {
            continue;
        };
        let lift = rope.links[i - 1].rest_length.min(rope.links[i].rest_length) * 0.5;
        let p3 = p2 + axis * lift;

        let e = p3 - p2;
        let e_len = e.length();
        if e_len <= DEGENERATE_EPSILON {
            continue;
        }
        let inv_e_len = 1.0 / e_len;

        let n1 = (p2 - p0).cross(p3 - p0);
        let n2 = (p3 - p1).cross(p2 - p1);
        let (l1, l2) = (n1.length_squared(), n2.length_squared());
        if l1 <= DEGENERATE_EPSILON || l2 <= DEGENERATE_EPSILON {
            continue;
        }
        let n1 = n1 / l1;
        let n2 = n2 / l2;

        let d0 = e_len * n1;
        let d1 = e_len * n2;
        let d2 = (p0 - p3).dot(e) * inv_e_len * n1 + (p1 - p3).dot(e) * inv_e_len * n2;
        let d3 = (p2 - p0).dot(e) * inv_e_len * n1 + (p2 - p1).dot(e) * inv_e_len * n2;

        let (u1, u2) = (n1.normalize(), n2.normalize());
        let phi = u1.dot(u2).clamp(-1.0, 1.0).acos();

        let im0 = rope.nodes[i - 1].inverse_mass;
        let im1 = rope.nodes[i + 1].inverse_mass;
        let im2 = rope.nodes[i].inverse_mass;
        // The lifted point rides with the middle node.
        let denominator = im0 * d0.length_squared()
            + im1 * d1.length_squared()
            + im2 * d2.length_squared()
            + im2 * d3.length_squared();
        if denominator <= DEGENERATE_EPSILON {
            continue;
        }

        let mut lambda = phi * stiffness / denominator;
        if lambda.abs() <= DEGENERATE_EPSILON {
            continue;
        }
        if u1.cross(u2).dot(e) > 0.0 {
            lambda = -lambda;
        }

        rope.nodes[i - 1].position -= im0 * lambda * d0;
        rope.nodes[i + 1].position -= im1 * lambda * d1;
        rope.nodes[i].position -= im2 * lambda * d2;
    }
}

/// Bend angle at interior node `index`, in radians.
pub fn bend_angle(rope: &Rope, index: usize) -> Option<f64> {
    if index == 0 || index + 1 >= rope.nodes.len() {
        return None;
    }
    let before: DVec3 = rope.nodes[index - 1].position;
    let current = rope.nodes[index].position;
    let after = rope.nodes[index + 1].position;
    let n1 = try_direction(current - before)?;
    let n2 = try_direction(after - current)?;
    Some(n1.dot(n2).clamp(-1.0, 1.0).acos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeConfig;

    fn bent(config: RopeConfig) -> Rope {
        let positions = [
            DVec3::ZERO,
            DVec3::new(1.0, 0.0, 0.0),
            DVec3::new(1.0, 1.0, 0.0),
        ];
        Rope::new(&positions, &[1.0; 3], config).unwrap()
    }

    #[test]
    fn distance_projection_reduces_bend_angle() {
        let config = RopeConfig::default().with_bending(BendingModel::DistanceProjection, 0.8, 0.0);
        let mut rope = bent(config);
        let before = bend_angle(&rope, 1).unwrap();
        solve_distance_projection(&mut rope);
        let after = bend_angle(&rope, 1).unwrap();
        assert!(after < before, "{after} !< {before}");
    }

    #[test]
    fn dihedral_reduces_bend_angle() {
        let config = RopeConfig::default().with_bending(BendingModel::Dihedral, 0.5, 0.0);
        let mut rope = bent(config);
        let before = bend_angle(&rope, 1).unwrap();
        for _ in 0..4 {
            solve_dihedral(&mut rope);
        }
        let after = bend_angle(&rope, 1).unwrap();
        assert!(after < before, "{after} !< {before}");
    }

    #[test]
    fn bending_never_moves_pinned_nodes() {
        for model in [BendingModel::DistanceProjection, BendingModel::Dihedral] {
            let config = RopeConfig::default().with_bending(model, 1.0, 0.0);
            let mut rope = bent(config);
            rope.set_node_mass(0, 0.0).unwrap();
            rope.set_node_mass(1, 0.0).unwrap();
            for _ in 0..5 {
                solve_bending(&mut rope);
            }
            assert_eq!(rope.nodes()[0].position, DVec3::ZERO);
            assert_eq!(rope.nodes()[1].position, DVec3::new(1.0, 0.0, 0.0));
        }
    }

    #[test]
    fn straight_rope_is_left_alone() {
        for model in [BendingModel::DistanceProjection, BendingModel::Dihedral] {
            let config = RopeConfig::default().with_bending(model, 1.0, 0.3);
            let mut rope =
                Rope::from_segment(DVec3::ZERO, DVec3::new(3.0, 0.0, 0.0), 4, 4.0, config).unwrap();
            let snapshot: Vec<DVec3> = rope.nodes().iter().map(|n| n.position).collect();
            solve_bending(&mut rope);
            for (node, expected) in rope.nodes().iter().zip(snapshot) {
                assert_eq!(node.position, expected);
            }
        }
    }
}
