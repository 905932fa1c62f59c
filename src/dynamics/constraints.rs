//! Positional constraints projected by the solver: link distance, rigid-body
//! anchors and the long-range inextensibility variants.

use glam::DVec3;

use crate::{
    core::{node::Node, rope::Rope},
    utils::math::{impulse_matrix, try_direction},
    world::CollisionWorld,
};

/// Per-step anchor preparation: resets tension, refreshes the moment arm and
/// impulse matrix, and wakes the body.
pub fn prepare_anchors<W: CollisionWorld>(rope: &mut Rope, world: &mut W) {
    let dt = rope.step_dt;
    for anchor in &mut rope.anchors {
        let transform = world.body_transform(anchor.body);
        let node_inverse_mass = rope.nodes[anchor.node].inverse_mass;

        anchor.tension = DVec3::ZERO;
        anchor.arm = transform.transform_vector(anchor.local);
        anchor.impulse_matrix = impulse_matrix(
            dt,
            node_inverse_mass,
            world.body_inverse_mass(anchor.body),
            world.body_inverse_inertia_world(anchor.body),
            anchor.arm,
        );
        world.activate(anchor.body);
    }
}

/// Snaps every anchored node onto its attachment point and pushes the
/// reaction impulse into the body.
pub fn solve_anchors<W: CollisionWorld>(rope: &mut Rope, world: &mut W) {
    let dt = rope.step_dt;
    let hardness = rope.config.anchor_hardness;

    for anchor in &mut rope.anchors {
        let node = &mut rope.nodes[anchor.node];
        let attach = world.body_transform(anchor.body).transform_point(anchor.local);

        let body_travel = world.velocity_at_point(anchor.body, anchor.arm) * dt;
        let node_travel = node.position - node.previous_position;
        let error = (body_travel - node_travel) + (attach - node.position) * hardness;
        let impulse = anchor.impulse_matrix * error * anchor.influence;

        node.position = attach;
        world.apply_impulse(anchor.body, -impulse, anchor.arm);
        anchor.tension += impulse / dt;
    }
}

pub fn refresh_link_weights(rope: &mut Rope) {
    let nodes = &rope.nodes;
    for link in &mut rope.links {
        link.refresh_weights(nodes);
    }
}

/// One Gauss-Seidel sweep over the links.
pub fn solve_distance(rope: &mut Rope) {
    for link in &rope.links {
        let [ia, ib] = link.nodes;
        let [wa, wb] = link.weights;
        if wa + wb <= 0.0 {
            continue;
        }

        let ab = rope.nodes[ib].position - rope.nodes[ia].position;
        let length = ab.length();
        let Some(dir) = try_direction(ab) else {
            continue;
        };
        let stretch = (length - link.rest_length) * dir;

        rope.nodes[ia].position += wa * stretch;
        rope.nodes[ib].position -= wb * stretch;
    }
}

/// Long-range attachments from a single root: the first anchor's node, or
/// the tail when the rope is free.
pub fn solve_lra_global<W: CollisionWorld>(rope: &mut Rope, world: &W) {
    let count = rope.nodes.len();
    if count < 2 {
        if let Some(anchor) = rope.anchors.first() {
            rope.nodes[anchor.node].position =
                world.body_transform(anchor.body).transform_point(anchor.local);
        }
        return;
    }

    let root = match rope.anchors.first() {
        Some(anchor) => {
            let attach = world.body_transform(anchor.body).transform_point(anchor.local);
            rope.nodes[anchor.node].position = attach;
            anchor.node
        }
        None => count - 1,
    };
    let origin = rope.nodes[root].position;

    let mut budget = 0.0;
    for i in (0..root).rev() {
        budget += rope.links[i].rest_length;
        clamp_to_sphere(&mut rope.nodes[i], origin, budget);
    }

    budget = 0.0;
    for i in root + 1..count {
        budget += rope.links[i - 1].rest_length;
        clamp_to_sphere(&mut rope.nodes[i], origin, budget);
    }
}

/// Neighbour clamping outward from every anchor in order, using the rest
/// length of the link next to the anchor on each side. Where two anchors'
/// walks overlap, the later anchor's correction stands.
pub fn solve_lra_per_anchor<W: CollisionWorld>(rope: &mut Rope, world: &W) {
    let count = rope.nodes.len();
    for a in 0..rope.anchors.len() {
        let anchor = rope.anchors[a];
        let stable = anchor.node;
        rope.nodes[stable].position = world.body_transform(anchor.body).transform_point(anchor.local);

        if stable > 0 {
            let max = rope.links[stable - 1].rest_length;
            for j in (1..=stable).rev() {
                let pivot = rope.nodes[j].position;
                clamp_to_sphere(&mut rope.nodes[j - 1], pivot, max);
            }
        }

        if stable + 1 < count {
            let max = rope.links[stable].rest_length;
            for j in stable..count - 1 {
                let pivot = rope.nodes[j].position;
                clamp_to_sphere(&mut rope.nodes[j + 1], pivot, max);
            }
        }
    }
}

/// Forward and backward reaching from every anchor: each node is pulled
/// toward its inward neighbour until no link exceeds its rest length.
pub fn solve_fabrik<W: CollisionWorld>(rope: &mut Rope, world: &W) {
    let count = rope.nodes.len();
    for a in 0..rope.anchors.len() {
        let anchor = rope.anchors[a];
        let stable = anchor.node;
        rope.nodes[stable].position = world.body_transform(anchor.body).transform_point(anchor.local);

        for i in (1..=stable).rev() {
            let pivot = rope.nodes[i].position;
            let rest = rope.links[i - 1].rest_length;
            clamp_to_sphere(&mut rope.nodes[i - 1], pivot, rest);
        }
        for i in stable + 1..count {
            let pivot = rope.nodes[i - 1].position;
            let rest = rope.links[i - 1].rest_length;
            clamp_to_sphere(&mut rope.nodes[i], pivot, rest);
        }
    }
}

/// Pulls `node` back onto the sphere of `radius` around `center` if it lies
/// outside. Pinned nodes stay put.
fn clamp_to_sphere(node: &mut Node, center: DVec3, radius: f64) {
    if node.is_pinned() {
        return;
    }
    let offset = node.position - center;
    if offset.length() <= radius {
        return;
    }
    if let Some(dir) = try_direction(offset) {
        node.position = center + dir * radius;
    }
}
