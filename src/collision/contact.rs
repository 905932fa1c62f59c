//! Ray-cast contact resolution and the one-sided body response.

use glam::DVec3;

use super::{CollisionPipeline, HitRecord};
use crate::{
    config::SPHERE_CONTACT_MARGIN,
    core::rope::Rope,
    utils::math::{impulse_matrix, try_direction, DEGENERATE_EPSILON},
    world::{BodyHandle, CollisionWorld, ShapeClass},
};

impl<S: Copy> CollisionPipeline<S> {
    /// One collision pass: `collision_substeps` sweeps over the contact
    /// candidates, pushing nodes out along the hit normal.
    pub fn resolve<W>(&mut self, rope: &mut Rope, world: &mut W)
    where
        W: CollisionWorld<Shape = S>,
    {
        let config = rope.config;
        let node_radius = config.node_radius;

        for sweep in 0..config.collision_substeps {
            for c in 0..self.contacts.len() {
                let index = self.contacts[c].node;
                // Single-contact nodes converge in the first sweep.
                if sweep > 0 && rope.nodes[index].colliding_objects == 1 {
                    continue;
                }

                let shape = self.contacts[c].shape;
                let is_sphere = world.shape_class(shape) == ShapeClass::Sphere;
                let margin = node_radius
                    + if is_sphere {
                        SPHERE_CONTACT_MARGIN
                    } else {
                        world.shape_margin(shape)
                    };

                let start = self.contacts[c].escape;
                let end = rope.nodes[index].position;
                let travel = (end - start).length();
                if travel <= config.sleeping_threshold {
                    continue;
                }
                let Some(dir) = try_direction(end - start) else {
                    continue;
                };
                let from = start - dir * config.ray_safety_margin;

                let transform = self.contacts[c].transform;
                let Some(hit) = world.raycast(from, end, shape, &transform, node_radius) else {
                    continue;
                };

                let slide = if is_sphere {
                    DVec3::ZERO
                } else {
                    neighbour_slide(rope, index, hit.normal)
                };
                let resolved = hit.point + hit.normal * config.correction_offset + slide;
                let penetration = end.distance(hit.point);

                let slot = self.contacts[c].body_slot;
                let body = self.bodies[slot].body;
                let impulse = if self.bodies[slot].kind.is_dynamic() {
                    push_body(rope, world, index, body, hit.normal, hit.point, margin)
                } else {
                    None
                };
                let magnitude = impulse.map_or(0.0, |i| i.length());

                let contact = &mut self.contacts[c];
                contact.hit = true;
                contact.normal = hit.normal;
                contact.point = hit.point;
                contact.penetration = penetration;
                contact.impulse += magnitude;
                contact.escape = resolved;

                let candidate = &mut self.bodies[slot];
                candidate.hits += 1;
                candidate.impulse += magnitude;
                candidate.last_hit = Some(HitRecord {
                    node: index,
                    point: hit.point,
                    normal: hit.normal,
                    penetration,
                    margin,
                });

                rope.nodes[index].position = resolved;
            }
        }
    }
}

/// Tangential correction that lets a contact node slide toward neighbours
/// whose links are stretched, so the chain does not wedge against the shape.
pub fn neighbour_slide(rope: &Rope, index: usize, normal: DVec3) -> DVec3 {
    let position = rope.nodes[index].position;
    let mut correction = DVec3::ZERO;

    let mut neighbours = [None, None];
    if index > 0 {
        neighbours[0] = Some((index - 1, rope.links[index - 1].rest_length));
    }
    if index + 1 < rope.nodes.len() {
        neighbours[1] = Some((index + 1, rope.links[index].rest_length));
    }

    for (neighbour, rest) in neighbours.into_iter().flatten() {
        let link = rope.nodes[neighbour].position - position;
        let length = link.length();
        if length <= rest {
            continue;
        }
        let Some(dir) = try_direction(link) else {
            continue;
        };
        let excess = link - dir * rest;
        let Some(tangent) = try_direction(normal.cross(dir.cross(normal))) else {
            continue;
        };
        correction += excess.dot(-normal) * tangent;
    }
    correction
}

/// Pushes a dynamic body away from a penetrating node. Only applied while the
/// node approaches or rests on the body along the normal.
#[allow(clippy::too_many_arguments)]
fn push_body<W: CollisionWorld>(
    rope: &Rope,
    world: &mut W,
    index: usize,
    body: BodyHandle,
    normal: DVec3,
    hit_point: DVec3,
    margin: f64,
) -> Option<DVec3> {
    let body_inverse_mass = world.body_inverse_mass(body);
    if body_inverse_mass == 0.0 {
        return None;
    }

    let dt = rope.step_dt;
    let node = &rope.nodes[index];
    let hardness = rope.config.contact_hardness;

    let arm = node.position - world.body_transform(body).position;
    let body_travel = world.velocity_at_point(body, arm) * dt;
    let node_travel = node.position - node.previous_position;
    if (node_travel - body_travel).dot(normal) > DEGENERATE_EPSILON {
        return None;
    }

    let depth = node.position.distance(hit_point).min(margin);
    let response = impulse_matrix(
        dt,
        node.inverse_mass,
        body_inverse_mass,
        world.body_inverse_inertia_world(body),
        arm,
    );
    let impulse = response * (-normal * (depth * hardness));
    world.apply_impulse(body, impulse, arm);
    Some(impulse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeConfig;
    use approx::assert_relative_eq;

    #[test]
    fn slide_follows_stretched_neighbour_along_tangent() {
        let config = RopeConfig::default();
        let mut rope = Rope::from_segment(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), 3, 3.0, config).unwrap();
        // Right neighbour pulled below the contact plane: link 1 is stretched.
        rope.nodes[2].position = DVec3::new(3.0, -1.0, 0.0);

        let slide = neighbour_slide(&rope, 1, DVec3::Y);

        assert_relative_eq!(slide.y, 0.0, epsilon = 1e-12);
        assert!(slide.x > 0.0);
    }

    #[test]
    fn relaxed_neighbours_do_not_slide() {
        let config = RopeConfig::default();
        let rope = Rope::from_segment(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), 3, 3.0, config).unwrap();
        assert_eq!(neighbour_slide(&rope, 1, DVec3::Y), DVec3::ZERO);
        assert_eq!(neighbour_slide(&rope, 0, DVec3::Y), DVec3::ZERO);
    }
}
