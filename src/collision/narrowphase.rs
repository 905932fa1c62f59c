use glam::DVec3;
use log::debug;

use super::{CollisionPipeline, ContactCandidate};
use crate::{
    core::{node::Node, rope::Rope, types::{Aabb, Transform}},
    utils::math::DEGENERATE_EPSILON,
    world::{BodyHandle, CollisionWorld, ShapeClass},
};

/// Box around a node's motion this step, padded by `margin` on every side.
pub fn swept_box(node: &Node, margin: f64) -> Aabb {
    let min = node.position.min(node.previous_position);
    let max = node.position.max(node.previous_position);
    Aabb::new(min, max).expanded(margin)
}

/// Where the first ray of a contact starts: the previous position carried
/// along with the body's motion at the node.
pub fn escape_point<W: CollisionWorld>(world: &W, body: BodyHandle, node: &Node, dt: f64) -> DVec3 {
    let origin = world.body_transform(body).position;
    let velocity = world.velocity_at_point(body, node.position - origin);
    if velocity.length() <= DEGENERATE_EPSILON {
        node.previous_position
    } else {
        node.previous_position + velocity * dt
    }
}

impl<S: Copy> CollisionPipeline<S> {
    /// Pairs every unanchored node with the leaf shapes whose bounds touch its
    /// swept box. Compounds are descended child by child.
    pub fn narrow<W>(&mut self, rope: &mut Rope, world: &W)
    where
        W: CollisionWorld<Shape = S>,
    {
        self.contacts.clear();
        if self.bodies.is_empty() {
            return;
        }

        let base = rope.config.node_radius + rope.config.broadphase_margin;
        for index in 0..rope.nodes.len() {
            if rope.nodes[index].is_anchored() {
                continue;
            }
            for slot in 0..self.bodies.len() {
                let body = self.bodies[slot].body;
                let shape = self.bodies[slot].shape;
                let transform = world.body_transform(body);
                self.narrow_shape(world, rope, index, slot, shape, transform, base);
            }
        }

        debug!(
            "{} contact candidates over {} bodies",
            self.contacts.len(),
            self.bodies.len()
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn narrow_shape<W>(
        &mut self,
        world: &W,
        rope: &mut Rope,
        index: usize,
        slot: usize,
        shape: S,
        transform: Transform,
        base_margin: f64,
    ) where
        W: CollisionWorld<Shape = S>,
    {
        let class = world.shape_class(shape);
        if class == ShapeClass::Compound {
            for (local, child) in world.compound_children(shape) {
                self.narrow_shape(world, rope, index, slot, child, transform.combine(&local), base_margin);
            }
            return;
        }

        // A sphere's stored margin is its radius.
        let skin = match class {
            ShapeClass::Sphere => 0.0,
            _ => world.shape_margin(shape),
        };
        let node = &rope.nodes[index];
        let swept = swept_box(node, base_margin + skin);
        if !swept.intersects(&world.shape_aabb(shape, &transform)) {
            return;
        }

        let body = self.bodies[slot].body;
        let escape = escape_point(world, body, node, rope.step_dt);
        rope.nodes[index].colliding_objects += 1;
        self.contacts
            .push(ContactCandidate::new(index, slot, shape, transform, escape));
    }
}
