use std::collections::HashSet;

use glam::DVec3;
use log::debug;

use super::{BodyCandidate, CollisionPipeline};
use crate::{
    core::{rope::Rope, types::Aabb},
    world::{BodyHandle, CollisionWorld, RopeHandle},
};

impl<S: Copy> CollisionPipeline<S> {
    /// Whether the rope should collide with `body` at all.
    pub fn accepts<W>(&self, world: &W, rope: &Rope, body: BodyHandle) -> bool
    where
        W: CollisionWorld<Shape = S>,
    {
        if !world.has_contact_response(body) || self.is_disabled(body) {
            return false;
        }
        world
            .collision_filter(body)
            .map_or(true, |filter| filter.interacts_with(&rope.config.collision_filter))
    }

    /// Collects one body candidate per responsive body the host reports as
    /// overlapping the rope's bounds.
    pub fn gather<W>(&mut self, rope: &Rope, handle: RopeHandle, world: &W)
    where
        W: CollisionWorld<Shape = S>,
    {
        self.bodies.clear();
        let mut seen = HashSet::new();

        for body in world.query_overlap_candidates(handle, &rope.bounds) {
            if !seen.insert(body) || !self.accepts(world, rope, body) {
                continue;
            }
            self.bodies.push(BodyCandidate {
                body,
                kind: world.body_kind(body),
                shape: world.body_shape(body),
                hits: 0,
                last_hit: None,
                impulse: 0.0,
            });
        }

        debug!("rope {:?}: {} body candidates", handle.index(), self.bodies.len());
    }

    /// Whether a sphere of `radius` at `position` touches the bounds of any
    /// body the rope collides with.
    pub fn is_point_overlapping<W>(
        &self,
        world: &W,
        rope: &Rope,
        handle: RopeHandle,
        position: DVec3,
        radius: f64,
    ) -> bool
    where
        W: CollisionWorld<Shape = S>,
    {
        let probe = Aabb::from_center_half_extents(position, DVec3::splat(radius));
        world
            .query_overlap_candidates(handle, &probe)
            .into_iter()
            .filter(|body| self.accepts(world, rope, *body))
            .any(|body| {
                let bounds = world.shape_aabb(world.body_shape(body), &world.body_transform(body));
                bounds.intersects(&probe)
            })
    }
}
