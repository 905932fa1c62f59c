use std::collections::{HashMap, HashSet};

use log::{debug, warn};

use super::BodyCandidate;
use crate::world::{BodyHandle, CollisionWorld, ManifoldHandle, ManifoldPoint, RopeHandle};

/// Host manifolds this rope currently holds, one per colliding body.
#[derive(Debug, Clone, Default)]
pub struct ManifoldTracker {
    tracked: HashMap<BodyHandle, ManifoldHandle>,
}

impl ManifoldTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tracked.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracked.is_empty()
    }

    pub fn get(&self, body: BodyHandle) -> Option<ManifoldHandle> {
        self.tracked.get(&body).copied()
    }

    /// Rewrites the tracked manifolds from this step's body candidates.
    ///
    /// Every tracked manifold is cleared, each body with at least one hit gets
    /// a single contact point, and manifolds whose body is gone from the
    /// candidates or that ended up empty are released.
    pub fn sync<W>(&mut self, rope: RopeHandle, bodies: &[BodyCandidate<W::Shape>], world: &mut W)
    where
        W: CollisionWorld,
    {
        for manifold in self.tracked.values() {
            world.clear_manifold(*manifold);
        }

        for candidate in bodies {
            let Some(hit) = candidate.last_hit.filter(|_| candidate.hits > 0) else {
                continue;
            };
            let manifold = *self.tracked.entry(candidate.body).or_insert_with(|| {
                debug!("acquiring manifold for body {:?}", candidate.body.index());
                world.acquire_manifold(rope, candidate.body)
            });
            world.add_manifold_point(
                manifold,
                ManifoldPoint {
                    point_on_body: hit.point,
                    point_on_rope: hit.point + hit.normal * hit.margin,
                    normal: hit.normal,
                    distance: -hit.penetration,
                    applied_impulse: candidate.impulse,
                    node: hit.node,
                },
            );
        }

        let present: HashSet<BodyHandle> = bodies.iter().map(|b| b.body).collect();
        self.tracked.retain(|body, manifold| {
            let keep = present.contains(body) && world.manifold_point_count(*manifold) > 0;
            if !keep {
                debug!("releasing manifold for body {:?}", body.index());
                world.release_manifold(*manifold);
            }
            keep
        });
    }

    /// Releases every tracked manifold.
    pub fn release_all<W: CollisionWorld>(&mut self, world: &mut W) {
        for (body, manifold) in self.tracked.drain() {
            debug!("releasing manifold for body {:?}", body.index());
            world.release_manifold(manifold);
        }
    }
}

impl Drop for ManifoldTracker {
    fn drop(&mut self) {
        if !self.tracked.is_empty() {
            warn!(
                "dropping {} host manifold(s) without releasing them; call Cable::release first",
                self.tracked.len()
            );
        }
    }
}
