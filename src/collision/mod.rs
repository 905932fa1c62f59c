//! Rope-versus-rigid-body collision: broadphase gathering, per-node swept-box
//! narrowing, ray-cast contact resolution and manifold bookkeeping.

use std::collections::HashSet;

use glam::DVec3;

use crate::{
    core::types::Transform,
    world::{BodyHandle, BodyKind},
};

pub mod broadphase;
pub mod contact;
pub mod manifold;
pub mod narrowphase;

pub use manifold::ManifoldTracker;

/// Last resolved contact against a body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HitRecord {
    pub node: usize,
    pub point: DVec3,
    pub normal: DVec3,
    pub penetration: f64,
    /// Contact margin used when the hit was resolved.
    pub margin: f64,
}

/// One per overlapping body per step.
#[derive(Debug, Clone)]
pub struct BodyCandidate<S> {
    pub body: BodyHandle,
    pub kind: BodyKind,
    pub shape: S,
    pub hits: u32,
    pub last_hit: Option<HitRecord>,
    /// Sum of impulse magnitudes applied to the body this step.
    pub impulse: f64,
}

/// A (node, leaf shape) pair that survived narrowing.
#[derive(Debug, Clone)]
pub struct ContactCandidate<S> {
    pub node: usize,
    /// Index into the body candidate list.
    pub body_slot: usize,
    pub shape: S,
    /// World transform of the leaf shape.
    pub transform: Transform,
    /// Last position known to be outside the shape; the next ray starts here.
    pub escape: DVec3,
    pub hit: bool,
    pub normal: DVec3,
    pub point: DVec3,
    pub penetration: f64,
    pub impulse: f64,
}

impl<S> ContactCandidate<S> {
    pub fn new(node: usize, body_slot: usize, shape: S, transform: Transform, escape: DVec3) -> Self {
        Self {
            node,
            body_slot,
            shape,
            transform,
            escape,
            hit: false,
            normal: DVec3::ZERO,
            point: DVec3::ZERO,
            penetration: 0.0,
            impulse: 0.0,
        }
    }
}

/// Step-scoped collision state of one rope, plus the bodies it ignores.
#[derive(Debug, Clone)]
pub struct CollisionPipeline<S> {
    pub(crate) bodies: Vec<BodyCandidate<S>>,
    pub(crate) contacts: Vec<ContactCandidate<S>>,
    disabled: HashSet<BodyHandle>,
}

impl<S> Default for CollisionPipeline<S> {
    fn default() -> Self {
        Self {
            bodies: Vec::new(),
            contacts: Vec::new(),
            disabled: HashSet::new(),
        }
    }
}

impl<S> CollisionPipeline<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the step-scoped candidates; the disabled list is kept.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
    }

    pub fn body_candidates(&self) -> &[BodyCandidate<S>] {
        &self.bodies
    }

    pub fn contact_candidates(&self) -> &[ContactCandidate<S>] {
        &self.contacts
    }

    /// Pairs that recorded at least one hit this step.
    pub fn hit_count(&self) -> usize {
        self.contacts.iter().filter(|c| c.hit).count()
    }

    pub fn impulse_sum(&self) -> f64 {
        self.bodies.iter().map(|b| b.impulse).sum()
    }

    /// Returns `false` if the body was already disabled.
    pub fn disable(&mut self, body: BodyHandle) -> bool {
        self.disabled.insert(body)
    }

    /// Returns `false` if the body was not disabled.
    pub fn enable(&mut self, body: BodyHandle) -> bool {
        self.disabled.remove(&body)
    }

    pub fn is_disabled(&self, body: BodyHandle) -> bool {
        self.disabled.contains(&body)
    }
}
