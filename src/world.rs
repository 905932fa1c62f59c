//! The capability interface the rope needs from its host rigid-body engine.
//!
//! The rope never owns rigid bodies. Everything it knows about the world
//! (broadphase candidates, body state, shape geometry, ray casts and the
//! persistent contact manifolds) comes through [`CollisionWorld`]. The
//! [`sandbox`] module provides a small in-process implementation used by the
//! tests and benchmarks.

use glam::{DMat3, DVec3};

use crate::{
    core::types::{Aabb, CollisionFilter, Transform},
    utils::Handle,
};

pub mod sandbox;

pub type BodyHandle = Handle;
pub type RopeHandle = Handle;
pub type ManifoldHandle = Handle;

/// Motion type of a rigid body as far as contact response is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    Kinematic,
    Static,
}

impl BodyKind {
    pub fn is_dynamic(self) -> bool {
        self == BodyKind::Dynamic
    }
}

/// Broad classification of a collision shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeClass {
    /// Stored margin equals the radius and must not be used as a skin.
    Sphere,
    /// Made of child shapes with local transforms.
    Compound,
    Convex,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: DVec3,
    /// Unit surface normal pointing out of the shape.
    pub normal: DVec3,
    /// Position of the hit along the ray, in `[0, 1]`.
    pub fraction: f64,
}

/// Contact point written into a host manifold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ManifoldPoint {
    pub point_on_body: DVec3,
    pub point_on_rope: DVec3,
    pub normal: DVec3,
    /// Negative when penetrating.
    pub distance: f64,
    pub applied_impulse: f64,
    pub node: usize,
}

/// Host services used by a rope during a step.
///
/// Handles passed in are the ones the host itself returned; implementations
/// may answer with neutral values for handles they no longer know.
pub trait CollisionWorld {
    /// Key identifying a collision shape (a leaf or a compound).
    type Shape: Copy + PartialEq + std::fmt::Debug;

    fn gravity(&self) -> DVec3;

    /// Receives the rope's swept bounds after motion prediction.
    fn update_rope_bounds(&mut self, _rope: RopeHandle, _bounds: Aabb) {}

    /// Bodies whose broadphase proxies overlap `bounds`.
    fn query_overlap_candidates(&self, rope: RopeHandle, bounds: &Aabb) -> Vec<BodyHandle>;

    fn has_contact_response(&self, body: BodyHandle) -> bool;

    /// `None` means the body accepts every rope.
    fn collision_filter(&self, _body: BodyHandle) -> Option<CollisionFilter> {
        None
    }

    fn body_kind(&self, body: BodyHandle) -> BodyKind;
    fn body_transform(&self, body: BodyHandle) -> Transform;
    fn body_inverse_mass(&self, body: BodyHandle) -> f64;
    fn body_inverse_inertia_world(&self, body: BodyHandle) -> DMat3;

    /// Velocity of the body point at `relative` from its center of mass.
    fn velocity_at_point(&self, body: BodyHandle, relative: DVec3) -> DVec3;
    fn apply_impulse(&mut self, body: BodyHandle, impulse: DVec3, relative: DVec3);

    /// Wakes a sleeping body.
    fn activate(&mut self, _body: BodyHandle) {}

    fn body_shape(&self, body: BodyHandle) -> Self::Shape;
    fn shape_class(&self, shape: Self::Shape) -> ShapeClass;
    fn shape_margin(&self, shape: Self::Shape) -> f64;
    fn shape_aabb(&self, shape: Self::Shape, transform: &Transform) -> Aabb;

    /// Direct children of a compound, with transforms relative to it.
    fn compound_children(&self, shape: Self::Shape) -> Vec<(Transform, Self::Shape)>;

    /// Closest hit of the segment `from → to` against `shape` placed at
    /// `transform` and inflated by `margin`.
    fn raycast(
        &self,
        from: DVec3,
        to: DVec3,
        shape: Self::Shape,
        transform: &Transform,
        margin: f64,
    ) -> Option<RayHit>;

    /// Returns the manifold for the (rope, body) pair, creating it if needed.
    fn acquire_manifold(&mut self, rope: RopeHandle, body: BodyHandle) -> ManifoldHandle;
    fn clear_manifold(&mut self, manifold: ManifoldHandle);
    fn add_manifold_point(&mut self, manifold: ManifoldHandle, point: ManifoldPoint);
    fn manifold_point_count(&self, manifold: ManifoldHandle) -> usize;
    fn release_manifold(&mut self, manifold: ManifoldHandle);
}
