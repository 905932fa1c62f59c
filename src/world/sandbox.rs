//! A minimal in-process host for ropes: spheres, cuboids and compounds, a
//! brute-force broadphase, analytic ray casts and a manifold registry.
//!
//! Bodies only move through [`SandboxWorld::step`] (semi-implicit Euler under
//! gravity); there is no body-body collision.

use std::collections::HashMap;

use glam::{DMat3, DQuat, DVec3};

use super::{
    BodyHandle, BodyKind, CollisionWorld, ManifoldHandle, ManifoldPoint, RayHit, RopeHandle,
    ShapeClass,
};
use crate::{
    core::types::{Aabb, CollisionFilter, Transform},
    utils::{Arena, Handle},
};

pub type ShapeHandle = Handle;

pub const DEFAULT_GRAVITY: DVec3 = DVec3::new(0.0, -9.81, 0.0);

/// Convex skin given to cuboids unless one is specified.
pub const DEFAULT_CUBOID_MARGIN: f64 = 0.04;

#[derive(Debug, Clone, PartialEq)]
pub enum Geometry {
    Sphere { radius: f64 },
    Cuboid { half_extents: DVec3 },
    Compound { children: Vec<(Transform, ShapeHandle)> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SandboxShape {
    pub geometry: Geometry,
    pub margin: f64,
}

#[derive(Debug, Clone)]
pub struct SandboxBody {
    pub transform: Transform,
    pub linear_velocity: DVec3,
    pub angular_velocity: DVec3,
    pub inverse_mass: f64,
    /// Body-frame inverse inertia.
    pub inverse_inertia: DMat3,
    pub kind: BodyKind,
    pub shape: ShapeHandle,
    pub contact_response: bool,
    pub filter: Option<CollisionFilter>,
    pub awake: bool,
}

impl SandboxBody {
    pub fn inverse_inertia_world(&self) -> DMat3 {
        let basis = self.transform.basis();
        basis * self.inverse_inertia * basis.transpose()
    }

    pub fn velocity_at(&self, relative: DVec3) -> DVec3 {
        self.linear_velocity + self.angular_velocity.cross(relative)
    }

    pub fn apply_impulse(&mut self, impulse: DVec3, relative: DVec3) {
        if !self.kind.is_dynamic() {
            return;
        }
        self.linear_velocity += impulse * self.inverse_mass;
        self.angular_velocity += self.inverse_inertia_world() * relative.cross(impulse);
        self.awake = true;
    }
}

/// Builder for [`SandboxBody`], in the spirit of a collider builder.
pub struct BodyBuilder {
    shape: ShapeHandle,
    kind: BodyKind,
    mass: f64,
    transform: Transform,
    linear_velocity: DVec3,
    angular_velocity: DVec3,
    contact_response: bool,
    filter: Option<CollisionFilter>,
}

impl BodyBuilder {
    pub fn new(shape: ShapeHandle) -> Self {
        Self {
            shape,
            kind: BodyKind::Dynamic,
            mass: 1.0,
            transform: Transform::IDENTITY,
            linear_velocity: DVec3::ZERO,
            angular_velocity: DVec3::ZERO,
            contact_response: true,
            filter: None,
        }
    }

    pub fn fixed(mut self) -> Self {
        self.kind = BodyKind::Static;
        self
    }

    pub fn kinematic(mut self) -> Self {
        self.kind = BodyKind::Kinematic;
        self
    }

    pub fn mass(mut self, mass: f64) -> Self {
        self.mass = mass;
        self
    }

    pub fn position(mut self, position: DVec3) -> Self {
        self.transform.position = position;
        self
    }

    pub fn rotation(mut self, rotation: DQuat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn linear_velocity(mut self, velocity: DVec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn angular_velocity(mut self, velocity: DVec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn contact_response(mut self, enabled: bool) -> Self {
        self.contact_response = enabled;
        self
    }

    pub fn filter(mut self, layer: u32, mask: u32) -> Self {
        self.filter = Some(CollisionFilter::new(layer, mask));
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct SandboxManifold {
    pub rope: RopeHandle,
    pub body: BodyHandle,
    pub points: Vec<ManifoldPoint>,
}

pub struct SandboxWorld {
    pub gravity: DVec3,
    shapes: Arena<SandboxShape>,
    bodies: Arena<SandboxBody>,
    ropes: Arena<Aabb>,
    manifolds: Arena<SandboxManifold>,
    manifold_index: HashMap<(RopeHandle, BodyHandle), ManifoldHandle>,
}

impl Default for SandboxWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SandboxWorld {
    pub fn new() -> Self {
        Self::with_gravity(DEFAULT_GRAVITY)
    }

    pub fn with_gravity(gravity: DVec3) -> Self {
        Self {
            gravity,
            shapes: Arena::new(),
            bodies: Arena::new(),
            ropes: Arena::new(),
            manifolds: Arena::new(),
            manifold_index: HashMap::new(),
        }
    }

    // ---- shapes ----

    pub fn add_sphere(&mut self, radius: f64) -> ShapeHandle {
        self.shapes.insert(SandboxShape {
            geometry: Geometry::Sphere { radius },
            margin: radius,
        })
    }

    pub fn add_cuboid(&mut self, half_extents: DVec3) -> ShapeHandle {
        self.add_cuboid_with_margin(half_extents, DEFAULT_CUBOID_MARGIN)
    }

    pub fn add_cuboid_with_margin(&mut self, half_extents: DVec3, margin: f64) -> ShapeHandle {
        self.shapes.insert(SandboxShape {
            geometry: Geometry::Cuboid { half_extents },
            margin,
        })
    }

    pub fn add_compound(&mut self, children: Vec<(Transform, ShapeHandle)>) -> ShapeHandle {
        self.shapes.insert(SandboxShape {
            geometry: Geometry::Compound { children },
            margin: 0.0,
        })
    }

    pub fn shape(&self, handle: ShapeHandle) -> Option<&SandboxShape> {
        self.shapes.get(handle)
    }

    // ---- bodies ----

    pub fn add_body(&mut self, builder: BodyBuilder) -> BodyHandle {
        let dynamic = builder.kind.is_dynamic() && builder.mass > 0.0;
        let (inverse_mass, inverse_inertia) = if dynamic {
            let inertia = self.inertia_of(builder.shape, builder.mass);
            let inverse = if inertia.determinant().abs() > f64::EPSILON {
                inertia.inverse()
            } else {
                DMat3::IDENTITY
            };
            (1.0 / builder.mass, inverse)
        } else {
            (0.0, DMat3::ZERO)
        };
        let kind = if builder.kind.is_dynamic() && !dynamic {
            BodyKind::Static
        } else {
            builder.kind
        };

        self.bodies.insert(SandboxBody {
            transform: builder.transform,
            linear_velocity: builder.linear_velocity,
            angular_velocity: builder.angular_velocity,
            inverse_mass,
            inverse_inertia,
            kind,
            shape: builder.shape,
            contact_response: builder.contact_response,
            filter: builder.filter,
            awake: true,
        })
    }

    /// Removes a body and releases every manifold that referenced it.
    pub fn remove_body(&mut self, handle: BodyHandle) -> Option<SandboxBody> {
        let stale: Vec<ManifoldHandle> = self
            .manifold_index
            .iter()
            .filter(|((_, body), _)| *body == handle)
            .map(|(_, manifold)| *manifold)
            .collect();
        for manifold in stale {
            self.release_manifold(manifold);
        }
        self.bodies.remove(handle)
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&SandboxBody> {
        self.bodies.get(handle)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut SandboxBody> {
        self.bodies.get_mut(handle)
    }

    /// World-space bounds of a body's shape.
    pub fn body_aabb(&self, handle: BodyHandle) -> Option<Aabb> {
        self.bodies
            .get(handle)
            .map(|body| self.shape_bounds(body.shape, &body.transform))
    }

    // ---- ropes and manifolds ----

    pub fn register_rope(&mut self) -> RopeHandle {
        self.ropes.insert(Aabb::empty())
    }

    pub fn rope_bounds(&self, rope: RopeHandle) -> Option<Aabb> {
        self.ropes.get(rope).copied()
    }

    pub fn manifold(&self, handle: ManifoldHandle) -> Option<&SandboxManifold> {
        self.manifolds.get(handle)
    }

    pub fn manifold_for(&self, rope: RopeHandle, body: BodyHandle) -> Option<ManifoldHandle> {
        self.manifold_index.get(&(rope, body)).copied()
    }

    pub fn manifold_count(&self) -> usize {
        self.manifolds.len()
    }

    /// Advances dynamic bodies under gravity.
    pub fn step(&mut self, dt: f64) {
        let gravity = self.gravity;
        for (_, body) in self.bodies.iter_mut() {
            if body.kind == BodyKind::Static {
                continue;
            }
            if body.kind.is_dynamic() {
                body.linear_velocity += gravity * dt;
            }
            body.transform.position += body.linear_velocity * dt;

            let omega = body.angular_velocity.length();
            if omega > 1e-9 {
                let delta = DQuat::from_axis_angle(body.angular_velocity / omega, omega * dt);
                body.transform.rotation = (delta * body.transform.rotation).normalize();
            }
        }
    }

    fn inertia_of(&self, shape: ShapeHandle, mass: f64) -> DMat3 {
        let Some(entry) = self.shapes.get(shape) else {
            return DMat3::IDENTITY * mass;
        };
        match &entry.geometry {
            Geometry::Sphere { radius } => DMat3::from_diagonal(DVec3::splat(0.4 * mass * radius * radius)),
            Geometry::Cuboid { half_extents } => cuboid_inertia(*half_extents, mass),
            Geometry::Compound { .. } => {
                let bounds = self.shape_bounds(shape, &Transform::IDENTITY);
                cuboid_inertia(bounds.half_extents(), mass)
            }
        }
    }

    fn shape_bounds(&self, shape: ShapeHandle, transform: &Transform) -> Aabb {
        let Some(entry) = self.shapes.get(shape) else {
            return Aabb::empty();
        };
        match &entry.geometry {
            Geometry::Sphere { radius } => {
                Aabb::from_center_half_extents(transform.position, DVec3::splat(*radius))
            }
            Geometry::Cuboid { half_extents } => {
                let basis = transform.basis();
                let abs = DMat3::from_cols(basis.x_axis.abs(), basis.y_axis.abs(), basis.z_axis.abs());
                Aabb::from_center_half_extents(transform.position, abs * *half_extents)
                    .expanded(entry.margin)
            }
            Geometry::Compound { children } => children.iter().fold(Aabb::empty(), |acc, (local, child)| {
                acc.merge(&self.shape_bounds(*child, &transform.combine(local)))
            }),
        }
    }

    fn cast(
        &self,
        from: DVec3,
        to: DVec3,
        shape: ShapeHandle,
        transform: &Transform,
        margin: f64,
    ) -> Option<RayHit> {
        let entry = self.shapes.get(shape)?;
        match &entry.geometry {
            Geometry::Sphere { radius } => ray_sphere(from, to, transform.position, radius + margin),
            Geometry::Cuboid { half_extents } => {
                let local_from = transform.inverse_transform_point(from);
                let local_to = transform.inverse_transform_point(to);
                let hit = ray_box(local_from, local_to, *half_extents + DVec3::splat(margin))?;
                Some(RayHit {
                    point: transform.transform_point(hit.point),
                    normal: transform.transform_vector(hit.normal),
                    fraction: hit.fraction,
                })
            }
            Geometry::Compound { children } => children
                .iter()
                .filter_map(|(local, child)| self.cast(from, to, *child, &transform.combine(local), margin))
                .min_by(|a, b| a.fraction.total_cmp(&b.fraction)),
        }
    }
}

fn cuboid_inertia(half_extents: DVec3, mass: f64) -> DMat3 {
    let h2 = half_extents * half_extents;
    DMat3::from_diagonal(DVec3::new(h2.y + h2.z, h2.x + h2.z, h2.x + h2.y) * (mass / 3.0))
}

/// Entry hit of a segment against a sphere. Segments starting inside miss.
fn ray_sphere(from: DVec3, to: DVec3, center: DVec3, radius: f64) -> Option<RayHit> {
    let delta = to - from;
    let a = delta.length_squared();
    if a <= f64::EPSILON {
        return None;
    }
    let oc = from - center;
    let b = 2.0 * oc.dot(delta);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 {
        return None;
    }
    let t = (-b - discriminant.sqrt()) / (2.0 * a);
    if !(0.0..=1.0).contains(&t) {
        return None;
    }
    let point = from + delta * t;
    let normal = (point - center).try_normalize()?;
    Some(RayHit {
        point,
        normal,
        fraction: t,
    })
}

/// Slab test against a box centered at the origin.
fn ray_box(from: DVec3, to: DVec3, half_extents: DVec3) -> Option<RayHit> {
    let delta = to - from;
    let mut t_min = 0.0;
    let mut t_max = 1.0;
    let mut normal = DVec3::ZERO;

    for i in 0..3 {
        let origin = from[i];
        let dir = delta[i];
        let min = -half_extents[i];
        let max = half_extents[i];

        if dir.abs() < 1e-12 {
            if origin < min || origin > max {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let mut t1 = (min - origin) * inv;
        let mut t2 = (max - origin) * inv;
        let mut axis_normal = DVec3::ZERO;
        axis_normal[i] = -dir.signum();
        if t1 > t2 {
            std::mem::swap(&mut t1, &mut t2);
        }
        if t1 > t_min {
            t_min = t1;
            normal = axis_normal;
        }
        t_max = f64::min(t_max, t2);
        if t_min > t_max {
            return None;
        }
    }

    // Started inside the box.
    if normal == DVec3::ZERO {
        return None;
    }
    Some(RayHit {
        point: from + delta * t_min,
        normal,
        fraction: t_min,
    })
}

impl CollisionWorld for SandboxWorld {
    type Shape = ShapeHandle;

    fn gravity(&self) -> DVec3 {
        self.gravity
    }

    fn update_rope_bounds(&mut self, rope: RopeHandle, bounds: Aabb) {
        if let Some(slot) = self.ropes.get_mut(rope) {
            *slot = bounds;
        }
    }

    fn query_overlap_candidates(&self, _rope: RopeHandle, bounds: &Aabb) -> Vec<BodyHandle> {
        self.bodies
            .iter()
            .filter(|(_, body)| self.shape_bounds(body.shape, &body.transform).intersects(bounds))
            .map(|(handle, _)| handle)
            .collect()
    }

    fn has_contact_response(&self, body: BodyHandle) -> bool {
        self.bodies.get(body).is_some_and(|b| b.contact_response)
    }

    fn collision_filter(&self, body: BodyHandle) -> Option<CollisionFilter> {
        self.bodies.get(body).and_then(|b| b.filter)
    }

    fn body_kind(&self, body: BodyHandle) -> BodyKind {
        self.bodies.get(body).map_or(BodyKind::Static, |b| b.kind)
    }

    fn body_transform(&self, body: BodyHandle) -> Transform {
        self.bodies.get(body).map_or(Transform::IDENTITY, |b| b.transform)
    }

    fn body_inverse_mass(&self, body: BodyHandle) -> f64 {
        self.bodies.get(body).map_or(0.0, |b| b.inverse_mass)
    }

    fn body_inverse_inertia_world(&self, body: BodyHandle) -> DMat3 {
        self.bodies
            .get(body)
            .map_or(DMat3::ZERO, SandboxBody::inverse_inertia_world)
    }

    fn velocity_at_point(&self, body: BodyHandle, relative: DVec3) -> DVec3 {
        self.bodies
            .get(body)
            .map_or(DVec3::ZERO, |b| b.velocity_at(relative))
    }

    fn apply_impulse(&mut self, body: BodyHandle, impulse: DVec3, relative: DVec3) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.apply_impulse(impulse, relative);
        }
    }

    fn activate(&mut self, body: BodyHandle) {
        if let Some(b) = self.bodies.get_mut(body) {
            b.awake = true;
        }
    }

    fn body_shape(&self, body: BodyHandle) -> ShapeHandle {
        self.bodies.get(body).map(|b| b.shape).unwrap_or_default()
    }

    fn shape_class(&self, shape: ShapeHandle) -> ShapeClass {
        match self.shapes.get(shape).map(|s| &s.geometry) {
            Some(Geometry::Sphere { .. }) => ShapeClass::Sphere,
            Some(Geometry::Compound { .. }) => ShapeClass::Compound,
            _ => ShapeClass::Convex,
        }
    }

    fn shape_margin(&self, shape: ShapeHandle) -> f64 {
        self.shapes.get(shape).map_or(0.0, |s| s.margin)
    }

    fn shape_aabb(&self, shape: ShapeHandle, transform: &Transform) -> Aabb {
        self.shape_bounds(shape, transform)
    }

    fn compound_children(&self, shape: ShapeHandle) -> Vec<(Transform, ShapeHandle)> {
        match self.shapes.get(shape).map(|s| &s.geometry) {
            Some(Geometry::Compound { children }) => children.clone(),
            _ => Vec::new(),
        }
    }

    fn raycast(
        &self,
        from: DVec3,
        to: DVec3,
        shape: ShapeHandle,
        transform: &Transform,
        margin: f64,
    ) -> Option<RayHit> {
        self.cast(from, to, shape, transform, margin)
    }

    fn acquire_manifold(&mut self, rope: RopeHandle, body: BodyHandle) -> ManifoldHandle {
        if let Some(handle) = self.manifold_index.get(&(rope, body)) {
            return *handle;
        }
        let handle = self.manifolds.insert(SandboxManifold {
            rope,
            body,
            points: Vec::new(),
        });
        self.manifold_index.insert((rope, body), handle);
        handle
    }

    fn clear_manifold(&mut self, manifold: ManifoldHandle) {
        if let Some(m) = self.manifolds.get_mut(manifold) {
            m.points.clear();
        }
    }

    fn add_manifold_point(&mut self, manifold: ManifoldHandle, point: ManifoldPoint) {
        if let Some(m) = self.manifolds.get_mut(manifold) {
            m.points.push(point);
        }
    }

    fn manifold_point_count(&self, manifold: ManifoldHandle) -> usize {
        self.manifolds.get(manifold).map_or(0, |m| m.points.len())
    }

    fn release_manifold(&mut self, manifold: ManifoldHandle) {
        if let Some(m) = self.manifolds.remove(manifold) {
            self.manifold_index.remove(&(m.rope, m.body));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn ray_hits_sphere_surface_inflated_by_margin() {
        let hit = ray_sphere(DVec3::new(-3.0, 0.0, 0.0), DVec3::ZERO, DVec3::ZERO, 1.5).unwrap();
        assert_relative_eq!(hit.point, DVec3::new(-1.5, 0.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(hit.normal, DVec3::NEG_X, epsilon = 1e-12);
        assert_relative_eq!(hit.fraction, 0.5, epsilon = 1e-12);
    }

    #[test]
    fn ray_starting_inside_misses() {
        assert!(ray_sphere(DVec3::ZERO, DVec3::X, DVec3::ZERO, 1.0).is_none());
        assert!(ray_box(DVec3::ZERO, DVec3::X * 3.0, DVec3::ONE).is_none());
    }

    #[test]
    fn ray_box_reports_entry_face() {
        let hit = ray_box(DVec3::new(0.2, 3.0, 0.0), DVec3::new(0.2, 0.0, 0.0), DVec3::ONE).unwrap();
        assert_relative_eq!(hit.point, DVec3::new(0.2, 1.0, 0.0), epsilon = 1e-12);
        assert_eq!(hit.normal, DVec3::Y);
    }

    #[test]
    fn dynamic_body_with_zero_mass_becomes_static() {
        let mut world = SandboxWorld::new();
        let shape = world.add_sphere(1.0);
        let body = world.add_body(BodyBuilder::new(shape).mass(0.0));
        assert_eq!(world.body_kind(body), BodyKind::Static);
        assert_eq!(world.body_inverse_mass(body), 0.0);
    }
}
