use glam::{DMat3, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Rigid placement (position and orientation) in double precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: DVec3,
    pub rotation: DQuat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: DVec3::ZERO,
        rotation: DQuat::IDENTITY,
    };

    pub fn from_position(position: DVec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    pub fn from_position_rotation(position: DVec3, rotation: DQuat) -> Self {
        Self { position, rotation }
    }

    /// Maps a point expressed in this frame into the parent frame.
    pub fn transform_point(&self, local: DVec3) -> DVec3 {
        self.position + self.rotation * local
    }

    /// Rotates a direction without translating it.
    pub fn transform_vector(&self, local: DVec3) -> DVec3 {
        self.rotation * local
    }

    pub fn inverse_transform_point(&self, world: DVec3) -> DVec3 {
        self.rotation.inverse() * (world - self.position)
    }

    pub fn basis(&self) -> DMat3 {
        DMat3::from_quat(self.rotation)
    }

    /// Places `child` (expressed in this frame) into the parent frame.
    pub fn combine(&self, child: &Transform) -> Transform {
        Transform {
            position: self.transform_point(child.position),
            rotation: (self.rotation * child.rotation).normalize(),
        }
    }
}

/// Axis-aligned bounding box. Intersection tests are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn from_center_half_extents(center: DVec3, half_extents: DVec3) -> Self {
        Self::new(center - half_extents, center + half_extents)
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn extend(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    pub fn expanded(&self, margin: f64) -> Aabb {
        Aabb::new(self.min - DVec3::splat(margin), self.max + DVec3::splat(margin))
    }

    /// Shared faces, edges and corners count as overlap.
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }
}

/// Layer/mask collision filter. Two filters interact when each one's mask
/// contains the other's layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollisionFilter {
    pub layer: u32,
    pub mask: u32,
}

impl Default for CollisionFilter {
    fn default() -> Self {
        Self {
            layer: 1,
            mask: u32::MAX,
        }
    }
}

impl CollisionFilter {
    pub fn new(layer: u32, mask: u32) -> Self {
        Self { layer, mask }
    }

    pub fn interacts_with(&self, other: &CollisionFilter) -> bool {
        (self.mask & other.layer) != 0 && (other.mask & self.layer) != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn combine_places_child_in_parent_frame() {
        let parent = Transform::from_position_rotation(
            DVec3::new(1.0, 0.0, 0.0),
            DQuat::from_rotation_z(std::f64::consts::FRAC_PI_2),
        );
        let child = Transform::from_position(DVec3::new(2.0, 0.0, 0.0));
        let world = parent.combine(&child);
        assert_relative_eq!(world.position, DVec3::new(1.0, 2.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(
            world.inverse_transform_point(world.position),
            DVec3::ZERO,
            epsilon = 1e-12
        );
    }

    #[test]
    fn touching_boxes_intersect() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        let c = Aabb::new(DVec3::new(1.0 + 1e-9, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn filters_require_mutual_acceptance() {
        let rope = CollisionFilter::new(0b01, 0b10);
        let body = CollisionFilter::new(0b10, 0b01);
        let deaf = CollisionFilter::new(0b10, 0b00);
        assert!(rope.interacts_with(&body));
        assert!(!rope.interacts_with(&deaf));
    }
}
