use glam::{DMat3, DVec3};
use serde::{Deserialize, Serialize};

use crate::world::BodyHandle;

/// A point mass of the rope.
///
/// `position` holds the predicted position during a step and the corrected
/// position once the solver is done; `previous_position` is the snapshot taken
/// when the step started.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node {
    pub position: DVec3,
    pub previous_position: DVec3,
    pub velocity: DVec3,
    pub force: DVec3,
    /// Zero marks a node that constraints never move.
    pub inverse_mass: f64,
    pub index: usize,
    /// Leaf shapes whose bounds overlapped this node's swept box this step.
    pub colliding_objects: u32,
    pub anchor_count: u32,
}

impl Node {
    pub fn new(index: usize, position: DVec3, mass: f64) -> Self {
        Self {
            position,
            previous_position: position,
            velocity: DVec3::ZERO,
            force: DVec3::ZERO,
            inverse_mass: inverse_mass_of(mass),
            index,
            colliding_objects: 0,
            anchor_count: 0,
        }
    }

    pub fn mass(&self) -> f64 {
        if self.inverse_mass > 0.0 {
            1.0 / self.inverse_mass
        } else {
            0.0
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.inverse_mass == 0.0
    }

    pub fn is_anchored(&self) -> bool {
        self.anchor_count > 0
    }

    /// Displacement since the step snapshot.
    pub fn travel(&self) -> DVec3 {
        self.position - self.previous_position
    }
}

/// Mass 0 maps to inverse mass 0 (immovable).
pub fn inverse_mass_of(mass: f64) -> f64 {
    if mass > 0.0 {
        1.0 / mass
    } else {
        0.0
    }
}

/// Segment between node `i` and node `i + 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub nodes: [usize; 2],
    pub rest_length: f64,
    /// Inverse-mass shares of each endpoint, refreshed at the start of a step.
    pub weights: [f64; 2],
}

impl Link {
    pub fn new(first: usize, rest_length: f64) -> Self {
        Self {
            nodes: [first, first + 1],
            rest_length,
            weights: [0.5, 0.5],
        }
    }

    pub fn refresh_weights(&mut self, nodes: &[Node]) {
        let ima = nodes[self.nodes[0]].inverse_mass;
        let imb = nodes[self.nodes[1]].inverse_mass;
        let sum = ima + imb;
        self.weights = if sum > 0.0 {
            [ima / sum, imb / sum]
        } else {
            [0.0, 0.0]
        };
    }

    pub fn current_length(&self, nodes: &[Node]) -> f64 {
        nodes[self.nodes[0]]
            .position
            .distance(nodes[self.nodes[1]].position)
    }
}

/// Binds a node to a point fixed in a rigid body's frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub node: usize,
    pub body: BodyHandle,
    /// Attachment point in the body frame.
    pub local: DVec3,
    pub impulse_matrix: DMat3,
    /// World-space moment arm `R · local`, refreshed each step.
    pub arm: DVec3,
    pub influence: f64,
    /// Sum of `impulse / dt` over the iterations of the current step.
    pub tension: DVec3,
}

impl Anchor {
    pub fn new(node: usize, body: BodyHandle, local: DVec3, influence: f64) -> Self {
        Self {
            node,
            body,
            local,
            impulse_matrix: DMat3::ZERO,
            arm: DVec3::ZERO,
            influence,
            tension: DVec3::ZERO,
        }
    }
}

/// Exported node position, laid out for direct hand-off to a host buffer.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl From<DVec3> for NodePosition {
    fn from(v: DVec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub velocity_x: f64,
    pub velocity_y: f64,
    pub velocity_z: f64,
    pub volume: f64,
}

impl NodeData {
    pub fn new(velocity: DVec3, volume: f64) -> Self {
        Self {
            velocity_x: velocity.x,
            velocity_y: velocity.y,
            velocity_z: velocity.z,
            volume,
        }
    }

    pub fn velocity(&self) -> DVec3 {
        DVec3::new(self.velocity_x, self.velocity_y, self.velocity_z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_mass_pins_the_node() {
        let node = Node::new(0, DVec3::ZERO, 0.0);
        assert!(node.is_pinned());
        assert_eq!(node.mass(), 0.0);
        assert_eq!(Node::new(1, DVec3::ZERO, 4.0).inverse_mass, 0.25);
    }

    #[test]
    fn link_weights_follow_inverse_masses() {
        let nodes = [
            Node::new(0, DVec3::ZERO, 1.0),
            Node::new(1, DVec3::X, 0.0),
        ];
        let mut link = Link::new(0, 1.0);
        link.refresh_weights(&nodes);
        assert_eq!(link.weights, [1.0, 0.0]);
        assert_eq!(link.current_length(&nodes), 1.0);
    }
}
