//! Rope state: nodes, links, anchors, configuration and the buffers exported
//! to the host, plus the structural editing operations.

use glam::DVec3;

use super::{
    node::{inverse_mass_of, Anchor, Link, Node, NodeData, NodePosition},
    types::Aabb,
};
use crate::{
    config::RopeConfig,
    error::{RopeError, RopeStatus},
    world::BodyHandle,
};

/// A single open chain of point masses.
///
/// Link `i` always joins node `i` and node `i + 1`, so node order is link
/// order and `links.len() == nodes.len() - 1`.
#[derive(Debug, Clone)]
pub struct Rope {
    pub(crate) nodes: Vec<Node>,
    pub(crate) links: Vec<Link>,
    pub(crate) anchors: Vec<Anchor>,
    pub(crate) config: RopeConfig,
    pub(crate) status: RopeStatus,
    pub(crate) length: f64,
    pub(crate) positions: Vec<NodePosition>,
    pub(crate) node_data: Vec<NodeData>,
    pub(crate) bounds: Aabb,
    /// Scaled time step of the step in progress (or the last one).
    pub(crate) step_dt: f64,
}

impl Rope {
    /// Builds a rope from initial node positions and masses. Link rest lengths
    /// are the initial distances between consecutive nodes.
    pub fn new(positions: &[DVec3], masses: &[f64], config: RopeConfig) -> Result<Self, RopeError> {
        config.validate()?;
        if positions.is_empty() {
            return Err(RopeError::EmptyRope);
        }
        if positions.len() != masses.len() {
            return Err(RopeError::MassCountMismatch {
                positions: positions.len(),
                masses: masses.len(),
            });
        }
        if !positions.iter().all(|p| p.is_finite()) {
            return Err(RopeError::NonFinite("node position"));
        }
        if let Some(&bad) = masses.iter().find(|m| !m.is_finite() || **m < 0.0) {
            return Err(RopeError::InvalidMass(bad));
        }

        let nodes: Vec<Node> = positions
            .iter()
            .zip(masses)
            .enumerate()
            .map(|(i, (&p, &m))| Node::new(i, p, m))
            .collect();
        let links = positions
            .windows(2)
            .enumerate()
            .map(|(i, pair)| Link::new(i, pair[0].distance(pair[1])))
            .collect();

        let mut rope = Self {
            nodes,
            links,
            anchors: Vec::new(),
            config,
            status: RopeStatus::Valid,
            length: 0.0,
            positions: Vec::new(),
            node_data: Vec::new(),
            bounds: Aabb::empty(),
            step_dt: 0.0,
        };
        rope.length = rope.current_length();
        rope.bounds = rope.compute_bounds();
        rope.sync_exports();
        Ok(rope)
    }

    /// Evenly spaced straight rope from `start` to `end` with `count` nodes
    /// sharing `total_mass` equally.
    pub fn from_segment(
        start: DVec3,
        end: DVec3,
        count: usize,
        total_mass: f64,
        config: RopeConfig,
    ) -> Result<Self, RopeError> {
        if count == 0 {
            return Err(RopeError::EmptyRope);
        }
        if !(total_mass.is_finite() && total_mass > 0.0) {
            return Err(RopeError::InvalidTotalMass(total_mass));
        }
        let positions: Vec<DVec3> = if count == 1 {
            vec![start]
        } else {
            (0..count)
                .map(|i| start.lerp(end, i as f64 / (count - 1) as f64))
                .collect()
        };
        let masses = vec![total_mass / count as f64; count];
        Self::new(&positions, &masses, config)
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.nodes.get(index)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn anchors(&self) -> &[Anchor] {
        &self.anchors
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.len()
    }

    pub fn config(&self) -> &RopeConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RopeConfig) -> Result<(), RopeError> {
        config.validate()?;
        self.config = config;
        self.sync_exports();
        Ok(())
    }

    pub fn status(&self) -> RopeStatus {
        self.status
    }

    /// Current length as measured at the end of the last step.
    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn rest_length(&self) -> f64 {
        self.links.iter().map(|l| l.rest_length).sum()
    }

    /// Sum of the current link lengths, measured now.
    pub fn current_length(&self) -> f64 {
        self.links.iter().map(|l| l.current_length(&self.nodes)).sum()
    }

    pub fn total_mass(&self) -> f64 {
        self.nodes.iter().map(Node::mass).sum()
    }

    /// Tension accumulated by an anchor during the last step.
    pub fn tension(&self, anchor: usize) -> Option<DVec3> {
        self.anchors.get(anchor).map(|a| a.tension)
    }

    pub fn tensions(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.anchors.iter().map(|a| a.tension)
    }

    pub fn node_positions(&self) -> &[NodePosition] {
        &self.positions
    }

    pub fn node_data(&self) -> &[NodeData] {
        &self.node_data
    }

    /// Swept bounds of the last step (previous and current positions, padded
    /// by the node radius and broadphase margin).
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    // ---- structural editing ----

    /// Appends a node after the current tail and links it with a rest length
    /// equal to the current distance. Returns the new node's index.
    pub fn append_node(&mut self, position: DVec3, mass: f64) -> Result<usize, RopeError> {
        if !position.is_finite() {
            return Err(RopeError::NonFinite("node position"));
        }
        check_mass(mass)?;

        let index = self.nodes.len();
        let tail = self.nodes[index - 1].position;
        self.nodes.push(Node::new(index, position, mass));
        self.links.push(Link::new(index - 1, tail.distance(position)));
        self.sync_exports();
        Ok(index)
    }

    /// Removes a node. Removing an interior node merges its two links into
    /// one whose rest length is their sum; removing an end node drops its
    /// only link. Anchors on the node are dropped.
    pub fn remove_node(&mut self, index: usize) -> Result<(), RopeError> {
        self.check_node(index)?;
        let count = self.nodes.len();
        if count == 1 {
            return Err(RopeError::EmptyRope);
        }

        if index == 0 {
            self.links.remove(0);
        } else if index == count - 1 {
            self.links.pop();
        } else {
            let merged = self.links[index].rest_length;
            self.links[index - 1].rest_length += merged;
            self.links.remove(index);
        }
        self.nodes.remove(index);

        self.anchors.retain(|a| a.node != index);
        for anchor in &mut self.anchors {
            if anchor.node > index {
                anchor.node -= 1;
            }
        }

        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.index = i;
        }
        for (i, link) in self.links.iter_mut().enumerate() {
            link.nodes = [i, i + 1];
        }
        self.recount_anchors();
        self.sync_exports();
        Ok(())
    }

    /// Attaches `node` to `local` in `body`'s frame. Returns the anchor index.
    pub fn append_anchor(
        &mut self,
        node: usize,
        body: BodyHandle,
        local: DVec3,
        influence: f64,
    ) -> Result<usize, RopeError> {
        self.check_node(node)?;
        if !local.is_finite() {
            return Err(RopeError::NonFinite("anchor offset"));
        }
        if !influence.is_finite() {
            return Err(RopeError::NonFinite("anchor influence"));
        }
        self.anchors.push(Anchor::new(node, body, local, influence));
        self.nodes[node].anchor_count += 1;
        Ok(self.anchors.len() - 1)
    }

    pub fn remove_anchor(&mut self, index: usize) -> Result<Anchor, RopeError> {
        self.check_anchor(index)?;
        let anchor = self.anchors.remove(index);
        let node = &mut self.nodes[anchor.node];
        node.anchor_count = node.anchor_count.saturating_sub(1);
        Ok(anchor)
    }

    /// Anchor order decides which anchor wins under per-anchor inextensibility.
    pub fn swap_anchors(&mut self, a: usize, b: usize) -> Result<(), RopeError> {
        self.check_anchor(a)?;
        self.check_anchor(b)?;
        self.anchors.swap(a, b);
        Ok(())
    }

    pub fn link_rest_length(&self, index: usize) -> Result<f64, RopeError> {
        self.links
            .get(index)
            .map(|l| l.rest_length)
            .ok_or(RopeError::LinkOutOfBounds {
                index,
                count: self.links.len(),
            })
    }

    pub fn set_link_rest_length(&mut self, index: usize, length: f64) -> Result<(), RopeError> {
        if !(length.is_finite() && length >= 0.0) {
            return Err(RopeError::InvalidRestLength(length));
        }
        let count = self.links.len();
        let link = self
            .links
            .get_mut(index)
            .ok_or(RopeError::LinkOutOfBounds { index, count })?;
        link.rest_length = length;
        Ok(())
    }

    /// Mass 0 pins the node.
    pub fn set_node_mass(&mut self, index: usize, mass: f64) -> Result<(), RopeError> {
        self.check_node(index)?;
        check_mass(mass)?;
        self.nodes[index].inverse_mass = inverse_mass_of(mass);
        Ok(())
    }

    /// Spreads `mass` evenly over the movable nodes; pinned nodes stay pinned.
    pub fn set_total_mass(&mut self, mass: f64) -> Result<(), RopeError> {
        if !(mass.is_finite() && mass > 0.0) {
            return Err(RopeError::InvalidTotalMass(mass));
        }
        let movable = self.nodes.iter().filter(|n| !n.is_pinned()).count();
        if movable == 0 {
            log::debug!("set_total_mass: every node is pinned, nothing to distribute");
            return Ok(());
        }
        let inverse_mass = movable as f64 / mass;
        for node in self.nodes.iter_mut().filter(|n| !n.is_pinned()) {
            node.inverse_mass = inverse_mass;
        }
        Ok(())
    }

    /// Accumulates a force applied during the next step's prediction.
    pub fn add_force(&mut self, index: usize, force: DVec3) -> Result<(), RopeError> {
        self.check_node(index)?;
        if !force.is_finite() {
            return Err(RopeError::NonFinite("force"));
        }
        self.nodes[index].force += force;
        Ok(())
    }

    /// Moves a node without giving it velocity.
    pub fn set_node_position(&mut self, index: usize, position: DVec3) -> Result<(), RopeError> {
        self.check_node(index)?;
        if !position.is_finite() {
            return Err(RopeError::NonFinite("node position"));
        }
        let node = &mut self.nodes[index];
        node.position = position;
        node.previous_position = position;
        node.velocity = DVec3::ZERO;
        self.positions[index] = position.into();
        Ok(())
    }

    // ---- internals ----

    pub(crate) fn compute_bounds(&self) -> Aabb {
        let mut bounds = Aabb::empty();
        for node in &self.nodes {
            bounds.extend(node.position);
            bounds.extend(node.previous_position);
        }
        bounds.expanded(self.config.node_radius + self.config.broadphase_margin)
    }

    /// Rewrites the export buffers from the node state, resizing them to the
    /// node count.
    pub(crate) fn sync_exports(&mut self) {
        let radius = self.config.node_radius;
        let cross_section = std::f64::consts::PI * radius * radius;
        let nodes = &self.nodes;
        let links = &self.links;

        self.positions.clear();
        self.positions.extend(nodes.iter().map(|n| NodePosition::from(n.position)));

        self.node_data.clear();
        self.node_data.extend(nodes.iter().enumerate().map(|(i, n)| {
            let mut adjacent = 0.0;
            if i > 0 {
                adjacent += links[i - 1].current_length(nodes);
            }
            if i < links.len() {
                adjacent += links[i].current_length(nodes);
            }
            NodeData::new(n.velocity, 0.5 * cross_section * adjacent)
        }));
    }

    fn recount_anchors(&mut self) {
        for node in &mut self.nodes {
            node.anchor_count = 0;
        }
        for anchor in &self.anchors {
            self.nodes[anchor.node].anchor_count += 1;
        }
    }

    fn check_node(&self, index: usize) -> Result<(), RopeError> {
        if index < self.nodes.len() {
            Ok(())
        } else {
            Err(RopeError::NodeOutOfBounds {
                index,
                count: self.nodes.len(),
            })
        }
    }

    fn check_anchor(&self, index: usize) -> Result<(), RopeError> {
        if index < self.anchors.len() {
            Ok(())
        } else {
            Err(RopeError::AnchorOutOfBounds {
                index,
                count: self.anchors.len(),
            })
        }
    }
}

fn check_mass(mass: f64) -> Result<(), RopeError> {
    if mass.is_finite() && mass >= 0.0 {
        Ok(())
    } else {
        Err(RopeError::InvalidMass(mass))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::Handle;
    use approx::assert_relative_eq;

    fn straight(count: usize) -> Rope {
        Rope::from_segment(
            DVec3::ZERO,
            DVec3::new((count - 1) as f64, 0.0, 0.0),
            count,
            count as f64,
            RopeConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn construction_validates_inputs() {
        let config = RopeConfig::default();
        assert_eq!(
            Rope::new(&[], &[], config).unwrap_err(),
            RopeError::EmptyRope
        );
        assert_eq!(
            Rope::new(&[DVec3::ZERO, DVec3::X], &[1.0], config).unwrap_err(),
            RopeError::MassCountMismatch {
                positions: 2,
                masses: 1
            }
        );
        assert_eq!(
            Rope::new(&[DVec3::ZERO], &[-1.0], config).unwrap_err(),
            RopeError::InvalidMass(-1.0)
        );
    }

    #[test]
    fn single_node_rope_has_no_links() {
        let rope = Rope::new(&[DVec3::ONE], &[1.0], RopeConfig::default()).unwrap();
        assert_eq!(rope.link_count(), 0);
        assert_eq!(rope.rest_length(), 0.0);
        assert_eq!(rope.node_positions().len(), 1);
    }

    #[test]
    fn append_extends_rest_length_by_new_distance() {
        let mut rope = straight(3);
        let index = rope.append_node(DVec3::new(2.0, 0.5, 0.0), 1.0).unwrap();
        assert_eq!(index, 3);
        assert_relative_eq!(rope.rest_length(), 2.5, epsilon = 1e-12);
        assert_eq!(rope.links()[2].nodes, [2, 3]);
        assert_eq!(rope.node_positions().len(), 4);
        assert_eq!(rope.node_data().len(), 4);
    }

    #[test]
    fn removing_interior_node_merges_links() {
        let mut rope = straight(5);
        rope.set_link_rest_length(1, 1.5).unwrap();
        let before = rope.rest_length();

        rope.remove_node(2).unwrap();

        assert_eq!(rope.node_count(), 4);
        assert_eq!(rope.link_count(), 3);
        assert_relative_eq!(rope.rest_length(), before, epsilon = 1e-12);
        assert_relative_eq!(rope.link_rest_length(1).unwrap(), 2.5, epsilon = 1e-12);
        for (i, link) in rope.links().iter().enumerate() {
            assert_eq!(link.nodes, [i, i + 1]);
        }
        assert!(rope.nodes().iter().enumerate().all(|(i, n)| n.index == i));
    }

    #[test]
    fn removing_end_nodes_drops_their_link() {
        let mut rope = straight(4);
        rope.remove_node(3).unwrap();
        assert_relative_eq!(rope.rest_length(), 2.0, epsilon = 1e-12);
        rope.remove_node(0).unwrap();
        assert_relative_eq!(rope.rest_length(), 1.0, epsilon = 1e-12);
        assert_eq!(rope.node(0).unwrap().position, DVec3::X);

        let mut single = straight(1);
        assert_eq!(single.remove_node(0), Err(RopeError::EmptyRope));
    }

    #[test]
    fn node_removal_shifts_and_drops_anchors() {
        let mut rope = straight(5);
        let body = Handle::from_index(0);
        rope.append_anchor(1, body, DVec3::ZERO, 1.0).unwrap();
        rope.append_anchor(3, body, DVec3::ZERO, 1.0).unwrap();

        rope.remove_node(1).unwrap();

        assert_eq!(rope.anchor_count(), 1);
        assert_eq!(rope.anchors()[0].node, 2);
        assert!(rope.node(2).unwrap().is_anchored());
        assert!(!rope.node(0).unwrap().is_anchored());
    }

    #[test]
    fn anchor_editing() {
        let mut rope = straight(3);
        let a = Handle::from_index(0);
        let b = Handle::from_index(1);
        rope.append_anchor(0, a, DVec3::ZERO, 1.0).unwrap();
        rope.append_anchor(2, b, DVec3::Y, 0.5).unwrap();
        rope.swap_anchors(0, 1).unwrap();
        assert_eq!(rope.anchors()[0].node, 2);

        let removed = rope.remove_anchor(0).unwrap();
        assert_eq!(removed.body, b);
        assert_eq!(rope.node(2).unwrap().anchor_count, 0);
        assert!(matches!(
            rope.remove_anchor(4),
            Err(RopeError::AnchorOutOfBounds { index: 4, count: 1 })
        ));
        assert!(rope.append_anchor(9, a, DVec3::ZERO, 1.0).is_err());
    }

    #[test]
    fn total_mass_skips_pinned_nodes() {
        let mut rope = straight(4);
        rope.set_node_mass(0, 0.0).unwrap();
        rope.set_total_mass(6.0).unwrap();
        assert!(rope.node(0).unwrap().is_pinned());
        assert_relative_eq!(rope.total_mass(), 6.0, epsilon = 1e-12);
        assert_relative_eq!(rope.node(1).unwrap().mass(), 2.0, epsilon = 1e-12);
        assert!(rope.set_total_mass(0.0).is_err());
    }

    #[test]
    fn add_force_accumulates_and_rejects_nan() {
        let mut rope = straight(2);
        rope.add_force(1, DVec3::X).unwrap();
        rope.add_force(1, DVec3::Y).unwrap();
        assert_eq!(rope.node(1).unwrap().force, DVec3::new(1.0, 1.0, 0.0));
        assert!(rope.add_force(1, DVec3::new(f64::NAN, 0.0, 0.0)).is_err());
    }

    #[test]
    fn exported_volume_is_half_adjacent_cylinders() {
        let config = RopeConfig::default().with_node_radius(0.5);
        let rope = Rope::from_segment(DVec3::ZERO, DVec3::new(2.0, 0.0, 0.0), 3, 3.0, config)
            .unwrap();
        let cylinder = std::f64::consts::PI * 0.25;
        assert_relative_eq!(rope.node_data()[0].volume, 0.5 * cylinder, epsilon = 1e-12);
        assert_relative_eq!(rope.node_data()[1].volume, cylinder, epsilon = 1e-12);
    }
}
