use glam::DVec3;
use log::warn;

use crate::{core::rope::Rope, error::RopeStatus};

/// Integrates gravity and forces into predicted positions for the step.
///
/// Resets the status flag, snapshots every node's position as the step's
/// previous position and refreshes the rope's swept bounds. Returns the scaled
/// time step. External forces are read by node index; a missing entry
/// contributes nothing and a non-finite one is dropped for this step only.
pub fn predict_motion(
    rope: &mut Rope,
    gravity: DVec3,
    dt: f64,
    external_forces: Option<&[DVec3]>,
) -> f64 {
    rope.status = RopeStatus::Valid;
    let sdt = dt * rope.config.timescale;
    rope.step_dt = sdt;

    let use_gravity = rope.config.use_gravity;
    let forces = if rope.config.use_external_forces {
        external_forces
    } else {
        None
    };

    for (i, node) in rope.nodes.iter_mut().enumerate() {
        node.previous_position = node.position;
        node.colliding_objects = 0;

        if use_gravity && node.inverse_mass > 0.0 {
            node.velocity += gravity * sdt;
        }

        if let Some(&external) = forces.and_then(|f| f.get(i)) {
            if external.is_finite() {
                node.force += external;
            } else {
                warn!("Dropping non-finite external force {external:?} on rope node {i}");
                rope.status = RopeStatus::InternalForcesError;
            }
        }

        node.velocity += node.force * node.inverse_mass * sdt;
        node.position += node.velocity * sdt;
        node.force = DVec3::ZERO;
    }

    rope.bounds = rope.compute_bounds();
    sdt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RopeConfig;
    use approx::assert_relative_eq;

    fn straight_rope(count: usize, config: RopeConfig) -> Rope {
        Rope::from_segment(
            DVec3::ZERO,
            DVec3::new(count as f64 - 1.0, 0.0, 0.0),
            count,
            count as f64,
            config,
        )
        .unwrap()
    }

    #[test]
    fn gravity_skips_pinned_nodes() {
        let mut rope = straight_rope(3, RopeConfig::default());
        rope.set_node_mass(0, 0.0).unwrap();

        let sdt = predict_motion(&mut rope, DVec3::new(0.0, -10.0, 0.0), 0.1, None);

        assert_relative_eq!(sdt, 0.1);
        assert_eq!(rope.nodes()[0].velocity, DVec3::ZERO);
        assert_relative_eq!(rope.nodes()[1].velocity.y, -1.0, epsilon = 1e-12);
        assert_relative_eq!(rope.nodes()[1].position.y, -0.1, epsilon = 1e-12);
        assert_eq!(rope.nodes()[1].previous_position, DVec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn timescale_scales_the_step() {
        let mut config = RopeConfig::default();
        config.timescale = 0.5;
        let mut rope = straight_rope(2, config);
        let sdt = predict_motion(&mut rope, DVec3::new(0.0, -10.0, 0.0), 0.2, None);
        assert_relative_eq!(sdt, 0.1);
        assert_relative_eq!(rope.nodes()[0].velocity.y, -1.0, epsilon = 1e-12);
    }

    #[test]
    fn non_finite_force_is_dropped_for_that_node_only() {
        let config = RopeConfig::default().with_gravity(false).with_external_forces(true);
        let mut rope = straight_rope(5, config);
        let mut forces = vec![DVec3::new(2.0, 0.0, 0.0); 5];
        forces[2].x = f64::NAN;

        predict_motion(&mut rope, DVec3::ZERO, 0.5, Some(&forces));

        assert_eq!(rope.status(), RopeStatus::InternalForcesError);
        assert_eq!(rope.nodes()[2].velocity, DVec3::ZERO);
        for i in [0, 1, 3, 4] {
            assert_relative_eq!(rope.nodes()[i].velocity.x, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn short_force_array_and_disabled_field() {
        let config = RopeConfig::default().with_gravity(false).with_external_forces(true);
        let mut rope = straight_rope(3, config);
        predict_motion(&mut rope, DVec3::ZERO, 1.0, Some(&[DVec3::X]));
        assert_relative_eq!(rope.nodes()[0].velocity.x, 1.0, epsilon = 1e-12);
        assert_eq!(rope.nodes()[2].velocity, DVec3::ZERO);
        assert!(rope.status().is_valid());

        let config = RopeConfig::default().with_gravity(false);
        let mut rope = straight_rope(2, config);
        predict_motion(&mut rope, DVec3::ZERO, 1.0, Some(&[DVec3::X, DVec3::X]));
        assert_eq!(rope.nodes()[0].velocity, DVec3::ZERO);
    }

    #[test]
    fn accumulated_forces_are_consumed() {
        let config = RopeConfig::default().with_gravity(false);
        let mut rope = straight_rope(2, config);
        rope.add_force(1, DVec3::new(0.0, 4.0, 0.0)).unwrap();
        predict_motion(&mut rope, DVec3::ZERO, 0.5, None);
        assert_relative_eq!(rope.nodes()[1].velocity.y, 2.0, epsilon = 1e-12);
        assert_eq!(rope.nodes()[1].force, DVec3::ZERO);
    }
}
