//! End-of-step derived quantities: velocities, length, exported buffers.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::{core::rope::Rope, error::RopeStatus};

/// Summary of one rope step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StepMetrics {
    pub candidate_bodies: usize,
    pub contact_candidates: usize,
    /// Contact candidates that recorded a hit.
    pub contacts: usize,
    pub manifolds: usize,
    pub impulse_sum: f64,
    pub length: f64,
    pub status: RopeStatus,
}

/// Derives velocities from the position change, clears forces, measures the
/// rope and refreshes the export buffers.
pub fn finalize(rope: &mut Rope) {
    let sdt = rope.step_dt;
    let scale = if sdt > 0.0 {
        (1.0 - rope.config.damping) / sdt
    } else {
        0.0
    };

    for node in &mut rope.nodes {
        node.velocity = (node.position - node.previous_position) * scale;
        node.force = DVec3::ZERO;
    }

    rope.length = rope.current_length();
    rope.sync_exports();
}
