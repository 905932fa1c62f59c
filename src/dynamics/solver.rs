use crate::{
    collision::CollisionPipeline,
    config::InextensibilityMode,
    core::rope::Rope,
    utils::logging::ScopedTimer,
    world::CollisionWorld,
};

use super::{bending, constraints};

/// Drives the fixed-iteration projection schedule of a rope step.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConstraintSolver;

impl ConstraintSolver {
    pub fn new() -> Self {
        Self
    }

    /// Link weights and anchor impulse matrices for the coming iterations.
    pub fn prepare<W: CollisionWorld>(&self, rope: &mut Rope, world: &mut W) {
        constraints::refresh_link_weights(rope);
        constraints::prepare_anchors(rope, world);
    }

    /// Runs every outer iteration, then one last collision pass.
    ///
    /// Each iteration projects anchors, links, inextensibility, bending on
    /// even iterations, and collisions every `collision_interval` iterations.
    pub fn solve<W: CollisionWorld>(
        &self,
        rope: &mut Rope,
        world: &mut W,
        pipeline: &mut CollisionPipeline<W::Shape>,
    ) {
        let _timer = ScopedTimer::new("rope_constraints");
        let config = rope.config;
        let interval = config.collision_interval.max(1);

        for i in 0..config.iterations {
            constraints::solve_anchors(rope, world);
            constraints::solve_distance(rope);

            if config.use_inextensibility {
                match config.inextensibility {
                    InextensibilityMode::Global => constraints::solve_lra_global(rope, world),
                    InextensibilityMode::PerAnchor => constraints::solve_lra_per_anchor(rope, world),
                    InextensibilityMode::Fabrik => constraints::solve_fabrik(rope, world),
                }
            }

            if config.use_bending && i % 2 == 0 {
                bending::solve_bending(rope);
            }

            if config.use_collision && i % interval == 0 {
                pipeline.resolve(rope, world);
            }
        }

        if config.use_collision {
            pipeline.resolve(rope, world);
        }
    }
}
