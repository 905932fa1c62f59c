//! The stepping façade: one rope, its collision state and manifolds, run
//! against a host [`CollisionWorld`].

use std::time::Instant;

use glam::DVec3;
use log::warn;

use crate::{
    collision::{CollisionPipeline, ManifoldTracker},
    core::rope::Rope,
    dynamics::{predict_motion, ConstraintSolver},
    error::RopeError,
    metrics::{self, StepMetrics},
    utils::{
        logging::{warn_if_step_budget_exceeded, ScopedTimer},
        profiling::{self, StepProfiler},
    },
    world::{BodyHandle, CollisionWorld, RopeHandle},
};

/// A rope bound to a host world.
///
/// The host hands out the rope's handle (used for broadphase and manifold
/// bookkeeping) and passes itself to every [`Cable::step`].
pub struct Cable<W: CollisionWorld> {
    handle: RopeHandle,
    rope: Rope,
    solver: ConstraintSolver,
    pipeline: CollisionPipeline<W::Shape>,
    manifolds: ManifoldTracker,
    profiler: StepProfiler,
    last_metrics: StepMetrics,
    steps: u64,
}

impl<W: CollisionWorld> Cable<W> {
    pub fn new(handle: RopeHandle, rope: Rope) -> Self {
        Self {
            handle,
            rope,
            solver: ConstraintSolver::new(),
            pipeline: CollisionPipeline::new(),
            manifolds: ManifoldTracker::new(),
            profiler: StepProfiler::default(),
            last_metrics: StepMetrics::default(),
            steps: 0,
        }
    }

    pub fn handle(&self) -> RopeHandle {
        self.handle
    }

    pub fn rope(&self) -> &Rope {
        &self.rope
    }

    /// Structural edits go through the rope directly.
    pub fn rope_mut(&mut self) -> &mut Rope {
        &mut self.rope
    }

    pub fn pipeline(&self) -> &CollisionPipeline<W::Shape> {
        &self.pipeline
    }

    pub fn manifolds(&self) -> &ManifoldTracker {
        &self.manifolds
    }

    pub fn profiler(&self) -> &StepProfiler {
        &self.profiler
    }

    pub fn last_metrics(&self) -> StepMetrics {
        self.last_metrics
    }

    pub fn step_count(&self) -> u64 {
        self.steps
    }

    /// Stops the rope from colliding with `body`. Returns `false` if it was
    /// already ignored.
    pub fn disable_collision_with(&mut self, body: BodyHandle) -> bool {
        self.pipeline.disable(body)
    }

    pub fn enable_collision_with(&mut self, body: BodyHandle) -> bool {
        self.pipeline.enable(body)
    }

    pub fn is_collision_disabled_with(&self, body: BodyHandle) -> bool {
        self.pipeline.is_disabled(body)
    }

    /// Whether node `index` (as a box of the node radius) touches the bounds
    /// of any body the rope collides with.
    pub fn is_node_overlapping(&self, world: &W, index: usize) -> Result<bool, RopeError> {
        let node = self.rope.node(index).ok_or(RopeError::NodeOutOfBounds {
            index,
            count: self.rope.node_count(),
        })?;
        Ok(self.pipeline.is_point_overlapping(
            world,
            &self.rope,
            self.handle,
            node.position,
            self.rope.config.node_radius,
        ))
    }

    /// Advances the rope by `dt`.
    ///
    /// `external_forces` is read by node index when the external force field
    /// is enabled. A non-positive or non-finite `dt` skips the step.
    pub fn step(&mut self, world: &mut W, dt: f64, external_forces: Option<&[DVec3]>) -> StepMetrics {
        if !(dt.is_finite() && dt > 0.0) {
            warn!("Skipping rope step with invalid dt {dt}");
            return self.last_metrics;
        }

        let _timer = ScopedTimer::new("rope_step");
        let started = Instant::now();
        self.profiler.reset();
        let config = self.rope.config;

        {
            let _t = profiling::ScopedTimer::new(&mut self.profiler.predict_time);
            predict_motion(&mut self.rope, world.gravity(), dt, external_forces);
            world.update_rope_bounds(self.handle, self.rope.bounds);
            self.pipeline.clear();
        }

        {
            let _t = profiling::ScopedTimer::new(&mut self.profiler.gather_time);
            self.solver.prepare(&mut self.rope, world);
            if config.use_collision {
                self.pipeline.gather(&self.rope, self.handle, world);
                self.pipeline.narrow(&mut self.rope, world);
            }
        }

        {
            let _t = profiling::ScopedTimer::new(&mut self.profiler.solve_time);
            self.solver.solve(&mut self.rope, world, &mut self.pipeline);
        }

        {
            let _t = profiling::ScopedTimer::new(&mut self.profiler.sync_time);
            self.manifolds
                .sync(self.handle, self.pipeline.body_candidates(), world);
        }

        {
            let _t = profiling::ScopedTimer::new(&mut self.profiler.metrics_time);
            metrics::finalize(&mut self.rope);
        }

        self.steps += 1;
        self.profiler.total_step_time = started.elapsed();
        self.profiler.node_count = self.rope.node_count();
        self.profiler.candidate_count = self.pipeline.contact_candidates().len();
        self.profiler.manifold_count = self.manifolds.len();
        self.profiler.report();
        warn_if_step_budget_exceeded(self.profiler.total_step_time, config.step_budget_ms);

        self.last_metrics = StepMetrics {
            candidate_bodies: self.pipeline.body_candidates().len(),
            contact_candidates: self.pipeline.contact_candidates().len(),
            contacts: self.pipeline.hit_count(),
            manifolds: self.manifolds.len(),
            impulse_sum: self.pipeline.impulse_sum(),
            length: self.rope.length(),
            status: self.rope.status(),
        };
        self.last_metrics
    }

    /// Releases every manifold the rope holds and hands the rope back.
    pub fn release(mut self, world: &mut W) -> Rope {
        self.manifolds.release_all(world);
        self.rope
    }
}
