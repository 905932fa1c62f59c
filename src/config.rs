//! Tunables for the rope solver: defaults and the per-rope configuration.

use serde::{Deserialize, Serialize};

use crate::{core::types::CollisionFilter, error::RopeError};

/// Outer constraint iterations performed per step.
pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;

/// Sweeps of the narrow-phase resolution per collision pass.
pub const DEFAULT_COLLISION_SUBSTEPS: u32 = 3;

/// A collision pass runs on every iteration whose index is a multiple of this.
pub const DEFAULT_COLLISION_INTERVAL: u32 = 2;

/// Radius of a rope node; also the rope's collision margin.
pub const DEFAULT_NODE_RADIUS: f64 = 0.02;

/// Extra padding added to the swept node box during narrowing.
pub const DEFAULT_BROADPHASE_MARGIN: f64 = 0.05;

/// Stored margin of a sphere is its radius, so spheres use this skin instead.
pub const SPHERE_CONTACT_MARGIN: f64 = 0.01;

/// Distance a resolved node is pushed off the surface along the hit normal.
pub const DEFAULT_CORRECTION_OFFSET: f64 = 0.005;

/// Ray start is retracted this far against the direction of travel.
pub const DEFAULT_RAY_SAFETY_MARGIN: f64 = 0.01;

/// Node travel at or below this distance skips the ray cast.
pub const DEFAULT_SLEEPING_THRESHOLD: f64 = 1e-4;

/// Positional bias applied by the anchor constraint.
pub const DEFAULT_ANCHOR_HARDNESS: f64 = 0.7;

/// Scale of the push a contact gives a dynamic body.
pub const DEFAULT_CONTACT_HARDNESS: f64 = 1.0;

pub const DEFAULT_BENDING_STIFFNESS: f64 = 0.1;

/// Bend angle (radians) above which bending stiffness is scaled down.
pub const DEFAULT_MAX_BEND_ANGLE: f64 = std::f64::consts::FRAC_PI_4;

/// Which bending formulation the solver projects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BendingModel {
    /// Pulls each interior node toward the chord of its neighbours.
    #[default]
    DistanceProjection,
    /// Drives the dihedral angle of two virtual triangles to zero.
    Dihedral,
}

/// How overall inextensibility is enforced on top of the link constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InextensibilityMode {
    /// Long-range attachments measured from a single root node.
    #[default]
    Global,
    /// Neighbour-to-neighbour clamping walking outward from every anchor.
    PerAnchor,
    /// Forward/backward reaching from every anchor.
    Fabrik,
}

/// Per-rope solver configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RopeConfig {
    pub iterations: u32,
    pub collision_substeps: u32,
    pub collision_interval: u32,

    pub use_gravity: bool,
    pub use_collision: bool,
    pub use_bending: bool,
    pub use_inextensibility: bool,
    pub use_external_forces: bool,

    pub bending_model: BendingModel,
    pub bending_stiffness: f64,
    pub max_bend_angle: f64,
    pub inextensibility: InextensibilityMode,

    pub node_radius: f64,
    pub broadphase_margin: f64,
    pub correction_offset: f64,
    pub ray_safety_margin: f64,
    pub sleeping_threshold: f64,

    pub anchor_hardness: f64,
    /// Only dynamic bodies are pushed; static and kinematic ones never move.
    pub contact_hardness: f64,

    /// Fraction of the derived velocity removed each step, in `[0, 1]`.
    pub damping: f64,
    pub timescale: f64,
    /// Warn when a step takes longer than this many milliseconds (0 disables).
    pub step_budget_ms: f64,
    pub collision_filter: CollisionFilter,
}

impl Default for RopeConfig {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_SOLVER_ITERATIONS,
            collision_substeps: DEFAULT_COLLISION_SUBSTEPS,
            collision_interval: DEFAULT_COLLISION_INTERVAL,
            use_gravity: true,
            use_collision: true,
            use_bending: false,
            use_inextensibility: true,
            use_external_forces: false,
            bending_model: BendingModel::default(),
            bending_stiffness: DEFAULT_BENDING_STIFFNESS,
            max_bend_angle: DEFAULT_MAX_BEND_ANGLE,
            inextensibility: InextensibilityMode::default(),
            node_radius: DEFAULT_NODE_RADIUS,
            broadphase_margin: DEFAULT_BROADPHASE_MARGIN,
            correction_offset: DEFAULT_CORRECTION_OFFSET,
            ray_safety_margin: DEFAULT_RAY_SAFETY_MARGIN,
            sleeping_threshold: DEFAULT_SLEEPING_THRESHOLD,
            anchor_hardness: DEFAULT_ANCHOR_HARDNESS,
            contact_hardness: DEFAULT_CONTACT_HARDNESS,
            damping: 0.0,
            timescale: 1.0,
            step_budget_ms: 0.0,
            collision_filter: CollisionFilter::default(),
        }
    }
}

impl RopeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_collision_substeps(mut self, substeps: u32) -> Self {
        self.collision_substeps = substeps;
        self
    }

    pub fn with_collision_interval(mut self, interval: u32) -> Self {
        self.collision_interval = interval.max(1);
        self
    }

    pub fn with_gravity(mut self, enabled: bool) -> Self {
        self.use_gravity = enabled;
        self
    }

    pub fn with_collision(mut self, enabled: bool) -> Self {
        self.use_collision = enabled;
        self
    }

    pub fn with_bending(mut self, model: BendingModel, stiffness: f64, max_angle: f64) -> Self {
        self.use_bending = true;
        self.bending_model = model;
        self.bending_stiffness = stiffness;
        self.max_bend_angle = max_angle;
        self
    }

    pub fn with_inextensibility(mut self, mode: InextensibilityMode) -> Self {
        self.use_inextensibility = true;
        self.inextensibility = mode;
        self
    }

    pub fn without_inextensibility(mut self) -> Self {
        self.use_inextensibility = false;
        self
    }

    pub fn with_external_forces(mut self, enabled: bool) -> Self {
        self.use_external_forces = enabled;
        self
    }

    pub fn with_node_radius(mut self, radius: f64) -> Self {
        self.node_radius = radius;
        self
    }

    pub fn with_margins(mut self, broadphase: f64, correction: f64, ray_safety: f64) -> Self {
        self.broadphase_margin = broadphase;
        self.correction_offset = correction;
        self.ray_safety_margin = ray_safety;
        self
    }

    pub fn with_sleeping_threshold(mut self, threshold: f64) -> Self {
        self.sleeping_threshold = threshold;
        self
    }

    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    pub fn with_contact_hardness(mut self, hardness: f64) -> Self {
        self.contact_hardness = hardness;
        self
    }

    pub fn with_collision_filter(mut self, layer: u32, mask: u32) -> Self {
        self.collision_filter = CollisionFilter::new(layer, mask);
        self
    }

    /// Checks the ranges the solver relies on.
    pub fn validate(&self) -> Result<(), RopeError> {
        if self.iterations == 0 {
            return Err(RopeError::InvalidConfig("iterations must be at least 1"));
        }
        if self.collision_interval == 0 {
            return Err(RopeError::InvalidConfig("collision interval must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.damping) {
            return Err(RopeError::InvalidConfig("damping must lie in [0, 1]"));
        }
        if !(self.timescale.is_finite() && self.timescale > 0.0) {
            return Err(RopeError::InvalidConfig("timescale must be positive"));
        }
        let margins = [
            self.node_radius,
            self.broadphase_margin,
            self.correction_offset,
            self.ray_safety_margin,
            self.sleeping_threshold,
        ];
        if margins.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(RopeError::InvalidConfig("margins must be finite and non-negative"));
        }
        if !(self.bending_stiffness.is_finite() && self.bending_stiffness >= 0.0) {
            return Err(RopeError::InvalidConfig("bending stiffness must be non-negative"));
        }
        if !(self.max_bend_angle.is_finite() && self.max_bend_angle >= 0.0) {
            return Err(RopeError::InvalidConfig("max bend angle must be non-negative"));
        }
        if !(self.contact_hardness.is_finite() && self.contact_hardness >= 0.0) {
            return Err(RopeError::InvalidConfig("contact hardness must be non-negative"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(RopeConfig::default().validate().is_ok());
    }

    #[test]
    fn builder_rejects_bad_ranges() {
        let config = RopeConfig::new().with_iterations(0);
        assert_eq!(
            config.validate(),
            Err(RopeError::InvalidConfig("iterations must be at least 1"))
        );
        assert!(RopeConfig::new().with_damping(1.5).validate().is_err());
        assert!(RopeConfig::new().with_node_radius(-0.1).validate().is_err());
    }

    #[test]
    fn builder_sets_switches() {
        let config = RopeConfig::new()
            .with_bending(BendingModel::Dihedral, 0.5, 0.3)
            .with_inextensibility(InextensibilityMode::PerAnchor)
            .with_collision(false)
            .with_collision_interval(0);
        assert!(config.use_bending);
        assert_eq!(config.bending_model, BendingModel::Dihedral);
        assert_eq!(config.inextensibility, InextensibilityMode::PerAnchor);
        assert!(!config.use_collision);
        assert_eq!(config.collision_interval, 1);
    }
}
