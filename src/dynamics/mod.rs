//! Rope dynamics: motion prediction and the positional constraint solver.

pub mod bending;
pub mod constraints;
pub mod predictor;
pub mod solver;

pub use predictor::predict_motion;
pub use solver::ConstraintSolver;
