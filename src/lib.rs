//! Cable Dynamics – position-based rope simulation against a host rigid-body
//! engine.
//!
//! A [`Rope`] is a chain of point masses joined by inextensible links. Each
//! [`Cable::step`] predicts node motion, projects anchor, link, long-range and
//! bending constraints, resolves collisions against the host's bodies by ray
//! casting, keeps one persistent contact manifold per touched body and
//! finally derives velocities, length and per-anchor tension.
//!
//! The host is reached only through the [`CollisionWorld`] trait;
//! [`world::sandbox::SandboxWorld`] is a small reference implementation.

pub mod cable;
pub mod collision;
pub mod config;
pub mod core;
pub mod dynamics;
pub mod error;
pub mod metrics;
pub mod utils;
pub mod world;

pub use glam::{DMat3, DQuat, DVec3};

pub use cable::Cable;
pub use collision::{CollisionPipeline, ManifoldTracker};
pub use config::{BendingModel, InextensibilityMode, RopeConfig};
pub use self::core::{
    node::{Anchor, Link, Node, NodeData, NodePosition},
    rope::Rope,
    types::{Aabb, CollisionFilter, Transform},
};
pub use error::{RopeError, RopeStatus};
pub use metrics::StepMetrics;
pub use utils::{Arena, Handle};
pub use world::{
    sandbox::{BodyBuilder, SandboxWorld},
    BodyHandle, BodyKind, CollisionWorld, ManifoldHandle, ManifoldPoint, RayHit, RopeHandle,
    ShapeClass,
};
