//! Core rope data: nodes, links, anchors and the shared geometric types.

pub mod node;
pub mod rope;
pub mod types;

pub use node::{Anchor, Link, Node, NodeData, NodePosition};
pub use rope::Rope;
pub use types::{Aabb, CollisionFilter, Transform};
