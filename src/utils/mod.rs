//! Utility helpers: math extensions, handle allocation, logging and profiling.

pub mod allocator;
pub mod logging;
pub mod math;
pub mod profiling;

pub use allocator::{Arena, GenerationalIndex, Handle};
pub use math::*;
