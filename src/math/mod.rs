//! Bounding boxes and disk bounds

pub mod aabb;
pub mod surfel_bounds;

pub use aabb::{Aabb, Axis};
pub use surfel_bounds::surfel_bounds;
