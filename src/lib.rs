//! Surfkd - streaming LOD kd-trees for surfel (oriented disk splat) datasets
//!
//! Data flows one way: a flat list of [`Surfel`]s is indexed by a
//! [`StreamingKdTree`], cut into depth-bounded [`Fragment`]s and persisted as
//! one file per fragment.

pub mod core;
pub mod math;
pub mod surfel;
pub mod kdtree;
pub mod streaming;

pub use crate::core::{Error, Result};
pub use kdtree::{KdTree, KdTreeConfig, StreamingKdTree};
pub use math::{Aabb, Axis};
pub use streaming::{Fragment, FragmentIndex, StreamingOptions};
pub use surfel::Surfel;
