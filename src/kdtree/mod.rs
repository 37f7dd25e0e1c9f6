//! Median-split kd-trees over surfel bounds

pub mod node;
pub mod config;
pub mod builder;
pub mod streaming;

pub use node::{ChildLink, KdNode, PackedKdNode, PackedStreamingNode, StreamingKdNode};
pub use config::{default_max_depth, KdTreeConfig};
pub use builder::KdTree;
pub use streaming::StreamingKdTree;

use crate::core::types::{Vec3, MAX_PRIMITIVES};
use crate::core::{Error, Result};
use crate::math::{Aabb, Axis};

fn check_primitive_count(count: usize) -> Result<()> {
    if count > MAX_PRIMITIVES {
        log::error!("Too many primitives for one kd-tree: {}", count);
        return Err(Error::TooManyPrimitives { count, limit: MAX_PRIMITIVES });
    }
    Ok(())
}

/// Node ids must fit the 30-bit right child field of a packed monolithic node
pub const MONOLITHIC_NODE_LIMIT: usize = 1 << 30;
/// Global ids must fit the 29-bit left link field of a packed streaming node
pub const STREAMING_NODE_LIMIT: usize = 1 << 29;
/// Leaf counts share their word with the two tag bits
const LEAF_COUNT_LIMIT: u32 = (1 << 30) - 1;

/// Reject trees whose ids or counts would be truncated when packed.
fn check_packed_limits(
    node_count: usize,
    leaf_counts: impl Iterator<Item = u32>,
    primitive_refs: usize,
    node_limit: usize,
) -> Result<()> {
    if node_count > node_limit {
        log::error!("Too many nodes for one kd-tree: {}", node_count);
        return Err(Error::TooManyNodes { count: node_count, limit: node_limit });
    }
    if primitive_refs > u32::MAX as usize {
        log::error!("Too many primitive references for one kd-tree: {}", primitive_refs);
        return Err(Error::TooManyPrimitives { count: primitive_refs, limit: u32::MAX as usize });
    }
    if let Some(count) = leaf_counts.filter(|&c| c > LEAF_COUNT_LIMIT).max() {
        return Err(Error::TooManyPrimitives {
            count: count as usize,
            limit: LEAF_COUNT_LIMIT as usize,
        });
    }
    Ok(())
}

/// Split axis and position for a set of primitive centers.
///
/// The axis is the longest axis of the centers' bounds, the position is the
/// center coordinate at index `n / 2` in sorted order along that axis.
fn median_split(centers: impl Iterator<Item = Vec3>) -> (Axis, f32) {
    let centers: Vec<Vec3> = centers.collect();
    let axis = Aabb::from_points(centers.iter().copied()).longest_axis();

    let mut coords: Vec<f32> = centers.iter().map(|c| c[axis.index()]).collect();
    let mid = coords.len() / 2;
    let (_, median, _) = coords.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    (axis, *median)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median_split_odd() {
        let centers = [1.0f32, 5.0, 3.0, 2.0, 4.0].map(|x| Vec3::new(x, 0.0, 0.0));
        assert_eq!(median_split(centers.into_iter()), (Axis::X, 3.0));
    }

    #[test]
    fn test_median_split_even_takes_upper_middle() {
        let centers = [4.0f32, 1.0, 3.0, 2.0].map(|y| Vec3::new(0.0, y, 0.5));
        assert_eq!(median_split(centers.into_iter()), (Axis::Y, 3.0));
    }

    #[test]
    fn test_packed_limits() {
        assert!(check_packed_limits(STREAMING_NODE_LIMIT, [16, 3].into_iter(), 19, STREAMING_NODE_LIMIT).is_ok());
        assert!(matches!(
            check_packed_limits(STREAMING_NODE_LIMIT + 1, std::iter::empty(), 0, STREAMING_NODE_LIMIT),
            Err(Error::TooManyNodes { .. })
        ));
        assert!(matches!(
            check_packed_limits(MONOLITHIC_NODE_LIMIT + 1, std::iter::empty(), 0, MONOLITHIC_NODE_LIMIT),
            Err(Error::TooManyNodes { .. })
        ));
        assert!(matches!(
            check_packed_limits(1, [1 << 30].into_iter(), 1 << 30, MONOLITHIC_NODE_LIMIT),
            Err(Error::TooManyPrimitives { .. })
        ));
        assert!(matches!(
            check_packed_limits(1, std::iter::empty(), u32::MAX as usize + 1, MONOLITHIC_NODE_LIMIT),
            Err(Error::TooManyPrimitives { .. })
        ));
    }

    #[test]
    fn test_primitive_ceiling() {
        assert!(check_primitive_count(MAX_PRIMITIVES).is_ok());
        assert!(matches!(
            check_primitive_count(MAX_PRIMITIVES + 1),
            Err(Error::TooManyPrimitives { .. })
        ));
    }
}
