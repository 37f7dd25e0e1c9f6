//! LOD-aware median-split kd-tree for progressive display
//!
//! Each surfel lands in exactly one leaf, chosen by its box center. Every
//! interior node gets an averaged LOD surfel appended to the surfel array,
//! so a renderer can stop at any node and still draw something.

use super::config::KdTreeConfig;
use super::node::{ChildLink, StreamingKdNode};
use super::{check_packed_limits, check_primitive_count, median_split, STREAMING_NODE_LIMIT};
use crate::core::Result;
use crate::core::types::Vec3;
use crate::math::Aabb;
use crate::surfel::Surfel;

/// Streaming kd-tree over surfels.
///
/// Layout contract:
/// - `nodes` are in pre-order; an interior node at `i` has its left child at
///   `i + 1`, and both links are stored as `ChildLink::Internal` global ids.
/// - `surfels[..original_count]` are the input surfels, followed by one LOD
///   surfel per interior node.
/// - `node_bounds[i]` is the region of node `i`.
/// - `primitive_indices` only ever reference input surfels.
#[derive(Debug, Clone)]
pub struct StreamingKdTree {
    surfels: Vec<Surfel>,
    original_count: usize,
    bounds: Vec<Aabb>,
    nodes: Vec<StreamingKdNode>,
    primitive_indices: Vec<u32>,
    node_bounds: Vec<Aabb>,
    tree_bounds: Aabb,
    max_depth: u32,
    min_prims: usize,
    tree_depth: u32,
    num_interior: usize,
    depth_limited_leaves: usize,
}

impl StreamingKdTree {
    /// Build with the streaming defaults
    pub fn build(surfels: Vec<Surfel>) -> Result<Self> {
        Self::build_with_config(surfels, &KdTreeConfig::streaming())
    }

    pub fn build_with_config(surfels: Vec<Surfel>, config: &KdTreeConfig) -> Result<Self> {
        check_primitive_count(surfels.len())?;

        let bounds: Vec<Aabb> = surfels.iter().map(Surfel::bounds).collect();
        let mut tree_bounds = Aabb::EMPTY;
        for b in &bounds {
            tree_bounds.union(b);
        }

        let mut tree = Self {
            original_count: surfels.len(),
            max_depth: config.max_depth_for(surfels.len()),
            min_prims: config.min_prims,
            surfels,
            bounds,
            nodes: Vec::new(),
            primitive_indices: Vec::new(),
            node_bounds: Vec::new(),
            tree_bounds,
            tree_depth: 0,
            num_interior: 0,
            depth_limited_leaves: 0,
        };

        log::debug!("Tree bounds: {}", tree_bounds);
        let contained: Vec<u32> = (0..tree.original_count as u32).collect();
        tree.build_node(tree_bounds, &contained, 0);
        check_packed_limits(
            tree.nodes.len(),
            tree.nodes.iter().filter_map(|n| match *n {
                StreamingKdNode::Leaf { count, .. } => Some(count),
                StreamingKdNode::Interior { .. } => None,
            }),
            tree.primitive_indices.len(),
            STREAMING_NODE_LIMIT,
        )?;

        if tree.depth_limited_leaves > 0 {
            log::warn!(
                "{} leaves hit the depth limit of {}",
                tree.depth_limited_leaves, tree.max_depth
            );
        }
        log::info!(
            "Built streaming kd-tree: {} surfels, {} nodes ({} interior), depth {}",
            tree.original_count,
            tree.nodes.len(),
            tree.num_interior,
            tree.tree_depth
        );
        Ok(tree)
    }

    /// Returns the index the node was written at
    fn build_node(&mut self, node_bounds: Aabb, contained: &[u32], depth: u32) -> u32 {
        self.tree_depth = self.tree_depth.max(depth);

        if depth >= self.max_depth || contained.len() <= self.min_prims {
            if depth >= self.max_depth && contained.len() > self.min_prims {
                self.depth_limited_leaves += 1;
            }
            let node = StreamingKdNode::Leaf {
                count: contained.len() as u32,
                offset: self.primitive_indices.len() as u32,
            };
            self.primitive_indices.extend_from_slice(contained);
            return self.push_node(node, node_bounds);
        }

        let (axis, split_pos) = median_split(contained.iter().map(|&p| self.bounds[p as usize].center()));
        let (left_bounds, right_bounds) = node_bounds.split(axis, split_pos);

        let (left, right): (Vec<u32>, Vec<u32>) = contained
            .iter()
            .copied()
            .partition(|&p| self.bounds[p as usize].center()[axis.index()] <= split_pos);

        let lod_surfel = self.surfels.len() as u32;
        let lod = lod_surfel_for(contained, &self.surfels, &node_bounds);
        self.surfels.push(lod);
        self.num_interior += 1;

        let index = self.push_node(
            StreamingKdNode::Interior {
                axis,
                split_pos,
                lod_surfel,
                left: ChildLink::Internal(0),
                right: ChildLink::Internal(0),
            },
            node_bounds,
        );

        let left_index = self.build_node(left_bounds, &left, depth + 1);
        let right_index = self.build_node(right_bounds, &right, depth + 1);
        debug_assert_eq!(left_index, index + 1);

        if let StreamingKdNode::Interior { left, right, .. } = &mut self.nodes[index as usize] {
            *left = ChildLink::Internal(left_index);
            *right = ChildLink::Internal(right_index);
        }
        index
    }

    fn push_node(&mut self, node: StreamingKdNode, bounds: Aabb) -> u32 {
        let index = self.nodes.len() as u32;
        self.nodes.push(node);
        self.node_bounds.push(bounds);
        index
    }

    pub fn nodes(&self) -> &[StreamingKdNode] {
        &self.nodes
    }

    pub fn node(&self, id: u32) -> &StreamingKdNode {
        &self.nodes[id as usize]
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Input surfels followed by the synthesized LOD surfels
    pub fn surfels(&self) -> &[Surfel] {
        &self.surfels
    }

    /// Number of input surfels
    pub fn original_count(&self) -> usize {
        self.original_count
    }

    pub fn primitive_indices(&self) -> &[u32] {
        &self.primitive_indices
    }

    /// Region of every node, parallel to `nodes`
    pub fn node_bounds(&self) -> &[Aabb] {
        &self.node_bounds
    }

    pub fn bounds(&self) -> Aabb {
        self.tree_bounds
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn min_prims(&self) -> usize {
        self.min_prims
    }

    /// Deepest level actually reached (root = 0)
    pub fn tree_depth(&self) -> u32 {
        self.tree_depth
    }

    pub fn interior_count(&self) -> usize {
        self.num_interior
    }

    /// Primitive ids of a leaf
    pub fn leaf_primitives(&self, node: &StreamingKdNode) -> &[u32] {
        match *node {
            StreamingKdNode::Leaf { count, offset } => {
                &self.primitive_indices[offset as usize..(offset + count) as usize]
            }
            StreamingKdNode::Interior { .. } => &[],
        }
    }
}

/// Mean position, normal and color of the contained surfels. The normal is
/// left unnormalized. The radius is half of the node region's largest extent.
fn lod_surfel_for(contained: &[u32], surfels: &[Surfel], node_bounds: &Aabb) -> Surfel {
    let mut position = Vec3::ZERO;
    let mut normal = Vec3::ZERO;
    let mut color = Vec3::ZERO;
    for &p in contained {
        let s = &surfels[p as usize];
        position += s.position;
        normal += s.normal;
        color += s.color;
    }
    let n = contained.len() as f32;
    let radius = node_bounds.size().max_element() * 0.5;
    Surfel::new(position / n, normal / n, radius, color / n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surfel::test_utils::random_surfels;

    #[test]
    fn test_empty_input_is_single_leaf() {
        let tree = StreamingKdTree::build(Vec::new()).unwrap();
        assert_eq!(tree.nodes(), &[StreamingKdNode::Leaf { count: 0, offset: 0 }]);
        assert_eq!(tree.node_bounds().len(), 1);
        assert_eq!(tree.tree_depth(), 0);
        assert!(tree.surfels().is_empty());
    }

    #[test]
    fn test_unique_partition() {
        let n = 5000;
        let tree = StreamingKdTree::build(random_surfels(n, 7)).unwrap();

        let mut seen = vec![false; n];
        for node in tree.nodes() {
            for &p in tree.leaf_primitives(node) {
                assert!((p as usize) < n, "LOD surfel {p} referenced by a leaf");
                assert!(!seen[p as usize], "surfel {p} in two leaves");
                seen[p as usize] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
        assert_eq!(tree.primitive_indices().len(), n);
    }

    #[test]
    fn test_lod_surfel_per_interior_node() {
        let tree = StreamingKdTree::build(random_surfels(2000, 8)).unwrap();
        assert_eq!(tree.surfels().len(), tree.original_count() + tree.interior_count());
        assert_eq!(tree.node_bounds().len(), tree.node_count());

        for (i, node) in tree.nodes().iter().enumerate() {
            if let StreamingKdNode::Interior { lod_surfel, left, right, .. } = *node {
                assert!(lod_surfel as usize >= tree.original_count());
                assert_eq!(left, ChildLink::Internal(i as u32 + 1));
                assert!(right.index() as usize > i + 1);

                let lod = &tree.surfels()[lod_surfel as usize];
                let extent = tree.node_bounds()[i].size().max_element();
                assert!((lod.radius - extent * 0.5).abs() < 1e-6);
                let region = tree.node_bounds()[i];
                let slack = Vec3::splat(1e-4);
                assert!(Aabb::new(region.lower - slack, region.upper + slack).contains_point(lod.position));
            }
        }
    }

    #[test]
    fn test_lod_surfel_is_mean() {
        let surfels: Vec<Surfel> = (0..4)
            .map(|i| {
                let x = i as f32;
                Surfel::new(Vec3::new(x, 0.0, 0.0), Vec3::Z, 0.1, Vec3::new(x / 4.0, 0.5, 1.0))
            })
            .collect();
        let config = KdTreeConfig::streaming().with_min_prims(1);
        let tree = StreamingKdTree::build_with_config(surfels, &config).unwrap();

        let StreamingKdNode::Interior { lod_surfel, .. } = tree.nodes()[0] else {
            panic!("root should be interior");
        };
        let lod = tree.surfels()[lod_surfel as usize];
        assert_eq!(lod.position, Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(lod.normal, Vec3::Z);
        assert!((lod.color - Vec3::new(0.375, 0.5, 1.0)).length() < 1e-6);
    }

    #[test]
    fn test_unit_cube_scenario() {
        let tree = StreamingKdTree::build(random_surfels(1024, 9)).unwrap();
        assert_eq!(tree.max_depth(), 21);
        for node in tree.nodes() {
            if let StreamingKdNode::Leaf { count, .. } = *node {
                assert!(count as usize <= tree.min_prims());
            }
        }
        assert!(tree.tree_depth() >= 3);
    }

    #[test]
    fn test_depth_limit() {
        // identical surfels can never be separated
        let surfels = vec![Surfel::default(); 300];
        let config = KdTreeConfig { min_prims: 8, max_depth: Some(4) };
        let tree = StreamingKdTree::build_with_config(surfels, &config).unwrap();
        assert_eq!(tree.tree_depth(), 4);
        let total: usize = tree.nodes().iter().map(|n| tree.leaf_primitives(n).len()).sum();
        assert_eq!(total, 300);
    }
}
