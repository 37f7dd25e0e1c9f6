//! Monolithic median-split kd-tree over primitive bounding boxes
//!
//! Primitives straddling a split plane are replicated into both children,
//! so every primitive is reachable from every leaf region it overlaps. This
//! makes the tree usable for exact box queries.

use super::config::KdTreeConfig;
use super::node::KdNode;
use super::{check_packed_limits, check_primitive_count, median_split, MONOLITHIC_NODE_LIMIT};
use crate::core::Result;
use crate::math::Aabb;

/// Kd-tree built once over a static list of boxes (index = primitive id).
///
/// Nodes are stored in pre-order: an interior node's left child is always
/// the next node in the array, the right child is referenced explicitly.
#[derive(Debug, Clone)]
pub struct KdTree {
    bounds: Vec<Aabb>,
    nodes: Vec<KdNode>,
    primitive_indices: Vec<u32>,
    tree_bounds: Aabb,
    max_depth: u32,
    min_prims: usize,
}

impl KdTree {
    /// Build with the monolithic defaults
    pub fn build(bounds: Vec<Aabb>) -> Result<Self> {
        Self::build_with_config(bounds, &KdTreeConfig::monolithic())
    }

    pub fn build_with_config(bounds: Vec<Aabb>, config: &KdTreeConfig) -> Result<Self> {
        check_primitive_count(bounds.len())?;

        let mut tree_bounds = Aabb::EMPTY;
        for b in &bounds {
            tree_bounds.union(b);
        }

        let mut tree = Self {
            max_depth: config.max_depth_for(bounds.len()),
            min_prims: config.min_prims,
            bounds,
            nodes: Vec::new(),
            primitive_indices: Vec::new(),
            tree_bounds,
        };

        let contained: Vec<u32> = (0..tree.bounds.len() as u32).collect();
        tree.build_node(&contained, 0);
        check_packed_limits(
            tree.nodes.len(),
            tree.nodes.iter().filter_map(|n| match *n {
                KdNode::Leaf { count, .. } => Some(count),
                KdNode::Interior { .. } => None,
            }),
            tree.primitive_indices.len(),
            MONOLITHIC_NODE_LIMIT,
        )?;

        log::debug!(
            "Built kd-tree: {} primitives, {} nodes, {} primitive references",
            tree.bounds.len(),
            tree.nodes.len(),
            tree.primitive_indices.len()
        );
        Ok(tree)
    }

    /// Reconstruct from decoded file contents. `bounds` are the primitive
    /// boxes, needed by `query`.
    pub fn from_parts(
        bounds: Vec<Aabb>,
        tree_bounds: Aabb,
        nodes: Vec<KdNode>,
        primitive_indices: Vec<u32>,
    ) -> Self {
        let config = KdTreeConfig::monolithic();
        Self {
            max_depth: config.max_depth_for(bounds.len()),
            min_prims: config.min_prims,
            bounds,
            nodes,
            primitive_indices,
            tree_bounds,
        }
    }

    /// Returns the index the node was written at
    fn build_node(&mut self, contained: &[u32], depth: u32) -> u32 {
        if depth >= self.max_depth || contained.len() <= self.min_prims {
            let node = KdNode::Leaf {
                count: contained.len() as u32,
                offset: self.primitive_indices.len() as u32,
            };
            self.primitive_indices.extend_from_slice(contained);
            let index = self.nodes.len() as u32;
            self.nodes.push(node);
            return index;
        }

        let (axis, split_pos) = median_split(contained.iter().map(|&p| self.bounds[p as usize].center()));
        let a = axis.index();

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &p in contained {
            let b = &self.bounds[p as usize];
            if b.lower[a] <= split_pos {
                left.push(p);
            }
            if b.upper[a] >= split_pos {
                right.push(p);
            }
        }

        let index = self.nodes.len() as u32;
        self.nodes.push(KdNode::Interior { axis, split_pos, right_child: 0 });

        self.build_node(&left, depth + 1);
        let right_index = self.build_node(&right, depth + 1);
        if let KdNode::Interior { right_child, .. } = &mut self.nodes[index as usize] {
            *right_child = right_index;
        }
        index
    }

    pub fn nodes(&self) -> &[KdNode] {
        &self.nodes
    }

    pub fn primitive_indices(&self) -> &[u32] {
        &self.primitive_indices
    }

    /// Bounds of all primitives
    pub fn bounds(&self) -> Aabb {
        self.tree_bounds
    }

    pub fn primitive_bounds(&self) -> &[Aabb] {
        &self.bounds
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    /// Primitive ids of a leaf
    pub fn leaf_primitives(&self, node: &KdNode) -> &[u32] {
        match *node {
            KdNode::Leaf { count, offset } => {
                &self.primitive_indices[offset as usize..(offset + count) as usize]
            }
            KdNode::Interior { .. } => &[],
        }
    }

    /// Every leaf index paired with its region (the tree bounds clipped by
    /// the split planes on the path from the root)
    pub fn leaf_regions(&self) -> Vec<(u32, Aabb)> {
        let mut leaves = Vec::new();
        self.walk(|_| true, |index, region| leaves.push((index, region)));
        leaves
    }

    /// Ids of every primitive whose box overlaps `query`, sorted
    pub fn query(&self, query: &Aabb) -> Vec<u32> {
        let mut hits = Vec::new();
        self.walk(
            |region| region.overlaps(query),
            |index, _| {
                for &p in self.leaf_primitives(&self.nodes[index as usize]) {
                    if self.bounds[p as usize].overlaps(query) {
                        hits.push(p);
                    }
                }
            },
        );
        hits.sort_unstable();
        hits.dedup();
        hits
    }

    /// Explicit-stack traversal descending into regions accepted by `visit`
    fn walk(&self, mut visit: impl FnMut(&Aabb) -> bool, mut on_leaf: impl FnMut(u32, Aabb)) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![(0u32, self.tree_bounds)];
        while let Some((index, region)) = stack.pop() {
            if !visit(&region) {
                continue;
            }
            match self.nodes[index as usize] {
                KdNode::Leaf { .. } => on_leaf(index, region),
                KdNode::Interior { axis, split_pos, right_child } => {
                    let (left, right) = region.split(axis, split_pos);
                    stack.push((right_child, right));
                    stack.push((index + 1, left));
                }
            }
        }
    }
}
