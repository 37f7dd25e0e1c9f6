//! Decomposition of a streaming kd-tree into depth-bounded fragments
//!
//! Each fragment is a self-contained copy of a slice of the tree: local node,
//! primitive-index and surfel arrays. Links to nodes outside the fragment
//! keep the global node id and are tagged external; every such target is the
//! root of another fragment.

use std::collections::HashSet;

use crate::kdtree::{ChildLink, StreamingKdNode, StreamingKdTree};
use crate::math::Aabb;
use crate::surfel::Surfel;

/// Self-contained slice of a streaming kd-tree
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Global id of the fragment's root node, also its file identifier
    pub root_id: u32,
    /// Region of the root node
    pub bounds: Aabb,
    /// Local nodes in pre-order, root first
    pub nodes: Vec<StreamingKdNode>,
    /// Local indices into `surfels`
    pub primitive_indices: Vec<u32>,
    pub surfels: Vec<Surfel>,
    /// Global node id of each local node. Filled by extraction,
    /// empty for fragments read back from disk.
    pub node_ids: Vec<u32>,
}

impl Fragment {
    /// Global ids of the fragments this one links to
    pub fn external_children(&self) -> Vec<u32> {
        self.nodes
            .iter()
            .filter_map(StreamingKdNode::children)
            .flatten()
            .filter(ChildLink::is_external)
            .map(|link| link.index())
            .collect()
    }

    pub fn is_leaf_fragment(&self) -> bool {
        self.external_children().is_empty()
    }

    /// Surfels of a local leaf, or the LOD surfel of an interior node
    pub fn node_surfels(&self, local: u32) -> Vec<&Surfel> {
        match self.nodes[local as usize] {
            StreamingKdNode::Leaf { count, offset } => self.primitive_indices
                [offset as usize..(offset + count) as usize]
                .iter()
                .map(|&p| &self.surfels[p as usize])
                .collect(),
            StreamingKdNode::Interior { lod_surfel, .. } => vec![&self.surfels[lod_surfel as usize]],
        }
    }
}

/// Cut `tree` into fragments of at most `subtree_depth` levels each.
///
/// Fragments are produced from a stack of pending roots seeded with the tree
/// root (global id 0). The visited node sets of all fragments partition
/// `0..tree.node_count()`. A depth of 0 is treated as 1.
pub fn extract_fragments(tree: &StreamingKdTree, subtree_depth: u32) -> Vec<Fragment> {
    let subtree_depth = if subtree_depth == 0 {
        log::warn!("Subtree depth 0 requested, using 1");
        1
    } else {
        subtree_depth
    };
    log::info!(
        "Tree depth: {}, max subtree depth: {}",
        tree.tree_depth(),
        subtree_depth
    );

    let mut fragments = Vec::new();
    let mut pending = vec![0u32];

    while let Some(root_id) = pending.pop() {
        let mut members = Vec::new();
        let mut next_level = vec![root_id];

        for _ in 0..subtree_depth {
            if next_level.is_empty() {
                break;
            }
            let current_level = std::mem::take(&mut next_level);
            for id in current_level {
                members.push(id);
                if let Some(children) = tree.node(id).children() {
                    next_level.extend(children.iter().map(ChildLink::index));
                }
            }
        }
        // Children past the depth limit start their own fragments
        pending.extend(next_level);

        let fragment = FragmentBuilder::new(tree, &members).finish(root_id);
        log::debug!(
            "Fragment {}: {} nodes, {} surfels, {} external links",
            fragment.root_id,
            fragment.nodes.len(),
            fragment.surfels.len(),
            fragment.external_children().len()
        );
        fragments.push(fragment);
    }

    log::info!("Extracted {} fragments", fragments.len());
    fragments
}

/// Rebuilds the re-indexed local arrays of one fragment
struct FragmentBuilder<'a> {
    tree: &'a StreamingKdTree,
    members: HashSet<u32>,
    nodes: Vec<StreamingKdNode>,
    node_ids: Vec<u32>,
    primitive_indices: Vec<u32>,
    surfels: Vec<Surfel>,
}

impl<'a> FragmentBuilder<'a> {
    fn new(tree: &'a StreamingKdTree, members: &[u32]) -> Self {
        Self {
            tree,
            members: members.iter().copied().collect(),
            nodes: Vec::with_capacity(members.len()),
            node_ids: Vec::with_capacity(members.len()),
            primitive_indices: Vec::new(),
            surfels: Vec::new(),
        }
    }

    fn finish(mut self, root_id: u32) -> Fragment {
        self.rebuild(root_id);
        debug_assert_eq!(self.nodes.len(), self.members.len());
        Fragment {
            root_id,
            bounds: self.tree.node_bounds()[root_id as usize],
            nodes: self.nodes,
            primitive_indices: self.primitive_indices,
            surfels: self.surfels,
            node_ids: self.node_ids,
        }
    }

    /// Copy global node `id` and its in-fragment descendants, returning the
    /// local index it was written at
    fn rebuild(&mut self, id: u32) -> u32 {
        let tree = self.tree;
        let local = self.nodes.len() as u32;
        self.node_ids.push(id);

        match *tree.node(id) {
            StreamingKdNode::Leaf { count, offset } => {
                let local_offset = self.primitive_indices.len() as u32;
                let global_prims = &tree.primitive_indices()[offset as usize..(offset + count) as usize];
                for &p in global_prims {
                    self.primitive_indices.push(self.surfels.len() as u32);
                    self.surfels.push(tree.surfels()[p as usize]);
                }
                self.nodes.push(StreamingKdNode::Leaf { count, offset: local_offset });
            }
            StreamingKdNode::Interior { axis, split_pos, lod_surfel, left, right } => {
                let local_lod = self.surfels.len() as u32;
                self.surfels.push(tree.surfels()[lod_surfel as usize]);
                // placeholder until the children are placed
                self.nodes.push(StreamingKdNode::Leaf { count: 0, offset: 0 });

                let left = self.relink(left);
                let right = self.relink(right);
                self.nodes[local as usize] = StreamingKdNode::Interior {
                    axis,
                    split_pos,
                    lod_surfel: local_lod,
                    left,
                    right,
                };
            }
        }
        local
    }

    fn relink(&mut self, link: ChildLink) -> ChildLink {
        let id = link.index();
        if self.members.contains(&id) {
            ChildLink::Internal(self.rebuild(id))
        } else {
            ChildLink::External(id)
        }
    }
}
