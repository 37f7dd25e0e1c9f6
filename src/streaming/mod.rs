//! Fragmented on-disk streaming format
//!
//! Build a streaming kd-tree, cut it into fragments, write one file per
//! fragment plus a manifest.

pub mod fragment;
pub mod disk_io;
pub mod index;

pub use fragment::{extract_fragments, Fragment};
pub use disk_io::{
    deserialize_fragment, fragment_exists, fragment_path, load_fragment, save_fragment,
    save_fragments, serialize_fragment, validate_fragment, HalfSurfel, FRAGMENT_EXTENSION,
};
pub use index::{FragmentEntry, FragmentIndex, MANIFEST_FILENAME};

use std::path::Path;

use crate::core::Result;
use crate::kdtree::{KdTreeConfig, StreamingKdTree};
use crate::surfel::Surfel;

/// Configuration of the streaming pipeline
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingOptions {
    pub tree: KdTreeConfig,
    /// Fragments span `tree_depth / subtree_divisor` levels (at least 1)
    pub subtree_divisor: u32,
}

impl Default for StreamingOptions {
    fn default() -> Self {
        Self {
            tree: KdTreeConfig::streaming(),
            subtree_divisor: 5,
        }
    }
}

impl StreamingOptions {
    pub fn subtree_depth(&self, tree_depth: u32) -> u32 {
        (tree_depth / self.subtree_divisor.max(1)).max(1)
    }
}

/// What a pipeline run produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamingSummary {
    pub surfel_count: usize,
    pub node_count: usize,
    pub tree_depth: u32,
    pub subtree_depth: u32,
    pub fragment_count: usize,
}

/// Build, fragment and write `surfels` into `base_dir`
pub fn write_streaming_surfels(
    base_dir: &Path,
    surfels: Vec<Surfel>,
    options: &StreamingOptions,
) -> Result<StreamingSummary> {
    log::info!("Input surfels: {}", surfels.len());
    let surfel_count = surfels.len();

    let tree = StreamingKdTree::build_with_config(surfels, &options.tree)?;
    let subtree_depth = options.subtree_depth(tree.tree_depth());
    let fragments = extract_fragments(&tree, subtree_depth);

    save_fragments(base_dir, &fragments)?;
    FragmentIndex::from_fragments(&fragments).save(base_dir)?;

    Ok(StreamingSummary {
        surfel_count,
        node_count: tree.node_count(),
        tree_depth: tree.tree_depth(),
        subtree_depth,
        fragment_count: fragments.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdtree::{ChildLink, StreamingKdNode};
    use crate::surfel::test_utils::random_surfels;
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[test]
    fn test_subtree_depth() {
        let options = StreamingOptions::default();
        assert_eq!(options.subtree_depth(10), 2);
        assert_eq!(options.subtree_depth(3), 1);
        assert_eq!(options.subtree_depth(0), 1);
        let halves = StreamingOptions { subtree_divisor: 2, ..Default::default() };
        assert_eq!(halves.subtree_depth(9), 4);
    }

    #[test]
    fn test_pipeline_writes_loadable_dataset() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let dir = temp_dir.path();
        let options = StreamingOptions {
            tree: KdTreeConfig::streaming().with_min_prims(16),
            subtree_divisor: 2,
        };

        let summary = write_streaming_surfels(dir, random_surfels(4000, 41), &options).unwrap();
        assert_eq!(summary.surfel_count, 4000);
        assert!(summary.fragment_count > 1);

        let index = FragmentIndex::load(dir).expect("manifest missing");
        assert_eq!(index.len(), summary.fragment_count);
        assert_eq!(index.node_count() as usize, summary.node_count);

        // Walk the whole dataset through external links, counting leaf surfels
        let mut leaf_surfels = 0;
        let mut visited = HashSet::new();
        for root in index.load_order() {
            let fragment = load_fragment(dir, root).unwrap().expect("fragment file missing");
            assert!(visited.insert(root));
            for node in &fragment.nodes {
                match *node {
                    StreamingKdNode::Leaf { count, .. } => leaf_surfels += count as usize,
                    StreamingKdNode::Interior { left, right, .. } => {
                        for link in [left, right] {
                            if let ChildLink::External(id) = link {
                                assert!(fragment_exists(dir, id));
                                assert_eq!(index.resolve(id).map(|e| e.root_id), Some(id));
                            }
                        }
                    }
                }
            }
        }
        assert_eq!(leaf_surfels, 4000);
    }

    #[test]
    fn test_pipeline_empty_input() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let summary =
            write_streaming_surfels(temp_dir.path(), Vec::new(), &StreamingOptions::default()).unwrap();
        assert_eq!(summary.fragment_count, 1);
        assert_eq!(summary.node_count, 1);

        let root = load_fragment(temp_dir.path(), 0).unwrap().unwrap();
        assert!(root.surfels.is_empty());

        let index = FragmentIndex::load(temp_dir.path()).unwrap();
        assert!(index.entry(0).unwrap().bounds().is_empty());
    }
}
