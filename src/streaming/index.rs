//! Fragment lookup index and manifest
//!
//! External links in a fragment carry a global node id. The index maps those
//! ids to the fragment that owns them, and records the dependency DAG
//! between fragment files. It is persisted as JSON next to the fragments so
//! a loader can inspect a dataset without opening every file.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};

use super::disk_io::fragment_path;
use super::fragment::Fragment;
use crate::core::{Error, Result};
use crate::math::Aabb;

const MANIFEST_VERSION: u32 = 1;
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// Summary of one fragment file
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FragmentEntry {
    pub root_id: u32,
    /// `lower.xyz, upper.xyz`; `None` when any component is non-finite
    /// (empty fragments, NaN input), since JSON cannot hold those values
    pub bounds: Option<[f32; 6]>,
    pub node_count: u32,
    pub primitive_count: u32,
    pub surfel_count: u32,
    /// Root ids of the fragments this one links to
    pub children: Vec<u32>,
}

impl FragmentEntry {
    fn from_fragment(fragment: &Fragment) -> Self {
        let mut children = fragment.external_children();
        children.sort_unstable();
        Self {
            root_id: fragment.root_id,
            bounds: fragment.bounds.is_finite().then(|| fragment.bounds.to_array()),
            node_count: fragment.nodes.len() as u32,
            primitive_count: fragment.primitive_indices.len() as u32,
            surfel_count: fragment.surfels.len() as u32,
            children,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds.map(Aabb::from_array).unwrap_or(Aabb::EMPTY)
    }
}

/// Manifest file data
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Manifest {
    version: u32,
    node_count: u32,
    fragments: Vec<FragmentEntry>,
}

/// Lookup table from global node ids to fragments
#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    /// Entries keyed by fragment root id
    entries: BTreeMap<u32, FragmentEntry>,
    /// Owning fragment of every global node id. Only available when built
    /// from extracted fragments.
    owners: HashMap<u32, u32>,
    node_count: u32,
}

impl FragmentIndex {
    /// Build once all fragments of a tree are final
    pub fn from_fragments(fragments: &[Fragment]) -> Self {
        let mut index = Self::default();
        for fragment in fragments {
            for &id in &fragment.node_ids {
                index.owners.insert(id, fragment.root_id);
            }
            index.node_count += fragment.nodes.len() as u32;
            index.entries.insert(fragment.root_id, FragmentEntry::from_fragment(fragment));
        }
        index
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total nodes across all fragments
    pub fn node_count(&self) -> u32 {
        self.node_count
    }

    pub fn entry(&self, root_id: u32) -> Option<&FragmentEntry> {
        self.entries.get(&root_id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &FragmentEntry> {
        self.entries.values()
    }

    /// Root id of the fragment holding global node `node_id`
    pub fn owner_of(&self, node_id: u32) -> Option<u32> {
        if let Some(&owner) = self.owners.get(&node_id) {
            return Some(owner);
        }
        // External link targets are always fragment roots
        self.entries.contains_key(&node_id).then_some(node_id)
    }

    /// Fragment an external link points into
    pub fn resolve(&self, link_target: u32) -> Option<&FragmentEntry> {
        self.owner_of(link_target).and_then(|root| self.entries.get(&root))
    }

    /// File holding an external link's target
    pub fn resolve_path(&self, base_dir: &Path, link_target: u32) -> Option<PathBuf> {
        self.resolve(link_target).map(|e| fragment_path(base_dir, e.root_id))
    }

    /// Fragments directly referenced by `root_id`
    pub fn dependencies(&self, root_id: u32) -> &[u32] {
        self.entries.get(&root_id).map(|e| e.children.as_slice()).unwrap_or(&[])
    }

    /// Fragment roots in coarse-to-fine order, starting at the tree root
    pub fn load_order(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.entries.len());
        let mut queue = VecDeque::new();
        if self.entries.contains_key(&0) {
            queue.push_back(0);
        }
        while let Some(root) = queue.pop_front() {
            order.push(root);
            queue.extend(self.dependencies(root).iter().copied());
        }
        order
    }

    /// Write `manifest.json` into `base_dir`
    pub fn save(&self, base_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(base_dir)?;
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            node_count: self.node_count,
            fragments: self.entries.values().cloned().collect(),
        };
        let path = base_dir.join(MANIFEST_FILENAME);
        fs::write(&path, serde_json::to_string_pretty(&manifest)?)?;
        Ok(path)
    }

    /// Read `manifest.json` from `base_dir`
    pub fn load(base_dir: &Path) -> Result<Self> {
        let path = base_dir.join(MANIFEST_FILENAME);
        let manifest: Manifest = serde_json::from_str(&fs::read_to_string(&path)?)?;
        if manifest.version != MANIFEST_VERSION {
            return Err(Error::format(format!(
                "unsupported manifest version {} in {}",
                manifest.version,
                path.display()
            )));
        }
        Ok(Self {
            entries: manifest.fragments.into_iter().map(|e| (e.root_id, e)).collect(),
            owners: HashMap::new(),
            node_count: manifest.node_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kdtree::{KdTreeConfig, StreamingKdTree};
    use crate::streaming::fragment::extract_fragments;
    use crate::surfel::test_utils::random_surfels;
    use crate::surfel::Surfel;
    use tempfile::TempDir;

    fn build(depth: u32) -> (StreamingKdTree, Vec<Fragment>) {
        build_from(random_surfels(3000, 31), depth)
    }

    fn build_from(surfels: Vec<Surfel>, depth: u32) -> (StreamingKdTree, Vec<Fragment>) {
        let config = KdTreeConfig::streaming().with_min_prims(32);
        let tree = StreamingKdTree::build_with_config(surfels, &config).unwrap();
        let fragments = extract_fragments(&tree, depth);
        (tree, fragments)
    }

    #[test]
    fn test_owner_of_every_node() {
        let (tree, fragments) = build(3);
        let index = FragmentIndex::from_fragments(&fragments);
        assert_eq!(index.node_count() as usize, tree.node_count());

        for f in &fragments {
            for &id in &f.node_ids {
                assert_eq!(index.owner_of(id), Some(f.root_id));
            }
        }
    }

    #[test]
    fn test_external_links_resolve() {
        let (_, fragments) = build(3);
        let index = FragmentIndex::from_fragments(&fragments);

        for f in &fragments {
            for target in f.external_children() {
                let entry = index.resolve(target).expect("dangling external link");
                assert_eq!(entry.root_id, target);
            }
        }
    }

    #[test]
    fn test_load_order_reaches_every_fragment_once() {
        let (_, fragments) = build(2);
        let index = FragmentIndex::from_fragments(&fragments);
        let mut order = index.load_order();
        assert_eq!(order[0], 0);
        order.sort_unstable();
        let mut roots: Vec<u32> = fragments.iter().map(|f| f.root_id).collect();
        roots.sort_unstable();
        assert_eq!(order, roots);
    }

    #[test]
    fn test_dependencies_point_deeper() {
        let (_, fragments) = build(2);
        let index = FragmentIndex::from_fragments(&fragments);
        for entry in index.entries() {
            for &child in index.dependencies(entry.root_id) {
                assert!(child > entry.root_id);
            }
        }
    }

    #[test]
    fn test_manifest_roundtrip() {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let (_, fragments) = build(3);
        let index = FragmentIndex::from_fragments(&fragments);
        index.save(temp_dir.path()).expect("save failed");

        let loaded = FragmentIndex::load(temp_dir.path()).expect("load failed");
        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.node_count(), index.node_count());
        assert_eq!(loaded.load_order(), index.load_order());
        for entry in index.entries() {
            assert_eq!(loaded.entry(entry.root_id), Some(entry));
        }
        // roots still resolve without the owner table
        for f in &fragments {
            assert_eq!(loaded.owner_of(f.root_id), Some(f.root_id));
        }
        assert_eq!(
            loaded.resolve_path(temp_dir.path(), 0),
            Some(temp_dir.path().join("0.srsf"))
        );
    }

    #[test]
    fn test_nan_surfel_manifest_round_trip() {
        let mut surfels = random_surfels(10, 33);
        surfels[4].position.x = f32::NAN;
        let (_, fragments) = build_from(surfels, 2);

        let dir = TempDir::new().unwrap();
        let index = FragmentIndex::from_fragments(&fragments);
        index.save(dir.path()).unwrap();
        let loaded = FragmentIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.len(), index.len());
    }

    #[test]
    fn test_non_finite_bounds_stored_as_none() {
        let (_, mut fragments) = build(2);
        fragments[0].bounds.lower.x = f32::NAN;
        fragments[1].bounds.upper.y = f32::INFINITY;

        let dir = TempDir::new().unwrap();
        let index = FragmentIndex::from_fragments(&fragments);
        assert_eq!(index.entry(fragments[0].root_id).unwrap().bounds, None);
        assert_eq!(index.entry(fragments[1].root_id).unwrap().bounds, None);
        assert!(index.entry(fragments[2].root_id).unwrap().bounds.is_some());

        index.save(dir.path()).unwrap();
        let loaded = FragmentIndex::load(dir.path()).unwrap();
        assert_eq!(loaded.entry(fragments[0].root_id), index.entry(fragments[0].root_id));
        assert!(loaded.entry(fragments[0].root_id).unwrap().bounds().is_empty());
    }
}
