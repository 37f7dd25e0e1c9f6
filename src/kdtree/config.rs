//! Kd-tree build configuration

/// Leaf threshold of the monolithic (exact query) tree
pub const MONOLITHIC_MIN_PRIMS: usize = 64;
/// Leaf threshold of the streaming tree; coarser leaves since it only drives LOD selection
pub const STREAMING_MIN_PRIMS: usize = 128;

/// Configuration for kd-tree construction
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KdTreeConfig {
    /// Nodes with at most this many primitives become leaves
    pub min_prims: usize,
    /// Depth limit override, `None` derives it from the primitive count
    pub max_depth: Option<u32>,
}

impl Default for KdTreeConfig {
    fn default() -> Self {
        Self::streaming()
    }
}

impl KdTreeConfig {
    pub fn monolithic() -> Self {
        Self { min_prims: MONOLITHIC_MIN_PRIMS, max_depth: None }
    }

    pub fn streaming() -> Self {
        Self { min_prims: STREAMING_MIN_PRIMS, max_depth: None }
    }

    pub fn with_min_prims(mut self, min_prims: usize) -> Self {
        self.min_prims = min_prims;
        self
    }

    /// Depth limit for `n` primitives
    pub fn max_depth_for(&self, n: usize) -> u32 {
        self.max_depth.unwrap_or_else(|| default_max_depth(n))
    }
}

/// `round(8 + 1.3 * log2(n))`, 8 for empty or single-primitive input
pub fn default_max_depth(n: usize) -> u32 {
    if n <= 1 {
        return 8;
    }
    (8.0 + 1.3 * (n as f64).log2()).round() as u32
}
