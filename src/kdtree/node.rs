//! Kd-tree nodes and their packed wire encodings
//!
//! Nodes are held as tagged enums in memory. The packed forms reproduce the
//! file layout, where the low two bits of one word are shared between the
//! leaf tag (3) and the split axis (0..=2) of interior nodes.

use crate::math::Axis;

const LEAF_TAG: u32 = 3;
const TAG_MASK: u32 = 3;

/// Node of the monolithic kd-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KdNode {
    /// `count` primitive indices starting at `offset`
    Leaf { count: u32, offset: u32 },
    /// Left child is the next node in the array (pre-order)
    Interior { axis: Axis, split_pos: f32, right_child: u32 },
}

/// Packed monolithic node, 8 bytes on disk.
///
/// - `word0`: split position bits (interior) or primitive offset (leaf)
/// - `word1`: `(right_child << 2) | axis` or `(count << 2) | 3`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PackedKdNode {
    pub word0: u32,
    pub word1: u32,
}

impl PackedKdNode {
    pub const SIZE: usize = 8;
}

impl KdNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, KdNode::Leaf { .. })
    }

    pub fn pack(&self) -> PackedKdNode {
        match *self {
            KdNode::Leaf { count, offset } => {
                debug_assert!(count < 1 << 30);
                PackedKdNode { word0: offset, word1: (count << 2) | LEAF_TAG }
            }
            KdNode::Interior { axis, split_pos, right_child } => {
                debug_assert!(right_child < 1 << 30);
                PackedKdNode {
                    word0: split_pos.to_bits(),
                    word1: (right_child << 2) | axis as u32,
                }
            }
        }
    }

    pub fn unpack(packed: PackedKdNode) -> Self {
        match Axis::from_bits(packed.word1) {
            None => KdNode::Leaf { count: packed.word1 >> 2, offset: packed.word0 },
            Some(axis) => KdNode::Interior {
                axis,
                split_pos: f32::from_bits(packed.word0),
                right_child: packed.word1 >> 2,
            },
        }
    }
}

/// Child reference of a streaming node.
///
/// `Internal` holds an index into the same node array. `External` holds the
/// global id of a node stored in another fragment, which is always the root
/// of that fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildLink {
    Internal(u32),
    External(u32),
}

impl ChildLink {
    pub fn index(&self) -> u32 {
        match *self {
            ChildLink::Internal(i) | ChildLink::External(i) => i,
        }
    }

    pub fn is_external(&self) -> bool {
        matches!(self, ChildLink::External(_))
    }
}

/// Node of the LOD-aware streaming kd-tree
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum StreamingKdNode {
    /// `count` primitive indices starting at `offset`
    Leaf { count: u32, offset: u32 },
    /// `lod_surfel` indexes the averaged surfel standing in for the subtree
    Interior {
        axis: Axis,
        split_pos: f32,
        lod_surfel: u32,
        left: ChildLink,
        right: ChildLink,
    },
}

/// Packed streaming node, 16 bytes on disk.
///
/// - `split_pos`: split position, 0 for leaves
/// - `prim_offset`: primitive offset (leaf) or LOD surfel index (interior)
/// - `right`: `(right_child << 1) | external`, 0 for leaves
/// - `tagged`: `(count << 2) | 3` for leaves,
///   `(left_child << 3) | (external << 2) | axis` for interior nodes
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PackedStreamingNode {
    pub split_pos: f32,
    pub prim_offset: u32,
    pub right: u32,
    pub tagged: u32,
}

impl PackedStreamingNode {
    pub const SIZE: usize = 16;
}

impl StreamingKdNode {
    pub fn is_leaf(&self) -> bool {
        matches!(self, StreamingKdNode::Leaf { .. })
    }

    /// Child links of an interior node
    pub fn children(&self) -> Option<[ChildLink; 2]> {
        match *self {
            StreamingKdNode::Leaf { .. } => None,
            StreamingKdNode::Interior { left, right, .. } => Some([left, right]),
        }
    }

    pub fn pack(&self) -> PackedStreamingNode {
        match *self {
            StreamingKdNode::Leaf { count, offset } => {
                debug_assert!(count < 1 << 30);
                PackedStreamingNode {
                    split_pos: 0.0,
                    prim_offset: offset,
                    right: 0,
                    tagged: (count << 2) | LEAF_TAG,
                }
            }
            StreamingKdNode::Interior { axis, split_pos, lod_surfel, left, right } => {
                debug_assert!(left.index() < 1 << 29);
                debug_assert!(right.index() < 1 << 31);
                PackedStreamingNode {
                    split_pos,
                    prim_offset: lod_surfel,
                    right: (right.index() << 1) | right.is_external() as u32,
                    tagged: (left.index() << 3)
                        | ((left.is_external() as u32) << 2)
                        | axis as u32,
                }
            }
        }
    }

    pub fn unpack(packed: PackedStreamingNode) -> Self {
        match Axis::from_bits(packed.tagged & TAG_MASK) {
            None => StreamingKdNode::Leaf {
                count: packed.tagged >> 2,
                offset: packed.prim_offset,
            },
            Some(axis) => {
                let left = packed.tagged >> 3;
                let left = if packed.tagged & 4 != 0 {
                    ChildLink::External(left)
                } else {
                    ChildLink::Internal(left)
                };
                let right = packed.right >> 1;
                let right = if packed.right & 1 != 0 {
                    ChildLink::External(right)
                } else {
                    ChildLink::Internal(right)
                };
                StreamingKdNode::Interior {
                    axis,
                    split_pos: packed.split_pos,
                    lod_surfel: packed.prim_offset,
                    left,
                    right,
                }
            }
        }
    }
}
