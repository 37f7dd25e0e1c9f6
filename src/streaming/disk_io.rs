//! Fragment serialization and disk I/O
//!
//! One file per fragment, named `<root_id>.srsf`; the root fragment is
//! `0.srsf`. Primitive indices are local to the file, node ids in external
//! links are global.
//!
//! ```text
//! u32 surfel_count
//! u32 payload_offset            byte offset of the HalfSurfel block
//! u32 node_count
//! u32 primitive_index_count
//! u32 fragment_root_id
//! f32[6] fragment_bounds        lower.xyz, upper.xyz
//! PackedStreamingNode[node_count]
//! u32[primitive_index_count]
//! HalfSurfel[surfel_count]      f16 x, y, z, radius, nx, ny, nz, pad
//! u8[surfel_count * 4]          RGBA8, alpha 255
//! ```
//!
//! All values are little-endian.

use std::fs;
use std::path::{Path, PathBuf};

use half::f16;
use rayon::prelude::*;

use super::fragment::Fragment;
use crate::core::bytes::{put_f32, put_u32, ByteReader};
use crate::core::types::Vec3;
use crate::core::{Error, Result};
use crate::kdtree::{ChildLink, PackedStreamingNode, StreamingKdNode};
use crate::math::Aabb;
use crate::surfel::{color_from_rgba8, Surfel};

/// File extension of fragment files
pub const FRAGMENT_EXTENSION: &str = "srsf";

const HEADER_SIZE: usize = 5 * 4 + 6 * 4;
const HALF_SURFEL_SIZE: usize = 8 * 2;
/// Bits written to the unused fourth normal component
const HALF_PAD_BITS: u16 = 0xFFFF;

/// Quantized surfel geometry as stored on disk
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HalfSurfel {
    pub position: [f16; 3],
    pub radius: f16,
    pub normal: [f16; 3],
}

impl HalfSurfel {
    /// Quantize to half precision; the normal is renormalized first since
    /// LOD normals are stored as unnormalized means.
    pub fn quantize(s: &Surfel) -> Self {
        let n = s.normal.normalize_or_zero();
        Self {
            position: s.position.to_array().map(f16::from_f32),
            radius: f16::from_f32(s.radius),
            normal: n.to_array().map(f16::from_f32),
        }
    }

    pub fn to_surfel(&self, rgba: [u8; 4]) -> Surfel {
        Surfel::new(
            Vec3::from_array(self.position.map(f16::to_f32)),
            Vec3::from_array(self.normal.map(f16::to_f32)),
            self.radius.to_f32(),
            color_from_rgba8(rgba),
        )
    }

    fn write(&self, out: &mut Vec<u8>) {
        for h in self.position.iter().chain([&self.radius]).chain(self.normal.iter()) {
            out.extend_from_slice(&h.to_le_bytes());
        }
        out.extend_from_slice(&HALF_PAD_BITS.to_le_bytes());
    }

    fn read(r: &mut ByteReader<'_>) -> Result<Self> {
        let mut h = [f16::ZERO; 8];
        for v in &mut h {
            *v = f16::from_bits(r.u16()?);
        }
        Ok(Self {
            position: [h[0], h[1], h[2]],
            radius: h[3],
            normal: [h[4], h[5], h[6]],
        })
    }
}

/// Byte offset of the surfel block for the given array sizes
pub fn payload_offset(node_count: usize, primitive_count: usize) -> usize {
    HEADER_SIZE + node_count * PackedStreamingNode::SIZE + primitive_count * 4
}

/// Serialize a fragment to bytes
pub fn serialize_fragment(fragment: &Fragment) -> Vec<u8> {
    let offset = payload_offset(fragment.nodes.len(), fragment.primitive_indices.len());
    let mut out = Vec::with_capacity(offset + fragment.surfels.len() * (HALF_SURFEL_SIZE + 4));

    put_u32(&mut out, fragment.surfels.len() as u32);
    put_u32(&mut out, offset as u32);
    put_u32(&mut out, fragment.nodes.len() as u32);
    put_u32(&mut out, fragment.primitive_indices.len() as u32);
    put_u32(&mut out, fragment.root_id);
    for v in fragment.bounds.to_array() {
        put_f32(&mut out, v);
    }

    for node in &fragment.nodes {
        let packed = node.pack();
        put_f32(&mut out, packed.split_pos);
        put_u32(&mut out, packed.prim_offset);
        put_u32(&mut out, packed.right);
        put_u32(&mut out, packed.tagged);
    }
    for &p in &fragment.primitive_indices {
        put_u32(&mut out, p);
    }
    debug_assert_eq!(out.len(), offset);

    for s in &fragment.surfels {
        HalfSurfel::quantize(s).write(&mut out);
    }
    for s in &fragment.surfels {
        out.extend_from_slice(&s.rgba8());
    }
    out
}

/// Deserialize a fragment from bytes. `node_ids` is left empty.
pub fn deserialize_fragment(data: &[u8]) -> Result<Fragment> {
    let mut r = ByteReader::new(data, "fragment");
    let surfel_count = r.u32()? as usize;
    let offset = r.u32()? as usize;
    let node_count = r.u32()? as usize;
    let prim_count = r.u32()? as usize;
    let root_id = r.u32()?;
    let mut corners = [0f32; 6];
    for c in &mut corners {
        *c = r.f32()?;
    }

    let expected = payload_offset(node_count, prim_count);
    if offset != expected {
        return Err(Error::format(format!(
            "fragment {} payload offset {} does not match header (expected {})",
            root_id, offset, expected
        )));
    }

    let mut nodes = Vec::with_capacity(node_count.min(r.remaining() / PackedStreamingNode::SIZE));
    for _ in 0..node_count {
        let packed = PackedStreamingNode {
            split_pos: r.f32()?,
            prim_offset: r.u32()?,
            right: r.u32()?,
            tagged: r.u32()?,
        };
        nodes.push(StreamingKdNode::unpack(packed));
    }

    let mut primitive_indices = Vec::with_capacity(prim_count.min(r.remaining() / 4));
    for _ in 0..prim_count {
        primitive_indices.push(r.u32()?);
    }

    let mut halves = Vec::with_capacity(surfel_count.min(r.remaining() / HALF_SURFEL_SIZE));
    for _ in 0..surfel_count {
        halves.push(HalfSurfel::read(&mut r)?);
    }
    let colors = r.take(surfel_count * 4)?;
    let surfels = halves
        .iter()
        .zip(colors.chunks_exact(4))
        .map(|(h, c)| h.to_surfel([c[0], c[1], c[2], c[3]]))
        .collect();

    let fragment = Fragment {
        root_id,
        bounds: Aabb::from_array(corners),
        nodes,
        primitive_indices,
        surfels,
        node_ids: Vec::new(),
    };
    validate_fragment(&fragment)?;
    Ok(fragment)
}

/// Check that every local reference of a fragment stays in range
pub fn validate_fragment(fragment: &Fragment) -> Result<()> {
    let node_count = fragment.nodes.len() as u32;
    let prim_count = fragment.primitive_indices.len() as u64;
    let surfel_count = fragment.surfels.len() as u32;
    let bad = |what: String| Error::format(format!("fragment {}: {}", fragment.root_id, what));

    for (i, node) in fragment.nodes.iter().enumerate() {
        match *node {
            StreamingKdNode::Leaf { count, offset } => {
                if offset as u64 + count as u64 > prim_count {
                    return Err(bad(format!("leaf {} references primitives past the end", i)));
                }
            }
            StreamingKdNode::Interior { lod_surfel, left, right, .. } => {
                if lod_surfel >= surfel_count {
                    return Err(bad(format!("node {} LOD surfel {} out of range", i, lod_surfel)));
                }
                for link in [left, right] {
                    if let ChildLink::Internal(child) = link {
                        if child <= i as u32 || child >= node_count {
                            return Err(bad(format!("node {} has invalid child link {}", i, child)));
                        }
                    }
                }
            }
        }
    }
    if let Some(&p) = fragment.primitive_indices.iter().find(|&&p| p >= surfel_count) {
        return Err(bad(format!("primitive index {} out of range", p)));
    }
    Ok(())
}

/// Get the file path for a fragment
pub fn fragment_path(base_dir: &Path, root_id: u32) -> PathBuf {
    base_dir.join(format!("{}.{}", root_id, FRAGMENT_EXTENSION))
}

/// Write one fragment file, creating `base_dir` if needed. An existing
/// directory or file is overwritten without complaint.
pub fn save_fragment(base_dir: &Path, fragment: &Fragment) -> Result<PathBuf> {
    fs::create_dir_all(base_dir)?;
    let path = fragment_path(base_dir, fragment.root_id);
    fs::write(&path, serialize_fragment(fragment))?;
    Ok(path)
}

/// Load a fragment from disk (if it exists)
pub fn load_fragment(base_dir: &Path, root_id: u32) -> Result<Option<Fragment>> {
    let path = fragment_path(base_dir, root_id);
    if !path.exists() {
        return Ok(None);
    }
    let fragment = deserialize_fragment(&fs::read(&path)?)?;
    if fragment.root_id != root_id {
        return Err(Error::format(format!(
            "{} holds fragment {}",
            path.display(),
            fragment.root_id
        )));
    }
    Ok(Some(fragment))
}

/// Check if a fragment exists on disk
pub fn fragment_exists(base_dir: &Path, root_id: u32) -> bool {
    fragment_path(base_dir, root_id).exists()
}

/// Write every fragment, one rayon task per file
pub fn save_fragments(base_dir: &Path, fragments: &[Fragment]) -> Result<()> {
    fs::create_dir_all(base_dir)?;
    fragments
        .par_iter()
        .try_for_each(|f| save_fragment(base_dir, f).map(|_| ()))?;
    log::info!("Wrote {} fragments to {}", fragments.len(), base_dir.display());
    Ok(())
}
