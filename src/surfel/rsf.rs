//! Raw surfel files (.rsf)
//!
//! Version 1 is a flat array of [`Surfel`] records (48 bytes each).
//!
//! Version 2 is the single-file monolithic layout: a kd-tree built over the
//! surfel bounds followed by full-precision surfel data.
//!
//! ```text
//! u32 nsurfels
//! u32 surfels_data_offset
//! u32 num_kd_nodes
//! u32 num_kd_prim_indices
//! box3f kd_tree_bounds
//! [PackedKdNode, ...]
//! [u32, ...]                      prim indices
//! [vec3f position, f32 radius, vec3f normal, f32 pad, ...]
//! [rgba8, ...]
//! ```

use std::fs;
use std::path::Path;

use bytemuck::Zeroable;

use super::{color_from_rgba8, Surfel};
use crate::core::bytes::{put_f32, put_u32, ByteReader};
use crate::core::types::Vec3;
use crate::core::{Error, Result};
use crate::kdtree::{KdNode, KdTree, PackedKdNode};
use crate::math::Aabb;

const SURFEL_V1_SIZE: usize = std::mem::size_of::<Surfel>();
const LEGACY_HEADER_SIZE: usize = 4 * 4 + 6 * 4;
const LEGACY_SURFEL_SIZE: usize = 8 * 4;

/// Decode a v1 file of little-endian records.
pub fn decode_raw_surfels_v1(bytes: &[u8]) -> Result<Vec<Surfel>> {
    if bytes.len() % SURFEL_V1_SIZE != 0 {
        return Err(Error::format(format!(
            "raw surfel file size {} is not a multiple of {}",
            bytes.len(),
            SURFEL_V1_SIZE
        )));
    }
    if cfg!(target_endian = "little") {
        let mut surfels = vec![Surfel::zeroed(); bytes.len() / SURFEL_V1_SIZE];
        bytemuck::cast_slice_mut::<Surfel, u8>(&mut surfels).copy_from_slice(bytes);
        return Ok(surfels);
    }
    decode_v1_records(bytes)
}

/// Field-by-field decode, independent of host byte order
fn decode_v1_records(bytes: &[u8]) -> Result<Vec<Surfel>> {
    let mut reader = ByteReader::new(bytes, "raw surfel file");
    let mut surfels = Vec::with_capacity(bytes.len() / SURFEL_V1_SIZE);
    while reader.remaining() > 0 {
        let mut v = [0f32; 12];
        for x in &mut v {
            *x = reader.f32()?;
        }
        surfels.push(Surfel {
            position: Vec3::new(v[0], v[1], v[2]),
            radius: v[3],
            normal: Vec3::new(v[4], v[5], v[6]),
            _pad: v[7],
            color: Vec3::new(v[8], v[9], v[10]),
            _pad2: v[11],
        });
    }
    Ok(surfels)
}

pub fn encode_raw_surfels_v1(surfels: &[Surfel]) -> Vec<u8> {
    if cfg!(target_endian = "little") {
        return bytemuck::cast_slice::<Surfel, u8>(surfels).to_vec();
    }
    let mut out = Vec::with_capacity(surfels.len() * SURFEL_V1_SIZE);
    for s in surfels {
        for x in s.position.to_array() {
            put_f32(&mut out, x);
        }
        put_f32(&mut out, s.radius);
        for x in s.normal.to_array() {
            put_f32(&mut out, x);
        }
        put_f32(&mut out, s._pad);
        for x in s.color.to_array() {
            put_f32(&mut out, x);
        }
        put_f32(&mut out, s._pad2);
    }
    out
}

pub fn read_raw_surfels_v1(path: &Path) -> Result<Vec<Surfel>> {
    let bytes = fs::read(path)?;
    let surfels = decode_raw_surfels_v1(&bytes)?;
    log::info!("Read {} surfels from {}", surfels.len(), path.display());
    Ok(surfels)
}

pub fn write_raw_surfels_v1(path: &Path, surfels: &[Surfel]) -> Result<()> {
    fs::write(path, encode_raw_surfels_v1(surfels))?;
    Ok(())
}

/// Contents of a version 2 (monolithic) file
#[derive(Debug, Clone)]
pub struct LegacySurfelFile {
    pub tree: KdTree,
    pub surfels: Vec<Surfel>,
}

/// Build the monolithic tree over the surfels and encode the v2 layout
pub fn encode_raw_surfels_v2(surfels: &[Surfel]) -> Result<Vec<u8>> {
    let tree = KdTree::build(surfels.iter().map(Surfel::bounds).collect())?;
    let nodes = tree.nodes();
    let prims = tree.primitive_indices();

    let payload_offset = LEGACY_HEADER_SIZE + nodes.len() * PackedKdNode::SIZE + prims.len() * 4;
    let mut out = Vec::with_capacity(payload_offset + surfels.len() * (LEGACY_SURFEL_SIZE + 4));

    put_u32(&mut out, surfels.len() as u32);
    put_u32(&mut out, payload_offset as u32);
    put_u32(&mut out, nodes.len() as u32);
    put_u32(&mut out, prims.len() as u32);
    for v in tree.bounds().to_array() {
        put_f32(&mut out, v);
    }
    for node in nodes {
        let packed = node.pack();
        put_u32(&mut out, packed.word0);
        put_u32(&mut out, packed.word1);
    }
    for &p in prims {
        put_u32(&mut out, p);
    }
    debug_assert_eq!(out.len(), payload_offset);

    for s in surfels {
        for v in [s.position.x, s.position.y, s.position.z, s.radius, s.normal.x, s.normal.y, s.normal.z, 0.0] {
            put_f32(&mut out, v);
        }
    }
    for s in surfels {
        out.extend_from_slice(&s.rgba8());
    }
    Ok(out)
}

pub fn decode_raw_surfels_v2(bytes: &[u8]) -> Result<LegacySurfelFile> {
    let mut r = ByteReader::new(bytes, "legacy surfel file");
    let surfel_count = r.u32()? as usize;
    let payload_offset = r.u32()? as usize;
    let node_count = r.u32()? as usize;
    let prim_count = r.u32()? as usize;
    let mut corners = [0f32; 6];
    for c in &mut corners {
        *c = r.f32()?;
    }

    let expected = LEGACY_HEADER_SIZE + node_count * PackedKdNode::SIZE + prim_count * 4;
    if payload_offset != expected {
        return Err(Error::format(format!(
            "legacy surfel payload offset {} does not match header (expected {})",
            payload_offset, expected
        )));
    }

    let mut nodes = Vec::with_capacity(node_count);
    for _ in 0..node_count {
        let word0 = r.u32()?;
        let word1 = r.u32()?;
        nodes.push(KdNode::unpack(PackedKdNode { word0, word1 }));
    }
    let mut prims = Vec::with_capacity(prim_count);
    for _ in 0..prim_count {
        prims.push(r.u32()?);
    }

    let mut surfels = Vec::with_capacity(surfel_count);
    for _ in 0..surfel_count {
        let position = Vec3::new(r.f32()?, r.f32()?, r.f32()?);
        let radius = r.f32()?;
        let normal = Vec3::new(r.f32()?, r.f32()?, r.f32()?);
        let _pad = r.f32()?;
        surfels.push(Surfel::new(position, normal, radius, Vec3::ZERO));
    }
    for s in &mut surfels {
        let rgba = r.take(4)?;
        s.color = color_from_rgba8([rgba[0], rgba[1], rgba[2], rgba[3]]);
    }

    if let Some(&p) = prims.iter().find(|&&p| p as usize >= surfel_count) {
        return Err(Error::format(format!("primitive index {} out of range", p)));
    }
    let bounds = surfels.iter().map(Surfel::bounds).collect();
    Ok(LegacySurfelFile {
        tree: KdTree::from_parts(bounds, Aabb::from_array(corners), nodes, prims),
        surfels,
    })
}

pub fn write_raw_surfels_v2(path: &Path, surfels: &[Surfel]) -> Result<()> {
    let bytes = encode_raw_surfels_v2(surfels)?;
    fs::write(path, bytes)?;
    log::info!("Wrote {} surfels to {}", surfels.len(), path.display());
    Ok(())
}

pub fn read_raw_surfels_v2(path: &Path) -> Result<LegacySurfelFile> {
    decode_raw_surfels_v2(&fs::read(path)?)
}
