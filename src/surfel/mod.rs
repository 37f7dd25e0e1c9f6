//! Surfel primitives and raw surfel files

pub mod rsf;
#[cfg(test)]
pub(crate) mod test_utils;

use bytemuck::{Pod, Zeroable};

use crate::core::types::Vec3;
use crate::math::{surfel_bounds, Aabb};

/// Oriented disk splat.
///
/// Layout matches one record of a v1 raw surfel file: 48 bytes,
/// `{x, y, z, radius, nx, ny, nz, pad, r, g, b, pad}`.
/// No validity is enforced; NaN fields propagate into LOD means and bounds.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Surfel {
    pub position: Vec3,
    pub radius: f32,
    pub normal: Vec3,
    _pad: f32,
    /// Linear RGB in [0, 1]
    pub color: Vec3,
    _pad2: f32,
}

impl Default for Surfel {
    fn default() -> Self {
        Self::new(Vec3::ZERO, Vec3::Z, 1.0, Vec3::ONE)
    }
}

impl Surfel {
    pub fn new(position: Vec3, normal: Vec3, radius: f32, color: Vec3) -> Self {
        Self {
            position,
            radius,
            normal,
            _pad: 0.0,
            color,
            _pad2: 0.0,
        }
    }

    /// Bounding box of the disk
    pub fn bounds(&self) -> Aabb {
        surfel_bounds(self.position, self.normal, self.radius)
    }

    /// Color as RGBA8 with opaque alpha
    pub fn rgba8(&self) -> [u8; 4] {
        let c = (self.color * 255.0).clamp(Vec3::ZERO, Vec3::splat(255.0));
        [c.x as u8, c.y as u8, c.z as u8, 255]
    }

    /// Uniformly scale position and radius
    pub fn scaled(mut self, factor: f32) -> Self {
        self.position *= factor;
        self.radius *= factor;
        self
    }

    /// True if position and normal components are all finite
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.normal.is_finite()
    }
}

/// Convert an RGBA8 quad back to linear [0, 1] color
pub fn color_from_rgba8(rgba: [u8; 4]) -> Vec3 {
    Vec3::new(rgba[0] as f32, rgba[1] as f32, rgba[2] as f32) / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size() {
        assert_eq!(std::mem::size_of::<Surfel>(), 48);
    }

    #[test]
    fn test_default() {
        let s = Surfel::default();
        assert_eq!(s.radius, 1.0);
        assert_eq!(s.normal, Vec3::Z);
        assert_eq!(s.rgba8(), [255, 255, 255, 255]);
    }

    #[test]
    fn test_rgba8_clamps() {
        let s = Surfel::new(Vec3::ZERO, Vec3::Z, 1.0, Vec3::new(-0.5, 0.5, 2.0));
        assert_eq!(s.rgba8(), [0, 127, 255, 255]);
    }

    #[test]
    fn test_scaled() {
        let s = Surfel::new(Vec3::ONE, Vec3::Z, 0.5, Vec3::ONE).scaled(2.0);
        assert_eq!(s.position, Vec3::splat(2.0));
        assert_eq!(s.radius, 1.0);
    }
}
