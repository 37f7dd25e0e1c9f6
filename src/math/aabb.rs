//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Split axis of a kd-tree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Axis {
    X = 0,
    Y = 1,
    Z = 2,
}

impl Axis {
    /// Component index into a `Vec3`
    pub fn index(self) -> usize {
        self as usize
    }

    /// Decode the low two bits of a packed node field.
    /// Returns `None` for the leaf tag (3).
    pub fn from_bits(bits: u32) -> Option<Axis> {
        match bits & 3 {
            0 => Some(Axis::X),
            1 => Some(Axis::Y),
            2 => Some(Axis::Z),
            _ => None,
        }
    }
}

/// Axis-aligned bounding box defined by lower and upper corners.
///
/// The empty box has `lower = +inf` and `upper = -inf`, so extending it by
/// any point yields the degenerate box around that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    pub const EMPTY: Aabb = Aabb {
        lower: Vec3::INFINITY,
        upper: Vec3::NEG_INFINITY,
    };

    /// Create AABB from lower and upper corners
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// Smallest box containing every point
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Self {
        let mut b = Self::EMPTY;
        for p in points {
            b.extend(p);
        }
        b
    }

    /// True if no point was ever added
    pub fn is_empty(&self) -> bool {
        self.lower.x > self.upper.x || self.lower.y > self.upper.y || self.lower.z > self.upper.z
    }

    /// True if every corner component is finite
    pub fn is_finite(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite()
    }

    /// Grow to include point
    pub fn extend(&mut self, p: Vec3) {
        self.lower = self.lower.min(p);
        self.upper = self.upper.max(p);
    }

    /// Grow to include another box
    pub fn union(&mut self, other: &Aabb) {
        self.extend(other.lower);
        self.extend(other.upper);
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        self.lower + (self.upper - self.lower) * 0.5
    }

    /// Get size (upper - lower)
    pub fn size(&self) -> Vec3 {
        self.upper - self.lower
    }

    /// Axis of maximal extent, ties resolved X > Y > Z
    pub fn longest_axis(&self) -> Axis {
        let d = self.size();
        if d.x >= d.y && d.x >= d.z {
            Axis::X
        } else if d.y >= d.z {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Separating axis test, touching boxes overlap
    pub fn overlaps(&self, other: &Aabb) -> bool {
        !(self.lower.x > other.upper.x || other.lower.x > self.upper.x
            || self.lower.y > other.upper.y || other.lower.y > self.upper.y
            || self.lower.z > other.upper.z || other.lower.z > self.upper.z)
    }

    /// Check if point is inside AABB
    pub fn contains_point(&self, p: Vec3) -> bool {
        p.x >= self.lower.x && p.x <= self.upper.x &&
        p.y >= self.lower.y && p.y <= self.upper.y &&
        p.z >= self.lower.z && p.z <= self.upper.z
    }

    /// Split into the two child regions of a kd node
    pub fn split(&self, axis: Axis, pos: f32) -> (Aabb, Aabb) {
        let mut left = *self;
        left.upper[axis.index()] = pos;
        let mut right = *self;
        right.lower[axis.index()] = pos;
        (left, right)
    }

    /// Corners as `[lower.xyz, upper.xyz]`, the on-disk order
    pub fn to_array(&self) -> [f32; 6] {
        [
            self.lower.x, self.lower.y, self.lower.z,
            self.upper.x, self.upper.y, self.upper.z,
        ]
    }

    pub fn from_array(a: [f32; 6]) -> Self {
        Self {
            lower: Vec3::new(a[0], a[1], a[2]),
            upper: Vec3::new(a[3], a[4], a[5]),
        }
    }
}

impl std::fmt::Display for Aabb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Box [{}, {}]", self.lower, self.upper)
    }
}
