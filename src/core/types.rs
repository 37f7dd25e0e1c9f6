//! Core type aliases and re-exports

pub use glam::Vec3;

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Hard ceiling on primitives in one tree. Counts and offsets are packed
/// into 30-bit node fields.
pub const MAX_PRIMITIVES: usize = 1 << 30;
