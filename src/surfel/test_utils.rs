//! Random surfel clouds for tests

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::Surfel;
use crate::core::types::Vec3;

/// `n` surfels uniformly placed in the unit cube, radius 0.01, random
/// unit normals and colors
pub fn random_surfels(n: usize, seed: u64) -> Vec<Surfel> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let p = Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen());
            let normal = Vec3::new(
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
                rng.gen_range(-1.0..1.0),
            )
            .normalize_or(Vec3::Z);
            let color = Vec3::new(rng.r#gen(), rng.r#gen(), rng.r#gen());
            Surfel::new(p, normal, 0.01, color)
        })
        .collect()
}
