//! Score perturbation.
//!
//! Discovery can add a small random bonus so that equally scored candidates
//! do not always rank the same way. Off by default; tests inject fixed noise.

use rand::Rng;

/// Bonus ceiling for grant scores.
pub const GRANT_NOISE_CEILING: u8 = 10;
/// Bonus ceiling for festival scores.
pub const FESTIVAL_NOISE_CEILING: u8 = 15;

pub trait NoiseSource: Send + Sync {
    /// A bonus in `0..=ceiling`.
    fn bonus(&self, ceiling: u8) -> u8;
}

/// No perturbation.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZeroNoise;

impl NoiseSource for ZeroNoise {
    fn bonus(&self, _ceiling: u8) -> u8 {
        0
    }
}

/// Uniform bonus from the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformNoise;

impl NoiseSource for UniformNoise {
    fn bonus(&self, ceiling: u8) -> u8 {
        rand::rng().random_range(0..=ceiling)
    }
}

/// Always the same bonus, capped at the ceiling.
#[derive(Debug, Clone, Copy)]
pub struct FixedNoise(pub u8);

impl NoiseSource for FixedNoise {
    fn bonus(&self, ceiling: u8) -> u8 {
        self.0.min(ceiling)
    }
}
