//! Rule-based grant and festival matching.

mod engine;
mod filters;
mod noise;
mod scoring;

pub use engine::{DiscoverySummary, DiscoveryTarget, MatchEngine, DISCOVERY_THRESHOLD};
pub use filters::{festival_passes, grant_passes};
pub use noise::{
    FixedNoise, NoiseSource, UniformNoise, ZeroNoise, FESTIVAL_NOISE_CEILING, GRANT_NOISE_CEILING,
};
pub use scoring::{FestivalScorer, GrantScorer, ScoreCard, ScoringRule, BASE_SCORE};
