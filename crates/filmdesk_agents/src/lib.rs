//! FilmDesk agents: the background job queue and the opportunity matcher.
//!
//! - [`JobQueue`]: FIFO agent jobs over `agent_jobs`
//! - [`JobDispatcher`]: routes a job to its handler and records the outcome
//! - [`Poller`]: the single-consumer loop behind `filmdesk agents run`
//! - [`MatchEngine`]: grant/festival discovery and quick apply
//! - [`ObjectStore`]: script file storage

pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod kind;
pub mod matching;
pub mod poller;
pub mod queue;
pub mod script_parser;
pub mod shutdown;
pub mod storage;

pub use dispatch::{AuditSink, JobDispatcher, Outcome};
pub use error::{AgentError, Result};
pub use handlers::HandlerContext;
pub use kind::JobKind;
pub use matching::{
    DiscoverySummary, DiscoveryTarget, FestivalScorer, GrantScorer, MatchEngine, NoiseSource,
    ScoreCard, ScoringRule, UniformNoise, ZeroNoise,
};
pub use poller::{Poller, PollerConfig, PollerStats};
pub use queue::JobQueue;
pub use shutdown::ShutdownToken;
pub use storage::{ObjectStore, StorageConfig, StorageError, SupabaseStorage};
