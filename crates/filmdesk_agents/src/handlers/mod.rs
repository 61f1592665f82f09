//! Job handlers, one per [`JobKind`](crate::JobKind).
//!
//! Each handler takes the claimed job plus shared context and returns the JSON
//! stored as the job's output. Errors are turned into failed jobs by the
//! dispatcher.

mod budget;
mod matching;
mod schedule;
mod scrape;
mod script;

pub use budget::{standard_budget_items, DEFAULT_CONTINGENCY_PERCENT};
pub use schedule::{plan_shoot_days, MAX_HOURS_PER_DAY};
pub use scrape::{sample_festivals, sample_grants};
pub use script::sample_scenes;

use crate::error::Result;
use crate::kind::JobKind;
use crate::matching::MatchEngine;
use crate::storage::ObjectStore;
use filmdesk_db::{FilmDb, Job};
use serde_json::Value;
use std::sync::Arc;

/// Everything a handler may touch.
#[derive(Clone)]
pub struct HandlerContext {
    pub db: FilmDb,
    pub engine: MatchEngine,
    pub storage: Option<Arc<dyn ObjectStore>>,
}

impl HandlerContext {
    pub fn new(db: FilmDb) -> Self {
        Self {
            engine: MatchEngine::new(db.clone()),
            db,
            storage: None,
        }
    }

    pub fn with_engine(mut self, engine: MatchEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_storage(mut self, storage: Arc<dyn ObjectStore>) -> Self {
        self.storage = Some(storage);
        self
    }

    fn today(&self) -> chrono::NaiveDate {
        chrono::Utc::now().date_naive()
    }
}

/// Run the handler for `kind`.
pub async fn run(kind: JobKind, ctx: &HandlerContext, job: &Job) -> Result<Value> {
    match kind {
        JobKind::ScriptAnalysis => script::analyze(ctx, job).await,
        JobKind::BudgetGeneration => budget::generate(ctx, job).await,
        JobKind::ScheduleGeneration => schedule::generate(ctx, job).await,
        JobKind::GrantScrape => scrape::grants(ctx, ctx.today()).await,
        JobKind::FestivalScrape => scrape::festivals(ctx, ctx.today()).await,
        JobKind::GrantMatch => matching::grants(ctx, job).await,
        JobKind::FestivalMatch => matching::festivals(ctx, job).await,
    }
}
