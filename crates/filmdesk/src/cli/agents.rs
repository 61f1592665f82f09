//! Agents command - run the job poller.

use super::config::{config_path, FileConfig, STORAGE_KEY_ENV};
use super::{block_on, open_db};
use clap::Subcommand;
use filmdesk_agents::{
    HandlerContext, JobDispatcher, JobQueue, MatchEngine, ObjectStore, Poller, PollerConfig,
    ShutdownToken, SupabaseStorage, UniformNoise,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Subcommand, Debug)]
pub enum AgentsAction {
    /// Poll the queue and process jobs until interrupted
    Run {
        /// Process at most one job and exit
        #[arg(long)]
        once: bool,

        /// Seconds to sleep when the queue is empty [default: 5]
        #[arg(long)]
        sleep: Option<u64>,

        /// Add random score noise during discovery
        #[arg(long)]
        noise: bool,
    },
}

pub fn run(action: AgentsAction, db_path: &Path) -> anyhow::Result<()> {
    let AgentsAction::Run { once, sleep, noise } = action;
    let config = FileConfig::load(&config_path())?;

    let sleep_secs = sleep.or(config.agents.sleep_secs).unwrap_or(5);
    let noise = noise || config.agents.noise;
    let storage_key = std::env::var(STORAGE_KEY_ENV).ok();
    let storage_config = config.storage_config(storage_key)?;

    block_on(async move {
        let db = open_db(db_path).await?;

        let mut engine = MatchEngine::new(db.clone());
        if noise {
            engine = engine.with_noise(Arc::new(UniformNoise));
        }
        let mut ctx = HandlerContext::new(db.clone()).with_engine(engine);
        if let Some(storage_config) = storage_config {
            info!(
                url = %storage_config.url,
                bucket = %storage_config.bucket,
                "Object storage configured"
            );
            let storage: Arc<dyn ObjectStore> = Arc::new(SupabaseStorage::new(storage_config)?);
            ctx = ctx.with_storage(storage);
        }

        let poller = Poller::new(
            JobQueue::new(db),
            JobDispatcher::new(ctx),
            PollerConfig {
                once,
                sleep: Duration::from_secs(sleep_secs),
            },
        );

        let shutdown = ShutdownToken::new();
        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                match tokio::signal::ctrl_c().await {
                    Ok(()) => {
                        info!("Ctrl-C received, stopping after the current job");
                        shutdown.request();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
                }
            });
        }

        if !once {
            println!("Agent poller running (sleep {}s). Press Ctrl-C to stop.", sleep_secs);
        }
        let stats = poller.run(shutdown).await;
        println!(
            "Processed {} job(s): {} completed, {} failed",
            stats.completed + stats.failed,
            stats.completed,
            stats.failed
        );
        Ok(())
    })
}
