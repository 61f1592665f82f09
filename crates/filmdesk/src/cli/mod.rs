//! CLI command implementations.

pub mod agents;
pub mod config;
pub mod error;
pub mod festivals;
pub mod grants;
pub mod jobs;
pub mod output;
pub mod projects;

use error::HelpfulError;
use filmdesk_db::FilmDb;
use std::future::Future;
use std::path::Path;

/// Run an async command body on a fresh current-thread runtime.
pub fn block_on<F>(future: F) -> anyhow::Result<()>
where
    F: Future<Output = anyhow::Result<()>>,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(future)
}

pub async fn open_db(path: &Path) -> anyhow::Result<FilmDb> {
    FilmDb::open(path).await.map_err(|e| {
        HelpfulError::new("Failed to open database")
            .with_context(format!("Database: {} ({})", path.display(), e))
            .with_suggestions([
                "TRY: Check that the directory is writable".to_string(),
                "TRY: Point at another file with --db or FILMDESK_DB".to_string(),
            ])
            .into()
    })
}
