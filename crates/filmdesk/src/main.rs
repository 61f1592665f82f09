//! FilmDesk command line.
//!
//! Producer side of the agent queue (`jobs`), the single-consumer poller
//! (`agents run`), on-demand discovery and quick apply (`grants`,
//! `festivals`) and the projects they run against.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::agents::AgentsAction;
use cli::config::ConfigArgs;
use cli::festivals::FestivalsAction;
use cli::grants::GrantsAction;
use cli::jobs::JobsAction;
use cli::projects::ProjectsAction;

#[derive(Parser, Debug)]
#[command(name = "filmdesk", version, about = "Film production agents and opportunity matching")]
struct Cli {
    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Database file (defaults to ~/.filmdesk/filmdesk.sqlite3)
    #[arg(long, global = true, env = "FILMDESK_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Enqueue and inspect agent jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },

    /// Run the agent poller
    Agents {
        #[command(subcommand)]
        action: AgentsAction,
    },

    /// Grant discovery, matches and quick apply
    Grants {
        #[command(subcommand)]
        action: GrantsAction,
    },

    /// Festival discovery and matches
    Festivals {
        #[command(subcommand)]
        action: FestivalsAction,
    },

    /// Create and inspect projects
    Projects {
        #[command(subcommand)]
        action: ProjectsAction,
    },

    /// Show resolved paths and settings
    Config(ConfigArgs),
}

impl Commands {
    fn wants_json(&self) -> bool {
        match self {
            Commands::Jobs { action } => action.wants_json(),
            Commands::Agents { .. } => false,
            Commands::Grants { action } => action.wants_json(),
            Commands::Festivals { action } => action.wants_json(),
            Commands::Projects { action } => action.wants_json(),
            Commands::Config(args) => args.json,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let json_mode = cli.command.wants_json();

    let log_config = filmdesk_logging::LogConfig::new("filmdesk").verbose(cli.verbose);
    if let Err(err) = filmdesk_logging::init_logging(log_config) {
        eprintln!("Warning: failed to initialize logging: {:#}", err);
    }

    let db_path = cli.db.unwrap_or_else(cli::config::default_db_path);

    let result = match cli.command {
        Commands::Jobs { action } => cli::jobs::run(action, &db_path),
        Commands::Agents { action } => cli::agents::run(action, &db_path),
        Commands::Grants { action } => cli::grants::run(action, &db_path),
        Commands::Festivals { action } => cli::festivals::run(action, &db_path),
        Commands::Projects { action } => cli::projects::run(action, &db_path),
        Commands::Config(args) => cli::config::run(args, &db_path),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if json_mode {
                cli::error::print_json_error(&err);
            } else {
                eprintln!("{:?}", err);
            }
            ExitCode::from(1)
        }
    }
}
