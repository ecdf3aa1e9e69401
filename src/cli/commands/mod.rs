//! CLI parser and dispatch.

mod backlog;
mod checkpoint;
mod discover;
mod fetch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings, LoadOptions};

#[derive(Parser)]
#[command(name = "snapharvest")]
#[command(about = "Incremental snap and product harvester with resumable checkpoints")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Resolve relative paths from current working directory instead of config file location
    #[arg(long, global = true)]
    cwd: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Keep uploads in memory instead of the configured storage backend
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

/// Record type a fixed id list refers to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ItemKind {
    #[default]
    Snap,
    Product,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a listing page and harvest every snap it reveals
    Discover {
        /// Listing URL to scroll
        url: String,
        /// Run name (default: from the pipeline config, e.g. additional_05_07)
        #[arg(long)]
        run: Option<String>,
    },

    /// Harvest one slice of a JSON id list
    Fetch {
        /// JSON file containing an array of ids
        #[arg(long)]
        ids: PathBuf,
        /// Slice index
        #[arg(long)]
        index: usize,
        /// Ids per slice (default: from the pipeline config)
        #[arg(long)]
        chunk: Option<usize>,
        /// Record type of the ids
        #[arg(long, value_enum, default_value = "snap")]
        kind: ItemKind,
    },

    /// Harvest product pages for consecutive numeric ids
    Catalog {
        /// First product id
        #[arg(long)]
        from: u64,
        /// Number of ids
        #[arg(long)]
        count: u64,
    },

    /// Claim listing URLs from the backlog until none are pending
    Work {
        /// Worker slot; names the run `work_<index>`
        #[arg(long, default_value = "0")]
        index: usize,
    },

    /// Manage the listing backlog
    Backlog {
        #[command(subcommand)]
        command: BacklogCommands,
    },

    /// Inspect run checkpoints
    Checkpoint {
        #[command(subcommand)]
        command: CheckpointCommands,
    },
}

#[derive(Subcommand)]
enum BacklogCommands {
    /// Add listing URLs as pending
    Add {
        /// URLs to add
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Show row counts per status
    Status,
    /// Return in-progress rows to pending
    ResetStale,
}

#[derive(Subcommand)]
enum CheckpointCommands {
    /// Show a run's checkpoint summary
    Show {
        /// Run name
        run: String,
    },
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
        use_cwd: cli.cwd,
    };
    let (settings, _config) = load_settings(&options).await?;
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Discover { url, run } => {
            discover::cmd_discover(&settings, &url, run, dry_run).await
        }
        Commands::Fetch {
            ids,
            index,
            chunk,
            kind,
        } => fetch::cmd_fetch(&settings, &ids, index, chunk, kind, dry_run).await,
        Commands::Catalog { from, count } => {
            fetch::cmd_catalog(&settings, from, count, dry_run).await
        }
        Commands::Work { index } => discover::cmd_work(&settings, index, dry_run).await,
        Commands::Backlog { command } => match command {
            BacklogCommands::Add { urls } => backlog::cmd_backlog_add(&settings, &urls),
            BacklogCommands::Status => backlog::cmd_backlog_status(&settings),
            BacklogCommands::ResetStale => backlog::cmd_backlog_reset_stale(&settings),
        },
        Commands::Checkpoint { command } => match command {
            CheckpointCommands::Show { run } => {
                checkpoint::cmd_checkpoint_show(&settings, &run, dry_run).await
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fetch() {
        let cli = Cli::try_parse_from([
            "snapharvest",
            "fetch",
            "--ids",
            "ids.json",
            "--index",
            "3",
            "--kind",
            "product",
        ])
        .unwrap();
        match cli.command {
            Commands::Fetch {
                index, chunk, kind, ..
            } => {
                assert_eq!(index, 3);
                assert_eq!(chunk, None);
                assert_eq!(kind, ItemKind::Product);
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["snapharvest", "backlog", "status", "--dry-run", "-v"])
            .unwrap();
        assert!(cli.dry_run);
        assert!(cli.verbose);
    }
}
