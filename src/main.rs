use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use lbsweep::commands;
use lbsweep::config::Config;
use lbsweep::descriptor::LogKind;
use lbsweep::investigate::LogFilter;

/// Derives comparison tables from load-balancer experiment logs.
#[derive(Parser)]
#[command(name = "lbsweep", about)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Logging verbosity level (trace, debug, info, warn, error).
    /// Overrides `log_level` from the config file.
    #[arg(long)]
    log_level: Option<String>,

    /// Log directory to read, overriding the configured one for the command.
    #[arg(long, global = true)]
    source: Option<PathBuf>,

    /// Root directory for generated tables.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Client service time, error and distribution tables.
    User,
    /// Load-balancer requests per second tables.
    Lb,
    /// Per-node request counts and idle times.
    Cluster,
    /// Connection queue depth over time for one log file.
    Queue {
        /// Load-balancer or cluster log.
        file: PathBuf,
    },
    /// Copy the focus-event records of one log file.
    Filter {
        /// Load-balancer or cluster log.
        file: PathBuf,
        /// Keep only records of this node.
        #[arg(long)]
        node: Option<u32>,
        /// Keep only records at or after this timestamp (ns).
        #[arg(long)]
        since: Option<i64>,
    },
    /// Print version information and exit.
    Version,
}

/// Build-time version info, injected via build.rs.
mod version {
    /// Release version string (set at build time).
    pub const RELEASE: &str = env!("CARGO_PKG_VERSION");

    /// Git commit hash (set at build time via env, or "unknown").
    pub fn git_commit() -> &'static str {
        option_env!("GIT_COMMIT").unwrap_or("unknown")
    }

    /// Full version string with platform info.
    pub fn full() -> String {
        format!(
            "{} (commit: {}, {}/{})",
            RELEASE,
            git_commit(),
            std::env::consts::OS,
            std::env::consts::ARCH,
        )
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle version subcommand before anything else.
    if let Command::Version = &cli.command {
        println!("lbsweep {}", version::full());
        return Ok(());
    }

    let cfg = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::default(),
    };

    // Initialize tracing.
    let level = cli.log_level.as_deref().unwrap_or(&cfg.log_level);
    let filter =
        EnvFilter::try_new(level).with_context(|| format!("invalid log level: {level}"))?;

    fmt().with_env_filter(filter).with_target(true).init();

    tracing::info!(
        version = version::RELEASE,
        commit = version::git_commit(),
        "starting lbsweep",
    );

    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| cfg.directories.output.clone());
    let source_for = |kind: LogKind| {
        cli.source
            .clone()
            .unwrap_or_else(|| cfg.directories.for_kind(kind).to_path_buf())
    };

    match &cli.command {
        Command::User => {
            commands::run_user(&cfg, &source_for(LogKind::Client), &output)?;
        }
        Command::Lb => {
            commands::run_lb(&cfg, &source_for(LogKind::LoadBalancer), &output)?;
        }
        Command::Cluster => {
            commands::run_cluster(&cfg, &source_for(LogKind::Cluster), &output)?;
        }
        Command::Queue { file } => {
            commands::run_queue(&cfg, file, &output)?;
        }
        Command::Filter { file, node, since } => {
            let filter = LogFilter {
                node: *node,
                since: *since,
            };
            commands::run_filter(&cfg, file, &output, filter)?;
        }
        Command::Version => {}
    }

    Ok(())
}
