//! n2p-dcim CLI - polls for a negatives card and hands its raw files to n2p.
//!
//! Without a subcommand the poll loop runs until interrupted with Ctrl+C.

mod daemon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use log::error;
use n2p_dcim_core::{Config, StagingLayout};
use snafu::Report;

/// n2p-dcim tool.
#[derive(Parser)]
#[command(name = "n2p-dcim", version)]
#[command(about = "Moves raw negatives off a marked card and starts n2p", long_about = None)]
struct Cli {
    /// JSON configuration file; CLI flags take precedence over its values.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log debug output (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(flatten)]
    overrides: Overrides,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Configuration overrides.
#[derive(Args, Debug, Default)]
struct Overrides {
    /// Directory whose subdirectories are mounted devices.
    #[arg(long, global = true)]
    mount_root: Option<PathBuf>,

    /// Directory receiving the staged files.
    #[arg(long, global = true)]
    staging_root: Option<PathBuf>,

    /// Post-processing executable.
    #[arg(long, global = true)]
    post_processor: Option<PathBuf>,

    /// Seconds between scans.
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Stage all files of a session in a single directory.
    #[arg(long, global = true)]
    flat: bool,

    /// Do not speak phase transitions.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll for cards until interrupted (the default).
    Run {
        /// Process at most one card and exit.
        #[arg(long)]
        once: bool,
    },
    /// Print the card that would be processed, if any.
    Detect,
    /// Print the effective configuration as JSON.
    ShowConfig,
}

impl Overrides {
    fn apply(self, config: &mut Config) {
        if let Some(path) = self.mount_root {
            config.mount_root = path;
        }
        if let Some(path) = self.staging_root {
            config.staging_root = path;
        }
        if let Some(path) = self.post_processor {
            config.post_processor = path;
        }
        if let Some(secs) = self.interval {
            config.poll_interval_secs = secs;
        }
        if self.flat {
            config.layout = StagingLayout::Flat;
        }
        if self.quiet {
            config.announce = false;
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .init();
}

fn load_config(path: Option<PathBuf>, overrides: Overrides) -> n2p_dcim_core::Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(&path)?,
        None => Config::defaults()?,
    };
    overrides.apply(&mut config);
    Ok(config)
}

fn show_config(config: &Config) -> ExitCode {
    match serde_json::to_string_pretty(config) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize config: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match load_config(cli.config, cli.overrides) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", Report::from_error(e));
            return ExitCode::FAILURE;
        }
    };

    match cli.command.unwrap_or(Commands::Run { once: false }) {
        Commands::Run { once: false } => daemon::run_daemon(config),
        Commands::Run { once: true } => daemon::run_single(config),
        Commands::Detect => daemon::detect(&config),
        Commands::ShowConfig => show_config(&config),
    }
}
