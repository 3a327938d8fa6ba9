//! Long-running poll mode and its one-shot variants.
//!
//! ## Interrupts
//!
//! 1. The first Ctrl+C sets the shared shutdown flag; the poll loop and any
//!    retry backoff notice it within a fraction of a second and the session
//!    in progress is abandoned (files already moved stay moved)
//! 2. A second Ctrl+C exits on the spot

use std::process::{self, ExitCode};

use log::{error, info};
use n2p_dcim_core::{Config, Detector, Iteration, Poller, Shutdown, UnmountStatus};
use snafu::Report;

/// Exit code conventionally used after SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

fn install_interrupt_handler(shutdown: &Shutdown) -> Result<(), ctrlc::Error> {
    let handler = shutdown.clone();
    ctrlc::set_handler(move || {
        if handler.is_requested() {
            println!("Bye!");
            process::exit(EXIT_INTERRUPTED.into());
        }
        info!("Received Ctrl+C, stopping...");
        handler.request();
    })
}

/// Polls for cards until interrupted.
pub fn run_daemon(config: Config) -> ExitCode {
    let shutdown = Shutdown::new();
    if let Err(e) = install_interrupt_handler(&shutdown) {
        error!("Failed to install Ctrl+C handler: {}", e);
        return ExitCode::FAILURE;
    }

    let mut poller = Poller::new(config, shutdown.clone());
    match poller.run() {
        Ok(()) => {
            println!("Bye!");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}

/// Processes at most one card, then exits.
pub fn run_single(config: Config) -> ExitCode {
    let shutdown = Shutdown::new();
    if let Err(e) = install_interrupt_handler(&shutdown) {
        error!("Failed to install Ctrl+C handler: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.ensure_staging_root() {
        error!("{}", Report::from_error(e));
        return ExitCode::FAILURE;
    }

    let mut poller = Poller::new(config, shutdown);
    let iteration = poller.run_once();
    match &iteration {
        Iteration::Idle => println!("No card found"),
        Iteration::Completed(summary) => println!(
            "{}: {} transferred, {} failed, {} post-processing run(s) started",
            summary.session,
            summary.transferred,
            summary.failed,
            summary.launched.len()
        ),
        Iteration::Failed { .. } => {}
        Iteration::Interrupted { .. } => println!("Bye!"),
    }
    ExitCode::from(exit_status(&iteration))
}

/// Process exit status for a single iteration.
///
/// A completed session only succeeds if every file moved, the card did not
/// stay mounted and every post-processing run started.
fn exit_status(iteration: &Iteration) -> u8 {
    match iteration {
        Iteration::Idle => 0,
        Iteration::Completed(summary) => {
            let clean = summary.failed == 0
                && summary.unmount != UnmountStatus::Failed
                && summary.not_launched.is_empty();
            if clean { 0 } else { 1 }
        }
        Iteration::Failed { .. } => 1,
        Iteration::Interrupted { .. } => EXIT_INTERRUPTED,
    }
}

/// Prints the card that would be processed next.
pub fn detect(config: &Config) -> ExitCode {
    let detector = Detector::new(&config.mount_root, &config.marker_file);
    match detector.find_first() {
        Ok(Some(device)) => {
            println!("{}\t{}", device.name, device.path.display());
            ExitCode::SUCCESS
        }
        Ok(None) => {
            println!("No card found under {}", config.mount_root.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", Report::from_error(e));
            ExitCode::FAILURE
        }
    }
}
