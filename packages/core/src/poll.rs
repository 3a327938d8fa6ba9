//! The poll loop.
//!
//! The poller is either `Idle` (no card) or `SessionActive` (a card is being
//! emptied). Every error raised inside a session is caught at the session
//! boundary, logged with the mount path and announced; the loop then returns
//! to `Idle` and keeps polling. Only an interrupt ends the loop.

use std::path::PathBuf;

use log::{debug, error, info, warn};

use crate::announce::{
    Announcer, SAY_DETACH, SAY_ERROR, SAY_START, SilentAnnouncer, SpeechAnnouncer,
};
use crate::config::{Config, StagingLayout};
use crate::detect::{Detector, Device};
use crate::error::{Error, Result};
use crate::launch::{Launcher, SystemLauncher};
use crate::scan::{self, TransferTask};
use crate::session::Session;
use crate::shutdown::Shutdown;
use crate::transfer::{RetryPolicy, Sleeper, TransferEngine};

/// Where the poll loop currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollState {
    Idle,
    SessionActive(Session),
}

/// How the card's mount ended up after a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnmountStatus {
    Unmounted,
    /// The device path was not a mount point, so there was nothing to unmount.
    NotMounted,
    /// `umount` failed; the card is still mounted.
    Failed,
}

/// What one session accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub session: Session,
    pub device: Device,
    pub transferred: usize,
    pub failed: usize,
    pub unmount: UnmountStatus,
    /// Staging directories the post-processor was started in.
    pub launched: Vec<PathBuf>,
    /// Staging directories whose post-processor could not be started.
    pub not_launched: Vec<PathBuf>,
}

/// Result of a single [`Poller::run_once`].
#[derive(Debug)]
pub enum Iteration {
    /// No eligible card was found.
    Idle,
    /// A session ran to the end, possibly with per-file failures.
    Completed(SessionSummary),
    /// A session (or the scan that would start one) failed.
    Failed { mount_path: PathBuf, error: Error },
    /// An interrupt arrived mid-session; the session was abandoned.
    Interrupted { device: Device },
}

/// A group of files moved into the same staging directory.
struct Batch {
    staging_dir: PathBuf,
    tasks: Vec<TransferTask>,
}

/// Drives detection, transfer, unmount and launch.
pub struct Poller {
    config: Config,
    detector: Detector,
    engine: TransferEngine,
    launcher: Box<dyn Launcher>,
    announcer: Box<dyn Announcer>,
    shutdown: Shutdown,
    state: PollState,
}

impl Poller {
    /// Builds a poller wired to the real filesystem, `umount` and speech.
    pub fn new(config: Config, shutdown: Shutdown) -> Self {
        let engine = TransferEngine::with_policy(RetryPolicy::from(&config.retry));
        let launcher = Box::new(SystemLauncher::from_config(&config));
        let announcer: Box<dyn Announcer> = if config.announce {
            Box::new(SpeechAnnouncer::new(&config.speech_command))
        } else {
            Box::new(SilentAnnouncer)
        };
        Self::with_parts(config, engine, launcher, announcer, shutdown)
    }

    pub fn with_parts(
        config: Config,
        engine: TransferEngine,
        launcher: Box<dyn Launcher>,
        announcer: Box<dyn Announcer>,
        shutdown: Shutdown,
    ) -> Self {
        let detector = Detector::new(&config.mount_root, &config.marker_file);
        Self {
            config,
            detector,
            engine,
            launcher,
            announcer,
            shutdown,
            state: PollState::Idle,
        }
    }

    pub fn state(&self) -> &PollState {
        &self.state
    }

    /// Polls until shutdown is requested.
    ///
    /// Returns an error only if the staging root cannot be prepared.
    pub fn run(&mut self) -> Result<()> {
        self.config.ensure_staging_root()?;
        info!(
            "n2p-dcim version {} is started, polling {} every {}s",
            env!("CARGO_PKG_VERSION"),
            self.config.mount_root.display(),
            self.config.poll_interval_secs
        );

        while !self.shutdown.is_requested() {
            self.run_once();
            if self.shutdown.is_requested() {
                break;
            }
            debug!("Sleeping");
            self.shutdown.sleep(self.config.poll_interval());
        }

        info!("Poll loop stopped");
        Ok(())
    }

    /// Runs one detect → transfer → unmount → launch cycle.
    pub fn run_once(&mut self) -> Iteration {
        let device = match self.detector.find_first() {
            Ok(Some(device)) => device,
            Ok(None) => return Iteration::Idle,
            Err(e) => {
                error!(
                    "There's a problem scanning '{}': {}",
                    self.config.mount_root.display(),
                    e
                );
                return Iteration::Failed {
                    mount_path: self.config.mount_root.clone(),
                    error: e,
                };
            }
        };

        let iteration = match self.run_session(&device) {
            Ok(iteration) => iteration,
            Err(e) => {
                error!(
                    "There's a problem processing '{}': {}",
                    device.path.display(),
                    e
                );
                self.announcer.say(SAY_ERROR);
                Iteration::Failed {
                    mount_path: device.path.clone(),
                    error: e,
                }
            }
        };

        self.state = PollState::Idle;
        iteration
    }

    fn run_session(&mut self, device: &Device) -> Result<Iteration> {
        self.announcer.say(SAY_START);
        let session = Session::start(&device.name);
        info!("Starting session {}", session);
        self.state = PollState::SessionActive(session.clone());

        let batches = self.plan(device, &session)?;

        let mut counter = 1;
        let mut transferred = 0;
        let mut failed = 0;
        let mut ready = Vec::new();

        for batch in batches {
            if batch.tasks.is_empty() {
                continue;
            }

            let announcer = &self.announcer;
            let report = self.engine.transfer_with(
                &batch.tasks,
                &batch.staging_dir,
                &self.shutdown,
                |outcome| {
                    if outcome.is_success() {
                        announcer.say(&counter.to_string());
                        counter += 1;
                    } else {
                        announcer.say(SAY_ERROR);
                    }
                },
            );

            transferred += report.succeeded();
            failed += report.failed();

            if report.interrupted {
                warn!(
                    "Session {} interrupted after {} files",
                    session,
                    report.outcomes.len()
                );
                return Ok(Iteration::Interrupted {
                    device: device.clone(),
                });
            }

            ready.push(batch.staging_dir);
        }

        let unmount = match self.launcher.unmount(&device.path) {
            Ok(true) => {
                self.announcer.say(SAY_DETACH);
                UnmountStatus::Unmounted
            }
            Ok(false) => UnmountStatus::NotMounted,
            Err(e) => {
                error!(
                    "There's a problem unmounting '{}': {}",
                    device.path.display(),
                    e
                );
                self.announcer.say(SAY_ERROR);
                UnmountStatus::Failed
            }
        };

        let mut launched = Vec::new();
        let mut not_launched = Vec::new();
        for staging_dir in ready {
            match self.launcher.launch(&staging_dir) {
                Ok(()) => launched.push(staging_dir),
                Err(e) => {
                    error!(
                        "Could not start post-processing in '{}': {}",
                        staging_dir.display(),
                        e
                    );
                    self.announcer.say(SAY_ERROR);
                    not_launched.push(staging_dir);
                }
            }
        }

        info!(
            "Session {} finished: {} transferred, {} failed",
            session, transferred, failed
        );

        Ok(Iteration::Completed(SessionSummary {
            session,
            device: device.clone(),
            transferred,
            failed,
            unmount,
            launched,
            not_launched,
        }))
    }

    /// Groups the card's candidate files by staging directory.
    fn plan(&self, device: &Device, session: &Session) -> Result<Vec<Batch>> {
        let layout = self.config.layout;
        let root = &self.config.staging_root;
        let source_dirs = scan::list_source_dirs(&device.path, &self.config.dcim_dir)?;

        let mut batches: Vec<Batch> = Vec::new();
        for dir in source_dirs {
            let tasks = scan::list_candidates(&dir.path, &self.config.extension)?;
            let staging_dir = session.staging_dir(root, layout, &dir.name);

            match (layout, batches.last_mut()) {
                (StagingLayout::Flat, Some(batch)) => batch.tasks.extend(tasks),
                _ => batches.push(Batch { staging_dir, tasks }),
            }
        }

        Ok(batches)
    }
}
