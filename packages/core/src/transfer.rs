//! Transfer engine: moves candidate files into a staging directory.
//!
//! Card readers are flaky, so every move is retried with exponential backoff
//! before the file is given up on. A failed file never aborts the batch.

use std::fs::{self, File};
use std::io;
use std::iter;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{error, info, warn};

use crate::config::RetryConfig;
use crate::scan::TransferTask;

/// Blocking delay between retry attempts.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);

    /// Returns true once the current work should be abandoned.
    fn interrupted(&self) -> bool {
        false
    }
}

/// Moves one file into a directory.
pub trait FileMover {
    /// Moves `source` into `dest_dir`, returning the destination path.
    fn move_into(&self, source: &Path, dest_dir: &Path) -> io::Result<PathBuf>;
}

/// Filesystem mover.
///
/// Uses `rename` when source and destination share a filesystem. Across
/// filesystems the file is copied to a `.partial` sibling, synced, renamed
/// into place, and only then removed from the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsMover;

impl FileMover for FsMover {
    fn move_into(&self, source: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
        let file_name = source.file_name().ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "source path has no file name")
        })?;
        let dest = dest_dir.join(file_name);

        if dest.symlink_metadata().is_ok() {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("destination {} already exists", dest.display()),
            ));
        }

        match fs::rename(source, &dest) {
            Ok(()) => Ok(dest),
            // Needs a real second filesystem to reach; copy_then_remove is
            // tested on its own below.
            Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                copy_then_remove(source, &dest)?;
                Ok(dest)
            }
            Err(e) => Err(e),
        }
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".partial");
    dest.with_file_name(name)
}

/// Cross-filesystem move. On any failure the source stays the only copy.
fn copy_then_remove(source: &Path, dest: &Path) -> io::Result<()> {
    let partial = partial_path(dest);

    let copied = fs::copy(source, &partial)
        .and_then(|_| File::open(&partial)?.sync_all())
        .and_then(|_| fs::rename(&partial, dest));
    if let Err(e) = copied {
        let _ = fs::remove_file(&partial);
        return Err(e);
    }

    if let Err(e) = fs::remove_file(source) {
        let _ = fs::remove_file(dest);
        return Err(e);
    }

    Ok(())
}

/// Creates the staging directory if needed. Safe to call repeatedly.
pub fn ensure_staging_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Bounded exponential backoff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    multiplier: u32,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(max_attempts: u32, initial_delay: Duration, multiplier: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay,
            multiplier,
        }
    }

    /// Delay slept after each failed attempt: `initial * multiplier^n`.
    pub fn delays(&self) -> impl Iterator<Item = Duration> + '_ {
        iter::successors(Some(self.initial_delay), move |d| {
            Some(d.saturating_mul(self.multiplier))
        })
        .take(self.max_attempts as usize)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_millis(config.initial_delay_ms),
            config.multiplier,
        )
    }
}

/// Result of moving a single file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Transferred { destination: PathBuf },
    Failed { reason: String },
}

/// Outcome of one [`TransferTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileOutcome {
    pub task: TransferTask,
    pub attempts: u32,
    pub status: FileStatus,
}

impl FileOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, FileStatus::Transferred { .. })
    }
}

/// Per-file results of a batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferReport {
    pub outcomes: Vec<FileOutcome>,
    /// The batch stopped early because of an interrupt.
    pub interrupted: bool,
}

impl TransferReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }
}

/// Moves batches of files with per-file retry.
pub struct TransferEngine {
    mover: Box<dyn FileMover>,
    policy: RetryPolicy,
}

impl TransferEngine {
    pub fn new(mover: Box<dyn FileMover>, policy: RetryPolicy) -> Self {
        Self { mover, policy }
    }

    /// Engine backed by [`FsMover`].
    pub fn with_policy(policy: RetryPolicy) -> Self {
        Self::new(Box::new(FsMover), policy)
    }

    /// Moves every task into `staging_dir`.
    pub fn transfer(
        &self,
        tasks: &[TransferTask],
        staging_dir: &Path,
        sleeper: &dyn Sleeper,
    ) -> TransferReport {
        self.transfer_with(tasks, staging_dir, sleeper, |_| {})
    }

    /// Like [`Self::transfer`], calling `on_file` after each file settles.
    pub fn transfer_with(
        &self,
        tasks: &[TransferTask],
        staging_dir: &Path,
        sleeper: &dyn Sleeper,
        mut on_file: impl FnMut(&FileOutcome),
    ) -> TransferReport {
        let mut report = TransferReport::default();

        for task in tasks {
            if sleeper.interrupted() {
                report.interrupted = true;
                break;
            }

            let outcome = self.move_with_retry(task, staging_dir, sleeper);
            on_file(&outcome);
            report.outcomes.push(outcome);

            if sleeper.interrupted() {
                report.interrupted = true;
                break;
            }
        }

        report
    }

    fn attempt(&self, source: &Path, staging_dir: &Path) -> io::Result<PathBuf> {
        ensure_staging_dir(staging_dir)?;
        self.mover.move_into(source, staging_dir)
    }

    fn move_with_retry(
        &self,
        task: &TransferTask,
        staging_dir: &Path,
        sleeper: &dyn Sleeper,
    ) -> FileOutcome {
        let source = task.source_path();
        info!("Going to move {}", source.display());

        let mut attempts = 0;
        let mut last_error = String::new();

        for delay in self.policy.delays() {
            attempts += 1;
            match self.attempt(&source, staging_dir) {
                Ok(destination) => {
                    info!(
                        "Moved '{}' to '{}'",
                        source.display(),
                        staging_dir.display()
                    );
                    return FileOutcome {
                        task: task.clone(),
                        attempts,
                        status: FileStatus::Transferred { destination },
                    };
                }
                Err(e) => {
                    warn!(
                        "Sleeping {:?} because of error trying to move {} ({})",
                        delay,
                        source.display(),
                        e
                    );
                    last_error = e.to_string();
                    sleeper.sleep(delay);
                    if sleeper.interrupted() {
                        warn!("Interrupted while retrying {}", source.display());
                        return FileOutcome {
                            task: task.clone(),
                            attempts,
                            status: FileStatus::Failed {
                                reason: format!("interrupted: {}", last_error),
                            },
                        };
                    }
                }
            }
        }

        error!("Retried {} times moving {}", attempts, source.display());
        FileOutcome {
            task: task.clone(),
            attempts,
            status: FileStatus::Failed { reason: last_error },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashSet;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingSleeper {
        delays: RefCell<Vec<Duration>>,
        interrupt_after: Option<usize>,
    }

    impl Sleeper for RecordingSleeper {
        fn sleep(&self, duration: Duration) {
            self.delays.borrow_mut().push(duration);
        }

        fn interrupted(&self) -> bool {
            self.interrupt_after
                .is_some_and(|n| self.delays.borrow().len() >= n)
        }
    }

    struct AlwaysFail {
        calls: Cell<u32>,
    }

    impl FileMover for AlwaysFail {
        fn move_into(&self, _source: &Path, _dest_dir: &Path) -> io::Result<PathBuf> {
            self.calls.set(self.calls.get() + 1);
            Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only card"))
        }
    }

    /// Fails the first `failures` calls, then moves for real.
    struct Flaky {
        failures: Cell<u32>,
    }

    impl FileMover for Flaky {
        fn move_into(&self, source: &Path, dest_dir: &Path) -> io::Result<PathBuf> {
            if self.failures.get() > 0 {
                self.failures.set(self.failures.get() - 1);
                return Err(io::Error::other("bus error"));
            }
            FsMover.move_into(source, dest_dir)
        }
    }

    fn instant_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::ZERO, 2)
    }

    fn card_with(files: &[&str]) -> (TempDir, Vec<TransferTask>) {
        let dir = TempDir::new().unwrap();
        let tasks = files
            .iter()
            .map(|name| {
                fs::write(dir.path().join(name), name.as_bytes()).unwrap();
                TransferTask::new(dir.path(), *name)
            })
            .collect();
        (dir, tasks)
    }

    #[test]
    fn test_default_delays_double_from_one_second() {
        let delays: Vec<_> = RetryPolicy::default().delays().collect();
        let expected: Vec<_> = [1, 2, 4, 8, 16, 32, 64, 128, 256, 512]
            .into_iter()
            .map(Duration::from_secs)
            .collect();
        assert_eq!(delays, expected);
    }

    #[test]
    fn test_policy_makes_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO, 2).delays().count(), 1);
    }

    #[test]
    fn test_permanent_failure_retries_ten_times() {
        let (_card, tasks) = card_with(&["a.ARW"]);
        let staging = TempDir::new().unwrap();
        let mover = AlwaysFail { calls: Cell::new(0) };
        let engine = TransferEngine::new(Box::new(mover), RetryPolicy::default());
        let sleeper = RecordingSleeper::default();

        let report = engine.transfer(&tasks, staging.path(), &sleeper);

        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.outcomes[0].attempts, 10);
        assert!(matches!(
            &report.outcomes[0].status,
            FileStatus::Failed { reason } if reason.contains("read-only card")
        ));
        let secs: Vec<_> = sleeper.delays.borrow().iter().map(|d| d.as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 64, 128, 256, 512]);
    }

    #[test]
    fn test_attempts_follow_policy() {
        let mover = AlwaysFail { calls: Cell::new(0) };
        let (_card, tasks) = card_with(&["a.ARW"]);
        let staging = TempDir::new().unwrap();
        let engine = TransferEngine::new(Box::new(mover), instant_policy(4));

        let report = engine.transfer(&tasks, staging.path(), &RecordingSleeper::default());
        assert_eq!(report.outcomes[0].attempts, 4);
    }

    #[test]
    fn test_transient_failure_recovers() {
        let (card, tasks) = card_with(&["a.ARW"]);
        let staging = TempDir::new().unwrap();
        let engine = TransferEngine::new(
            Box::new(Flaky {
                failures: Cell::new(2),
            }),
            RetryPolicy::default(),
        );
        let sleeper = RecordingSleeper::default();

        let report = engine.transfer(&tasks, staging.path(), &sleeper);

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.outcomes[0].attempts, 3);
        assert_eq!(
            *sleeper.delays.borrow(),
            vec![Duration::from_secs(1), Duration::from_secs(2)]
        );
        assert!(!card.path().join("a.ARW").exists());
        assert!(staging.path().join("a.ARW").exists());
    }

    #[test]
    fn test_externally_deleted_files_fail_without_aborting() {
        let names: Vec<String> = (0..8).map(|i| format!("IMG_{:04}.ARW", i)).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        let (card, tasks) = card_with(&refs);
        let staging = TempDir::new().unwrap();
        let target = staging.path().join("CARD1_202610190812_100MSDCF");

        let deleted: HashSet<&str> = ["IMG_0001.ARW", "IMG_0004.ARW", "IMG_0007.ARW"].into();
        for name in &deleted {
            fs::remove_file(card.path().join(name)).unwrap();
        }

        let engine = TransferEngine::with_policy(instant_policy(10));
        let report = engine.transfer(&tasks, &target, &RecordingSleeper::default());

        assert_eq!(report.outcomes.len(), 8);
        assert_eq!(report.succeeded(), 5);
        assert_eq!(report.failed(), 3);
        for outcome in report.failures() {
            assert!(deleted.contains(outcome.task.file_name.as_str()));
            assert_eq!(outcome.attempts, 10);
        }
        for name in &refs {
            let staged = target.join(name);
            assert_eq!(staged.exists(), !deleted.contains(name));
            assert!(!card.path().join(name).exists());
        }
    }

    #[test]
    fn test_zero_files_is_noop() {
        let staging = TempDir::new().unwrap();
        let target = staging.path().join("session");
        let engine = TransferEngine::with_policy(instant_policy(10));

        let report = engine.transfer(&[], &target, &RecordingSleeper::default());

        assert!(report.outcomes.is_empty());
        assert!(!report.interrupted);
        assert!(!target.exists());
    }

    #[test]
    fn test_staging_dir_creation_is_idempotent() {
        let staging = TempDir::new().unwrap();
        let target = staging.path().join("a").join("b");

        ensure_staging_dir(&target).unwrap();
        ensure_staging_dir(&target).unwrap();
        assert!(target.is_dir());
    }

    #[test]
    fn test_destination_is_never_overwritten() {
        let (card, tasks) = card_with(&["a.ARW"]);
        let staging = TempDir::new().unwrap();
        fs::write(staging.path().join("a.ARW"), b"older").unwrap();

        let err = FsMover
            .move_into(&tasks[0].source_path(), staging.path())
            .unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);
        assert!(card.path().join("a.ARW").exists());
        assert_eq!(fs::read(staging.path().join("a.ARW")).unwrap(), b"older");
    }

    #[test]
    fn test_copy_then_remove_moves_content() {
        let (card, tasks) = card_with(&["a.ARW"]);
        let staging = TempDir::new().unwrap();
        let dest = staging.path().join("a.ARW");

        copy_then_remove(&tasks[0].source_path(), &dest).unwrap();

        assert_eq!(fs::read(&dest).unwrap(), b"a.ARW");
        assert!(!card.path().join("a.ARW").exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_copy_then_remove_missing_source_leaves_nothing() {
        let card = TempDir::new().unwrap();
        let staging = TempDir::new().unwrap();
        let dest = staging.path().join("a.ARW");

        assert!(copy_then_remove(&card.path().join("a.ARW"), &dest).is_err());
        assert!(!dest.exists());
        assert!(!partial_path(&dest).exists());
    }

    #[test]
    fn test_interrupt_during_backoff_stops_batch() {
        let (card, tasks) = card_with(&["a.ARW", "b.ARW"]);
        let staging = TempDir::new().unwrap();
        let engine = TransferEngine::new(
            Box::new(AlwaysFail {
                calls: Cell::new(0),
            }),
            RetryPolicy::default(),
        );
        let sleeper = RecordingSleeper {
            interrupt_after: Some(1),
            ..Default::default()
        };

        let report = engine.transfer(&tasks, staging.path(), &sleeper);

        assert!(report.interrupted);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].attempts, 1);
        assert!(card.path().join("b.ARW").exists());
    }

    #[test]
    fn test_callback_sees_every_file() {
        let (_card, tasks) = card_with(&["a.ARW", "b.ARW", "c.ARW"]);
        let staging = TempDir::new().unwrap();
        let engine = TransferEngine::with_policy(instant_policy(1));
        let mut seen = Vec::new();

        engine.transfer_with(&tasks, staging.path(), &RecordingSleeper::default(), |o| {
            seen.push((o.task.file_name.clone(), o.is_success()))
        });

        assert_eq!(
            seen,
            vec![
                ("a.ARW".to_string(), true),
                ("b.ARW".to_string(), true),
                ("c.ARW".to_string(), true),
            ]
        );
    }
}
