//! Runtime configuration.
//!
//! All paths and timings the poll loop depends on live in [`Config`], which is
//! built once at startup (defaults, then an optional JSON file, then CLI
//! overrides) and handed to the [`crate::poll::Poller`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use snafu::ResultExt;

use crate::error::{ConfigParseSnafu, ConfigReadSnafu, Error, IoResultExt, Result};
use crate::executor::PrivilegeEscalation;

/// Default mount root scanned for cards.
pub const DEFAULT_MOUNT_ROOT: &str = "/media";

/// Marker file identifying a card reserved for negatives.
pub const DEFAULT_MARKER_FILE: &str = "n2p";

/// Directory on the card holding the numbered image folders.
pub const DEFAULT_DCIM_DIR: &str = "DCIM";

/// Raw file extension moved off the card.
pub const DEFAULT_EXTENSION: &str = "ARW";

/// Seconds between two scans of the mount root.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Timing utility wrapped around the post-processor.
pub const DEFAULT_TIMING_WRAPPER: &str = "/usr/bin/time";

/// Text-to-speech command for audible feedback.
pub const DEFAULT_SPEECH_COMMAND: &str = "spd-say";

/// How staged files are grouped on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StagingLayout {
    /// One staging directory per DCIM subdirectory: `<session>_<subdir>`.
    #[default]
    PerSubdirectory,
    /// All files of a session in a single `<session>` directory.
    Flat,
}

/// Retry settings for a single file move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub multiplier: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            initial_delay_ms: 1000,
            multiplier: 2,
        }
    }
}

/// Complete runtime configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory whose immediate children are mounted devices.
    pub mount_root: PathBuf,
    /// Local directory receiving the staged raw files.
    pub staging_root: PathBuf,
    /// External post-processing executable.
    pub post_processor: PathBuf,
    /// Optional wrapper (e.g. `/usr/bin/time`) the post-processor runs under.
    pub timing_wrapper: Option<PathBuf>,
    pub marker_file: String,
    pub dcim_dir: String,
    pub extension: String,
    pub layout: StagingLayout,
    pub poll_interval_secs: u64,
    pub retry: RetryConfig,
    /// Speak phase transitions out loud.
    pub announce: bool,
    pub speech_command: String,
    /// Escalation used for `umount`.
    pub escalation: PrivilegeEscalation,
}

/// Partial configuration as read from a JSON file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    mount_root: Option<PathBuf>,
    staging_root: Option<PathBuf>,
    post_processor: Option<PathBuf>,
    #[serde(default, deserialize_with = "explicit_null")]
    timing_wrapper: Option<Option<PathBuf>>,
    marker_file: Option<String>,
    dcim_dir: Option<String>,
    extension: Option<String>,
    layout: Option<StagingLayout>,
    poll_interval_secs: Option<u64>,
    retry: Option<RetryConfig>,
    announce: Option<bool>,
    speech_command: Option<String>,
    escalation: Option<PrivilegeEscalation>,
}

/// Distinguishes an explicit `null` (disable) from a missing key (keep default).
fn explicit_null<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl Config {
    /// Builds the default configuration rooted at the user's home directory.
    pub fn defaults() -> Result<Self> {
        let home = dirs::home_dir().ok_or(Error::HomeDirNotFound)?;
        Ok(Self::with_home(&home))
    }

    /// Builds the default configuration for an explicit home directory.
    pub fn with_home(home: &Path) -> Self {
        Self {
            mount_root: PathBuf::from(DEFAULT_MOUNT_ROOT),
            staging_root: home.join("Pictures"),
            post_processor: home.join("bin").join("n2p_2025"),
            timing_wrapper: Some(PathBuf::from(DEFAULT_TIMING_WRAPPER)),
            marker_file: DEFAULT_MARKER_FILE.to_string(),
            dcim_dir: DEFAULT_DCIM_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            layout: StagingLayout::default(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            retry: RetryConfig::default(),
            announce: true,
            speech_command: DEFAULT_SPEECH_COMMAND.to_string(),
            escalation: PrivilegeEscalation::None,
        }
    }

    /// Loads a JSON config file on top of the defaults.
    ///
    /// Keys missing from the file keep their default value.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = Self::defaults()?;
        config.merge_file(path)?;
        Ok(config)
    }

    /// Overlays the values of a JSON config file onto `self`.
    pub fn merge_file(&mut self, path: &Path) -> Result<()> {
        let content = fs::read_to_string(path).context(ConfigReadSnafu { path })?;
        let file: ConfigFile = serde_json::from_str(&content).context(ConfigParseSnafu { path })?;
        self.apply(file);
        Ok(())
    }

    fn apply(&mut self, file: ConfigFile) {
        let ConfigFile {
            mount_root,
            staging_root,
            post_processor,
            timing_wrapper,
            marker_file,
            dcim_dir,
            extension,
            layout,
            poll_interval_secs,
            retry,
            announce,
            speech_command,
            escalation,
        } = file;

        if let Some(v) = mount_root {
            self.mount_root = v;
        }
        if let Some(v) = staging_root {
            self.staging_root = v;
        }
        if let Some(v) = post_processor {
            self.post_processor = v;
        }
        if let Some(v) = timing_wrapper {
            self.timing_wrapper = v;
        }
        if let Some(v) = marker_file {
            self.marker_file = v;
        }
        if let Some(v) = dcim_dir {
            self.dcim_dir = v;
        }
        if let Some(v) = extension {
            self.extension = v;
        }
        if let Some(v) = layout {
            self.layout = v;
        }
        if let Some(v) = poll_interval_secs {
            self.poll_interval_secs = v;
        }
        if let Some(v) = retry {
            self.retry = v;
        }
        if let Some(v) = announce {
            self.announce = v;
        }
        if let Some(v) = speech_command {
            self.speech_command = v;
        }
        if let Some(v) = escalation {
            self.escalation = v;
        }
    }

    /// Interval between two scans of the mount root.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Creates the staging root if it does not exist yet.
    pub fn ensure_staging_root(&self) -> Result<()> {
        fs::create_dir_all(&self.staging_root).staging_root_context(&self.staging_root)
    }
}
