//! Unified error types for the n2p-dcim-core library.
//!
//! Uses SNAFU for context-rich error handling, since the same underlying
//! `std::io::Error` shows up while reading the card, staging files and
//! spawning processes.

use snafu::{ResultExt, Snafu};
use std::path::PathBuf;

/// Result type alias using the library's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for all core library operations.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// Home directory not found while resolving default paths.
    #[snafu(display("could not determine home directory"))]
    HomeDirNotFound,

    /// Configuration file cannot be read.
    #[snafu(display("failed to read config at {}", path.display()))]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON for [`crate::config::Config`].
    #[snafu(display("failed to parse config at {}", path.display()))]
    ConfigParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// Staging root could not be created at startup.
    #[snafu(display("failed to create staging root at {}", path.display()))]
    StagingRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Mount root exists but cannot be listed.
    #[snafu(display("failed to scan mount root {}", path.display()))]
    ScanMountRoot {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A directory on the card cannot be listed.
    #[snafu(display("failed to read directory {}", path.display()))]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to query file metadata.
    #[snafu(display("failed to stat {}", path.display()))]
    Stat { path: PathBuf, source: nix::Error },

    /// Failed to execute a system command.
    #[snafu(display("failed to execute command '{command}'"))]
    CommandExecution {
        command: String,
        source: std::io::Error,
    },

    /// Command executed but returned non-zero exit code.
    #[snafu(display("command '{command}' exited with code {code}: {stderr}"))]
    CommandExit {
        command: String,
        code: i32,
        stderr: String,
    },

    /// Unmount operation failed.
    #[snafu(display("failed to unmount {}", path.display()))]
    Unmount {
        path: PathBuf,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },

    /// Post-processing executable is missing.
    #[snafu(display("post-processor not found at {}", path.display()))]
    PostProcessorNotFound { path: PathBuf },

    /// Post-processor could not be spawned.
    #[snafu(display("failed to launch '{program}' in {}", cwd.display()))]
    Launch {
        program: String,
        cwd: PathBuf,
        source: std::io::Error,
    },
}

/// Extension trait for adding context to io::Error results.
pub trait IoResultExt<T> {
    /// Add context for command execution errors.
    fn command_context(self, command: impl Into<String>) -> Result<T>;

    /// Add context for directory listing errors.
    fn read_dir_context(self, path: impl Into<PathBuf>) -> Result<T>;

    /// Add context for staging root creation errors.
    fn staging_root_context(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::result::Result<T, std::io::Error> {
    fn command_context(self, command: impl Into<String>) -> Result<T> {
        self.context(CommandExecutionSnafu {
            command: command.into(),
        })
    }

    fn read_dir_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(ReadDirSnafu { path: path.into() })
    }

    fn staging_root_context(self, path: impl Into<PathBuf>) -> Result<T> {
        self.context(StagingRootSnafu { path: path.into() })
    }
}
