//! Transfer sessions.
//!
//! A session is one end-to-end processing of a single card attachment. Its id
//! combines the device name with a minute-resolution local timestamp and names
//! the staging directories the files are moved into.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::config::StagingLayout;

/// Timestamp format used in session ids (minute resolution).
pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// Identifier of one card attachment, e.g. `CARD1_202610190812`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Session {
    id: String,
}

impl Session {
    /// Creates the session for `device_name` at the given local time.
    pub fn new(device_name: &str, timestamp: NaiveDateTime) -> Self {
        Self {
            id: format!(
                "{}_{}",
                device_name,
                timestamp.format(SESSION_TIMESTAMP_FORMAT)
            ),
        }
    }

    /// Creates the session for `device_name` at the current local time.
    pub fn start(device_name: &str) -> Self {
        Self::new(device_name, Local::now().naive_local())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the staging directory for files coming from `subdir`.
    ///
    /// With [`StagingLayout::Flat`] the subdirectory is ignored and every file
    /// of the session shares `<root>/<session>`.
    pub fn staging_dir(&self, root: &Path, layout: StagingLayout, subdir: &str) -> PathBuf {
        match layout {
            StagingLayout::PerSubdirectory => root.join(format!("{}_{}", self.id, subdir)),
            StagingLayout::Flat => root.join(&self.id),
        }
    }
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}
