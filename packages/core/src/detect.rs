//! Detection of mounted cards carrying the negatives marker file.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::info;
use snafu::ResultExt;

use crate::error::{Result, ScanMountRootSnafu};
use crate::scan::is_hidden;

/// A mounted device eligible for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Mount point directory name (e.g. "CARD1").
    pub name: String,
    /// Full mount point path (e.g. "/media/CARD1").
    pub path: PathBuf,
}

/// Scans a mount root for devices carrying a marker file.
#[derive(Debug, Clone)]
pub struct Detector {
    mount_root: PathBuf,
    marker_file: String,
}

impl Detector {
    pub fn new(mount_root: impl Into<PathBuf>, marker_file: impl Into<String>) -> Self {
        Self {
            mount_root: mount_root.into(),
            marker_file: marker_file.into(),
        }
    }

    /// Returns every eligible device, sorted by name.
    ///
    /// A missing mount root yields an empty list.
    pub fn find_all(&self) -> Result<Vec<Device>> {
        let entries = match fs::read_dir(&self.mount_root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).context(ScanMountRootSnafu {
                    path: &self.mount_root,
                });
            }
        };

        let mut devices = Vec::new();
        for entry in entries {
            let entry = entry.context(ScanMountRootSnafu {
                path: &self.mount_root,
            })?;
            let path = entry.path();
            if !path.is_dir() || !path.join(&self.marker_file).is_file() {
                continue;
            }
            let Some(name) = path
                .file_name()
                .and_then(|n| n.to_str())
                .filter(|n| !is_hidden(n))
            else {
                continue;
            };
            devices.push(Device {
                name: name.to_string(),
                path: entry.path(),
            });
        }

        devices.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(devices)
    }

    /// Returns the lexicographically first eligible device, if any.
    pub fn find_first(&self) -> Result<Option<Device>> {
        let device = self.find_all()?.into_iter().next();
        if let Some(device) = &device {
            info!("'{}' is mounted!", device.name);
        }
        Ok(device)
    }
}
