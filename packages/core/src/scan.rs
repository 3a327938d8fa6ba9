//! Enumeration of source directories and candidate files on a card.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::error::{IoResultExt, Result};

/// A candidate file: the directory it lives in and its name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct TransferTask {
    pub source_dir: PathBuf,
    pub file_name: String,
}

impl TransferTask {
    pub fn new(source_dir: impl Into<PathBuf>, file_name: impl Into<String>) -> Self {
        Self {
            source_dir: source_dir.into(),
            file_name: file_name.into(),
        }
    }

    /// Full path of the file on the card.
    pub fn source_path(&self) -> PathBuf {
        self.source_dir.join(&self.file_name)
    }
}

/// A directory on the card holding image files (e.g. `DCIM/100MSDCF`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDir {
    /// Directory name, used to name the staging directory.
    pub name: String,
    pub path: PathBuf,
}

/// Dot-prefixed names, such as the `._DSC0001.ARW` resource forks macOS leaves
/// on a card, are never listed.
pub(crate) fn is_hidden(name: &str) -> bool {
    name.starts_with('.')
}

/// Lists the subdirectories of `<device>/<dcim_dir>`, sorted by name.
///
/// A card without the DCIM directory has no source directories.
pub fn list_source_dirs(device_path: &Path, dcim_dir: &str) -> Result<Vec<SourceDir>> {
    info!("Reading list of {} directories from card...", dcim_dir);
    let dcim = device_path.join(dcim_dir);

    let entries = match fs::read_dir(&dcim) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("No {} directory on the card", dcim_dir);
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).read_dir_context(&dcim),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let entry = entry.read_dir_context(&dcim)?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().filter(|n| !is_hidden(n)) {
            debug!("Directory on card: {}", name);
            dirs.push(SourceDir {
                name: name.to_string(),
                path,
            });
        }
    }

    dirs.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        "Retrieved a list of {} {} directories on the card",
        dirs.len(),
        dcim_dir
    );
    Ok(dirs)
}

/// Lists the visible regular files in `dir` whose extension is exactly
/// `extension`.
pub fn list_candidates(dir: &Path, extension: &str) -> Result<Vec<TransferTask>> {
    info!("Reading card...");

    let mut tasks = Vec::new();
    for entry in fs::read_dir(dir).read_dir_context(dir)? {
        let entry = entry.read_dir_context(dir)?;
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        if let Some(name) = entry.file_name().to_str().filter(|n| !is_hidden(n)) {
            debug!("File on card: {}", path.display());
            tasks.push(TransferTask::new(dir, name));
        }
    }

    tasks.sort();
    info!(
        "Retrieved a list of {} files that are on the card",
        tasks.len()
    );
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tempfile::TempDir;

    #[test]
    fn test_list_source_dirs_sorted() {
        let card = TempDir::new().unwrap();
        let dcim = card.path().join("DCIM");
        fs::create_dir_all(dcim.join("101MSDCF")).unwrap();
        fs::create_dir_all(dcim.join("100MSDCF")).unwrap();
        fs::write(dcim.join("index.dat"), b"").unwrap();

        let dirs = list_source_dirs(card.path(), "DCIM").unwrap();
        let names: Vec<_> = dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["100MSDCF", "101MSDCF"]);
        assert_eq!(dirs[0].path, dcim.join("100MSDCF"));
    }

    #[test]
    fn test_list_source_dirs_without_dcim() {
        let card = TempDir::new().unwrap();
        assert!(list_source_dirs(card.path(), "DCIM").unwrap().is_empty());
    }

    #[test]
    fn test_list_candidates_filters_extension() {
        let dir = TempDir::new().unwrap();
        for name in ["b.ARW", "a.ARW", "a.JPG", "c.arw", "ARW"] {
            fs::write(dir.path().join(name), b"raw").unwrap();
        }
        fs::create_dir(dir.path().join("d.ARW")).unwrap();

        let tasks = list_candidates(dir.path(), "ARW").unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.ARW", "b.ARW"]);
        assert_eq!(tasks[0].source_path(), dir.path().join("a.ARW"));
    }

    #[test]
    fn test_list_candidates_skips_hidden_files() {
        let dir = TempDir::new().unwrap();
        for name in ["a.ARW", "._a.ARW", ".ARW"] {
            fs::write(dir.path().join(name), b"raw").unwrap();
        }

        let tasks = list_candidates(dir.path(), "ARW").unwrap();
        let names: Vec<_> = tasks.iter().map(|t| t.file_name.as_str()).collect();
        assert_eq!(names, vec!["a.ARW"]);
    }

    #[test]
    fn test_list_source_dirs_skips_hidden_dirs() {
        let card = TempDir::new().unwrap();
        let dcim = card.path().join("DCIM");
        fs::create_dir_all(dcim.join("100MSDCF")).unwrap();
        fs::create_dir_all(dcim.join(".Trashes")).unwrap();

        let dirs = list_source_dirs(card.path(), "DCIM").unwrap();
        let names: Vec<_> = dirs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["100MSDCF"]);
    }

    #[test]
    fn test_list_candidates_empty_dir() {
        let dir = TempDir::new().unwrap();
        assert!(list_candidates(dir.path(), "ARW").unwrap().is_empty());
    }

    #[test]
    fn test_list_candidates_missing_dir() {
        let dir = TempDir::new().unwrap();
        let err = list_candidates(&dir.path().join("gone"), "ARW").unwrap_err();
        assert!(matches!(err, Error::ReadDir { .. }));
    }
}
