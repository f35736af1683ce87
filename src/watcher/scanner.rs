//! Directory scanner for the initial load and for name resolution.
//!
//! Walks the whole tree, following no symlinks, and reports every delimited
//! data file found.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::filter::is_delimited_file;
use crate::error::WatcherError;
use crate::Result;

/// Result of walking a directory tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Delimited data files, sorted.
    pub files: Vec<PathBuf>,
    /// Regular files that were not recognized.
    pub skipped: u64,
    /// Entries that could not be read.
    pub errors: u64,
}

/// Find every delimited data file under `root`.
///
/// Unreadable entries are logged and counted, not fatal.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub fn scan_directory(root: &Path) -> Result<ScanReport> {
    ensure_directory(root)?;

    let mut report = ScanReport::default();

    for entry in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        match entry {
            Ok(entry) => {
                if !entry.file_type().is_file() {
                    continue;
                }
                if is_delimited_file(entry.path()) {
                    report.files.push(entry.into_path());
                } else {
                    report.skipped += 1;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                report.errors += 1;
            }
        }
    }

    report.files.sort();

    tracing::debug!(
        path = %root.display(),
        found = report.files.len(),
        skipped = report.skipped,
        errors = report.errors,
        "Directory scan complete"
    );

    Ok(report)
}

/// Every directory under `root`, `root` included, parents before children.
///
/// # Errors
///
/// Returns an error if `root` is not a readable directory.
pub fn list_directories(root: &Path) -> Result<Vec<PathBuf>> {
    ensure_directory(root)?;

    let dirs = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) if entry.file_type().is_dir() => Some(entry.into_path()),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Error walking directory");
                None
            }
        })
        .collect();

    Ok(dirs)
}

fn ensure_directory(root: &Path) -> Result<()> {
    if root.is_dir() {
        return Ok(());
    }
    Err(WatcherError::WatchFailed {
        path: root.display().to_string(),
        reason: "not a directory".to_string(),
    }
    .into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_scan_directory() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();

        fs::write(tmp.path().join("users.csv"), "id\n1\n").unwrap();
        fs::write(sub.join("sales.TSV"), "id\n1\n").unwrap();
        fs::write(tmp.path().join("README.md"), "# readme").unwrap();
        fs::write(tmp.path().join(".csvql.db"), "").unwrap();

        let report = scan_directory(tmp.path()).unwrap();

        assert_eq!(
            report.files,
            vec![sub.join("sales.TSV"), tmp.path().join("users.csv")]
        );
        assert_eq!(report.skipped, 2);
        assert_eq!(report.errors, 0);
    }

    #[test]
    fn test_scan_ignores_directories_named_like_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("archive.csv")).unwrap();

        let report = scan_directory(tmp.path()).unwrap();
        assert!(report.files.is_empty());
    }

    #[test]
    fn test_scan_missing_root() {
        let err = scan_directory(Path::new("/nonexistent/root")).unwrap_err();
        assert!(matches!(
            err,
            crate::Error::Watcher(WatcherError::WatchFailed { .. })
        ));
    }

    #[test]
    fn test_list_directories() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("a").join("b")).unwrap();
        fs::write(tmp.path().join("a").join("x.csv"), "h\n").unwrap();

        let dirs = list_directories(tmp.path()).unwrap();
        assert_eq!(
            dirs,
            vec![
                tmp.path().to_path_buf(),
                tmp.path().join("a"),
                tmp.path().join("a").join("b"),
            ]
        );
    }
}
