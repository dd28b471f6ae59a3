//! Folder enumeration and per-file outcome collection.
//!
//! Every batch operation runs through [`FolderScanner::scan`] (or builds a
//! [`ScanReport`] itself): a failing file becomes a `Failed` entry and the
//! batch moves on to the next file.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

/// What an operation reports for a file it handled without error.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Skipped(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Status<T> {
    Done(T),
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct FileEntry<T> {
    pub path: PathBuf,
    pub status: Status<T>,
}

impl<T> FileEntry<T> {
    pub fn file_name(&self) -> String {
        self.path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

/// Per-file outcomes of one batch, in processing order.
#[derive(Debug, Clone)]
pub struct ScanReport<T> {
    pub operation: String,
    pub entries: Vec<FileEntry<T>>,
}

impl<T> ScanReport<T> {
    pub fn new(operation: &str) -> Self {
        ScanReport { operation: operation.to_string(), entries: Vec::new() }
    }

    /// Records the result of processing one file.
    pub fn record(&mut self, path: &Path, result: Result<Outcome<T>>) {
        let status = match result {
            Ok(Outcome::Done(value)) => Status::Done(value),
            Ok(Outcome::Skipped(reason)) => {
                info!(file = %path.display(), %reason, "skipped");
                Status::Skipped(reason)
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "{} failed", self.operation);
                Status::Failed(e.to_string())
            }
        };
        self.entries.push(FileEntry { path: path.to_path_buf(), status });
    }

    pub fn succeeded(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.status, Status::Done(_))).count()
    }

    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.status, Status::Failed(_))).count()
    }

    pub fn skipped(&self) -> usize {
        self.entries.iter().filter(|e| matches!(e.status, Status::Skipped(_))).count()
    }

    /// Successful values with their paths.
    pub fn done(&self) -> impl Iterator<Item = (&Path, &T)> {
        self.entries.iter().filter_map(|e| match &e.status {
            Status::Done(value) => Some((e.path.as_path(), value)),
            _ => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.entries.iter().filter_map(|e| match &e.status {
            Status::Failed(message) => Some((e.path.as_path(), message.as_str())),
            _ => None,
        })
    }
}

impl<T: fmt::Display> ScanReport<T> {
    /// Plain-text listing of every file followed by the totals.
    pub fn summary(&self) -> String {
        let mut out = format!("{}\n", self.operation);
        for entry in &self.entries {
            let line = match &entry.status {
                Status::Done(value) => format!("  OK      {}: {}\n", entry.file_name(), value),
                Status::Skipped(reason) => format!("  SKIPPED {}: {}\n", entry.file_name(), reason),
                Status::Failed(message) => format!("  FAILED  {}: {}\n", entry.file_name(), message),
            };
            out.push_str(&line);
        }
        out.push_str(&format!(
            "Total: {} files, {} succeeded, {} failed, {} skipped\n",
            self.entries.len(),
            self.succeeded(),
            self.failed(),
            self.skipped()
        ));
        out
    }
}

pub struct FolderScanner {
    dir: PathBuf,
    config: Config,
}

impl FolderScanner {
    pub fn new<P: AsRef<Path>>(dir: P, config: &Config) -> Self {
        FolderScanner { dir: dir.as_ref().to_path_buf(), config: config.clone() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Regular files with a recognised extension, ordered by file name.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| Error::io(&self.dir, e))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::io(&self.dir, e))?;
            let path = entry.path();
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if is_file && self.config.matches_extension(&path) {
                files.push(path);
            }
        }
        files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(files)
    }

    /// Applies `op` to every file in listing order. Only a failure to list
    /// the directory aborts the batch.
    pub fn scan<T, F>(&self, operation: &str, mut op: F) -> Result<ScanReport<T>>
    where
        F: FnMut(&Path) -> Result<Outcome<T>>,
    {
        let files = self.files()?;
        info!(dir = %self.dir.display(), files = files.len(), "{}", operation);

        let mut report = ScanReport::new(operation);
        for path in &files {
            let result = op(path);
            report.record(path, result);
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_is_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.edf", "a.EDF", "b.txt", "b.edf"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("d.edf")).unwrap();

        let scanner = FolderScanner::new(dir.path(), &Config::default());
        let names: Vec<String> = scanner.files().unwrap().iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.EDF", "b.edf", "c.edf"]);
    }

    #[test]
    fn test_failures_do_not_abort_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["1.edf", "2.edf", "3.edf"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let scanner = FolderScanner::new(dir.path(), &Config::default());
        let report = scanner.scan("test", |path| {
            match path.file_name().unwrap().to_str().unwrap() {
                "1.edf" => Ok(Outcome::Done(1)),
                "2.edf" => Err(Error::Validation("broken".to_string())),
                _ => Ok(Outcome::Skipped("nothing to do".to_string())),
            }
        }).unwrap();

        assert_eq!((report.succeeded(), report.failed(), report.skipped()), (1, 1, 1));
        assert_eq!(report.failures().next().unwrap().1, "validation error: broken");
        let summary = report.summary();
        assert!(summary.contains("FAILED  2.edf"));
        assert!(summary.ends_with("Total: 3 files, 1 succeeded, 1 failed, 1 skipped\n"));
    }

    #[test]
    fn test_missing_directory_is_fatal() {
        let scanner = FolderScanner::new("/definitely/not/here", &Config::default());
        assert!(matches!(scanner.files(), Err(Error::Io { .. })));
    }
}
