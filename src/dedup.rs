//! Content-hash deduplication.
//!
//! Only files sharing a size can be identical, so files are grouped by size
//! first and only the members of multi-file size groups are hashed.

use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use md5::Md5;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::config::HashAlgorithm;
use crate::error::{Error, Result};
use crate::scanner::{FolderScanner, Outcome, ScanReport};

const BUFFER_SIZE: usize = 8192;

#[derive(Debug, Clone, PartialEq)]
pub enum DedupOutcome {
    /// No other file has the same content.
    Unique,
    /// First of a group of identical files; the named duplicates were removed.
    Retained { duplicates: Vec<String> },
    /// Removed as a copy of the named file.
    Deleted { kept: String },
}

impl fmt::Display for DedupOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DedupOutcome::Unique => f.write_str("unique"),
            DedupOutcome::Retained { duplicates } => {
                write!(f, "kept, identical to {}", duplicates.join(", "))
            }
            DedupOutcome::Deleted { kept } => write!(f, "deleted, duplicate of {}", kept),
        }
    }
}

enum StreamingHasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl StreamingHasher {
    fn new(algorithm: HashAlgorithm) -> Self {
        match algorithm {
            HashAlgorithm::Md5 => StreamingHasher::Md5(Md5::new()),
            HashAlgorithm::Sha256 => StreamingHasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            StreamingHasher::Md5(h) => h.update(data),
            StreamingHasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize(self) -> String {
        match self {
            StreamingHasher::Md5(h) => hex::encode(h.finalize()),
            StreamingHasher::Sha256(h) => hex::encode(h.finalize()),
        }
    }
}

/// Hex digest of the whole file.
pub fn file_digest(path: &Path, algorithm: HashAlgorithm) -> io::Result<String> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, File::open(path)?);
    let mut hasher = StreamingHasher::new(algorithm);
    let mut buffer = [0u8; BUFFER_SIZE];
    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize())
}

/// Deletes every file whose content equals that of a file listed before it.
///
/// Files that cannot be sized or hashed are reported as failed and are never
/// deleted. Running it again on the same folder deletes nothing.
pub fn deduplicate(scanner: &FolderScanner, algorithm: HashAlgorithm) -> Result<ScanReport<DedupOutcome>> {
    let files = scanner.files()?;
    info!(dir = %scanner.dir().display(), files = files.len(), ?algorithm, "deduplicating");

    let results = remove_duplicates(&files, |path| file_digest(path, algorithm));

    let mut report = ScanReport::new("Deduplication");
    for (path, result) in files.iter().zip(results) {
        report.record(path, result);
    }
    Ok(report)
}

/// Groups `files` by size, then by `digest`, and deletes all but the first
/// member of every group. Returns one result per file, in input order.
fn remove_duplicates<F>(files: &[PathBuf], mut digest: F) -> Vec<Result<Outcome<DedupOutcome>>>
where
    F: FnMut(&Path) -> io::Result<String>,
{
    let mut results: Vec<Option<Result<Outcome<DedupOutcome>>>> = files.iter().map(|_| None).collect();

    let mut by_size: HashMap<u64, Vec<usize>> = HashMap::new();
    for (i, path) in files.iter().enumerate() {
        match fs::metadata(path) {
            Ok(meta) => by_size.entry(meta.len()).or_default().push(i),
            Err(e) => results[i] = Some(Err(Error::io(path, e))),
        }
    }

    let mut size_groups: Vec<Vec<usize>> = by_size.into_values().collect();
    size_groups.sort_by_key(|group| group[0]);

    for group in size_groups {
        if group.len() == 1 {
            results[group[0]] = Some(Ok(Outcome::Done(DedupOutcome::Unique)));
            continue;
        }

        // digest -> members, in listing order
        let mut by_digest: Vec<(String, Vec<usize>)> = Vec::new();
        for i in group {
            match digest(&files[i]) {
                Ok(value) => {
                    debug!(file = %files[i].display(), digest = %value, "hashed");
                    match by_digest.iter_mut().find(|(d, _)| *d == value) {
                        Some((_, members)) => members.push(i),
                        None => by_digest.push((value, vec![i])),
                    }
                }
                Err(e) => results[i] = Some(Err(Error::io(&files[i], e))),
            }
        }

        for (_, members) in by_digest {
            let kept = members[0];
            let kept_name = file_name(&files[kept]);
            let mut removed = Vec::new();
            for &dup in &members[1..] {
                let result = fs::remove_file(&files[dup])
                    .map(|_| {
                        removed.push(file_name(&files[dup]));
                        Outcome::Done(DedupOutcome::Deleted { kept: kept_name.clone() })
                    })
                    .map_err(|e| Error::io(&files[dup], e));
                results[dup] = Some(result);
            }
            let outcome = if removed.is_empty() {
                DedupOutcome::Unique
            } else {
                DedupOutcome::Retained { duplicates: removed }
            };
            results[kept] = Some(Ok(Outcome::Done(outcome)));
        }
    }

    results.into_iter()
        .map(|r| r.unwrap_or_else(|| Ok(Outcome::Skipped("not examined".to_string()))))
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
