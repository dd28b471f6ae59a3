//! Renaming recordings, either after their metadata or to random codes.

use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use rand::Rng;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::recording::Recording;
use crate::scanner::{FolderScanner, Outcome, ScanReport};
use crate::transliterate::Transliterate;

pub const MAPPING_FILE_STEM: &str = "name_mapping";

/// `Ivanov_Ivan` style name part: transliterated, split on underscores and
/// whitespace, alphabetic words capitalised, unsafe characters replaced.
pub fn format_patient_name(name: &str, transliterator: &dyn Transliterate) -> String {
    let safe: String = transliterator.transliterate(name)
        .chars()
        .map(|c| match c {
            c if c.is_ascii_alphanumeric() || c == '-' => c,
            c if c.is_whitespace() => ' ',
            _ => '_',
        })
        .collect();

    let parts: Vec<String> = safe
        .split(|c: char| c == '_' || c == ' ')
        .filter(|p| !p.is_empty())
        .map(|part| {
            if part.chars().all(|c| c.is_ascii_alphabetic()) {
                capitalize(part)
            } else {
                part.to_string()
            }
        })
        .collect();

    let joined = parts.join("_");
    let joined = joined.trim_matches('_');
    if joined.is_empty() {
        "Unknown".to_string()
    } else {
        joined.to_string()
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// `<Name>_<YYYY-MM-DD_HH-MM-SS>`, without extension.
pub fn metadata_stem(name: &str, start: NaiveDateTime, transliterator: &dyn Transliterate) -> String {
    format!("{}_{}", format_patient_name(name, transliterator), start.format("%Y-%m-%d_%H-%M-%S"))
}

fn with_extension(stem: &str, ext: Option<&str>) -> String {
    match ext {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem.to_string(),
    }
}

/// Where `path` should be renamed to, or `None` when it already carries
/// its name. Existing files get `_1`, `_2`, ... suffixes.
fn rename_target(path: &Path, stem: &str) -> Option<PathBuf> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let ext = path.extension().and_then(|e| e.to_str());

    let mut counter = 0;
    loop {
        let candidate_stem = if counter == 0 { stem.to_string() } else { format!("{}_{}", stem, counter) };
        let candidate = dir.join(with_extension(&candidate_stem, ext));
        if candidate == path {
            return None;
        }
        if !candidate.exists() {
            return Some(candidate);
        }
        counter += 1;
    }
}

/// Renames one file after its patient name and recording start.
pub fn rename_by_metadata(path: &Path, transliterator: &dyn Transliterate) -> Result<Outcome<String>> {
    let recording = Recording::open(path)?;
    let stem = metadata_stem(&recording.patient_name, recording.start, transliterator);
    drop(recording);

    let target = match rename_target(path, &stem) {
        Some(target) => target,
        None => return Ok(Outcome::Skipped("already named after its metadata".to_string())),
    };
    fs::rename(path, &target).map_err(|e| Error::io(path, e))?;
    let new_name = target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    debug!(from = %path.display(), to = %new_name, "renamed");
    Ok(Outcome::Done(new_name))
}

/// First free `name_mapping.csv`, `name_mapping_1.csv`, ... in `out_dir`.
pub fn mapping_path(out_dir: &Path) -> PathBuf {
    let first = out_dir.join(format!("{}.csv", MAPPING_FILE_STEM));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| out_dir.join(format!("{}_{}.csv", MAPPING_FILE_STEM, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Append-only `original name,new name` table of one randomization run.
pub struct RenameMapping {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl RenameMapping {
    /// Creates a fresh mapping file; an existing file is never reused.
    pub fn create(out_dir: &Path) -> Result<Self> {
        fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;
        let path = mapping_path(out_dir);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| Error::io(&path, e))?;

        let mut writer = csv::Writer::from_writer(file);
        writer.write_record(["original name", "new name"])?;
        writer.flush().map_err(|e| Error::io(&path, e))?;
        Ok(RenameMapping { path, writer, rows: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Appends one row and flushes it to disk.
    pub fn append(&mut self, original: &str, new: &str) -> Result<()> {
        self.writer.write_record([original, new])?;
        self.writer.flush().map_err(|e| Error::io(&self.path, e))?;
        self.rows += 1;
        Ok(())
    }
}

/// Six-digit code not yet used in this run and free on disk.
fn unique_code<R: Rng>(rng: &mut R, dir: &Path, ext: Option<&str>, used: &mut HashSet<String>) -> String {
    loop {
        let code = format!("{:06}", rng.gen_range(0..1_000_000));
        if used.contains(&code) || dir.join(with_extension(&code, ext)).exists() {
            continue;
        }
        used.insert(code.clone());
        return code;
    }
}

/// Gives every recognised file a random six-digit name, recording each
/// successful rename in a new mapping CSV inside `out_dir`.
pub fn randomize_filenames<R: Rng>(
    scanner: &FolderScanner,
    out_dir: &Path,
    rng: &mut R,
) -> Result<(ScanReport<String>, PathBuf)> {
    let files = scanner.files()?;
    let mut mapping = RenameMapping::create(out_dir)?;
    info!(files = files.len(), mapping = %mapping.path().display(), "randomizing file names");

    let mut used = HashSet::new();
    let mut report = ScanReport::new("Filename randomization");
    for path in &files {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let ext = path.extension().and_then(|e| e.to_str());
        let new_name = with_extension(&unique_code(rng, dir, ext, &mut used), ext);
        let original = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();

        let result = fs::rename(path, dir.join(&new_name))
            .map_err(|e| Error::io(path, e))
            .and_then(|_| mapping.append(&original, &new_name))
            .map(|_| Outcome::Done(new_name));
        report.record(path, result);
    }

    info!(renamed = mapping.rows(), "mapping written");
    Ok((report, mapping.path().to_path_buf()))
}
