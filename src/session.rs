//! The state a front end holds between operations: the selected folder, the
//! configuration and the collaborators. Every operation takes it explicitly.

use std::fs;
use std::path::{Path, PathBuf};
use chrono::NaiveDateTime;
use rand::Rng;

use crate::anonymize::anonymize_file;
use crate::clustering::{find_similar_start_times, StartTimeCluster};
use crate::config::Config;
use crate::dedup::{deduplicate, DedupOutcome};
use crate::error::{Error, Result};
use crate::info::describe;
use crate::integrity::{check_file, Integrity};
use crate::recording::Recording;
use crate::rename::{randomize_filenames, rename_by_metadata};
use crate::scanner::{FolderScanner, Outcome, ScanReport};
use crate::segment::{segment_recording, Segmentation};
use crate::stats::{
    collect_statistics, RecordingSummary, ReportRenderer, StatisticsReport, METADATA_FILE, PATIENT_TABLE_FILE,
};
use crate::transliterate::{Cyrillic, Transliterate};

pub const SEGMENTS_DIR: &str = "segments";

/// Result of a statistics run: per-file outcomes, the aggregate and every
/// file written.
#[derive(Debug)]
pub struct StatisticsRun {
    pub scan: ScanReport<RecordingSummary>,
    pub report: StatisticsReport,
    pub files: Vec<PathBuf>,
}

pub struct Session {
    directory: PathBuf,
    config: Config,
    transliterator: Box<dyn Transliterate>,
}

impl Session {
    pub fn new<P: AsRef<Path>>(directory: P, config: Config) -> Result<Self> {
        config.validate()?;
        Ok(Session {
            directory: directory.as_ref().to_path_buf(),
            config,
            transliterator: Box::new(Cyrillic),
        })
    }

    /// Replaces the default Cyrillic transliteration.
    pub fn with_transliterator(mut self, transliterator: Box<dyn Transliterate>) -> Self {
        self.transliterator = transliterator;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `output_dir` from the configuration, resolved against the folder.
    pub fn output_dir(&self) -> PathBuf {
        let configured = Path::new(&self.config.output_dir);
        if configured.is_absolute() {
            configured.to_path_buf()
        } else {
            self.directory.join(configured)
        }
    }

    pub fn segments_dir(&self) -> PathBuf {
        self.output_dir().join(SEGMENTS_DIR)
    }

    fn scanner(&self) -> FolderScanner {
        FolderScanner::new(&self.directory, &self.config)
    }

    fn ensure_output_dir(&self) -> Result<PathBuf> {
        let dir = self.output_dir();
        fs::create_dir_all(&dir).map_err(|e| Error::io(&dir, e))?;
        Ok(dir)
    }

    pub fn rename_files(&self) -> Result<ScanReport<String>> {
        let transliterator = self.transliterator.as_ref();
        self.scanner().scan("Rename by metadata", |path| rename_by_metadata(path, transliterator))
    }

    pub fn check_corrupted(&self) -> Result<ScanReport<Integrity>> {
        self.scanner().scan("Corruption check", check_file)
    }

    pub fn deduplicate(&self) -> Result<ScanReport<DedupOutcome>> {
        deduplicate(&self.scanner(), self.config.dedup_hash)
    }

    pub fn find_similar(&self) -> Result<(ScanReport<NaiveDateTime>, Vec<StartTimeCluster>)> {
        let tolerance = self.config.tolerance().ok_or_else(|| Error::Config(format!(
            "start_time_tolerance_minutes out of range, got {}", self.config.start_time_tolerance_minutes
        )))?;
        find_similar_start_times(&self.scanner(), tolerance)
    }

    /// Aggregates the folder and writes both CSV tables plus whatever the
    /// renderer produces into the output directory.
    pub fn statistics(&self, renderer: &dyn ReportRenderer) -> Result<StatisticsRun> {
        let (scan, report) = collect_statistics(&self.scanner(), &self.config)?;
        let out = self.ensure_output_dir()?;

        let patient_table = out.join(PATIENT_TABLE_FILE);
        report.write_patient_table(&patient_table, self.transliterator.as_ref())?;
        let metadata = out.join(METADATA_FILE);
        report.write_metadata_table(&metadata)?;

        let mut files = vec![patient_table, metadata];
        files.extend(renderer.render(&report, &out)?);
        Ok(StatisticsRun { scan, report, files })
    }

    /// Writes only `patient_table.csv`.
    pub fn patient_table(&self) -> Result<(ScanReport<RecordingSummary>, PathBuf)> {
        let (scan, report) = collect_statistics(&self.scanner(), &self.config)?;
        let path = self.ensure_output_dir()?.join(PATIENT_TABLE_FILE);
        report.write_patient_table(&path, self.transliterator.as_ref())?;
        Ok((scan, path))
    }

    pub fn randomize_filenames(&self) -> Result<(ScanReport<String>, PathBuf)> {
        self.randomize_filenames_with(&mut rand::thread_rng())
    }

    pub fn randomize_filenames_with<R: Rng>(&self, rng: &mut R) -> Result<(ScanReport<String>, PathBuf)> {
        randomize_filenames(&self.scanner(), &self.output_dir(), rng)
    }

    pub fn anonymize(&self) -> Result<ScanReport<String>> {
        let placeholder = self.config.anonymize_placeholder.as_str();
        self.scanner().scan("Anonymization", |path| anonymize_file(path, placeholder))
    }

    /// Splits one recording into the segments directory.
    pub fn segment(&self, file: &Path) -> Result<Outcome<Segmentation>> {
        segment_recording(file, &self.segments_dir(), &self.config)
    }

    pub fn info(&self, file: &Path) -> Result<String> {
        Ok(describe(&Recording::open(file)?))
    }
}
