//! Statistics over a folder of recordings and their CSV/text exports.
//!
//! Everything here is recomputed from disk on each call; nothing is cached
//! between runs.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::recording::{Recording, Sex};
use crate::scanner::{FolderScanner, Outcome, ScanReport};
use crate::transliterate::Transliterate;

pub const PATIENT_TABLE_FILE: &str = "patient_table.csv";
pub const METADATA_FILE: &str = "edf_metadata_stats.csv";
pub const TEXT_REPORT_FILE: &str = "descriptive_stats.txt";

/// The part of a recording the statistics need.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordingSummary {
    pub file_name: String,
    pub patient_name: String,
    pub sex: Sex,
    /// `None` when the birthdate is missing or after the recording date.
    pub age: Option<u32>,
    pub duration_minutes: f64,
}

impl RecordingSummary {
    pub fn from_recording(recording: &Recording) -> Self {
        RecordingSummary {
            file_name: recording.file_name(),
            patient_name: recording.patient_name.clone(),
            sex: recording.sex,
            age: recording.age_at_recording(),
            duration_minutes: recording.duration / 60.0,
        }
    }
}

impl fmt::Display for RecordingSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, age {}, {:.1} min", self.sex, age_text(self.age), self.duration_minutes)
    }
}

fn age_text(age: Option<u32>) -> String {
    age.map(|a| a.to_string()).unwrap_or_else(|| "Unknown".to_string())
}

/// Fixed-width histogram keyed by the lower bound of each bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub bin_width: u32,
    pub bins: BTreeMap<u32, usize>,
}

impl Histogram {
    pub fn new(bin_width: u32) -> Self {
        Histogram { bin_width: bin_width.max(1), bins: BTreeMap::new() }
    }

    pub fn add(&mut self, value: f64) {
        if !(value >= 0.0) {
            return;
        }
        let lower = ((value / self.bin_width as f64).floor() as u32).saturating_mul(self.bin_width);
        *self.bins.entry(lower).or_insert(0) += 1;
    }

    pub fn total(&self) -> usize {
        self.bins.values().sum()
    }

    /// `[lower, upper)` label of a bin.
    pub fn label(&self, lower: u32) -> String {
        format!("{}-{}", lower, lower as u64 + self.bin_width as u64)
    }
}

/// count / mean / min / max / sample standard deviation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Descriptive {
    pub count: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub std: f64,
}

impl Descriptive {
    pub fn of(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let std = if count > 1 {
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64).sqrt()
        } else {
            0.0
        };
        Some(Descriptive { count, mean, min, max, std })
    }
}

#[derive(Debug, Clone)]
pub struct StatisticsReport {
    pub recordings: Vec<RecordingSummary>,
    pub sex_counts: BTreeMap<Sex, usize>,
    /// Recordings whose age could not be determined.
    pub unknown_age: usize,
    pub age_histogram: Histogram,
    pub duration_histogram: Histogram,
    pub age: Option<Descriptive>,
    pub duration: Option<Descriptive>,
}

impl StatisticsReport {
    pub fn from_summaries(recordings: Vec<RecordingSummary>, config: &Config) -> Self {
        let mut sex_counts: BTreeMap<Sex, usize> =
            [Sex::Male, Sex::Female, Sex::Unknown].into_iter().map(|s| (s, 0)).collect();
        let mut age_histogram = Histogram::new(config.age_bin_years);
        let mut duration_histogram = Histogram::new(config.duration_bin_minutes);
        let mut ages = Vec::new();
        let mut durations = Vec::new();
        let mut unknown_age = 0;

        for r in &recordings {
            *sex_counts.entry(r.sex).or_insert(0) += 1;
            match r.age {
                Some(age) => {
                    age_histogram.add(age as f64);
                    ages.push(age as f64);
                }
                None => unknown_age += 1,
            }
            duration_histogram.add(r.duration_minutes);
            durations.push(r.duration_minutes);
        }

        StatisticsReport {
            sex_counts,
            unknown_age,
            age_histogram,
            duration_histogram,
            age: Descriptive::of(&ages),
            duration: Descriptive::of(&durations),
            recordings,
        }
    }

    pub fn total(&self) -> usize {
        self.recordings.len()
    }

    /// `name,sex,age`: one row per distinct patient, ordered by name.
    pub fn write_patient_table(&self, path: &Path, transliterator: &dyn Transliterate) -> Result<usize> {
        let rows: BTreeSet<(String, &'static str, String)> = self.recordings.iter()
            .map(|r| {
                let name = transliterator.transliterate(&r.patient_name);
                let name = if name.trim().is_empty() { "Unknown".to_string() } else { name };
                (name, r.sex.code(), age_text(r.age))
            })
            .collect();

        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["name", "sex", "age"])?;
        for (name, sex, age) in &rows {
            writer.write_record([name.as_str(), sex, age.as_str()])?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(rows.len())
    }

    /// `file_name,sex,age,duration_minutes`: one row per recording.
    pub fn write_metadata_table(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["file_name", "sex", "age", "duration_minutes"])?;
        for r in &self.recordings {
            writer.write_record([
                r.file_name.clone(),
                r.sex.code().to_string(),
                age_text(r.age),
                format!("{:.2}", r.duration_minutes),
            ])?;
        }
        writer.flush().map_err(|e| Error::io(path, e))?;
        Ok(())
    }
}

/// Turns a report into presentation files (plots, text).
pub trait ReportRenderer {
    /// Writes into `out_dir` and returns the files it created.
    fn render(&self, report: &StatisticsReport, out_dir: &Path) -> Result<Vec<PathBuf>>;
}

/// Plain-text summary with bar-chart histograms.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextRenderer;

impl TextRenderer {
    pub fn to_text(report: &StatisticsReport) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Recordings: {}", report.total());

        let _ = writeln!(out, "\nSex");
        for (sex, count) in &report.sex_counts {
            let _ = writeln!(out, "  {:<8} {}", sex.to_string(), count);
        }

        let _ = writeln!(out, "\nAge (years), unknown: {}", report.unknown_age);
        write_descriptive(&mut out, report.age);
        write_histogram(&mut out, &report.age_histogram);

        let _ = writeln!(out, "\nDuration (minutes)");
        write_descriptive(&mut out, report.duration);
        write_histogram(&mut out, &report.duration_histogram);
        out
    }
}

fn write_descriptive(out: &mut String, stats: Option<Descriptive>) {
    match stats {
        Some(d) => {
            let _ = writeln!(
                out,
                "  count {}  mean {:.2}  min {:.2}  max {:.2}  std {:.2}",
                d.count, d.mean, d.min, d.max, d.std
            );
        }
        None => {
            let _ = writeln!(out, "  no data");
        }
    }
}

fn write_histogram(out: &mut String, histogram: &Histogram) {
    for (&lower, &count) in &histogram.bins {
        let _ = writeln!(out, "  {:>9} | {} {}", histogram.label(lower), "#".repeat(count), count);
    }
}

impl ReportRenderer for TextRenderer {
    fn render(&self, report: &StatisticsReport, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let path = out_dir.join(TEXT_REPORT_FILE);
        fs::write(&path, Self::to_text(report)).map_err(|e| Error::io(&path, e))?;
        Ok(vec![path])
    }
}

/// Reads every recording once. Unreadable files become failed entries and
/// contribute nothing to the statistics.
pub fn collect_statistics(
    scanner: &FolderScanner,
    config: &Config,
) -> Result<(ScanReport<RecordingSummary>, StatisticsReport)> {
    let scan = scanner.scan("Statistics", |path: &Path| {
        let recording = Recording::open(path)?;
        Ok(Outcome::Done(RecordingSummary::from_recording(&recording)))
    })?;

    let summaries: Vec<RecordingSummary> = scan.done().map(|(_, s)| s.clone()).collect();
    let report = StatisticsReport::from_summaries(summaries, config);
    info!(recordings = report.total(), failed = scan.failed(), "statistics collected");
    Ok((scan, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transliterate::Cyrillic;

    fn summary(name: &str, sex: Sex, age: Option<u32>, minutes: f64) -> RecordingSummary {
        RecordingSummary {
            file_name: format!("{}.edf", name),
            patient_name: name.to_string(),
            sex,
            age,
            duration_minutes: minutes,
        }
    }

    fn sample() -> StatisticsReport {
        StatisticsReport::from_summaries(
            vec![
                summary("Petrov", Sex::Male, Some(34), 20.0),
                summary("Anna", Sex::Female, Some(38), 9.5),
                summary("Anna", Sex::Female, Some(38), 31.0),
                summary("", Sex::Unknown, None, 45.0),
            ],
            &Config::default(),
        )
    }

    #[test]
    fn test_counts_and_histograms() {
        let report = sample();
        assert_eq!(report.sex_counts[&Sex::Male], 1);
        assert_eq!(report.sex_counts[&Sex::Female], 2);
        assert_eq!(report.sex_counts[&Sex::Unknown], 1);
        assert_eq!(report.unknown_age, 1);
        assert_eq!(report.age_histogram.bins.get(&30), Some(&3));
        assert_eq!(report.age_histogram.total(), 3);
        assert_eq!(report.duration_histogram.bins.keys().copied().collect::<Vec<_>>(), vec![0, 20, 30, 40]);
        assert_eq!(report.age_histogram.label(30), "30-40");
    }

    #[test]
    fn test_histogram_saturates_huge_values() {
        let mut histogram = Histogram::new(10);
        histogram.add(1.5e10);
        histogram.add(f64::NAN);
        assert_eq!(histogram.total(), 1);
        let lower = *histogram.bins.keys().next().unwrap();
        assert_eq!(lower, u32::MAX);
        assert_eq!(histogram.label(lower), format!("{}-{}", u32::MAX, u32::MAX as u64 + 10));
    }

    #[test]
    fn test_descriptive() {
        let d = Descriptive::of(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(d.count, 8);
        assert_eq!(d.mean, 5.0);
        assert_eq!((d.min, d.max), (2.0, 9.0));
        assert!((d.std - 2.138).abs() < 1e-3);
        assert_eq!(Descriptive::of(&[]), None);
        assert_eq!(Descriptive::of(&[3.0]).unwrap().std, 0.0);
    }

    #[test]
    fn test_patient_table_is_distinct_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PATIENT_TABLE_FILE);
        let rows = sample().write_patient_table(&path, &Cyrillic).unwrap();
        assert_eq!(rows, 3);

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "name,sex,age\nAnna,F,38\nPetrov,M,34\nUnknown,Unknown,Unknown\n");
    }

    #[test]
    fn test_text_renderer() {
        let dir = tempfile::tempdir().unwrap();
        let files = TextRenderer.render(&sample(), dir.path()).unwrap();
        let text = fs::read_to_string(&files[0]).unwrap();
        assert!(text.starts_with("Recordings: 4\n"));
        assert!(text.contains("Age (years), unknown: 1"));
        assert!(text.contains("30-40 | ### 3"));
    }
}
