use std::path::Path;
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::events::DEFAULT_EXCLUDED_EVENTS;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Md5,
    Sha256,
}

/// Engine settings. Every field has a default, so a config file only needs
/// the values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Recognised recording extensions, without the dot, case-insensitive
    pub extensions: Vec<String>,
    /// Output directory; relative paths are resolved against the scanned folder
    pub output_dir: String,
    /// Shortest segment kept by the segmentation engine, in seconds
    pub min_segment_duration_secs: f64,
    /// Maximum distance from a cluster's first recording, in minutes
    pub start_time_tolerance_minutes: i64,
    /// Event labels ignored as segment boundaries
    pub excluded_events: Vec<String>,
    pub dedup_hash: HashAlgorithm,
    /// Text written in place of the patient name when anonymizing
    pub anonymize_placeholder: String,
    pub age_bin_years: u32,
    pub duration_bin_minutes: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            extensions: vec!["edf".to_string()],
            output_dir: "output".to_string(),
            min_segment_duration_secs: 5.0,
            start_time_tolerance_minutes: 10,
            excluded_events: DEFAULT_EXCLUDED_EVENTS.iter().map(|s| s.to_string()).collect(),
            dedup_hash: HashAlgorithm::Md5,
            anonymize_placeholder: "X".to_string(),
            age_bin_years: 10,
            duration_bin_minutes: 10,
        }
    }
}

impl Config {
    /// Loads a JSON configuration file and validates it.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        let config: Config = serde_json::from_str(&contents)
            .map_err(|e| Error::Config(format!("could not parse {}: {}", path.display(), e)))?;
        config.validate()?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.min_segment_duration_secs > 0.0 && self.min_segment_duration_secs.is_finite()) {
            return Err(Error::Config(format!(
                "min_segment_duration_secs must be positive, got {}", self.min_segment_duration_secs
            )));
        }
        if self.start_time_tolerance_minutes < 0 {
            return Err(Error::Config(format!(
                "start_time_tolerance_minutes must not be negative, got {}", self.start_time_tolerance_minutes
            )));
        }
        if self.tolerance().is_none() {
            return Err(Error::Config(format!(
                "start_time_tolerance_minutes out of range, got {}", self.start_time_tolerance_minutes
            )));
        }
        if self.extensions.iter().all(|e| e.trim().is_empty()) {
            return Err(Error::Config("at least one file extension is required".to_string()));
        }
        if self.age_bin_years == 0 || self.duration_bin_minutes == 0 {
            return Err(Error::Config("histogram bin widths must be positive".to_string()));
        }
        if self.anonymize_placeholder.trim().is_empty()
            || self.anonymize_placeholder.contains(char::is_whitespace)
            || !self.anonymize_placeholder.is_ascii()
        {
            return Err(Error::Config("anonymize_placeholder must be a single ASCII word".to_string()));
        }
        Ok(())
    }

    /// Start-time tolerance as a duration; `None` when out of range.
    pub fn tolerance(&self) -> Option<Duration> {
        Duration::try_minutes(self.start_time_tolerance_minutes)
    }

    pub fn matches_extension(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.extensions.iter().any(|known| known.trim_start_matches('.').eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.min_segment_duration_secs, 5.0);
        assert_eq!(config.start_time_tolerance_minutes, 10);
        assert!(config.excluded_events.iter().any(|e| e == "Артефакт"));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("edfkit.json");
        std::fs::write(&path, r#"{ "min_segment_duration_secs": 7.5, "dedup_hash": "sha256" }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.min_segment_duration_secs, 7.5);
        assert_eq!(config.dedup_hash, HashAlgorithm::Sha256);
        assert_eq!(config.start_time_tolerance_minutes, 10);
        assert_eq!(config.extensions, vec!["edf".to_string()]);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.min_segment_duration_secs = 0.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.anonymize_placeholder = "two words".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.start_time_tolerance_minutes = 999_999_999_999_999_999;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert_eq!(config.tolerance(), None);
        config.start_time_tolerance_minutes = 60 * 24 * 365;
        assert!(config.validate().is_ok());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(Config::load(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_extension_matching() {
        let config = Config::default();
        assert!(config.matches_extension(Path::new("a/b/REC.EDF")));
        assert!(config.matches_extension(Path::new("rec.edf")));
        assert!(!config.matches_extension(Path::new("rec.bdf")));
        assert!(!config.matches_extension(Path::new("edf")));
    }
}
