//! # edfkit
//!
//! Batch management and event-based segmentation of EDF/EDF+ recordings:
//! renaming by metadata, corruption checks, content-hash deduplication,
//! start-time clustering, statistics with CSV export, filename randomization,
//! patient-info anonymization and splitting recordings at their annotations.
//!
//! ## Quick Start
//!
//! Every operation runs on a [`Session`], which holds the selected folder and
//! the [`Config`]:
//!
//! ```rust,no_run
//! use edfkit::{Config, Session, Result};
//!
//! fn main() -> Result<()> {
//!     let session = Session::new("recordings", Config::default())?;
//!
//!     let report = session.deduplicate()?;
//!     print!("{}", report.summary());
//!
//!     let (_, clusters) = session.find_similar()?;
//!     for cluster in clusters {
//!         println!("{}", cluster);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ### Splitting a recording at its events
//!
//! ```rust,no_run
//! use edfkit::{Config, Outcome, Session};
//! use std::path::Path;
//!
//! # fn main() -> edfkit::Result<()> {
//! let mut config = Config::default();
//! config.min_segment_duration_secs = 10.0;
//! let session = Session::new("recordings", config)?;
//!
//! match session.segment(Path::new("recordings/night.edf"))? {
//!     Outcome::Done(segmentation) => println!("{}", segmentation),
//!     Outcome::Skipped(reason) => println!("not split: {}", reason),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Reading metadata
//!
//! [`Recording::open`] validates the whole file and returns its metadata with
//! events relative to the first sample:
//!
//! ```rust,no_run
//! use edfkit::Recording;
//!
//! # fn main() -> edfkit::Result<()> {
//! let recording = Recording::open("recordings/night.edf")?;
//! println!("{} ({}), {:.1} s", recording.patient_name, recording.sex, recording.duration);
//! for event in &recording.events {
//!     println!("{:>8.3}  {}", event.onset, event.label);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Errors
//!
//! The EDF layer reports [`EdfError`]. Operations report [`Error`], which
//! separates parse failures (damaged recordings) from I/O and validation
//! failures. Batch operations never stop at a failing file: the failure is
//! recorded in the returned [`ScanReport`] and the next file is processed.

pub mod error;
pub mod types;
pub mod utils;
pub mod tal;
pub mod reader;
pub mod writer;
pub mod builder;
pub mod recording;
pub mod transliterate;
pub mod events;
pub mod config;
pub mod logging;
pub mod scanner;
pub mod rename;
pub mod integrity;
pub mod dedup;
pub mod clustering;
pub mod anonymize;
pub mod stats;
pub mod segment;
pub mod info;
pub mod session;

// Re-export main types for convenience
pub use error::{EdfError, EdfResult, Error, Result};
pub use types::{Annotation, EdfHeader, FileType, SignalParam};
pub use reader::EdfReader;
pub use writer::EdfWriter;
pub use builder::EdfBuilder;
pub use recording::{Event, Recording, Sex};
pub use transliterate::{Cyrillic, Transliterate};
pub use config::{Config, HashAlgorithm};
pub use scanner::{FolderScanner, Outcome, ScanReport, Status};
pub use clustering::StartTimeCluster;
pub use dedup::DedupOutcome;
pub use integrity::Integrity;
pub use segment::{Segment, Segmentation};
pub use stats::{ReportRenderer, StatisticsReport, TextRenderer};
pub use session::{Session, StatisticsRun};

// Important constants
pub const TIME_DIMENSION: i64 = 10_000_000; // 100 nanoseconds unit
pub const MAX_SIGNALS: usize = 4096;

/// Library version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
