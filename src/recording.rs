//! Metadata view of one recording, read fresh from disk for each operation.

use std::fmt;
use std::path::{Path, PathBuf};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};
use crate::reader::EdfReader;
use crate::types::EdfHeader;
use crate::TIME_DIMENSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sex {
    Male,
    Female,
    Unknown,
}

impl Sex {
    pub fn from_edf(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "M" | "MALE" => Sex::Male,
            "F" | "FEMALE" => Sex::Female,
            _ => Sex::Unknown,
        }
    }

    /// Single-letter form used in tables.
    pub fn code(self) -> &'static str {
        match self {
            Sex::Male => "M",
            Sex::Female => "F",
            Sex::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Sex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sex::Male => "Male",
            Sex::Female => "Female",
            Sex::Unknown => "Unknown",
        })
    }
}

/// An annotation expressed relative to the first sample of the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub onset: f64,
    pub duration: Option<f64>,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct Recording {
    pub path: PathBuf,
    pub patient_code: String,
    /// Patient name with EDF+ underscores turned back into spaces.
    pub patient_name: String,
    pub sex: Sex,
    pub birthdate: Option<NaiveDate>,
    /// Time of the first sample, including the EDF+ sub-second offset.
    pub start: NaiveDateTime,
    /// Seconds.
    pub duration: f64,
    /// Seconds.
    pub datarecord_duration: f64,
    pub channels: Vec<String>,
    pub sample_rates: Vec<f64>,
    pub events: Vec<Event>,
}

impl Recording {
    /// Reads and validates a recording. Any decoding failure is a parse error.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = EdfReader::open(path).map_err(|e| Error::parse(path, e))?;
        Ok(Self::from_reader(path, &reader))
    }

    pub fn from_reader(path: &Path, reader: &EdfReader) -> Self {
        let header = reader.header();
        let subsecond = header.starttime_subsecond;

        let events = reader.annotations().iter()
            .map(|a| Event {
                onset: ticks_to_seconds(a.onset.saturating_sub(subsecond)),
                duration: (a.duration >= 0).then(|| ticks_to_seconds(a.duration)),
                label: a.description.clone(),
            })
            .collect();

        Recording {
            path: path.to_path_buf(),
            patient_code: header.patient_code.clone(),
            patient_name: patient_name(header),
            sex: Sex::from_edf(&header.sex),
            birthdate: parse_birthdate(&header.birthdate),
            start: header.start_datetime() + Duration::microseconds(subsecond / 10),
            duration: ticks_to_seconds(header.file_duration()),
            datarecord_duration: ticks_to_seconds(header.datarecord_duration),
            channels: header.data_signals().map(|s| s.label.clone()).collect(),
            sample_rates: header.data_signals()
                .map(|s| s.sample_rate(header.datarecord_duration))
                .collect(),
            events,
        }
    }

    pub fn file_name(&self) -> String {
        self.path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Whole years between birthdate and the recording date, `None` when
    /// the birthdate is unknown or lies after the recording.
    pub fn age_at_recording(&self) -> Option<u32> {
        let birthdate = self.birthdate?;
        age_in_years(birthdate, self.start.date())
    }
}

pub fn age_in_years(birthdate: NaiveDate, on: NaiveDate) -> Option<u32> {
    let mut age = on.year() - birthdate.year();
    if (on.month(), on.day()) < (birthdate.month(), birthdate.day()) {
        age -= 1;
    }
    u32::try_from(age).ok()
}

/// EDF+ birthdate subfield, "dd-MMM-yyyy" or "X".
pub fn parse_birthdate(field: &str) -> Option<NaiveDate> {
    let field = field.trim();
    if field.is_empty() || field.eq_ignore_ascii_case("X") {
        return None;
    }
    NaiveDate::parse_from_str(field, "%d-%b-%Y").ok()
}

fn patient_name(header: &EdfHeader) -> String {
    let raw = if header.file_type.is_edfplus() {
        header.patient_name.as_str()
    } else {
        header.patient_field.as_str()
    };
    if raw.eq_ignore_ascii_case("X") {
        return String::new();
    }
    raw.replace('_', " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn ticks_to_seconds(ticks: i64) -> f64 {
    ticks as f64 / TIME_DIMENSION as f64
}
