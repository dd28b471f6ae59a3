use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::TIME_DIMENSION;

/// Label reserved by EDF+ for annotation channels.
pub const ANNOTATION_LABEL: &str = "EDF Annotations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Plain EDF, no reserved-field marker.
    Edf,
    /// EDF+ continuous recording (`EDF+C`).
    EdfPlusContinuous,
    /// EDF+ discontinuous recording (`EDF+D`).
    EdfPlusDiscontinuous,
}

impl FileType {
    pub fn is_edfplus(self) -> bool {
        !matches!(self, FileType::Edf)
    }

    /// Value stored in the 44-byte reserved field.
    pub fn reserved_marker(self) -> &'static str {
        match self {
            FileType::Edf => "",
            FileType::EdfPlusContinuous => "EDF+C",
            FileType::EdfPlusDiscontinuous => "EDF+D",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalParam {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: i32,
    pub is_annotation: bool,
}

impl SignalParam {
    /// Physical units per digital step.
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    pub fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    /// Converts a physical value to the clamped digital value stored on disk.
    pub fn to_digital(&self, physical_value: f64) -> i32 {
        let digital = (physical_value / self.bit_value()) - self.offset();
        (digital.round() as i32).clamp(self.digital_min, self.digital_max)
    }

    /// Sampling rate in Hz for the given data-record duration (100 ns units).
    pub fn sample_rate(&self, datarecord_duration: i64) -> f64 {
        if datarecord_duration <= 0 {
            return 0.0;
        }
        self.samples_per_record as f64 * TIME_DIMENSION as f64 / datarecord_duration as f64
    }
}

/// One annotation decoded from a TAL.
#[derive(Debug, Clone, PartialEq)]
pub struct Annotation {
    pub onset: i64,           // 100 ns units, relative to the recording start
    pub duration: i64,        // 100 ns units, -1 when not given
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct EdfHeader {
    pub file_type: FileType,
    pub signals: Vec<SignalParam>,
    pub header_size: usize,
    pub record_size: usize,
    pub start_date: NaiveDate,
    pub start_time: NaiveTime,
    pub starttime_subsecond: i64,     // 100 ns units, EDF+ only
    pub datarecords_in_file: i64,
    pub datarecord_duration: i64,     // 100 ns units

    /// The 80-byte patient and recording fields with padding removed.
    pub patient_field: String,
    pub recording_field: String,

    // EDF+ subfields (empty for plain EDF)
    pub patient_code: String,
    pub sex: String,
    pub birthdate: String,
    pub patient_name: String,
    pub patient_additional: String,
    pub recording_startdate: String,
    pub admin_code: String,
    pub technician: String,
    pub equipment: String,
    pub recording_additional: String,
}

impl EdfHeader {
    /// Total duration in 100 ns units, saturating for headers the reader
    /// would reject.
    pub fn file_duration(&self) -> i64 {
        self.datarecord_duration.saturating_mul(self.datarecords_in_file)
    }

    pub fn start_datetime(&self) -> NaiveDateTime {
        self.start_date.and_time(self.start_time)
    }

    pub fn data_signals(&self) -> impl Iterator<Item = &SignalParam> {
        self.signals.iter().filter(|s| !s.is_annotation)
    }

    /// Byte offset of each signal inside one data record.
    pub fn signal_offsets(&self) -> Vec<usize> {
        let mut offsets = Vec::with_capacity(self.signals.len());
        let mut offset = 0;
        for signal in &self.signals {
            offsets.push(offset);
            offset += signal.samples_per_record.max(0) as usize * 2;
        }
        offsets
    }
}
