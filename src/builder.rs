//! Programmatic creation of EDF/EDF+ files from physical samples.
//!
//! Used to produce fixtures and small synthetic recordings:
//!
//! ```rust,no_run
//! use edfkit::{EdfBuilder, SignalParam};
//!
//! let mut builder = EdfBuilder::new();
//! builder.set_patient_info("P001", "M", "01-JAN-1990", "Ivan Petrov");
//! builder.add_signal(SignalParam {
//!     label: "EEG Fp1".to_string(),
//!     transducer: "AgAgCl".to_string(),
//!     physical_dimension: "uV".to_string(),
//!     physical_min: -200.0,
//!     physical_max: 200.0,
//!     digital_min: -32768,
//!     digital_max: 32767,
//!     prefilter: "HP:0.1Hz".to_string(),
//!     samples_per_record: 256,
//!     is_annotation: false,
//! });
//! builder.add_annotation(2.0, None, "Eyes closed");
//! for _ in 0..10 {
//!     builder.write_samples(&[vec![0.0; 256]])?;
//! }
//! builder.finish("recording.edf")?;
//! # Ok::<(), edfkit::EdfError>(())
//! ```

use std::path::{Path, PathBuf};
use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{EdfError, EdfResult};
use crate::tal;
use crate::types::{Annotation, EdfHeader, FileType, SignalParam, ANNOTATION_LABEL};
use crate::writer::{encode_header, EdfWriter};
use crate::TIME_DIMENSION;

/// Bytes reserved for the annotation channel in each data record.
pub const DEFAULT_ANNOTATION_BYTES: usize = 120;

pub struct EdfBuilder {
    file_type: FileType,
    signals: Vec<SignalParam>,
    start: NaiveDateTime,
    starttime_subsecond: i64,
    datarecord_duration: i64,
    annotation_bytes: usize,

    patient_code: String,
    sex: String,
    birthdate: String,
    patient_name: String,
    patient_additional: String,
    admin_code: String,
    technician: String,
    equipment: String,
    free_patient_field: String,

    annotations: Vec<Annotation>,
    records: Vec<Vec<i16>>,
}

impl Default for EdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EdfBuilder {
    pub fn new() -> Self {
        let default_start = NaiveDate::from_ymd_opt(1985, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .unwrap_or_default();

        EdfBuilder {
            file_type: FileType::EdfPlusContinuous,
            signals: Vec::new(),
            start: default_start,
            starttime_subsecond: 0,
            datarecord_duration: TIME_DIMENSION,
            annotation_bytes: DEFAULT_ANNOTATION_BYTES,
            patient_code: "X".to_string(),
            sex: "X".to_string(),
            birthdate: "X".to_string(),
            patient_name: "X".to_string(),
            patient_additional: String::new(),
            admin_code: "X".to_string(),
            technician: "X".to_string(),
            equipment: "X".to_string(),
            free_patient_field: String::new(),
            annotations: Vec::new(),
            records: Vec::new(),
        }
    }

    /// Produces a plain EDF file: no annotation channel, free-text patient field.
    pub fn plain_edf(&mut self, patient_field: &str) -> &mut Self {
        self.file_type = FileType::Edf;
        self.free_patient_field = patient_field.to_string();
        self
    }

    pub fn set_patient_info(&mut self, code: &str, sex: &str, birthdate: &str, name: &str) -> &mut Self {
        self.patient_code = code.to_string();
        self.sex = sex.to_string();
        self.birthdate = birthdate.to_string();
        self.patient_name = name.to_string();
        self
    }

    pub fn set_patient_additional(&mut self, additional: &str) -> &mut Self {
        self.patient_additional = additional.to_string();
        self
    }

    pub fn set_recording_info(&mut self, admin_code: &str, technician: &str, equipment: &str) -> &mut Self {
        self.admin_code = admin_code.to_string();
        self.technician = technician.to_string();
        self.equipment = equipment.to_string();
        self
    }

    pub fn set_start(&mut self, start: NaiveDateTime) -> &mut Self {
        self.start = start;
        self
    }

    /// Sub-second start offset in 100 ns units (EDF+ only).
    pub fn set_subsecond_start(&mut self, subsecond: i64) -> &mut Self {
        self.starttime_subsecond = subsecond.clamp(0, TIME_DIMENSION - 1);
        self
    }

    pub fn set_datarecord_duration(&mut self, seconds: f64) -> &mut Self {
        self.datarecord_duration = (seconds * TIME_DIMENSION as f64).round() as i64;
        self
    }

    pub fn set_annotation_bytes(&mut self, bytes: usize) -> &mut Self {
        self.annotation_bytes = bytes + bytes % 2;
        self
    }

    pub fn add_signal(&mut self, signal: SignalParam) -> &mut Self {
        self.signals.push(signal);
        self
    }

    /// Adds an event; onset and duration in seconds from the header start time.
    pub fn add_annotation(&mut self, onset: f64, duration: Option<f64>, description: &str) -> &mut Self {
        self.annotations.push(Annotation {
            onset: (onset * TIME_DIMENSION as f64).round() as i64,
            duration: duration.map(|d| (d * TIME_DIMENSION as f64).round() as i64).unwrap_or(-1),
            description: description.to_string(),
        });
        self
    }

    /// Appends one data record given physical values for every signal.
    pub fn write_samples(&mut self, samples: &[Vec<f64>]) -> EdfResult<()> {
        if samples.len() != self.signals.len() {
            return Err(EdfError::InvalidFormat("Sample count must match signal count".to_string()));
        }

        let mut record = Vec::new();
        for (i, (signal, values)) in self.signals.iter().zip(samples).enumerate() {
            if values.len() != signal.samples_per_record as usize {
                return Err(EdfError::InvalidFormat(format!(
                    "Signal {} expected {} samples per record, got {}",
                    i, signal.samples_per_record, values.len()
                )));
            }
            record.extend(values.iter().map(|&v| signal.to_digital(v) as i16));
        }
        self.records.push(record);
        Ok(())
    }

    /// Writes the file and returns its path.
    pub fn finish<P: AsRef<Path>>(&self, path: P) -> EdfResult<PathBuf> {
        for (i, signal) in self.signals.iter().enumerate() {
            if signal.physical_min == signal.physical_max {
                return Err(EdfError::PhysicalMinEqualsMax(i));
            }
            if signal.digital_min == signal.digital_max {
                return Err(EdfError::DigitalMinEqualsMax(i));
            }
        }
        if self.datarecord_duration <= 0 {
            return Err(EdfError::InvalidFormat("Data record duration must be positive".to_string()));
        }

        let header = self.header();
        let mut writer = EdfWriter::create(&path, &encode_header(&header), header.record_size)?;

        for (index, samples) in self.records.iter().enumerate() {
            let mut record = Vec::with_capacity(header.record_size);
            for value in samples {
                record.extend_from_slice(&value.to_le_bytes());
            }

            if self.file_type.is_edfplus() {
                let record_start = index as i64 * self.datarecord_duration;
                let record_end = record_start + self.datarecord_duration;
                let last = index + 1 == self.records.len();
                let in_record: Vec<&Annotation> = self.annotations.iter()
                    .filter(|a| {
                        let onset = a.onset - self.starttime_subsecond;
                        onset >= record_start && (onset < record_end || (last && onset == record_end))
                    })
                    .collect();

                let (tal_bytes, dropped) = tal::encode(
                    record_start + self.starttime_subsecond,
                    &in_record,
                    self.annotation_bytes,
                );
                if dropped > 0 {
                    return Err(EdfError::InvalidFormat(format!(
                        "{} annotations do not fit into data record {}", dropped, index
                    )));
                }
                record.extend_from_slice(&tal_bytes);
            }

            writer.write_record(&record)?;
        }

        writer.finalize()
    }

    fn header(&self) -> EdfHeader {
        let mut signals = self.signals.clone();
        if self.file_type.is_edfplus() {
            signals.push(SignalParam {
                label: ANNOTATION_LABEL.to_string(),
                transducer: String::new(),
                physical_dimension: String::new(),
                physical_min: -1.0,
                physical_max: 1.0,
                digital_min: -32768,
                digital_max: 32767,
                prefilter: String::new(),
                samples_per_record: (self.annotation_bytes / 2) as i32,
                is_annotation: true,
            });
        }
        let record_size = signals.iter().map(|s| s.samples_per_record as usize * 2).sum();

        let subfield = |s: &str| -> String {
            let joined = s.split_whitespace().collect::<Vec<_>>().join("_");
            if joined.is_empty() { "X".to_string() } else { joined }
        };

        let (patient_field, recording_field, recording_startdate) = if self.file_type.is_edfplus() {
            let startdate = self.start.format("%d-%b-%Y").to_string().to_uppercase();
            let mut patient = format!(
                "{} {} {} {}",
                subfield(&self.patient_code),
                subfield(&self.sex),
                subfield(&self.birthdate),
                subfield(&self.patient_name),
            );
            if !self.patient_additional.is_empty() {
                patient.push(' ');
                patient.push_str(&self.patient_additional);
            }
            let recording = format!(
                "Startdate {} {} {} {}",
                startdate,
                subfield(&self.admin_code),
                subfield(&self.technician),
                subfield(&self.equipment),
            );
            (patient, recording, startdate)
        } else {
            (self.free_patient_field.clone(), String::new(), String::new())
        };

        EdfHeader {
            file_type: self.file_type,
            header_size: (signals.len() + 1) * 256,
            signals,
            record_size,
            start_date: self.start.date(),
            start_time: self.start.time(),
            starttime_subsecond: self.starttime_subsecond,
            datarecords_in_file: self.records.len() as i64,
            datarecord_duration: self.datarecord_duration,
            patient_field,
            recording_field,
            patient_code: self.patient_code.clone(),
            sex: self.sex.clone(),
            birthdate: self.birthdate.clone(),
            patient_name: self.patient_name.clone(),
            patient_additional: self.patient_additional.clone(),
            recording_startdate,
            admin_code: self.admin_code.clone(),
            technician: self.technician.clone(),
            equipment: self.equipment.clone(),
            recording_additional: String::new(),
        }
    }
}
