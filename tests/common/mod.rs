#![allow(dead_code)]

use chrono::{Duration, NaiveDate, NaiveDateTime};
use edfkit::{EdfBuilder, SignalParam};
use std::path::{Path, PathBuf};

pub const SAMPLES_PER_RECORD: i32 = 32;

pub fn eeg_signal(label: &str) -> SignalParam {
    SignalParam {
        label: label.to_string(),
        transducer: "AgAgCl electrodes".to_string(),
        physical_dimension: "uV".to_string(),
        physical_min: -200.0,
        physical_max: 200.0,
        digital_min: -32768,
        digital_max: 32767,
        prefilter: "HP:0.1Hz LP:70Hz".to_string(),
        samples_per_record: SAMPLES_PER_RECORD,
        is_annotation: false,
    }
}

pub fn at(minutes: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(8, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Description of a synthetic EDF+ recording with one-second data records.
pub struct Fixture {
    pub code: String,
    pub sex: String,
    pub birthdate: String,
    pub name: String,
    pub start: NaiveDateTime,
    pub seconds: usize,
    pub events: Vec<(f64, String)>,
}

impl Fixture {
    pub fn new(name: &str) -> Self {
        Fixture {
            code: "MCH-0234567".to_string(),
            sex: "F".to_string(),
            birthdate: "02-MAY-1951".to_string(),
            name: name.to_string(),
            start: at(0),
            seconds: 10,
            events: Vec::new(),
        }
    }

    pub fn patient(mut self, code: &str, sex: &str, birthdate: &str) -> Self {
        self.code = code.to_string();
        self.sex = sex.to_string();
        self.birthdate = birthdate.to_string();
        self
    }

    pub fn start(mut self, start: NaiveDateTime) -> Self {
        self.start = start;
        self
    }

    pub fn seconds(mut self, seconds: usize) -> Self {
        self.seconds = seconds;
        self
    }

    pub fn event(mut self, onset: f64, label: &str) -> Self {
        self.events.push((onset, label.to_string()));
        self
    }

    /// Writes the recording; the samples of record `i` all equal `i`.
    pub fn write(&self, path: &Path) -> PathBuf {
        let mut builder = EdfBuilder::new();
        builder
            .set_patient_info(&self.code, &self.sex, &self.birthdate, &self.name)
            .set_recording_info("EEG-1234", "Tech", "Nihon")
            .set_start(self.start)
            .add_signal(eeg_signal("EEG Fp1"))
            .add_signal(eeg_signal("EEG Fp2"));
        for (onset, label) in &self.events {
            builder.add_annotation(*onset, None, label);
        }
        for i in 0..self.seconds {
            let value = i as f64;
            builder
                .write_samples(&[vec![value; SAMPLES_PER_RECORD as usize], vec![-value; SAMPLES_PER_RECORD as usize]])
                .unwrap();
        }
        builder.finish(path).unwrap()
    }
}
