use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use chrono::{Datelike, Timelike};
use tempfile::NamedTempFile;

use crate::error::{EdfError, EdfResult};
use crate::types::EdfHeader;
use crate::utils::{format_edf_number, format_edf_time, write_field};

/// Offset of the "number of data records" field in the main header.
pub const DATARECORDS_OFFSET: usize = 236;

/// Serialises a header in the EDF field layout (main header followed by the
/// per-signal fields, each field written for all signals in turn).
pub fn encode_header(header: &EdfHeader) -> Vec<u8> {
    let ns = header.signals.len();
    let mut out = vec![b' '; (ns + 1) * 256];

    {
        let main = &mut out[..256];
        write_field(&mut main[0..8], "0");
        write_field(&mut main[8..88], &header.patient_field);
        write_field(&mut main[88..168], &header.recording_field);
        write_field(&mut main[168..176], &format!(
            "{:02}.{:02}.{:02}",
            header.start_date.day(), header.start_date.month(), header.start_date.year() % 100
        ));
        write_field(&mut main[176..184], &format!(
            "{:02}.{:02}.{:02}",
            header.start_time.hour(), header.start_time.minute(), header.start_time.second()
        ));
        write_field(&mut main[184..192], &((ns + 1) * 256).to_string());
        write_field(&mut main[192..236], header.file_type.reserved_marker());
        write_field(&mut main[236..244], &header.datarecords_in_file.to_string());
        write_field(&mut main[244..252], &format_edf_time(header.datarecord_duration));
        write_field(&mut main[252..256], &ns.to_string());
    }

    let signals = &header.signals;
    let mut pos = 256;
    let mut put = |width: usize, value: &dyn Fn(usize) -> String| {
        for i in 0..ns {
            write_field(&mut out[pos..pos + width], &value(i));
            pos += width;
        }
    };

    put(16, &|i| signals[i].label.clone());
    put(80, &|i| signals[i].transducer.clone());
    put(8, &|i| signals[i].physical_dimension.clone());
    put(8, &|i| format_edf_number(signals[i].physical_min));
    put(8, &|i| format_edf_number(signals[i].physical_max));
    put(8, &|i| signals[i].digital_min.to_string());
    put(8, &|i| signals[i].digital_max.to_string());
    put(80, &|i| signals[i].prefilter.clone());
    put(8, &|i| signals[i].samples_per_record.to_string());
    put(32, &|_| String::new());

    out
}

/// Writes an EDF file record by record.
///
/// Data goes to a temporary file next to the destination; `finalize` patches
/// the record count and moves the file into place, so an interrupted write
/// never leaves a partial recording behind.
pub struct EdfWriter {
    file: BufWriter<NamedTempFile>,
    path: PathBuf,
    record_size: usize,
    records_written: i64,
}

impl EdfWriter {
    pub fn create<P: AsRef<Path>>(path: P, header: &[u8], record_size: usize) -> EdfResult<Self> {
        let path = path.as_ref().to_path_buf();
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        if header.len() < 256 || header.len() % 256 != 0 {
            return Err(EdfError::InvalidFormat(format!("header of {} bytes", header.len())));
        }
        if record_size == 0 {
            return Err(EdfError::InvalidFormat("empty data record".to_string()));
        }

        let mut file = BufWriter::new(NamedTempFile::new_in(dir)?);
        file.write_all(header)?;

        Ok(EdfWriter {
            file,
            path,
            record_size,
            records_written: 0,
        })
    }

    pub fn write_record(&mut self, record: &[u8]) -> EdfResult<()> {
        if record.len() != self.record_size {
            return Err(EdfError::InvalidFormat(format!(
                "data record of {} bytes, expected {}", record.len(), self.record_size
            )));
        }
        self.file.write_all(record)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn records_written(&self) -> i64 {
        self.records_written
    }

    /// Patches the record count, syncs, and moves the file to its destination.
    pub fn finalize(self) -> EdfResult<PathBuf> {
        let mut file = self.file.into_inner().map_err(|e| e.into_error())?;

        let mut count = [b' '; 8];
        write_field(&mut count, &self.records_written.to_string());
        file.seek(SeekFrom::Start(DATARECORDS_OFFSET as u64))?;
        file.write_all(&count)?;
        file.flush()?;
        file.as_file().sync_all()?;

        file.persist(&self.path).map_err(|e| EdfError::Io(e.error))?;
        Ok(self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::EdfReader;
    use crate::types::{FileType, SignalParam};
    use crate::TIME_DIMENSION;
    use chrono::{NaiveDate, NaiveTime};

    fn plain_header() -> EdfHeader {
        EdfHeader {
            file_type: FileType::Edf,
            signals: vec![SignalParam {
                label: "ECG".to_string(),
                transducer: String::new(),
                physical_dimension: "mV".to_string(),
                physical_min: -5.0,
                physical_max: 5.0,
                digital_min: -2048,
                digital_max: 2047,
                prefilter: String::new(),
                samples_per_record: 4,
                is_annotation: false,
            }],
            header_size: 512,
            record_size: 8,
            start_date: NaiveDate::from_ymd_opt(2021, 3, 4).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 20, 30).unwrap(),
            starttime_subsecond: 0,
            datarecords_in_file: -1,
            datarecord_duration: TIME_DIMENSION / 2,
            patient_field: "Ivanov Ivan".to_string(),
            recording_field: "routine ECG".to_string(),
            patient_code: String::new(),
            sex: String::new(),
            birthdate: String::new(),
            patient_name: String::new(),
            patient_additional: String::new(),
            recording_startdate: String::new(),
            admin_code: String::new(),
            technician: String::new(),
            equipment: String::new(),
            recording_additional: String::new(),
        }
    }

    #[test]
    fn test_write_and_reopen_plain_edf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.edf");
        let header = plain_header();

        let mut writer = EdfWriter::create(&path, &encode_header(&header), header.record_size).unwrap();
        for i in 0..3u8 {
            writer.write_record(&[i; 8]).unwrap();
        }
        assert!(writer.write_record(&[0; 7]).is_err());
        assert_eq!(writer.finalize().unwrap(), path);

        let mut reader = EdfReader::open(&path).unwrap();
        let read = reader.header();
        assert_eq!(read.file_type, FileType::Edf);
        assert_eq!(read.datarecords_in_file, 3);
        assert_eq!(read.datarecord_duration, TIME_DIMENSION / 2);
        assert_eq!(read.start_datetime(), header.start_datetime());
        assert_eq!(read.patient_field, "Ivanov Ivan");
        assert_eq!(read.signals, header.signals);
        assert!(reader.annotations().is_empty());
        assert_eq!(reader.read_record(2).unwrap(), vec![2u8; 8]);
        assert!(reader.read_record(3).is_err());
    }

    #[test]
    fn test_abandoned_writer_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("never.edf");
        let header = plain_header();
        {
            let mut writer = EdfWriter::create(&path, &encode_header(&header), 8).unwrap();
            writer.write_record(&[1; 8]).unwrap();
        }
        assert!(!path.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
