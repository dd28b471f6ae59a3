use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use chrono::{NaiveDate, NaiveTime};

use crate::error::{EdfError, EdfResult};
use crate::tal;
use crate::types::{Annotation, EdfHeader, FileType, SignalParam, ANNOTATION_LABEL};
use crate::utils::{parse_edf_time, parse_float, parse_int, read_field};
use crate::{MAX_SIGNALS, TIME_DIMENSION};

/// Reader for EDF and EDF+ files.
///
/// Opening a file parses and validates the whole header, checks the file
/// length against the declared number of data records and decodes every
/// annotation channel, so a successfully opened reader describes a readable
/// recording. Data records are then available as raw bytes.
///
/// ```rust,no_run
/// use edfkit::EdfReader;
///
/// let reader = EdfReader::open("recording.edf")?;
/// println!("{} data records", reader.header().datarecords_in_file);
/// for annotation in reader.annotations() {
///     println!("{} {}", annotation.onset, annotation.description);
/// }
/// # Ok::<(), edfkit::EdfError>(())
/// ```
pub struct EdfReader {
    file: BufReader<File>,
    header: EdfHeader,
    raw_header: Vec<u8>,
    annotations: Vec<Annotation>,
}

impl EdfReader {
    pub fn open<P: AsRef<Path>>(path: P) -> EdfResult<Self> {
        let file = File::open(path.as_ref())?;
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let (mut header, raw_header) = Self::parse_header(&mut reader)?;
        Self::check_length(&mut header, file_len)?;

        let mut edf = EdfReader {
            file: reader,
            header,
            raw_header,
            annotations: Vec::new(),
        };
        edf.read_annotations()?;
        Ok(edf)
    }

    pub fn header(&self) -> &EdfHeader {
        &self.header
    }

    /// The header exactly as stored on disk.
    pub fn raw_header(&self) -> &[u8] {
        &self.raw_header
    }

    /// All annotations, ordered by onset. Onsets are relative to the header
    /// start time (second resolution), as EDF+ defines them.
    pub fn annotations(&self) -> &[Annotation] {
        &self.annotations
    }

    /// Reads one complete data record.
    pub fn read_record(&mut self, index: i64) -> EdfResult<Vec<u8>> {
        if index < 0 || index >= self.header.datarecords_in_file {
            return Err(EdfError::InvalidFormat(format!(
                "data record {} out of range (0..{})",
                index, self.header.datarecords_in_file
            )));
        }

        let offset = self.header.header_size as u64 + index as u64 * self.header.record_size as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        let mut record = vec![0u8; self.header.record_size];
        self.file.read_exact(&mut record)?;
        Ok(record)
    }

    fn check_length(header: &mut EdfHeader, file_len: u64) -> EdfResult<()> {
        let header_size = header.header_size as u64;
        let record_size = header.record_size as u64;
        if file_len < header_size {
            return Err(EdfError::Truncated { expected: header_size, actual: file_len });
        }

        // -1 means the writer never finalised the record count
        if header.datarecords_in_file == -1 {
            header.datarecords_in_file = ((file_len - header_size) / record_size) as i64;
            return Self::check_duration(header);
        }

        let expected = (header.datarecords_in_file as u64)
            .checked_mul(record_size)
            .and_then(|data| data.checked_add(header_size))
            .ok_or_else(|| EdfError::InvalidFormat(format!(
                "{} data records of {} bytes exceed any file size",
                header.datarecords_in_file, record_size
            )))?;
        if file_len < expected {
            return Err(EdfError::Truncated { expected, actual: file_len });
        }
        if file_len > expected {
            tracing::debug!(extra = file_len - expected, "trailing bytes after the last data record");
        }
        Self::check_duration(header)
    }

    /// The total duration must be representable in 100 ns ticks.
    fn check_duration(header: &EdfHeader) -> EdfResult<()> {
        header.datarecord_duration
            .checked_mul(header.datarecords_in_file)
            .map(|_| ())
            .ok_or_else(|| EdfError::InvalidFormat(format!(
                "{} data records of {} ticks exceed the representable duration",
                header.datarecords_in_file, header.datarecord_duration
            )))
    }

    fn read_annotations(&mut self) -> EdfResult<()> {
        if !self.header.file_type.is_edfplus() {
            return Ok(());
        }

        let offsets = self.header.signal_offsets();
        let channels: Vec<(usize, usize)> = self.header.signals.iter()
            .zip(offsets)
            .filter(|(s, _)| s.is_annotation)
            .map(|(s, offset)| (offset, s.samples_per_record as usize * 2))
            .collect();

        let mut annotations = Vec::new();
        for record_index in 0..self.header.datarecords_in_file {
            let record = self.read_record(record_index)?;
            for (channel, &(offset, len)) in channels.iter().enumerate() {
                let tals = tal::decode(&record[offset..offset + len], record_index)?;

                if record_index == 0 && channel == 0 {
                    let start = tals.timekeeping.ok_or_else(|| EdfError::InvalidAnnotation {
                        record: 0,
                        reason: "missing time-keeping annotation".to_string(),
                    })?;
                    if !(0..TIME_DIMENSION).contains(&start) {
                        return Err(EdfError::InvalidAnnotation {
                            record: 0,
                            reason: format!("first record starts at {} (expected sub-second offset)", start),
                        });
                    }
                    self.header.starttime_subsecond = start;
                }
                annotations.extend(tals.annotations);
            }
        }

        annotations.sort_by_key(|a| a.onset);
        self.annotations = annotations;
        Ok(())
    }

    fn parse_header(reader: &mut BufReader<File>) -> EdfResult<(EdfHeader, Vec<u8>)> {
        reader.seek(SeekFrom::Start(0))?;
        let mut main_header = vec![0u8; 256];
        reader.read_exact(&mut main_header)?;

        let version = read_field(&main_header[0..8]);
        if version != "0" {
            return Err(EdfError::UnsupportedFileType(format!("Not an EDF file (version '{}')", version)));
        }

        let total_signal_count = parse_int(&read_field(&main_header[252..256]), "number of signals")?;
        if total_signal_count < 1 || total_signal_count > MAX_SIGNALS as i64 {
            return Err(EdfError::InvalidSignalCount(total_signal_count as i32));
        }
        let total_signal_count = total_signal_count as usize;

        let expected_header_size = (total_signal_count as i64 + 1) * 256;
        let declared_header_size = parse_int(&read_field(&main_header[184..192]), "header size")?;
        if declared_header_size != expected_header_size {
            return Err(EdfError::InvalidHeader {
                declared: declared_header_size,
                expected: expected_header_size,
            });
        }

        let reserved = read_field(&main_header[192..236]);
        let file_type = if reserved.starts_with("EDF+C") {
            FileType::EdfPlusContinuous
        } else if reserved.starts_with("EDF+D") {
            FileType::EdfPlusDiscontinuous
        } else {
            FileType::Edf
        };

        let patient_field = read_field(&main_header[8..88]);
        let recording_field = read_field(&main_header[88..168]);

        let datarecords = parse_int(&read_field(&main_header[236..244]), "number of data records")?;
        if datarecords < -1 {
            return Err(EdfError::InvalidFormat(format!("Invalid number of data records: {}", datarecords)));
        }

        let datarecord_duration = parse_edf_time(&read_field(&main_header[244..252]))?;
        if datarecord_duration < 0 {
            return Err(EdfError::InvalidFormat("Negative data record duration".to_string()));
        }

        let mut signal_header = vec![0u8; total_signal_count * 256];
        reader.read_exact(&mut signal_header)?;
        let signals = Self::parse_signals(&signal_header, total_signal_count, file_type)?;
        let record_size = signals.iter().map(|s| s.samples_per_record as usize * 2).sum();

        let (patient_code, sex, birthdate, patient_name, patient_additional) = if file_type.is_edfplus() {
            Self::parse_edfplus_patient(&patient_field)
        } else {
            Default::default()
        };
        let (recording_startdate, admin_code, technician, equipment, recording_additional) =
            if file_type.is_edfplus() {
                Self::parse_edfplus_recording(&recording_field)
            } else {
                Default::default()
            };

        let (start_date, start_time) = Self::parse_datetime(
            &read_field(&main_header[168..176]),
            &read_field(&main_header[176..184]),
            &recording_startdate,
        )?;

        let header = EdfHeader {
            file_type,
            signals,
            header_size: expected_header_size as usize,
            record_size,
            start_date,
            start_time,
            starttime_subsecond: 0,
            datarecords_in_file: datarecords,
            datarecord_duration,
            patient_field,
            recording_field,
            patient_code,
            sex,
            birthdate,
            patient_name,
            patient_additional,
            recording_startdate,
            admin_code,
            technician,
            equipment,
            recording_additional,
        };

        let mut raw = main_header;
        raw.extend_from_slice(&signal_header);
        Ok((header, raw))
    }

    /// Parses "dd.mm.yy" and "hh.mm.ss". A valid EDF+ `Startdate` subfield
    /// (dd-MMM-yyyy) supplies the four-digit year.
    fn parse_datetime(date_str: &str, time_str: &str, startdate: &str) -> EdfResult<(NaiveDate, NaiveTime)> {
        let invalid = || EdfError::InvalidFormat(format!("Invalid start date/time '{} {}'", date_str, time_str));

        let date_parts: Vec<&str> = date_str.split('.').collect();
        if date_parts.len() != 3 {
            return Err(invalid());
        }
        let day = parse_int(date_parts[0], "start day").map_err(|_| invalid())?;
        let month = parse_int(date_parts[1], "start month").map_err(|_| invalid())?;
        let yy = parse_int(date_parts[2], "start year").map_err(|_| invalid())?;
        let mut year = if yy > 84 { 1900 + yy } else { 2000 + yy };

        if let Ok(plus_date) = NaiveDate::parse_from_str(startdate, "%d-%b-%Y") {
            use chrono::Datelike;
            year = plus_date.year() as i64;
        }

        let start_date = NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .ok_or_else(invalid)?;

        let time_parts: Vec<&str> = time_str.split('.').collect();
        if time_parts.len() != 3 {
            return Err(invalid());
        }
        let hour = parse_int(time_parts[0], "start hour").map_err(|_| invalid())?;
        let minute = parse_int(time_parts[1], "start minute").map_err(|_| invalid())?;
        let second = parse_int(time_parts[2], "start second").map_err(|_| invalid())?;

        let start_time = NaiveTime::from_hms_opt(hour as u32, minute as u32, second as u32)
            .ok_or_else(invalid)?;

        Ok((start_date, start_time))
    }

    fn parse_signals(
        signal_header: &[u8],
        total_signal_count: usize,
        file_type: FileType,
    ) -> EdfResult<Vec<SignalParam>> {
        let field = |width_before: usize, width: usize, i: usize| -> String {
            let start = total_signal_count * width_before + i * width;
            read_field(&signal_header[start..start + width])
        };

        let mut signals = Vec::with_capacity(total_signal_count);
        for i in 0..total_signal_count {
            let label = field(0, 16, i);
            let is_annotation = file_type.is_edfplus() && label == ANNOTATION_LABEL;

            let samples_per_record = parse_int(&field(216, 8, i), "samples per record")?;
            if samples_per_record < 1 || samples_per_record > i32::MAX as i64 {
                return Err(EdfError::InvalidFormat(format!(
                    "Signal {} has invalid samples per record: {}", i, samples_per_record
                )));
            }

            let physical_min = parse_float(&field(104, 8, i), "physical minimum")?;
            let physical_max = parse_float(&field(112, 8, i), "physical maximum")?;
            let digital_min = parse_int(&field(120, 8, i), "digital minimum")?;
            let digital_max = parse_int(&field(128, 8, i), "digital maximum")?;

            if !is_annotation {
                if physical_min == physical_max {
                    return Err(EdfError::PhysicalMinEqualsMax(i));
                }
                if digital_min == digital_max {
                    return Err(EdfError::DigitalMinEqualsMax(i));
                }
            }

            signals.push(SignalParam {
                label,
                transducer: field(16, 80, i),
                physical_dimension: field(96, 8, i),
                physical_min,
                physical_max,
                digital_min: digital_min as i32,
                digital_max: digital_max as i32,
                prefilter: field(136, 80, i),
                samples_per_record: samples_per_record as i32,
                is_annotation,
            });
        }

        if file_type.is_edfplus() && !signals.iter().any(|s| s.is_annotation) {
            return Err(EdfError::InvalidFormat("EDF+ file without an annotation signal".to_string()));
        }

        Ok(signals)
    }

    /// "patientcode sex birthdate patientname additional..."
    fn parse_edfplus_patient(patient_field: &str) -> (String, String, String, String, String) {
        let parts: Vec<&str> = patient_field.split_whitespace().collect();
        let part = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();
        let additional = parts.get(4..).map(|s| s.join(" ")).unwrap_or_default();
        (part(0), part(1), part(2), part(3), additional)
    }

    /// "Startdate dd-MMM-yyyy admincode technician equipment additional..."
    fn parse_edfplus_recording(recording_field: &str) -> (String, String, String, String, String) {
        let parts: Vec<&str> = recording_field.split_whitespace().collect();
        if parts.first() != Some(&"Startdate") {
            return Default::default();
        }
        let part = |i: usize| parts.get(i).copied().unwrap_or_default().to_string();
        let additional = parts.get(5..).map(|s| s.join(" ")).unwrap_or_default();
        (part(1), part(2), part(3), part(4), additional)
    }
}
