//! Event-bounded splitting of one recording into independent files.
//!
//! Planning works in seconds on the event list. Writing snaps the planned
//! boundaries to data-record boundaries (EDF stores whole records) and copies
//! the selected records verbatim, rewriting only the start date/time, the
//! record count and the annotation channel of each record.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use chrono::{Datelike, Duration, NaiveDateTime, Timelike};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{EdfError, Error, Result};
use crate::events::EventFilter;
use crate::reader::EdfReader;
use crate::recording::{Event, Recording};
use crate::scanner::Outcome;
use crate::tal;
use crate::types::{Annotation, EdfHeader, FileType};
use crate::utils::write_field;
use crate::writer::EdfWriter;
use crate::TIME_DIMENSION;

pub const START_LABEL: &str = "Start";
pub const END_LABEL: &str = "End";

/// A planned `[start, end)` window, in seconds from the first sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// 1-based position in the plan; after writing, among the written files.
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Label of the event opening the segment, or `Start`.
    pub from: String,
    /// Label of the event closing the segment, or `End`.
    pub to: String,
}

impl Segment {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Splits `[0, duration)` at every event onset and merges undersized pieces.
///
/// An undersized segment absorbs its successor; an undersized last segment is
/// absorbed by its predecessor. Every resulting segment lasts at least
/// `min_duration` unless the whole recording is shorter, in which case a
/// single segment remains.
pub fn plan_segments(duration: f64, events: &[Event], min_duration: f64) -> Vec<Segment> {
    if !(duration > 0.0) {
        return Vec::new();
    }

    let mut boundaries: Vec<(f64, String)> = vec![(0.0, START_LABEL.to_string())];
    let mut sorted: Vec<&Event> = events.iter().collect();
    sorted.sort_by(|a, b| a.onset.total_cmp(&b.onset));
    for event in sorted {
        if event.onset < 0.0 || event.onset >= duration {
            continue;
        }
        match boundaries.last_mut() {
            // an event at 0 names the opening boundary
            Some((t, label)) if *t == event.onset => {
                if *t == 0.0 && label == START_LABEL {
                    *label = event.label.clone();
                }
            }
            _ => boundaries.push((event.onset, event.label.clone())),
        }
    }
    boundaries.push((duration, END_LABEL.to_string()));

    let mut segments: Vec<Segment> = boundaries.windows(2)
        .map(|pair| Segment {
            index: 0,
            start: pair[0].0,
            end: pair[1].0,
            from: pair[0].1.clone(),
            to: pair[1].1.clone(),
        })
        .collect();

    let mut i = 0;
    while segments.len() > 1 && i < segments.len() {
        if segments[i].duration() >= min_duration {
            i += 1;
        } else if i + 1 < segments.len() {
            let next = segments.remove(i + 1);
            segments[i].end = next.end;
            segments[i].to = next.to;
        } else {
            let last = segments.remove(i);
            segments[i - 1].end = last.end;
            segments[i - 1].to = last.to;
        }
    }

    for (n, segment) in segments.iter_mut().enumerate() {
        segment.index = n + 1;
    }
    segments
}

/// One written segment.
#[derive(Debug, Clone)]
pub struct SegmentFile {
    pub segment: Segment,
    pub path: PathBuf,
    pub first_record: i64,
    pub records: i64,
    /// Span actually written, in seconds from the source's first sample.
    pub written_start: f64,
    pub written_end: f64,
}

impl fmt::Display for SegmentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:.3}s, {:.3}s) {} -> {}",
            self.path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
            self.written_start,
            self.written_end,
            self.segment.from,
            self.segment.to
        )
    }
}

/// Result of splitting one file.
#[derive(Debug, Clone)]
pub struct Segmentation {
    pub source: PathBuf,
    pub files: Vec<SegmentFile>,
    pub manifest: PathBuf,
}

impl fmt::Display for Segmentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} segments", self.files.len())?;
        for file in &self.files {
            write!(f, "\n    {}", file)?;
        }
        Ok(())
    }
}

/// Name of the N-th segment file of `source`: `<stem>_seg<N>.<ext>`.
pub fn segment_file_name(source: &Path, index: usize) -> String {
    let stem = source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    match source.extension() {
        Some(ext) => format!("{}_seg{}.{}", stem, index, ext.to_string_lossy()),
        None => format!("{}_seg{}", stem, index),
    }
}

/// Splits `source` into segment files inside `out_dir`.
///
/// A recording without usable events is left alone and reported as skipped.
pub fn segment_recording(source: &Path, out_dir: &Path, config: &Config) -> Result<Outcome<Segmentation>> {
    let mut reader = EdfReader::open(source).map_err(|e| Error::parse(source, e))?;
    if reader.header().file_type == FileType::EdfPlusDiscontinuous {
        return Err(Error::Validation(format!(
            "{}: discontinuous (EDF+D) recordings cannot be split", source.display()
        )));
    }

    let recording = Recording::from_reader(source, &reader);
    let events = EventFilter::new(&config.excluded_events).apply(&recording.events);
    if events.is_empty() {
        return Ok(Outcome::Skipped("no events to split on".to_string()));
    }

    let plan = plan_segments(recording.duration, &events, config.min_segment_duration_secs);
    debug!(file = %source.display(), segments = plan.len(), "segment plan");

    fs::create_dir_all(out_dir).map_err(|e| Error::io(out_dir, e))?;

    let header = reader.header().clone();
    let total_records = header.datarecords_in_file;
    let record_seconds = header.datarecord_duration as f64 / TIME_DIMENSION as f64;
    let to_record = |t: f64| ((t / record_seconds).round() as i64).clamp(0, total_records);

    let mut files = Vec::new();
    for mut segment in plan {
        let first_record = to_record(segment.start);
        let end_record = to_record(segment.end);
        if end_record <= first_record {
            warn!(segment = segment.index, "segment shorter than one data record, not written");
            continue;
        }
        // written files are numbered without gaps
        segment.index = files.len() + 1;

        let path = out_dir.join(segment_file_name(source, segment.index));
        write_segment(&mut reader, &header, &path, first_record, end_record)
            .map_err(|e| Error::parse(&path, e))?;
        info!(file = %path.display(), from = %segment.from, to = %segment.to, "segment written");

        files.push(SegmentFile {
            segment,
            path,
            first_record,
            records: end_record - first_record,
            written_start: first_record as f64 * record_seconds,
            written_end: end_record as f64 * record_seconds,
        });
    }

    let manifest = out_dir.join(format!(
        "{}_segments.csv",
        source.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default()
    ));
    write_manifest(&manifest, &files)?;

    Ok(Outcome::Done(Segmentation { source: source.to_path_buf(), files, manifest }))
}

fn write_manifest(path: &Path, files: &[SegmentFile]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(["segment", "file", "start", "end", "duration", "from", "to"])?;
    for file in files {
        writer.write_record([
            file.segment.index.to_string(),
            file.path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(),
            format!("{:.3}", file.written_start),
            format!("{:.3}", file.written_end),
            format!("{:.3}", file.written_end - file.written_start),
            file.segment.from.clone(),
            file.segment.to.clone(),
        ])?;
    }
    writer.flush().map_err(|e| Error::io(path, e))?;
    Ok(())
}

/// Copies records `[first, end)` of the open source into a new file.
fn write_segment(
    reader: &mut EdfReader,
    header: &EdfHeader,
    path: &Path,
    first: i64,
    end: i64,
) -> std::result::Result<(), EdfError> {
    // ticks from the header start time to the first copied sample
    let offset = header.starttime_subsecond + first * header.datarecord_duration;
    let whole_seconds = offset.div_euclid(TIME_DIMENSION);
    let subsecond = offset.rem_euclid(TIME_DIMENSION);
    let start = header.start_datetime() + Duration::seconds(whole_seconds);

    let mut raw = reader.raw_header().to_vec();
    patch_start(&mut raw, header, start);
    if !header.file_type.is_edfplus() && subsecond != 0 {
        warn!(file = %path.display(), "plain EDF cannot store a sub-second start, truncated");
    }

    let offsets = header.signal_offsets();
    let annotation_channels: Vec<(usize, usize)> = header.signals.iter()
        .zip(offsets)
        .filter(|(s, _)| s.is_annotation)
        .map(|(s, offset)| (offset, s.samples_per_record as usize * 2))
        .collect();

    // annotation onsets move with the header start time
    let shift = whole_seconds * TIME_DIMENSION;
    let annotations: Vec<Annotation> = reader.annotations().iter()
        .map(|a| Annotation { onset: a.onset.saturating_sub(shift), ..a.clone() })
        .collect();

    let mut writer = EdfWriter::create(path, &raw, header.record_size)?;
    for (j, source_index) in (first..end).enumerate() {
        let mut record = reader.read_record(source_index)?;

        if let Some((&(offset, len), rest)) = annotation_channels.split_first() {
            let record_onset = subsecond + j as i64 * header.datarecord_duration;
            let record_end = record_onset + header.datarecord_duration;
            let in_record: Vec<&Annotation> = annotations.iter()
                .filter(|a| a.onset >= record_onset && a.onset < record_end)
                .collect();

            let (tal_bytes, dropped) = tal::encode(record_onset, &in_record, len);
            if dropped > 0 {
                warn!(record = j, dropped, "annotations did not fit into the segment's annotation channel");
            }
            if tal_bytes.len() != len {
                return Err(EdfError::InvalidFormat(format!(
                    "annotation channel of {} bytes cannot hold the record time stamp", len
                )));
            }
            record[offset..offset + len].copy_from_slice(&tal_bytes);
            for &(offset, len) in rest {
                record[offset..offset + len].fill(0);
            }
        }

        writer.write_record(&record)?;
    }
    writer.finalize()?;
    Ok(())
}

fn patch_start(raw: &mut [u8], header: &EdfHeader, start: NaiveDateTime) {
    write_field(&mut raw[168..176], &format!(
        "{:02}.{:02}.{:02}", start.day(), start.month(), start.year() % 100
    ));
    write_field(&mut raw[176..184], &format!(
        "{:02}.{:02}.{:02}", start.hour(), start.minute(), start.second()
    ));

    if header.file_type.is_edfplus()
        && !header.recording_startdate.is_empty()
        && !header.recording_startdate.eq_ignore_ascii_case("X")
    {
        let new_date = start.format("%d-%b-%Y").to_string().to_uppercase();
        let recording = header.recording_field.replacen(&header.recording_startdate, &new_date, 1);
        write_field(&mut raw[88..168], &recording);
    }
}
