mod common;

use chrono::NaiveDate;
use common::Fixture;
use edfkit::{Config, EdfReader, Error, Outcome, Recording, Session};
use std::fs;

fn source_fixture() -> Fixture {
    let start = NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(23, 59, 50).unwrap();
    Fixture::new("Jan Jansen")
        .start(start)
        .seconds(62)
        .event(0.0, "Lights off")
        .event(20.0, "Eyes closed [auto]")
        .event(58.0, "Photic")
}

#[test]
fn test_62_second_recording_splits_in_two() {
    let dir = tempfile::tempdir().unwrap();
    let source = source_fixture().write(&dir.path().join("rec.edf"));
    let session = Session::new(dir.path(), Config::default()).unwrap();

    let segmentation = match session.segment(&source).unwrap() {
        Outcome::Done(s) => s,
        Outcome::Skipped(reason) => panic!("not split: {}", reason),
    };
    assert_eq!(segmentation.files.len(), 2);
    assert_eq!(segmentation.files[0].records, 20);
    assert_eq!(segmentation.files[1].records, 42);
    assert_eq!(segmentation.files[0].segment.from, "Lights off");
    assert_eq!(segmentation.files[0].segment.to, "Eyes closed");
    assert_eq!(segmentation.files[1].segment.to, "End");

    let segments_dir = session.segments_dir();
    let first = Recording::open(segments_dir.join("rec_seg1.edf")).unwrap();
    let second = Recording::open(segments_dir.join("rec_seg2.edf")).unwrap();

    assert_eq!(first.duration, 20.0);
    assert_eq!(first.start, NaiveDate::from_ymd_opt(2023, 3, 1).unwrap().and_hms_opt(23, 59, 50).unwrap());
    assert_eq!(first.events.len(), 1);
    assert_eq!(first.events[0].label, "Lights off");

    assert_eq!(second.duration, 42.0);
    assert_eq!(second.start, NaiveDate::from_ymd_opt(2023, 3, 2).unwrap().and_hms_opt(0, 0, 10).unwrap());
    let events: Vec<(f64, &str)> = second.events.iter().map(|e| (e.onset, e.label.as_str())).collect();
    assert_eq!(events, vec![(0.0, "Eyes closed [auto]"), (38.0, "Photic")]);

    // patient and channels carried over
    assert_eq!(second.patient_name, "Jan Jansen");
    assert_eq!(second.channels, vec!["EEG Fp1".to_string(), "EEG Fp2".to_string()]);
}

#[test]
fn test_segments_copy_samples_and_rewrite_header() {
    let dir = tempfile::tempdir().unwrap();
    let source = source_fixture().write(&dir.path().join("rec.edf"));
    let session = Session::new(dir.path(), Config::default()).unwrap();
    session.segment(&source).unwrap();

    let mut original = EdfReader::open(&source).unwrap();
    let mut second = EdfReader::open(session.segments_dir().join("rec_seg2.edf")).unwrap();
    assert_eq!(second.header().recording_startdate, "02-MAR-2023");
    assert_eq!(second.header().patient_field, original.header().patient_field);
    assert_eq!(second.header().datarecords_in_file, 42);

    let data_bytes = 2 * common::SAMPLES_PER_RECORD as usize * 2;
    for i in 0..42 {
        let copied = second.read_record(i).unwrap();
        let source_record = original.read_record(20 + i).unwrap();
        assert_eq!(copied[..data_bytes], source_record[..data_bytes], "record {}", i);
    }
}

#[test]
fn test_manifest_lists_every_segment() {
    let dir = tempfile::tempdir().unwrap();
    let source = source_fixture().write(&dir.path().join("rec.edf"));
    let session = Session::new(dir.path(), Config::default()).unwrap();
    session.segment(&source).unwrap();

    let manifest = fs::read_to_string(session.segments_dir().join("rec_segments.csv")).unwrap();
    let lines: Vec<&str> = manifest.lines().collect();
    assert_eq!(lines[0], "segment,file,start,end,duration,from,to");
    assert_eq!(lines[1], "1,rec_seg1.edf,0.000,20.000,20.000,Lights off,Eyes closed");
    assert_eq!(lines[2], "2,rec_seg2.edf,20.000,62.000,42.000,Eyes closed,End");
    assert_eq!(lines.len(), 3);
}

#[test]
fn test_excluded_events_are_not_boundaries() {
    let dir = tempfile::tempdir().unwrap();
    let source = source_fixture().write(&dir.path().join("rec.edf"));
    let mut config = Config::default();
    config.excluded_events = vec!["Eyes closed".to_string()];
    let session = Session::new(dir.path(), config).unwrap();

    // boundaries 0 and 58; the 4 s tail merges back into a single segment
    match session.segment(&source).unwrap() {
        Outcome::Done(s) => {
            assert_eq!(s.files.len(), 1);
            assert_eq!(s.files[0].records, 62);
        }
        Outcome::Skipped(reason) => panic!("not split: {}", reason),
    }
}

#[test]
fn test_recording_without_events_is_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let source = Fixture::new("Quiet").seconds(30).write(&dir.path().join("quiet.edf"));
    let session = Session::new(dir.path(), Config::default()).unwrap();

    assert!(matches!(session.segment(&source).unwrap(), Outcome::Skipped(_)));
    assert!(!session.segments_dir().join("quiet_seg1.edf").exists());
}

#[test]
fn test_unreadable_recording_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.edf");
    fs::write(&path, b"definitely not an EDF header").unwrap();
    let session = Session::new(dir.path(), Config::default()).unwrap();

    assert!(matches!(session.segment(&path), Err(Error::Parse { .. })));
}

#[test]
fn test_segment_files_are_numbered_without_gaps() {
    let dir = tempfile::tempdir().unwrap();
    let source = Fixture::new("Jan Jansen")
        .seconds(30)
        .event(0.0, "Rest")
        .event(10.0, "Blink")
        .event(10.2, "Hyperventilation")
        .write(&dir.path().join("rec.edf"));
    let mut config = Config::default();
    config.min_segment_duration_secs = 0.1;
    let session = Session::new(dir.path(), config).unwrap();

    // [10, 10.2) is shorter than one data record and is not written
    let segmentation = match session.segment(&source).unwrap() {
        Outcome::Done(s) => s,
        Outcome::Skipped(reason) => panic!("not split: {}", reason),
    };
    let indices: Vec<usize> = segmentation.files.iter().map(|f| f.segment.index).collect();
    assert_eq!(indices, vec![1, 2]);
    assert_eq!(segmentation.files[1].first_record, 10);
    assert_eq!(segmentation.files[1].records, 20);
    assert!(session.segments_dir().join("rec_seg2.edf").exists());
    assert!(!session.segments_dir().join("rec_seg3.edf").exists());

    let manifest = fs::read_to_string(&segmentation.manifest).unwrap();
    assert_eq!(manifest.lines().nth(2), Some("2,rec_seg2.edf,10.000,30.000,20.000,Hyperventilation,End"));
}

#[test]
fn test_protocol_labels_are_translated_and_artifacts_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let source = Fixture::new("Ivanov Ivan")
        .seconds(30)
        .event(0.0, "Фоновая запись")
        .event(10.0, "Артефакт")
        .event(20.0, "Встроенный фотостимулятор 10 Гц")
        .write(&dir.path().join("rec.edf"));
    let session = Session::new(dir.path(), Config::default()).unwrap();
    session.segment(&source).unwrap();

    let manifest = fs::read_to_string(session.segments_dir().join("rec_segments.csv")).unwrap();
    let lines: Vec<&str> = manifest.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[1], "1,rec_seg1.edf,0.000,20.000,20.000,Baseline,Photic10Hz");
    assert_eq!(lines[2], "2,rec_seg2.edf,20.000,30.000,10.000,Photic10Hz,End");

    // the segment files keep the original annotation text
    let first = Recording::open(session.segments_dir().join("rec_seg1.edf")).unwrap();
    let labels: Vec<&str> = first.events.iter().map(|e| e.label.as_str()).collect();
    assert_eq!(labels, vec!["Фоновая запись", "Артефакт"]);
}
