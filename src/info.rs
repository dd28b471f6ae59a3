use std::fmt::Write as _;

use crate::recording::Recording;

/// Human-readable description of one recording.
pub fn describe(recording: &Recording) -> String {
    let mut out = String::new();
    let name = if recording.patient_name.is_empty() { "Unknown" } else { recording.patient_name.as_str() };
    let birthdate = recording.birthdate
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "Unknown".to_string());
    let age = recording.age_at_recording()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let _ = writeln!(out, "File:            {}", recording.file_name());
    let _ = writeln!(out, "Patient:         {}", name);
    if !recording.patient_code.is_empty() && recording.patient_code != "X" {
        let _ = writeln!(out, "Patient code:    {}", recording.patient_code);
    }
    let _ = writeln!(out, "Sex:             {}", recording.sex);
    let _ = writeln!(out, "Birthdate:       {} (age {})", birthdate, age);
    let _ = writeln!(out, "Start:           {}", recording.start.format("%Y-%m-%d %H:%M:%S%.3f"));
    let _ = writeln!(out, "Duration:        {:.3} s", recording.duration);
    let _ = writeln!(out, "Data record:     {} s", recording.datarecord_duration);

    let _ = writeln!(out, "Channels ({}):", recording.channels.len());
    for (label, rate) in recording.channels.iter().zip(&recording.sample_rates) {
        let _ = writeln!(out, "  {:<16} {} Hz", label, rate);
    }

    let _ = writeln!(out, "Events ({}):", recording.events.len());
    for event in &recording.events {
        match event.duration {
            Some(d) => {
                let _ = writeln!(out, "  {:>10.3} s  {:>8.3} s  {}", event.onset, d, event.label);
            }
            None => {
                let _ = writeln!(out, "  {:>10.3} s  {:>10}  {}", event.onset, "", event.label);
            }
        }
    }
    out
}
