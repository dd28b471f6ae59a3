//! EDF+ Time-stamped Annotation Lists.
//!
//! An annotation channel stores, per data record, a sequence of TALs:
//! `+<onset>[\x15<duration>]\x14<text>\x14[<text>\x14...]\x00`. The first TAL of
//! the first annotation channel in every record carries no text and holds the
//! record's own start time ("time-keeping" TAL). Unused bytes are zero.

use crate::error::{EdfError, EdfResult};
use crate::types::Annotation;
use crate::utils::{format_edf_time, parse_edf_time};

const TAL_END: u8 = 0x00;
const TEXT_SEPARATOR: u8 = 0x14;
const DURATION_SEPARATOR: u8 = 0x15;

/// Longest description written back into a TAL.
pub const MAX_DESCRIPTION_LEN: usize = 40;

/// Decoded contents of one annotation channel in one data record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RecordTals {
    /// Start of the data record, from the time-keeping TAL.
    pub timekeeping: Option<i64>,
    pub annotations: Vec<Annotation>,
}

/// Decodes the raw bytes of one annotation channel of one data record.
pub fn decode(bytes: &[u8], record: i64) -> EdfResult<RecordTals> {
    let mut result = RecordTals::default();
    let invalid = |reason: String| EdfError::InvalidAnnotation { record, reason };

    for chunk in bytes.split(|&b| b == TAL_END) {
        if chunk.is_empty() {
            continue;
        }

        let mut parts = chunk.split(|&b| b == TEXT_SEPARATOR);
        let stamp = parts.next().unwrap_or_default();
        if chunk.last() != Some(&TEXT_SEPARATOR) {
            return Err(invalid("TAL is not terminated by 0x14".to_string()));
        }

        let (onset_bytes, duration_bytes) = match stamp.iter().position(|&b| b == DURATION_SEPARATOR) {
            Some(pos) => (&stamp[..pos], Some(&stamp[pos + 1..])),
            None => (stamp, None),
        };

        let onset_str = std::str::from_utf8(onset_bytes)
            .map_err(|_| invalid("onset is not ASCII".to_string()))?;
        if !onset_str.starts_with('+') && !onset_str.starts_with('-') {
            return Err(invalid(format!("onset '{}' has no sign", onset_str)));
        }
        let onset = parse_edf_time(onset_str).map_err(|e| invalid(e.to_string()))?;

        let duration = match duration_bytes {
            Some(d) => {
                let text = std::str::from_utf8(d)
                    .map_err(|_| invalid("duration is not ASCII".to_string()))?;
                parse_edf_time(text).map_err(|e| invalid(e.to_string()))?
            }
            None => -1,
        };

        let texts: Vec<&[u8]> = parts.filter(|t| !t.is_empty()).collect();
        if texts.is_empty() {
            // only the first text-less TAL of a record keeps time
            if result.timekeeping.is_none() && result.annotations.is_empty() {
                result.timekeeping = Some(onset);
            }
            continue;
        }

        for text in texts {
            result.annotations.push(Annotation {
                onset,
                duration,
                description: String::from_utf8_lossy(text).trim().to_string(),
            });
        }
    }

    Ok(result)
}

/// Encodes one annotation channel for one data record.
///
/// Returns the zero-padded bytes and the number of annotations that did not
/// fit into `capacity` bytes.
pub fn encode(record_onset: i64, annotations: &[&Annotation], capacity: usize) -> (Vec<u8>, usize) {
    let mut tal_data = Vec::with_capacity(capacity);

    tal_data.push(b'+');
    tal_data.extend_from_slice(format_edf_time(record_onset).as_bytes());
    tal_data.push(TEXT_SEPARATOR);
    tal_data.push(TEXT_SEPARATOR);
    tal_data.push(TAL_END);

    let mut dropped = 0;
    for annotation in annotations {
        let mut stamp = Vec::new();
        stamp.push(if annotation.onset < 0 { b'-' } else { b'+' });
        stamp.extend_from_slice(format_edf_time(annotation.onset.abs()).as_bytes());
        if annotation.duration >= 0 {
            stamp.push(DURATION_SEPARATOR);
            stamp.extend_from_slice(format_edf_time(annotation.duration).as_bytes());
        }
        stamp.push(TEXT_SEPARATOR);

        let description = truncate_utf8(&annotation.description, MAX_DESCRIPTION_LEN);
        // room for the description, its 0x14 and the closing 0x00
        let needed = stamp.len() + description.len().max(1) + 2;
        if tal_data.len() + needed > capacity {
            dropped += 1;
            continue;
        }

        tal_data.extend_from_slice(&stamp);
        if description.is_empty() {
            tal_data.push(b'-');
        } else {
            tal_data.extend_from_slice(description.as_bytes());
        }
        tal_data.push(TEXT_SEPARATOR);
        tal_data.push(TAL_END);
    }

    tal_data.resize(capacity.max(tal_data.len()), TAL_END);
    (tal_data, dropped)
}

fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TIME_DIMENSION;

    fn annotation(onset: f64, duration: Option<f64>, text: &str) -> Annotation {
        Annotation {
            onset: (onset * TIME_DIMENSION as f64) as i64,
            duration: duration.map(|d| (d * TIME_DIMENSION as f64) as i64).unwrap_or(-1),
            description: text.to_string(),
        }
    }

    #[test]
    fn test_decode_timekeeping_and_events() {
        let bytes = b"+3\x14\x14\x00+3.5\x152\x14Eyes closed\x14\x00+3.75\x14A\x14B\x14\x00\x00\x00";
        let tals = decode(bytes, 3).unwrap();
        assert_eq!(tals.timekeeping, Some(3 * TIME_DIMENSION));
        assert_eq!(tals.annotations.len(), 3);
        assert_eq!(tals.annotations[0].description, "Eyes closed");
        assert_eq!(tals.annotations[0].duration, 2 * TIME_DIMENSION);
        assert_eq!(tals.annotations[1].onset, 37_500_000);
        assert_eq!(tals.annotations[2].description, "B");
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode(b"3\x14\x14\x00", 0).is_err());
        assert!(decode(b"+3\x14text\x00", 0).is_err());
        assert!(decode(b"+x\x14\x14\x00", 0).is_err());
        assert_eq!(decode(&[0u8; 16], 0).unwrap(), RecordTals::default());
    }

    #[test]
    fn test_decode_rejects_onset_beyond_tick_range() {
        let err = decode(b"+99999999999999\x14\x14\x00", 4).unwrap_err();
        assert!(matches!(err, EdfError::InvalidAnnotation { record: 4, .. }));
        assert!(decode(b"+0\x14\x14\x00+1\x1599999999999999\x14Long\x14\x00", 0).is_err());
    }

    #[test]
    fn test_encode_then_decode_preserves_events() {
        let events = [annotation(20.0, None, "Hyperventilation"), annotation(20.5, Some(1.5), "Photic 10 Hz")];
        let refs: Vec<&Annotation> = events.iter().collect();
        let (bytes, dropped) = encode(20 * TIME_DIMENSION, &refs, 120);
        assert_eq!(bytes.len(), 120);
        assert_eq!(dropped, 0);

        let tals = decode(&bytes, 0).unwrap();
        assert_eq!(tals.timekeeping, Some(20 * TIME_DIMENSION));
        assert_eq!(tals.annotations, events.to_vec());
    }

    #[test]
    fn test_encode_drops_what_does_not_fit() {
        let events: Vec<Annotation> = (0..10).map(|i| annotation(i as f64, None, "Long enough text")).collect();
        let refs: Vec<&Annotation> = events.iter().collect();
        let (bytes, dropped) = encode(0, &refs, 60);
        assert_eq!(bytes.len(), 60);
        assert!(dropped > 0);
        let kept = decode(&bytes, 0).unwrap().annotations.len();
        assert_eq!(kept + dropped, 10);
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        let text = "Фотостимуляция 10 Гц и ещё немного текста";
        let cut = truncate_utf8(text, MAX_DESCRIPTION_LEN);
        assert!(cut.len() <= MAX_DESCRIPTION_LEN);
        assert!(text.starts_with(cut));
    }
}
