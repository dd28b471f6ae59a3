//! Event label normalisation, translation and filtering for segmentation.

use std::sync::OnceLock;
use regex::Regex;

use crate::recording::Event;

/// Labels that never open or close a segment: artifacts, print markers,
/// stimulus triggers and interpretation marks.
pub const DEFAULT_EXCLUDED_EVENTS: &[&str] = &[
    "stimFlash",
    "Артефакт",
    "Начало печати",
    "Окончание печати",
    "Эпилептиформная активность",
    "Комплекс \"острая волна - медленная волна\"",
    "Множественные спайки и острые волны",
    "Разрыв записи",
];

/// Russian protocol labels and their English segment names, matched by
/// substring in this order.
pub const TRANSLATIONS: &[(&str, &str)] = &[
    ("Фоновая запись", "Baseline"),
    ("Открывание глаз", "EyesOpen"),
    ("Закрывание глаз", "EyesClosed"),
    ("Без стимуляции", "Rest"),
    ("Фотостимуляция", "PhoticStim"),
    ("После фотостимуляции", "PostPhotic"),
    ("Встроенный фотостимулятор", "Photic"),
    ("Встроенный слуховой стимулятор", "Auditory"),
    ("Остановка стимуляции", "StimOff"),
    ("Гипервентиляция", "Hypervent"),
    ("После гипервентиляции", "PostHypervent"),
    ("Бодрствование", "Awake"),
];

fn bracketed() -> &'static Regex {
    static BRACKETED: OnceLock<Regex> = OnceLock::new();
    BRACKETED.get_or_init(|| Regex::new(r"\[.*?\]|\(.*?\)").expect("Invalid bracket regex"))
}

fn tone_frequency() -> &'static Regex {
    static TONE: OnceLock<Regex> = OnceLock::new();
    TONE.get_or_init(|| Regex::new(r"Тон\s*(\d+)\s*Гц").expect("Invalid tone regex"))
}

fn frequency() -> &'static Regex {
    static FREQUENCY: OnceLock<Regex> = OnceLock::new();
    FREQUENCY.get_or_init(|| Regex::new(r"(\d+)\s*Гц").expect("Invalid frequency regex"))
}

/// Removes closed `[...]` and `(...)` groups and collapses whitespace.
/// Unbalanced brackets stay as they are. A label that would become empty is
/// kept as it was.
pub fn clean_label(label: &str) -> String {
    let stripped = bracketed().replace_all(label, "");
    let cleaned = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    if cleaned.is_empty() {
        let trimmed = label.trim();
        if trimmed.is_empty() { "Unknown".to_string() } else { trimmed.to_string() }
    } else {
        cleaned
    }
}

/// Maps a cleaned label to its English name. Photic and auditory stimulus
/// names carry the frequency found in the raw label (`Photic10Hz`).
pub fn translate_label(raw: &str, cleaned: &str) -> Option<String> {
    let (_, english) = TRANSLATIONS.iter().find(|(russian, _)| cleaned.contains(russian))?;
    if english.contains("Photic") || english.contains("Auditory") {
        let hz = tone_frequency().captures(raw)
            .or_else(|| frequency().captures(raw))
            .and_then(|c| c.get(1));
        if let Some(hz) = hz {
            return Some(format!("{}{}Hz", english, hz.as_str()));
        }
    }
    Some(english.to_string())
}

/// Cleaned and, where a translation exists, English segment label.
pub fn segment_label(raw: &str) -> String {
    let cleaned = clean_label(raw);
    translate_label(raw, &cleaned).unwrap_or(cleaned)
}

/// Drops events whose raw or cleaned label is listed as excluded.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    excluded: Vec<String>,
}

impl EventFilter {
    pub fn new(excluded: &[String]) -> Self {
        EventFilter { excluded: excluded.to_vec() }
    }

    pub fn is_excluded(&self, label: &str) -> bool {
        let cleaned = clean_label(label);
        self.excluded.iter().any(|e| e == label.trim() || *e == cleaned)
    }

    /// Keeps usable events, with segment labels, in onset order.
    pub fn apply(&self, events: &[Event]) -> Vec<Event> {
        let mut kept: Vec<Event> = events.iter()
            .filter(|e| !self.is_excluded(&e.label))
            .map(|e| Event { label: segment_label(&e.label), ..e.clone() })
            .collect();
        kept.sort_by(|a, b| a.onset.total_cmp(&b.onset));
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(onset: f64, label: &str) -> Event {
        Event { onset, duration: None, label: label.to_string() }
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("Photic [10 Hz] stimulation"), "Photic stimulation");
        assert_eq!(clean_label("Hyperventilation (2 min)"), "Hyperventilation");
        assert_eq!(clean_label("  Eyes   closed "), "Eyes closed");
        assert_eq!(clean_label("[only brackets]"), "[only brackets]");
        assert_eq!(clean_label(""), "Unknown");
    }

    #[test]
    fn test_clean_label_keeps_unbalanced_brackets() {
        assert_eq!(clean_label("a (b"), "a (b");
        assert_eq!(clean_label("Photic [10 Hz"), "Photic [10 Hz");
        assert_eq!(clean_label("x (1) (y"), "x (y");
        assert_eq!(clean_label("a [b (c] d)"), "a d)");
    }

    #[test]
    fn test_russian_labels_are_translated() {
        assert_eq!(segment_label("Фоновая запись"), "Baseline");
        assert_eq!(segment_label("Закрывание глаз [авто]"), "EyesClosed");
        assert_eq!(segment_label("Встроенный фотостимулятор 12 Гц"), "Photic12Hz");
        assert_eq!(segment_label("Встроенный слуховой стимулятор Тон 1000 Гц (3 Гц)"), "Auditory1000Hz");
        assert_eq!(segment_label("Фотостимуляция"), "PhoticStim");
        assert_eq!(segment_label("Eyes closed [auto]"), "Eyes closed");
        assert_eq!(translate_label("Eyes closed", "Eyes closed"), None);
    }

    #[test]
    fn test_default_exclusions() {
        let excluded: Vec<String> = DEFAULT_EXCLUDED_EVENTS.iter().map(|s| s.to_string()).collect();
        let filter = EventFilter::new(&excluded);
        assert!(filter.is_excluded("Артефакт"));
        assert!(filter.is_excluded("Начало печати (авто)"));
        assert!(filter.is_excluded("stimFlash"));
        assert!(!filter.is_excluded("Фоновая запись"));

        let kept = filter.apply(&[event(0.0, "Разрыв записи"), event(4.0, "Гипервентиляция")]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].label, "Hypervent");
    }

    #[test]
    fn test_filter_excludes_and_sorts() {
        let filter = EventFilter::new(&["Artifact".to_string(), "stimFlash".to_string()]);
        let events = vec![
            event(30.0, "Eyes open"),
            event(10.0, "Artifact (muscle)"),
            event(5.0, "stimFlash"),
            event(20.0, "Eyes closed [auto]"),
        ];
        let kept = filter.apply(&events);
        let labels: Vec<&str> = kept.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Eyes closed", "Eyes open"]);
        assert!(EventFilter::default().apply(&events).len() == 4);
    }
}
