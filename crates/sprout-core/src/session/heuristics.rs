//! Lexicon-based energy and performance classification
//!
//! Short-phrase keyword matching, kept as the documented baseline. Each
//! utterance is scored against small marker sets; no match leaves the
//! previous classification in place.

use super::types::{EnergyLevel, PerformanceLevel};

const HIGH_ENERGY_MARKERS: &[&str] = &[
    "awesome", "cool", "yay", "wow", "fun", "love this", "more", "again", "let's go", "excited",
];

const LOW_ENERGY_MARKERS: &[&str] = &[
    "tired", "bored", "boring", "sleepy", "stop", "done", "whatever", "meh", "can we quit",
];

const CONFUSION_MARKERS: &[&str] = &[
    "i don't get it",
    "i dont get it",
    "confused",
    "don't understand",
    "dont understand",
    "too hard",
    "what does that mean",
    "huh",
    "i give up",
    "help",
];

const EXCELLENCE_MARKERS: &[&str] = &[
    "i got it",
    "that's easy",
    "thats easy",
    "i know this",
    "easy",
    "got it right",
    "i did it",
    "another one",
    "too easy",
];

/// Classify energy from one utterance; `None` means no signal
pub fn classify_energy(utterance: &str) -> Option<EnergyLevel> {
    let text = utterance.to_lowercase();
    if LOW_ENERGY_MARKERS.iter().any(|m| text.contains(m)) {
        Some(EnergyLevel::Low)
    } else if HIGH_ENERGY_MARKERS.iter().any(|m| text.contains(m)) {
        Some(EnergyLevel::High)
    } else {
        None
    }
}

/// Classify performance from one utterance; `None` means no signal
///
/// Confusion wins over excellence when both match: a confused learner
/// quoting "easy" is still confused.
pub fn classify_performance(utterance: &str) -> Option<PerformanceLevel> {
    let text = utterance.to_lowercase();
    if CONFUSION_MARKERS.iter().any(|m| text.contains(m)) {
        Some(PerformanceLevel::Struggling)
    } else if EXCELLENCE_MARKERS.iter().any(|m| text.contains(m)) {
        Some(PerformanceLevel::Excelling)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_high_energy() {
        assert_eq!(classify_energy("Wow this is awesome!"), Some(EnergyLevel::High));
    }

    #[test]
    fn test_low_energy() {
        assert_eq!(classify_energy("i'm tired, can we stop"), Some(EnergyLevel::Low));
    }

    #[test]
    fn test_no_energy_signal() {
        assert_eq!(classify_energy("what is seven times eight"), None);
    }

    #[test]
    fn test_struggling() {
        assert_eq!(
            classify_performance("I don't get it, this is too hard"),
            Some(PerformanceLevel::Struggling)
        );
    }

    #[test]
    fn test_excelling() {
        assert_eq!(
            classify_performance("that's easy, i did it!"),
            Some(PerformanceLevel::Excelling)
        );
    }

    #[test]
    fn test_confusion_wins_over_excellence() {
        assert_eq!(
            classify_performance("people say it's easy but i don't understand"),
            Some(PerformanceLevel::Struggling)
        );
    }

    #[test]
    fn test_classification_is_case_insensitive() {
        assert_eq!(
            classify_performance("I GIVE UP"),
            Some(PerformanceLevel::Struggling)
        );
    }
}
