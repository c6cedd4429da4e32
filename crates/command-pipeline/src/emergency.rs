/// Whole-word stop keywords that bypass every other stage.
#[derive(Debug, Clone)]
pub struct EmergencyDetector {
    words: Vec<String>,
}

impl Default for EmergencyDetector {
    fn default() -> Self {
        Self::with_words(["stop", "halt", "emergency", "freeze", "abort"])
    }
}

impl EmergencyDetector {
    pub fn with_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            words: words
                .into_iter()
                .map(|w| w.into().to_lowercase())
                .collect(),
        }
    }

    /// The first keyword found in `text`, if any.
    pub fn detect(&self, text: &str) -> Option<&str> {
        let lower = text.to_lowercase();
        lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .find_map(|word| self.words.iter().find(|k| k.as_str() == word))
            .map(String::as_str)
    }

    pub fn is_emergency(&self, text: &str) -> bool {
        self.detect(text).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_whole_words_only() {
        let detector = EmergencyDetector::default();
        assert_eq!(detector.detect("STOP!"), Some("stop"));
        assert_eq!(detector.detect("please halt now"), Some("halt"));
        assert_eq!(detector.detect("freeze, robot"), Some("freeze"));
        assert!(detector.is_emergency("don't stop believing"));
        assert!(!detector.is_emergency("unstoppable sandwich"));
        assert!(!detector.is_emergency("make a blt"));
    }
}
