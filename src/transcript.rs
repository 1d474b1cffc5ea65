//! Running transcript assembled from streamed transcription replies.

/// Accumulates transcription text across speech segments.
///
/// Segments arrive one reply per utterance; joined with a single space
/// so the transcript reads as continuous prose.
#[derive(Debug, Default)]
pub struct TranscriptLog {
    text: String,
    segments: u64,
    last_error: Option<String>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one transcription segment. Empty segments are skipped.
    pub fn append(&mut self, segment: &str) {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            return;
        }

        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(trimmed);
        self.segments += 1;
    }

    /// Record a server-reported transcription error without touching the text.
    pub fn record_error(&mut self, error: &str) {
        self.last_error = Some(error.to_string());
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }

    pub fn segments(&self) -> u64 {
        self.segments
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn reset(&mut self) {
        self.text.clear();
        self.segments = 0;
        self.last_error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_joins_with_space() {
        let mut log = TranscriptLog::new();
        log.append("hello there");
        log.append("how are you");
        assert_eq!(log.text(), "hello there how are you");
        assert_eq!(log.segments(), 2);
    }

    #[test]
    fn test_first_segment_has_no_leading_space() {
        let mut log = TranscriptLog::new();
        log.append("hello");
        assert_eq!(log.text(), "hello");
    }

    #[test]
    fn test_empty_segments_skipped() {
        let mut log = TranscriptLog::new();
        log.append("one");
        log.append("");
        log.append("   ");
        log.append("two");
        assert_eq!(log.text(), "one two");
        assert_eq!(log.segments(), 2);
    }

    #[test]
    fn test_segments_trimmed() {
        let mut log = TranscriptLog::new();
        log.append("  padded  ");
        assert_eq!(log.text(), "padded");
    }

    #[test]
    fn test_error_preserves_text() {
        let mut log = TranscriptLog::new();
        log.append("kept");
        log.record_error("backend hiccup");
        assert_eq!(log.text(), "kept");
        assert_eq!(log.last_error(), Some("backend hiccup"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut log = TranscriptLog::new();
        log.append("stale");
        log.record_error("old");
        log.reset();
        assert!(!log.has_text());
        assert_eq!(log.segments(), 0);
        assert!(log.last_error().is_none());
    }
}
