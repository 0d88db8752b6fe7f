//! Clips, phrase hits and planner segment picks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque source-video identifier (11 characters for YouTube ids).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VideoId(pub String);

impl VideoId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for the source provider.
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for VideoId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One spoken occurrence of a word in a source video.
///
/// `word` is stored normalized; `duration` is always positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordClip {
    pub word: String,
    pub video_id: VideoId,
    /// Offset of the word in the source video, seconds.
    pub start: f64,
    /// Spoken duration, seconds.
    pub duration: f64,
}

impl WordClip {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// A contiguous phrase occurrence resolved from the phrase index or a
/// transcript scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhraseHit {
    pub video_id: VideoId,
    pub start: f64,
    pub end: f64,
    /// The matched phrase, normalized.
    pub text: String,
}

impl PhraseHit {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Half-open token range `[start, end)` into the planner's input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordSpan {
    pub start: usize,
    pub end: usize,
}

impl WordSpan {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(end > start, "word span must be non-empty");
        Self { start, end }
    }

    pub fn single(index: usize) -> Self {
        Self::new(index, index + 1)
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }
}

/// One element of a plan: a real clip or a synthesized placeholder card,
/// covering a contiguous token span of the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SegmentPick {
    Clip {
        video_id: VideoId,
        start: f64,
        end: f64,
        text: String,
        word_span: WordSpan,
    },
    Placeholder {
        text: String,
        word_span: WordSpan,
    },
}

impl SegmentPick {
    pub fn word_span(&self) -> WordSpan {
        match self {
            SegmentPick::Clip { word_span, .. } => *word_span,
            SegmentPick::Placeholder { word_span, .. } => *word_span,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            SegmentPick::Clip { text, .. } => text,
            SegmentPick::Placeholder { text, .. } => text,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self, SegmentPick::Placeholder { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_id_watch_url() {
        let id = VideoId::new("dQw4w9WgXcQ");
        assert_eq!(id.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_word_span() {
        let span = WordSpan::new(2, 5);
        assert_eq!(span.len(), 3);
        assert_eq!(WordSpan::single(4), WordSpan::new(4, 5));
    }

    #[test]
    fn test_pick_accessors() {
        let pick = SegmentPick::Placeholder {
            text: "goodbye".to_string(),
            word_span: WordSpan::single(0),
        };
        assert!(pick.is_placeholder());
        assert_eq!(pick.text(), "goodbye");
        assert_eq!(pick.word_span().len(), 1);
    }

    #[test]
    fn test_pick_serde_tagging() {
        let pick = SegmentPick::Clip {
            video_id: VideoId::new("abc123def45"),
            start: 1.0,
            end: 2.5,
            text: "hello world".to_string(),
            word_span: WordSpan::new(0, 2),
        };
        let json = serde_json::to_value(&pick).unwrap();
        assert_eq!(json["kind"], "clip");
    }
}
