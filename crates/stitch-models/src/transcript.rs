//! Word-level video transcripts.
//!
//! Transcripts are persisted as a JSON array of `[word, start, end]`
//! triples; this module parses that blob into typed entries.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::clip::VideoId;

/// One timed word in a transcript. `end > start`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptWord {
    pub text: String,
    pub start: f64,
    pub end: f64,
}

/// A full per-video transcript, sorted by word start time.
#[derive(Debug, Clone, PartialEq)]
pub struct Transcript {
    pub video_id: VideoId,
    pub words: Vec<TranscriptWord>,
}

#[derive(Debug, Error)]
pub enum TranscriptError {
    #[error("transcript JSON is not an array")]
    NotAnArray,

    #[error("transcript entry {0} is malformed (expected [word, start, end])")]
    MalformedEntry(usize),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Transcript {
    /// Parse the stored `[[word, start, end], ...]` blob.
    pub fn from_json(video_id: VideoId, json: &str) -> Result<Self, TranscriptError> {
        let value: Value = serde_json::from_str(json)?;
        let entries = value.as_array().ok_or(TranscriptError::NotAnArray)?;

        let mut words = Vec::with_capacity(entries.len());
        for (i, entry) in entries.iter().enumerate() {
            let triple = entry
                .as_array()
                .filter(|t| t.len() >= 3)
                .ok_or(TranscriptError::MalformedEntry(i))?;
            let text = triple[0]
                .as_str()
                .ok_or(TranscriptError::MalformedEntry(i))?
                .to_string();
            let start = triple[1].as_f64().ok_or(TranscriptError::MalformedEntry(i))?;
            let end = triple[2].as_f64().ok_or(TranscriptError::MalformedEntry(i))?;
            words.push(TranscriptWord { text, start, end });
        }

        Ok(Self { video_id, words })
    }

    /// Serialize back to the stored triple format.
    pub fn to_json(&self) -> String {
        let triples: Vec<Value> = self
            .words
            .iter()
            .map(|w| serde_json::json!([w.text, w.start, w.end]))
            .collect();
        Value::Array(triples).to_string()
    }

    pub fn word_count(&self) -> usize {
        self.words.len()
    }

    /// Total spoken duration, end of the last word.
    pub fn duration(&self) -> f64 {
        self.words.last().map(|w| w.end).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_triples() {
        let json = r#"[["hello", 0.0, 0.5], ["world", 0.5, 1.1]]"#;
        let t = Transcript::from_json(VideoId::new("v1"), json).unwrap();
        assert_eq!(t.word_count(), 2);
        assert_eq!(t.words[1].text, "world");
        assert!((t.duration() - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        let json = r#"[["hello", 0.0]]"#;
        let err = Transcript::from_json(VideoId::new("v1"), json).unwrap_err();
        assert!(matches!(err, TranscriptError::MalformedEntry(0)));

        let err = Transcript::from_json(VideoId::new("v1"), "{}").unwrap_err();
        assert!(matches!(err, TranscriptError::NotAnArray));
    }

    #[test]
    fn test_round_trip() {
        let json = r#"[["hello",0.0,0.5],["world",0.5,1.1]]"#;
        let t = Transcript::from_json(VideoId::new("v1"), json).unwrap();
        let back = Transcript::from_json(VideoId::new("v1"), &t.to_json()).unwrap();
        assert_eq!(t, back);
    }

    #[test]
    fn test_empty_transcript_duration() {
        let t = Transcript::from_json(VideoId::new("v1"), "[]").unwrap();
        assert_eq!(t.duration(), 0.0);
    }
}
