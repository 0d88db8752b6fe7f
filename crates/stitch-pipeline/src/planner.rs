//! Greedy longest-phrase planning.
//!
//! The planner walks the token sequence left to right, asking the catalog
//! for the longest phrase starting at the cursor before falling back to a
//! single-word clip and finally a placeholder. Videos already used in the
//! plan are excluded from later lookups to diversify the output; the
//! catalog waives the exclusion when it would leave nothing.

use std::collections::HashSet;

use async_trait::async_trait;
use tracing::{debug, info};

use stitch_catalog::{CatalogResult, ClipCatalog, LookupOptions};
use stitch_models::{PhraseHit, SegmentPick, VideoId, WordClip, WordSpan};

/// Bounds for the configurable maximum phrase length.
pub const MAX_PHRASE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 1..=50;

/// Clip lookups the planner depends on. Implemented by the SQLite
/// catalog; tests substitute an in-memory source.
#[async_trait]
pub trait ClipSource: Send + Sync {
    async fn lookup_word(
        &self,
        word: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<WordClip>>;

    async fn lookup_phrase(
        &self,
        phrase: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<PhraseHit>>;
}

#[async_trait]
impl ClipSource for ClipCatalog {
    async fn lookup_word(
        &self,
        word: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<WordClip>> {
        ClipCatalog::lookup_word(self, word, opts).await
    }

    async fn lookup_phrase(
        &self,
        phrase: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<PhraseHit>> {
        ClipCatalog::lookup_phrase(self, phrase, opts).await
    }
}

/// Planner output: picks exactly partitioning the input tokens, plus the
/// tokens with no catalog hit.
#[derive(Debug, Clone)]
pub struct Plan {
    pub picks: Vec<SegmentPick>,
    pub missing: Vec<String>,
}

impl Plan {
    /// Count of picks that resolved to real clips.
    pub fn clip_count(&self) -> usize {
        self.picks.iter().filter(|p| !p.is_placeholder()).count()
    }
}

/// Build a covering plan for `tokens`.
///
/// `max_phrase_len` is clamped to `[1, 50]`; a value of 1 disables phrase
/// matching entirely.
pub async fn plan<S: ClipSource>(
    source: &S,
    tokens: &[String],
    max_phrase_len: usize,
    preferred_channels: &[String],
) -> CatalogResult<Plan> {
    let max_phrase_len = max_phrase_len.clamp(
        *MAX_PHRASE_LENGTH_RANGE.start(),
        *MAX_PHRASE_LENGTH_RANGE.end(),
    );

    let mut picks = Vec::new();
    let mut missing = Vec::new();
    let mut used_videos: HashSet<VideoId> = HashSet::new();

    let mut i = 0;
    while i < tokens.len() {
        let opts = LookupOptions {
            exclude_videos: used_videos.clone(),
            preferred_channels: preferred_channels.to_vec(),
        };

        let longest = max_phrase_len.min(tokens.len() - i);
        let mut matched = false;

        for k in (2..=longest).rev() {
            let phrase = tokens[i..i + k].join(" ");
            if let Some(hit) = source.lookup_phrase(&phrase, &opts).await? {
                info!(phrase = %phrase, video_id = %hit.video_id, words = k, "Matched phrase");
                used_videos.insert(hit.video_id.clone());
                picks.push(SegmentPick::Clip {
                    video_id: hit.video_id,
                    start: hit.start,
                    end: hit.end,
                    text: hit.text,
                    word_span: WordSpan::new(i, i + k),
                });
                i += k;
                matched = true;
                break;
            }
        }
        if matched {
            continue;
        }

        let word = &tokens[i];
        match source.lookup_word(word, &opts).await? {
            Some(clip) => {
                debug!(word = %word, video_id = %clip.video_id, "Matched single word");
                used_videos.insert(clip.video_id.clone());
                let end = clip.end();
                picks.push(SegmentPick::Clip {
                    video_id: clip.video_id,
                    start: clip.start,
                    end,
                    text: clip.word,
                    word_span: WordSpan::single(i),
                });
            }
            None => {
                debug!(word = %word, "No clip found, emitting placeholder");
                missing.push(word.clone());
                picks.push(SegmentPick::Placeholder {
                    text: word.clone(),
                    word_span: WordSpan::single(i),
                });
            }
        }
        i += 1;
    }

    info!(
        picks = picks.len(),
        missing = missing.len(),
        unique_videos = used_videos.len(),
        "Plan complete"
    );

    Ok(Plan { picks, missing })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use stitch_models::tokenize;

    /// In-memory clip source: phrases and words resolve through simple
    /// maps, honoring exclusion with the catalog's waiver rule.
    #[derive(Default)]
    struct FakeSource {
        phrases: HashMap<String, PhraseHit>,
        words: HashMap<String, Vec<WordClip>>,
        phrase_lookups: AtomicUsize,
    }

    impl FakeSource {
        fn with_phrase(mut self, text: &str, video: &str, start: f64, end: f64) -> Self {
            self.phrases.insert(
                text.to_string(),
                PhraseHit {
                    video_id: VideoId::new(video),
                    start,
                    end,
                    text: text.to_string(),
                },
            );
            self
        }

        fn with_word(mut self, word: &str, video: &str, start: f64, duration: f64) -> Self {
            self.words.entry(word.to_string()).or_default().push(WordClip {
                word: word.to_string(),
                video_id: VideoId::new(video),
                start,
                duration,
            });
            self
        }

        fn phrase_lookup_count(&self) -> usize {
            self.phrase_lookups.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClipSource for FakeSource {
        async fn lookup_word(
            &self,
            word: &str,
            opts: &LookupOptions,
        ) -> CatalogResult<Option<WordClip>> {
            let Some(candidates) = self.words.get(word) else {
                return Ok(None);
            };
            let allowed = candidates
                .iter()
                .find(|c| !opts.exclude_videos.contains(&c.video_id));
            // Exclusion waiver: fall back to any candidate
            Ok(allowed.or(candidates.first()).cloned())
        }

        async fn lookup_phrase(
            &self,
            phrase: &str,
            opts: &LookupOptions,
        ) -> CatalogResult<Option<PhraseHit>> {
            self.phrase_lookups.fetch_add(1, Ordering::SeqCst);
            let hit = self.phrases.get(phrase);
            Ok(hit
                .filter(|h| !opts.exclude_videos.contains(&h.video_id))
                .or(hit)
                .cloned())
        }
    }

    fn assert_partitions(picks: &[SegmentPick], n: usize) {
        let mut cursor = 0;
        for pick in picks {
            let span = pick.word_span();
            assert_eq!(span.start, cursor, "gap or overlap at token {cursor}");
            assert!(span.end > span.start);
            cursor = span.end;
        }
        assert_eq!(cursor, n, "picks do not cover all tokens");
    }

    #[tokio::test]
    async fn whole_sentence_matches_as_one_phrase() {
        let source = FakeSource::default()
            .with_phrase("hello world how are you", "V1", 0.0, 2.2);
        let tokens = tokenize("hello world how are you");

        let plan = plan(&source, &tokens, 5, &[]).await.unwrap();

        assert_eq!(plan.picks.len(), 1);
        assert_partitions(&plan.picks, 5);
        assert!(plan.missing.is_empty());
        match &plan.picks[0] {
            SegmentPick::Clip { video_id, start, end, .. } => {
                assert_eq!(video_id.as_str(), "V1");
                assert_eq!((*start, *end), (0.0, 2.2));
            }
            other => panic!("expected clip pick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_word_becomes_placeholder() {
        let source = FakeSource::default().with_phrase("hello world", "V1", 0.0, 1.1);
        let tokens = tokenize("hello world goodbye");

        let plan = plan(&source, &tokens, 5, &[]).await.unwrap();

        assert_eq!(plan.picks.len(), 2);
        assert_partitions(&plan.picks, 3);
        assert_eq!(plan.missing, vec!["goodbye"]);
        assert!(plan.picks[1].is_placeholder());
    }

    #[tokio::test]
    async fn greedy_match_prefers_longest_then_continues() {
        let source = FakeSource::default()
            .with_phrase("the quick brown", "V1", 0.0, 1.2)
            .with_phrase("brown fox jumps", "V2", 3.0, 4.4)
            .with_phrase("fox jumps", "V2", 3.5, 4.4);
        let tokens = tokenize("the quick brown fox jumps");

        let plan = plan(&source, &tokens, 5, &[]).await.unwrap();

        assert_eq!(plan.picks.len(), 2);
        assert_partitions(&plan.picks, 5);
        let videos: Vec<&str> = plan
            .picks
            .iter()
            .map(|p| match p {
                SegmentPick::Clip { video_id, .. } => video_id.as_str(),
                _ => panic!("unexpected placeholder"),
            })
            .collect();
        assert_eq!(videos, vec!["V1", "V2"]);
    }

    #[tokio::test]
    async fn max_phrase_length_one_skips_phrase_lookups() {
        let source = FakeSource::default()
            .with_phrase("hello world", "V1", 0.0, 1.1)
            .with_word("hello", "V1", 0.0, 0.5)
            .with_word("world", "V1", 0.5, 0.6);
        let tokens = tokenize("hello world");

        let plan = plan(&source, &tokens, 1, &[]).await.unwrap();

        assert_eq!(source.phrase_lookup_count(), 0);
        assert_eq!(plan.picks.len(), 2);
        assert_partitions(&plan.picks, 2);

        // Both words resolve to V1: the second lookup excluded V1 but the
        // waiver lets it through anyway.
        for pick in &plan.picks {
            match pick {
                SegmentPick::Clip { video_id, .. } => assert_eq!(video_id.as_str(), "V1"),
                other => panic!("expected clip pick, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn all_tokens_missing_yields_all_placeholders() {
        let source = FakeSource::default();
        let tokens = tokenize("completely unknown words");

        let plan = plan(&source, &tokens, 10, &[]).await.unwrap();

        assert_eq!(plan.picks.len(), 3);
        assert_partitions(&plan.picks, 3);
        assert!(plan.picks.iter().all(SegmentPick::is_placeholder));
        assert_eq!(plan.missing, vec!["completely", "unknown", "words"]);
        assert_eq!(plan.clip_count(), 0);
    }

    #[tokio::test]
    async fn single_word_pick_uses_clip_duration() {
        let source = FakeSource::default().with_word("hello", "V1", 4.0, 0.5);
        let tokens = tokenize("hello");

        let plan = plan(&source, &tokens, 5, &[]).await.unwrap();
        match &plan.picks[0] {
            SegmentPick::Clip { start, end, .. } => {
                assert_eq!(*start, 4.0);
                assert!((end - 4.5).abs() < 1e-9);
            }
            other => panic!("expected clip pick, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn oversized_max_phrase_len_is_clamped() {
        let source = FakeSource::default().with_word("hi", "V1", 0.0, 0.2);
        let tokens = tokenize("hi");
        let plan = plan(&source, &tokens, 500, &[]).await.unwrap();
        assert_eq!(plan.picks.len(), 1);
    }
}
