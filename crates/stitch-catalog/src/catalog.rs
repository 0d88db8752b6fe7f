//! Clip catalog queries and candidate selection.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use stitch_models::{normalize, tokenize, PhraseHit, Transcript, VideoId, WordClip};

use crate::cache::TranscriptCache;
use crate::error::{CatalogError, CatalogResult};

/// Phrase lengths covered by the n-gram index; longer phrases fall back
/// to the transcript scan.
const INDEXED_PHRASE_LENGTHS: std::ops::RangeInclusive<usize> = 2..=5;

/// Cap on candidate rows fetched per lookup.
const CANDIDATE_LIMIT: i64 = 500;

/// Filters applied to a lookup.
#[derive(Debug, Clone, Default)]
pub struct LookupOptions {
    /// Videos already used in the current plan; waived when exclusion
    /// would leave no candidate.
    pub exclude_videos: HashSet<VideoId>,
    /// When non-empty, only clips from these channels are considered.
    pub preferred_channels: Vec<String>,
}

/// Catalog summary counters.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogStats {
    pub words: u64,
    pub videos: u64,
    pub has_transcripts: bool,
    pub has_phrase_index: bool,
}

/// Read-only handle to the clip catalog. Cheap to share across jobs;
/// concurrent readers are safe.
#[derive(Debug)]
pub struct ClipCatalog {
    pool: SqlitePool,
    has_transcripts: bool,
    has_phrase_index: bool,
    cache: TranscriptCache,
}

/// One lookup candidate, before the selection policy is applied.
#[derive(Debug, Clone)]
struct Candidate {
    video_id: VideoId,
    start: f64,
    end: f64,
    channel_id: Option<String>,
}

impl Candidate {
    fn length(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(sqlx::FromRow)]
struct WordClipRow {
    word: String,
    video_id: String,
    start_time: f64,
    duration: f64,
    channel_id: Option<String>,
}

#[derive(sqlx::FromRow)]
struct PhraseRow {
    phrase_text: String,
    video_id: String,
    start_time: f64,
    end_time: f64,
    channel_id: Option<String>,
}

impl ClipCatalog {
    /// Open the catalog at `path`.
    ///
    /// Fails if the file does not exist or the `word_clips` table is
    /// missing; transcripts and the phrase index are optional and their
    /// presence is probed once here.
    pub async fn open(path: impl AsRef<Path>) -> CatalogResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(CatalogError::NotFound(path.to_path_buf()));
        }

        let options = SqliteConnectOptions::new().filename(path);
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(options)
            .await?;

        let catalog = Self::from_pool(pool).await?;
        info!(
            path = %path.display(),
            has_transcripts = catalog.has_transcripts,
            has_phrase_index = catalog.has_phrase_index,
            "Catalog opened"
        );
        Ok(catalog)
    }

    /// Build a catalog over an existing pool (used by tests with
    /// in-memory databases).
    pub async fn from_pool(pool: SqlitePool) -> CatalogResult<Self> {
        if !table_exists(&pool, "word_clips").await? {
            return Err(CatalogError::SchemaMissing("word_clips"));
        }
        let has_transcripts = table_exists(&pool, "video_transcripts").await?;
        let has_phrase_index = table_exists(&pool, "phrase_index").await?;

        Ok(Self {
            pool,
            has_transcripts,
            has_phrase_index,
            cache: TranscriptCache::default(),
        })
    }

    pub fn has_transcripts(&self) -> bool {
        self.has_transcripts
    }

    pub fn has_phrase_index(&self) -> bool {
        self.has_phrase_index
    }

    /// Look up one clip for a single word.
    pub async fn lookup_word(
        &self,
        word: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<WordClip>> {
        let normalized = normalize(word);
        if normalized.is_empty() {
            return Ok(None);
        }

        let rows: Vec<WordClipRow> = sqlx::query_as(
            r#"
            SELECT w.word, w.video_id, w.start_time, w.duration, v.channel_id
            FROM word_clips w
            LEFT JOIN videos v ON v.video_id = w.video_id
            WHERE w.word = ?1
            ORDER BY w.duration DESC, w.video_id, w.start_time
            LIMIT ?2
            "#,
        )
        .bind(&normalized)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let candidates: Vec<Candidate> = rows
            .iter()
            .map(|r| Candidate {
                video_id: VideoId::new(&r.video_id),
                start: r.start_time,
                end: r.start_time + r.duration,
                channel_id: r.channel_id.clone(),
            })
            .collect();

        let selected = match select_best(&candidates, opts) {
            Some(c) => c,
            None => {
                debug!(word = %normalized, "No clip found");
                return Ok(None);
            }
        };

        let word = rows
            .iter()
            .find(|r| r.video_id == selected.video_id.as_str() && r.start_time == selected.start)
            .map(|r| r.word.clone())
            .unwrap_or(normalized);

        Ok(Some(WordClip {
            word,
            video_id: selected.video_id.clone(),
            start: selected.start,
            duration: selected.length(),
        }))
    }

    /// Look up one occurrence of a multi-word phrase.
    ///
    /// Tries the n-gram index first when the phrase length is covered by
    /// it, then falls back to scanning transcripts of videos that contain
    /// every word of the phrase.
    pub async fn lookup_phrase(
        &self,
        phrase: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<PhraseHit>> {
        let normalized = normalize(phrase);
        let tokens = tokenize(&normalized);
        if tokens.len() < 2 {
            return Ok(None);
        }

        if self.has_phrase_index && INDEXED_PHRASE_LENGTHS.contains(&tokens.len()) {
            if let Some(hit) = self.lookup_phrase_indexed(&normalized, opts).await? {
                return Ok(Some(hit));
            }
        }

        if self.has_transcripts {
            return self.scan_transcripts(&normalized, &tokens, opts).await;
        }

        Ok(None)
    }

    async fn lookup_phrase_indexed(
        &self,
        normalized: &str,
        opts: &LookupOptions,
    ) -> CatalogResult<Option<PhraseHit>> {
        let hash = stitch_models::phrase_hash(normalized);

        let rows: Vec<PhraseRow> = sqlx::query_as(
            r#"
            SELECT p.phrase_text, p.video_id, p.start_time, p.end_time, v.channel_id
            FROM phrase_index p
            LEFT JOIN videos v ON v.video_id = p.video_id
            WHERE p.phrase_hash = ?1
            ORDER BY (p.end_time - p.start_time) DESC, p.video_id, p.start_time
            LIMIT ?2
            "#,
        )
        .bind(&hash)
        .bind(CANDIDATE_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        // Guard against hash collisions before applying the policy.
        let candidates: Vec<Candidate> = rows
            .iter()
            .filter(|r| normalize(&r.phrase_text) == normalized)
            .map(|r| Candidate {
                video_id: VideoId::new(&r.video_id),
                start: r.start_time,
                end: r.end_time,
                channel_id: r.channel_id.clone(),
            })
            .collect();

        Ok(select_best(&candidates, opts).map(|c| PhraseHit {
            video_id: c.video_id.clone(),
            start: c.start,
            end: c.end,
            text: normalized.to_string(),
        }))
    }

    /// Scan candidate transcripts for a contiguous token match.
    ///
    /// Candidate videos are pre-filtered through the word table: a video
    /// can only contain the phrase if it contains every word of it.
    async fn scan_transcripts(
        &self,
        normalized: &str,
        tokens: &[String],
        opts: &LookupOptions,
    ) -> CatalogResult<Option<PhraseHit>> {
        let mut candidate_videos: Option<HashSet<String>> = None;
        for token in tokens {
            let ids: Vec<String> =
                sqlx::query_scalar("SELECT DISTINCT video_id FROM word_clips WHERE word = ?1")
                    .bind(token)
                    .fetch_all(&self.pool)
                    .await?;
            let ids: HashSet<String> = ids.into_iter().collect();
            candidate_videos = Some(match candidate_videos {
                None => ids,
                Some(acc) => acc.intersection(&ids).cloned().collect(),
            });
            if candidate_videos.as_ref().is_some_and(HashSet::is_empty) {
                return Ok(None);
            }
        }
        let mut video_ids: Vec<String> = candidate_videos.unwrap_or_default().into_iter().collect();
        video_ids.sort();

        let mut candidates = Vec::new();
        for video_id in video_ids {
            let id = VideoId::new(&video_id);
            let Some(transcript) = self.transcript(&id).await? else {
                continue;
            };

            if let Some((start, end)) = find_phrase_span(&transcript.words, tokens) {
                let channel_id = if opts.preferred_channels.is_empty() {
                    None
                } else {
                    self.channel_of(&video_id).await?
                };
                candidates.push(Candidate {
                    video_id: id,
                    start,
                    end,
                    channel_id,
                });
            }
        }

        Ok(select_best(&candidates, opts).map(|c| PhraseHit {
            video_id: c.video_id.clone(),
            start: c.start,
            end: c.end,
            text: normalized.to_string(),
        }))
    }

    /// Fetch a parsed transcript, through the shared LRU.
    pub async fn transcript(&self, video_id: &VideoId) -> CatalogResult<Option<Arc<Transcript>>> {
        if !self.has_transcripts {
            return Ok(None);
        }
        if let Some(cached) = self.cache.get(video_id) {
            return Ok(Some(cached));
        }

        let json: Option<String> =
            sqlx::query_scalar("SELECT transcript_json FROM video_transcripts WHERE video_id = ?1")
                .bind(video_id.as_str())
                .fetch_optional(&self.pool)
                .await?;

        let Some(json) = json else {
            return Ok(None);
        };

        let transcript = Transcript::from_json(video_id.clone(), &json).map_err(|source| {
            CatalogError::CorruptTranscript {
                video_id: video_id.to_string(),
                source,
            }
        })?;

        let transcript = Arc::new(transcript);
        self.cache.insert(Arc::clone(&transcript));
        Ok(Some(transcript))
    }

    /// Catalog summary counters.
    pub async fn stats(&self) -> CatalogResult<CatalogStats> {
        let words: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM word_clips")
            .fetch_one(&self.pool)
            .await?;
        let videos: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT video_id) FROM word_clips")
            .fetch_one(&self.pool)
            .await?;

        Ok(CatalogStats {
            words: words as u64,
            videos: videos as u64,
            has_transcripts: self.has_transcripts,
            has_phrase_index: self.has_phrase_index,
        })
    }

    async fn channel_of(&self, video_id: &str) -> CatalogResult<Option<String>> {
        let channel: Option<Option<String>> =
            sqlx::query_scalar("SELECT channel_id FROM videos WHERE video_id = ?1")
                .bind(video_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(channel.flatten())
    }
}

async fn table_exists(pool: &SqlitePool, name: &str) -> CatalogResult<bool> {
    let found: Option<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;
    Ok(found.is_some())
}

/// Apply the selection policy to a candidate set.
///
/// Order: preferred-channel restriction, exclusion, longest span,
/// lexicographic `(video_id, start)` tie-break. Exclusion is waived when
/// it would leave nothing.
fn select_best<'a>(candidates: &'a [Candidate], opts: &LookupOptions) -> Option<&'a Candidate> {
    let channel_filtered: Vec<&Candidate> = if opts.preferred_channels.is_empty() {
        candidates.iter().collect()
    } else {
        candidates
            .iter()
            .filter(|c| {
                c.channel_id
                    .as_ref()
                    .is_some_and(|ch| opts.preferred_channels.iter().any(|p| p == ch))
            })
            .collect()
    };

    let unexcluded: Vec<&Candidate> = channel_filtered
        .iter()
        .copied()
        .filter(|c| !opts.exclude_videos.contains(&c.video_id))
        .collect();

    let pool = if unexcluded.is_empty() {
        &channel_filtered
    } else {
        &unexcluded
    };

    pool.iter().copied().min_by(|a, b| {
        b.length()
            .partial_cmp(&a.length())
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.video_id.cmp(&b.video_id))
            .then_with(|| a.start.partial_cmp(&b.start).unwrap_or(std::cmp::Ordering::Equal))
    })
}

/// Find the first contiguous occurrence of `tokens` in a transcript.
///
/// Returns the start of the first matched word and the end of the last.
fn find_phrase_span(
    words: &[stitch_models::TranscriptWord],
    tokens: &[String],
) -> Option<(f64, f64)> {
    if tokens.is_empty() || words.len() < tokens.len() {
        return None;
    }

    let normalized: Vec<String> = words.iter().map(|w| normalize(&w.text)).collect();

    for i in 0..=(words.len() - tokens.len()) {
        if (0..tokens.len()).all(|j| normalized[i + j] == tokens[j]) {
            let start = words[i].start;
            let end = words[i + tokens.len() - 1].end;
            return Some((start, end));
        }
    }
    None
}
