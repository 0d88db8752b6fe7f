//! Catalog schema.
//!
//! The four tables are created and populated by the ingestion tooling;
//! `apply` exists so tests and local fixtures can build a catalog from
//! scratch.

use sqlx::SqlitePool;

use crate::error::CatalogResult;

/// Full catalog schema: source videos, per-word clips, per-video
/// transcripts and the 2-5-gram phrase index.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS videos (
    video_id      TEXT PRIMARY KEY,
    title         TEXT,
    channel_id    TEXT,
    channel_title TEXT,
    lang_default  TEXT,
    published_at  TEXT
);

CREATE TABLE IF NOT EXISTS word_clips (
    word       TEXT NOT NULL,
    video_id   TEXT NOT NULL,
    start_time REAL NOT NULL,
    duration   REAL NOT NULL,
    PRIMARY KEY (word, video_id, start_time)
);
CREATE INDEX IF NOT EXISTS idx_word_clips_word ON word_clips(word);
CREATE INDEX IF NOT EXISTS idx_word_clips_video ON word_clips(video_id);
CREATE INDEX IF NOT EXISTS idx_word_clips_word_video ON word_clips(word, video_id);
CREATE INDEX IF NOT EXISTS idx_word_clips_video_start ON word_clips(video_id, start_time);

CREATE TABLE IF NOT EXISTS video_transcripts (
    video_id        TEXT PRIMARY KEY,
    transcript_json TEXT NOT NULL,
    word_count      INTEGER NOT NULL,
    duration        REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS phrase_index (
    phrase_hash TEXT NOT NULL,
    phrase_text TEXT NOT NULL,
    video_id    TEXT NOT NULL,
    start_time  REAL NOT NULL,
    end_time    REAL NOT NULL,
    word_count  INTEGER NOT NULL,
    PRIMARY KEY (phrase_hash, video_id, start_time)
);
CREATE INDEX IF NOT EXISTS idx_phrase_index_hash ON phrase_index(phrase_hash);
CREATE INDEX IF NOT EXISTS idx_phrase_index_text ON phrase_index(phrase_text);
CREATE INDEX IF NOT EXISTS idx_phrase_index_video ON phrase_index(video_id);
CREATE INDEX IF NOT EXISTS idx_phrase_index_word_count ON phrase_index(word_count);
"#;

/// Create all catalog tables and indexes if absent.
pub async fn apply(pool: &SqlitePool) -> CatalogResult<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
