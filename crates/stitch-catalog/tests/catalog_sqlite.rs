//! Catalog queries against a seeded in-memory database.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use stitch_catalog::{schema, CatalogError, ClipCatalog, LookupOptions};
use stitch_models::{normalize, phrase_hash, VideoId};

async fn memory_pool() -> SqlitePool {
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool")
}

async fn seeded_catalog() -> ClipCatalog {
    let pool = memory_pool().await;
    schema::apply(&pool).await.unwrap();

    insert_video(&pool, "vid00000001", "chan-a").await;
    insert_video(&pool, "vid00000002", "chan-b").await;

    // "hello world how are you" spoken in video 1
    let transcript_1 = [
        ("hello", 0.0, 0.5),
        ("world", 0.5, 1.1),
        ("how", 1.1, 1.5),
        ("are", 1.5, 1.8),
        ("you", 1.8, 2.2),
    ];
    seed_transcript(&pool, "vid00000001", &transcript_1).await;

    // A shorter "hello" also exists in video 2
    insert_word_clip(&pool, "hello", "vid00000002", 4.0, 0.3).await;

    ClipCatalog::from_pool(pool).await.unwrap()
}

async fn insert_video(pool: &SqlitePool, video_id: &str, channel_id: &str) {
    sqlx::query("INSERT INTO videos (video_id, channel_id) VALUES (?1, ?2)")
        .bind(video_id)
        .bind(channel_id)
        .execute(pool)
        .await
        .unwrap();
}

async fn insert_word_clip(pool: &SqlitePool, word: &str, video_id: &str, start: f64, duration: f64) {
    sqlx::query(
        "INSERT INTO word_clips (word, video_id, start_time, duration) VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(word)
    .bind(video_id)
    .bind(start)
    .bind(duration)
    .execute(pool)
    .await
    .unwrap();
}

/// Seed word clips, the transcript blob and all 2-5-gram index entries
/// for one video, the way the ingestion tooling would.
async fn seed_transcript(pool: &SqlitePool, video_id: &str, words: &[(&str, f64, f64)]) {
    for (word, start, end) in words {
        insert_word_clip(pool, word, video_id, *start, end - start).await;
    }

    let triples: Vec<serde_json::Value> = words
        .iter()
        .map(|(w, s, e)| serde_json::json!([w, s, e]))
        .collect();
    let json = serde_json::Value::Array(triples).to_string();
    let duration = words.last().map(|(_, _, e)| *e).unwrap_or(0.0);
    sqlx::query(
        "INSERT INTO video_transcripts (video_id, transcript_json, word_count, duration) \
         VALUES (?1, ?2, ?3, ?4)",
    )
    .bind(video_id)
    .bind(&json)
    .bind(words.len() as i64)
    .bind(duration)
    .execute(pool)
    .await
    .unwrap();

    for len in 2..=5usize {
        if words.len() < len {
            break;
        }
        for i in 0..=(words.len() - len) {
            let text: Vec<&str> = words[i..i + len].iter().map(|(w, _, _)| *w).collect();
            let text = text.join(" ");
            sqlx::query(
                "INSERT OR IGNORE INTO phrase_index \
                 (phrase_hash, phrase_text, video_id, start_time, end_time, word_count) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )
            .bind(phrase_hash(&text))
            .bind(&text)
            .bind(video_id)
            .bind(words[i].1)
            .bind(words[i + len - 1].2)
            .bind(len as i64)
            .execute(pool)
            .await
            .unwrap();
        }
    }
}

#[tokio::test]
async fn missing_word_clips_table_is_fatal() {
    let pool = memory_pool().await;
    let err = ClipCatalog::from_pool(pool).await.unwrap_err();
    assert!(matches!(err, CatalogError::SchemaMissing("word_clips")));
}

#[tokio::test]
async fn lookup_word_prefers_longest_clip() {
    let catalog = seeded_catalog().await;
    let clip = catalog
        .lookup_word("hello", &LookupOptions::default())
        .await
        .unwrap()
        .expect("hello is in the catalog");

    // 0.5s in video 1 beats 0.3s in video 2
    assert_eq!(clip.video_id.as_str(), "vid00000001");
    assert!((clip.duration - 0.5).abs() < 1e-9);
}

#[tokio::test]
async fn lookup_word_exclusion_and_waiver() {
    let catalog = seeded_catalog().await;

    let opts = LookupOptions {
        exclude_videos: [VideoId::new("vid00000001")].into_iter().collect(),
        ..Default::default()
    };
    let clip = catalog.lookup_word("hello", &opts).await.unwrap().unwrap();
    assert_eq!(clip.video_id.as_str(), "vid00000002");

    // Excluding every source falls back to ignoring the exclusion
    let opts = LookupOptions {
        exclude_videos: [VideoId::new("vid00000001"), VideoId::new("vid00000002")]
            .into_iter()
            .collect(),
        ..Default::default()
    };
    let clip = catalog.lookup_word("hello", &opts).await.unwrap().unwrap();
    assert_eq!(clip.video_id.as_str(), "vid00000001");
}

#[tokio::test]
async fn lookup_word_respects_preferred_channels() {
    let catalog = seeded_catalog().await;
    let opts = LookupOptions {
        preferred_channels: vec!["chan-b".to_string()],
        ..Default::default()
    };
    let clip = catalog.lookup_word("hello", &opts).await.unwrap().unwrap();
    assert_eq!(clip.video_id.as_str(), "vid00000002");
}

#[tokio::test]
async fn lookup_word_miss_is_none_not_error() {
    let catalog = seeded_catalog().await;
    let clip = catalog
        .lookup_word("zyzzyva", &LookupOptions::default())
        .await
        .unwrap();
    assert!(clip.is_none());
}

#[tokio::test]
async fn every_ngram_of_the_transcript_is_found() {
    let catalog = seeded_catalog().await;
    let words = ["hello", "world", "how", "are", "you"];

    for len in 2..=5usize {
        for i in 0..=(words.len() - len) {
            let phrase = words[i..i + len].join(" ");
            let hit = catalog
                .lookup_phrase(&phrase, &LookupOptions::default())
                .await
                .unwrap()
                .unwrap_or_else(|| panic!("phrase '{phrase}' not found"));
            assert_eq!(hit.video_id.as_str(), "vid00000001");
            assert_eq!(hit.text, normalize(&phrase));
        }
    }
}

#[tokio::test]
async fn full_sentence_resolves_through_transcript_scan() {
    // 5 words; the full sentence itself is indexed, but a 5+ word lookup
    // exercises the scan path once the index range is exceeded. Use the
    // whole transcript so the scan has to match every word.
    let catalog = seeded_catalog().await;
    let hit = catalog
        .lookup_phrase("hello world how are you", &LookupOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert!((hit.start - 0.0).abs() < 1e-9);
    assert!((hit.end - 2.2).abs() < 1e-9);
}

#[tokio::test]
async fn phrase_lookup_normalizes_input() {
    let catalog = seeded_catalog().await;
    let hit = catalog
        .lookup_phrase("  Hello,   WORLD! ", &LookupOptions::default())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(hit.text, "hello world");
    assert!((hit.start - 0.0).abs() < 1e-9);
    assert!((hit.end - 1.1).abs() < 1e-9);
}

#[tokio::test]
async fn phrase_lookup_miss_is_none() {
    let catalog = seeded_catalog().await;
    let hit = catalog
        .lookup_phrase("goodbye cruel world", &LookupOptions::default())
        .await
        .unwrap();
    assert!(hit.is_none());
}

#[tokio::test]
async fn transcript_fetch_is_cached() {
    let catalog = seeded_catalog().await;
    let id = VideoId::new("vid00000001");

    let first = catalog.transcript(&id).await.unwrap().unwrap();
    let second = catalog.transcript(&id).await.unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(&first, &second));
    assert_eq!(first.word_count(), 5);
}

#[tokio::test]
async fn stats_reports_counts_and_capabilities() {
    let catalog = seeded_catalog().await;
    let stats = catalog.stats().await.unwrap();
    assert_eq!(stats.words, 6); // 5 transcript words + extra "hello"
    assert_eq!(stats.videos, 2);
    assert!(stats.has_transcripts);
    assert!(stats.has_phrase_index);
}
