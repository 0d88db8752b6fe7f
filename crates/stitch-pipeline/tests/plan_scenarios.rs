//! Planning scenarios against a seeded SQLite catalog.

use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

use stitch_catalog::{schema, ClipCatalog};
use stitch_models::{phrase_hash, tokenize, SegmentPick};
use stitch_pipeline::plan;

async fn catalog_with(videos: &[(&str, &[(&str, f64, f64)])]) -> ClipCatalog {
    let pool: SqlitePool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    schema::apply(&pool).await.unwrap();

    for (video_id, words) in videos {
        sqlx::query("INSERT INTO videos (video_id) VALUES (?1)")
            .bind(video_id)
            .execute(&pool)
            .await
            .unwrap();

        for (word, start, end) in *words {
            sqlx::query(
                "INSERT INTO word_clips (word, video_id, start_time, duration) \
                 VALUES (?1, ?2, ?3, ?4)",
            )
            .bind(word)
            .bind(video_id)
            .bind(start)
            .bind(end - start)
            .execute(&pool)
            .await
            .unwrap();
        }

        let triples: Vec<serde_json::Value> = words
            .iter()
            .map(|(w, s, e)| serde_json::json!([w, s, e]))
            .collect();
        sqlx::query(
            "INSERT INTO video_transcripts (video_id, transcript_json, word_count, duration) \
             VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(video_id)
        .bind(serde_json::Value::Array(triples).to_string())
        .bind(words.len() as i64)
        .bind(words.last().map(|(_, _, e)| *e).unwrap_or(0.0))
        .execute(&pool)
        .await
        .unwrap();

        for len in 2..=5usize.min(words.len()) {
            for i in 0..=(words.len() - len) {
                let text = words[i..i + len]
                    .iter()
                    .map(|(w, _, _)| *w)
                    .collect::<Vec<_>>()
                    .join(" ");
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
                .execute(&pool)
                .await
                .unwrap();
            }
        }
    }

    ClipCatalog::from_pool(pool).await.unwrap()
}

const V1_WORDS: &[(&str, f64, f64)] = &[
    ("hello", 0.0, 0.5),
    ("world", 0.5, 1.1),
    ("how", 1.1, 1.5),
    ("are", 1.5, 1.8),
    ("you", 1.8, 2.2),
];

#[tokio::test]
async fn full_sentence_is_one_pick() {
    let catalog = catalog_with(&[("vidA0000001", V1_WORDS)]).await;
    let tokens = tokenize("hello world how are you");

    let plan = plan(&catalog, &tokens, 5, &[]).await.unwrap();

    assert_eq!(plan.picks.len(), 1);
    assert!(plan.missing.is_empty());
    match &plan.picks[0] {
        SegmentPick::Clip {
            video_id,
            start,
            end,
            word_span,
            ..
        } => {
            assert_eq!(video_id.as_str(), "vidA0000001");
            assert!((start - 0.0).abs() < 1e-9);
            assert!((end - 2.2).abs() < 1e-9);
            assert_eq!((word_span.start, word_span.end), (0, 5));
        }
        other => panic!("expected clip pick, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_tail_becomes_placeholder() {
    let catalog = catalog_with(&[("vidA0000001", V1_WORDS)]).await;
    let tokens = tokenize("hello world goodbye");

    let plan = plan(&catalog, &tokens, 5, &[]).await.unwrap();

    assert_eq!(plan.picks.len(), 2);
    assert_eq!(plan.missing, vec!["goodbye"]);

    match &plan.picks[0] {
        SegmentPick::Clip { start, end, .. } => {
            assert!((start - 0.0).abs() < 1e-9);
            assert!((end - 1.1).abs() < 1e-9);
        }
        other => panic!("expected clip pick, got {other:?}"),
    }
    assert!(plan.picks[1].is_placeholder());
}

#[tokio::test]
async fn greedy_backoff_spans_two_videos() {
    let v1: &[(&str, f64, f64)] = &[
        ("the", 0.0, 0.3),
        ("quick", 0.3, 0.7),
        ("brown", 0.7, 1.2),
    ];
    let v2: &[(&str, f64, f64)] = &[
        ("brown", 3.0, 3.4),
        ("fox", 3.4, 3.9),
        ("jumps", 3.9, 4.4),
    ];
    let catalog = catalog_with(&[("vidA0000001", v1), ("vidB0000002", v2)]).await;
    let tokens = tokenize("the quick brown fox jumps");

    let plan = plan(&catalog, &tokens, 5, &[]).await.unwrap();

    assert_eq!(plan.picks.len(), 2, "picks: {:?}", plan.picks);
    assert!(plan.missing.is_empty());

    let videos: Vec<&str> = plan
        .picks
        .iter()
        .map(|p| match p {
            SegmentPick::Clip { video_id, .. } => video_id.as_str(),
            other => panic!("unexpected placeholder {other:?}"),
        })
        .collect();
    assert_eq!(videos, vec!["vidA0000001", "vidB0000002"]);

    let spans: Vec<(usize, usize)> = plan
        .picks
        .iter()
        .map(|p| (p.word_span().start, p.word_span().end))
        .collect();
    assert_eq!(spans, vec![(0, 3), (3, 5)]);
}

#[tokio::test]
async fn word_only_planning_with_exclusion_waiver() {
    let catalog = catalog_with(&[("vidA0000001", V1_WORDS)]).await;
    let tokens = tokenize("hello world");

    let plan = plan(&catalog, &tokens, 1, &[]).await.unwrap();

    assert_eq!(plan.picks.len(), 2);
    let mut expected_duration = 0.0;
    for pick in &plan.picks {
        match pick {
            SegmentPick::Clip {
                video_id,
                start,
                end,
                ..
            } => {
                // Both land on V1: the second lookup's exclusion is waived
                assert_eq!(video_id.as_str(), "vidA0000001");
                expected_duration += end - start;
            }
            other => panic!("expected clip pick, got {other:?}"),
        }
    }
    assert!((expected_duration - (0.5 + 0.6)).abs() < 1e-9);
}
