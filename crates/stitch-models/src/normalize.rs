//! Text normalization and phrase hashing.
//!
//! The same transform is applied everywhere a word or phrase is hashed or
//! compared: at index build time, at lookup time, and when the planner
//! tokenizes input text. Ingester and lookup must agree, so keep this the
//! single source of truth.

use md5::{Digest, Md5};

/// Normalize a word or phrase for matching.
///
/// Lowercases, strips punctuation except intra-word apostrophes, collapses
/// runs of whitespace to single spaces and trims. Idempotent:
/// `normalize(normalize(x)) == normalize(x)`.
///
/// # Examples
/// ```
/// use stitch_models::normalize;
/// assert_eq!(normalize("  Hello,   WORLD! "), "hello world");
/// assert_eq!(normalize("don't stop"), "don't stop");
/// ```
pub fn normalize(text: &str) -> String {
    let lowered = text.to_lowercase();
    let chars: Vec<char> = lowered.chars().collect();

    let mut cleaned = String::with_capacity(lowered.len());
    for (i, &c) in chars.iter().enumerate() {
        if c.is_alphanumeric() {
            cleaned.push(c);
        } else if c == '\'' || c == '\u{2019}' {
            // Keep apostrophes only between word characters
            let prev_word = i > 0 && chars[i - 1].is_alphanumeric();
            let next_word = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
            if prev_word && next_word {
                cleaned.push('\'');
            } else {
                cleaned.push(' ');
            }
        } else {
            cleaned.push(' ');
        }
    }

    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Split input text into normalized tokens, preserving order.
pub fn tokenize(text: &str) -> Vec<String> {
    normalize(text)
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Hex MD5 of the normalized phrase, as stored in the phrase index.
pub fn phrase_hash(phrase: &str) -> String {
    let normalized = normalize(phrase);
    format!("{:x}", Md5::digest(normalized.as_bytes()))
}
