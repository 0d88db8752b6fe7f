//! In-process transcript cache.
//!
//! Transcript scans during phrase fallback re-read the same videos over
//! and over; parsed transcripts are kept behind a single mutex with LRU
//! eviction. This is the only mutable shared state on the request path.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use stitch_models::{Transcript, VideoId};

/// Default number of parsed transcripts kept in memory.
pub const DEFAULT_CAPACITY: usize = 256;

/// Bounded LRU cache of parsed transcripts, safe to share across jobs.
#[derive(Debug)]
pub struct TranscriptCache {
    inner: Mutex<Inner>,
    capacity: usize,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<VideoId, Arc<Transcript>>,
    // Recency order, least recent at the front.
    order: VecDeque<VideoId>,
}

impl TranscriptCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn get(&self, video_id: &VideoId) -> Option<Arc<Transcript>> {
        let mut inner = self.inner.lock().expect("transcript cache poisoned");
        let hit = inner.entries.get(video_id).cloned();
        if hit.is_some() {
            touch(&mut inner.order, video_id);
        }
        hit
    }

    pub fn insert(&self, transcript: Arc<Transcript>) {
        let mut inner = self.inner.lock().expect("transcript cache poisoned");
        let id = transcript.video_id.clone();

        if inner.entries.insert(id.clone(), transcript).is_some() {
            touch(&mut inner.order, &id);
        } else {
            inner.order.push_back(id);
        }

        while inner.entries.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("transcript cache poisoned").entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TranscriptCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

fn touch(order: &mut VecDeque<VideoId>, video_id: &VideoId) {
    if let Some(pos) = order.iter().position(|id| id == video_id) {
        order.remove(pos);
    }
    order.push_back(video_id.clone());
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transcript(id: &str) -> Arc<Transcript> {
        Arc::new(Transcript {
            video_id: VideoId::new(id),
            words: Vec::new(),
        })
    }

    #[test]
    fn test_insert_and_get() {
        let cache = TranscriptCache::new(4);
        cache.insert(transcript("v1"));
        assert!(cache.get(&VideoId::new("v1")).is_some());
        assert!(cache.get(&VideoId::new("v2")).is_none());
    }

    #[test]
    fn test_evicts_least_recently_used() {
        let cache = TranscriptCache::new(2);
        cache.insert(transcript("v1"));
        cache.insert(transcript("v2"));

        // Touch v1 so v2 becomes the eviction candidate
        cache.get(&VideoId::new("v1"));
        cache.insert(transcript("v3"));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&VideoId::new("v1")).is_some());
        assert!(cache.get(&VideoId::new("v2")).is_none());
        assert!(cache.get(&VideoId::new("v3")).is_some());
    }

    #[test]
    fn test_reinsert_does_not_grow() {
        let cache = TranscriptCache::new(2);
        cache.insert(transcript("v1"));
        cache.insert(transcript("v1"));
        assert_eq!(cache.len(), 1);
    }
}
