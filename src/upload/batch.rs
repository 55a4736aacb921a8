//! Album buffering across one run.
//!
//! Videos and documents that share an album key accumulate here after their
//! individual delivery; groups flush on boundary changes, on reaching the
//! transport's batch ceiling, and at end of run.

use super::classify::MediaKind;
use crate::config::ALBUM_LIMIT;
use crate::transport::MessageRef;
use std::collections::BTreeMap;

/// One buffered delivery awaiting a possible album flush.
#[derive(Debug, Clone)]
pub struct AlbumEntry {
    /// The already-delivered message
    pub message: MessageRef,
    /// Display name it was delivered under
    pub name: String,
}

/// A group ready to be re-delivered as one album.
#[derive(Debug, Clone)]
pub struct ReadyGroup {
    /// Media kind shared by every member
    pub kind: MediaKind,
    /// Album key shared by every member
    pub key: String,
    /// Members in original discovery order
    pub entries: Vec<AlbumEntry>,
}

/// Buffers already-delivered messages per `(kind, key)` slot.
///
/// Albums never mix media kinds; audio and photos never enter. A slot left
/// with a single entry is never flushed: its file was already delivered
/// individually and there is nothing to batch.
#[derive(Debug, Default)]
pub struct AlbumBatcher {
    buffers: BTreeMap<(MediaKind, String), Vec<AlbumEntry>>,
}

impl AlbumBatcher {
    /// Create an empty batcher for one run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Boundary check before sending a file: when the upcoming key matches no
    /// open buffer, every buffer holding at least two entries is taken out
    /// and returned for flushing.
    pub fn note_boundary(&mut self, upcoming_key: &str) -> Vec<ReadyGroup> {
        let key_open = self.buffers.keys().any(|(_, key)| key == upcoming_key);
        if key_open {
            return Vec::new();
        }
        self.take_flushable()
    }

    /// Record a delivered message under its `(kind, key)` slot.
    ///
    /// Returns the group when it just reached the album ceiling; the caller
    /// must flush it immediately.
    pub fn record(&mut self, kind: MediaKind, key: String, entry: AlbumEntry) -> Option<ReadyGroup> {
        if !kind.batches_into_albums() {
            return None;
        }
        let slot = (kind, key);
        let buffer = self.buffers.entry(slot.clone()).or_default();
        buffer.push(entry);
        if buffer.len() >= ALBUM_LIMIT {
            let entries = self.buffers.remove(&slot).unwrap_or_default();
            let (kind, key) = slot;
            return Some(ReadyGroup { kind, key, entries });
        }
        None
    }

    /// End-of-run drain: every buffer with at least two entries.
    pub fn drain(&mut self) -> Vec<ReadyGroup> {
        self.take_flushable()
    }

    fn take_flushable(&mut self) -> Vec<ReadyGroup> {
        let ready_slots: Vec<(MediaKind, String)> = self
            .buffers
            .iter()
            .filter(|(_, entries)| entries.len() >= 2)
            .map(|(slot, _)| slot.clone())
            .collect();
        ready_slots
            .into_iter()
            .filter_map(|slot| {
                self.buffers.remove(&slot).map(|entries| {
                    let (kind, key) = slot;
                    ReadyGroup { kind, key, entries }
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: i32) -> AlbumEntry {
        AlbumEntry {
            message: MessageRef {
                chat_id: 10,
                message_id: n,
                kind: MediaKind::Video,
                file_id: format!("file-{n}"),
            },
            name: format!("movie.part{n:02}.mkv"),
        }
    }

    #[test]
    fn test_flush_at_album_limit() {
        let mut batcher = AlbumBatcher::new();
        for n in 1..10 {
            assert!(batcher
                .record(MediaKind::Video, "movie".to_string(), entry(n))
                .is_none());
        }
        let group = batcher
            .record(MediaKind::Video, "movie".to_string(), entry(10))
            .expect("tenth entry flushes");
        assert_eq!(group.entries.len(), 10);
        // Order preserved.
        let ids: Vec<i32> = group.entries.iter().map(|e| e.message.message_id).collect();
        assert_eq!(ids, (1..=10).collect::<Vec<_>>());
        // Slot was removed; the next part starts a fresh buffer.
        assert!(batcher
            .record(MediaKind::Video, "movie".to_string(), entry(11))
            .is_none());
    }

    #[test]
    fn test_boundary_flushes_open_groups() {
        let mut batcher = AlbumBatcher::new();
        batcher.record(MediaKind::Video, "movie".to_string(), entry(1));
        batcher.record(MediaKind::Video, "movie".to_string(), entry(2));

        // Same key still open: no flush.
        assert!(batcher.note_boundary("movie").is_empty());

        // Unrelated key closes the album.
        let flushed = batcher.note_boundary("other");
        assert_eq!(flushed.len(), 1);
        assert_eq!(flushed[0].entries.len(), 2);
    }

    #[test]
    fn test_singletons_never_flush() {
        let mut batcher = AlbumBatcher::new();
        batcher.record(MediaKind::Document, "lone".to_string(), entry(1));
        assert!(batcher.note_boundary("other").is_empty());
        assert!(batcher.drain().is_empty());
    }

    #[test]
    fn test_audio_and_photo_never_enter() {
        let mut batcher = AlbumBatcher::new();
        assert!(batcher
            .record(MediaKind::Audio, "a".to_string(), entry(1))
            .is_none());
        assert!(batcher
            .record(MediaKind::Photo, "a".to_string(), entry(2))
            .is_none());
        assert!(batcher.drain().is_empty());
    }

    #[test]
    fn test_kinds_do_not_mix() {
        let mut batcher = AlbumBatcher::new();
        batcher.record(MediaKind::Video, "same".to_string(), entry(1));
        batcher.record(MediaKind::Document, "same".to_string(), entry(2));
        let mut drained = batcher.drain();
        // Two singleton slots, nothing flushable.
        assert!(drained.is_empty());

        batcher.record(MediaKind::Video, "same".to_string(), entry(3));
        batcher.record(MediaKind::Video, "same".to_string(), entry(4));
        batcher.record(MediaKind::Document, "same".to_string(), entry(5));
        drained = batcher.drain();
        // Singletons from before joined their slots; both kinds flush, apart.
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].kind, MediaKind::Video);
        assert_eq!(drained[0].entries.len(), 3);
        assert_eq!(drained[1].kind, MediaKind::Document);
        assert_eq!(drained[1].entries.len(), 2);
    }

    #[test]
    fn test_drain_returns_groups_deterministically() {
        let mut batcher = AlbumBatcher::new();
        for key in ["zeta", "alpha"] {
            batcher.record(MediaKind::Video, key.to_string(), entry(1));
            batcher.record(MediaKind::Video, key.to_string(), entry(2));
        }
        let drained = batcher.drain();
        let keys: Vec<&str> = drained.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["alpha", "zeta"]);
    }
}
