//! Testing helpers: scripted fakes for the transport and probe services.
//!
//! The fakes record everything they are asked to do and can be scripted to
//! fail in sequence, which is how the retry-policy tests drive rate limits
//! and transient errors without a network.

use crate::probe::{MediaFlags, MediaInfo, MediaInspector, ThumbnailService};
use crate::transport::{AlbumPart, MediaPayload, MessageRef, Transport, TransportError};
use crate::upload::MediaKind;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Mutex;

/// One recorded single send.
#[derive(Debug, Clone)]
pub struct SentMedia {
    /// Destination chat
    pub chat_id: i64,
    /// Delivered kind
    pub kind: MediaKind,
    /// Display name of the upload
    pub file_name: String,
    /// Caption attached to the send
    pub caption: String,
}

/// One recorded album send.
#[derive(Debug, Clone)]
pub struct SentAlbum {
    /// Destination chat
    pub chat_id: i64,
    /// Kinds of the parts, in order
    pub kinds: Vec<MediaKind>,
    /// Captions of the parts, in order (first is usually the only `Some`)
    pub captions: Vec<Option<String>>,
    /// Number of parts
    pub len: usize,
}

/// In-memory transport with scripted outcomes.
///
/// Each send (single or album) pops the next scripted outcome; an empty
/// script means success. Copies and deletes always succeed and are recorded.
#[derive(Debug, Default)]
pub struct FakeTransport {
    script: Mutex<VecDeque<Result<(), TransportError>>>,
    next_message_id: AtomicI32,
    /// Every send attempt's payload kind, failures included
    pub attempts: Mutex<Vec<MediaKind>>,
    /// Every successful single send
    pub sent: Mutex<Vec<SentMedia>>,
    /// Every successful album send
    pub albums: Mutex<Vec<SentAlbum>>,
    /// Every copy, as (source message id, destination chat)
    pub copies: Mutex<Vec<(i32, i64)>>,
    /// Every deleted message id
    pub deleted: Mutex<Vec<i32>>,
}

impl FakeTransport {
    /// A transport that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the outcomes for upcoming sends, in order.
    pub fn script_outcomes(&self, outcomes: Vec<Result<(), TransportError>>) {
        let mut script = self.script.lock().expect("script lock");
        script.extend(outcomes);
    }

    fn next_outcome(&self) -> Result<(), TransportError> {
        let mut script = self.script.lock().expect("script lock");
        script.pop_front().unwrap_or(Ok(()))
    }

    fn next_ref(&self, chat_id: i64, kind: MediaKind) -> MessageRef {
        let id = self.next_message_id.fetch_add(1, Ordering::SeqCst) + 1;
        MessageRef {
            chat_id,
            message_id: id,
            kind,
            file_id: format!("file-{id}"),
        }
    }

    /// Number of successful single sends recorded so far.
    #[must_use]
    pub fn single_sends(&self) -> usize {
        self.sent.lock().expect("sent lock").len()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send_media(
        &self,
        chat_id: i64,
        payload: &MediaPayload,
    ) -> Result<MessageRef, TransportError> {
        self.attempts
            .lock()
            .expect("attempts lock")
            .push(payload.kind());
        self.next_outcome()?;
        let caption = match payload {
            MediaPayload::Document { caption, .. }
            | MediaPayload::Video { caption, .. }
            | MediaPayload::Audio { caption, .. }
            | MediaPayload::Photo { caption, .. } => caption.clone(),
        };
        self.sent.lock().expect("sent lock").push(SentMedia {
            chat_id,
            kind: payload.kind(),
            file_name: payload.file_name().to_string(),
            caption,
        });
        Ok(self.next_ref(chat_id, payload.kind()))
    }

    async fn send_album(
        &self,
        chat_id: i64,
        parts: &[AlbumPart],
    ) -> Result<Vec<MessageRef>, TransportError> {
        self.next_outcome()?;
        self.albums.lock().expect("albums lock").push(SentAlbum {
            chat_id,
            kinds: parts.iter().map(|p| p.kind).collect(),
            captions: parts.iter().map(|p| p.caption.clone()).collect(),
            len: parts.len(),
        });
        Ok(parts
            .iter()
            .map(|part| self.next_ref(chat_id, part.kind))
            .collect())
    }

    async fn copy_message(
        &self,
        message: &MessageRef,
        to_chat: i64,
    ) -> Result<MessageRef, TransportError> {
        self.copies
            .lock()
            .expect("copies lock")
            .push((message.message_id, to_chat));
        Ok(self.next_ref(to_chat, message.kind))
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.deleted
            .lock()
            .expect("deleted lock")
            .push(message.message_id);
        Ok(())
    }
}

/// Inspector returning fixed flags based on extension tables, with a fixed
/// duration and no technical link.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticInspector {
    /// Duration reported for every probe
    pub duration_secs: u32,
}

#[async_trait]
impl MediaInspector for StaticInspector {
    async fn classify(&self, path: &Path) -> MediaFlags {
        crate::probe::ExtensionInspector.classify(path).await
    }

    async fn media_info(&self, _path: &Path) -> MediaInfo {
        MediaInfo {
            duration_secs: self.duration_secs,
            artist: None,
            title: None,
        }
    }

    async fn technical_link(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Thumbnail service that never produces anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoThumbnails;

#[async_trait]
impl ThumbnailService for NoThumbnails {
    async fn generate(&self, _path: &Path, _duration_secs: u32) -> Option<PathBuf> {
        None
    }
}
