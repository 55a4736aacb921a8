//! Transport abstraction for chat delivery.
//!
//! The pipeline talks to the chat platform through the [`Transport`] trait:
//! one send per prepared payload, albums as a single batched call, plus copy
//! and delete primitives for fan-out and album supersession. The Telegram
//! implementation lives in [`telegram`].

/// teloxide-backed transport
pub mod telegram;

use crate::upload::classify::MediaKind;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors raised by transport primitives.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport asked for a cool-down before the next attempt.
    #[error("rate limited by transport, retry after {0:?}")]
    RateLimited(Duration),
    /// The transport refused the declared payload shape.
    #[error("format rejected: {0}")]
    FormatRejected(String),
    /// Transient failure; retrying may succeed.
    #[error("transient transport error: {0}")]
    Transient(String),
    /// Permanent failure; retrying the same request cannot succeed.
    #[error("permanent transport error: {0}")]
    Permanent(String),
}

/// Reference to one delivered message.
///
/// Carries the chat and message identifiers, the delivered media kind, and
/// the transport-side file id so albums can be re-assembled later without
/// re-fetching the full message object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageRef {
    /// Chat the message was delivered to
    pub chat_id: i64,
    /// Message identifier within that chat
    pub message_id: i32,
    /// Media kind the message was delivered as
    pub kind: MediaKind,
    /// Transport-side file identifier of the attached media
    pub file_id: String,
}

/// One prepared outbound payload, shaped by media kind.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    /// Generic document upload
    Document {
        /// Source file on disk
        file: PathBuf,
        /// Display name attached to the upload
        file_name: String,
        /// Optional thumbnail
        thumbnail: Option<PathBuf>,
        /// HTML caption
        caption: String,
    },
    /// Streamable video upload
    Video {
        /// Source file on disk
        file: PathBuf,
        /// Display name attached to the upload
        file_name: String,
        /// Optional thumbnail
        thumbnail: Option<PathBuf>,
        /// Stream duration in seconds
        duration_secs: u32,
        /// HTML caption
        caption: String,
    },
    /// Audio upload with tags
    Audio {
        /// Source file on disk
        file: PathBuf,
        /// Display name attached to the upload
        file_name: String,
        /// Optional thumbnail
        thumbnail: Option<PathBuf>,
        /// Stream duration in seconds
        duration_secs: u32,
        /// Performer tag
        performer: Option<String>,
        /// Title tag
        title: Option<String>,
        /// HTML caption
        caption: String,
    },
    /// Photo upload
    Photo {
        /// Source file on disk
        file: PathBuf,
        /// Display name attached to the upload
        file_name: String,
        /// HTML caption
        caption: String,
    },
}

impl MediaPayload {
    /// The media kind this payload delivers as.
    #[must_use]
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Document { .. } => MediaKind::Document,
            Self::Video { .. } => MediaKind::Video,
            Self::Audio { .. } => MediaKind::Audio,
            Self::Photo { .. } => MediaKind::Photo,
        }
    }

    /// Whether this payload is already document-shaped.
    #[must_use]
    pub fn is_document(&self) -> bool {
        matches!(self, Self::Document { .. })
    }

    /// The display name attached to the upload.
    #[must_use]
    pub fn file_name(&self) -> &str {
        match self {
            Self::Document { file_name, .. }
            | Self::Video { file_name, .. }
            | Self::Audio { file_name, .. }
            | Self::Photo { file_name, .. } => file_name,
        }
    }

    /// Re-shape the payload as a document, keeping file, name, caption, and
    /// any thumbnail. Used by the format-rejection and exhausted-retry
    /// fallbacks.
    #[must_use]
    pub fn into_document(self) -> Self {
        match self {
            doc @ Self::Document { .. } => doc,
            Self::Video {
                file,
                file_name,
                thumbnail,
                caption,
                ..
            }
            | Self::Audio {
                file,
                file_name,
                thumbnail,
                caption,
                ..
            } => Self::Document {
                file,
                file_name,
                thumbnail,
                caption,
            },
            Self::Photo {
                file,
                file_name,
                caption,
            } => Self::Document {
                file,
                file_name,
                thumbnail: None,
                caption,
            },
        }
    }
}

/// Media source for one album slot: a fresh path upload or a cached file id.
#[derive(Debug, Clone)]
pub enum AlbumMedia {
    /// Upload from disk (screenshot albums)
    Path(PathBuf),
    /// Re-attach an already-uploaded file by id (re-batched deliveries)
    FileId(String),
}

/// One slot of a batched album send.
#[derive(Debug, Clone)]
pub struct AlbumPart {
    /// What to attach
    pub media: AlbumMedia,
    /// Media kind of the slot
    pub kind: MediaKind,
    /// Caption; set on the first slot only
    pub caption: Option<String>,
}

/// Chat transport primitives.
///
/// Every method can raise the full [`TransportError`] taxonomy; the executor
/// owns the retry policy, implementations only map errors.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver one media payload to a chat.
    async fn send_media(
        &self,
        chat_id: i64,
        payload: &MediaPayload,
    ) -> Result<MessageRef, TransportError>;

    /// Deliver up to ten parts as one visually grouped album.
    async fn send_album(
        &self,
        chat_id: i64,
        parts: &[AlbumPart],
    ) -> Result<Vec<MessageRef>, TransportError>;

    /// Copy a delivered message to another chat (copy semantics, the source
    /// message is untouched).
    async fn copy_message(
        &self,
        message: &MessageRef,
        to_chat: i64,
    ) -> Result<MessageRef, TransportError>;

    /// Delete a delivered message, e.g. after an album superseded it.
    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_document_keeps_thumbnail_and_caption() {
        let video = MediaPayload::Video {
            file: PathBuf::from("/tmp/a.mkv"),
            file_name: "a.mkv".to_string(),
            thumbnail: Some(PathBuf::from("/tmp/t.jpg")),
            duration_secs: 60,
            caption: "<code>a.mkv</code>".to_string(),
        };
        let doc = video.into_document();
        assert!(doc.is_document());
        match doc {
            MediaPayload::Document {
                thumbnail, caption, ..
            } => {
                assert_eq!(thumbnail, Some(PathBuf::from("/tmp/t.jpg")));
                assert_eq!(caption, "<code>a.mkv</code>");
            }
            _ => panic!("expected document"),
        }
    }

    #[test]
    fn test_photo_into_document_drops_no_thumbnail() {
        let photo = MediaPayload::Photo {
            file: PathBuf::from("/tmp/p.png"),
            file_name: "p.png".to_string(),
            caption: String::new(),
        };
        assert_eq!(photo.into_document().kind(), MediaKind::Document);
    }
}
