//! Send execution: preconditions, payload shaping, and the retry policy.
//!
//! One executor handles both single sends and album batches. Rate-limit
//! signals sleep and retry without touching the bounded-retry budget; format
//! rejections and exhausted retries fall back to document shape once; every
//! other failure backs off exponentially up to the attempt ceiling.

use super::classify::MediaKind;
use super::{fanout, DeliveryItem, ReadyGroup};
use crate::config::{
    Settings, UserPrefs, BOT_CEILING_BYTES, FLOOD_WAIT_MULTIPLIER, HYBRID_THRESHOLD_BYTES,
    PREMIUM_CEILING_BYTES, SUPPORTED_PHOTO_EXTS, UPLOAD_INITIAL_BACKOFF_MS, UPLOAD_MAX_ATTEMPTS,
    UPLOAD_MAX_BACKOFF_MS,
};
use crate::probe::{MediaInspector, ThumbnailService};
use crate::transport::{AlbumMedia, AlbumPart, MediaPayload, MessageRef, Transport, TransportError};
use crate::utils::format_size;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Terminal failure for one delivery; recorded on the report, never fatal to
/// the run.
#[derive(Debug, Error)]
pub enum TransferError {
    /// The source file vanished before the send.
    #[error("file vanished before upload: {}", .0.display())]
    Missing(PathBuf),
    /// The file exceeds the account-tier payload ceiling.
    #[error("file size {} exceeds the transport ceiling of {}", format_size(*.size), format_size(*.ceiling))]
    Oversized {
        /// File size in bytes
        size: u64,
        /// Ceiling in effect for the selected channel
        ceiling: u64,
    },
    /// The transport gave up after the retry policy was exhausted.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Executes sends for one run, holding the transport channels and probes.
pub struct TransferExecutor<'a> {
    transport: &'a dyn Transport,
    premium: Option<&'a dyn Transport>,
    inspector: &'a dyn MediaInspector,
    thumbnails: &'a dyn ThumbnailService,
    settings: &'a Settings,
    prefs: &'a UserPrefs,
}

impl<'a> TransferExecutor<'a> {
    /// Build an executor over the run's services and configuration.
    pub fn new(
        transport: &'a dyn Transport,
        premium: Option<&'a dyn Transport>,
        inspector: &'a dyn MediaInspector,
        thumbnails: &'a dyn ThumbnailService,
        settings: &'a Settings,
        prefs: &'a UserPrefs,
    ) -> Self {
        Self {
            transport,
            premium,
            inspector,
            thumbnails,
            settings,
            prefs,
        }
    }

    /// The chat the primary send goes to.
    #[must_use]
    pub fn origin_chat(&self) -> i64 {
        self.prefs.override_destination.unwrap_or(self.prefs.user_chat)
    }

    /// Per-file channel pick: large files ride the elevated-tier channel when
    /// hybrid mode is on and the channel exists. A pure decision, no locking.
    fn channel_for(&self, size: u64) -> (&'a dyn Transport, u64) {
        if self.settings.hybrid_upload && size > HYBRID_THRESHOLD_BYTES {
            if let Some(premium) = self.premium {
                return (premium, PREMIUM_CEILING_BYTES);
            }
        }
        (self.transport, BOT_CEILING_BYTES)
    }

    /// Deliver one prepared item and fan the result out.
    ///
    /// # Errors
    ///
    /// Returns a [`TransferError`] when the file is gone, oversized, or the
    /// retry policy is exhausted; the caller records it and moves on.
    pub async fn deliver(&self, item: &DeliveryItem) -> Result<MessageRef, TransferError> {
        if tokio::fs::metadata(&item.path).await.is_err() {
            return Err(TransferError::Missing(item.path.clone()));
        }
        let (channel, ceiling) = self.channel_for(item.size);
        if item.size > ceiling {
            return Err(TransferError::Oversized {
                size: item.size,
                ceiling,
            });
        }

        // The file must still exist up to the last moment it is read, so the
        // metadata link is probed immediately before the send.
        let caption = match self.inspector.technical_link(&item.path).await {
            Some(link) => format!("{}\n\n<a href=\"{link}\">MediaInfo</a>", item.caption),
            None => item.caption.clone(),
        };

        let (payload, generated_thumb) = self.build_payload(item, caption).await;
        let origin = self.origin_chat();
        let result = self.send_with_policy(channel, origin, payload).await;

        match result {
            Ok(message) => {
                let destinations = fanout::destinations(self.settings, self.prefs, origin);
                fanout::replicate(self.transport, &message, &destinations).await;
                release_generated_thumbnail(generated_thumb).await;
                Ok(message)
            }
            Err(err) => {
                release_generated_thumbnail(generated_thumb).await;
                Err(TransferError::Transport(err))
            }
        }
    }

    /// Re-deliver a buffered group as one album, fan it out, and delete the
    /// superseded per-item messages.
    ///
    /// # Errors
    ///
    /// Returns the transport error after the retry policy is exhausted; the
    /// members stay delivered individually in that case.
    pub async fn deliver_album(
        &self,
        group: &ReadyGroup,
        caption: String,
    ) -> Result<Vec<MessageRef>, TransferError> {
        let parts: Vec<AlbumPart> = group
            .entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| AlbumPart {
                media: AlbumMedia::FileId(entry.message.file_id.clone()),
                kind: group.kind,
                caption: (idx == 0).then(|| caption.clone()),
            })
            .collect();

        let origin = self.origin_chat();
        let delivered = self
            .send_album_with_policy(self.transport, origin, &parts)
            .await?;

        let destinations = fanout::destinations(self.settings, self.prefs, origin);
        fanout::replicate_album(self.transport, &parts, &destinations).await;

        // The album supersedes the individual deliveries that fed it.
        for entry in &group.entries {
            if let Err(err) = self.transport.delete_message(&entry.message).await {
                warn!(
                    message_id = entry.message.message_id,
                    error = %err,
                    "failed to delete message superseded by album"
                );
            }
        }
        Ok(delivered)
    }

    /// Send one batch of fresh photo uploads as an album (screenshot
    /// directories), with fan-out.
    ///
    /// # Errors
    ///
    /// Returns the transport error after the retry policy is exhausted.
    pub async fn deliver_photo_album(
        &self,
        photos: &[PathBuf],
        caption: Option<String>,
    ) -> Result<Vec<MessageRef>, TransferError> {
        let parts: Vec<AlbumPart> = photos
            .iter()
            .enumerate()
            .map(|(idx, path)| AlbumPart {
                media: AlbumMedia::Path(path.clone()),
                kind: MediaKind::Photo,
                caption: if idx == 0 { caption.clone() } else { None },
            })
            .collect();
        let origin = self.origin_chat();
        let delivered = self
            .send_album_with_policy(self.transport, origin, &parts)
            .await?;
        let destinations = fanout::destinations(self.settings, self.prefs, origin);
        fanout::replicate_album(self.transport, &parts, &destinations).await;
        Ok(delivered)
    }

    async fn build_payload(
        &self,
        item: &DeliveryItem,
        caption: String,
    ) -> (MediaPayload, Option<PathBuf>) {
        let user_thumb = validated_thumbnail(self.prefs.thumbnail.as_deref()).await;
        match item.kind {
            MediaKind::Video => {
                let info = self.inspector.media_info(&item.path).await;
                let mut generated = None;
                let thumbnail = match user_thumb {
                    Some(thumb) => Some(thumb),
                    None => {
                        generated = self
                            .thumbnails
                            .generate(&item.path, info.duration_secs)
                            .await;
                        generated.clone()
                    }
                };
                (
                    MediaPayload::Video {
                        file: item.path.clone(),
                        file_name: item.name.clone(),
                        thumbnail,
                        duration_secs: info.duration_secs,
                        caption,
                    },
                    generated,
                )
            }
            MediaKind::Audio => {
                let info = self.inspector.media_info(&item.path).await;
                (
                    MediaPayload::Audio {
                        file: item.path.clone(),
                        file_name: item.name.clone(),
                        thumbnail: user_thumb,
                        duration_secs: info.duration_secs,
                        performer: info.artist,
                        title: info.title,
                        caption,
                    },
                    None,
                )
            }
            MediaKind::Image | MediaKind::Photo => {
                if photo_ext_supported(&item.path) {
                    (
                        MediaPayload::Photo {
                            file: item.path.clone(),
                            file_name: item.name.clone(),
                            caption,
                        },
                        None,
                    )
                } else {
                    debug!(file = %item.name, "photo extension unsupported, sending as document");
                    (
                        MediaPayload::Document {
                            file: item.path.clone(),
                            file_name: item.name.clone(),
                            thumbnail: user_thumb,
                            caption,
                        },
                        None,
                    )
                }
            }
            MediaKind::Document => (
                MediaPayload::Document {
                    file: item.path.clone(),
                    file_name: item.name.clone(),
                    thumbnail: user_thumb,
                    caption,
                },
                None,
            ),
        }
    }

    /// Bounded send state machine.
    ///
    /// Rate-limit signals sleep (scaled by the safety multiplier) and retry
    /// without consuming the attempt budget. A non-document payload that gets
    /// a format rejection, or that exhausts its retries, is re-shaped as a
    /// document exactly once for one more attempt.
    async fn send_with_policy(
        &self,
        channel: &dyn Transport,
        chat: i64,
        mut payload: MediaPayload,
    ) -> Result<MessageRef, TransportError> {
        let mut attempt = 0usize;
        let mut backoff = Duration::from_millis(UPLOAD_INITIAL_BACKOFF_MS);
        let max_backoff = Duration::from_millis(UPLOAD_MAX_BACKOFF_MS);
        let mut document_fallback_used = payload.is_document();

        loop {
            match channel.send_media(chat, &payload).await {
                Ok(message) => return Ok(message),
                Err(TransportError::RateLimited(wait)) => {
                    let wait = wait.mul_f64(FLOOD_WAIT_MULTIPLIER);
                    warn!(
                        file = %payload.file_name(),
                        wait_ms = wait.as_millis() as u64,
                        "rate limited, sleeping before retry"
                    );
                    sleep(wait).await;
                }
                Err(TransportError::FormatRejected(reason)) if !document_fallback_used => {
                    warn!(
                        file = %payload.file_name(),
                        %reason,
                        "format rejected, retrying as document"
                    );
                    payload = payload.into_document();
                    document_fallback_used = true;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt < UPLOAD_MAX_ATTEMPTS {
                        warn!(
                            file = %payload.file_name(),
                            error = %err,
                            attempt,
                            backoff_ms = backoff.as_millis() as u64,
                            "send failed, backing off"
                        );
                        sleep(backoff).await;
                        backoff = (backoff * 2).min(max_backoff);
                        continue;
                    }
                    if !document_fallback_used {
                        warn!(
                            file = %payload.file_name(),
                            error = %err,
                            "retries exhausted, one forced attempt as document"
                        );
                        payload = payload.into_document();
                        document_fallback_used = true;
                        attempt = UPLOAD_MAX_ATTEMPTS - 1;
                        continue;
                    }
                    return Err(err);
                }
            }
        }
    }

    async fn send_album_with_policy(
        &self,
        channel: &dyn Transport,
        chat: i64,
        parts: &[AlbumPart],
    ) -> Result<Vec<MessageRef>, TransportError> {
        let mut attempt = 0usize;
        let mut backoff = Duration::from_millis(UPLOAD_INITIAL_BACKOFF_MS);
        let max_backoff = Duration::from_millis(UPLOAD_MAX_BACKOFF_MS);

        loop {
            match channel.send_album(chat, parts).await {
                Ok(messages) => return Ok(messages),
                Err(TransportError::RateLimited(wait)) => {
                    let wait = wait.mul_f64(FLOOD_WAIT_MULTIPLIER);
                    warn!(
                        parts = parts.len(),
                        wait_ms = wait.as_millis() as u64,
                        "rate limited on album send, sleeping"
                    );
                    sleep(wait).await;
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= UPLOAD_MAX_ATTEMPTS {
                        return Err(err);
                    }
                    warn!(
                        parts = parts.len(),
                        error = %err,
                        attempt,
                        "album send failed, backing off"
                    );
                    sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
            }
        }
    }
}

async fn validated_thumbnail(thumb: Option<&Path>) -> Option<PathBuf> {
    match thumb {
        Some(path) if tokio::fs::metadata(path).await.is_ok() => Some(path.to_path_buf()),
        Some(path) => {
            debug!(thumbnail = %path.display(), "configured thumbnail missing, dropping");
            None
        }
        None => None,
    }
}

/// Remove an on-the-fly generated thumbnail; user-supplied thumbnails are
/// never touched.
async fn release_generated_thumbnail(thumb: Option<PathBuf>) {
    if let Some(path) = thumb {
        if let Err(err) = tokio::fs::remove_file(&path).await {
            debug!(thumbnail = %path.display(), error = %err, "failed to remove generated thumbnail");
        }
    }
}

fn photo_ext_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .is_some_and(|ext| SUPPORTED_PHOTO_EXTS.contains(&ext.as_str()))
}
