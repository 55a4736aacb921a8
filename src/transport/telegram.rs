//! Telegram transport built on teloxide.
//!
//! Maps the pipeline's payload shapes onto Bot API calls and the teloxide
//! error surface onto the [`TransportError`] taxonomy. No retry logic lives
//! here; the executor owns the policy.

use super::{AlbumMedia, AlbumPart, MediaPayload, MessageRef, Transport, TransportError};
use crate::upload::classify::MediaKind;
use async_trait::async_trait;
use std::path::Path;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, FileId, InputFile, InputMedia, InputMediaAudio, InputMediaDocument, InputMediaPhoto,
    InputMediaVideo, Message, MessageId, ParseMode, Seconds,
};
use teloxide::{ApiError, RequestError};

/// API error markers that mean "wrong payload shape", not a dead request.
static FORMAT_REJECTIONS: &[&str] = &[
    "PHOTO_INVALID_DIMENSIONS",
    "PHOTO_SAVE_FILE_INVALID",
    "PHOTO_EXT_INVALID",
    "IMAGE_PROCESS_FAILED",
    "VIDEO_CONTENT_TYPE_INVALID",
];

/// Telegram implementation of [`Transport`].
#[derive(Debug, Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    /// Build a transport from a bot token.
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// Wrap an existing bot instance.
    #[must_use]
    pub const fn from_bot(bot: Bot) -> Self {
        Self { bot }
    }
}

fn map_request_error(err: RequestError) -> TransportError {
    match err {
        RequestError::RetryAfter(wait) => TransportError::RateLimited(wait.duration()),
        RequestError::Api(api) => map_api_error(&api),
        RequestError::MigrateToChatId(chat) => {
            TransportError::Permanent(format!("chat migrated to {chat}"))
        }
        other => TransportError::Transient(other.to_string()),
    }
}

fn map_api_error(api: &ApiError) -> TransportError {
    let text = api.to_string();
    if FORMAT_REJECTIONS.iter().any(|marker| text.contains(marker)) {
        TransportError::FormatRejected(text)
    } else {
        TransportError::Permanent(text)
    }
}

fn upload_file(path: &Path, file_name: &str) -> InputFile {
    InputFile::file(path.to_path_buf()).file_name(file_name.to_string())
}

fn album_input(part: &AlbumPart) -> InputFile {
    match &part.media {
        AlbumMedia::Path(path) => InputFile::file(path.clone()),
        AlbumMedia::FileId(id) => InputFile::file_id(FileId(id.clone())),
    }
}

/// Pull the strongest file id out of a delivered message, matching the kind
/// it was sent as.
fn delivered_file_id(msg: &Message) -> String {
    if let Some(doc) = msg.document() {
        return doc.file.id.0.clone();
    }
    if let Some(video) = msg.video() {
        return video.file.id.0.clone();
    }
    if let Some(audio) = msg.audio() {
        return audio.file.id.0.clone();
    }
    if let Some(sizes) = msg.photo() {
        if let Some(largest) = sizes.last() {
            return largest.file.id.0.clone();
        }
    }
    String::new()
}

fn delivered_ref(msg: &Message, kind: MediaKind) -> MessageRef {
    MessageRef {
        chat_id: msg.chat.id.0,
        message_id: msg.id.0,
        kind,
        file_id: delivered_file_id(msg),
    }
}

fn album_slot(part: &AlbumPart) -> InputMedia {
    let file = album_input(part);
    match part.kind {
        MediaKind::Video => {
            let mut media = InputMediaVideo::new(file);
            if let Some(caption) = &part.caption {
                media = media.caption(caption.clone()).parse_mode(ParseMode::Html);
            }
            InputMedia::Video(media)
        }
        MediaKind::Audio => {
            let mut media = InputMediaAudio::new(file);
            if let Some(caption) = &part.caption {
                media = media.caption(caption.clone()).parse_mode(ParseMode::Html);
            }
            InputMedia::Audio(media)
        }
        MediaKind::Photo | MediaKind::Image => {
            let mut media = InputMediaPhoto::new(file);
            if let Some(caption) = &part.caption {
                media = media.caption(caption.clone()).parse_mode(ParseMode::Html);
            }
            InputMedia::Photo(media)
        }
        MediaKind::Document => {
            let mut media = InputMediaDocument::new(file);
            if let Some(caption) = &part.caption {
                media = media.caption(caption.clone()).parse_mode(ParseMode::Html);
            }
            InputMedia::Document(media)
        }
    }
}

impl TelegramTransport {
    async fn send_document_payload(
        &self,
        chat: ChatId,
        payload: &MediaPayload,
    ) -> Result<Message, RequestError> {
        let MediaPayload::Document {
            file,
            file_name,
            thumbnail,
            caption,
        } = payload
        else {
            unreachable!("caller dispatches on payload shape");
        };
        let mut req = self
            .bot
            .send_document(chat, upload_file(file, file_name))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html);
        if let Some(thumb) = thumbnail {
            req = req.thumbnail(InputFile::file(thumb.clone()));
        }
        req.await
    }

    async fn send_video_payload(
        &self,
        chat: ChatId,
        payload: &MediaPayload,
    ) -> Result<Message, RequestError> {
        let MediaPayload::Video {
            file,
            file_name,
            thumbnail,
            duration_secs,
            caption,
        } = payload
        else {
            unreachable!("caller dispatches on payload shape");
        };
        let mut req = self
            .bot
            .send_video(chat, upload_file(file, file_name))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .duration(*duration_secs)
            .supports_streaming(true);
        if let Some(thumb) = thumbnail {
            req = req.thumbnail(InputFile::file(thumb.clone()));
        }
        req.await
    }

    async fn send_audio_payload(
        &self,
        chat: ChatId,
        payload: &MediaPayload,
    ) -> Result<Message, RequestError> {
        let MediaPayload::Audio {
            file,
            file_name,
            thumbnail,
            duration_secs,
            performer,
            title,
            caption,
        } = payload
        else {
            unreachable!("caller dispatches on payload shape");
        };
        let mut req = self
            .bot
            .send_audio(chat, upload_file(file, file_name))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .duration(*duration_secs);
        if let Some(performer) = performer {
            req = req.performer(performer.clone());
        }
        if let Some(title) = title {
            req = req.title(title.clone());
        }
        if let Some(thumb) = thumbnail {
            req = req.thumbnail(InputFile::file(thumb.clone()));
        }
        req.await
    }

    async fn send_photo_payload(
        &self,
        chat: ChatId,
        payload: &MediaPayload,
    ) -> Result<Message, RequestError> {
        let MediaPayload::Photo {
            file,
            file_name,
            caption,
        } = payload
        else {
            unreachable!("caller dispatches on payload shape");
        };
        self.bot
            .send_photo(chat, upload_file(file, file_name))
            .caption(caption.clone())
            .parse_mode(ParseMode::Html)
            .await
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn send_media(
        &self,
        chat_id: i64,
        payload: &MediaPayload,
    ) -> Result<MessageRef, TransportError> {
        let chat = ChatId(chat_id);
        let result = match payload {
            MediaPayload::Document { .. } => self.send_document_payload(chat, payload).await,
            MediaPayload::Video { .. } => self.send_video_payload(chat, payload).await,
            MediaPayload::Audio { .. } => self.send_audio_payload(chat, payload).await,
            MediaPayload::Photo { .. } => self.send_photo_payload(chat, payload).await,
        };
        let msg = result.map_err(map_request_error)?;
        Ok(delivered_ref(&msg, payload.kind()))
    }

    async fn send_album(
        &self,
        chat_id: i64,
        parts: &[AlbumPart],
    ) -> Result<Vec<MessageRef>, TransportError> {
        let media: Vec<InputMedia> = parts.iter().map(album_slot).collect();
        let messages = self
            .bot
            .send_media_group(ChatId(chat_id), media)
            .await
            .map_err(map_request_error)?;
        let refs = messages
            .iter()
            .zip(parts.iter())
            .map(|(msg, part)| delivered_ref(msg, part.kind))
            .collect();
        Ok(refs)
    }

    async fn copy_message(
        &self,
        message: &MessageRef,
        to_chat: i64,
    ) -> Result<MessageRef, TransportError> {
        let copied = self
            .bot
            .copy_message(
                ChatId(to_chat),
                ChatId(message.chat_id),
                MessageId(message.message_id),
            )
            .await
            .map_err(map_request_error)?;
        Ok(MessageRef {
            chat_id: to_chat,
            message_id: copied.0,
            kind: message.kind,
            file_id: message.file_id.clone(),
        })
    }

    async fn delete_message(&self, message: &MessageRef) -> Result<(), TransportError> {
        self.bot
            .delete_message(ChatId(message.chat_id), MessageId(message.message_id))
            .await
            .map_err(map_request_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_retry_after_maps_to_rate_limited() {
        let err = map_request_error(RequestError::RetryAfter(Seconds::from_seconds(7)));
        match err {
            TransportError::RateLimited(wait) => assert_eq!(wait, Duration::from_secs(7)),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[test]
    fn test_photo_dimension_error_is_format_rejection() {
        let err = map_api_error(&ApiError::Unknown(
            "Bad Request: PHOTO_INVALID_DIMENSIONS".to_string(),
        ));
        assert!(matches!(err, TransportError::FormatRejected(_)));
    }

    #[test]
    fn test_other_api_errors_are_permanent() {
        let err = map_api_error(&ApiError::Unknown("Bad Request: chat not found".to_string()));
        assert!(matches!(err, TransportError::Permanent(_)));
    }
}
