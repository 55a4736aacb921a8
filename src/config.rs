//! Configuration and settings management
//!
//! Loads account-level settings from environment variables and configuration
//! files, and defines the tuning constants for the upload pipeline.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Account-level settings loaded from environment variables
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    pub telegram_token: String,

    /// Comma-separated list of owner-level dump chat IDs
    #[serde(rename = "owner_dump_chats")]
    pub owner_dump_chats_str: Option<String>,

    /// Session token for the elevated-tier (premium) transport channel
    pub premium_session: Option<String>,

    /// Route large files through the premium channel when both channels exist
    #[serde(default)]
    pub hybrid_upload: bool,

    /// Include a user's personal dump chat in fan-out even when the owning
    /// account is elevated-tier. Off by default: the permission check for
    /// posting into arbitrary user chats from the premium session is still
    /// pending.
    #[serde(default)]
    pub share_personal_dump_when_elevated: bool,
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Environment::default() auto-converts UPPER_SNAKE_CASE to snake_case;
            // ignore_empty treats empty env vars as unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        s.try_deserialize()
    }

    /// Owner-level dump chats, in configuration order with duplicates removed.
    ///
    /// Order matters: fan-out replicates to these chats in the order they
    /// were configured.
    #[must_use]
    pub fn owner_dump_chats(&self) -> Vec<i64> {
        let mut seen = Vec::new();
        if let Some(raw) = &self.owner_dump_chats_str {
            for token in raw.split(|c: char| c == ',' || c == ';' || c.is_whitespace()) {
                if token.is_empty() {
                    continue;
                }
                if let Ok(id) = token.parse::<i64>() {
                    if !seen.contains(&id) {
                        seen.push(id);
                    }
                }
            }
        }
        seen
    }

    /// Whether the owning account holds an elevated-tier credential.
    #[must_use]
    pub fn is_elevated(&self) -> bool {
        self.premium_session.is_some()
    }
}

/// Per-run user preferences for one upload task.
///
/// Everything here is optional; an all-default `UserPrefs` delivers files
/// under their original names with plain `<code>` captions.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct UserPrefs {
    /// Caption template; wins outright over every other presentation option
    pub caption_template: Option<String>,
    /// Filename template applied when no caption template is set
    pub filename_template: Option<String>,
    /// Prefix prepended to the filename (HTML tags are stripped for the name)
    pub prefix: Option<String>,
    /// Suffix inserted before the extension (HTML tags stripped likewise)
    pub suffix: Option<String>,
    /// Font style applied to the caption when no template is configured
    pub font_style: Option<String>,
    /// Force every file to be sent as a document
    #[serde(default)]
    pub as_document: bool,
    /// User-supplied thumbnail; never deleted by the pipeline
    pub thumbnail: Option<PathBuf>,
    /// The user's personal dump chat
    pub personal_dump_chat: Option<i64>,
    /// Explicit destination overriding the user's own chat as upload target
    pub override_destination: Option<i64>,
    /// The user's own private chat
    pub user_chat: i64,
}

/// Hard filename length limit; longer names are truncated and the file renamed
pub const MAX_FILENAME_LEN: usize = 240;

/// Album hard limit, mirroring the transport's own batch-size ceiling
pub const ALBUM_LIMIT: usize = 10;

/// Payload ceiling for the bot channel (2 GiB)
pub const BOT_CEILING_BYTES: u64 = 2 * 1024 * 1024 * 1024;
/// Payload ceiling for the elevated-tier channel (4 GiB)
pub const PREMIUM_CEILING_BYTES: u64 = 4 * 1024 * 1024 * 1024;
/// Files above this size go through the premium channel in hybrid mode
pub const HYBRID_THRESHOLD_BYTES: u64 = BOT_CEILING_BYTES;

/// Bounded-retry attempt ceiling for one send
pub const UPLOAD_MAX_ATTEMPTS: usize = 3;
/// Initial backoff between send attempts
pub const UPLOAD_INITIAL_BACKOFF_MS: u64 = 500;
/// Backoff clamp between send attempts
pub const UPLOAD_MAX_BACKOFF_MS: u64 = 8000;
/// Safety multiplier applied to transport-signaled rate-limit waits
pub const FLOOD_WAIT_MULTIPLIER: f64 = 1.2;

/// Retry attempts for each fan-out copy, per destination
pub const COPY_MAX_ATTEMPTS: usize = 3;
/// Fixed pause between fan-out copy attempts
pub const COPY_RETRY_PAUSE_MS: u64 = 500;

/// Subdirectory of pre-rendered screenshots, delivered as photo albums
pub const SCREENSHOTS_DIR: &str = "screenshots";
/// Scratch subdirectory for thumbnail extraction, never delivered
pub const THUMB_SCRATCH_DIR: &str = "yt-dlp-thumb";

/// Extensions the photo channel accepts; anything else falls back to document
pub const SUPPORTED_PHOTO_EXTS: &[&str] = &["jpg", "jpeg", "png", "webp"];
