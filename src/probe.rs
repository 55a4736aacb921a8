//! Consumed media and caption services.
//!
//! The pipeline treats media inspection, thumbnail generation, and caption
//! decoration as external services behind traits. Reference implementations
//! live here too: an extension-table inspector and an HTML caption engine,
//! enough to run the pipeline without ffprobe-grade tooling.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Classification flags produced by content probing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaFlags {
    /// File decodes as video
    pub is_video: bool,
    /// File decodes as audio
    pub is_audio: bool,
    /// File decodes as a still image
    pub is_image: bool,
}

/// Technical metadata extracted from a media file.
#[derive(Debug, Clone, Default)]
pub struct MediaInfo {
    /// Stream duration in whole seconds
    pub duration_secs: u32,
    /// Performer tag, when present
    pub artist: Option<String>,
    /// Title tag, when present
    pub title: Option<String>,
}

/// Metadata handed to caption/filename templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Filename without extension
    pub basename: String,
    /// Extension without the dot
    pub ext: String,
    /// Season number parsed from the filename (`S01E02` style)
    pub season: Option<String>,
    /// Episode number parsed from the filename
    pub episode: Option<String>,
    /// Quality token parsed from the filename (`1080p`, `4k`, ...)
    pub quality: Option<String>,
    /// Probed duration in seconds
    pub duration: Option<u32>,
    /// Probed performer tag
    pub artist: Option<String>,
    /// Probed title tag
    pub title: Option<String>,
}

impl TemplateContext {
    fn lookup(&self, key: &str) -> Option<String> {
        match key {
            "basename" | "filename" => Some(self.basename.clone()),
            "ext" => Some(self.ext.clone()),
            "season" => self.season.clone(),
            "episode" => self.episode.clone(),
            "quality" => self.quality.clone(),
            "duration" => self.duration.map(|d| d.to_string()),
            "artist" => self.artist.clone(),
            "title" => self.title.clone(),
            _ => None,
        }
    }
}

/// Media inspection service: classification and technical metadata.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaInspector: Send + Sync {
    /// Probe a file's kind from its content.
    async fn classify(&self, path: &Path) -> MediaFlags;

    /// Probe duration and audio tags.
    async fn media_info(&self, path: &Path) -> MediaInfo;

    /// Best-effort link to a technical-metadata page for the file.
    ///
    /// Failures are swallowed; `None` means the caption carries no link.
    async fn technical_link(&self, path: &Path) -> Option<String>;
}

/// Thumbnail derivation service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ThumbnailService: Send + Sync {
    /// Derive a thumbnail for a video by sampling a frame; `duration_secs`
    /// hints where to sample. `None` when derivation is not possible.
    async fn generate(&self, path: &Path, duration_secs: u32) -> Option<PathBuf>;
}

/// Caption decoration engine: templates and font styles.
#[cfg_attr(test, mockall::automock)]
pub trait CaptionEngine: Send + Sync {
    /// Render a template against the extracted metadata.
    ///
    /// # Errors
    ///
    /// Fails on malformed templates or placeholders the context cannot fill;
    /// callers fall back to a plain wrapped filename.
    fn apply_template(&self, template: &str, ctx: &TemplateContext) -> Result<String>;

    /// Decorate text with a named font style.
    ///
    /// # Errors
    ///
    /// Fails on unknown style names; callers fall back likewise.
    fn apply_font_style(&self, text: &str, style: &str) -> Result<String>;
}

static VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "ts", "m4v", "wmv"];
static AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "flac", "opus", "aac"];
static IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif", "tiff"];

/// Extension-table media inspector.
///
/// Stands in for a real content probe when ffprobe is unavailable; duration
/// and tags come back empty, which the pipeline tolerates.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionInspector;

#[async_trait]
impl MediaInspector for ExtensionInspector {
    async fn classify(&self, path: &Path) -> MediaFlags {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        MediaFlags {
            is_video: VIDEO_EXTENSIONS.contains(&ext.as_str()),
            is_audio: AUDIO_EXTENSIONS.contains(&ext.as_str()),
            is_image: IMAGE_EXTENSIONS.contains(&ext.as_str()),
        }
    }

    async fn media_info(&self, _path: &Path) -> MediaInfo {
        MediaInfo::default()
    }

    async fn technical_link(&self, _path: &Path) -> Option<String> {
        None
    }
}

/// Match `{placeholder}` tokens in templates
static RE_PLACEHOLDER: lazy_regex::Lazy<regex::Regex> = lazy_regex::lazy_regex!(r"\{(\w+)\}");

/// HTML caption engine: `{placeholder}` templates and Telegram HTML styles.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlCaptionEngine;

impl CaptionEngine for HtmlCaptionEngine {
    fn apply_template(&self, template: &str, ctx: &TemplateContext) -> Result<String> {
        let mut missing: Option<String> = None;
        let rendered = RE_PLACEHOLDER.replace_all(template, |caps: &regex::Captures| {
            let key = caps.get(1).map_or("", |m| m.as_str());
            match ctx.lookup(key) {
                Some(value) => value,
                None => {
                    missing = Some(key.to_string());
                    String::new()
                }
            }
        });
        if let Some(key) = missing {
            bail!("template placeholder {{{key}}} has no value");
        }
        Ok(rendered.trim().to_string())
    }

    fn apply_font_style(&self, text: &str, style: &str) -> Result<String> {
        let escaped = html_escape::encode_text(text);
        let styled = match style.to_lowercase().as_str() {
            "bold" | "b" => format!("<b>{escaped}</b>"),
            "italic" | "i" => format!("<i>{escaped}</i>"),
            "underline" | "u" => format!("<u>{escaped}</u>"),
            "strike" | "s" => format!("<s>{escaped}</s>"),
            "mono" | "code" => format!("<code>{escaped}</code>"),
            "spoiler" => format!("<span class=\"tg-spoiler\">{escaped}</span>"),
            other => bail!("unknown font style: {other}"),
        };
        Ok(styled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extension_inspector_flags() {
        let inspector = ExtensionInspector;
        let video = inspector.classify(Path::new("/tmp/movie.MKV")).await;
        assert!(video.is_video && !video.is_audio && !video.is_image);

        let audio = inspector.classify(Path::new("/tmp/song.flac")).await;
        assert!(audio.is_audio);

        let other = inspector.classify(Path::new("/tmp/archive.rar")).await;
        assert_eq!(other, MediaFlags::default());
    }

    #[test]
    fn test_template_renders_known_placeholders() {
        let engine = HtmlCaptionEngine;
        let ctx = TemplateContext {
            basename: "Show.S01E02.1080p".to_string(),
            ext: "mkv".to_string(),
            season: Some("01".to_string()),
            episode: Some("02".to_string()),
            quality: Some("1080p".to_string()),
            ..TemplateContext::default()
        };
        let out = engine
            .apply_template("S{season}E{episode} [{quality}]", &ctx)
            .expect("render");
        assert_eq!(out, "S01E02 [1080p]");
    }

    #[test]
    fn test_template_fails_on_missing_placeholder() {
        let engine = HtmlCaptionEngine;
        let ctx = TemplateContext::default();
        assert!(engine.apply_template("S{season}", &ctx).is_err());
    }

    #[test]
    fn test_font_style_escapes_payload() {
        let engine = HtmlCaptionEngine;
        let out = engine.apply_font_style("a<b>.mkv", "bold").expect("style");
        assert_eq!(out, "<b>a&lt;b&gt;.mkv</b>");
        assert!(engine.apply_font_style("x", "comic-sans").is_err());
    }
}
