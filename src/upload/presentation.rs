//! Filename and caption derivation.
//!
//! Priority order: a caption template wins outright; else a filename template
//! renames the file and doubles as the caption; else prefix/suffix plus an
//! optional font style. Over-length names are truncated and the file renamed.
//! This step never aborts the run: every failure falls back to a plain
//! `<code>`-wrapped original name.

use crate::config::{UserPrefs, MAX_FILENAME_LEN};
use crate::probe::{CaptionEngine, MediaInspector, TemplateContext};
use crate::utils::{shorten_file_name, strip_html_tags};
use std::path::{Path, PathBuf};
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Match `SxxEyy` season/episode tokens
static RE_SEASON_EPISODE: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"(?i)\bS(\d{1,2})[\s._-]?E(\d{1,3})\b");

/// Match quality tokens
static RE_QUALITY: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"(?i)\b(2160p|1440p|1080p|720p|480p|360p|4k|8k)\b");

/// Derived presentation for one file.
#[derive(Debug, Clone)]
pub struct Presentation {
    /// Current on-disk path (post-rename when the name changed)
    pub path: PathBuf,
    /// Display name attached to the upload
    pub file_name: String,
    /// HTML caption
    pub caption: String,
}

/// Wrap a display name in a `<code>` caption, escaping HTML.
#[must_use]
pub fn code_wrap(name: &str) -> String {
    format!("<code>{}</code>", html_escape::encode_text(name))
}

/// Caption rule shared by single sends and album flushes: font style when
/// configured, plain `<code>` wrapping otherwise.
#[must_use]
pub fn caption_for(name: &str, prefs: &UserPrefs, engine: &dyn CaptionEngine) -> String {
    match &prefs.font_style {
        Some(style) => engine.apply_font_style(name, style).unwrap_or_else(|err| {
            warn!(%style, error = %err, "font style failed, using plain caption");
            code_wrap(name)
        }),
        None => code_wrap(name),
    }
}

/// Extract template metadata from a filename.
#[must_use]
pub fn filename_metadata(file_name: &str) -> TemplateContext {
    let (basename, ext) = split_extension(file_name);
    let (season, episode) = RE_SEASON_EPISODE
        .captures(file_name)
        .map_or((None, None), |caps| {
            (
                caps.get(1).map(|m| m.as_str().to_string()),
                caps.get(2).map(|m| m.as_str().to_string()),
            )
        });
    let quality = RE_QUALITY
        .find(file_name)
        .map(|m| m.as_str().to_string());
    TemplateContext {
        basename: basename.to_string(),
        ext: ext.to_string(),
        season,
        episode,
        quality,
        ..TemplateContext::default()
    }
}

fn split_extension(file_name: &str) -> (&str, &str) {
    match file_name.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() => (base, ext),
        _ => (file_name, ""),
    }
}

/// Derive the final filename and caption for one file, renaming it on disk
/// when the name changed.
pub async fn prepare(
    dir: &Path,
    file_name: &str,
    prefs: &UserPrefs,
    engine: &dyn CaptionEngine,
    inspector: &dyn MediaInspector,
) -> Presentation {
    let original_path = dir.join(file_name);

    if let Some(template) = &prefs.caption_template {
        // Caption template wins outright; the filename is left untouched.
        let mut ctx = filename_metadata(file_name);
        let info = inspector.media_info(&original_path).await;
        ctx.duration = Some(info.duration_secs);
        ctx.artist = info.artist;
        ctx.title = info.title;
        let caption = match engine.apply_template(template, &ctx) {
            Ok(rendered) => rendered,
            Err(err) => {
                warn!(file = %file_name, error = %err, "caption template failed, using plain caption");
                code_wrap(file_name)
            }
        };
        return Presentation {
            path: original_path,
            file_name: file_name.to_string(),
            caption,
        };
    }

    let (derived, caption) = derive_name_and_caption(file_name, prefs, engine);
    let (final_name, caption) = truncate_if_needed(derived, caption, prefs, engine);
    let path = rename_in_place(dir, file_name, &final_name, original_path).await;
    Presentation {
        path,
        file_name: final_name,
        caption,
    }
}

fn derive_name_and_caption(
    file_name: &str,
    prefs: &UserPrefs,
    engine: &dyn CaptionEngine,
) -> (String, String) {
    if let Some(template) = &prefs.filename_template {
        let ctx = filename_metadata(file_name);
        match engine.apply_template(template, &ctx) {
            Ok(rendered) if !rendered.is_empty() => {
                let named = reattach_extension(&rendered, &ctx.ext);
                let caption = code_wrap(&named);
                return (named, caption);
            }
            Ok(_) => {
                warn!(file = %file_name, "filename template rendered empty, keeping original");
            }
            Err(err) => {
                warn!(file = %file_name, error = %err, "filename template failed, keeping original");
            }
        }
        return (file_name.to_string(), code_wrap(file_name));
    }

    let decorated = apply_prefix_suffix(file_name, prefs);
    let caption = caption_for(&decorated, prefs, engine);
    (decorated, caption)
}

fn reattach_extension(rendered: &str, ext: &str) -> String {
    if ext.is_empty() || rendered.to_lowercase().ends_with(&format!(".{}", ext.to_lowercase())) {
        rendered.to_string()
    } else {
        format!("{rendered}.{ext}")
    }
}

fn apply_prefix_suffix(file_name: &str, prefs: &UserPrefs) -> String {
    let mut name = file_name.to_string();
    if let Some(prefix) = &prefs.prefix {
        name = format!("{}{name}", strip_html_tags(prefix));
    }
    if let Some(suffix) = &prefs.suffix {
        let stripped = strip_html_tags(suffix);
        let (base, ext) = split_extension(&name);
        name = if ext.is_empty() {
            format!("{base}{stripped}")
        } else {
            format!("{base}{stripped}.{ext}")
        };
    }
    name
}

fn truncate_if_needed(
    name: String,
    caption: String,
    prefs: &UserPrefs,
    engine: &dyn CaptionEngine,
) -> (String, String) {
    if name.graphemes(true).count() <= MAX_FILENAME_LEN {
        return (name, caption);
    }
    let short = shorten_file_name(&name, MAX_FILENAME_LEN);
    let caption = caption_for(&short, prefs, engine);
    (short, caption)
}

async fn rename_in_place(
    dir: &Path,
    original: &str,
    final_name: &str,
    original_path: PathBuf,
) -> PathBuf {
    if original == final_name {
        return original_path;
    }
    let target = dir.join(final_name);
    match tokio::fs::rename(&original_path, &target).await {
        Ok(()) => target,
        Err(err) => {
            warn!(from = %original, to = %final_name, error = %err, "rename failed, keeping original path");
            original_path
        }
    }
}
