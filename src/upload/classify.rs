//! Media classification and album grouping keys.

use crate::probe::MediaInspector;
use std::fmt;
use std::path::Path;

/// Closed set of deliverable media kinds.
///
/// Decided once per file by [`classify`] and switched on explicitly
/// downstream. `Image` is the classifier's verdict; the executor narrows it
/// to `Photo` or `Document` depending on what the photo channel accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MediaKind {
    /// Streamable video
    Video,
    /// Audio with tags
    Audio,
    /// Still image, not yet narrowed to photo or document
    Image,
    /// Generic document
    Document,
    /// Image delivered through the photo channel
    Photo,
}

impl MediaKind {
    /// Whether messages of this kind accumulate into albums.
    ///
    /// Audio and photos are never batched; albums hold videos or documents.
    #[must_use]
    pub fn batches_into_albums(self) -> bool {
        matches!(self, Self::Video | Self::Document)
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Video => "videos",
            Self::Audio => "audios",
            Self::Image => "images",
            Self::Document => "documents",
            Self::Photo => "photos",
        };
        f.write_str(label)
    }
}

/// Classify a file, honoring the force-document override.
///
/// Probe flags are checked video-first; files matching nothing are documents.
pub async fn classify(
    inspector: &dyn MediaInspector,
    path: &Path,
    force_document: bool,
) -> MediaKind {
    if force_document {
        return MediaKind::Document;
    }
    let flags = inspector.classify(path).await;
    if flags.is_video {
        MediaKind::Video
    } else if flags.is_audio {
        MediaKind::Audio
    } else if flags.is_image {
        MediaKind::Image
    } else {
        MediaKind::Document
    }
}

/// Match `<base>.partNN.<ext>` split naming
static RE_PART_SUFFIX: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"(?i)^(?P<base>.+)\.part0*\d+\.[^.]+$");

/// Match `<base>.NNN` trailing purely-numeric suffixes
static RE_NUMERIC_SUFFIX: lazy_regex::Lazy<regex::Regex> =
    lazy_regex::lazy_regex!(r"^(?P<base>.+)\.0*\d+$");

/// Derive the album grouping key for a path.
///
/// Stripping rules, applied to the full path string:
/// 1. a trailing `.partNN.<ext>` split suffix is removed along with the
///    extension (`movie.part01.mkv` → `movie`);
/// 2. otherwise a trailing purely-numeric suffix is removed
///    (`movie.mkv.001` → `movie.mkv`);
/// 3. otherwise the path itself is the key, so unrelated files land in
///    singleton groups that never flush.
///
/// Two items belong to the same logical album iff their keys and media kinds
/// match.
#[must_use]
pub fn album_key_of(path: &Path) -> String {
    let raw = path.to_string_lossy();
    if let Some(caps) = RE_PART_SUFFIX.captures(&raw) {
        if let Some(base) = caps.name("base") {
            return base.as_str().to_string();
        }
    }
    if let Some(caps) = RE_NUMERIC_SUFFIX.captures(&raw) {
        if let Some(base) = caps.name("base") {
            return base.as_str().to_string();
        }
    }
    raw.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{MediaFlags, MockMediaInspector};

    #[test]
    fn test_album_key_strips_part_suffix() {
        assert_eq!(
            album_key_of(Path::new("/dl/movie.part01.mkv")),
            "/dl/movie"
        );
        assert_eq!(
            album_key_of(Path::new("/dl/movie.part12.mkv")),
            "/dl/movie"
        );
        assert_eq!(album_key_of(Path::new("/dl/Movie.PART3.rar")), "/dl/Movie");
    }

    #[test]
    fn test_album_key_strips_numeric_suffix() {
        assert_eq!(album_key_of(Path::new("/dl/file.mkv.001")), "/dl/file.mkv");
        assert_eq!(album_key_of(Path::new("/dl/file.7z.10")), "/dl/file.7z");
    }

    #[test]
    fn test_album_key_plain_names_unchanged() {
        assert_eq!(album_key_of(Path::new("/dl/movie.mkv")), "/dl/movie.mkv");
        assert_eq!(
            album_key_of(Path::new("/dl/show.2024.mkv")),
            "/dl/show.2024.mkv"
        );
    }

    #[test]
    fn test_album_key_distinguishes_directories() {
        assert_ne!(
            album_key_of(Path::new("/a/movie.part01.mkv")),
            album_key_of(Path::new("/b/movie.part01.mkv"))
        );
    }

    #[tokio::test]
    async fn test_classify_force_document_wins() {
        let inspector = MockMediaInspector::new();
        let kind = classify(&inspector, Path::new("/dl/movie.mkv"), true).await;
        assert_eq!(kind, MediaKind::Document);
    }

    #[tokio::test]
    async fn test_classify_prefers_video_flag() {
        let mut inspector = MockMediaInspector::new();
        inspector.expect_classify().returning(|_| MediaFlags {
            is_video: true,
            is_audio: false,
            is_image: false,
        });
        let kind = classify(&inspector, Path::new("/dl/movie.mkv"), false).await;
        assert_eq!(kind, MediaKind::Video);
    }

    #[tokio::test]
    async fn test_classify_unknown_is_document() {
        let mut inspector = MockMediaInspector::new();
        inspector
            .expect_classify()
            .returning(|_| MediaFlags::default());
        let kind = classify(&inspector, Path::new("/dl/data.bin"), false).await;
        assert_eq!(kind, MediaKind::Document);
    }
}
