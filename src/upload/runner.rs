//! Run controller: drives one upload pass over an output directory.
//!
//! Files are processed strictly one at a time in natural path order; the
//! transport's per-account rate limit makes parallel sends pointless.
//! Screenshot directories become photo albums, the thumbnail scratch
//! directory is skipped, and still-open album buffers flush at the end.

use super::batch::{AlbumBatcher, AlbumEntry, ReadyGroup};
use super::classify::{album_key_of, classify};
use super::presentation::{caption_for, code_wrap, prepare};
use super::transfer::TransferExecutor;
use super::{DeliveryItem, UploadError};
use crate::config::{Settings, UserPrefs, ALBUM_LIMIT, SCREENSHOTS_DIR, THUMB_SCRATCH_DIR};
use crate::probe::{CaptionEngine, MediaInspector, ThumbnailService};
use crate::report::RunReport;
use crate::transport::Transport;
use crate::utils::natural_cmp;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

/// The external services one run talks to.
#[derive(Clone, Copy)]
pub struct UploadServices<'a> {
    /// Primary (bot) transport channel
    pub transport: &'a dyn Transport,
    /// Elevated-tier channel for hybrid mode, when configured
    pub premium: Option<&'a dyn Transport>,
    /// Media classification and technical metadata
    pub inspector: &'a dyn MediaInspector,
    /// Thumbnail derivation
    pub thumbnails: &'a dyn ThumbnailService,
    /// Caption templates and font styles
    pub captions: &'a dyn CaptionEngine,
}

/// One upload run over one output directory.
///
/// Owns all per-run mutable state (album buffers, counters, report); nothing
/// here is shared across tasks.
pub struct UploadRun<'a> {
    settings: &'a Settings,
    prefs: &'a UserPrefs,
    services: UploadServices<'a>,
    batcher: AlbumBatcher,
    report: RunReport,
}

impl<'a> UploadRun<'a> {
    /// Set up a fresh run.
    #[must_use]
    pub fn new(settings: &'a Settings, prefs: &'a UserPrefs, services: UploadServices<'a>) -> Self {
        Self {
            settings,
            prefs,
            services,
            batcher: AlbumBatcher::new(),
            report: RunReport::new(),
        }
    }

    /// Walk the output directory and deliver everything in it.
    ///
    /// # Errors
    ///
    /// [`UploadError::NothingToDeliver`] for an empty directory,
    /// [`UploadError::AllCorrupted`] when every file failed, and
    /// [`UploadError::Cancelled`] when the token fired mid-run.
    pub async fn run(
        mut self,
        dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<RunReport, UploadError> {
        let executor = TransferExecutor::new(
            self.services.transport,
            self.services.premium,
            self.services.inspector,
            self.services.thumbnails,
            self.settings,
            self.prefs,
        );

        let mut walker = WalkDir::new(dir)
            .sort_by(|a, b| {
                natural_cmp(
                    &a.file_name().to_string_lossy(),
                    &b.file_name().to_string_lossy(),
                )
            })
            .into_iter();

        while let Some(entry) = walker.next() {
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, "skipping unreadable directory entry");
                    continue;
                }
            };
            if entry.file_type().is_dir() {
                if entry.file_name() == THUMB_SCRATCH_DIR {
                    walker.skip_current_dir();
                } else if entry.file_name() == SCREENSHOTS_DIR {
                    self.deliver_screenshots(&executor, entry.path()).await;
                    walker.skip_current_dir();
                }
                continue;
            }
            self.process_file(&executor, entry.path()).await;
            if cancel.is_cancelled() {
                return Err(UploadError::Cancelled);
            }
        }

        for group in self.batcher.drain() {
            self.flush_group(&executor, group).await;
        }

        info!(
            total = self.report.total(),
            corrupted = self.report.corrupted(),
            "upload run finished"
        );
        self.report.into_outcome()
    }

    async fn process_file(&mut self, executor: &TransferExecutor<'a>, path: &Path) {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.report.note_seen();

        let size = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.len(),
            Err(_) => {
                warn!(file = %file_name, "file vanished between discovery and send");
                self.report
                    .mark_corrupted(format!("file vanished before upload: {file_name}"));
                return;
            }
        };
        if size == 0 {
            warn!(file = %file_name, "skipping zero-byte file");
            self.report
                .mark_corrupted(format!("zero-byte file: {file_name}"));
            return;
        }

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let presentation = prepare(
            dir,
            &file_name,
            self.prefs,
            self.services.captions,
            self.services.inspector,
        )
        .await;
        let kind = classify(
            self.services.inspector,
            &presentation.path,
            self.prefs.as_document,
        )
        .await;
        let key = album_key_of(&presentation.path);

        for group in self.batcher.note_boundary(&key) {
            self.flush_group(executor, group).await;
        }

        let item = DeliveryItem {
            path: presentation.path,
            name: presentation.file_name,
            caption: presentation.caption,
            kind,
            size,
        };
        match executor.deliver(&item).await {
            Ok(message) => {
                let delivered_kind = message.kind;
                self.report.record_delivered(message.clone(), item.name.clone());
                let entry = AlbumEntry {
                    message,
                    name: item.name.clone(),
                };
                if let Some(group) = self.batcher.record(delivered_kind, key, entry) {
                    self.flush_group(executor, group).await;
                }
            }
            Err(err) => {
                warn!(file = %item.name, error = %err, "delivery failed");
                self.report.mark_corrupted(err.to_string());
            }
        }
    }

    async fn flush_group(&mut self, executor: &TransferExecutor<'a>, group: ReadyGroup) {
        let representative = Path::new(&group.key)
            .file_name()
            .map_or_else(|| group.key.clone(), |n| n.to_string_lossy().into_owned());
        let caption = caption_for(&representative, self.prefs, self.services.captions);

        match executor.deliver_album(&group, caption).await {
            Ok(messages) => {
                for entry in &group.entries {
                    self.report.remove_delivered(&entry.message);
                }
                for (message, entry) in messages.into_iter().zip(group.entries.iter()) {
                    self.report.record_delivered(message, entry.name.clone());
                }
            }
            Err(err) => {
                // Members stay delivered individually when the batch fails.
                warn!(key = %group.key, error = %err, "album flush failed");
            }
        }
    }

    async fn deliver_screenshots(&mut self, executor: &TransferExecutor<'a>, dir: &Path) {
        let photos = collect_sorted_files(dir).await;
        if photos.is_empty() {
            return;
        }
        let label = dir
            .parent()
            .and_then(Path::file_name)
            .map_or_else(|| SCREENSHOTS_DIR.to_string(), |n| n.to_string_lossy().into_owned());

        for chunk in photos.chunks(ALBUM_LIMIT) {
            for _ in chunk {
                self.report.note_seen();
            }
            match executor
                .deliver_photo_album(chunk, Some(code_wrap(&label)))
                .await
            {
                Ok(messages) => {
                    for (message, path) in messages.into_iter().zip(chunk.iter()) {
                        let name = path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        self.report.record_delivered(message, name);
                    }
                }
                Err(err) => {
                    warn!(dir = %dir.display(), error = %err, "screenshot album failed");
                    for _ in chunk {
                        self.report.mark_corrupted(err.to_string());
                    }
                }
            }
        }

        if let Err(err) = tokio::fs::remove_dir_all(dir).await {
            warn!(dir = %dir.display(), error = %err, "failed to discard screenshots directory");
        }
    }
}

async fn collect_sorted_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(dir).await else {
        return files;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| {
        natural_cmp(
            &a.file_name().unwrap_or_default().to_string_lossy(),
            &b.file_name().unwrap_or_default().to_string_lossy(),
        )
    });
    files
}
