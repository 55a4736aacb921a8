//! The upload delivery pipeline.
//!
//! Components in dependency order: presentation ([`presentation`]),
//! classification and album batching ([`classify`], [`batch`]), the transfer
//! executor ([`transfer`]), destination fan-out ([`fanout`]), and the run
//! controller ([`runner`]) that drives them over a directory of finished
//! files.

/// Album buffering and flush decisions
pub mod batch;
/// Media kinds and album grouping keys
pub mod classify;
/// Secondary-destination computation and replication
pub mod fanout;
/// Filename and caption derivation
pub mod presentation;
/// Run controller
pub mod runner;
/// Send execution with retry policy
pub mod transfer;

pub use batch::{AlbumBatcher, AlbumEntry, ReadyGroup};
pub use classify::{album_key_of, classify, MediaKind};
pub use presentation::{prepare, Presentation};
pub use runner::{UploadRun, UploadServices};
pub use transfer::{TransferError, TransferExecutor};

use crate::transport::MessageRef;
use std::path::PathBuf;
use thiserror::Error;

/// One file queued for delivery.
///
/// Created when the run controller discovers a file; consumed once the file
/// is delivered or counted corrupted.
#[derive(Debug, Clone)]
pub struct DeliveryItem {
    /// Current on-disk location (post-rename)
    pub path: PathBuf,
    /// Display name attached to the upload
    pub name: String,
    /// HTML caption
    pub caption: String,
    /// Classified media kind
    pub kind: MediaKind,
    /// File size in bytes
    pub size: u64,
}

impl DeliveryItem {
    /// Album grouping key for this item's current path.
    #[must_use]
    pub fn album_key(&self) -> String {
        album_key_of(&self.path)
    }
}

/// Run-level failure of the whole upload pass.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The output directory held no files at all.
    #[error("nothing to deliver")]
    NothingToDeliver,
    /// Every discovered file ended up corrupted.
    #[error("all files failed to deliver: {0}")]
    AllCorrupted(String),
    /// Cancellation was observed; the run stopped issuing sends.
    #[error("upload run cancelled")]
    Cancelled,
}

/// A delivered message paired with the display name it was delivered under.
pub type DeliveredName = (MessageRef, String);
