//! Run report: counters, last error, and the delivered-message name map.

use crate::transport::MessageRef;
use crate::upload::{DeliveredName, UploadError};

/// Mutable outcome of one upload run.
///
/// Owned exclusively by the run controller; consumed once at run end.
#[derive(Debug, Default)]
pub struct RunReport {
    total: u32,
    corrupted: u32,
    last_error: Option<String>,
    delivered: Vec<DeliveredName>,
}

impl RunReport {
    /// Create an empty report for a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one discovered file.
    pub fn note_seen(&mut self) {
        self.total += 1;
    }

    /// Count one corrupted/skipped file, retaining its error.
    pub fn mark_corrupted(&mut self, error: impl Into<String>) {
        self.corrupted += 1;
        self.last_error = Some(error.into());
    }

    /// Record one delivered message under its display name.
    pub fn record_delivered(&mut self, message: MessageRef, name: impl Into<String>) {
        self.delivered.push((message, name.into()));
    }

    /// Drop a delivered entry that an album flush superseded.
    pub fn remove_delivered(&mut self, message: &MessageRef) {
        self.delivered.retain(|(existing, _)| {
            existing.chat_id != message.chat_id || existing.message_id != message.message_id
        });
    }

    /// Files discovered so far.
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Files that ended up corrupted.
    #[must_use]
    pub fn corrupted(&self) -> u32 {
        self.corrupted
    }

    /// Last captured per-file error, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Delivered messages with their display names, in delivery order.
    #[must_use]
    pub fn delivered(&self) -> &[DeliveredName] {
        &self.delivered
    }

    /// Apply the completion policy: empty runs and all-corrupted runs are
    /// failures; anything else hands the report to the caller.
    ///
    /// # Errors
    ///
    /// [`UploadError::NothingToDeliver`] when no files were discovered;
    /// [`UploadError::AllCorrupted`] when every discovered file failed.
    pub fn into_outcome(self) -> Result<Self, UploadError> {
        if self.total == 0 {
            return Err(UploadError::NothingToDeliver);
        }
        if self.corrupted >= self.total {
            let reason = self
                .last_error
                .unwrap_or_else(|| "unknown error".to_string());
            return Err(UploadError::AllCorrupted(reason));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::MediaKind;

    fn msg(id: i32) -> MessageRef {
        MessageRef {
            chat_id: 1,
            message_id: id,
            kind: MediaKind::Document,
            file_id: format!("f{id}"),
        }
    }

    #[test]
    fn test_empty_run_is_nothing_to_deliver() {
        let report = RunReport::new();
        assert!(matches!(
            report.into_outcome(),
            Err(UploadError::NothingToDeliver)
        ));
    }

    #[test]
    fn test_all_corrupted_carries_last_error() {
        let mut report = RunReport::new();
        report.note_seen();
        report.mark_corrupted("first");
        report.note_seen();
        report.mark_corrupted("second");
        match report.into_outcome() {
            Err(UploadError::AllCorrupted(reason)) => assert_eq!(reason, "second"),
            other => panic!("expected all-corrupted, got {other:?}"),
        }
    }

    #[test]
    fn test_partial_failure_still_succeeds() {
        let mut report = RunReport::new();
        report.note_seen();
        report.record_delivered(msg(1), "a.mkv");
        report.note_seen();
        report.mark_corrupted("boom");
        let report = report.into_outcome().expect("partial success");
        assert_eq!(report.total(), 2);
        assert_eq!(report.corrupted(), 1);
        assert_eq!(report.delivered().len(), 1);
    }

    #[test]
    fn test_supersession_removes_entry() {
        let mut report = RunReport::new();
        report.record_delivered(msg(1), "part1");
        report.record_delivered(msg(2), "part2");
        report.remove_delivered(&msg(1));
        assert_eq!(report.delivered().len(), 1);
        assert_eq!(report.delivered()[0].1, "part2");
    }
}
