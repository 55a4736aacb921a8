//! Secondary-destination computation and replication.
//!
//! The primary send already went to the origin chat; fan-out computes the
//! ordered, de-duplicated set of secondary chats and copies the delivery to
//! each, tolerating per-destination failure. Copies never affect the primary
//! delivery's outcome.

use crate::config::{Settings, UserPrefs, COPY_MAX_ATTEMPTS, COPY_RETRY_PAUSE_MS};
use crate::transport::{AlbumPart, MessageRef, Transport};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::Retry;
use tracing::{debug, warn};

/// Compute the ordered secondary-destination set for one delivery.
///
/// Rules, first match wins for the base set:
/// 1. an explicit override destination means the primary send already landed
///    where requested; only the user's own chat is owed a copy;
/// 2. no personal dump configured: every owner dump chat;
/// 3. personal dump and a non-elevated account: the personal dump, then the
///    owner dump chats;
/// 4. personal dump and an elevated account: owner dump chats only, unless
///    `share_personal_dump_when_elevated` is set.
///
/// The user's own chat is always appended; the origin is filtered out and
/// duplicates collapse keeping first-seen order.
#[must_use]
pub fn destinations(settings: &Settings, prefs: &UserPrefs, origin: i64) -> Vec<i64> {
    let mut candidates: Vec<i64> = Vec::new();

    if prefs.override_destination.is_none() {
        match prefs.personal_dump_chat {
            None => candidates.extend(settings.owner_dump_chats()),
            Some(personal) => {
                let share_personal =
                    !settings.is_elevated() || settings.share_personal_dump_when_elevated;
                if share_personal {
                    candidates.push(personal);
                }
                candidates.extend(settings.owner_dump_chats());
            }
        }
    }
    candidates.push(prefs.user_chat);

    let mut ordered = Vec::with_capacity(candidates.len());
    for chat in candidates {
        if chat != origin && !ordered.contains(&chat) {
            ordered.push(chat);
        }
    }
    ordered
}

/// Copy one delivered message to every secondary destination.
///
/// Each destination gets its own bounded fixed-pause retry; failures are
/// logged and never propagated.
pub async fn replicate(transport: &dyn Transport, message: &MessageRef, destinations: &[i64]) {
    for &dest in destinations {
        let strategy = FixedInterval::from_millis(COPY_RETRY_PAUSE_MS).take(COPY_MAX_ATTEMPTS);
        let outcome = Retry::spawn(strategy, || async {
            transport.copy_message(message, dest).await
        })
        .await;
        match outcome {
            Ok(copy) => debug!(
                chat = dest,
                message_id = copy.message_id,
                "replicated delivery"
            ),
            Err(err) => warn!(chat = dest, error = %err, "failed to replicate delivery"),
        }
    }
}

/// Re-send a whole album to every secondary destination.
pub async fn replicate_album(transport: &dyn Transport, parts: &[AlbumPart], destinations: &[i64]) {
    for &dest in destinations {
        let strategy = FixedInterval::from_millis(COPY_RETRY_PAUSE_MS).take(COPY_MAX_ATTEMPTS);
        let outcome =
            Retry::spawn(strategy, || async { transport.send_album(dest, parts).await }).await;
        match outcome {
            Ok(messages) => debug!(chat = dest, parts = messages.len(), "replicated album"),
            Err(err) => warn!(chat = dest, error = %err, "failed to replicate album"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(owner_dumps: &str, elevated: bool) -> Settings {
        Settings {
            telegram_token: "dummy".to_string(),
            owner_dump_chats_str: Some(owner_dumps.to_string()),
            premium_session: elevated.then(|| "session".to_string()),
            hybrid_upload: false,
            share_personal_dump_when_elevated: false,
        }
    }

    fn prefs(user_chat: i64) -> UserPrefs {
        UserPrefs {
            user_chat,
            ..UserPrefs::default()
        }
    }

    #[test]
    fn test_override_destination_only_owes_user_chat() {
        let settings = settings("-100200,-100300", false);
        let mut prefs = prefs(42);
        prefs.override_destination = Some(-100500);
        assert_eq!(destinations(&settings, &prefs, -100500), vec![42]);
    }

    #[test]
    fn test_override_equal_to_user_chat_needs_nothing() {
        let settings = settings("-100200", false);
        let mut prefs = prefs(42);
        prefs.override_destination = Some(42);
        assert!(destinations(&settings, &prefs, 42).is_empty());
    }

    #[test]
    fn test_no_personal_dump_uses_owner_dumps() {
        let settings = settings("-100200,-100300", false);
        let prefs = prefs(42);
        assert_eq!(
            destinations(&settings, &prefs, 42),
            vec![-100200, -100300]
        );
    }

    #[test]
    fn test_owner_dump_equal_to_origin_is_skipped() {
        let settings = settings("-100200,-100300", false);
        let prefs = prefs(42);
        assert_eq!(
            destinations(&settings, &prefs, -100200),
            vec![-100300, 42]
        );
    }

    #[test]
    fn test_personal_dump_included_for_regular_account() {
        let settings = settings("-100200", false);
        let mut prefs = prefs(42);
        prefs.personal_dump_chat = Some(-100900);
        assert_eq!(
            destinations(&settings, &prefs, 42),
            vec![-100900, -100200]
        );
    }

    #[test]
    fn test_personal_dump_withheld_for_elevated_account() {
        let settings = settings("-100200", true);
        let mut prefs = prefs(42);
        prefs.personal_dump_chat = Some(-100900);
        assert_eq!(destinations(&settings, &prefs, 42), vec![-100200]);
    }

    #[test]
    fn test_personal_dump_shared_when_configured() {
        let mut settings = settings("-100200", true);
        settings.share_personal_dump_when_elevated = true;
        let mut prefs = prefs(42);
        prefs.personal_dump_chat = Some(-100900);
        assert_eq!(
            destinations(&settings, &prefs, 42),
            vec![-100900, -100200]
        );
    }

    #[test]
    fn test_duplicates_collapse_first_seen() {
        let settings = settings("-100200,-100200,42", false);
        let prefs = prefs(42);
        // 42 appears as both an owner dump and the user chat; origin is elsewhere.
        assert_eq!(destinations(&settings, &prefs, 7), vec![-100200, 42]);
    }

    #[test]
    fn test_user_chat_appended_unless_origin() {
        let settings = settings("", false);
        let prefs = prefs(42);
        assert_eq!(destinations(&settings, &prefs, 7), vec![42]);
        assert!(destinations(&settings, &prefs, 42).is_empty());
    }
}
