//! Retry-policy behavior of the transfer executor, driven by scripted
//! transport outcomes.

use media_courier::config::{Settings, UserPrefs, BOT_CEILING_BYTES};
use media_courier::testing::{FakeTransport, NoThumbnails, StaticInspector};
use media_courier::transport::TransportError;
use media_courier::upload::{DeliveryItem, MediaKind, TransferError, TransferExecutor};
use std::path::{Path, PathBuf};
use std::time::Duration;

const USER_CHAT: i64 = 42;

fn settings() -> Settings {
    Settings {
        telegram_token: "dummy".to_string(),
        owner_dump_chats_str: None,
        premium_session: None,
        hybrid_upload: false,
        share_personal_dump_when_elevated: false,
    }
}

fn prefs() -> UserPrefs {
    UserPrefs {
        user_chat: USER_CHAT,
        ..UserPrefs::default()
    }
}

fn item(path: &Path, kind: MediaKind, size: u64) -> DeliveryItem {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    DeliveryItem {
        path: path.to_path_buf(),
        name: name.clone(),
        caption: format!("<code>{name}</code>"),
        kind,
        size,
    }
}

fn fixture(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"data").expect("fixture");
    path
}

async fn deliver(
    transport: &FakeTransport,
    settings: &Settings,
    prefs: &UserPrefs,
    item: &DeliveryItem,
) -> Result<media_courier::transport::MessageRef, TransferError> {
    let inspector = StaticInspector { duration_secs: 30 };
    let thumbnails = NoThumbnails;
    let executor = TransferExecutor::new(
        transport,
        None,
        &inspector,
        &thumbnails,
        settings,
        prefs,
    );
    executor.deliver(item).await
}

#[tokio::test]
async fn rate_limit_sleeps_and_retries_without_consuming_budget() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture(&dir, "movie.mkv");
    let transport = FakeTransport::new();
    // More rate limits than the attempt ceiling allows for real failures;
    // the send still succeeds because they never touch the budget.
    transport.script_outcomes(vec![
        Err(TransportError::RateLimited(Duration::from_millis(5))),
        Err(TransportError::RateLimited(Duration::from_millis(5))),
        Err(TransportError::RateLimited(Duration::from_millis(5))),
        Ok(()),
    ]);

    let settings = settings();
    let prefs = prefs();
    let delivery = item(&path, MediaKind::Video, 4);
    let message = deliver(&transport, &settings, &prefs, &delivery)
        .await
        .expect("rate limits are absorbed");
    assert_eq!(message.kind, MediaKind::Video);
    assert_eq!(transport.attempts.lock().expect("attempts").len(), 4);
}

#[tokio::test]
async fn transient_errors_exhaust_budget_then_force_document_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture(&dir, "movie.mkv");
    let transport = FakeTransport::new();
    transport.script_outcomes(vec![
        Err(TransportError::Transient("net down".to_string())),
        Err(TransportError::Transient("net down".to_string())),
        Err(TransportError::Transient("net down".to_string())),
        Err(TransportError::Transient("net down".to_string())),
    ]);

    let settings = settings();
    let prefs = prefs();
    let delivery = item(&path, MediaKind::Video, 4);
    let outcome = deliver(&transport, &settings, &prefs, &delivery).await;
    assert!(matches!(outcome, Err(TransferError::Transport(_))));

    let attempts = transport.attempts.lock().expect("attempts").clone();
    // Three video attempts, then exactly one forced-document attempt.
    assert_eq!(
        attempts,
        vec![
            MediaKind::Video,
            MediaKind::Video,
            MediaKind::Video,
            MediaKind::Document
        ]
    );
}

#[tokio::test]
async fn format_rejected_photo_retries_as_document_immediately() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture(&dir, "shot.jpg");
    let transport = FakeTransport::new();
    transport.script_outcomes(vec![
        Err(TransportError::FormatRejected(
            "PHOTO_INVALID_DIMENSIONS".to_string(),
        )),
        Ok(()),
    ]);

    let settings = settings();
    let prefs = prefs();
    let delivery = item(&path, MediaKind::Photo, 4);
    let message = deliver(&transport, &settings, &prefs, &delivery)
        .await
        .expect("document fallback succeeds");
    assert_eq!(message.kind, MediaKind::Document);

    let attempts = transport.attempts.lock().expect("attempts").clone();
    assert_eq!(attempts, vec![MediaKind::Photo, MediaKind::Document]);
}

#[tokio::test]
async fn oversized_file_is_rejected_before_any_transport_call() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = fixture(&dir, "huge.mkv");
    let transport = FakeTransport::new();

    let settings = settings();
    let prefs = prefs();
    let delivery = item(&path, MediaKind::Video, BOT_CEILING_BYTES + 1);
    let outcome = deliver(&transport, &settings, &prefs, &delivery).await;

    let err = outcome.expect_err("oversized rejection");
    let message = err.to_string();
    assert!(matches!(err, TransferError::Oversized { .. }));
    assert!(message.contains("2.00 GiB"), "message was: {message}");
    assert!(transport.attempts.lock().expect("attempts").is_empty());
}

#[tokio::test]
async fn vanished_file_is_marked_missing_without_a_send() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("ghost.mkv");
    let transport = FakeTransport::new();

    let settings = settings();
    let prefs = prefs();
    let delivery = item(&path, MediaKind::Video, 4);
    let outcome = deliver(&transport, &settings, &prefs, &delivery).await;

    assert!(matches!(outcome, Err(TransferError::Missing(_))));
    assert!(transport.attempts.lock().expect("attempts").is_empty());
}
