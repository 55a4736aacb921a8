//! media-courier - Upload delivery pipeline for Telegram
//!
//! Takes a directory of finished downloads and turns each file into one or
//! more delivered Telegram messages: filenames and captions are reshaped per
//! user preferences, related parts are batched into albums, every delivery is
//! replicated to the configured dump chats, and rate limits and transient
//! transport failures are absorbed without aborting the run.

/// Configuration and tuning constants
pub mod config;
/// Consumed media/caption services and reference implementations
pub mod probe;
/// Run report and completion policy
pub mod report;
/// Scripted fakes for unit and integration tests
pub mod testing;
/// Transport abstraction and the Telegram implementation
pub mod transport;
/// The upload pipeline itself
pub mod upload;
pub mod utils;
