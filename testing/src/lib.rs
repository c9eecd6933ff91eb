//! # Conference Testing
//!
//! Testing utilities for Conference Central.
//!
//! This crate provides:
//! - [`InMemoryEntityStore`]: an `EntityStore` with real optimistic
//!   versioning and atomic commits, also usable for local runs
//! - Mock environment implementations ([`mocks`])
//! - Entity and form builders ([`fixtures`])
//! - Proptest strategies ([`properties`])
//!
//! ## Example
//!
//! ```ignore
//! use conference_testing::{fixtures, InMemoryEntityStore, RecordingNotificationQueue, test_clock};
//!
//! #[tokio::test]
//! async fn registration_takes_a_seat() {
//!     let service = service_with(InMemoryEntityStore::new(), test_clock());
//!     let organizer = fixtures::caller("organizer");
//!     let created = service.create_conference(&organizer, fixtures::conference_form("RustConf", 2)).await?;
//!     assert!(service.register_for_conference(&fixtures::caller("ada"), key).await?);
//! }
//! ```

pub mod fixtures;
pub mod mocks;
pub mod properties;
pub mod store;

pub use mocks::{
    FixedClock, RecordingEmailSender, RecordingNotificationQueue, SentEmail, test_clock,
};
pub use store::InMemoryEntityStore;

/// Install a `tracing` subscriber for test output, once per process.
///
/// Honors `RUST_LOG`; repeated calls are no-ops.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_test_writer()
        .try_init();
}
