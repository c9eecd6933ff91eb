//! # Conference Runtime
//!
//! The imperative shell around `conference-core`.
//!
//! [`ConferenceService`] exposes every conference operation. It loads
//! entities through an [`EntityStore`], delegates decisions to the pure
//! functions in `conference-core` and writes the results back.
//!
//! ## Core Components
//!
//! - **Registration engine**: register/unregister as one optimistic
//!   read-modify-write over the profile and the conference, re-run with
//!   backoff on concurrency conflicts
//! - **Wishlist manager**: uniqueness enforced by the store's conditional insert
//! - **Queries**: conference filter queries, session queries, profiles
//! - **Side channels**: announcement cache refresh and background
//!   notifications, never able to fail the primary write
//!
//! ## Example
//!
//! ```ignore
//! use conference_runtime::{ConferenceService, notifications::ChannelNotificationQueue};
//!
//! let (queue, receiver) = ChannelNotificationQueue::new(1024);
//! let service = ConferenceService::new(store, Arc::new(SystemClock), Arc::new(queue), cache);
//!
//! let created = service.create_conference(&caller, form).await?;
//! let registered = service.register_for_conference(&caller, &key).await?;
//! ```

use conference_core::environment::{AnnouncementCache, Clock, NotificationQueue};
use conference_core::error::ConferenceError;
use conference_core::store::{EntityStore, StoreError};
use std::sync::Arc;

pub mod announcements;
pub mod conferences;
pub mod metrics;
pub mod notifications;
pub mod profiles;
pub mod registration;
pub mod retry;
pub mod sessions;
pub mod wishlist;

pub use announcements::InMemoryAnnouncementCache;
pub use notifications::{ChannelNotificationQueue, LogEmailSender, NotificationWorker};
pub use retry::RetryPolicy;

/// Entry point for every conference operation.
///
/// Cheap to clone; all dependencies are shared.
#[derive(Clone)]
pub struct ConferenceService {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    notifications: Arc<dyn NotificationQueue>,
    announcements: Arc<dyn AnnouncementCache>,
    retry_policy: RetryPolicy,
}

impl ConferenceService {
    /// Assemble a service from its dependencies with the default retry policy.
    #[must_use]
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationQueue>,
        announcements: Arc<dyn AnnouncementCache>,
    ) -> Self {
        Self {
            store,
            clock,
            notifications,
            announcements,
            retry_policy: RetryPolicy::default(),
        }
    }

    /// Replace the retry policy used for optimistic commits.
    #[must_use]
    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    /// Check the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] when the ping fails.
    pub async fn ready(&self) -> Result<(), ConferenceError> {
        self.store.ping().await.map_err(ConferenceError::from)
    }

    fn note_conflict(operation: &'static str, err: StoreError) -> ConferenceError {
        if matches!(err, StoreError::ConcurrencyConflict { .. }) {
            crate::metrics::RegistrationMetrics::record_conflict(operation);
        }
        ConferenceError::Store(err)
    }
}

/// Reject an empty required parameter.
pub(crate) fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ConferenceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConferenceError::BadRequest(format!("'{name}' is required")));
    }
    Ok(trimmed)
}

/// Metric label for the outcome of an operation.
pub(crate) fn outcome_label<T>(result: &Result<T, ConferenceError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(err) if err.is_retryable() => "contention",
        Err(ConferenceError::Conflict(_)) => "rejected",
        Err(ConferenceError::NotFound(_)) => "not_found",
        Err(_) => "error",
    }
}
