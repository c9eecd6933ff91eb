//! Side-channel dependencies injected into the conference service.
//!
//! Everything here is best effort from the service's point of view: a failed
//! notification or cache write is logged and counted, never allowed to undo
//! or fail the write that triggered it.

use crate::model::Conference;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Background work requested by a primary write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Send a creation confirmation to the organizer.
    ConferenceCreated {
        /// Organizer's email address.
        email: String,
        /// The conference as created.
        conference: Conference,
    },
    /// Recompute the featured-speaker announcement for `speaker`.
    FeaturedSpeaker {
        /// Speaker with more than one session.
        speaker: String,
    },
}

impl Notification {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ConferenceCreated { .. } => "conference_created",
            Self::FeaturedSpeaker { .. } => "featured_speaker",
        }
    }
}

/// Failure to hand a notification to the queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// The queue is at capacity.
    #[error("Notification queue is full")]
    QueueFull,
    /// The consumer is gone.
    #[error("Notification queue is closed")]
    Closed,
}

/// Fire-and-forget queue for [`Notification`]s.
pub trait NotificationQueue: Send + Sync {
    /// Enqueue without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`NotificationError`] when the queue cannot accept the item.
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError>;
}

/// Boxed future returned by side-channel traits.
pub type SideFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Cache key of the nearly-sold-out announcement.
pub const ANNOUNCEMENTS_KEY: &str = "RECENT_ANNOUNCEMENTS";

/// Cache key of the featured-speaker announcement.
pub const FEATURED_SPEAKER_KEY: &str = "FEATURED_SPEAKER";

/// Key-value cache holding announcement strings. Misses are normal.
pub trait AnnouncementCache: Send + Sync {
    /// Read a value.
    fn get<'a>(&'a self, key: &'a str) -> SideFuture<'a, Option<String>>;

    /// Store a value, replacing any previous one.
    fn set<'a>(&'a self, key: &'a str, value: String) -> SideFuture<'a, ()>;

    /// Remove a value if present.
    fn delete<'a>(&'a self, key: &'a str) -> SideFuture<'a, ()>;
}

/// Failure to deliver an email.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Email delivery failed: {0}")]
pub struct EmailError(pub String);

/// Outbound email.
pub trait EmailSender: Send + Sync {
    /// Deliver one message.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] when delivery fails.
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> SideFuture<'a, Result<(), EmailError>>;
}
