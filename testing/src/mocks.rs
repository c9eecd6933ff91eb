//! Mock implementations of the environment traits.

use chrono::{DateTime, Utc};
use conference_core::environment::{
    Clock, EmailError, EmailSender, Notification, NotificationError, NotificationQueue, SideFuture,
};
use std::sync::{Mutex, PoisonError};

/// Fixed clock for deterministic tests.
///
/// # Example
///
/// ```
/// use conference_testing::mocks::FixedClock;
/// use conference_core::environment::Clock;
/// use chrono::Utc;
///
/// let clock = FixedClock::new(Utc::now());
/// assert_eq!(clock.now(), clock.now());
/// ```
#[derive(Debug)]
pub struct FixedClock {
    time: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Create a clock stuck at `time`.
    #[must_use]
    pub const fn new(time: DateTime<Utc>) -> Self {
        Self {
            time: Mutex::new(time),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: chrono::Duration) {
        let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
        *time += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.time.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A fixed clock at 2025-01-01 00:00:00 UTC.
#[must_use]
pub fn test_clock() -> FixedClock {
    FixedClock::new(DateTime::<Utc>::UNIX_EPOCH + chrono::Duration::days(20_089))
}

/// Notification queue that records everything it is given.
#[derive(Debug, Default)]
pub struct RecordingNotificationQueue {
    items: Mutex<Vec<Notification>>,
    reject: bool,
}

impl RecordingNotificationQueue {
    /// A queue that accepts everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A queue that refuses everything with [`NotificationError::QueueFull`].
    #[must_use]
    pub fn rejecting() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
            reject: true,
        }
    }

    /// Everything accepted so far.
    #[must_use]
    pub fn notifications(&self) -> Vec<Notification> {
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl NotificationQueue for RecordingNotificationQueue {
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        if self.reject {
            return Err(NotificationError::QueueFull);
        }
        self.items
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification);
        Ok(())
    }
}

/// A message captured by [`RecordingEmailSender`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentEmail {
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub body: String,
}

/// Email sender that records messages instead of delivering them.
#[derive(Debug, Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<SentEmail>>,
    fail: bool,
}

impl RecordingEmailSender {
    /// A sender that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender that always fails.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Messages sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EmailSender for RecordingEmailSender {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> SideFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            if self.fail {
                return Err(EmailError(format!("refusing to send to {to}")));
            }
            self.sent
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(SentEmail {
                    to: to.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                });
            Ok(())
        })
    }
}
