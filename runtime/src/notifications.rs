//! Background notification delivery.
//!
//! The service enqueues [`Notification`]s on a bounded channel and returns
//! without waiting. A [`NotificationWorker`] drains the channel: conference
//! confirmations go to an [`EmailSender`], featured-speaker notifications
//! refresh the cached featured-speaker message. Failures are logged and
//! the worker moves on.

use crate::ConferenceService;
use conference_core::environment::{EmailError, EmailSender, Notification, NotificationError, NotificationQueue, SideFuture};
use conference_core::model::Conference;
use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Subject of the conference confirmation email.
pub const CONFIRMATION_SUBJECT: &str = "You created a new Conference!";

/// [`NotificationQueue`] backed by a bounded `tokio` channel.
#[derive(Clone, Debug)]
pub struct ChannelNotificationQueue {
    sender: mpsc::Sender<Notification>,
}

impl ChannelNotificationQueue {
    /// Create a queue holding at most `capacity` pending notifications.
    ///
    /// The receiver goes to [`NotificationWorker::run`].
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Notification>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }
}

impl NotificationQueue for ChannelNotificationQueue {
    fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.sender.try_send(notification).map_err(|err| match err {
            TrySendError::Full(_) => NotificationError::QueueFull,
            TrySendError::Closed(_) => NotificationError::Closed,
        })
    }
}

/// [`EmailSender`] that writes each message to the log instead of delivering it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEmailSender;

impl EmailSender for LogEmailSender {
    fn send<'a>(
        &'a self,
        to: &'a str,
        subject: &'a str,
        body: &'a str,
    ) -> SideFuture<'a, Result<(), EmailError>> {
        Box::pin(async move {
            tracing::info!(to, subject, body, "Email sent");
            Ok(())
        })
    }
}

/// Body of the confirmation email for `conference`.
#[must_use]
pub fn confirmation_body(conference: &Conference) -> String {
    let mut body = String::from("Hi, you have created a following conference:\r\n\r\n");
    let _ = write!(body, "name: {}\r\n", conference.name);
    if let Some(description) = &conference.description {
        let _ = write!(body, "description: {description}\r\n");
    }
    let _ = write!(body, "topics: {}\r\n", conference.topics.join(", "));
    let _ = write!(body, "city: {}\r\n", conference.city);
    if let Some(start) = conference.start_date {
        let _ = write!(body, "startDate: {start}\r\n");
    }
    if let Some(end) = conference.end_date {
        let _ = write!(body, "endDate: {end}\r\n");
    }
    let _ = write!(body, "maxAttendees: {}\r\n", conference.max_attendees);
    let _ = write!(body, "websafeKey: {}\r\n", conference.key);
    body
}

/// Consumes queued notifications.
pub struct NotificationWorker {
    service: ConferenceService,
    email: Arc<dyn EmailSender>,
}

impl NotificationWorker {
    /// Create a worker delivering through `email`.
    #[must_use]
    pub fn new(service: ConferenceService, email: Arc<dyn EmailSender>) -> Self {
        Self { service, email }
    }

    /// Process a single notification.
    pub async fn handle(&self, notification: Notification) {
        match notification {
            Notification::ConferenceCreated { email, conference } => {
                if email.is_empty() {
                    tracing::warn!(conference_key = %conference.key, "No email address for confirmation");
                    return;
                }
                let body = confirmation_body(&conference);
                if let Err(err) = self.email.send(&email, CONFIRMATION_SUBJECT, &body).await {
                    tracing::warn!(error = %err, conference_key = %conference.key, "Confirmation email failed");
                }
            }
            Notification::FeaturedSpeaker { speaker } => {
                if let Err(err) = self.service.refresh_featured_speaker(&speaker).await {
                    tracing::warn!(error = %err, speaker = %speaker, "Featured speaker refresh failed");
                }
            }
        }
    }

    /// Drain `receiver` until every sender is dropped.
    pub async fn run(self, receiver: mpsc::Receiver<Notification>) {
        self.run_until(receiver, std::future::pending()).await;
    }

    /// Drain `receiver` until every sender is dropped or `shutdown` resolves.
    ///
    /// On shutdown the channel is closed to new notifications and whatever
    /// is already queued is still handled.
    pub async fn run_until<F>(self, mut receiver: mpsc::Receiver<Notification>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tracing::info!("Notification worker started");
        let mut shutdown = std::pin::pin!(shutdown);
        loop {
            tokio::select! {
                received = receiver.recv() => match received {
                    Some(notification) => self.dispatch(notification).await,
                    None => break,
                },
                () = &mut shutdown => {
                    receiver.close();
                    while let Some(notification) = receiver.recv().await {
                        self.dispatch(notification).await;
                    }
                    break;
                }
            }
        }
        tracing::info!("Notification worker stopped");
    }

    async fn dispatch(&self, notification: Notification) {
        tracing::debug!(kind = notification.kind(), "Handling notification");
        self.handle(notification).await;
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::announcements::InMemoryAnnouncementCache;
    use conference_testing::{InMemoryEntityStore, RecordingEmailSender, RecordingNotificationQueue, fixtures, test_clock};

    fn service() -> ConferenceService {
        ConferenceService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(test_clock()),
            Arc::new(RecordingNotificationQueue::new()),
            Arc::new(InMemoryAnnouncementCache::new()),
        )
    }

    #[test]
    fn full_queue_reports_queue_full() {
        let (queue, _receiver) = ChannelNotificationQueue::new(1);
        let notification = Notification::FeaturedSpeaker {
            speaker: "Ferris".to_string(),
        };
        assert!(queue.enqueue(notification.clone()).is_ok());
        assert_eq!(queue.enqueue(notification), Err(NotificationError::QueueFull));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (queue, receiver) = ChannelNotificationQueue::new(4);
        drop(receiver);
        let result = queue.enqueue(Notification::FeaturedSpeaker {
            speaker: "Ferris".to_string(),
        });
        assert_eq!(result, Err(NotificationError::Closed));
    }

    #[test]
    fn confirmation_body_lists_the_details() {
        let conference = fixtures::conference("RustConf", 42);
        let body = confirmation_body(&conference);
        assert!(body.starts_with("Hi, you have created a following conference:\r\n\r\n"));
        assert!(body.contains("name: RustConf\r\n"));
        assert!(body.contains("maxAttendees: 42\r\n"));
    }

    #[tokio::test]
    async fn worker_sends_confirmation_emails() {
        let email = Arc::new(RecordingEmailSender::new());
        let worker = NotificationWorker::new(service(), email.clone());
        let (queue, receiver) = ChannelNotificationQueue::new(8);

        queue
            .enqueue(Notification::ConferenceCreated {
                email: "organizer@example.com".to_string(),
                conference: fixtures::conference("RustConf", 10),
            })
            .unwrap();
        drop(queue);
        worker.run(receiver).await;

        let sent = email.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "organizer@example.com");
        assert_eq!(sent[0].subject, CONFIRMATION_SUBJECT);
    }

    #[tokio::test]
    async fn failed_delivery_does_not_stop_the_worker() {
        let worker = NotificationWorker::new(service(), Arc::new(RecordingEmailSender::failing()));
        let (queue, receiver) = ChannelNotificationQueue::new(8);
        for _ in 0..3 {
            queue
                .enqueue(Notification::ConferenceCreated {
                    email: "organizer@example.com".to_string(),
                    conference: fixtures::conference("RustConf", 10),
                })
                .unwrap();
        }
        drop(queue);
        worker.run(receiver).await;
    }

    #[tokio::test]
    async fn shutdown_drains_what_is_already_queued() {
        let email = Arc::new(RecordingEmailSender::new());
        let worker = NotificationWorker::new(service(), email.clone());
        let (queue, receiver) = ChannelNotificationQueue::new(8);
        for name in ["First", "Second"] {
            queue
                .enqueue(Notification::ConferenceCreated {
                    email: "organizer@example.com".to_string(),
                    conference: fixtures::conference(name, 10),
                })
                .unwrap();
        }

        // the sender stays alive; only the shutdown signal ends the worker
        worker.run_until(receiver, std::future::ready(())).await;

        assert_eq!(email.sent().len(), 2);
        let late = queue.enqueue(Notification::FeaturedSpeaker {
            speaker: "Ferris".to_string(),
        });
        assert_eq!(late, Err(NotificationError::Closed));
    }

    #[tokio::test]
    async fn worker_refreshes_featured_speaker() {
        let service = service();
        let organizer = fixtures::caller("organizer");
        let key = service
            .create_conference(&organizer, fixtures::conference_form("RustConf", 10))
            .await
            .unwrap()
            .websafe_key
            .unwrap()
            .parse()
            .unwrap();
        for name in ["Intro", "Advanced"] {
            service
                .create_session(&organizer, fixtures::session_form(key, name, "Ferris", &["Lecture"], None))
                .await
                .unwrap();
        }

        let worker = NotificationWorker::new(service.clone(), Arc::new(LogEmailSender));
        worker
            .handle(Notification::FeaturedSpeaker {
                speaker: "Ferris".to_string(),
            })
            .await;
        assert!(service.get_featured_speaker().await.data.starts_with("Featured speaker: Ferris."));
    }
}
