//! Cached announcements: the nearly-sold-out banner and the featured speaker.
//!
//! Both are recomputed from the store and written to an
//! [`AnnouncementCache`]. Readers see whatever the last refresh wrote, so
//! the values are eventually consistent with registrations.

use crate::ConferenceService;
use conference_core::environment::{ANNOUNCEMENTS_KEY, AnnouncementCache, FEATURED_SPEAKER_KEY, SideFuture};
use conference_core::error::ConferenceError;
use conference_core::filter::{ConferenceField, FilterValue, Operator, Predicate, QueryPlan};
use conference_core::forms::StringMessage;
use conference_core::store::SessionQuery;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Upper bound (inclusive) of free seats for a conference to count as nearly sold out.
pub const NEARLY_SOLD_OUT_SEATS: i64 = 5;

/// Prefix of the nearly-sold-out announcement.
pub const NEARLY_SOLD_OUT_PREFIX: &str =
    "Last chance to attend! The following conferences are nearly sold out: ";

/// Process-local [`AnnouncementCache`].
#[derive(Debug, Default)]
pub struct InMemoryAnnouncementCache {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryAnnouncementCache {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl AnnouncementCache for InMemoryAnnouncementCache {
    fn get<'a>(&'a self, key: &'a str) -> SideFuture<'a, Option<String>> {
        Box::pin(async move { self.entries.read().await.get(key).cloned() })
    }

    fn set<'a>(&'a self, key: &'a str, value: String) -> SideFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.insert(key.to_string(), value);
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> SideFuture<'a, ()> {
        Box::pin(async move {
            self.entries.write().await.remove(key);
        })
    }
}

fn nearly_sold_out_plan() -> Result<QueryPlan, ConferenceError> {
    let seats = |operator, value| {
        Predicate::new(
            ConferenceField::SeatsAvailable,
            operator,
            FilterValue::Integer(value),
        )
    };
    QueryPlan::from_predicates(vec![
        seats(Operator::Gt, 0),
        seats(Operator::LtEq, NEARLY_SOLD_OUT_SEATS),
    ])
    .map_err(ConferenceError::from)
}

impl ConferenceService {
    /// Recompute the nearly-sold-out announcement and store it in the cache.
    ///
    /// Returns the announcement, or `None` (and clears the cache entry)
    /// when no conference has between one and five free seats.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the query fails.
    pub async fn refresh_announcements(&self) -> Result<Option<String>, ConferenceError> {
        let plan = nearly_sold_out_plan()?;
        let conferences = self.store.query_conferences(&plan).await?;
        crate::metrics::AnnouncementMetrics::record_nearly_sold_out(conferences.len());

        if conferences.is_empty() {
            self.announcements.delete(ANNOUNCEMENTS_KEY).await;
            return Ok(None);
        }

        let names: Vec<&str> = conferences.iter().map(|c| c.name.as_str()).collect();
        let announcement = format!("{NEARLY_SOLD_OUT_PREFIX}{}", names.join(", "));
        self.announcements
            .set(ANNOUNCEMENTS_KEY, announcement.clone())
            .await;
        tracing::debug!(count = conferences.len(), "Announcement refreshed");
        Ok(Some(announcement))
    }

    /// The cached announcement, or an empty string.
    pub async fn get_announcement(&self) -> StringMessage {
        StringMessage {
            data: self
                .announcements
                .get(ANNOUNCEMENTS_KEY)
                .await
                .unwrap_or_default(),
        }
    }

    /// Store the featured-speaker message for `speaker`.
    ///
    /// Nothing is written unless the speaker has more than one session.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] if the session query fails.
    pub async fn refresh_featured_speaker(&self, speaker: &str) -> Result<Option<String>, ConferenceError> {
        let sessions = self
            .store
            .query_sessions(&SessionQuery::by_speaker(speaker))
            .await?;
        if sessions.len() <= 1 {
            return Ok(None);
        }

        let names: Vec<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
        let message = format!("Featured speaker: {speaker}. Sessions: {}", names.join(", "));
        self.announcements
            .set(FEATURED_SPEAKER_KEY, message.clone())
            .await;
        tracing::info!(speaker, sessions = sessions.len(), "Featured speaker updated");
        Ok(Some(message))
    }
}

/// Recompute the announcement on a detached task.
///
/// A failed refresh is logged; the triggering write has already committed.
pub fn spawn_announcement_refresh(service: ConferenceService) {
    tokio::spawn(async move {
        if let Err(err) = service.refresh_announcements().await {
            tracing::warn!(error = %err, "Announcement refresh failed");
        }
    });
}

/// Recompute the announcement every `interval`, starting immediately.
pub fn spawn_periodic_refresh(service: ConferenceService, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(err) = service.refresh_announcements().await {
                tracing::warn!(error = %err, "Periodic announcement refresh failed");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use conference_testing::{InMemoryEntityStore, RecordingNotificationQueue, fixtures, test_clock};
    use std::sync::Arc;

    fn service() -> ConferenceService {
        ConferenceService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(test_clock()),
            Arc::new(RecordingNotificationQueue::new()),
            Arc::new(InMemoryAnnouncementCache::new()),
        )
    }

    #[tokio::test]
    async fn cache_round_trips_and_deletes() {
        let cache = InMemoryAnnouncementCache::new();
        assert_eq!(cache.get("k").await, None);
        cache.set("k", "v".to_string()).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("v"));
        cache.delete("k").await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn lists_only_conferences_with_one_to_five_seats() {
        let service = service();
        let organizer = fixtures::caller("organizer");
        for (name, max) in [("Tiny", 3), ("Full", 0), ("Huge", 500), ("Small", 5)] {
            service
                .create_conference(&organizer, fixtures::conference_form(name, max))
                .await
                .unwrap();
        }

        let announcement = service.refresh_announcements().await.unwrap().unwrap();
        assert_eq!(announcement, format!("{NEARLY_SOLD_OUT_PREFIX}Tiny, Small"));
        assert_eq!(service.get_announcement().await.data, announcement);
    }

    #[tokio::test]
    async fn clears_the_entry_when_nothing_is_nearly_sold_out() {
        let service = service();
        let organizer = fixtures::caller("organizer");
        let key = service
            .create_conference(&organizer, fixtures::conference_form("Solo", 1))
            .await
            .unwrap()
            .websafe_key
            .unwrap();
        assert!(service.refresh_announcements().await.unwrap().is_some());

        service
            .register_for_conference(&fixtures::caller("ada"), &key)
            .await
            .unwrap();
        assert_eq!(service.refresh_announcements().await.unwrap(), None);
        assert_eq!(service.get_announcement().await.data, "");
    }

    #[tokio::test]
    async fn featured_speaker_needs_two_sessions() {
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

        service
            .create_session(&organizer, fixtures::session_form(key, "Intro", "Ferris", &["Lecture"], None))
            .await
            .unwrap();
        assert_eq!(service.refresh_featured_speaker("Ferris").await.unwrap(), None);

        service
            .create_session(&organizer, fixtures::session_form(key, "Advanced", "Ferris", &["Lecture"], None))
            .await
            .unwrap();
        let message = service.refresh_featured_speaker("Ferris").await.unwrap().unwrap();
        assert!(message.starts_with("Featured speaker: Ferris. Sessions: "));
        assert!(message.contains("Intro"));
        assert!(message.contains("Advanced"));
        assert_eq!(service.get_featured_speaker().await.data, message);
    }
}
