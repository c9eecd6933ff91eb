//! Session creation and session queries.

use crate::conferences::OWNER_ONLY;
use crate::{ConferenceService, required};
use chrono::NaiveTime;
use conference_core::environment::{FEATURED_SPEAKER_KEY, Notification};
use conference_core::error::ConferenceError;
use conference_core::forms::{SessionForm, SessionForms, StringMessage};
use conference_core::identity::CallerIdentity;
use conference_core::keys::{ConferenceKey, SessionKey};
use conference_core::model::Session;
use conference_core::store::SessionQuery;

/// Latest start time accepted by [`ConferenceService::problematic_query`].
fn problematic_start_limit() -> NaiveTime {
    NaiveTime::from_hms_opt(19, 0, 0).unwrap_or_default()
}

/// Session type excluded by [`ConferenceService::problematic_query`].
pub const PROBLEMATIC_EXCLUDED_TYPE: &str = "Workshop";

fn sessions_to_forms(sessions: &[Session]) -> SessionForms {
    SessionForms {
        items: sessions.iter().map(SessionForm::from_session).collect(),
    }
}

impl ConferenceService {
    /// Add a session to a conference organized by the caller.
    ///
    /// The speaker defaults to the caller's nickname. When the speaker now
    /// has more than one session across all conferences, a featured-speaker
    /// refresh is queued.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a missing or malformed
    ///   `confwebsafeKey`, a missing name or a malformed date or time
    /// - [`ConferenceError::NotFound`] if the conference does not exist
    /// - [`ConferenceError::Forbidden`] if the caller is not the organizer
    #[tracing::instrument(skip(self, caller, form), fields(user_id = %caller.user_id))]
    pub async fn create_session(
        &self,
        caller: &CallerIdentity,
        form: SessionForm,
    ) -> Result<SessionForm, ConferenceError> {
        let raw_key = form.conf_websafe_key.clone().unwrap_or_default();
        let key: ConferenceKey = required("confwebsafeKey", &raw_key)?.parse()?;

        let conference = self
            .store
            .load_conference(key)
            .await?
            .ok_or_else(|| ConferenceError::conference_not_found(key))?
            .into_inner();
        if conference.organizer != caller.user_id {
            return Err(ConferenceError::Forbidden(OWNER_ONLY.to_string()));
        }

        let session = form.into_new_session(SessionKey::new(), key, &caller.nickname, self.clock.now())?;
        self.store.insert_session(session.clone()).await?;
        tracing::info!(session_key = %session.key, speaker = %session.speaker, "Session created");

        let speaker_sessions = self
            .store
            .query_sessions(&SessionQuery::by_speaker(session.speaker.clone()))
            .await?;
        if speaker_sessions.len() > 1 {
            self.notify(Notification::FeaturedSpeaker {
                speaker: session.speaker.clone(),
            });
        }

        Ok(SessionForm::from_session(&session))
    }

    /// Every session of a conference, in creation order.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key
    /// - [`ConferenceError::NotFound`] if the conference does not exist
    pub async fn get_conference_sessions(
        &self,
        websafe_key: &str,
    ) -> Result<SessionForms, ConferenceError> {
        let key = self.existing_conference_key(websafe_key).await?;
        let sessions = self
            .store
            .query_sessions(&SessionQuery::for_conference(key))
            .await?;
        Ok(sessions_to_forms(&sessions))
    }

    /// Sessions of a conference carrying the given type tag.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a missing key or type
    /// - [`ConferenceError::NotFound`] if the conference does not exist
    pub async fn get_conference_sessions_by_type(
        &self,
        websafe_key: &str,
        type_of_session: &str,
    ) -> Result<SessionForms, ConferenceError> {
        let type_of_session = required("typeOfSession", type_of_session)?;
        let key = self.existing_conference_key(websafe_key).await?;
        let sessions = self
            .store
            .query_sessions(&SessionQuery::for_conference(key).with_type(type_of_session))
            .await?;
        Ok(sessions_to_forms(&sessions))
    }

    /// Sessions given by `speaker` across all conferences.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a missing speaker.
    pub async fn get_sessions_by_speaker(&self, speaker: &str) -> Result<SessionForms, ConferenceError> {
        let speaker = required("speaker", speaker)?;
        let sessions = self
            .store
            .query_sessions(&SessionQuery::by_speaker(speaker))
            .await?;
        Ok(sessions_to_forms(&sessions))
    }

    /// Sessions of a conference that start no later than 19:00 and are not
    /// workshops. Sessions without a start time are excluded.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key
    /// - [`ConferenceError::NotFound`] if the conference does not exist
    pub async fn problematic_query(&self, websafe_key: &str) -> Result<SessionForms, ConferenceError> {
        let key = self.existing_conference_key(websafe_key).await?;
        let query = SessionQuery::for_conference(key).starting_at_or_before(problematic_start_limit());
        let sessions: Vec<Session> = self
            .store
            .query_sessions(&query)
            .await?
            .into_iter()
            .filter(|s| !s.has_type(PROBLEMATIC_EXCLUDED_TYPE))
            .collect();
        Ok(sessions_to_forms(&sessions))
    }

    /// The cached featured-speaker message, or an empty string.
    pub async fn get_featured_speaker(&self) -> StringMessage {
        StringMessage {
            data: self
                .announcements
                .get(FEATURED_SPEAKER_KEY)
                .await
                .unwrap_or_default(),
        }
    }

    async fn existing_conference_key(&self, websafe_key: &str) -> Result<ConferenceKey, ConferenceError> {
        let key: ConferenceKey = required("websafeConferenceKey", websafe_key)?.parse()?;
        if self.store.load_conference(key).await?.is_none() {
            return Err(ConferenceError::conference_not_found(key));
        }
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::ConferenceService;
    use crate::announcements::InMemoryAnnouncementCache;
    use conference_core::environment::Notification;
    use conference_core::error::ErrorKind;
    use conference_core::forms::SessionForm;
    use conference_core::keys::ConferenceKey;
    use conference_testing::{InMemoryEntityStore, RecordingNotificationQueue, fixtures, test_clock};
    use std::sync::Arc;

    struct Harness {
        service: ConferenceService,
        queue: Arc<RecordingNotificationQueue>,
        key: ConferenceKey,
    }

    async fn harness() -> Harness {
        let queue = Arc::new(RecordingNotificationQueue::new());
        let service = ConferenceService::new(
            Arc::new(InMemoryEntityStore::new()),
            Arc::new(test_clock()),
            queue.clone(),
            Arc::new(InMemoryAnnouncementCache::new()),
        );
        let key = service
            .create_conference(&fixtures::caller("organizer"), fixtures::conference_form("RustConf", 100))
            .await
            .unwrap()
            .websafe_key
            .unwrap()
            .parse()
            .unwrap();
        Harness { service, queue, key }
    }

    fn featured(queue: &RecordingNotificationQueue) -> Vec<String> {
        queue
            .notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::FeaturedSpeaker { speaker } => Some(speaker),
                Notification::ConferenceCreated { .. } => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn second_session_by_a_speaker_queues_featured_refresh() {
        let h = harness().await;
        let organizer = fixtures::caller("organizer");

        h.service
            .create_session(&organizer, fixtures::session_form(h.key, "Intro", "Ferris", &["Lecture"], None))
            .await
            .unwrap();
        assert!(featured(&h.queue).is_empty());

        h.service
            .create_session(&organizer, fixtures::session_form(h.key, "Deep dive", "Ferris", &["Workshop"], None))
            .await
            .unwrap();
        assert_eq!(featured(&h.queue), ["Ferris"]);
    }

    #[tokio::test]
    async fn speaker_defaults_to_nickname() {
        let h = harness().await;
        let created = h
            .service
            .create_session(
                &fixtures::caller("organizer"),
                SessionForm {
                    name: Some("Untitled".to_string()),
                    conf_websafe_key: Some(h.key.to_string()),
                    ..SessionForm::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(created.speaker.as_deref(), Some("organizer"));
        assert_eq!(
            created.type_of_session,
            Some(vec!["Workshop".to_string(), "Lecture".to_string()])
        );
    }

    #[tokio::test]
    async fn non_organizer_cannot_add_sessions() {
        let h = harness().await;
        let err = h
            .service
            .create_session(
                &fixtures::caller("mallory"),
                fixtures::session_form(h.key, "Intro", "Ferris", &["Lecture"], None),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn missing_conference_key_is_a_bad_request() {
        let h = harness().await;
        let err = h
            .service
            .create_session(
                &fixtures::caller("organizer"),
                SessionForm {
                    name: Some("Orphan".to_string()),
                    ..SessionForm::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[tokio::test]
    async fn problematic_query_excludes_late_untimed_and_workshops() {
        let h = harness().await;
        let organizer = fixtures::caller("organizer");
        for (name, types, start) in [
            ("Morning lecture", &["Lecture"][..], Some("09:00")),
            ("Evening keynote", &["Keynote"][..], Some("19:00")),
            ("Night owl", &["Lecture"][..], Some("21:30")),
            ("Hands on", &["Workshop"][..], Some("10:00")),
            ("Someday", &["Lecture"][..], None),
        ] {
            h.service
                .create_session(&organizer, fixtures::session_form(h.key, name, "Ferris", types, start))
                .await
                .unwrap();
        }

        let result = h.service.problematic_query(&h.key.to_string()).await.unwrap();
        let mut names: Vec<_> = result.items.iter().filter_map(|s| s.name.clone()).collect();
        names.sort();
        assert_eq!(names, ["Evening keynote", "Morning lecture"]);
    }

    #[tokio::test]
    async fn sessions_by_type_and_speaker() {
        let h = harness().await;
        let organizer = fixtures::caller("organizer");
        h.service
            .create_session(&organizer, fixtures::session_form(h.key, "Intro", "Ferris", &["Lecture"], None))
            .await
            .unwrap();
        h.service
            .create_session(&organizer, fixtures::session_form(h.key, "Lab", "Corro", &["Workshop"], None))
            .await
            .unwrap();

        let key = h.key.to_string();
        let workshops = h.service.get_conference_sessions_by_type(&key, "Workshop").await.unwrap();
        assert_eq!(workshops.items.len(), 1);
        assert_eq!(workshops.items[0].name.as_deref(), Some("Lab"));

        let by_ferris = h.service.get_sessions_by_speaker("Ferris").await.unwrap();
        assert_eq!(by_ferris.items.len(), 1);
        assert_eq!(h.service.get_conference_sessions(&key).await.unwrap().items.len(), 2);

        let err = h.service.get_conference_sessions_by_type(&key, " ").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        let missing = ConferenceKey::new().to_string();
        let err = h.service.get_conference_sessions(&missing).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn featured_speaker_is_empty_until_refreshed() {
        let h = harness().await;
        assert_eq!(h.service.get_featured_speaker().await.data, "");
    }
}
