//! Conference creation, updates and queries.

use crate::ConferenceService;
use crate::retry::retry_with_predicate;
use conference_core::environment::Notification;
use conference_core::error::ConferenceError;
use conference_core::filter::compile;
use conference_core::forms::{ConferenceForm, ConferenceForms, ConferenceQueryForms};
use conference_core::identity::CallerIdentity;
use conference_core::keys::{ConferenceKey, ProfileId};
use conference_core::model::Conference;
use conference_core::registration;
use conference_core::store::{Expectation, Mutation};
use std::collections::{HashMap, HashSet};

/// Message for an update attempted by someone other than the organizer.
pub const OWNER_ONLY: &str = "Only the owner can update the conference.";

impl ConferenceService {
    /// Create a conference organized by the caller.
    ///
    /// Every seat starts free. A confirmation email is queued for the
    /// caller; failing to queue it does not fail the creation.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a missing name, a negative
    ///   capacity or a malformed date
    /// - [`ConferenceError::Store`] on storage failure
    #[tracing::instrument(skip(self, caller, form), fields(user_id = %caller.user_id))]
    pub async fn create_conference(
        &self,
        caller: &CallerIdentity,
        form: ConferenceForm,
    ) -> Result<ConferenceForm, ConferenceError> {
        let conference = form.into_new_conference(ConferenceKey::new(), caller.user_id.clone())?;
        let (profile, profile_expected) = self.load_or_new_profile(caller).await?;

        let mut mutations = vec![Mutation::PutConference {
            conference: conference.clone(),
            expected: Expectation::Absent,
        }];
        if profile_expected == Expectation::Absent {
            mutations.push(Mutation::PutProfile {
                profile: profile.clone(),
                expected: profile_expected,
            });
        }
        self.store
            .commit(mutations)
            .await
            .map_err(|err| Self::note_conflict("create_conference", err))?;

        tracing::info!(conference_key = %conference.key, name = %conference.name, "Conference created");

        self.notify(Notification::ConferenceCreated {
            email: caller.email.clone(),
            conference: conference.clone(),
        });

        Ok(ConferenceForm::from_conference(
            &conference,
            Some(&profile.display_name),
        ))
    }

    /// Update the conference identified by `websafe_key`. Only its organizer may.
    ///
    /// Fields absent from the form are left unchanged. A new `maxAttendees`
    /// keeps the number of seats already taken.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key, a blank name,
    ///   a malformed date or a negative capacity
    /// - [`ConferenceError::NotFound`] if no such conference exists
    /// - [`ConferenceError::Forbidden`] if the caller is not the organizer
    /// - [`ConferenceError::Conflict`] if the new capacity is below the seats taken
    /// - [`ConferenceError::Store`] if contention outlasts the retry policy
    #[tracing::instrument(skip(self, caller, form), fields(user_id = %caller.user_id, conference_key = %websafe_key))]
    pub async fn update_conference(
        &self,
        caller: &CallerIdentity,
        websafe_key: &str,
        form: ConferenceForm,
    ) -> Result<ConferenceForm, ConferenceError> {
        let key: ConferenceKey = websafe_key.parse()?;

        let conference = retry_with_predicate(
            self.retry_policy.clone(),
            || self.try_update(caller, key, &form),
            ConferenceError::is_retryable,
        )
        .await?;

        tracing::info!("Conference updated");
        crate::announcements::spawn_announcement_refresh(self.clone());

        let organizer = self.display_name_of(&conference.organizer).await?;
        Ok(ConferenceForm::from_conference(&conference, organizer.as_deref()))
    }

    async fn try_update(
        &self,
        caller: &CallerIdentity,
        key: ConferenceKey,
        form: &ConferenceForm,
    ) -> Result<Conference, ConferenceError> {
        let stored = self
            .store
            .load_conference(key)
            .await?
            .ok_or_else(|| ConferenceError::conference_not_found(key))?;
        if stored.value.organizer != caller.user_id {
            return Err(ConferenceError::Forbidden(OWNER_ONLY.to_string()));
        }

        let expected = Expectation::At(stored.version);
        let mut conference = stored.value;
        form.apply_update(&mut conference)?;
        if let Some(max_attendees) = form.max_attendees {
            registration::resize(&mut conference, max_attendees)?;
        }

        self.store
            .commit(vec![Mutation::PutConference {
                conference: conference.clone(),
                expected,
            }])
            .await
            .map_err(|err| Self::note_conflict("update_conference", err))?;
        Ok(conference)
    }

    /// A single conference with its organizer's display name.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key
    /// - [`ConferenceError::NotFound`] if no such conference exists
    pub async fn get_conference(&self, websafe_key: &str) -> Result<ConferenceForm, ConferenceError> {
        let key: ConferenceKey = websafe_key.parse()?;
        let conference = self
            .store
            .load_conference(key)
            .await?
            .ok_or_else(|| ConferenceError::conference_not_found(key))?
            .into_inner();
        let organizer = self.display_name_of(&conference.organizer).await?;
        Ok(ConferenceForm::from_conference(&conference, organizer.as_deref()))
    }

    /// Conferences organized by the caller, ordered by name.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] on storage failure.
    pub async fn get_conferences_created(
        &self,
        caller: &CallerIdentity,
    ) -> Result<ConferenceForms, ConferenceError> {
        let conferences = self
            .store
            .conferences_by_organizer(caller.user_id.clone())
            .await?;
        let organizer = self.display_name_of(&caller.user_id).await?;
        Ok(ConferenceForms {
            items: conferences
                .iter()
                .map(|c| ConferenceForm::from_conference(c, organizer.as_deref()))
                .collect(),
        })
    }

    /// Run a filtered conference query.
    ///
    /// Results are ordered by the inequality field when there is one, then
    /// by name.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for an unknown field or operator, a
    ///   non-numeric value on a numeric field, or inequalities on two fields
    /// - [`ConferenceError::Store`] on storage failure
    #[tracing::instrument(skip(self, query), fields(filters = query.filters.len()))]
    pub async fn query_conferences(
        &self,
        query: ConferenceQueryForms,
    ) -> Result<ConferenceForms, ConferenceError> {
        let plan = compile(&query.filters)?;
        let conferences = self.store.query_conferences(&plan).await?;
        tracing::debug!(results = conferences.len(), "Conference query executed");
        self.with_organizer_names(&conferences).await
    }

    /// Conferences the caller is registered for, in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] on storage failure.
    pub async fn get_conferences_to_attend(
        &self,
        caller: &CallerIdentity,
    ) -> Result<ConferenceForms, ConferenceError> {
        let Some(profile) = self.store.load_profile(caller.user_id.clone()).await? else {
            return Ok(ConferenceForms::default());
        };
        let conferences = self
            .store
            .load_conferences(profile.value.conference_keys_to_attend)
            .await?;
        self.with_organizer_names(&conferences).await
    }

    async fn display_name_of(&self, user_id: &ProfileId) -> Result<Option<String>, ConferenceError> {
        Ok(self
            .store
            .load_profile(user_id.clone())
            .await?
            .map(|p| p.value.display_name))
    }

    async fn with_organizer_names(
        &self,
        conferences: &[Conference],
    ) -> Result<ConferenceForms, ConferenceError> {
        let organizers: Vec<ProfileId> = conferences
            .iter()
            .map(|c| c.organizer.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let names: HashMap<ProfileId, String> = self
            .store
            .load_profiles(organizers)
            .await?
            .into_iter()
            .map(|p| (p.user_id, p.display_name))
            .collect();

        Ok(ConferenceForms {
            items: conferences
                .iter()
                .map(|c| {
                    ConferenceForm::from_conference(c, names.get(&c.organizer).map(String::as_str))
                })
                .collect(),
        })
    }

    pub(crate) fn notify(&self, notification: Notification) {
        let kind = notification.kind();
        match self.notifications.enqueue(notification) {
            Ok(()) => crate::metrics::NotificationMetrics::record_enqueued(kind),
            Err(err) => {
                crate::metrics::NotificationMetrics::record_dropped();
                tracing::warn!(kind, error = %err, "Notification dropped");
            }
        }
    }
}
