//! Registration engine.
//!
//! Each operation is one optimistic read-modify-write: read the conference
//! and the caller's profile with their versions, apply the pure transition
//! from `conference_core::registration`, then commit both entities in a
//! single batch that asserts the versions read. A concurrent writer makes
//! the commit fail with a conflict and the whole attempt is re-run.

use crate::ConferenceService;
use crate::retry::retry_with_predicate;
use crate::{announcements, outcome_label};
use conference_core::error::ConferenceError;
use conference_core::identity::CallerIdentity;
use conference_core::keys::ConferenceKey;
use conference_core::registration;
use conference_core::store::{Expectation, Mutation};
use std::time::Instant;

impl ConferenceService {
    /// Take a seat at the conference identified by `websafe_key`.
    ///
    /// Returns `true` once the seat is held. Seats are never oversold and a
    /// user never appears twice in a conference's attendee set, whatever
    /// the interleaving of concurrent requests.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key
    /// - [`ConferenceError::NotFound`] if no such conference exists
    /// - [`ConferenceError::Conflict`] if already registered or no seats are left
    /// - [`ConferenceError::Store`] if contention outlasts the retry policy
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id, conference_key = %websafe_key))]
    pub async fn register_for_conference(
        &self,
        caller: &CallerIdentity,
        websafe_key: &str,
    ) -> Result<bool, ConferenceError> {
        let key: ConferenceKey = websafe_key.parse()?;
        let started = Instant::now();

        let result = retry_with_predicate(
            self.retry_policy.clone(),
            || self.try_register(caller, key),
            ConferenceError::is_retryable,
        )
        .await;

        crate::metrics::RegistrationMetrics::record_registration(
            outcome_label(&result),
            started.elapsed(),
        );
        match &result {
            Ok(()) => {
                tracing::info!("Registered for conference");
                announcements::spawn_announcement_refresh(self.clone());
            }
            Err(err) => tracing::debug!(error = %err, "Registration rejected"),
        }
        result.map(|()| true)
    }

    /// Give up the caller's seat at the conference identified by `websafe_key`.
    ///
    /// Returns `false` if the caller was not registered, in which case
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a malformed key
    /// - [`ConferenceError::NotFound`] if no such conference exists
    /// - [`ConferenceError::Store`] if contention outlasts the retry policy
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id, conference_key = %websafe_key))]
    pub async fn unregister_from_conference(
        &self,
        caller: &CallerIdentity,
        websafe_key: &str,
    ) -> Result<bool, ConferenceError> {
        let key: ConferenceKey = websafe_key.parse()?;

        let result = retry_with_predicate(
            self.retry_policy.clone(),
            || self.try_unregister(caller, key),
            ConferenceError::is_retryable,
        )
        .await;

        let label = match &result {
            Ok(false) => "noop",
            other => outcome_label(other),
        };
        crate::metrics::RegistrationMetrics::record_unregistration(label);

        if matches!(result, Ok(true)) {
            tracing::info!("Unregistered from conference");
            announcements::spawn_announcement_refresh(self.clone());
        }
        result
    }

    async fn try_register(
        &self,
        caller: &CallerIdentity,
        key: ConferenceKey,
    ) -> Result<(), ConferenceError> {
        let conference = self
            .store
            .load_conference(key)
            .await?
            .ok_or_else(|| ConferenceError::conference_not_found(key))?;
        let (mut profile, profile_expected) = self.load_or_new_profile(caller).await?;
        let conference_expected = Expectation::At(conference.version);
        let mut conference = conference.value;

        registration::register(&mut profile, &mut conference)?;

        self.store
            .commit(vec![
                Mutation::PutProfile {
                    profile,
                    expected: profile_expected,
                },
                Mutation::PutConference {
                    conference,
                    expected: conference_expected,
                },
            ])
            .await
            .map_err(|err| Self::note_conflict("register", err))
    }

    async fn try_unregister(
        &self,
        caller: &CallerIdentity,
        key: ConferenceKey,
    ) -> Result<bool, ConferenceError> {
        let conference = self
            .store
            .load_conference(key)
            .await?
            .ok_or_else(|| ConferenceError::conference_not_found(key))?;
        let (mut profile, profile_expected) = self.load_or_new_profile(caller).await?;
        let conference_expected = Expectation::At(conference.version);
        let mut conference = conference.value;

        if !registration::unregister(&mut profile, &mut conference) {
            return Ok(false);
        }

        self.store
            .commit(vec![
                Mutation::PutProfile {
                    profile,
                    expected: profile_expected,
                },
                Mutation::PutConference {
                    conference,
                    expected: conference_expected,
                },
            ])
            .await
            .map_err(|err| Self::note_conflict("unregister", err))?;
        Ok(true)
    }
}
