//! Profile operations and lazy profile creation.

use crate::ConferenceService;
use crate::retry::retry_with_predicate;
use conference_core::error::ConferenceError;
use conference_core::forms::{ProfileForm, ProfileMiniForm};
use conference_core::identity::CallerIdentity;
use conference_core::model::Profile;
use conference_core::store::{Expectation, Mutation, StoreError};

impl ConferenceService {
    /// Load the caller's profile, or build a fresh one if none is stored.
    ///
    /// The returned [`Expectation`] is what a commit of the profile must
    /// assert: `Absent` for a profile that only exists in memory so far.
    pub(crate) async fn load_or_new_profile(
        &self,
        caller: &CallerIdentity,
    ) -> Result<(Profile, Expectation), ConferenceError> {
        let stored = self.store.load_profile(caller.user_id.clone()).await?;
        Ok(stored.map_or_else(
            || {
                (
                    Profile::new(caller.user_id.clone(), &caller.nickname, &caller.email),
                    Expectation::Absent,
                )
            },
            |versioned| (versioned.value, Expectation::At(versioned.version)),
        ))
    }

    /// The caller's profile, created and stored on first access.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] on storage failure.
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn get_profile(&self, caller: &CallerIdentity) -> Result<ProfileForm, ConferenceError> {
        let profile = self.ensure_profile(caller).await?;
        Ok(ProfileForm::from_profile(&profile))
    }

    /// Update the caller's display name and/or tee-shirt size.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for an unknown tee-shirt size
    /// - [`ConferenceError::Store`] on storage failure
    #[tracing::instrument(skip(self, caller, form), fields(user_id = %caller.user_id))]
    pub async fn save_profile(
        &self,
        caller: &CallerIdentity,
        form: ProfileMiniForm,
    ) -> Result<ProfileForm, ConferenceError> {
        let profile = retry_with_predicate(
            self.retry_policy.clone(),
            || self.try_save_profile(caller, &form),
            ConferenceError::is_retryable,
        )
        .await?;
        Ok(ProfileForm::from_profile(&profile))
    }

    async fn try_save_profile(
        &self,
        caller: &CallerIdentity,
        form: &ProfileMiniForm,
    ) -> Result<Profile, ConferenceError> {
        let (mut profile, expected) = self.load_or_new_profile(caller).await?;
        let changed = form.apply(&mut profile)?;

        if changed || expected == Expectation::Absent {
            self.store
                .commit(vec![Mutation::PutProfile {
                    profile: profile.clone(),
                    expected,
                }])
                .await
                .map_err(|err| Self::note_conflict("save_profile", err))?;
            tracing::info!("Profile saved");
        }
        Ok(profile)
    }

    /// Return the stored profile, persisting a new one if needed.
    ///
    /// Losing a creation race to a concurrent request is fine: the winner's
    /// profile is reloaded.
    pub(crate) async fn ensure_profile(
        &self,
        caller: &CallerIdentity,
    ) -> Result<Profile, ConferenceError> {
        let (profile, expected) = self.load_or_new_profile(caller).await?;
        if expected != Expectation::Absent {
            return Ok(profile);
        }

        match self
            .store
            .commit(vec![Mutation::PutProfile {
                profile: profile.clone(),
                expected,
            }])
            .await
        {
            Ok(()) => {
                tracing::info!(user_id = %caller.user_id, "Profile created");
                Ok(profile)
            }
            Err(err @ StoreError::ConcurrencyConflict { .. }) => self
                .store
                .load_profile(caller.user_id.clone())
                .await?
                .map(|versioned| versioned.value)
                .ok_or(ConferenceError::Store(err)),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use crate::ConferenceService;
    use crate::announcements::InMemoryAnnouncementCache;
    use conference_core::error::ErrorKind;
    use conference_core::forms::ProfileMiniForm;
    use conference_core::model::TeeShirtSize;
    use conference_core::store::EntityStore;
    use conference_testing::{InMemoryEntityStore, RecordingNotificationQueue, fixtures, test_clock};
    use std::sync::Arc;

    fn service(store: Arc<InMemoryEntityStore>) -> ConferenceService {
        ConferenceService::new(
            store,
            Arc::new(test_clock()),
            Arc::new(RecordingNotificationQueue::new()),
            Arc::new(InMemoryAnnouncementCache::new()),
        )
    }

    #[tokio::test]
    async fn first_access_creates_a_default_profile() {
        let store = Arc::new(InMemoryEntityStore::new());
        let service = service(Arc::clone(&store));
        let caller = fixtures::caller("ada");

        let form = service.get_profile(&caller).await.unwrap();
        assert_eq!(form.display_name, "ada");
        assert_eq!(form.main_email, "ada@example.com");
        assert_eq!(form.tee_shirt_size, TeeShirtSize::NotSpecified);

        let stored = store.load_profile(caller.user_id.clone()).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn save_profile_updates_editable_fields() {
        let service = service(Arc::new(InMemoryEntityStore::new()));
        let caller = fixtures::caller("ada");

        let saved = service
            .save_profile(
                &caller,
                ProfileMiniForm {
                    display_name: Some("Ada Lovelace".to_string()),
                    tee_shirt_size: Some("M_W".to_string()),
                },
            )
            .await
            .unwrap();
        assert_eq!(saved.display_name, "Ada Lovelace");
        assert_eq!(saved.tee_shirt_size, TeeShirtSize::MW);

        let reloaded = service.get_profile(&caller).await.unwrap();
        assert_eq!(reloaded, saved);
    }

    #[tokio::test]
    async fn unknown_size_is_rejected() {
        let service = service(Arc::new(InMemoryEntityStore::new()));
        let err = service
            .save_profile(
                &fixtures::caller("ada"),
                ProfileMiniForm {
                    display_name: None,
                    tee_shirt_size: Some("ENORMOUS".to_string()),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
