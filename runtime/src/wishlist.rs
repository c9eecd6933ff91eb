//! Per-user session wishlists.
//!
//! The store rejects a second entry for the same (user, session) pair in the
//! same conditional insert that writes the first one, so two concurrent
//! additions of one session can never both succeed.

use crate::{ConferenceService, outcome_label, required};
use conference_core::error::ConferenceError;
use conference_core::forms::{WishlistForm, WishlistForms};
use conference_core::identity::CallerIdentity;
use conference_core::keys::SessionKey;
use conference_core::model::WishlistEntry;
use conference_core::store::{SessionQuery, StoreError};
use std::collections::HashSet;

/// Message for a session already on the caller's wishlist.
pub const ALREADY_IN_WISHLIST: &str = "Session already added to wishlist";

fn entries_to_forms(entries: &[WishlistEntry]) -> WishlistForms {
    WishlistForms {
        items: entries.iter().map(WishlistForm::from_entry).collect(),
    }
}

impl ConferenceService {
    /// Add the session named `session_name` to the caller's wishlist.
    ///
    /// When several sessions share the name, the earliest created one is used.
    ///
    /// # Errors
    ///
    /// - [`ConferenceError::BadRequest`] for a missing name
    /// - [`ConferenceError::NotFound`] if no session has that name
    /// - [`ConferenceError::Conflict`] if the session is already on the wishlist
    #[tracing::instrument(skip(self, caller), fields(user_id = %caller.user_id))]
    pub async fn add_session_to_wishlist(
        &self,
        caller: &CallerIdentity,
        session_name: &str,
    ) -> Result<WishlistForm, ConferenceError> {
        let result = self.try_add_to_wishlist(caller, session_name).await;
        let label = match &result {
            Err(ConferenceError::Conflict(_)) => "duplicate",
            other => outcome_label(other),
        };
        crate::metrics::WishlistMetrics::record_addition(label);
        result
    }

    async fn try_add_to_wishlist(
        &self,
        caller: &CallerIdentity,
        session_name: &str,
    ) -> Result<WishlistForm, ConferenceError> {
        let session_name = required("sessionName", session_name)?;
        let session = self
            .store
            .query_sessions(&SessionQuery::named(session_name))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| {
                ConferenceError::NotFound(format!("No session found with name: {session_name}"))
            })?;

        let entry = WishlistEntry::for_session(caller.user_id.clone(), &session, self.clock.now());
        match self.store.insert_wishlist_entry(entry.clone()).await {
            Ok(()) => {
                tracing::info!(session_key = %session.key, "Session added to wishlist");
                Ok(WishlistForm::from_entry(&entry))
            }
            Err(StoreError::AlreadyExists { .. }) => {
                Err(ConferenceError::Conflict(ALREADY_IN_WISHLIST.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// The caller's wishlist, in the order entries were added.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Store`] on storage failure.
    pub async fn get_sessions_in_wishlist(
        &self,
        caller: &CallerIdentity,
    ) -> Result<WishlistForms, ConferenceError> {
        let entries = self
            .store
            .wishlist_for_user(caller.user_id.clone(), None)
            .await?;
        Ok(entries_to_forms(&entries))
    }

    /// The caller's wishlist entries whose session carries `type_of_session`.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a missing type.
    pub async fn return_wishlist_type(
        &self,
        caller: &CallerIdentity,
        type_of_session: &str,
    ) -> Result<WishlistForms, ConferenceError> {
        let type_of_session = required("typeOfSession", type_of_session)?;
        let entries = self
            .store
            .wishlist_for_user(caller.user_id.clone(), Some(type_of_session.to_string()))
            .await?;
        Ok(entries_to_forms(&entries))
    }

    /// The caller's wishlist entries whose session is given by `speaker`.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a missing speaker.
    pub async fn return_wishlist_speaker(
        &self,
        caller: &CallerIdentity,
        speaker: &str,
    ) -> Result<WishlistForms, ConferenceError> {
        let speaker = required("speaker", speaker)?;
        let speaker_sessions: HashSet<SessionKey> = self
            .store
            .query_sessions(&SessionQuery::by_speaker(speaker))
            .await?
            .into_iter()
            .map(|s| s.key)
            .collect();
        let entries: Vec<WishlistEntry> = self
            .store
            .wishlist_for_user(caller.user_id.clone(), None)
            .await?
            .into_iter()
            .filter(|e| speaker_sessions.contains(&e.session))
            .collect();
        Ok(entries_to_forms(&entries))
    }
}
