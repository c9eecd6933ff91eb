//! Entity store abstraction.
//!
//! The store persists profiles, conferences, sessions and wishlist entries.
//! Profiles and conferences carry a [`Version`] and are only ever written
//! through [`EntityStore::commit`], which applies a batch of versioned
//! mutations atomically: either every expectation holds and every entity is
//! written, or nothing is written and the call fails with
//! [`StoreError::ConcurrencyConflict`]. That is the primitive the
//! registration engine builds its cross-entity read-modify-write on.
//!
//! Sessions and wishlist entries are insert-only. Wishlist uniqueness per
//! (user, session) is enforced by the store itself in a single conditional
//! insert, never by a read followed by a write.
//!
//! # Implementations
//!
//! - `PostgresEntityStore` (in `conference-postgres`): production storage
//! - `InMemoryEntityStore` (in `conference-testing`): tests and local runs

use crate::filter::QueryPlan;
use crate::keys::{ConferenceKey, ProfileId, SessionKey, Version};
use crate::model::{Conference, Profile, Session, Versioned, WishlistEntry};
use chrono::NaiveTime;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Boxed future returned by [`EntityStore`] methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Errors raised by an [`EntityStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    /// A versioned write found a different version than expected.
    ///
    /// Another writer changed the entity between read and commit; the whole
    /// unit of work may be retried from the read.
    #[error("Concurrency conflict on {entity}")]
    ConcurrencyConflict {
        /// Entity the conflict was detected on, e.g. `conference:<key>`.
        entity: String,
    },

    /// A uniqueness constraint rejected an insert.
    #[error("Already exists: {entity}")]
    AlreadyExists {
        /// The duplicate entity.
        entity: String,
    },

    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A stored row could not be mapped to an entity.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Precondition a versioned write must satisfy.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expectation {
    /// The entity must not exist yet; it is stored at [`Version::INITIAL`].
    Absent,
    /// The entity must currently be stored at exactly this version.
    At(Version),
}

/// One versioned write inside an atomic [`EntityStore::commit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// Insert or replace a profile.
    PutProfile {
        /// New state.
        profile: Profile,
        /// Version precondition.
        expected: Expectation,
    },
    /// Insert or replace a conference.
    PutConference {
        /// New state.
        conference: Conference,
        /// Version precondition.
        expected: Expectation,
    },
}

impl Mutation {
    /// Human-readable entity label used in conflict errors.
    #[must_use]
    pub fn entity(&self) -> String {
        match self {
            Self::PutProfile { profile, .. } => format!("profile:{}", profile.user_id),
            Self::PutConference { conference, .. } => format!("conference:{}", conference.key),
        }
    }

    /// Version precondition of this mutation.
    #[must_use]
    pub const fn expected(&self) -> Expectation {
        match self {
            Self::PutProfile { expected, .. } | Self::PutConference { expected, .. } => *expected,
        }
    }
}

/// Conjunctive filter over sessions.
///
/// Results are ordered by creation time, ties broken by session key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionQuery {
    /// Restrict to one conference.
    pub conference: Option<ConferenceKey>,
    /// Exact speaker name.
    pub speaker: Option<String>,
    /// Exact session name.
    pub name: Option<String>,
    /// Session must carry this type tag.
    pub type_of_session: Option<String>,
    /// Session must have a start time at or before this one.
    pub starts_at_or_before: Option<NaiveTime>,
}

impl SessionQuery {
    /// Sessions of one conference.
    #[must_use]
    pub fn for_conference(conference: ConferenceKey) -> Self {
        Self {
            conference: Some(conference),
            ..Self::default()
        }
    }

    /// Sessions given by one speaker, across conferences.
    #[must_use]
    pub fn by_speaker(speaker: impl Into<String>) -> Self {
        Self {
            speaker: Some(speaker.into()),
            ..Self::default()
        }
    }

    /// Sessions with this exact name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Add a type-tag condition.
    #[must_use]
    pub fn with_type(mut self, type_of_session: impl Into<String>) -> Self {
        self.type_of_session = Some(type_of_session.into());
        self
    }

    /// Add a latest-start-time condition.
    #[must_use]
    pub const fn starting_at_or_before(mut self, time: NaiveTime) -> Self {
        self.starts_at_or_before = Some(time);
        self
    }

    /// Whether a session satisfies every condition.
    #[must_use]
    pub fn matches(&self, session: &Session) -> bool {
        self.conference.is_none_or(|key| session.conference == key)
            && self.speaker.as_deref().is_none_or(|s| session.speaker == s)
            && self.name.as_deref().is_none_or(|n| session.name == n)
            && self
                .type_of_session
                .as_deref()
                .is_none_or(|tag| session.has_type(tag))
            && self
                .starts_at_or_before
                .is_none_or(|limit| session.start_time.is_some_and(|start| start <= limit))
    }
}

/// Persistence for conference entities.
///
/// # Dyn Compatibility
///
/// Methods return [`StoreFuture`] instead of using `async fn` so the trait
/// can be shared as `Arc<dyn EntityStore>`.
pub trait EntityStore: Send + Sync {
    /// Check the backend is reachable.
    ///
    /// # Errors
    ///
    /// `Database` when the backend cannot be reached.
    fn ping(&self) -> StoreFuture<'_, ()>;

    /// Load a profile with its version.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn load_profile(&self, user_id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>>;

    /// Load several profiles; missing ids are skipped.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn load_profiles(&self, user_ids: Vec<ProfileId>) -> StoreFuture<'_, Vec<Profile>>;

    /// Load a conference with its version.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn load_conference(
        &self,
        key: ConferenceKey,
    ) -> StoreFuture<'_, Option<Versioned<Conference>>>;

    /// Load several conferences, preserving the order of `keys`; missing keys are skipped.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn load_conferences(&self, keys: Vec<ConferenceKey>) -> StoreFuture<'_, Vec<Conference>>;

    /// Conferences whose parent reference is `organizer`, ordered by name.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>>;

    /// Run a compiled query plan.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn query_conferences<'a>(&'a self, plan: &'a QueryPlan) -> StoreFuture<'a, Vec<Conference>>;

    /// Atomically apply versioned writes.
    ///
    /// # Errors
    ///
    /// - `ConcurrencyConflict` if any expectation fails; nothing is written
    /// - `Database` on backend failure
    fn commit(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, ()>;

    /// Insert a new session.
    ///
    /// # Errors
    ///
    /// `Database` on backend failure.
    fn insert_session(&self, session: Session) -> StoreFuture<'_, ()>;

    /// Load one session by key.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn load_session(&self, key: SessionKey) -> StoreFuture<'_, Option<Session>>;

    /// Sessions matching `query`, ordered by creation time then key.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn query_sessions<'a>(&'a self, query: &'a SessionQuery) -> StoreFuture<'a, Vec<Session>>;

    /// Insert a wishlist entry unless the user already has one for the session.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` when (user, session) is taken
    /// - `Database` on backend failure
    fn insert_wishlist_entry(&self, entry: WishlistEntry) -> StoreFuture<'_, ()>;

    /// A user's wishlist ordered by creation time, optionally restricted to
    /// entries carrying a session type tag.
    ///
    /// # Errors
    ///
    /// `Database` or `Serialization` on backend failure.
    fn wishlist_for_user(
        &self,
        user_id: ProfileId,
        type_of_session: Option<String>,
    ) -> StoreFuture<'_, Vec<WishlistEntry>>;
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use chrono::{TimeZone, Utc};

    fn session(start: Option<&str>, types: &[&str]) -> Session {
        Session {
            key: SessionKey::new(),
            conference: ConferenceKey::new(),
            name: "Ownership in depth".to_string(),
            highlights: None,
            speaker: "Ferris".to_string(),
            duration: Some(60),
            date: None,
            start_time: start.map(|s| NaiveTime::parse_from_str(s, "%H:%M").unwrap()),
            type_of_session: types.iter().map(|t| (*t).to_string()).collect(),
            created_at: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn empty_query_matches_everything() {
        assert!(SessionQuery::default().matches(&session(None, &[])));
    }

    #[test]
    fn start_time_limit_excludes_untimed_sessions() {
        let seven_pm = NaiveTime::from_hms_opt(19, 0, 0).unwrap();
        let query = SessionQuery::default().starting_at_or_before(seven_pm);
        assert!(query.matches(&session(Some("19:00"), &[])));
        assert!(query.matches(&session(Some("09:30"), &[])));
        assert!(!query.matches(&session(Some("19:01"), &[])));
        assert!(!query.matches(&session(None, &[])));
    }

    #[test]
    fn conditions_are_conjunctive() {
        let s = session(Some("10:00"), &["Lecture"]);
        let query = SessionQuery::for_conference(s.conference).with_type("Lecture");
        assert!(query.matches(&s));
        assert!(!SessionQuery::for_conference(s.conference).with_type("Workshop").matches(&s));
        assert!(!SessionQuery::by_speaker("Someone else").matches(&s));
        assert!(SessionQuery::named("Ownership in depth").matches(&s));
    }

    #[test]
    fn mutation_labels_name_the_entity() {
        let profile = Profile::new(ProfileId::new("u1"), "U", "u@example.com");
        let mutation = Mutation::PutProfile {
            profile,
            expected: Expectation::Absent,
        };
        assert_eq!(mutation.entity(), "profile:u1");
        assert_eq!(mutation.expected(), Expectation::Absent);
    }
}
