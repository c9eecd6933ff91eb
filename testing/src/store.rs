//! In-memory [`EntityStore`].
//!
//! All tables live behind one `tokio::sync::RwLock`, so a commit checks every
//! expectation and applies every write while holding the write lock. That
//! gives the same all-or-nothing behavior as a database transaction.

use conference_core::filter::QueryPlan;
use conference_core::keys::{ConferenceKey, ProfileId, SessionKey, Version};
use conference_core::model::{Conference, Profile, Session, Versioned, WishlistEntry};
use conference_core::store::{
    EntityStore, Expectation, Mutation, SessionQuery, StoreError, StoreFuture,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    profiles: HashMap<ProfileId, Versioned<Profile>>,
    conferences: HashMap<ConferenceKey, Versioned<Conference>>,
    sessions: Vec<Session>,
    wishlist: Vec<WishlistEntry>,
}

impl Tables {
    fn current_version(&self, mutation: &Mutation) -> Option<Version> {
        match mutation {
            Mutation::PutProfile { profile, .. } => {
                self.profiles.get(&profile.user_id).map(|v| v.version)
            }
            Mutation::PutConference { conference, .. } => {
                self.conferences.get(&conference.key).map(|v| v.version)
            }
        }
    }

    fn apply(&mut self, mutation: Mutation) {
        let next = self
            .current_version(&mutation)
            .map_or(Version::INITIAL, |v| v.next());
        match mutation {
            Mutation::PutProfile { profile, .. } => {
                self.profiles
                    .insert(profile.user_id.clone(), Versioned::new(profile, next));
            }
            Mutation::PutConference { conference, .. } => {
                self.conferences
                    .insert(conference.key, Versioned::new(conference, next));
            }
        }
    }
}

/// Thread-safe in-memory store for tests and local runs.
///
/// # Example
///
/// ```
/// use conference_testing::InMemoryEntityStore;
/// use conference_core::store::EntityStore;
/// use conference_core::keys::ProfileId;
///
/// # #[tokio::main]
/// # async fn main() {
/// let store = InMemoryEntityStore::new();
/// assert!(store.load_profile(ProfileId::new("nobody")).await.unwrap().is_none());
/// # }
/// ```
#[derive(Default)]
pub struct InMemoryEntityStore {
    tables: RwLock<Tables>,
    injected_conflicts: AtomicUsize,
}

impl InMemoryEntityStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a concurrency conflict
    /// without writing anything.
    pub fn inject_conflicts(&self, count: usize) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Number of stored conferences.
    pub async fn conference_count(&self) -> usize {
        self.tables.read().await.conferences.len()
    }

    /// Number of stored wishlist entries across all users.
    pub async fn wishlist_len(&self) -> usize {
        self.tables.read().await.wishlist.len()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl EntityStore for InMemoryEntityStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn load_profile(&self, user_id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>> {
        Box::pin(async move { Ok(self.tables.read().await.profiles.get(&user_id).cloned()) })
    }

    fn load_profiles(&self, user_ids: Vec<ProfileId>) -> StoreFuture<'_, Vec<Profile>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(user_ids
                .iter()
                .filter_map(|id| tables.profiles.get(id))
                .map(|v| v.value.clone())
                .collect())
        })
    }

    fn load_conference(
        &self,
        key: ConferenceKey,
    ) -> StoreFuture<'_, Option<Versioned<Conference>>> {
        Box::pin(async move { Ok(self.tables.read().await.conferences.get(&key).cloned()) })
    }

    fn load_conferences(&self, keys: Vec<ConferenceKey>) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(keys
                .iter()
                .filter_map(|key| tables.conferences.get(key))
                .map(|v| v.value.clone())
                .collect())
        })
    }

    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let owned = tables
                .conferences
                .values()
                .filter(|v| v.value.organizer == organizer)
                .map(|v| v.value.clone());
            Ok(QueryPlan::all().apply(owned))
        })
    }

    fn query_conferences<'a>(&'a self, plan: &'a QueryPlan) -> StoreFuture<'a, Vec<Conference>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(plan.apply(tables.conferences.values().map(|v| v.value.clone())))
        })
    }

    fn commit(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;

            if self.take_injected_conflict() {
                let entity = mutations
                    .first()
                    .map_or_else(|| "commit".to_string(), Mutation::entity);
                return Err(StoreError::ConcurrencyConflict { entity });
            }

            for mutation in &mutations {
                let current = tables.current_version(mutation);
                let satisfied = match mutation.expected() {
                    Expectation::Absent => current.is_none(),
                    Expectation::At(expected) => current == Some(expected),
                };
                if !satisfied {
                    return Err(StoreError::ConcurrencyConflict {
                        entity: mutation.entity(),
                    });
                }
            }

            for mutation in mutations {
                tables.apply(mutation);
            }
            Ok(())
        })
    }

    fn insert_session(&self, session: Session) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if tables.sessions.iter().any(|s| s.key == session.key) {
                return Err(StoreError::AlreadyExists {
                    entity: format!("session:{}", session.key),
                });
            }
            tables.sessions.push(session);
            Ok(())
        })
    }

    fn load_session(&self, key: SessionKey) -> StoreFuture<'_, Option<Session>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.sessions.iter().find(|s| s.key == key).cloned())
        })
    }

    fn query_sessions<'a>(&'a self, query: &'a SessionQuery) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let mut sessions: Vec<Session> = tables
                .sessions
                .iter()
                .filter(|s| query.matches(s))
                .cloned()
                .collect();
            sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
            Ok(sessions)
        })
    }

    fn insert_wishlist_entry(&self, entry: WishlistEntry) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if tables
                .wishlist
                .iter()
                .any(|w| w.user_id == entry.user_id && w.session == entry.session)
            {
                return Err(StoreError::AlreadyExists {
                    entity: format!("wishlist:{}/{}", entry.user_id, entry.session),
                });
            }
            tables.wishlist.push(entry);
            Ok(())
        })
    }

    fn wishlist_for_user(
        &self,
        user_id: ProfileId,
        type_of_session: Option<String>,
    ) -> StoreFuture<'_, Vec<WishlistEntry>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let mut entries: Vec<WishlistEntry> = tables
                .wishlist
                .iter()
                .filter(|w| w.user_id == user_id)
                .filter(|w| {
                    type_of_session
                        .as_deref()
                        .is_none_or(|tag| w.type_of_session.iter().any(|t| t == tag))
                })
                .cloned()
                .collect();
            entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.key.cmp(&b.key)));
            Ok(entries)
        })
    }
}
