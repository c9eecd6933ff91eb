//! `PostgreSQL` entity store for the conference service.
//!
//! Implements the `EntityStore` trait from `conference-core` on top of sqlx:
//!
//! - Versioned profile and conference rows; [`EntityStore::commit`] runs in
//!   one transaction and checks every expectation with a conditional write
//! - Insert-only sessions and wishlist entries, with wishlist uniqueness
//!   enforced by a `UNIQUE (user_id, session_key)` constraint
//! - Conference query plans rendered to SQL with `QueryBuilder`
//!
//! # Example
//!
//! ```ignore
//! use conference_postgres::PostgresEntityStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresEntityStore::new("postgres://localhost/conference").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod plan;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use conference_core::filter::QueryPlan;
use conference_core::keys::{ConferenceKey, ProfileId, SessionKey, Version, WishlistKey};
use conference_core::model::{Conference, Profile, Session, TeeShirtSize, Versioned, WishlistEntry};
use conference_core::store::{
    EntityStore, Expectation, Mutation, SessionQuery, StoreError, StoreFuture,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const PROFILE_COLUMNS: &str =
    "user_id, display_name, main_email, tee_shirt_size, conference_keys_to_attend, version";

const WISHLIST_COLUMNS: &str =
    "key, user_id, session_key, session_name, type_of_session, created_at";

/// Default pool size for [`PostgresEntityStore::new`].
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

fn db_error(context: &str, err: &sqlx::Error) -> StoreError {
    StoreError::Database(format!("{context}: {err}"))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn stored_version(version: Version) -> Result<i64, StoreError> {
    i64::try_from(version.value())
        .map_err(|_| StoreError::Serialization(format!("Version {version:?} out of range")))
}

fn loaded_version(row: &PgRow) -> Result<Version, StoreError> {
    let raw: i64 = get(row, "version")?;
    u64::try_from(raw)
        .map(Version::new)
        .map_err(|_| StoreError::Serialization(format!("Negative version {raw}")))
}

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(column)
        .map_err(|e| StoreError::Serialization(format!("Column {column}: {e}")))
}

fn profile_from_row(row: &PgRow) -> Result<Versioned<Profile>, StoreError> {
    let user_id: String = get(row, "user_id")?;
    let size: String = get(row, "tee_shirt_size")?;
    let keys: Vec<Uuid> = get(row, "conference_keys_to_attend")?;
    let profile = Profile {
        user_id: ProfileId::new(user_id),
        display_name: get(row, "display_name")?,
        main_email: get(row, "main_email")?,
        tee_shirt_size: TeeShirtSize::from_stored(&size),
        conference_keys_to_attend: keys.into_iter().map(ConferenceKey::from_uuid).collect(),
    };
    Ok(Versioned::new(profile, loaded_version(row)?))
}

fn conference_from_row(row: &PgRow) -> Result<Versioned<Conference>, StoreError> {
    let key: Uuid = get(row, "key")?;
    let organizer: String = get(row, "organizer")?;
    let conference = Conference {
        key: ConferenceKey::from_uuid(key),
        organizer: ProfileId::new(organizer),
        name: get(row, "name")?,
        description: get(row, "description")?,
        topics: get(row, "topics")?,
        city: get(row, "city")?,
        start_date: get::<Option<NaiveDate>>(row, "start_date")?,
        end_date: get::<Option<NaiveDate>>(row, "end_date")?,
        month: get(row, "month")?,
        max_attendees: get(row, "max_attendees")?,
        seats_available: get(row, "seats_available")?,
    };
    Ok(Versioned::new(conference, loaded_version(row)?))
}

fn session_from_row(row: &PgRow) -> Result<Session, StoreError> {
    let key: Uuid = get(row, "key")?;
    let conference: Uuid = get(row, "conference_key")?;
    Ok(Session {
        key: SessionKey::from_uuid(key),
        conference: ConferenceKey::from_uuid(conference),
        name: get(row, "name")?,
        highlights: get(row, "highlights")?,
        speaker: get(row, "speaker")?,
        duration: get(row, "duration")?,
        date: get::<Option<NaiveDate>>(row, "date")?,
        start_time: get::<Option<NaiveTime>>(row, "start_time")?,
        type_of_session: get(row, "type_of_session")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}

fn wishlist_from_row(row: &PgRow) -> Result<WishlistEntry, StoreError> {
    let key: Uuid = get(row, "key")?;
    let user_id: String = get(row, "user_id")?;
    let session: Uuid = get(row, "session_key")?;
    Ok(WishlistEntry {
        key: WishlistKey::from_uuid(key),
        user_id: ProfileId::new(user_id),
        session: SessionKey::from_uuid(session),
        session_name: get(row, "session_name")?,
        type_of_session: get(row, "type_of_session")?,
        created_at: get::<DateTime<Utc>>(row, "created_at")?,
    })
}

/// `PostgreSQL`-backed [`EntityStore`].
#[derive(Clone)]
pub struct PostgresEntityStore {
    pool: PgPool,
}

impl PostgresEntityStore {
    /// Connect a pool of [`DEFAULT_MAX_CONNECTIONS`] to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_max_connections(database_url, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Connect a pool of `max_connections` to `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn with_max_connections(
        database_url: &str,
        max_connections: u32,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| db_error("Failed to connect", &e))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create or upgrade the schema.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

async fn put_profile(
    tx: &mut Transaction<'_, Postgres>,
    profile: &Profile,
    expected: Expectation,
) -> Result<u64, StoreError> {
    let keys: Vec<Uuid> = profile
        .conference_keys_to_attend
        .iter()
        .map(|k| *k.as_uuid())
        .collect();

    let result = match expected {
        Expectation::Absent => {
            sqlx::query(
                "INSERT INTO profiles \
                 (user_id, display_name, main_email, tee_shirt_size, conference_keys_to_attend, version) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (user_id) DO NOTHING",
            )
            .bind(profile.user_id.as_str())
            .bind(&profile.display_name)
            .bind(&profile.main_email)
            .bind(profile.tee_shirt_size.as_str())
            .bind(&keys)
            .bind(stored_version(Version::INITIAL)?)
            .execute(&mut **tx)
            .await
        }
        Expectation::At(version) => {
            sqlx::query(
                "UPDATE profiles \
                 SET display_name = $2, main_email = $3, tee_shirt_size = $4, \
                     conference_keys_to_attend = $5, version = version + 1 \
                 WHERE user_id = $1 AND version = $6",
            )
            .bind(profile.user_id.as_str())
            .bind(&profile.display_name)
            .bind(&profile.main_email)
            .bind(profile.tee_shirt_size.as_str())
            .bind(&keys)
            .bind(stored_version(version)?)
            .execute(&mut **tx)
            .await
        }
    };

    result
        .map(|r| r.rows_affected())
        .map_err(|e| db_error("Failed to write profile", &e))
}

async fn put_conference(
    tx: &mut Transaction<'_, Postgres>,
    conference: &Conference,
    expected: Expectation,
) -> Result<u64, StoreError> {
    let result = match expected {
        Expectation::Absent => {
            sqlx::query(
                "INSERT INTO conferences \
                 (key, organizer, name, description, topics, city, start_date, end_date, \
                  month, max_attendees, seats_available, version) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
                 ON CONFLICT (key) DO NOTHING",
            )
            .bind(conference.key.as_uuid())
            .bind(conference.organizer.as_str())
            .bind(&conference.name)
            .bind(&conference.description)
            .bind(&conference.topics)
            .bind(&conference.city)
            .bind(conference.start_date)
            .bind(conference.end_date)
            .bind(conference.month)
            .bind(conference.max_attendees)
            .bind(conference.seats_available)
            .bind(stored_version(Version::INITIAL)?)
            .execute(&mut **tx)
            .await
        }
        Expectation::At(version) => {
            sqlx::query(
                "UPDATE conferences \
                 SET name = $2, description = $3, topics = $4, city = $5, start_date = $6, \
                     end_date = $7, month = $8, max_attendees = $9, seats_available = $10, \
                     version = version + 1 \
                 WHERE key = $1 AND version = $11",
            )
            .bind(conference.key.as_uuid())
            .bind(&conference.name)
            .bind(&conference.description)
            .bind(&conference.topics)
            .bind(&conference.city)
            .bind(conference.start_date)
            .bind(conference.end_date)
            .bind(conference.month)
            .bind(conference.max_attendees)
            .bind(conference.seats_available)
            .bind(stored_version(version)?)
            .execute(&mut **tx)
            .await
        }
    };

    result
        .map(|r| r.rows_affected())
        .map_err(|e| db_error("Failed to write conference", &e))
}

impl EntityStore for PostgresEntityStore {
    fn ping(&self) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query("SELECT 1")
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Ping failed", &e))?;
            Ok(())
        })
    }

    fn load_profile(&self, user_id: ProfileId) -> StoreFuture<'_, Option<Versioned<Profile>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
            ))
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load profile", &e))?;
            row.as_ref().map(profile_from_row).transpose()
        })
    }

    fn load_profiles(&self, user_ids: Vec<ProfileId>) -> StoreFuture<'_, Vec<Profile>> {
        Box::pin(async move {
            if user_ids.is_empty() {
                return Ok(Vec::new());
            }
            let ids: Vec<String> = user_ids.iter().map(|id| id.as_str().to_string()).collect();
            let rows = sqlx::query(&format!(
                "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = ANY($1)"
            ))
            .bind(&ids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load profiles", &e))?;

            let mut by_id = HashMap::with_capacity(rows.len());
            for row in &rows {
                let profile = profile_from_row(row)?.into_inner();
                by_id.insert(profile.user_id.clone(), profile);
            }
            Ok(user_ids.iter().filter_map(|id| by_id.remove(id)).collect())
        })
    }

    fn load_conference(
        &self,
        key: ConferenceKey,
    ) -> StoreFuture<'_, Option<Versioned<Conference>>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {} FROM conferences WHERE key = $1",
                plan::CONFERENCE_COLUMNS
            ))
            .bind(key.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load conference", &e))?;
            row.as_ref().map(conference_from_row).transpose()
        })
    }

    fn load_conferences(&self, keys: Vec<ConferenceKey>) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(Vec::new());
            }
            let uuids: Vec<Uuid> = keys.iter().map(|k| *k.as_uuid()).collect();
            let rows = sqlx::query(&format!(
                "SELECT {} FROM conferences WHERE key = ANY($1)",
                plan::CONFERENCE_COLUMNS
            ))
            .bind(&uuids)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load conferences", &e))?;

            let mut by_key = HashMap::with_capacity(rows.len());
            for row in &rows {
                let conference = conference_from_row(row)?.into_inner();
                by_key.insert(conference.key, conference);
            }
            Ok(keys.iter().filter_map(|key| by_key.remove(key)).collect())
        })
    }

    fn conferences_by_organizer(&self, organizer: ProfileId) -> StoreFuture<'_, Vec<Conference>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {} FROM conferences WHERE organizer = $1 ORDER BY name COLLATE \"C\", key",
                plan::CONFERENCE_COLUMNS
            ))
            .bind(organizer.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load conferences", &e))?;
            rows.iter()
                .map(|row| conference_from_row(row).map(Versioned::into_inner))
                .collect()
        })
    }

    fn query_conferences<'a>(&'a self, plan: &'a QueryPlan) -> StoreFuture<'a, Vec<Conference>> {
        Box::pin(async move {
            let mut builder = plan::conference_query(plan);
            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to query conferences", &e))?;
            rows.iter()
                .map(|row| conference_from_row(row).map(Versioned::into_inner))
                .collect()
        })
    }

    fn commit(&self, mutations: Vec<Mutation>) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let mut tx = self
                .pool
                .begin()
                .await
                .map_err(|e| db_error("Failed to begin transaction", &e))?;

            for mutation in &mutations {
                let written = match mutation {
                    Mutation::PutProfile { profile, expected } => {
                        put_profile(&mut tx, profile, *expected).await?
                    }
                    Mutation::PutConference {
                        conference,
                        expected,
                    } => put_conference(&mut tx, conference, *expected).await?,
                };
                if written == 0 {
                    let entity = mutation.entity();
                    tracing::debug!(entity = %entity, "Versioned write rejected");
                    tx.rollback()
                        .await
                        .map_err(|e| db_error("Failed to roll back", &e))?;
                    return Err(StoreError::ConcurrencyConflict { entity });
                }
            }

            tx.commit()
                .await
                .map_err(|e| db_error("Failed to commit transaction", &e))
        })
    }

    fn insert_session(&self, session: Session) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            sqlx::query(
                "INSERT INTO sessions \
                 (key, conference_key, name, highlights, speaker, duration, date, start_time, \
                  type_of_session, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            )
            .bind(session.key.as_uuid())
            .bind(session.conference.as_uuid())
            .bind(&session.name)
            .bind(&session.highlights)
            .bind(&session.speaker)
            .bind(session.duration)
            .bind(session.date)
            .bind(session.start_time)
            .bind(&session.type_of_session)
            .bind(session.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    StoreError::AlreadyExists {
                        entity: format!("session:{}", session.key),
                    }
                } else {
                    db_error("Failed to insert session", &e)
                }
            })?;
            Ok(())
        })
    }

    fn load_session(&self, key: SessionKey) -> StoreFuture<'_, Option<Session>> {
        Box::pin(async move {
            let row = sqlx::query(&format!(
                "SELECT {} FROM sessions WHERE key = $1",
                plan::SESSION_COLUMNS
            ))
            .bind(key.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load session", &e))?;
            row.as_ref().map(session_from_row).transpose()
        })
    }

    fn query_sessions<'a>(&'a self, query: &'a SessionQuery) -> StoreFuture<'a, Vec<Session>> {
        Box::pin(async move {
            let mut builder = plan::session_query(query);
            let rows = builder
                .build()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to query sessions", &e))?;
            rows.iter().map(session_from_row).collect()
        })
    }

    fn insert_wishlist_entry(&self, entry: WishlistEntry) -> StoreFuture<'_, ()> {
        Box::pin(async move {
            let result = sqlx::query(
                "INSERT INTO wishlist_entries \
                 (key, user_id, session_key, session_name, type_of_session, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (user_id, session_key) DO NOTHING",
            )
            .bind(entry.key.as_uuid())
            .bind(entry.user_id.as_str())
            .bind(entry.session.as_uuid())
            .bind(&entry.session_name)
            .bind(&entry.type_of_session)
            .bind(entry.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to insert wishlist entry", &e))?;

            if result.rows_affected() == 0 {
                return Err(StoreError::AlreadyExists {
                    entity: format!("wishlist:{}/{}", entry.user_id, entry.session),
                });
            }
            Ok(())
        })
    }

    fn wishlist_for_user(
        &self,
        user_id: ProfileId,
        type_of_session: Option<String>,
    ) -> StoreFuture<'_, Vec<WishlistEntry>> {
        Box::pin(async move {
            let rows = sqlx::query(&format!(
                "SELECT {WISHLIST_COLUMNS} FROM wishlist_entries \
                 WHERE user_id = $1 AND ($2::TEXT IS NULL OR $2 = ANY(type_of_session)) \
                 ORDER BY created_at, key"
            ))
            .bind(user_id.as_str())
            .bind(type_of_session)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to load wishlist", &e))?;
            rows.iter().map(wishlist_from_row).collect()
        })
    }
}
