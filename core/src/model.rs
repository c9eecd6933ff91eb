//! Persisted entities: profiles, conferences, sessions and wishlist entries.

use crate::keys::{ConferenceKey, ProfileId, SessionKey, Version, WishlistKey};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// City stored when a conference is created without one.
pub const DEFAULT_CITY: &str = "Default City";

/// Topics stored when a conference is created without any.
pub const DEFAULT_TOPICS: [&str; 2] = ["Default", "Topic"];

/// Session types stored when a session is created without any.
pub const DEFAULT_SESSION_TYPES: [&str; 2] = ["Workshop", "Lecture"];

/// An entity together with the version it was read at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Versioned<T> {
    /// The entity.
    pub value: T,
    /// The stored version `value` was read at.
    pub version: Version,
}

impl<T> Versioned<T> {
    /// Pair a value with its version.
    pub const fn new(value: T, version: Version) -> Self {
        Self { value, version }
    }

    /// Drop the version.
    pub fn into_inner(self) -> T {
        self.value
    }
}

/// Error returned for an unknown tee-shirt size token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown tee-shirt size: {0}")]
pub struct ParseTeeShirtSizeError(String);

/// Tee-shirt size of a profile.
///
/// The string form is the token exchanged on the wire and in storage
/// (`"NOT_SPECIFIED"`, `"XS_M"`, `"XL_W"`, ...).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TeeShirtSize {
    /// No size chosen.
    #[default]
    #[serde(rename = "NOT_SPECIFIED")]
    NotSpecified,
    /// Extra small, men's cut.
    #[serde(rename = "XS_M")]
    XsM,
    /// Extra small, women's cut.
    #[serde(rename = "XS_W")]
    XsW,
    /// Small, men's cut.
    #[serde(rename = "S_M")]
    SM,
    /// Small, women's cut.
    #[serde(rename = "S_W")]
    SW,
    /// Medium, men's cut.
    #[serde(rename = "M_M")]
    MM,
    /// Medium, women's cut.
    #[serde(rename = "M_W")]
    MW,
    /// Large, men's cut.
    #[serde(rename = "L_M")]
    LM,
    /// Large, women's cut.
    #[serde(rename = "L_W")]
    LW,
    /// Extra large, men's cut.
    #[serde(rename = "XL_M")]
    XlM,
    /// Extra large, women's cut.
    #[serde(rename = "XL_W")]
    XlW,
    /// 2XL, men's cut.
    #[serde(rename = "XXL_M")]
    XxlM,
    /// 2XL, women's cut.
    #[serde(rename = "XXL_W")]
    XxlW,
    /// 3XL, men's cut.
    #[serde(rename = "XXXL_M")]
    XxxlM,
    /// 3XL, women's cut.
    #[serde(rename = "XXXL_W")]
    XxxlW,
}

impl TeeShirtSize {
    /// Every size, in declaration order.
    pub const ALL: [Self; 15] = [
        Self::NotSpecified,
        Self::XsM,
        Self::XsW,
        Self::SM,
        Self::SW,
        Self::MM,
        Self::MW,
        Self::LM,
        Self::LW,
        Self::XlM,
        Self::XlW,
        Self::XxlM,
        Self::XxlW,
        Self::XxxlM,
        Self::XxxlW,
    ];

    /// The wire and storage token.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotSpecified => "NOT_SPECIFIED",
            Self::XsM => "XS_M",
            Self::XsW => "XS_W",
            Self::SM => "S_M",
            Self::SW => "S_W",
            Self::MM => "M_M",
            Self::MW => "M_W",
            Self::LM => "L_M",
            Self::LW => "L_W",
            Self::XlM => "XL_M",
            Self::XlW => "XL_W",
            Self::XxlM => "XXL_M",
            Self::XxlW => "XXL_W",
            Self::XxxlM => "XXXL_M",
            Self::XxxlW => "XXXL_W",
        }
    }

    /// Parse a token strictly.
    ///
    /// # Errors
    ///
    /// Returns [`ParseTeeShirtSizeError`] for any token outside the enum.
    pub fn parse(s: &str) -> Result<Self, ParseTeeShirtSizeError> {
        Self::ALL
            .into_iter()
            .find(|size| size.as_str() == s)
            .ok_or_else(|| ParseTeeShirtSizeError(s.to_string()))
    }

    /// Map a stored token, falling back to [`TeeShirtSize::NotSpecified`]
    /// for values this build does not recognise.
    #[must_use]
    pub fn from_stored(s: &str) -> Self {
        Self::parse(s).unwrap_or_default()
    }
}

impl fmt::Display for TeeShirtSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TeeShirtSize {
    type Err = ParseTeeShirtSizeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// A user's profile, created lazily on first access.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Owner and key.
    pub user_id: ProfileId,
    /// Name shown to other users.
    pub display_name: String,
    /// Contact email.
    pub main_email: String,
    /// Tee-shirt size.
    pub tee_shirt_size: TeeShirtSize,
    /// Conferences the user registered for, in registration order, no duplicates.
    pub conference_keys_to_attend: Vec<ConferenceKey>,
}

impl Profile {
    /// A fresh profile with no registrations.
    #[must_use]
    pub fn new(
        user_id: ProfileId,
        display_name: impl Into<String>,
        main_email: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            display_name: display_name.into(),
            main_email: main_email.into(),
            tee_shirt_size: TeeShirtSize::NotSpecified,
            conference_keys_to_attend: Vec::new(),
        }
    }

    /// Whether the user is registered for `key`.
    #[must_use]
    pub fn is_attending(&self, key: &ConferenceKey) -> bool {
        self.conference_keys_to_attend.contains(key)
    }
}

/// A conference owned by its organizer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conference {
    /// Websafe key.
    pub key: ConferenceKey,
    /// Parent reference to the organizing profile.
    pub organizer: ProfileId,
    /// Required name.
    pub name: String,
    /// Free-form description.
    pub description: Option<String>,
    /// Topic tags.
    pub topics: Vec<String>,
    /// Host city.
    pub city: String,
    /// First day.
    pub start_date: Option<NaiveDate>,
    /// Last day.
    pub end_date: Option<NaiveDate>,
    /// Month of `start_date`, or 0 when there is none.
    pub month: i32,
    /// Capacity; 0 means nobody can register.
    pub max_attendees: i64,
    /// Remaining capacity.
    pub seats_available: i64,
}

impl Conference {
    /// Set the start date and keep `month` in step with it.
    pub fn set_start_date(&mut self, start_date: Option<NaiveDate>) {
        self.start_date = start_date;
        self.month = start_date.map_or(0, month_of);
    }

    /// Number of seats currently taken.
    #[must_use]
    pub const fn seats_taken(&self) -> i64 {
        self.max_attendees - self.seats_available
    }
}

fn month_of(date: NaiveDate) -> i32 {
    use chrono::Datelike;
    // Datelike::month is always in 1..=12
    i32::try_from(date.month()).unwrap_or(0)
}

/// A session inside a conference. Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Websafe key.
    pub key: SessionKey,
    /// Parent reference to the conference.
    pub conference: ConferenceKey,
    /// Required name.
    pub name: String,
    /// Highlights text.
    pub highlights: Option<String>,
    /// Speaker name.
    pub speaker: String,
    /// Duration in minutes.
    pub duration: Option<i32>,
    /// Day of the session.
    pub date: Option<NaiveDate>,
    /// Start time.
    pub start_time: Option<NaiveTime>,
    /// Type tags such as `Workshop` or `Lecture`.
    pub type_of_session: Vec<String>,
    /// Insertion time; orders name lookups.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Whether the session carries the type tag `tag`.
    #[must_use]
    pub fn has_type(&self, tag: &str) -> bool {
        self.type_of_session.iter().any(|t| t == tag)
    }
}

/// A user's interest in a session. Unique per (user, session).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistEntry {
    /// Entry key.
    pub key: WishlistKey,
    /// Owning user.
    pub user_id: ProfileId,
    /// Parent reference to the session.
    pub session: SessionKey,
    /// Denormalized session name.
    pub session_name: String,
    /// Denormalized session type tags.
    pub type_of_session: Vec<String>,
    /// Insertion time.
    pub created_at: DateTime<Utc>,
}

impl WishlistEntry {
    /// Build an entry for `session`, copying its name and type tags.
    #[must_use]
    pub fn for_session(user_id: ProfileId, session: &Session, created_at: DateTime<Utc>) -> Self {
        Self {
            key: WishlistKey::new(),
            user_id,
            session: session.key,
            session_name: session.name.clone(),
            type_of_session: session.type_of_session.clone(),
            created_at,
        }
    }
}
