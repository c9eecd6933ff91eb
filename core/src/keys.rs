//! Entity identifiers and optimistic-concurrency versions.
//!
//! Every stored entity is addressed by a strong key type. Conferences,
//! sessions and wishlist entries get generated UUID keys whose string form is
//! the "websafe key" exchanged with clients. Profiles are keyed by the
//! caller's stable user id.
//!
//! Parent relationships (organizer of a conference, conference of a session,
//! owner of a wishlist entry) are plain fields on the child entity that hold
//! one of these keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when a websafe key cannot be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid {kind} key: {value}")]
pub struct ParseKeyError {
    kind: &'static str,
    value: String,
}

impl ParseKeyError {
    /// The rejected input.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

/// Stable identifier of a caller and the key of their [`Profile`](crate::model::Profile).
///
/// # Examples
///
/// ```
/// use conference_core::keys::ProfileId;
///
/// let id: ProfileId = "user-42".parse().unwrap();
/// assert_eq!(id.as_str(), "user-42");
/// assert!("".parse::<ProfileId>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileId(String);

impl ProfileId {
    /// Wrap an already validated user id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The user id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return the inner string.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ProfileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ProfileId {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ParseKeyError {
                kind: "profile",
                value: s.to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for ProfileId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

macro_rules! uuid_key {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generate a fresh random key.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wrap an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// The underlying UUID.
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseKeyError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim())
                    .map(Self)
                    .map_err(|_| ParseKeyError {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }
    };
}

uuid_key!(
    /// Websafe key of a [`Conference`](crate::model::Conference).
    ///
    /// ```
    /// use conference_core::keys::ConferenceKey;
    ///
    /// let key = ConferenceKey::new();
    /// let parsed: ConferenceKey = key.to_string().parse().unwrap();
    /// assert_eq!(key, parsed);
    /// ```
    ConferenceKey,
    "conference"
);

uuid_key!(
    /// Websafe key of a [`Session`](crate::model::Session).
    SessionKey,
    "session"
);

uuid_key!(
    /// Key of a [`WishlistEntry`](crate::model::WishlistEntry).
    WishlistKey,
    "wishlist"
);

/// Version number of a stored entity, used for optimistic concurrency.
///
/// The first stored revision of an entity has [`Version::INITIAL`]; every
/// successful commit of a mutation bumps it by one. A commit that names an
/// expected version which no longer matches is rejected with a conflict.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(u64);

impl Version {
    /// Version of a freshly inserted entity.
    pub const INITIAL: Self = Self(1);

    /// Create a version from a raw number.
    #[must_use]
    pub const fn new(version: u64) -> Self {
        Self(version)
    }

    /// The raw version number.
    #[must_use]
    pub const fn value(&self) -> u64 {
        self.0
    }

    /// The version that follows this one.
    #[must_use]
    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
