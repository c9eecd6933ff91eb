//! Wire messages and their mapping to and from stored entities.
//!
//! Field names follow the public camelCase message shapes. Every
//! entity/form pair has an explicit mapping function; nothing is copied by
//! matching field names at runtime.

use crate::error::ConferenceError;
use crate::filter::FilterSpec;
use crate::keys::{ConferenceKey, ProfileId, SessionKey};
use crate::model::{
    Conference, DEFAULT_CITY, DEFAULT_SESSION_TYPES, DEFAULT_TOPICS, Profile, Session,
    TeeShirtSize, WishlistEntry,
};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M";

/// Parse a date, looking only at the first ten characters (`YYYY-MM-DD`).
///
/// # Errors
///
/// Returns [`ConferenceError::BadRequest`] naming `field` when the value is not a date.
pub fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, ConferenceError> {
    let head = raw.get(..10).unwrap_or(raw);
    NaiveDate::parse_from_str(head, DATE_FORMAT)
        .map_err(|_| ConferenceError::BadRequest(format!("Invalid date for '{field}': {raw}")))
}

/// Parse an `HH:MM` time.
///
/// # Errors
///
/// Returns [`ConferenceError::BadRequest`] naming `field` when the value is not a time.
pub fn parse_time(field: &str, raw: &str) -> Result<NaiveTime, ConferenceError> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| ConferenceError::BadRequest(format!("Invalid time for '{field}': {raw}")))
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_time(time: NaiveTime) -> String {
    time.format(TIME_FORMAT).to_string()
}

fn parse_optional_date(field: &str, raw: Option<&str>) -> Result<Option<NaiveDate>, ConferenceError> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| parse_date(field, s))
        .transpose()
}

fn required_name(kind: &str, name: Option<String>) -> Result<String, ConferenceError> {
    name.map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ConferenceError::BadRequest(format!("{kind} 'name' field required")))
}

fn non_negative_capacity(max_attendees: i64) -> Result<i64, ConferenceError> {
    if max_attendees < 0 {
        return Err(ConferenceError::BadRequest(
            "Conference 'maxAttendees' must not be negative".to_string(),
        ));
    }
    Ok(max_attendees)
}

fn defaults(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Single boolean result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BooleanMessage {
    /// The result.
    pub data: bool,
}

/// Single string result.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringMessage {
    /// The result.
    pub data: String,
}

/// Profile as returned to its owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileForm {
    /// Display name.
    pub display_name: String,
    /// Email.
    pub main_email: String,
    /// Tee-shirt size token.
    pub tee_shirt_size: TeeShirtSize,
    /// Websafe keys of attended conferences, in registration order.
    pub conference_keys_to_attend: Vec<String>,
}

impl ProfileForm {
    /// Map a stored profile.
    #[must_use]
    pub fn from_profile(profile: &Profile) -> Self {
        Self {
            display_name: profile.display_name.clone(),
            main_email: profile.main_email.clone(),
            tee_shirt_size: profile.tee_shirt_size,
            conference_keys_to_attend: profile
                .conference_keys_to_attend
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Editable subset of a profile.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileMiniForm {
    /// New display name.
    pub display_name: Option<String>,
    /// New tee-shirt size token.
    pub tee_shirt_size: Option<String>,
}

impl ProfileMiniForm {
    /// Apply the provided fields to `profile`. Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for an unknown tee-shirt size.
    pub fn apply(&self, profile: &mut Profile) -> Result<bool, ConferenceError> {
        let size = self
            .tee_shirt_size
            .as_deref()
            .map(TeeShirtSize::parse)
            .transpose()
            .map_err(|err| ConferenceError::BadRequest(err.to_string()))?;

        let mut changed = false;
        if let Some(name) = &self.display_name {
            if *name != profile.display_name {
                profile.display_name.clone_from(name);
                changed = true;
            }
        }
        if let Some(size) = size {
            if size != profile.tee_shirt_size {
                profile.tee_shirt_size = size;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// Conference message, used both inbound (create, update) and outbound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceForm {
    /// Name; required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Organizer's user id. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_user_id: Option<String>,
    /// Topic tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
    /// Host city.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    /// `YYYY-MM-DD`, extra characters after the date are ignored.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<String>,
    /// Derived from `startDate`. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub month: Option<i32>,
    /// Capacity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attendees: Option<i64>,
    /// Remaining capacity. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seats_available: Option<i64>,
    /// `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    /// Websafe key. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_key: Option<String>,
    /// Organizer's display name. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organizer_display_name: Option<String>,
}

impl ConferenceForm {
    /// Map a stored conference, attaching the organizer's display name when known.
    #[must_use]
    pub fn from_conference(conference: &Conference, organizer_display_name: Option<&str>) -> Self {
        Self {
            name: Some(conference.name.clone()),
            description: conference.description.clone(),
            organizer_user_id: Some(conference.organizer.to_string()),
            topics: Some(conference.topics.clone()),
            city: Some(conference.city.clone()),
            start_date: conference.start_date.map(format_date),
            month: Some(conference.month),
            max_attendees: Some(conference.max_attendees),
            seats_available: Some(conference.seats_available),
            end_date: conference.end_date.map(format_date),
            websafe_key: Some(conference.key.to_string()),
            organizer_display_name: organizer_display_name.map(str::to_string),
        }
    }

    /// Build a new conference owned by `organizer`, filling defaults.
    ///
    /// Missing city, topics and capacity get their defaults; `month`
    /// follows the start date; every seat starts free.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a missing name, a
    /// negative capacity or a malformed date.
    pub fn into_new_conference(
        self,
        key: ConferenceKey,
        organizer: ProfileId,
    ) -> Result<Conference, ConferenceError> {
        let name = required_name("Conference", self.name)?;
        let max_attendees = non_negative_capacity(self.max_attendees.unwrap_or(0))?;
        let start_date = parse_optional_date("startDate", self.start_date.as_deref())?;
        let end_date = parse_optional_date("endDate", self.end_date.as_deref())?;

        let mut conference = Conference {
            key,
            organizer,
            name,
            description: self.description,
            topics: self
                .topics
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| defaults(&DEFAULT_TOPICS)),
            city: self
                .city
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CITY.to_string()),
            start_date: None,
            end_date,
            month: 0,
            max_attendees,
            seats_available: max_attendees,
        };
        conference.set_start_date(start_date);
        Ok(conference)
    }

    /// Apply the editable fields present in the form to `conference`.
    ///
    /// Capacity is not touched here; see
    /// [`registration::resize`](crate::registration::resize).
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a blank name or a malformed date.
    pub fn apply_update(&self, conference: &mut Conference) -> Result<(), ConferenceError> {
        if let Some(name) = &self.name {
            conference.name = required_name("Conference", Some(name.clone()))?;
        }
        if let Some(description) = &self.description {
            conference.description = Some(description.clone());
        }
        if let Some(topics) = &self.topics {
            conference.topics.clone_from(topics);
        }
        if let Some(city) = &self.city {
            conference.city.clone_from(city);
        }
        if let Some(raw) = &self.start_date {
            let start_date = parse_optional_date("startDate", Some(raw.as_str()))?;
            conference.set_start_date(start_date);
        }
        if let Some(raw) = &self.end_date {
            conference.end_date = parse_optional_date("endDate", Some(raw.as_str()))?;
        }
        Ok(())
    }
}

/// Several conferences.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConferenceForms {
    /// The conferences.
    pub items: Vec<ConferenceForm>,
}

/// Inbound filter triple of a conference query.
pub type ConferenceQueryForm = FilterSpec;

/// Inbound conference query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConferenceQueryForms {
    /// Conjunctive filters, in the order given.
    pub filters: Vec<ConferenceQueryForm>,
}

/// Session message, used inbound (create) and outbound.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionForm {
    /// Name; required on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Highlights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub highlights: Option<String>,
    /// Speaker; defaults to the caller's nickname.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    /// Duration in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    /// `YYYY-MM-DD`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// `HH:MM`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    /// Type tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_session: Option<Vec<String>>,
    /// Websafe key of the parent conference; required on create.
    #[serde(rename = "confwebsafeKey", skip_serializing_if = "Option::is_none")]
    pub conf_websafe_key: Option<String>,
    /// Websafe key of the session. Ignored inbound.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub websafe_key: Option<String>,
}

impl SessionForm {
    /// Map a stored session.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            name: Some(session.name.clone()),
            highlights: session.highlights.clone(),
            speaker: Some(session.speaker.clone()),
            duration: session.duration,
            date: session.date.map(format_date),
            start_time: session.start_time.map(format_time),
            type_of_session: Some(session.type_of_session.clone()),
            conf_websafe_key: Some(session.conference.to_string()),
            websafe_key: Some(session.key.to_string()),
        }
    }

    /// Build a new session under `conference`.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::BadRequest`] for a missing name or a
    /// malformed date or time.
    pub fn into_new_session(
        self,
        key: SessionKey,
        conference: ConferenceKey,
        default_speaker: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Session, ConferenceError> {
        let name = required_name("Session", self.name)?;
        let date = parse_optional_date("date", self.date.as_deref())?;
        let start_time = self
            .start_time
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(|s| parse_time("startTime", s))
            .transpose()?;

        Ok(Session {
            key,
            conference,
            name,
            highlights: self.highlights,
            speaker: self
                .speaker
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| default_speaker.to_string()),
            duration: self.duration,
            date,
            start_time,
            type_of_session: self
                .type_of_session
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| defaults(&DEFAULT_SESSION_TYPES)),
            created_at,
        })
    }
}

/// Several sessions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionForms {
    /// The sessions.
    pub items: Vec<SessionForm>,
}

/// Wishlist message. Inbound only `sessionName` is read.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WishlistForm {
    /// Session name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_name: Option<String>,
    /// Owning user.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Websafe session key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,
    /// Session type tags.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_of_session: Option<Vec<String>>,
}

impl WishlistForm {
    /// Map a stored wishlist entry.
    #[must_use]
    pub fn from_entry(entry: &WishlistEntry) -> Self {
        Self {
            session_name: Some(entry.session_name.clone()),
            user_id: Some(entry.user_id.to_string()),
            session_key: Some(entry.session.to_string()),
            type_of_session: Some(entry.type_of_session.clone()),
        }
    }
}

/// Several wishlist entries.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WishlistForms {
    /// The entries.
    pub items: Vec<WishlistForm>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ErrorKind;
    use chrono::TimeZone;

    fn organizer() -> ProfileId {
        ProfileId::new("organizer-1")
    }

    #[test]
    fn new_conference_gets_defaults() {
        let form = ConferenceForm {
            name: Some("RustConf".to_string()),
            ..ConferenceForm::default()
        };
        let conference = form.into_new_conference(ConferenceKey::new(), organizer()).unwrap();
        assert_eq!(conference.city, "Default City");
        assert_eq!(conference.topics, ["Default", "Topic"]);
        assert_eq!(conference.max_attendees, 0);
        assert_eq!(conference.seats_available, 0);
        assert_eq!(conference.month, 0);
    }

    #[test]
    fn new_conference_parses_dates_and_capacity() {
        let form = ConferenceForm {
            name: Some("RustConf".to_string()),
            start_date: Some("2026-09-08T00:00:00.000Z".to_string()),
            end_date: Some("2026-09-11".to_string()),
            max_attendees: Some(300),
            city: Some("Seattle".to_string()),
            ..ConferenceForm::default()
        };
        let conference = form.into_new_conference(ConferenceKey::new(), organizer()).unwrap();
        assert_eq!(conference.start_date, NaiveDate::from_ymd_opt(2026, 9, 8));
        assert_eq!(conference.end_date, NaiveDate::from_ymd_opt(2026, 9, 11));
        assert_eq!(conference.month, 9);
        assert_eq!(conference.seats_available, 300);
        assert_eq!(conference.city, "Seattle");
    }

    #[test]
    fn new_conference_requires_a_name() {
        let err = ConferenceForm::default()
            .into_new_conference(ConferenceKey::new(), organizer())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
        assert_eq!(err.to_string(), "Conference 'name' field required");
    }

    #[test]
    fn new_conference_rejects_bad_input() {
        let bad_date = ConferenceForm {
            name: Some("X".to_string()),
            start_date: Some("09/08/2026".to_string()),
            ..ConferenceForm::default()
        };
        assert!(bad_date.into_new_conference(ConferenceKey::new(), organizer()).is_err());

        let negative = ConferenceForm {
            name: Some("X".to_string()),
            max_attendees: Some(-5),
            ..ConferenceForm::default()
        };
        let err = negative
            .into_new_conference(ConferenceKey::new(), organizer())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }

    #[test]
    fn conference_form_round_trips_through_json_in_camel_case() {
        let conference = ConferenceForm {
            name: Some("RustConf".to_string()),
            max_attendees: Some(10),
            ..ConferenceForm::default()
        }
        .into_new_conference(ConferenceKey::new(), organizer())
        .unwrap();

        let json = serde_json::to_value(ConferenceForm::from_conference(&conference, Some("Org"))).unwrap();
        assert_eq!(json["maxAttendees"], 10);
        assert_eq!(json["seatsAvailable"], 10);
        assert_eq!(json["organizerDisplayName"], "Org");
        assert_eq!(json["websafeKey"], conference.key.to_string());
        assert!(json.get("startDate").is_none());
    }

    #[test]
    fn update_touches_only_present_fields() {
        let mut conference = ConferenceForm {
            name: Some("Old".to_string()),
            city: Some("Paris".to_string()),
            ..ConferenceForm::default()
        }
        .into_new_conference(ConferenceKey::new(), organizer())
        .unwrap();

        let update = ConferenceForm {
            description: Some("Now with more crabs".to_string()),
            start_date: Some("2026-05-01".to_string()),
            ..ConferenceForm::default()
        };
        update.apply_update(&mut conference).unwrap();
        assert_eq!(conference.name, "Old");
        assert_eq!(conference.city, "Paris");
        assert_eq!(conference.month, 5);
        assert_eq!(conference.description.as_deref(), Some("Now with more crabs"));

        let blank = ConferenceForm {
            name: Some("  ".to_string()),
            ..ConferenceForm::default()
        };
        assert!(blank.apply_update(&mut conference).is_err());
    }

    #[test]
    fn new_session_defaults_speaker_and_types() {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let form = SessionForm {
            name: Some("Async Rust".to_string()),
            start_time: Some("18:30".to_string()),
            date: Some("2026-09-09".to_string()),
            ..SessionForm::default()
        };
        let session = form
            .into_new_session(SessionKey::new(), ConferenceKey::new(), "ferris", created_at)
            .unwrap();
        assert_eq!(session.speaker, "ferris");
        assert_eq!(session.type_of_session, ["Workshop", "Lecture"]);
        assert_eq!(session.start_time, NaiveTime::from_hms_opt(18, 30, 0));

        let out = SessionForm::from_session(&session);
        assert_eq!(out.start_time.as_deref(), Some("18:30"));
        assert_eq!(out.date.as_deref(), Some("2026-09-09"));
    }

    #[test]
    fn new_session_validates_name_and_time() {
        let created_at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let err = SessionForm::default()
            .into_new_session(SessionKey::new(), ConferenceKey::new(), "x", created_at)
            .unwrap_err();
        assert_eq!(err.to_string(), "Session 'name' field required");

        let bad_time = SessionForm {
            name: Some("S".to_string()),
            start_time: Some("7pm".to_string()),
            ..SessionForm::default()
        };
        assert!(bad_time
            .into_new_session(SessionKey::new(), ConferenceKey::new(), "x", created_at)
            .is_err());
    }

    #[test]
    fn session_form_uses_conf_websafe_key_on_the_wire() {
        let form: SessionForm =
            serde_json::from_str(r#"{"name":"S","confwebsafeKey":"abc","typeOfSession":["Talk"]}"#)
                .unwrap();
        assert_eq!(form.conf_websafe_key.as_deref(), Some("abc"));
        assert_eq!(form.type_of_session, Some(vec!["Talk".to_string()]));
    }

    #[test]
    fn profile_mini_form_validates_size() {
        let mut profile = Profile::new(ProfileId::new("u"), "U", "u@example.com");
        let form = ProfileMiniForm {
            display_name: Some("Ferris".to_string()),
            tee_shirt_size: Some("L_W".to_string()),
        };
        assert!(form.apply(&mut profile).unwrap());
        assert_eq!(profile.tee_shirt_size, TeeShirtSize::LW);
        assert!(!form.apply(&mut profile).unwrap());

        let bad = ProfileMiniForm {
            display_name: Some("Nope".to_string()),
            tee_shirt_size: Some("GIANT".to_string()),
        };
        assert_eq!(bad.apply(&mut profile).unwrap_err().kind(), ErrorKind::BadRequest);
        assert_eq!(profile.display_name, "Ferris");
    }
}
