//! Builders for test entities, forms and identities.

use conference_core::forms::{ConferenceForm, SessionForm};
use conference_core::identity::CallerIdentity;
use conference_core::keys::{ConferenceKey, ProfileId, SessionKey};
use conference_core::model::{Conference, DEFAULT_CITY, Profile, Session};
use chrono::{DateTime, Utc};

/// Caller with id `id`, email `<id>@example.com` and nickname `id`.
#[must_use]
pub fn caller(id: &str) -> CallerIdentity {
    CallerIdentity {
        user_id: ProfileId::new(id),
        email: format!("{id}@example.com"),
        nickname: id.to_string(),
    }
}

/// Fresh profile matching [`caller`].
#[must_use]
pub fn profile(id: &str) -> Profile {
    Profile::new(ProfileId::new(id), id, format!("{id}@example.com"))
}

/// Conference with every seat free, organized by `"organizer"`.
#[must_use]
pub fn conference(name: &str, max_attendees: i64) -> Conference {
    Conference {
        key: ConferenceKey::new(),
        organizer: ProfileId::new("organizer"),
        name: name.to_string(),
        description: None,
        topics: vec!["Rust".to_string()],
        city: DEFAULT_CITY.to_string(),
        start_date: None,
        end_date: None,
        month: 0,
        max_attendees,
        seats_available: max_attendees,
    }
}

/// Session under `conference` with the given speaker and default types.
#[must_use]
pub fn session(conference: ConferenceKey, name: &str, speaker: &str) -> Session {
    Session {
        key: SessionKey::new(),
        conference,
        name: name.to_string(),
        highlights: None,
        speaker: speaker.to_string(),
        duration: Some(45),
        date: None,
        start_time: None,
        type_of_session: vec!["Lecture".to_string()],
        created_at: DateTime::<Utc>::UNIX_EPOCH,
    }
}

/// Create-conference form with a name and capacity.
#[must_use]
pub fn conference_form(name: &str, max_attendees: i64) -> ConferenceForm {
    ConferenceForm {
        name: Some(name.to_string()),
        max_attendees: Some(max_attendees),
        ..ConferenceForm::default()
    }
}

/// Create-session form under `conference`.
#[must_use]
pub fn session_form(
    conference: ConferenceKey,
    name: &str,
    speaker: &str,
    types: &[&str],
    start_time: Option<&str>,
) -> SessionForm {
    SessionForm {
        name: Some(name.to_string()),
        speaker: Some(speaker.to_string()),
        type_of_session: Some(types.iter().map(|t| (*t).to_string()).collect()),
        start_time: start_time.map(str::to_string),
        conf_websafe_key: Some(conference.to_string()),
        ..SessionForm::default()
    }
}
