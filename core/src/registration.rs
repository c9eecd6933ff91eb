//! Pure seat-registration transitions.
//!
//! These functions mutate an in-memory profile/conference pair. They never
//! touch storage: the caller reads both entities, applies a transition and
//! commits both writes together with the versions it read, so a concurrent
//! change to either entity surfaces as a conflict instead of a lost update.
//!
//! A transition that fails leaves both entities untouched.

use crate::error::ConferenceError;
use crate::model::{Conference, Profile};

/// Message for a second registration by the same user.
pub const ALREADY_REGISTERED: &str = "You have already registered for this conference";

/// Message for a registration against a full conference.
pub const NO_SEATS_AVAILABLE: &str = "There are no seats available.";

/// Register `profile` for `conference`, taking one seat.
///
/// # Errors
///
/// Returns [`ConferenceError::Conflict`] if the user is already registered
/// or no seats are left. Neither entity is modified in that case.
pub fn register(profile: &mut Profile, conference: &mut Conference) -> Result<(), ConferenceError> {
    if profile.is_attending(&conference.key) {
        return Err(ConferenceError::Conflict(ALREADY_REGISTERED.to_string()));
    }
    if conference.seats_available <= 0 {
        return Err(ConferenceError::Conflict(NO_SEATS_AVAILABLE.to_string()));
    }

    profile.conference_keys_to_attend.push(conference.key);
    conference.seats_available -= 1;
    Ok(())
}

/// Release `profile`'s seat at `conference`.
///
/// Returns `false` and changes nothing if the user was not registered.
pub fn unregister(profile: &mut Profile, conference: &mut Conference) -> bool {
    let Some(position) = profile
        .conference_keys_to_attend
        .iter()
        .position(|key| *key == conference.key)
    else {
        return false;
    };

    profile.conference_keys_to_attend.remove(position);
    conference.seats_available = (conference.seats_available + 1).min(conference.max_attendees);
    true
}

/// Change a conference's capacity, shifting the free seats by the same delta
/// so the number of seats already taken is preserved.
///
/// # Errors
///
/// - [`ConferenceError::BadRequest`] for a negative capacity
/// - [`ConferenceError::Conflict`] if more seats are taken than the new capacity allows
pub fn resize(conference: &mut Conference, max_attendees: i64) -> Result<(), ConferenceError> {
    if max_attendees < 0 {
        return Err(ConferenceError::BadRequest(
            "Conference 'maxAttendees' must not be negative".to_string(),
        ));
    }

    let seats_available = conference.seats_available + (max_attendees - conference.max_attendees);
    if seats_available < 0 {
        return Err(ConferenceError::Conflict(format!(
            "Cannot reduce capacity to {max_attendees}: {} seats are already taken",
            conference.seats_taken()
        )));
    }

    conference.max_attendees = max_attendees;
    conference.seats_available = seats_available;
    Ok(())
}
