//! HTTP request handlers.
//!
//! One module per area; every handler is a thin translation between the
//! wire forms and a [`ConferenceService`](conference_runtime::ConferenceService) call.

pub mod conferences;
pub mod health;
pub mod profiles;
pub mod sessions;
pub mod wishlist;

use serde::Deserialize;

/// `?websafeConferenceKey=` query parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceParams {
    /// Conference to scope the query to.
    pub websafe_conference_key: String,
}

/// `?websafeConferenceKey=&typeOfSession=` query parameters.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConferenceTypeParams {
    /// Conference to scope the query to.
    pub websafe_conference_key: String,
    /// Session type tag.
    pub type_of_session: String,
}

/// `?typeOfSession=` query parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeParams {
    /// Session type tag.
    pub type_of_session: String,
}

/// `?speaker=` query parameter.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SpeakerParams {
    /// Speaker name.
    pub speaker: String,
}
