//! Conference handlers: CRUD, registration, queries and the announcement.

use crate::WebResult;
use crate::extractors::Caller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conference_core::forms::{
    BooleanMessage, ConferenceForm, ConferenceForms, ConferenceQueryForms, StringMessage,
};

/// Create a conference organized by the caller.
///
/// ```text
/// POST /conference
/// ```
pub async fn create_conference(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(form): Json<ConferenceForm>,
) -> WebResult<(StatusCode, Json<ConferenceForm>)> {
    let created = state.service.create_conference(&caller, form).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a conference. Organizer only.
///
/// ```text
/// PUT /conference/:websafe_key
/// ```
pub async fn update_conference(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(websafe_key): Path<String>,
    Json(form): Json<ConferenceForm>,
) -> WebResult<Json<ConferenceForm>> {
    let updated = state
        .service
        .update_conference(&caller, &websafe_key, form)
        .await?;
    Ok(Json(updated))
}

/// Fetch one conference.
///
/// ```text
/// GET /conference/:websafe_key
/// ```
pub async fn get_conference(
    State(state): State<AppState>,
    Path(websafe_key): Path<String>,
) -> WebResult<Json<ConferenceForm>> {
    Ok(Json(state.service.get_conference(&websafe_key).await?))
}

/// Register the caller for a conference.
///
/// ```text
/// POST /conference/:websafe_key/registration
/// ```
pub async fn register_for_conference(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(websafe_key): Path<String>,
) -> WebResult<Json<BooleanMessage>> {
    let data = state
        .service
        .register_for_conference(&caller, &websafe_key)
        .await?;
    Ok(Json(BooleanMessage { data }))
}

/// Unregister the caller from a conference.
///
/// ```text
/// DELETE /conference/:websafe_key/registration
/// ```
pub async fn unregister_from_conference(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Path(websafe_key): Path<String>,
) -> WebResult<Json<BooleanMessage>> {
    let data = state
        .service
        .unregister_from_conference(&caller, &websafe_key)
        .await?;
    Ok(Json(BooleanMessage { data }))
}

/// Conferences organized by the caller.
///
/// ```text
/// POST /getConferencesCreated
/// ```
pub async fn get_conferences_created(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> WebResult<Json<ConferenceForms>> {
    Ok(Json(state.service.get_conferences_created(&caller).await?))
}

/// Conferences the caller is registered for.
///
/// ```text
/// GET /conferences/attending
/// ```
pub async fn get_conferences_to_attend(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> WebResult<Json<ConferenceForms>> {
    Ok(Json(state.service.get_conferences_to_attend(&caller).await?))
}

/// Filtered conference query. No identity needed.
///
/// ```text
/// POST /queryConferences
/// ```
pub async fn query_conferences(
    State(state): State<AppState>,
    Json(query): Json<ConferenceQueryForms>,
) -> WebResult<Json<ConferenceForms>> {
    Ok(Json(state.service.query_conferences(query).await?))
}

/// Current "nearly sold out" announcement, empty when there is none.
///
/// ```text
/// GET /conference/announcement/get
/// ```
pub async fn get_announcement(State(state): State<AppState>) -> Json<StringMessage> {
    Json(state.service.get_announcement().await)
}
