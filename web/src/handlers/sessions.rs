//! Session handlers.

use super::{ConferenceParams, ConferenceTypeParams};
use crate::WebResult;
use crate::extractors::Caller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use conference_core::forms::{SessionForm, SessionForms, StringMessage};

/// Create a session in a conference the caller organizes.
///
/// ```text
/// POST /session
/// ```
pub async fn create_session(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(form): Json<SessionForm>,
) -> WebResult<(StatusCode, Json<SessionForm>)> {
    let created = state.service.create_session(&caller, form).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// All sessions of a conference.
///
/// ```text
/// GET /sessionQuery?websafeConferenceKey=
/// ```
pub async fn get_conference_sessions(
    State(state): State<AppState>,
    Query(params): Query<ConferenceParams>,
) -> WebResult<Json<SessionForms>> {
    let sessions = state
        .service
        .get_conference_sessions(&params.websafe_conference_key)
        .await?;
    Ok(Json(sessions))
}

/// Sessions of a conference carrying a type tag.
///
/// ```text
/// GET /queryType?websafeConferenceKey=&typeOfSession=
/// ```
pub async fn get_conference_sessions_by_type(
    State(state): State<AppState>,
    Query(params): Query<ConferenceTypeParams>,
) -> WebResult<Json<SessionForms>> {
    let sessions = state
        .service
        .get_conference_sessions_by_type(&params.websafe_conference_key, &params.type_of_session)
        .await?;
    Ok(Json(sessions))
}

/// Sessions given by a speaker, across conferences.
///
/// ```text
/// GET /session/:speaker
/// ```
pub async fn get_sessions_by_speaker(
    State(state): State<AppState>,
    Path(speaker): Path<String>,
) -> WebResult<Json<SessionForms>> {
    Ok(Json(state.service.get_sessions_by_speaker(&speaker).await?))
}

/// Sessions of a conference that are not workshops and start by 19:00.
///
/// ```text
/// GET /sessionProblemQuery?websafeConferenceKey=
/// ```
pub async fn problematic_query(
    State(state): State<AppState>,
    Query(params): Query<ConferenceParams>,
) -> WebResult<Json<SessionForms>> {
    let sessions = state
        .service
        .problematic_query(&params.websafe_conference_key)
        .await?;
    Ok(Json(sessions))
}

/// Current featured speaker message, empty when there is none.
///
/// ```text
/// GET /featuredSpeaker
/// ```
pub async fn get_featured_speaker(State(state): State<AppState>) -> Json<StringMessage> {
    Json(state.service.get_featured_speaker().await)
}
