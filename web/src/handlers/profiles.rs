//! Profile handlers.

use crate::WebResult;
use crate::extractors::Caller;
use crate::state::AppState;
use axum::{Json, extract::State};
use conference_core::forms::{ProfileForm, ProfileMiniForm};

/// The caller's profile, created on first access.
///
/// ```text
/// GET /profile
/// ```
pub async fn get_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> WebResult<Json<ProfileForm>> {
    Ok(Json(state.service.get_profile(&caller).await?))
}

/// Update the caller's display name or tee-shirt size.
///
/// ```text
/// POST /profile
/// ```
pub async fn save_profile(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(form): Json<ProfileMiniForm>,
) -> WebResult<Json<ProfileForm>> {
    Ok(Json(state.service.save_profile(&caller, form).await?))
}
