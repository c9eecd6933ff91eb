//! Wishlist handlers. All of them act on the caller's own wishlist.

use super::{SpeakerParams, TypeParams};
use crate::WebResult;
use crate::extractors::Caller;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use conference_core::forms::{WishlistForm, WishlistForms};

/// Add the session named by `sessionName` to the caller's wishlist.
///
/// ```text
/// POST /wishlist
/// ```
pub async fn add_session_to_wishlist(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Json(form): Json<WishlistForm>,
) -> WebResult<(StatusCode, Json<WishlistForm>)> {
    let session_name = form.session_name.unwrap_or_default();
    let entry = state
        .service
        .add_session_to_wishlist(&caller, &session_name)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

/// Every entry of the caller's wishlist.
///
/// ```text
/// GET /wishlistQuery
/// ```
pub async fn get_sessions_in_wishlist(
    State(state): State<AppState>,
    Caller(caller): Caller,
) -> WebResult<Json<WishlistForms>> {
    Ok(Json(state.service.get_sessions_in_wishlist(&caller).await?))
}

/// Wishlist entries whose session carries a type tag.
///
/// ```text
/// GET /wishlistTypeQuery?typeOfSession=
/// ```
pub async fn return_wishlist_type(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<TypeParams>,
) -> WebResult<Json<WishlistForms>> {
    let entries = state
        .service
        .return_wishlist_type(&caller, &params.type_of_session)
        .await?;
    Ok(Json(entries))
}

/// Wishlist entries whose session is given by a speaker.
///
/// ```text
/// GET /wishlistSpeakerQuery?speaker=
/// ```
pub async fn return_wishlist_speaker(
    State(state): State<AppState>,
    Caller(caller): Caller,
    Query(params): Query<SpeakerParams>,
) -> WebResult<Json<WishlistForms>> {
    let entries = state
        .service
        .return_wishlist_speaker(&caller, &params.speaker)
        .await?;
    Ok(Json(entries))
}
