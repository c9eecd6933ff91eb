//! Custom Axum extractors.
//!
//! - [`Caller`]: the authenticated user, as forwarded by the gateway
//!
//! # Examples
//!
//! ```ignore
//! use conference_web::extractors::Caller;
//!
//! async fn handler(State(state): State<AppState>, Caller(caller): Caller) -> WebResult<Json<ProfileForm>> {
//!     Ok(Json(state.service.get_profile(&caller).await?))
//! }
//! ```

use crate::error::AppError;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use conference_core::identity::CallerIdentity;

/// Header carrying the authenticated user id. Required.
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the user's email address.
pub const USER_EMAIL_HEADER: &str = "X-User-Email";

/// Header carrying the user's nickname.
pub const USER_NICKNAME_HEADER: &str = "X-User-Nickname";

/// Identity of the calling user.
///
/// Rejects the request with 401 "Authorization required" when
/// [`USER_ID_HEADER`] is missing or blank.
#[derive(Debug, Clone)]
pub struct Caller(pub CallerIdentity);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok());

        let identity = CallerIdentity::resolve(
            header(USER_ID_HEADER),
            header(USER_EMAIL_HEADER),
            header(USER_NICKNAME_HEADER),
        )?;

        tracing::Span::current().record("user_id", identity.user_id.as_str());
        Ok(Self(identity))
    }
}
