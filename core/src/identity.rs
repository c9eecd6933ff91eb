//! Caller identity resolved by the authenticating layer.

use crate::error::ConferenceError;
use crate::keys::ProfileId;

/// Message returned when no identity accompanies a request.
pub const AUTHORIZATION_REQUIRED: &str = "Authorization required";

/// The authenticated user behind a request.
///
/// Passed explicitly into every operation that needs to know who is calling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Stable user id; keys the caller's profile.
    pub user_id: ProfileId,
    /// Email address, used for new profiles and confirmations.
    pub email: String,
    /// Nickname, used as default display name and default speaker.
    pub nickname: String,
}

impl CallerIdentity {
    /// Build an identity from raw values as forwarded by a gateway.
    ///
    /// A missing email falls back to empty; a missing nickname falls back to
    /// the local part of the email, then to the user id.
    ///
    /// # Errors
    ///
    /// Returns [`ConferenceError::Unauthorized`] when `user_id` is absent or blank.
    pub fn resolve(
        user_id: Option<&str>,
        email: Option<&str>,
        nickname: Option<&str>,
    ) -> Result<Self, ConferenceError> {
        let user_id: ProfileId = user_id
            .and_then(|raw| raw.parse().ok())
            .ok_or_else(|| ConferenceError::Unauthorized(AUTHORIZATION_REQUIRED.to_string()))?;

        let email = email.map(str::trim).unwrap_or_default().to_string();
        let nickname = nickname
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .or_else(|| {
                email
                    .split('@')
                    .next()
                    .filter(|local| !local.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| user_id.to_string());

        Ok(Self {
            user_id,
            email,
            nickname,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn missing_user_id_is_unauthorized() {
        let err = CallerIdentity::resolve(None, Some("a@b.c"), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unauthorized);
        assert_eq!(err.to_string(), AUTHORIZATION_REQUIRED);
        assert!(CallerIdentity::resolve(Some("  "), None, None).is_err());
    }

    #[test]
    fn nickname_falls_back_to_email_then_id() {
        let caller = CallerIdentity::resolve(Some("42"), Some("ada@example.com"), None).unwrap();
        assert_eq!(caller.nickname, "ada");

        let caller = CallerIdentity::resolve(Some("42"), None, Some("")).unwrap();
        assert_eq!(caller.nickname, "42");
        assert_eq!(caller.email, "");

        let caller = CallerIdentity::resolve(Some("42"), None, Some("Ada L")).unwrap();
        assert_eq!(caller.nickname, "Ada L");
    }
}
