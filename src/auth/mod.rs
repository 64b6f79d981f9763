//! Password hashing and request-scoped user resolution.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::CookieJar;
use std::convert::Infallible;
use std::sync::Arc;

use crate::db::User;
use crate::{session, AppState};

/// Name of the session cookie holding the encrypted user id.
pub const SESSION_COOKIE: &str = "userId";

/// Work factor for bcrypt. Chosen to resist offline brute force while keeping
/// request latency acceptable. Tests use the minimum cost so they stay fast.
const BCRYPT_COST: u32 = if cfg!(test) { 4 } else { 12 };

/// Hash a password with bcrypt.
pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, BCRYPT_COST)
}

/// Verify a password against a stored hash. A malformed hash counts as a
/// verification failure, not an error.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// The user resolved from the session cookie, if any.
///
/// This extractor never rejects: a missing cookie, a token that fails to
/// decode, or an id with no matching row all yield `MaybeUser(None)`. Handlers
/// that require authentication decide for themselves how to redirect.
pub struct MaybeUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for MaybeUser {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let Some(cookie) = jar.get(SESSION_COOKIE) else {
            return Ok(MaybeUser(None));
        };

        let user_id = match session::decode(cookie.value(), &state.session_key) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "session cookie failed to decode");
                return Ok(MaybeUser(None));
            }
        };

        let user: Option<User> = sqlx::query_as("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&state.db)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "user lookup failed while resolving session");
                None
            });

        Ok(MaybeUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_verify_roundtrip() {
        let hash = hash_password("correct horse").unwrap();
        assert_ne!(hash, "correct horse");
        assert!(verify_password("correct horse", &hash));
        assert!(!verify_password("wrong horse", &hash));
    }

    #[test]
    fn test_verify_malformed_hash_is_false() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
    }
}
