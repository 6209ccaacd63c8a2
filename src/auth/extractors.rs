use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{debug, warn};

use super::{jwt::JwtKeys, repo_types::User, session::token_from_headers};
use crate::{error::AppError, state::AppState};

/// Authenticated requester; rejects with 401 when there is no valid session.
pub struct AuthUser(pub User);

/// Requester if a valid session is present, otherwise anonymous.
pub struct MaybeAuthUser(pub Option<User>);

/// Missing, malformed, expired or orphaned tokens all resolve to `None`.
/// Only a datastore failure is an error.
async fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(token) = token_from_headers(&parts.headers) else {
        return Ok(None);
    };

    let keys = JwtKeys::from_ref(state);
    let claims = match keys.verify(&token) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "invalid or expired session token");
            return Ok(None);
        }
    };

    let user = state.users.find_user_by_id(claims.sub).await?;
    if user.is_none() {
        warn!(user_id = %claims.sub, "session token for unknown user");
    }
    Ok(user)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        resolve_session(parts, state)
            .await?
            .map(AuthUser)
            .ok_or_else(|| AppError::Unauthorized("Unauthorized request".into()))
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeAuthUser(resolve_session(parts, state).await?))
    }
}
