use axum::extract::FromRef;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, warn};

use super::{
    dto::{LoginRequest, RegisterRequest},
    jwt::JwtKeys,
    password::{hash_password_blocking, verify_password_blocking},
    repo_types::{NewUser, Role, User},
};
use crate::{error::AppError, state::AppState};

/// Same message for unknown email and wrong password.
pub const INVALID_CREDENTIALS: &str = "Invalid email or password";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn register(state: &AppState, payload: RegisterRequest) -> Result<User, AppError> {
    let name = payload.name.trim().to_string();
    let email = normalize_email(&payload.email);

    if name.is_empty() || email.is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }
    if !is_valid_email(&email) {
        warn!(email = %email, "invalid email");
        return Err(AppError::Validation("Invalid email".into()));
    }

    if state.users.find_user_by_email(&email).await?.is_some() {
        warn!(email = %email, "email already registered");
        return Err(AppError::Conflict("User with email already exists".into()));
    }

    let password_hash = hash_password_blocking(payload.password).await?;

    // A concurrent registration can still win the race; the unique
    // constraint turns that into the same conflict.
    let user = state
        .users
        .create_user(NewUser {
            name,
            email,
            password_hash,
            role: Role::Standard,
        })
        .await?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok(user)
}

/// Returns the user and a freshly signed session token.
pub async fn login(state: &AppState, payload: LoginRequest) -> Result<(User, String), AppError> {
    let email = normalize_email(&payload.email);
    if email.is_empty() || payload.password.trim().is_empty() {
        return Err(AppError::Validation("All fields are required".into()));
    }

    let Some(user) = state.users.find_user_by_email(&email).await? else {
        warn!(email = %email, "login unknown email");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    };

    let ok = verify_password_blocking(payload.password, user.password_hash.clone()).await?;
    if !ok {
        warn!(email = %email, user_id = %user.id, "login invalid password");
        return Err(AppError::Unauthorized(INVALID_CREDENTIALS.into()));
    }

    let token = JwtKeys::from_ref(state).sign(user.id)?;
    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((user, token))
}
