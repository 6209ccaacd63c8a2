use tracing::info;
use uuid::Uuid;

use super::dto::{FcmTokenRequest, UpdateUserRequest};
use crate::{
    auth::{
        repo_types::User,
        services::{is_valid_email, normalize_email},
    },
    error::AppError,
    state::AppState,
};

fn require_admin(requester: &User) -> Result<(), AppError> {
    if requester.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin access required".into()))
    }
}

pub async fn list_users(state: &AppState, requester: &User) -> Result<Vec<User>, AppError> {
    require_admin(requester)?;
    Ok(state.users.list_users().await?)
}

/// Owners may edit themselves; admins may edit anyone.
pub async fn update_user(
    state: &AppState,
    requester: &User,
    id: Uuid,
    payload: UpdateUserRequest,
) -> Result<User, AppError> {
    if requester.id != id && !requester.is_admin() {
        return Err(AppError::Forbidden("You can only update your own profile".into()));
    }

    let name = match payload.name {
        Some(n) if n.trim().is_empty() => {
            return Err(AppError::Validation("name must not be blank".into()))
        }
        Some(n) => Some(n.trim().to_string()),
        None => None,
    };
    let email = match payload.email {
        Some(e) => {
            let e = normalize_email(&e);
            if !is_valid_email(&e) {
                return Err(AppError::Validation("Invalid email".into()));
            }
            Some(e)
        }
        None => None,
    };
    if name.is_none() && email.is_none() {
        return Err(AppError::Validation("Nothing to update".into()));
    }

    let user = state
        .users
        .update_user_profile(id, name, email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id = %user.id, by = %requester.id, "user updated");
    Ok(user)
}

pub async fn delete_user(state: &AppState, requester: &User, id: Uuid) -> Result<User, AppError> {
    require_admin(requester)?;
    let user = state
        .users
        .delete_user(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))?;
    info!(user_id = %user.id, by = %requester.id, "user deleted");
    Ok(user)
}

pub async fn update_fcm_token(
    state: &AppState,
    requester: &User,
    payload: FcmTokenRequest,
) -> Result<User, AppError> {
    let token = payload.fcm_token.trim().to_string();
    if token.is_empty() {
        return Err(AppError::Validation("FCM token is required".into()));
    }
    state
        .users
        .set_fcm_token(requester.id, token)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".into()))
}
