use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, patch},
    Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{FcmTokenRequest, UpdateUserRequest},
    services,
};
use crate::{
    auth::{
        dto::PublicUser,
        extractors::{AuthUser, MaybeAuthUser},
    },
    error::AppError,
    extract::{AppJson, AppPath},
    response::ApiResponse,
    state::AppState,
};

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/me", get(get_me))
        .route("/users/update/:id", patch(update_user))
        .route("/users/delete/:id", delete(delete_user))
        .route("/users/fcm-token", patch(update_fcm_token))
}

#[instrument(skip_all)]
pub async fn get_me(MaybeAuthUser(user): MaybeAuthUser) -> ApiResponse<PublicUser> {
    match user {
        Some(u) => ApiResponse::ok(u.into(), "User data retrieved successfully"),
        None => ApiResponse::new(StatusCode::OK, None, "User is not authenticated"),
    }
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_users(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<ApiResponse<Vec<PublicUser>>, AppError> {
    let users = services::list_users(&state, &user).await?;
    Ok(ApiResponse::ok(
        users.into_iter().map(PublicUser::from).collect(),
        "Users retrieved successfully",
    ))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateUserRequest>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let updated = services::update_user(&state, &user, id, payload).await?;
    Ok(ApiResponse::ok(updated.into(), "User updated successfully"))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_user(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let deleted = services::delete_user(&state, &user, id).await?;
    Ok(ApiResponse::ok(deleted.into(), "User deleted successfully"))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_fcm_token(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<FcmTokenRequest>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let updated = services::update_fcm_token(&state, &user, payload).await?;
    Ok(ApiResponse::ok(updated.into(), "FCM token updated successfully"))
}
