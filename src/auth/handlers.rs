use axum::{
    extract::State,
    http::header::SET_COOKIE,
    response::IntoResponse,
    routing::post,
    Router,
};
use tracing::{info, instrument};

use crate::{
    auth::{
        dto::{LoginRequest, LoginResponse, PublicUser, RegisterRequest},
        services,
        session::{clear_session_cookie, session_cookie},
    },
    error::AppError,
    extract::AppJson,
    response::ApiResponse,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/users/register", post(register))
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    AppJson(payload): AppJson<RegisterRequest>,
) -> Result<ApiResponse<PublicUser>, AppError> {
    let user = services::register(&state, payload).await?;
    Ok(ApiResponse::created(user.into(), "User registered successfully"))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (user, token) = services::login(&state, payload).await?;
    let cookie = session_cookie(
        &token,
        state.config.session_ttl_secs(),
        state.config.cookie.secure,
    )?;

    Ok((
        [(SET_COOKIE, cookie)],
        ApiResponse::ok(
            LoginResponse {
                user: user.into(),
                token,
            },
            "User logged in successfully",
        ),
    ))
}

/// Always clears the cookie, with or without a session.
#[instrument(skip(state))]
pub async fn logout(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let cookie = clear_session_cookie(state.config.cookie.secure)?;
    info!("session cookie cleared");
    Ok(([(SET_COOKIE, cookie)], ApiResponse::message("User logged out successfully")))
}
