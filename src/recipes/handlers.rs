use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::header,
    response::{IntoResponse, Response},
    routing::{delete, get, patch, post},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, ImportSummary, ListRecipesQuery, RecipeListItem, UpdateRecipeRequest},
    export, import,
    repo_types::Recipe,
    services,
};
use crate::{
    auth::extractors::{AuthUser, MaybeAuthUser},
    error::AppError,
    extract::{AppJson, AppPath, AppQuery},
    response::ApiResponse,
    state::AppState,
};

// --- routers ---

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/recipes/getRecipes", get(list_recipes))
        .route("/recipes/export", get(export_recipes))
}

pub fn write_routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/recipes/register", post(create_recipe))
        .route("/recipes/update/:id", patch(update_recipe))
        .route("/recipes/delete/:id", delete(delete_recipe))
        .route(
            "/recipes/import",
            post(import_recipes).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
}

// --- handlers ---

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn create_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppJson(payload): AppJson<CreateRecipeRequest>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let recipe = services::create_recipe(&state, &user, payload).await?;
    Ok(ApiResponse::created(recipe, "New recipe added successfully"))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
    AppJson(payload): AppJson<UpdateRecipeRequest>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let recipe = services::update_recipe(&state, &user, id, payload).await?;
    Ok(ApiResponse::ok(recipe, "Recipe updated successfully"))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn delete_recipe(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    AppPath(id): AppPath<Uuid>,
) -> Result<ApiResponse<Recipe>, AppError> {
    let recipe = services::delete_recipe(&state, &user, id).await?;
    Ok(ApiResponse::ok(recipe, "Recipe deleted successfully"))
}

#[instrument(skip(state, user))]
pub async fn list_recipes(
    State(state): State<AppState>,
    MaybeAuthUser(user): MaybeAuthUser,
    AppQuery(query): AppQuery<ListRecipesQuery>,
) -> Result<ApiResponse<Vec<RecipeListItem>>, AppError> {
    let items = services::list_recipes(&state, user.as_ref(), query).await?;
    Ok(ApiResponse::ok(items, "Recipe retrieved successfully"))
}

/// POST /recipes/import (multipart, field `file`)
#[instrument(skip(state, user, mp), fields(user_id = %user.id))]
pub async fn import_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<ImportSummary>, AppError> {
    let mut mp = mp?;
    let mut upload = None;
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            upload = Some(data);
            break;
        }
    }
    let data = upload.ok_or_else(|| {
        AppError::BadRequest("File not found. Please upload a CSV file.".into())
    })?;

    let imported = import::import_upload(&state, data).await?;
    info!(imported, "recipes imported");
    Ok(ApiResponse::ok(
        ImportSummary { imported },
        "Recipes imported successfully",
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn export_recipes(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Response, AppError> {
    let body = export::export_body(&state).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"recipes.csv\""),
        ],
        body,
    )
        .into_response())
}
