use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateRecipeRequest, ListRecipesQuery, RecipeListItem, UpdateRecipeRequest},
    repo_types::{Cuisine, NewRecipe, Recipe, RecipePatch, RecipeQuery, PAGE_SIZE},
};
use crate::{auth::repo_types::User, error::AppError, state::AppState};

/// Validated, trimmed recipe content shared by create and CSV import.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RecipeFields {
    pub title: String,
    pub ingredients: String,
    pub kind: Cuisine,
    pub instructions: String,
    pub cooking_time: i32,
}

fn required_text(field: &str, value: Option<&str>) -> Result<String, String> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(format!("{} is required", field)),
    }
}

fn parse_kind(value: Option<&str>) -> Result<Cuisine, String> {
    let raw = required_text("type", value)?;
    raw.parse::<Cuisine>().map_err(|e| e.to_string())
}

fn positive_minutes(value: Option<i64>) -> Result<i32, String> {
    match value {
        Some(v) if v > 0 && v <= i32::MAX as i64 => Ok(v as i32),
        Some(_) => Err("cookingTime must be a positive number of minutes".into()),
        None => Err("cookingTime is required".into()),
    }
}

/// Accepts "45" as well as "45.0"; fractional minutes are rejected.
pub(crate) fn parse_minutes(raw: &str) -> Result<Option<i64>, String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    if let Ok(v) = raw.parse::<i64>() {
        return Ok(Some(v));
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v.fract() == 0.0 => Ok(Some(v as i64)),
        _ => Err(format!("cookingTime must be a whole number of minutes (got '{}')", raw)),
    }
}

pub(crate) fn validate_fields(
    title: Option<&str>,
    ingredients: Option<&str>,
    kind: Option<&str>,
    instructions: Option<&str>,
    cooking_time: Option<i64>,
) -> Result<RecipeFields, String> {
    Ok(RecipeFields {
        title: required_text("title", title)?,
        ingredients: required_text("ingredients", ingredients)?,
        kind: parse_kind(kind)?,
        instructions: required_text("instructions", instructions)?,
        cooking_time: positive_minutes(cooking_time)?,
    })
}

fn validate_patch(req: UpdateRecipeRequest) -> Result<RecipePatch, String> {
    let patch = RecipePatch {
        title: match req.title {
            Some(v) => Some(required_text("title", Some(&v))?),
            None => None,
        },
        ingredients: match req.ingredients {
            Some(v) => Some(required_text("ingredients", Some(&v))?),
            None => None,
        },
        kind: match req.kind {
            Some(v) => Some(parse_kind(Some(&v))?),
            None => None,
        },
        instructions: match req.instructions {
            Some(v) => Some(required_text("instructions", Some(&v))?),
            None => None,
        },
        cooking_time: match req.cooking_time {
            Some(v) => Some(positive_minutes(Some(v))?),
            None => None,
        },
    };
    if patch.is_empty() {
        return Err("Nothing to update".into());
    }
    Ok(patch)
}

fn ensure_can_modify(requester: &User, recipe: &Recipe) -> Result<(), AppError> {
    if requester.is_admin() || recipe.created_by == requester.id {
        Ok(())
    } else {
        warn!(user_id = %requester.id, recipe_id = %recipe.id, "modification of foreign recipe refused");
        Err(AppError::Forbidden("You can only modify your own recipes".into()))
    }
}

pub async fn create_recipe(
    state: &AppState,
    owner: &User,
    req: CreateRecipeRequest,
) -> Result<Recipe, AppError> {
    let fields = validate_fields(
        req.title.as_deref(),
        req.ingredients.as_deref(),
        req.kind.as_deref(),
        req.instructions.as_deref(),
        req.cooking_time,
    )
    .map_err(AppError::Validation)?;

    let recipe = state
        .recipes
        .insert_recipe(NewRecipe {
            title: fields.title,
            ingredients: fields.ingredients,
            kind: fields.kind,
            instructions: fields.instructions,
            cooking_time: fields.cooking_time,
            created_by: owner.id,
            created_at: None,
            updated_at: None,
        })
        .await?
        .ok_or_else(|| {
            error!(user_id = %owner.id, "recipe insert returned no row");
            AppError::Internal("Something went wrong while adding recipe".into())
        })?;

    info!(recipe_id = %recipe.id, user_id = %owner.id, "recipe created");
    Ok(recipe)
}

pub async fn update_recipe(
    state: &AppState,
    requester: &User,
    id: Uuid,
    req: UpdateRecipeRequest,
) -> Result<Recipe, AppError> {
    let patch = validate_patch(req).map_err(AppError::Validation)?;

    let existing = state
        .recipes
        .find_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".into()))?;
    ensure_can_modify(requester, &existing)?;

    let recipe = state
        .recipes
        .update_recipe(id, patch)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".into()))?;
    info!(recipe_id = %recipe.id, user_id = %requester.id, "recipe updated");
    Ok(recipe)
}

pub async fn delete_recipe(state: &AppState, requester: &User, id: Uuid) -> Result<Recipe, AppError> {
    let existing = state
        .recipes
        .find_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".into()))?;
    ensure_can_modify(requester, &existing)?;

    let recipe = state
        .recipes
        .delete_recipe(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Recipe not found".into()))?;
    info!(recipe_id = %recipe.id, user_id = %requester.id, "recipe deleted");
    Ok(recipe)
}

/// One page of recipes visible to `requester`: everything for admins, own
/// recipes for everyone else, nothing for anonymous callers.
pub async fn list_recipes(
    state: &AppState,
    requester: Option<&User>,
    query: ListRecipesQuery,
) -> Result<Vec<RecipeListItem>, AppError> {
    let page = query.page.unwrap_or(1);
    if page < 1 {
        return Err(AppError::Validation("page must be 1 or greater".into()));
    }
    if (page - 1).checked_mul(PAGE_SIZE).is_none() {
        return Err(AppError::Validation("page is out of range".into()));
    }
    let kind = match query.kind.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(k) => Some(
            k.parse::<Cuisine>()
                .map_err(|e| AppError::Validation(e.to_string()))?,
        ),
    };

    let Some(requester) = requester else {
        debug!("anonymous recipe listing");
        return Ok(Vec::new());
    };
    let owner = if requester.is_admin() { None } else { Some(requester.id) };

    let rows = state
        .recipes
        .list_recipes(&RecipeQuery { page, kind, owner })
        .await?;
    Ok(rows.into_iter().map(RecipeListItem::from).collect())
}
