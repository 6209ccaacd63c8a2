use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo_types::{Cuisine, RecipeWithOwner};

/// Body of `POST /recipes/register`. Every field is optional at the JSON
/// level so that missing ones surface as validation errors.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateRecipeRequest {
    pub title: Option<String>,
    pub ingredients: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub instructions: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UpdateRecipeRequest {
    pub title: Option<String>,
    pub ingredients: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub instructions: Option<String>,
    pub cooking_time: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListRecipesQuery {
    pub page: Option<i64>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Creator {
    pub id: Uuid,
    pub name: String,
}

/// Listing item: the recipe with only the creator's id and name joined in.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeListItem {
    pub id: Uuid,
    pub title: String,
    pub ingredients: String,
    #[serde(rename = "type")]
    pub kind: Cuisine,
    pub instructions: String,
    pub cooking_time: i32,
    pub created_by: Creator,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<RecipeWithOwner> for RecipeListItem {
    fn from(row: RecipeWithOwner) -> Self {
        let r = row.recipe;
        Self {
            id: r.id,
            title: r.title,
            ingredients: r.ingredients,
            kind: r.kind,
            instructions: r.instructions,
            cooking_time: r.cooking_time,
            created_by: Creator {
                id: r.created_by,
                name: row.creator_name,
            },
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
}
