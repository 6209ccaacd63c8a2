use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Fixed page size of the recipe listing.
pub const PAGE_SIZE: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "recipe_type", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum Cuisine {
    American,
    Thai,
    Italian,
    Asian,
    Mexican,
    French,
    Indian,
    Chinese,
    Japanese,
}

impl Cuisine {
    pub const ALL: [Cuisine; 9] = [
        Cuisine::American,
        Cuisine::Thai,
        Cuisine::Italian,
        Cuisine::Asian,
        Cuisine::Mexican,
        Cuisine::French,
        Cuisine::Indian,
        Cuisine::Chinese,
        Cuisine::Japanese,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Cuisine::American => "AMERICAN",
            Cuisine::Thai => "THAI",
            Cuisine::Italian => "ITALIAN",
            Cuisine::Asian => "ASIAN",
            Cuisine::Mexican => "MEXICAN",
            Cuisine::French => "FRENCH",
            Cuisine::Indian => "INDIAN",
            Cuisine::Chinese => "CHINESE",
            Cuisine::Japanese => "JAPANESE",
        }
    }
}

impl fmt::Display for Cuisine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCuisine(pub String);

impl fmt::Display for UnknownCuisine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let allowed: Vec<&str> = Cuisine::ALL.iter().map(Cuisine::as_str).collect();
        write!(f, "type must be one of {} (got '{}')", allowed.join(", "), self.0)
    }
}

impl FromStr for Cuisine {
    type Err = UnknownCuisine;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Cuisine::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownCuisine(wanted.to_string()))
    }
}

/// Recipe record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: Uuid,
    pub title: String,
    pub ingredients: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: Cuisine,
    pub instructions: String,
    pub cooking_time: i32, // minutes
    pub created_by: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Recipe joined with its creator's display name.
#[derive(Debug, Clone, FromRow)]
pub struct RecipeWithOwner {
    #[sqlx(flatten)]
    pub recipe: Recipe,
    pub creator_name: String,
}

#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub ingredients: String,
    pub kind: Cuisine,
    pub instructions: String,
    pub cooking_time: i32,
    pub created_by: Uuid,
    /// `None` lets the store stamp the current time.
    pub created_at: Option<OffsetDateTime>,
    pub updated_at: Option<OffsetDateTime>,
}

/// Partial update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RecipePatch {
    pub title: Option<String>,
    pub ingredients: Option<String>,
    pub kind: Option<Cuisine>,
    pub instructions: Option<String>,
    pub cooking_time: Option<i32>,
}

impl RecipePatch {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.ingredients.is_none()
            && self.kind.is_none()
            && self.instructions.is_none()
            && self.cooking_time.is_none()
    }
}

/// Position after the last exported row; rows are ordered by `(created_at, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportCursor {
    pub created_at: OffsetDateTime,
    pub id: Uuid,
}

impl ExportCursor {
    pub fn after(recipe: &Recipe) -> Self {
        Self {
            created_at: recipe.created_at,
            id: recipe.id,
        }
    }
}

/// One page of the listing. `owner: None` means unscoped.
#[derive(Debug, Clone, Copy)]
pub struct RecipeQuery {
    pub page: i64,
    pub kind: Option<Cuisine>,
    pub owner: Option<Uuid>,
}

impl RecipeQuery {
    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }

    /// Saturates at `i64::MAX` for absurd page numbers.
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).max(0).saturating_mul(PAGE_SIZE)
    }
}
