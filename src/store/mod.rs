//! Persistence seam. Handlers only see these traits; `PgStore` backs them in
//! production and `MemoryStore` in tests.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::auth::repo_types::{NewUser, User};
use crate::recipes::repo_types::{
    ExportCursor, NewRecipe, Recipe, RecipePatch, RecipeQuery, RecipeWithOwner,
};

#[cfg(test)]
pub mod memory;
pub mod postgres;

pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// A unique constraint rejected the write; carries what was duplicated.
    #[error("{0} already exists")]
    Duplicate(String),

    #[error("{0}")]
    ForeignKey(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        let mapped = e.as_database_error().and_then(|db| {
            match db.code().as_deref() {
                Some("23505") => Some(StoreError::Duplicate(
                    match db.constraint() {
                        Some(c) if c.contains("email") => "User with email".to_string(),
                        _ => "Record".to_string(),
                    },
                )),
                Some("23503") => Some(StoreError::ForeignKey(
                    "Record is still referenced by other data".to_string(),
                )),
                _ => None,
            }
        });
        mapped.unwrap_or_else(|| StoreError::Other(anyhow::Error::new(e)))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, new: NewUser) -> StoreResult<User>;
    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Exact display-name lookup used to resolve CSV references.
    /// With duplicate names the oldest account wins.
    async fn find_user_id_by_name(&self, name: &str) -> StoreResult<Option<Uuid>>;

    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>>;
    async fn set_fcm_token(&self, id: Uuid, token: String) -> StoreResult<Option<User>>;
    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>>;
}

#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// `Ok(None)` means the write produced no row.
    async fn insert_recipe(&self, new: NewRecipe) -> StoreResult<Option<Recipe>>;

    /// All-or-nothing: either every row is stored or none is.
    async fn insert_recipes(&self, rows: Vec<NewRecipe>) -> StoreResult<u64>;

    async fn find_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>>;
    async fn update_recipe(&self, id: Uuid, patch: RecipePatch) -> StoreResult<Option<Recipe>>;
    async fn delete_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>>;

    /// Newest first, one page, joined with the creator's name.
    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<RecipeWithOwner>>;

    /// Unscoped batch of at most `limit` rows following `after`, oldest first.
    async fn export_page(
        &self,
        after: Option<ExportCursor>,
        limit: i64,
    ) -> StoreResult<Vec<RecipeWithOwner>>;
}
