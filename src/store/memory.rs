use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{RecipeStore, StoreError, StoreResult, UserStore};
use crate::auth::repo_types::{NewUser, Role, User};
use crate::recipes::repo_types::{
    ExportCursor, NewRecipe, Recipe, RecipePatch, RecipeQuery, RecipeWithOwner,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    recipes: Vec<Recipe>,
}

/// In-process store with the same constraints as the Postgres schema
/// (unique email, recipe owner must exist, owned users cannot be deleted).
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    fail_bulk_insert: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `insert_recipes` calls fail as a datastore error would.
    pub fn fail_bulk_inserts(&self, fail: bool) {
        self.fail_bulk_insert.store(fail, Ordering::SeqCst);
    }

    pub async fn seed_user(&self, name: &str, email: &str, password: &str, role: Role) -> User {
        let password_hash =
            crate::auth::password::hash_password(password).expect("hash seeded password");
        self.create_user(NewUser {
            name: name.into(),
            email: email.into(),
            password_hash,
            role,
        })
        .await
        .expect("seed user")
    }

    pub async fn recipe_count(&self) -> usize {
        self.tables.read().await.recipes.len()
    }

    /// Every recipe with its creator, in insertion order.
    pub async fn list_all_recipes(&self) -> Vec<RecipeWithOwner> {
        let t = self.tables.read().await;
        t.recipes.iter().map(|r| Self::with_owner(&t, r)).collect()
    }

    fn build_recipe(new: NewRecipe) -> Recipe {
        let now = OffsetDateTime::now_utc();
        Recipe {
            id: Uuid::new_v4(),
            title: new.title,
            ingredients: new.ingredients,
            kind: new.kind,
            instructions: new.instructions,
            cooking_time: new.cooking_time,
            created_by: new.created_by,
            created_at: new.created_at.unwrap_or(now),
            updated_at: new.updated_at.unwrap_or(now),
        }
    }

    fn with_owner(tables: &Tables, recipe: &Recipe) -> RecipeWithOwner {
        let creator_name = tables
            .users
            .iter()
            .find(|u| u.id == recipe.created_by)
            .map(|u| u.name.clone())
            .unwrap_or_default();
        RecipeWithOwner {
            recipe: recipe.clone(),
            creator_name,
        }
    }
}

fn foreign_key_violation() -> StoreError {
    StoreError::ForeignKey("Record is still referenced by other data".into())
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let mut t = self.tables.write().await;
        if t.users.iter().any(|u| u.email == new.email) {
            return Err(StoreError::Duplicate("User with email".into()));
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            role: new.role,
            fcm_token: None,
            created_at: now,
            updated_at: now,
        };
        t.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let t = self.tables.read().await;
        Ok(t.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_user_id_by_name(&self, name: &str) -> StoreResult<Option<Uuid>> {
        let t = self.tables.read().await;
        Ok(t
            .users
            .iter()
            .filter(|u| u.name == name)
            .min_by_key(|u| u.created_at)
            .map(|u| u.id))
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        Ok(self.tables.read().await.users.clone())
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        if let Some(ref e) = email {
            if t.users.iter().any(|u| u.id != id && &u.email == e) {
                return Err(StoreError::Duplicate("User with email".into()));
            }
        }
        let Some(user) = t.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(n) = name {
            user.name = n;
        }
        if let Some(e) = email {
            user.email = e;
        }
        user.updated_at = OffsetDateTime::now_utc();
        Ok(Some(user.clone()))
    }

    async fn set_fcm_token(&self, id: Uuid, token: String) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        Ok(t.users.iter_mut().find(|u| u.id == id).map(|u| {
            u.fcm_token = Some(token);
            u.updated_at = OffsetDateTime::now_utc();
            u.clone()
        }))
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let mut t = self.tables.write().await;
        if t.recipes.iter().any(|r| r.created_by == id) {
            return Err(foreign_key_violation());
        }
        let Some(pos) = t.users.iter().position(|u| u.id == id) else {
            return Ok(None);
        };
        Ok(Some(t.users.remove(pos)))
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn insert_recipe(&self, new: NewRecipe) -> StoreResult<Option<Recipe>> {
        let mut t = self.tables.write().await;
        if !t.users.iter().any(|u| u.id == new.created_by) {
            return Err(foreign_key_violation());
        }
        let recipe = Self::build_recipe(new);
        t.recipes.push(recipe.clone());
        Ok(Some(recipe))
    }

    async fn insert_recipes(&self, rows: Vec<NewRecipe>) -> StoreResult<u64> {
        if self.fail_bulk_insert.load(Ordering::SeqCst) {
            return Err(StoreError::Other(anyhow::anyhow!("simulated bulk insert failure")));
        }
        let mut t = self.tables.write().await;
        if rows.iter().any(|r| !t.users.iter().any(|u| u.id == r.created_by)) {
            return Err(foreign_key_violation());
        }
        let count = rows.len() as u64;
        t.recipes.extend(rows.into_iter().map(Self::build_recipe));
        Ok(count)
    }

    async fn find_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>> {
        let t = self.tables.read().await;
        Ok(t.recipes.iter().find(|r| r.id == id).cloned())
    }

    async fn update_recipe(&self, id: Uuid, patch: RecipePatch) -> StoreResult<Option<Recipe>> {
        let mut t = self.tables.write().await;
        Ok(t.recipes.iter_mut().find(|r| r.id == id).map(|r| {
            if let Some(v) = patch.title {
                r.title = v;
            }
            if let Some(v) = patch.ingredients {
                r.ingredients = v;
            }
            if let Some(v) = patch.kind {
                r.kind = v;
            }
            if let Some(v) = patch.instructions {
                r.instructions = v;
            }
            if let Some(v) = patch.cooking_time {
                r.cooking_time = v;
            }
            r.updated_at = OffsetDateTime::now_utc();
            r.clone()
        }))
    }

    async fn delete_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>> {
        let mut t = self.tables.write().await;
        let Some(pos) = t.recipes.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        Ok(Some(t.recipes.remove(pos)))
    }

    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<RecipeWithOwner>> {
        let t = self.tables.read().await;
        // Insertion order stands in for created_at; newest first.
        let rows = t
            .recipes
            .iter()
            .rev()
            .filter(|r| query.owner.map_or(true, |o| r.created_by == o))
            .filter(|r| query.kind.map_or(true, |k| r.kind == k))
            .skip(query.offset() as usize)
            .take(query.limit() as usize)
            .map(|r| Self::with_owner(&t, r))
            .collect();
        Ok(rows)
    }

    async fn export_page(
        &self,
        after: Option<ExportCursor>,
        limit: i64,
    ) -> StoreResult<Vec<RecipeWithOwner>> {
        let t = self.tables.read().await;
        let mut ordered: Vec<&Recipe> = t.recipes.iter().collect();
        ordered.sort_by_key(|r| (r.created_at, r.id));
        Ok(ordered
            .into_iter()
            .filter(|r| after.map_or(true, |c| (r.created_at, r.id) > (c.created_at, c.id)))
            .take(limit.max(0) as usize)
            .map(|r| Self::with_owner(&t, r))
            .collect())
    }
}
