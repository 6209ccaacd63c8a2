use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{RecipeStore, StoreResult, UserStore};
use crate::auth::repo_types::{NewUser, User};
use crate::recipes::repo_types::{
    ExportCursor, NewRecipe, Recipe, RecipePatch, RecipeQuery, RecipeWithOwner,
};

#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, new: NewUser) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, password_hash, role)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, email, password_hash, role, fcm_token, created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.password_hash)
        .bind(new.role)
        .fetch_one(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, fcm_token, created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, fcm_token, created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn find_user_id_by_name(&self, name: &str) -> StoreResult<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM users
            WHERE name = $1
            ORDER BY created_at ASC
            LIMIT 1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, role, fcm_token, created_at, updated_at
            FROM users
            ORDER BY created_at ASC
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(users)
    }

    async fn update_user_profile(
        &self,
        id: Uuid,
        name: Option<String>,
        email: Option<String>,
    ) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET name = COALESCE($2, name),
                   email = COALESCE($3, email),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, role, fcm_token, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn set_fcm_token(&self, id: Uuid, token: String) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
               SET fcm_token = $2, updated_at = now()
             WHERE id = $1
            RETURNING id, name, email, password_hash, role, fcm_token, created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }

    async fn delete_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            DELETE FROM users
             WHERE id = $1
            RETURNING id, name, email, password_hash, role, fcm_token, created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(user)
    }
}

#[async_trait]
impl RecipeStore for PgStore {
    async fn insert_recipe(&self, new: NewRecipe) -> StoreResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            INSERT INTO recipes
                (id, title, ingredients, type, instructions, cooking_time, created_by,
                 created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7,
                    COALESCE($8, now()), COALESCE($9, now()))
            RETURNING id, title, ingredients, type, instructions, cooking_time, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&new.title)
        .bind(&new.ingredients)
        .bind(new.kind)
        .bind(&new.instructions)
        .bind(new.cooking_time)
        .bind(new.created_by)
        .bind(new.created_at)
        .bind(new.updated_at)
        .fetch_optional(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn insert_recipes(&self, rows: Vec<NewRecipe>) -> StoreResult<u64> {
        let mut tx = self.db.begin().await.context("begin tx")?;
        let mut inserted = 0;
        for r in &rows {
            let done = sqlx::query(
                r#"
                INSERT INTO recipes
                    (id, title, ingredients, type, instructions, cooking_time, created_by,
                     created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7,
                        COALESCE($8, now()), COALESCE($9, now()))
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&r.title)
            .bind(&r.ingredients)
            .bind(r.kind)
            .bind(&r.instructions)
            .bind(r.cooking_time)
            .bind(r.created_by)
            .bind(r.created_at)
            .bind(r.updated_at)
            .execute(&mut *tx)
            .await?;
            inserted += done.rows_affected();
        }
        tx.commit().await.context("commit tx")?;
        Ok(inserted)
    }

    async fn find_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            SELECT id, title, ingredients, type, instructions, cooking_time, created_by,
                   created_at, updated_at
            FROM recipes
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn update_recipe(&self, id: Uuid, patch: RecipePatch) -> StoreResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            UPDATE recipes
               SET title = COALESCE($2, title),
                   ingredients = COALESCE($3, ingredients),
                   type = COALESCE($4, type),
                   instructions = COALESCE($5, instructions),
                   cooking_time = COALESCE($6, cooking_time),
                   updated_at = now()
             WHERE id = $1
            RETURNING id, title, ingredients, type, instructions, cooking_time, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.ingredients)
        .bind(patch.kind)
        .bind(patch.instructions)
        .bind(patch.cooking_time)
        .fetch_optional(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn delete_recipe(&self, id: Uuid) -> StoreResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(
            r#"
            DELETE FROM recipes
             WHERE id = $1
            RETURNING id, title, ingredients, type, instructions, cooking_time, created_by,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(recipe)
    }

    async fn list_recipes(&self, query: &RecipeQuery) -> StoreResult<Vec<RecipeWithOwner>> {
        let rows = sqlx::query_as::<_, RecipeWithOwner>(
            r#"
            SELECT r.id, r.title, r.ingredients, r.type, r.instructions, r.cooking_time,
                   r.created_by, r.created_at, r.updated_at, u.name AS creator_name
            FROM recipes r
            JOIN users u ON u.id = r.created_by
            WHERE ($1::uuid IS NULL OR r.created_by = $1)
              AND ($2::recipe_type IS NULL OR r.type = $2)
            ORDER BY r.created_at DESC, r.id
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(query.owner)
        .bind(query.kind)
        .bind(query.limit())
        .bind(query.offset())
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    async fn export_page(
        &self,
        after: Option<ExportCursor>,
        limit: i64,
    ) -> StoreResult<Vec<RecipeWithOwner>> {
        let rows = sqlx::query_as::<_, RecipeWithOwner>(
            r#"
            SELECT r.id, r.title, r.ingredients, r.type, r.instructions, r.cooking_time,
                   r.created_by, r.created_at, r.updated_at, u.name AS creator_name
            FROM recipes r
            JOIN users u ON u.id = r.created_by
            WHERE $1::timestamptz IS NULL OR (r.created_at, r.id) > ($1, $2::uuid)
            ORDER BY r.created_at ASC, r.id ASC
            LIMIT $3
            "#,
        )
        .bind(after.map(|c| c.created_at))
        .bind(after.map(|c| c.id))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}
