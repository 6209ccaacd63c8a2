use std::{collections::HashMap, fmt::Display, io::Write, path::Path};

use anyhow::Context;
use bytes::Bytes;
use tempfile::NamedTempFile;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::{
    csv_rows::{parse_timestamp, read_rows, CsvRecipeRow},
    repo_types::NewRecipe,
    services::{parse_minutes, validate_fields},
};
use crate::{error::AppError, state::AppState, store::UserStore};

pub const INVALID_CREATOR: &str = "Invalid user in createdBy";
pub const IMPORT_FAILED: &str = "Error importing tasks";

/// Spools the upload to disk, imports it, and removes the file on every path.
pub async fn import_upload(state: &AppState, data: Bytes) -> Result<usize, AppError> {
    let upload = spool_upload(&state.config.import.upload_dir, data).await?;
    let result = import_file(state, upload.path()).await;
    discard_upload(upload);
    result
}

async fn spool_upload(dir: &Path, data: Bytes) -> anyhow::Result<NamedTempFile> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || -> anyhow::Result<NamedTempFile> {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create upload dir {}", dir.display()))?;
        let mut file = tempfile::Builder::new()
            .prefix("recipes-")
            .suffix(".csv")
            .tempfile_in(&dir)
            .context("create upload file")?;
        file.write_all(&data).context("write upload")?;
        file.flush().context("flush upload")?;
        debug!(path = %file.path().display(), bytes = data.len(), "upload spooled");
        Ok(file)
    })
    .await?
}

fn discard_upload(file: NamedTempFile) {
    let path = file.path().to_path_buf();
    match file.close() {
        Ok(()) => debug!(path = %path.display(), "upload removed"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to remove upload"),
    }
}

/// Parses, resolves, validates and stores every row of `path`, or nothing.
pub async fn import_file(state: &AppState, path: &Path) -> Result<usize, AppError> {
    let max_rows = state.config.import.max_rows;
    let owned = path.to_path_buf();
    let rows = tokio::task::spawn_blocking(move || read_rows(&owned, max_rows))
        .await
        .context("csv parse task")??;

    let records = resolve_rows(state.users.as_ref(), rows).await?;
    let count = records.len();
    if count == 0 {
        info!("csv import contained no rows");
        return Ok(0);
    }

    state.recipes.insert_recipes(records).await.map_err(|e| {
        error!(error = %e, rows = count, "bulk insert failed");
        AppError::Internal(IMPORT_FAILED.into())
    })?;
    info!(rows = count, "csv import committed");
    Ok(count)
}

fn row_error(line: usize, msg: impl Display) -> AppError {
    AppError::Validation(format!("Row {}: {}", line, msg))
}

/// Turns text rows into insertable records. The first unknown creator or
/// invalid cell aborts the whole batch.
pub(crate) async fn resolve_rows(
    users: &dyn UserStore,
    rows: Vec<CsvRecipeRow>,
) -> Result<Vec<NewRecipe>, AppError> {
    let mut creators: HashMap<String, Uuid> = HashMap::new();
    let mut out = Vec::with_capacity(rows.len());

    for (i, row) in rows.into_iter().enumerate() {
        let line = i + 1;
        let name = row.created_by.trim();

        let created_by = match creators.get(name) {
            Some(id) => *id,
            None => {
                let found = if name.is_empty() {
                    None
                } else {
                    users.find_user_id_by_name(name).await?
                };
                let Some(id) = found else {
                    warn!(row = line, name = %name, "unknown createdBy in csv import");
                    return Err(AppError::BadRequest(INVALID_CREATOR.into()));
                };
                creators.insert(name.to_string(), id);
                id
            }
        };

        let minutes = parse_minutes(&row.cooking_time).map_err(|m| row_error(line, m))?;
        let fields = validate_fields(
            Some(row.title.as_str()),
            Some(row.ingredients.as_str()),
            Some(row.kind.as_str()),
            Some(row.instructions.as_str()),
            minutes,
        )
        .map_err(|m| row_error(line, m))?;

        let created_at = parse_timestamp(&row.created_at)
            .map_err(|e| row_error(line, format!("createdAt is not an RFC 3339 timestamp ({})", e)))?;
        let updated_at = parse_timestamp(&row.updated_at)
            .map_err(|e| row_error(line, format!("updatedAt is not an RFC 3339 timestamp ({})", e)))?;

        out.push(NewRecipe {
            title: fields.title,
            ingredients: fields.ingredients,
            kind: fields.kind,
            instructions: fields.instructions,
            cooking_time: fields.cooking_time,
            created_by,
            created_at,
            updated_at: updated_at.or(created_at),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::repo_types::Role;
    use crate::recipes::repo_types::Cuisine;
    use crate::store::memory::MemoryStore;
    use std::sync::Arc;

    const HEADER: &str = "title,ingredients,type,instructions,cookingTime,createdBy,createdAt,updatedAt\n";

    fn csv(lines: &[&str]) -> Bytes {
        let mut s = HEADER.to_string();
        for l in lines {
            s.push_str(l);
            s.push('\n');
        }
        Bytes::from(s)
    }

    async fn setup(upload_dir: &Path) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed_user("Ann", "ann@example.com", "pw", Role::Standard).await;
        store.seed_user("Bob", "bob@example.com", "pw", Role::Standard).await;
        let mut config = crate::state::test_config();
        config.import.upload_dir = upload_dir.to_path_buf();
        (AppState::with_store_and_config(store.clone(), config), store)
    }

    fn dir_is_empty(dir: &Path) -> bool {
        std::fs::read_dir(dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn imports_all_rows_with_resolved_creators() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = setup(dir.path()).await;
        let data = csv(&[
            "Pho,noodles,ASIAN,boil,30,Ann,2024-01-01T10:00:00Z,2024-01-02T10:00:00Z",
            "Tacos,\"corn, beef\",MEXICAN,grill,15,Bob,,",
        ]);

        let imported = import_upload(&state, data).await.unwrap();
        assert_eq!(imported, 2);
        assert_eq!(store.recipe_count().await, 2);

        let all = store.list_all_recipes().await;
        let pho = &all[0];
        assert_eq!(pho.creator_name, "Ann");
        assert_eq!(pho.recipe.kind, Cuisine::Asian);
        assert_eq!(pho.recipe.created_at.year(), 2024);
        assert_eq!(all[1].recipe.ingredients, "corn, beef");
        assert_eq!(all[1].creator_name, "Bob");
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn unknown_creator_in_row_two_imports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = setup(dir.path()).await;
        let data = csv(&[
            "A,x,THAI,y,10,Ann,,",
            "B,x,THAI,y,10,Mallory,,",
            "C,x,THAI,y,10,Bob,,",
        ]);

        let err = import_upload(&state, data).await.unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == INVALID_CREATOR));
        assert_eq!(store.recipe_count().await, 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn malformed_date_rejects_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = setup(dir.path()).await;
        let data = csv(&[
            "A,x,THAI,y,10,Ann,2024-01-01T00:00:00Z,",
            "B,x,THAI,y,10,Ann,last tuesday,",
        ]);

        let err = import_upload(&state, data).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("Row 2: createdAt")));
        assert_eq!(store.recipe_count().await, 0);
    }

    #[tokio::test]
    async fn invalid_cells_name_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = setup(dir.path()).await;
        let data = csv(&["A,x,SPACE_FOOD,y,10,Ann,,"]);
        let err = import_upload(&state, data).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.starts_with("Row 1: type must be one of")));

        let data = csv(&["A,x,THAI,y,-3,Ann,,"]);
        let err = import_upload(&state, data).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m.contains("cookingTime")));
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_import_error_and_still_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = setup(dir.path()).await;
        store.fail_bulk_inserts(true);

        let err = import_upload(&state, csv(&["A,x,THAI,y,10,Ann,,"])).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref m) if m == IMPORT_FAILED));
        assert_eq!(store.recipe_count().await, 0);
        assert!(dir_is_empty(dir.path()));
    }

    #[tokio::test]
    async fn header_only_file_imports_zero_rows() {
        let dir = tempfile::tempdir().unwrap();
        let (state, _) = setup(dir.path()).await;
        assert_eq!(import_upload(&state, csv(&[])).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn shared_display_name_resolves_to_oldest_account() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());
        let first = store.seed_user("Ann", "ann1@example.com", "pw", Role::Standard).await;
        let second = store.seed_user("Ann", "ann2@example.com", "pw", Role::Standard).await;
        assert_ne!(first.id, second.id);
        let mut config = crate::state::test_config();
        config.import.upload_dir = dir.path().to_path_buf();
        let state = AppState::with_store_and_config(store.clone(), config);

        let imported = import_upload(&state, csv(&["Soup,water,FRENCH,boil,5,Ann,,"]))
            .await
            .unwrap();
        assert_eq!(imported, 1);
        let all = store.list_all_recipes().await;
        assert_eq!(all[0].recipe.created_by, first.id);
    }

    #[tokio::test]
    async fn blank_ingredients_name_the_row() {
        let dir = tempfile::tempdir().unwrap();
        let (state, store) = setup(dir.path()).await;
        let data = csv(&["A,x,THAI,y,10,Ann,,", "B, ,THAI,y,10,Ann,,"]);
        let err = import_upload(&state, data).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Row 2: ingredients is required"));
        assert_eq!(store.recipe_count().await, 0);
    }

    #[tokio::test]
    async fn creator_lookups_are_memoised_but_order_preserved() {
        let store = MemoryStore::new();
        let ann = store.seed_user("Ann", "ann@example.com", "pw", Role::Standard).await;
        let row = |title: &str| CsvRecipeRow {
            title: title.into(),
            ingredients: "x".into(),
            kind: "FRENCH".into(),
            instructions: "y".into(),
            cooking_time: "5".into(),
            created_by: " Ann ".into(),
            ..Default::default()
        };
        let out = resolve_rows(&store, vec![row("one"), row("two")]).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "one");
        assert!(out.iter().all(|r| r.created_by == ann.id && r.created_at.is_none()));
    }
}
