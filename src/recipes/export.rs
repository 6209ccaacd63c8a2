use std::sync::Arc;

use axum::body::Body;
use bytes::{Bytes, BytesMut};
use futures::{stream, StreamExt};
use tracing::{debug, error, info};

use super::{
    csv_rows::{encode_header, encode_row, CsvRecipeRow},
    repo_types::{ExportCursor, RecipeWithOwner},
};
use crate::{
    error::AppError,
    state::AppState,
    store::{RecipeStore, StoreError},
};

/// Rows fetched from the store per round trip while streaming.
pub const EXPORT_BATCH: i64 = 500;

/// CSV body of every stored recipe, header first, fetched batch by batch as
/// the client reads. The first batch is loaded before the response starts so
/// a store failure still maps to an error status.
pub async fn export_body(state: &AppState) -> Result<Body, AppError> {
    export_body_batched(state, EXPORT_BATCH).await
}

async fn export_body_batched(state: &AppState, batch: i64) -> Result<Body, AppError> {
    let header = encode_header()?;
    let first = state.recipes.export_page(None, batch).await?;
    info!(first_batch = first.len(), "exporting recipes");

    let recipes = state.recipes.clone();
    let rows = stream::try_unfold(Some(first), move |pending| {
        let recipes = recipes.clone();
        async move { next_chunk(recipes, pending, batch).await }
    });

    let chunks = stream::once(async move { Ok::<_, StoreError>(header) }).chain(rows);
    Ok(Body::from_stream(chunks))
}

/// Encodes `pending` and fetches the batch after it. A short batch is the last.
async fn next_chunk(
    recipes: Arc<dyn RecipeStore>,
    pending: Option<Vec<RecipeWithOwner>>,
    batch: i64,
) -> Result<Option<(Bytes, Option<Vec<RecipeWithOwner>>)>, StoreError> {
    let Some(rows) = pending else {
        return Ok(None);
    };
    if rows.is_empty() {
        return Ok(None);
    }

    let next = if (rows.len() as i64) < batch {
        None
    } else {
        let cursor = rows.last().map(|r| ExportCursor::after(&r.recipe));
        let page = recipes.export_page(cursor, batch).await.map_err(|e| {
            error!(error = %e, "export aborted mid-stream");
            e
        })?;
        debug!(rows = page.len(), "export batch fetched");
        Some(page)
    };
    Ok(Some((encode_rows(rows), next)))
}

/// Rows that fail to encode are logged and skipped so an already-started
/// response is never cut short.
fn encode_rows(rows: Vec<RecipeWithOwner>) -> Bytes {
    let mut buf = BytesMut::new();
    for row in rows {
        let id = row.recipe.id;
        match CsvRecipeRow::try_from(row).and_then(|r| encode_row(&r)) {
            Ok(line) => buf.extend_from_slice(&line),
            Err(e) => error!(recipe_id = %id, error = %e, "skipping recipe in export"),
        }
    }
    buf.freeze()
}
