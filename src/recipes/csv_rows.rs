use std::path::Path;

use anyhow::Context;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use super::repo_types::RecipeWithOwner;
use crate::error::AppError;

/// Column order of both the import and the export file.
pub const CSV_COLUMNS: [&str; 8] = [
    "title",
    "ingredients",
    "type",
    "instructions",
    "cookingTime",
    "createdBy",
    "createdAt",
    "updatedAt",
];

/// One CSV line, every cell kept as text until validation.
/// `createdBy` holds the creator's display name, not an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CsvRecipeRow {
    pub title: String,
    pub ingredients: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub instructions: String,
    pub cooking_time: String,
    pub created_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TryFrom<RecipeWithOwner> for CsvRecipeRow {
    type Error = anyhow::Error;

    fn try_from(row: RecipeWithOwner) -> anyhow::Result<Self> {
        let r = row.recipe;
        Ok(Self {
            title: r.title,
            ingredients: r.ingredients,
            kind: r.kind.to_string(),
            instructions: r.instructions,
            cooking_time: r.cooking_time.to_string(),
            created_by: row.creator_name,
            created_at: r.created_at.format(&Rfc3339).context("format createdAt")?,
            updated_at: r.updated_at.format(&Rfc3339).context("format updatedAt")?,
        })
    }
}

/// Blank means "let the store stamp it"; anything else must be RFC 3339.
pub fn parse_timestamp(raw: &str) -> Result<Option<OffsetDateTime>, time::error::Parse> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    OffsetDateTime::parse(raw, &Rfc3339).map(Some)
}

/// Reads every data row of an uploaded file. Blocking; call from
/// `spawn_blocking`.
pub fn read_rows(path: &Path, max_rows: usize) -> Result<Vec<CsvRecipeRow>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .context("open uploaded csv")?;

    let mut rows = Vec::new();
    for (i, result) in reader.deserialize::<CsvRecipeRow>().enumerate() {
        if i >= max_rows {
            return Err(AppError::BadRequest(format!(
                "CSV file has more than {} rows",
                max_rows
            )));
        }
        let row = result
            .map_err(|e| AppError::BadRequest(format!("Malformed CSV at row {}: {}", i + 1, e)))?;
        rows.push(row);
    }
    Ok(rows)
}

pub fn encode_header() -> anyhow::Result<Bytes> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(CSV_COLUMNS)?;
    finish(wtr)
}

pub fn encode_row(row: &CsvRecipeRow) -> anyhow::Result<Bytes> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    wtr.serialize(row)?;
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> anyhow::Result<Bytes> {
    let buf = wtr
        .into_inner()
        .map_err(|e| anyhow::anyhow!("flush csv writer: {}", e.error()))?;
    Ok(Bytes::from(buf))
}
