//! CSV tabular store for projected pool records.
//!
//! Layout: `{path}` holds the table, `{path}.meta.json` the metadata sidecar.
//!
//! - One header row with the fixed [`COLUMNS`], one row per record
//! - Mapping columns are stored as compact JSON objects
//! - Writes are atomic (write to .tmp, rename into place) and always replace
//!   the previous table; there is no append mode
//! - Reads validate the header and every mapping cell and fail loudly

use super::provider::TrendingQuery;
use super::schema::{ProjectedPoolRecord, TableRow, COLUMNS, MAPPING_COLUMNS};
use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors writing the table or its sidecar.
#[derive(Debug, Error)]
pub enum WriteError {
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("CSV encoding failed: {0}")]
    Encode(String),

    #[error("failed to write {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Errors reading the table back.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("no table at {}; run `poolscout fetch` first", .path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },

    #[error("unexpected table header: expected [{expected}], found [{found}]")]
    SchemaMismatch { expected: String, found: String },

    #[error("malformed table at line {line}: {reason}")]
    Malformed { line: u64, reason: String },
}

/// Metadata sidecar describing where the current table came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMeta {
    #[serde(flatten)]
    pub query: TrendingQuery,
    pub row_count: usize,
    /// BLAKE3 over the table file bytes.
    pub data_hash: String,
    pub written_at: DateTime<Utc>,
}

/// The on-disk trending-pool table.
#[derive(Debug, Clone)]
pub struct PoolTable {
    path: PathBuf,
}

impl PoolTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the CSV file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the metadata sidecar: `{path}.meta.json`.
    pub fn meta_path(&self) -> PathBuf {
        let mut name: OsString = self.path.clone().into_os_string();
        name.push(".meta.json");
        PathBuf::from(name)
    }

    /// Replace the table with `records`.
    ///
    /// An empty slice produces a header-only file.
    pub fn write(&self, records: &[ProjectedPoolRecord]) -> Result<(), WriteError> {
        let bytes = encode_csv(records)?;
        write_atomic(&self.path, &bytes)?;
        info!("Wrote {} row(s) to {}", records.len(), self.path.display());
        Ok(())
    }

    /// Load every row of the table, in file order.
    pub fn read(&self) -> Result<Vec<TableRow>, ReadError> {
        let file = fs::File::open(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ReadError::NotFound {
                path: self.path.clone(),
            },
            _ => ReadError::Io {
                path: self.path.clone(),
                source: e,
            },
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(file);

        let headers = rdr.headers().map_err(|e| malformed(&e))?.clone();
        if !headers.iter().eq(COLUMNS.iter().copied()) {
            return Err(ReadError::SchemaMismatch {
                expected: COLUMNS.join(","),
                found: headers.iter().collect::<Vec<_>>().join(","),
            });
        }

        let mut rows = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| malformed(&e))?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            let mut row = Map::new();
            for (column, cell) in COLUMNS.iter().zip(record.iter()) {
                let value = if MAPPING_COLUMNS.contains(column) {
                    parse_mapping_cell(column, cell, line)?
                } else {
                    Value::String(cell.to_string())
                };
                row.insert(column.to_string(), value);
            }
            rows.push(row);
        }

        debug!("Read {} row(s) from {}", rows.len(), self.path.display());
        Ok(rows)
    }

    /// Write the sidecar for the table currently on disk.
    pub fn write_meta(
        &self,
        query: &TrendingQuery,
        row_count: usize,
    ) -> Result<TableMeta, WriteError> {
        let bytes = fs::read(&self.path).map_err(|source| WriteError::Io {
            path: self.path.clone(),
            source,
        })?;

        let meta = TableMeta {
            query: query.clone(),
            row_count,
            data_hash: blake3::hash(&bytes).to_hex().to_string(),
            written_at: Utc::now(),
        };
        let json = serde_json::to_string_pretty(&meta)
            .map_err(|e| WriteError::Encode(format!("meta serialization: {e}")))?;
        write_atomic(&self.meta_path(), json.as_bytes())?;
        Ok(meta)
    }

    /// Read the sidecar, if one exists and parses.
    pub fn read_meta(&self) -> Option<TableMeta> {
        let content = fs::read_to_string(self.meta_path()).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Whether the table file still hashes to the value recorded in its sidecar.
    ///
    /// `None` when there is no sidecar or the table cannot be read.
    pub fn matches_meta(&self) -> Option<bool> {
        let meta = self.read_meta()?;
        let bytes = fs::read(&self.path).ok()?;
        Some(blake3::hash(&bytes).to_hex().as_str() == meta.data_hash)
    }
}

// ── CSV helpers ─────────────────────────────────────────────────────

fn encode_csv(records: &[ProjectedPoolRecord]) -> Result<Vec<u8>, WriteError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(COLUMNS)
        .map_err(|e| WriteError::Encode(e.to_string()))?;

    for r in records {
        wtr.write_record([
            r.id.clone(),
            r.pair_name.clone(),
            r.base_token_price_usd.as_cell(),
            json_cell(&r.price_change_percentage)?,
            json_cell(&r.volume_usd)?,
            r.reserve_in_usd.as_cell(),
            json_cell(&r.transactions)?,
        ])
        .map_err(|e| WriteError::Encode(e.to_string()))?;
    }

    wtr.into_inner()
        .map_err(|e| WriteError::Encode(format!("failed to flush CSV writer: {e}")))
}

fn json_cell(map: &Map<String, Value>) -> Result<String, WriteError> {
    serde_json::to_string(map).map_err(|e| WriteError::Encode(e.to_string()))
}

fn parse_mapping_cell(column: &str, cell: &str, line: u64) -> Result<Value, ReadError> {
    match serde_json::from_str::<Value>(cell) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err(ReadError::Malformed {
            line,
            reason: format!("column '{column}' is not a JSON object"),
        }),
        Err(e) => Err(ReadError::Malformed {
            line,
            reason: format!("column '{column}': {e}"),
        }),
    }
}

fn malformed(e: &csv::Error) -> ReadError {
    ReadError::Malformed {
        line: e.position().map(|p| p.line()).unwrap_or(0),
        reason: e.to_string(),
    }
}

/// Write to `{path}.tmp` then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| WriteError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut tmp_name: OsString = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    fs::write(&tmp_path, bytes).map_err(|source| WriteError::Io {
        path: tmp_path.clone(),
        source,
    })?;

    fs::rename(&tmp_path, path).map_err(|source| {
        let _ = fs::remove_file(&tmp_path);
        WriteError::Io {
            path: path.to_path_buf(),
            source,
        }
    })
}
