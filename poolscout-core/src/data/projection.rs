//! Projection of raw provider records into [`ProjectedPoolRecord`].
//!
//! This is the only place raw JSON keys are looked up. Every field of the
//! schema must be present in the source record; there are no defaults. A
//! record either projects completely or fails with the dotted path of the
//! first field that was missing or had the wrong shape.
//!
//! Values are passed through without coercion: a price sent as a decimal
//! string stays a string, a price sent as a number stays a number.

use super::provider::RawPoolRecord;
use super::schema::{DecimalValue, ProjectedPoolRecord};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

/// Placeholder used in errors when the record has no usable `id`.
const UNKNOWN_ID: &str = "<unknown>";

/// Why a raw record could not be projected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("pool record is not a JSON object")]
    NotAnObject,

    #[error("pool record '{record_id}' is missing required field '{field}'")]
    MissingField {
        record_id: String,
        field: &'static str,
    },

    #[error("pool record '{record_id}' field '{field}' is not {expected}")]
    WrongType {
        record_id: String,
        field: &'static str,
        expected: &'static str,
    },

    #[error("pool record id '{record_id}' appears more than once in the batch")]
    DuplicateId { record_id: String },
}

/// What `project_all` does with a record that fails projection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Fail the whole batch on the first bad record.
    #[default]
    Abort,
    /// Drop bad records, keep the rest.
    Skip,
}

/// Result of projecting a whole provider response.
#[derive(Debug, Clone, Default)]
pub struct ProjectedBatch {
    /// Successfully projected records, in provider order.
    pub records: Vec<ProjectedPoolRecord>,
    /// Errors for dropped records. Always empty under [`BatchPolicy::Abort`].
    pub skipped: Vec<ProjectionError>,
}

/// Project one raw record into the fixed schema.
pub fn project(raw: RawPoolRecord) -> Result<ProjectedPoolRecord, ProjectionError> {
    let Value::Object(mut record) = raw else {
        return Err(ProjectionError::NotAnObject);
    };

    let record_id = record
        .get("id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_ID)
        .to_string();

    let id = take_string(&mut record, "id", "id", &record_id)?;

    let mut attributes = match record.remove("attributes") {
        Some(Value::Object(map)) => map,
        Some(_) => return Err(wrong_type(&record_id, "attributes", "an object")),
        None => return Err(missing(&record_id, "attributes")),
    };
    let attrs = &mut attributes;

    Ok(ProjectedPoolRecord {
        id,
        pair_name: take_string(attrs, "name", "attributes.name", &record_id)?,
        base_token_price_usd: take_decimal(
            attrs,
            "base_token_price_usd",
            "attributes.base_token_price_usd",
            &record_id,
        )?,
        price_change_percentage: take_object(
            attrs,
            "price_change_percentage",
            "attributes.price_change_percentage",
            &record_id,
        )?,
        volume_usd: take_object(attrs, "volume_usd", "attributes.volume_usd", &record_id)?,
        reserve_in_usd: take_decimal(
            attrs,
            "reserve_in_usd",
            "attributes.reserve_in_usd",
            &record_id,
        )?,
        transactions: take_object(attrs, "transactions", "attributes.transactions", &record_id)?,
    })
}

/// Project a provider response under the given batch policy.
///
/// Record ids must be unique within a batch; a repeated id is treated like
/// any other projection failure.
pub fn project_all(
    raws: Vec<RawPoolRecord>,
    policy: BatchPolicy,
) -> Result<ProjectedBatch, ProjectionError> {
    let mut batch = ProjectedBatch {
        records: Vec::with_capacity(raws.len()),
        skipped: Vec::new(),
    };
    let mut seen: HashSet<String> = HashSet::new();

    for raw in raws {
        let result = project(raw).and_then(|record| {
            if seen.insert(record.id.clone()) {
                Ok(record)
            } else {
                Err(ProjectionError::DuplicateId {
                    record_id: record.id,
                })
            }
        });

        match (result, policy) {
            (Ok(record), _) => batch.records.push(record),
            (Err(e), BatchPolicy::Abort) => return Err(e),
            (Err(e), BatchPolicy::Skip) => {
                warn!("Skipping pool record: {e}");
                batch.skipped.push(e);
            }
        }
    }

    Ok(batch)
}

// ── Field extraction ───────────────────────────────────────────────

fn missing(record_id: &str, field: &'static str) -> ProjectionError {
    ProjectionError::MissingField {
        record_id: record_id.to_string(),
        field,
    }
}

fn wrong_type(record_id: &str, field: &'static str, expected: &'static str) -> ProjectionError {
    ProjectionError::WrongType {
        record_id: record_id.to_string(),
        field,
        expected,
    }
}

fn take(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
    record_id: &str,
) -> Result<Value, ProjectionError> {
    map.remove(key).ok_or_else(|| missing(record_id, field))
}

fn take_string(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
    record_id: &str,
) -> Result<String, ProjectionError> {
    match take(map, key, field, record_id)? {
        Value::String(s) => Ok(s),
        _ => Err(wrong_type(record_id, field, "a string")),
    }
}

fn take_decimal(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
    record_id: &str,
) -> Result<DecimalValue, ProjectionError> {
    match take(map, key, field, record_id)? {
        Value::String(s) => Ok(DecimalValue::Text(s)),
        Value::Number(n) => Ok(DecimalValue::Number(n)),
        _ => Err(wrong_type(record_id, field, "a decimal string or number")),
    }
}

fn take_object(
    map: &mut Map<String, Value>,
    key: &str,
    field: &'static str,
    record_id: &str,
) -> Result<Map<String, Value>, ProjectionError> {
    match take(map, key, field, record_id)? {
        Value::Object(obj) => Ok(obj),
        _ => Err(wrong_type(record_id, field, "an object")),
    }
}
