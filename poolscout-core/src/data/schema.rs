//! Projected pool schema and the row form it is reloaded as.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Tabular column names, in file order.
pub const COLUMNS: [&str; 7] = [
    "id",
    "pair_name",
    "base_token_price_usd",
    "price_change_percentage",
    "volume_usd",
    "reserve_in_usd",
    "transactions",
];

/// Columns whose cells hold a JSON object rather than a scalar.
pub const MAPPING_COLUMNS: [&str; 3] = ["price_change_percentage", "volume_usd", "transactions"];

/// One reloaded table row: column name to value, in [`COLUMNS`] order.
///
/// Scalar columns are strings holding the verbatim cell text; mapping columns
/// are JSON objects.
pub type TableRow = Map<String, Value>;

/// A price or reserve amount in the provider's own representation.
///
/// GeckoTerminal sends decimal strings, but a bare JSON number is accepted
/// and kept as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DecimalValue {
    Text(String),
    Number(serde_json::Number),
}

impl DecimalValue {
    /// Textual form written to the tabular file.
    pub fn as_cell(&self) -> String {
        match self {
            DecimalValue::Text(s) => s.clone(),
            DecimalValue::Number(n) => n.to_string(),
        }
    }
}

impl fmt::Display for DecimalValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecimalValue::Text(s) => f.write_str(s),
            DecimalValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// A trending pool reduced to the fixed output schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectedPoolRecord {
    pub id: String,
    pub pair_name: String,
    pub base_token_price_usd: DecimalValue,
    /// Timeframe (`m5`, `h1`, ...) to percentage change.
    pub price_change_percentage: Map<String, Value>,
    /// Timeframe to traded volume in USD.
    pub volume_usd: Map<String, Value>,
    pub reserve_in_usd: DecimalValue,
    /// Timeframe to `{buys, sells, buyers, sellers}` counts.
    pub transactions: Map<String, Value>,
}

impl ProjectedPoolRecord {
    /// The row this record reloads as after a write/read round trip.
    pub fn to_row(&self) -> TableRow {
        let mut row = Map::new();
        row.insert("id".into(), Value::String(self.id.clone()));
        row.insert("pair_name".into(), Value::String(self.pair_name.clone()));
        row.insert(
            "base_token_price_usd".into(),
            Value::String(self.base_token_price_usd.as_cell()),
        );
        row.insert(
            "price_change_percentage".into(),
            Value::Object(self.price_change_percentage.clone()),
        );
        row.insert("volume_usd".into(), Value::Object(self.volume_usd.clone()));
        row.insert(
            "reserve_in_usd".into(),
            Value::String(self.reserve_in_usd.as_cell()),
        );
        row.insert("transactions".into(), Value::Object(self.transactions.clone()));
        row
    }
}
