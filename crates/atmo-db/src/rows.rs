//! Decoding of `to_jsonb` rows.
//!
//! Every query in this crate selects `to_jsonb(<row>)` rather than
//! individual columns. The store decides column names and JSON types.
//! Rows that are forwarded to clients decode into
//! [`StoredRow`](atmo_types::StoredRow) and never fail on column shape;
//! typed records keep whatever they do not model in a flattened map.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::DbError;

/// Decode a single JSON row.
pub(crate) fn decode<T: DeserializeOwned>(row: Value) -> Result<T, DbError> {
    Ok(serde_json::from_value(row)?)
}

/// Decode a list of JSON rows, failing on the first malformed one.
pub(crate) fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, DbError> {
    rows.into_iter().map(decode).collect()
}

/// Decode an optional JSON row.
pub(crate) fn decode_opt<T: DeserializeOwned>(row: Option<Value>) -> Result<Option<T>, DbError> {
    row.map(decode).transpose()
}
