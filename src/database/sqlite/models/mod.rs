
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row of the passage table together with its stored embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredPassage {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<f32>,
    pub created_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub(crate) struct PassageRow {
    pub id: i64,
    pub content: String,
    pub embedding: Vec<u8>,
    pub created_date: NaiveDateTime,
}

impl PassageRow {
    pub(crate) fn into_passage(self) -> StoredPassage {
        StoredPassage {
            id: self.id,
            content: self.content,
            embedding: decode_embedding(&self.embedding),
            created_date: self.created_date,
        }
    }
}

/// A nearest-neighbour hit, ordered by ascending `distance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct PassageMatch {
    pub id: i64,
    pub content: String,
    pub distance: f64,
}

/// One value of a raw SQL result row
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    #[serde(serialize_with = "serialize_blob")]
    Blob(Vec<u8>),
}

impl fmt::Display for SqlValue {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => f.write_str("NULL"),
            SqlValue::Integer(value) => write!(f, "{value}"),
            SqlValue::Real(value) => write!(f, "{value}"),
            SqlValue::Text(value) => f.write_str(value),
            SqlValue::Blob(bytes) => write!(f, "<blob {} bytes>", bytes.len()),
        }
    }
}

fn serialize_blob<S: serde::Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    use std::fmt::Write;

    let mut hex = String::with_capacity(2 + bytes.len() * 2);
    hex.push_str("\\x");
    for byte in bytes {
        let _ = write!(hex, "{byte:02x}");
    }
    serializer.serialize_str(&hex)
}

/// Result set of a single statement in a raw SQL batch
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatementResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<SqlValue>>,
    pub rows_affected: u64,
}

impl StatementResult {
    /// Rows as column-name to value mappings, in result order
    #[inline]
    pub fn row_maps(&self) -> Vec<serde_json::Map<String, serde_json::Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().map(|value| {
                        serde_json::to_value(value).unwrap_or(serde_json::Value::Null)
                    }))
                    .collect()
            })
            .collect()
    }
}

/// Little-endian `f32` blob, the layout vec0 accepts for `float[N]` columns
#[inline]
pub fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|value| value.to_le_bytes()).collect()
}

#[inline]
pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
