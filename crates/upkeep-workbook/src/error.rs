//! Error types for the workbook codec.

use thiserror::Error;

use crate::schema::TableName;

#[derive(Debug, Error)]
pub enum Error {
  #[error("JSON error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("unsupported document format {0:?}")]
  UnsupportedFormat(String),

  #[error("required table {0} is missing")]
  MissingTable(TableName),

  #[error("table {0} is malformed: {1}")]
  MalformedTable(TableName, String),

  #[error("table {table} has no {column:?} column")]
  MissingColumn {
    table:  TableName,
    column: &'static str,
  },

  #[error("table {table}, row {row}: invalid {column} {value}")]
  InvalidKey {
    table:  TableName,
    row:    usize,
    column: &'static str,
    value:  String,
  },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
