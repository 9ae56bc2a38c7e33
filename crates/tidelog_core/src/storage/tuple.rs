//! Tuples and their payload encoding.
//!
//! The log treats tuple payloads as opaque bytes. This module only gives the
//! workload something realistic to store: a schema of integer and bounded
//! varchar columns, encoded column by column in schema order.

use crate::error::{LogError, LogResult};
use std::fmt;

/// Column data type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// 32-bit signed integer.
    Integer,
    /// UTF-8 string of at most `max_len` bytes.
    Varchar {
        /// Maximum length in bytes.
        max_len: u32,
    },
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
}

impl Column {
    /// Creates an integer column.
    pub fn integer(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Integer,
        }
    }

    /// Creates a varchar column.
    pub fn varchar(name: impl Into<String>, max_len: u32) -> Self {
        Self {
            name: name.into(),
            column_type: ColumnType::Varchar { max_len },
        }
    }
}

/// Ordered list of columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    /// Creates a schema.
    #[must_use]
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    /// The columns, in order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// A column value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// Integer value.
    Integer(i32),
    /// String value.
    Varchar(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Varchar(s) => write!(f, "'{s}'"),
        }
    }
}

/// A row of values matching a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    values: Vec<Value>,
}

impl Tuple {
    /// Builds a tuple, checking every value against `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`LogError::InvalidArgument`] on a column count or type
    /// mismatch, or a varchar longer than its column allows.
    pub fn new(schema: &Schema, values: Vec<Value>) -> LogResult<Self> {
        if values.len() != schema.column_count() {
            return Err(LogError::invalid_argument(format!(
                "tuple has {} values, schema has {} columns",
                values.len(),
                schema.column_count()
            )));
        }

        for (column, value) in schema.columns().iter().zip(&values) {
            match (column.column_type, value) {
                (ColumnType::Integer, Value::Integer(_)) => {}
                (ColumnType::Varchar { max_len }, Value::Varchar(s)) => {
                    if s.len() > max_len as usize {
                        return Err(LogError::invalid_argument(format!(
                            "value for {} is {} bytes, limit is {max_len}",
                            column.name,
                            s.len()
                        )));
                    }
                }
                _ => {
                    return Err(LogError::invalid_argument(format!(
                        "type mismatch for column {}",
                        column.name
                    )))
                }
            }
        }

        Ok(Self { values })
    }

    /// The values, in column order.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value of column `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Serializes the tuple into a log payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        for value in &self.values {
            match value {
                Value::Integer(v) => buf.extend_from_slice(&v.to_le_bytes()),
                Value::Varchar(s) => {
                    // Length is bounded by the column's u32 limit.
                    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }
        buf
    }

    /// Deserializes a payload produced by [`Tuple::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`LogError::LogCorruption`] if the payload does not match
    /// `schema`.
    pub fn decode(schema: &Schema, payload: &[u8]) -> LogResult<Self> {
        let mut pos = 0usize;

        let mut values = Vec::with_capacity(schema.column_count());
        for column in schema.columns() {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(take(payload, &mut pos, 4)?);
            match column.column_type {
                ColumnType::Integer => values.push(Value::Integer(i32::from_le_bytes(raw))),
                ColumnType::Varchar { .. } => {
                    let len = u32::from_le_bytes(raw) as usize;
                    let text = std::str::from_utf8(take(payload, &mut pos, len)?).map_err(|_| {
                        LogError::log_corruption(format!("invalid UTF-8 in column {}", column.name))
                    })?;
                    values.push(Value::Varchar(text.to_string()));
                }
            }
        }

        if pos != payload.len() {
            return Err(LogError::log_corruption("trailing bytes in tuple payload"));
        }
        Self::new(schema, values)
    }
}

fn take<'a>(payload: &'a [u8], pos: &mut usize, len: usize) -> LogResult<&'a [u8]> {
    let end = pos
        .checked_add(len)
        .filter(|end| *end <= payload.len())
        .ok_or_else(|| LogError::log_corruption("tuple payload too short"))?;
    let slice = &payload[*pos..end];
    *pos = end;
    Ok(slice)
}
