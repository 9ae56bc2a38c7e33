//! Minimal tuple storage the log is replayed into.

mod table;
mod tuple;

pub use table::{DataTable, MAX_BLOCKS};
pub use tuple::{Column, ColumnType, Schema, Tuple, Value};
