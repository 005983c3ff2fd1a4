//! Core data model: identifiers, table metadata, and row snapshots.

pub mod ident;
pub mod row;
pub mod schema;

pub use ident::{escape_string, quote_ident, unique_id};
pub use row::{build_rows_query, compare_data, ColumnData, Row};
pub use schema::{ignore_columns, Column, Index, IndexColumn, TableInfo};
