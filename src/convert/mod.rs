//! Tabular codec
//!
//! Maps a [`SchemaTree`](crate::models::SchemaTree) to a flat table (one row
//! per node, in pre-order, with the id path spelled out in `path_N`
//! columns) and back. The table is what the XLSX reader and writer store in
//! the `schema` sheet.

pub mod error;
pub mod rows;
pub mod table;

pub use error::{FormatResult, SchemaFormatError};
pub use rows::{TabularRow, rows_to_tree, tree_to_rows};
pub use table::{Cell, Column, Table, rows_to_table, table_to_rows, table_to_tree, tree_to_table};
