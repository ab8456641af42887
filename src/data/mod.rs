//! Tabular data handling
//!
//! Datasets live in the document store as lists of JSON records and are
//! converted to polars `DataFrame`s for processing. Column roles are inferred
//! at read time:
//! - a column is **numeric** when every present value is a JSON number
//! - anything else is **categorical** and held as strings

mod document;
mod excel;
mod loader;

pub use document::{
    finite_or_null, frame_from_documents, frame_to_documents, frame_to_matrix, Document,
};
pub use loader::{load_path, parse_bytes, DatasetFormat};

use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Role of a column as inferred from its values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl ColumnKind {
    pub fn of(column: &Column) -> Self {
        if column.dtype().is_primitive_numeric() {
            ColumnKind::Numeric
        } else {
            ColumnKind::Categorical
        }
    }
}

/// Names of the numeric columns, in column order.
pub fn numeric_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| ColumnKind::of(c) == ColumnKind::Numeric)
        .map(|c| c.name().to_string())
        .collect()
}

/// Names of the categorical columns, in column order.
pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|c| ColumnKind::of(c) == ColumnKind::Categorical)
        .map(|c| c.name().to_string())
        .collect()
}
