//! Conversion between stored documents and data frames

use crate::error::{QuickmlError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde_json::{Map, Number, Value};

/// A single stored record: column name to scalar value
pub type Document = Map<String, Value>;

/// JSON number for finite floats, `null` for NaN and infinities.
pub fn finite_or_null(v: f64) -> Value {
    Number::from_f64(v).map(Value::Number).unwrap_or(Value::Null)
}

/// Build a data frame from documents.
///
/// Column order is the order in which keys are first seen. Documents missing
/// a key contribute a null to that column.
pub fn frame_from_documents(docs: &[Document]) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for doc in docs {
        for key in doc.keys() {
            if !names.iter().any(|n| n == key) {
                names.push(key.clone());
            }
        }
    }

    let columns: Vec<Column> = names
        .iter()
        .map(|name| {
            let values: Vec<Option<&Value>> = docs
                .iter()
                .map(|doc| doc.get(name).filter(|v| !v.is_null()))
                .collect();
            build_column(name, &values)
        })
        .collect();

    DataFrame::new(columns).map_err(|e| QuickmlError::DataError(e.to_string()))
}

fn build_column(name: &str, values: &[Option<&Value>]) -> Column {
    let all_numeric = values.iter().flatten().all(|v| v.is_number());
    if all_numeric {
        let floats: Vec<Option<f64>> = values
            .iter()
            .map(|v| v.and_then(|v| v.as_f64()))
            .collect();
        Series::new(name.into(), floats).into()
    } else {
        let strings: Vec<Option<String>> = values
            .iter()
            .map(|v| {
                v.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect();
        Series::new(name.into(), strings).into()
    }
}

/// Convert a data frame back into documents, one per row.
pub fn frame_to_documents(df: &DataFrame) -> Result<Vec<Document>> {
    let columns = df.get_columns();
    let mut docs = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let mut doc = Document::new();
        for column in columns {
            let value = column
                .get(row)
                .map_err(|e| QuickmlError::DataError(e.to_string()))?;
            doc.insert(column.name().to_string(), any_to_json(value));
        }
        docs.push(doc);
    }

    Ok(docs)
}

fn any_to_json(value: AnyValue) -> Value {
    match value {
        AnyValue::Null => Value::Null,
        AnyValue::Boolean(b) => Value::Bool(b),
        AnyValue::Float64(v) => finite_or_null(v),
        AnyValue::Float32(v) => finite_or_null(v as f64),
        AnyValue::Int64(v) => Value::from(v),
        AnyValue::Int32(v) => Value::from(v),
        AnyValue::Int16(v) => Value::from(v),
        AnyValue::Int8(v) => Value::from(v),
        AnyValue::UInt64(v) => Value::from(v),
        AnyValue::UInt32(v) => Value::from(v),
        AnyValue::UInt16(v) => Value::from(v),
        AnyValue::UInt8(v) => Value::from(v),
        AnyValue::String(s) => Value::String(s.to_string()),
        AnyValue::StringOwned(s) => Value::String(s.to_string()),
        other => Value::String(other.to_string()),
    }
}

/// Extract numeric columns into a row-major matrix.
///
/// Every column must be numeric and free of missing values.
pub fn frame_to_matrix(df: &DataFrame, col_names: &[String]) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = col_names.len();

    let col_data: Vec<Vec<f64>> = col_names
        .iter()
        .map(|col_name| {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            if !column.dtype().is_primitive_numeric() {
                return Err(QuickmlError::ValidationError(format!(
                    "column '{}' is not numeric; preprocess the dataset first",
                    col_name
                )));
            }
            let series = column
                .as_materialized_series()
                .cast(&DataType::Float64)?;
            series
                .f64()?
                .into_iter()
                .map(|v| {
                    v.filter(|x| x.is_finite()).ok_or_else(|| {
                        QuickmlError::ValidationError(format!(
                            "column '{}' contains missing values; preprocess the dataset first",
                            col_name
                        ))
                    })
                })
                .collect::<Result<Vec<f64>>>()
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    let col_refs: Vec<&[f64]> = col_data.iter().map(|c| c.as_slice()).collect();
    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| col_refs[c][r]))
}
