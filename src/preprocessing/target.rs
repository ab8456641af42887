//! Target column detection and task inference

use crate::data::numeric_columns;
use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Distinct target values above which a target is treated as continuous
pub const CLASSIFICATION_MAX_CLASSES: usize = 10;

/// Learning task implied by a target vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Classification,
    Regression,
}

impl TaskKind {
    /// More than `threshold` distinct values means regression.
    pub fn infer(y: &[f64], threshold: usize) -> Self {
        if distinct_count(y) > threshold {
            TaskKind::Regression
        } else {
            TaskKind::Classification
        }
    }

    /// Classification only when the target also holds integral values.
    ///
    /// Used where a classifier would reject fractional labels.
    pub fn infer_strict(y: &[f64]) -> Self {
        let integral = y.iter().all(|v| v.fract() == 0.0);
        if integral && distinct_count(y) <= CLASSIFICATION_MAX_CLASSES {
            TaskKind::Classification
        } else {
            TaskKind::Regression
        }
    }
}

/// Number of distinct values, comparing floats by bit pattern.
pub fn distinct_count(y: &[f64]) -> usize {
    y.iter()
        .map(|v| if *v == 0.0 { 0.0f64.to_bits() } else { v.to_bits() })
        .collect::<HashSet<u64>>()
        .len()
}

/// Pick the prediction target of a table.
///
/// Only numeric columns whose name does not contain `id` (any case) are
/// eligible. The first eligible column with exactly two distinct values
/// wins; otherwise the column with the largest sample variance, earlier
/// columns winning ties. Fails when no column is eligible.
pub fn detect_target_column(df: &DataFrame) -> Result<String> {
    let candidates: Vec<String> = numeric_columns(df)
        .into_iter()
        .filter(|name| !name.to_lowercase().contains("id"))
        .collect();

    if candidates.is_empty() {
        return Err(QuickmlError::ValidationError(
            "cannot detect a target column: no numeric non-id columns".to_string(),
        ));
    }

    let mut best: Option<(&String, f64)> = None;
    for name in &candidates {
        let series = df
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::Float64)?;
        let ca = series.f64()?;

        let values: Vec<f64> = ca.into_no_null_iter().filter(|v| !v.is_nan()).collect();
        if distinct_count(&values) == 2 {
            return Ok(name.clone());
        }

        if let Some(var) = ca.var(1).filter(|v| v.is_finite()) {
            if best.map_or(true, |(_, b)| var > b) {
                best = Some((name, var));
            }
        }
    }

    best.map(|(name, _)| name.clone()).ok_or_else(|| {
        QuickmlError::ValidationError(
            "cannot detect a target column: no column has a defined variance".to_string(),
        )
    })
}
