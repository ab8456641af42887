//! IQR-based outlier row removal

use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fitted fences for a column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlierBounds {
    pub lower: f64,
    pub upper: f64,
}

impl OutlierBounds {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// Drops rows lying outside `[Q1 - factor·IQR, Q3 + factor·IQR]` in any
/// fitted column. Quartiles use linear interpolation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierFilter {
    factor: f64,
    bounds: Vec<(String, OutlierBounds)>,
    is_fitted: bool,
}

impl Default for OutlierFilter {
    fn default() -> Self {
        Self::iqr(1.5)
    }
}

impl OutlierFilter {
    pub fn iqr(factor: f64) -> Self {
        Self {
            factor,
            bounds: Vec::new(),
            is_fitted: false,
        }
    }

    /// Compute fences for each column independently
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.bounds.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            if let Some(bounds) = self.compute_bounds(series.f64()?)? {
                self.bounds.push((col_name.clone(), bounds));
            }
        }

        self.is_fitted = true;
        Ok(self)
    }

    fn compute_bounds(&self, ca: &Float64Chunked) -> Result<Option<OutlierBounds>> {
        let q1 = ca.quantile(0.25, QuantileMethod::Linear)?;
        let q3 = ca.quantile(0.75, QuantileMethod::Linear)?;
        Ok(match (q1, q3) {
            (Some(q1), Some(q3)) => {
                let iqr = q3 - q1;
                Some(OutlierBounds {
                    lower: q1 - self.factor * iqr,
                    upper: q3 + self.factor * iqr,
                })
            }
            _ => None,
        })
    }

    /// Row mask: true where every fitted column is within its fences.
    /// Missing values never fail a fence.
    pub fn mask(&self, df: &DataFrame) -> Result<BooleanChunked> {
        if !self.is_fitted {
            return Err(QuickmlError::ModelNotFitted);
        }

        let mut keep = vec![true; df.height()];
        for (col_name, bounds) in &self.bounds {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            for (flag, value) in keep.iter_mut().zip(series.f64()?.into_iter()) {
                if let Some(v) = value {
                    *flag &= bounds.contains(v);
                }
            }
        }

        Ok(BooleanChunked::from_slice("keep".into(), &keep))
    }

    /// Remove outlier rows
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let mask = self.mask(df)?;
        Ok(df.filter(&mask)?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    pub fn bounds(&self) -> &[(String, OutlierBounds)] {
        &self.bounds
    }
}
