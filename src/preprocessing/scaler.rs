//! Robust feature scaling

use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Parameters for a fitted column
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // median
    scale: f64,  // IQR, 1 when the IQR is zero
}

/// Scaler computing `(x - median) / IQR` per column
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RobustScaler {
    params: Vec<(String, ScalerParams)>,
    is_fitted: bool,
}

impl RobustScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.params.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::Float64)?;
            let params = Self::compute_params(series.f64()?)?;
            self.params.push((col_name.clone(), params));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Transform the data.
    /// Builds all replacement columns first, then applies them in a single pass.
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(QuickmlError::ModelNotFitted);
        }

        let replacements: Vec<Series> = self
            .params
            .iter()
            .map(|(col_name, params)| {
                let column = df
                    .column(col_name)
                    .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
                Self::scale_series(column.as_materialized_series(), params)
            })
            .collect::<Result<Vec<_>>>()?;

        let mut result = df.clone();
        for scaled in replacements {
            result.with_column(scaled)?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    fn compute_params(ca: &Float64Chunked) -> Result<ScalerParams> {
        let median = ca.median().unwrap_or(0.0);
        let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
        let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(0.0);
        let iqr = q3 - q1;
        Ok(ScalerParams {
            center: median,
            scale: if iqr == 0.0 || !iqr.is_finite() { 1.0 } else { iqr },
        })
    }

    fn scale_series(series: &Series, params: &ScalerParams) -> Result<Series> {
        let cast = series.cast(&DataType::Float64)?;
        let scaled: Float64Chunked = cast
            .f64()?
            .into_iter()
            .map(|opt| opt.map(|v| (v - params.center) / params.scale))
            .collect();

        Ok(scaled.with_name(series.name().clone()).into_series())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robust_scaling() {
        let df = df!("x" => &[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        let mut scaler = RobustScaler::new();
        let out = scaler.fit_transform(&df, &["x".to_string()]).unwrap();

        // median 3, IQR 2
        let x: Vec<f64> = out.column("x").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(x, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_constant_column_uses_unit_scale() {
        let df = df!("x" => &[7.0, 7.0, 7.0]).unwrap();
        let mut scaler = RobustScaler::new();
        let out = scaler.fit_transform(&df, &["x".to_string()]).unwrap();
        let x: Vec<f64> = out.column("x").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(x, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_refit_uses_new_statistics() {
        let mut scaler = RobustScaler::new();
        let a = df!("x" => &[1.0, 2.0, 3.0]).unwrap();
        let b = df!("x" => &[101.0, 102.0, 103.0]).unwrap();

        let out_a = scaler.fit_transform(&a, &["x".to_string()]).unwrap();
        let out_b = scaler.fit_transform(&b, &["x".to_string()]).unwrap();
        let values = |df: &DataFrame| -> Vec<f64> {
            df.column("x").unwrap().f64().unwrap().into_no_null_iter().collect()
        };
        assert_eq!(values(&out_a), vec![-1.0, 0.0, 1.0]);
        assert_eq!(values(&out_a), values(&out_b));
    }
}
