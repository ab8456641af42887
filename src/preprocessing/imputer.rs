//! Missing value imputation

use super::frequency_table;
use crate::data::ColumnKind;
use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Fill value used for a categorical column with no observed values
pub const MISSING_CATEGORY: &str = "missing";

#[derive(Debug, Clone, Serialize, Deserialize)]
enum FillValue {
    Numeric(f64),
    Categorical(String),
}

/// Imputer filling numeric columns with their mean and categorical columns
/// with their most frequent value.
///
/// Ties between equally frequent categories go to the value seen first.
/// Numeric columns are cast to `Float64` on the way through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Imputer {
    fill_values: Vec<(String, FillValue)>,
    is_fitted: bool,
}

impl Imputer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn a fill value for each listed column
    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.fill_values.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;

            let fill = match ColumnKind::of(column) {
                ColumnKind::Numeric => {
                    let series = column.as_materialized_series().cast(&DataType::Float64)?;
                    FillValue::Numeric(series.f64()?.mean().unwrap_or(0.0))
                }
                ColumnKind::Categorical => {
                    let series = column.as_materialized_series().cast(&DataType::String)?;
                    let mode = frequency_table(series.str()?)
                        .into_iter()
                        .fold(None::<(String, usize)>, |best, (value, count)| match best {
                            Some((_, c)) if c >= count => best,
                            _ => Some((value, count)),
                        })
                        .map(|(value, _)| value)
                        .unwrap_or_else(|| MISSING_CATEGORY.to_string());
                    FillValue::Categorical(mode)
                }
            };
            self.fill_values.push((col_name.clone(), fill));
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace missing values in the fitted columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(QuickmlError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, fill) in &self.fill_values {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            let filled = fill_series(column.as_materialized_series(), fill)?;
            result.with_column(filled)?;
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }
}

fn fill_series(series: &Series, fill: &FillValue) -> Result<Series> {
    match fill {
        FillValue::Numeric(val) => {
            let cast = series.cast(&DataType::Float64)?;
            let filled: Float64Chunked = cast
                .f64()?
                .into_iter()
                .map(|opt| Some(opt.filter(|v| !v.is_nan()).unwrap_or(*val)))
                .collect();
            Ok(filled.with_name(series.name().clone()).into_series())
        }
        FillValue::Categorical(val) => {
            let cast = series.cast(&DataType::String)?;
            let filled: StringChunked = cast
                .str()?
                .into_iter()
                .map(|opt| Some(opt.unwrap_or(val.as_str())))
                .collect();
            Ok(filled.with_name(series.name().clone()).into_series())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_mode_imputation() {
        let df = df!(
            "x" => &[Some(1.0), None, Some(3.0)],
            "c" => &[Some("b"), Some("a"), None],
        )
        .unwrap();

        let mut imputer = Imputer::new();
        let out = imputer
            .fit_transform(&df, &["x".to_string(), "c".to_string()])
            .unwrap();

        let x: Vec<f64> = out.column("x").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(x, vec![1.0, 2.0, 3.0]);

        // "b" and "a" tie at one occurrence; "b" was seen first
        let c = out.column("c").unwrap().str().unwrap();
        assert_eq!(c.get(2), Some("b"));
        assert_eq!(out.column("c").unwrap().null_count(), 0);
    }

    #[test]
    fn test_integer_column_cast_to_float() {
        let df = df!("n" => &[Some(2i64), None, Some(4i64)]).unwrap();
        let mut imputer = Imputer::new();
        let out = imputer.fit_transform(&df, &["n".to_string()]).unwrap();
        assert_eq!(out.column("n").unwrap().dtype(), &DataType::Float64);
        assert_eq!(out.column("n").unwrap().f64().unwrap().get(1), Some(3.0));
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("x" => &[1.0]).unwrap();
        assert!(matches!(
            Imputer::new().transform(&df),
            Err(QuickmlError::ModelNotFitted)
        ));
    }
}
