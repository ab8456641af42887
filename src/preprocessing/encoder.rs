//! Categorical collapsing and one-hot encoding

use super::frequency_table;
use crate::error::{QuickmlError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Label given to categories outside the top N
pub const OTHER_CATEGORY: &str = "Other";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ColumnMapping {
    name: String,
    kept: HashSet<String>,
    /// Sorted output categories, one indicator column each
    categories: Vec<String>,
}

impl ColumnMapping {
    fn collapse<'a>(&'a self, value: &'a str) -> &'a str {
        if self.kept.contains(value) {
            value
        } else {
            OTHER_CATEGORY
        }
    }
}

/// One-hot encoder that first collapses each column to its `top_n` most
/// frequent values.
///
/// Frequency ties go to the value seen first. Indicator columns are named
/// `{column}_{category}`, are `Float64`, and are appended after the
/// remaining columns in fit order. A value with no indicator column at
/// transform time encodes as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopNOneHotEncoder {
    top_n: usize,
    mappings: Vec<ColumnMapping>,
    is_fitted: bool,
}

impl TopNOneHotEncoder {
    pub fn new(top_n: usize) -> Self {
        Self {
            top_n: top_n.max(1),
            mappings: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[String]) -> Result<&mut Self> {
        self.mappings.clear();
        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| QuickmlError::FeatureNotFound(col_name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::String)?;
            let ca = series.str()?;

            let mut counts = frequency_table(ca);
            // stable sort keeps first-seen order among equal counts
            counts.sort_by(|a, b| b.1.cmp(&a.1));
            let kept: HashSet<String> = counts
                .iter()
                .take(self.top_n)
                .map(|(value, _)| value.clone())
                .collect();

            let mut categories: Vec<String> = counts
                .iter()
                .filter(|(value, _)| kept.contains(value))
                .map(|(value, _)| value.clone())
                .collect();
            if counts.len() > kept.len() && !kept.contains(OTHER_CATEGORY) {
                categories.push(OTHER_CATEGORY.to_string());
            }
            categories.sort();

            self.mappings.push(ColumnMapping {
                name: col_name.clone(),
                kept,
                categories,
            });
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace each fitted column with its indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(QuickmlError::ModelNotFitted);
        }

        let mut result = df.clone();
        let mut encoded: Vec<Column> = Vec::new();

        for mapping in &self.mappings {
            let column = df
                .column(&mapping.name)
                .map_err(|_| QuickmlError::FeatureNotFound(mapping.name.clone()))?;
            let series = column.as_materialized_series().cast(&DataType::String)?;
            let collapsed: Vec<Option<&str>> = series
                .str()?
                .into_iter()
                .map(|v| v.map(|v| mapping.collapse(v)))
                .collect();

            for category in &mapping.categories {
                let values: Vec<f64> = collapsed
                    .iter()
                    .map(|v| if *v == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                let name = format!("{}_{}", mapping.name, category);
                encoded.push(Series::new(name.into(), values).into());
            }

            result = result.drop(&mapping.name)?;
        }

        result.hstack_mut(&encoded)?;
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Indicator column names in output order
    pub fn output_columns(&self) -> Vec<String> {
        self.mappings
            .iter()
            .flat_map(|m| m.categories.iter().map(move |c| format!("{}_{}", m.name, c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_top_n_collapses_to_other() {
        let df = df!(
            "color" => &["red", "blue", "red", "green", "blue", "pink", "red"],
            "x" => &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0],
        )
        .unwrap();

        let mut encoder = TopNOneHotEncoder::new(2);
        let out = encoder.fit_transform(&df, &["color".to_string()]).unwrap();

        assert_eq!(
            names(&out),
            vec!["x", "color_Other", "color_blue", "color_red"]
        );
        let other: Vec<f64> = out
            .column("color_Other")
            .unwrap()
            .f64()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(other, vec![0.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_ties_keep_first_seen() {
        let df = df!("c" => &["b", "a", "c", "c"]).unwrap();
        let mut encoder = TopNOneHotEncoder::new(2);
        encoder.fit(&df, &["c".to_string()]).unwrap();
        // "c" is most frequent, then "b" beats "a" by first appearance
        assert_eq!(encoder.output_columns(), vec!["c_Other", "c_b", "c_c"]);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let train = df!("c" => &["a", "b", "a"]).unwrap();
        let mut encoder = TopNOneHotEncoder::new(5);
        encoder.fit(&train, &["c".to_string()]).unwrap();

        let test = df!("c" => &["zzz"]).unwrap();
        let out = encoder.transform(&test).unwrap();
        assert_eq!(names(&out), vec!["c_a", "c_b"]);
        assert_eq!(out.column("c_a").unwrap().f64().unwrap().get(0), Some(0.0));
        assert_eq!(out.column("c_b").unwrap().f64().unwrap().get(0), Some(0.0));
    }
}
