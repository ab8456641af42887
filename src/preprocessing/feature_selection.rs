//! Mutual-information feature selection

use super::target::TaskKind;
use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Keeps the `k` features sharing the most information with the target
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutualInfoSelector {
    k: usize,
    task: TaskKind,
    scores: Option<Vec<f64>>,
    selected: Option<Vec<usize>>,
}

impl MutualInfoSelector {
    pub fn new(k: usize, task: TaskKind) -> Self {
        Self {
            k: k.max(1),
            task,
            scores: None,
            selected: None,
        }
    }

    /// Score every column and keep the best `min(k, n_features)`.
    ///
    /// Equal scores favour the earlier column. Selected indices are returned
    /// in column order.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(QuickmlError::ShapeError {
                expected: format!("{} target values", x.nrows()),
                actual: format!("{}", y.len()),
            });
        }

        let n_features = x.ncols();
        let y_labels = match self.task {
            TaskKind::Classification => class_labels(y.view()),
            TaskKind::Regression => discretize(y.view(), n_bins(y.len())),
        };

        let scores: Vec<f64> = (0..n_features)
            .into_par_iter()
            .map(|j| {
                let col = x.column(j);
                let x_bins = discretize(col, n_bins(col.len()));
                mutual_information(&x_bins, &y_labels)
            })
            .collect();

        let mut ranked: Vec<usize> = (0..n_features).collect();
        ranked.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut selected: Vec<usize> = ranked.into_iter().take(self.k.min(n_features)).collect();
        selected.sort_unstable();

        self.scores = Some(scores);
        self.selected = Some(selected);
        Ok(self)
    }

    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let selected = self.selected.as_ref().ok_or(QuickmlError::ModelNotFitted)?;
        Ok(x.select(Axis(1), selected))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<Array2<f64>> {
        self.fit(x, y)?;
        self.transform(x)
    }

    pub fn selected_indices(&self) -> Option<&[usize]> {
        self.selected.as_deref()
    }

    pub fn scores(&self) -> Option<&[f64]> {
        self.scores.as_deref()
    }
}

// Histogram bin count: sqrt(n) clamped to [2, 20]
fn n_bins(n: usize) -> usize {
    ((n as f64).sqrt() as usize).clamp(2, 20)
}

/// Map each distinct value to a class index in first-seen order
fn class_labels(y: ArrayView1<f64>) -> Vec<usize> {
    let mut classes: HashMap<u64, usize> = HashMap::new();
    y.iter()
        .map(|v| {
            let next = classes.len();
            *classes.entry(v.to_bits()).or_insert(next)
        })
        .collect()
}

/// Equal-width binning between the column's min and max
fn discretize(x: ArrayView1<f64>, n_bins: usize) -> Vec<usize> {
    let min_val = x.iter().cloned().fold(f64::INFINITY, f64::min);
    let max_val = x.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    let range = max_val - min_val;
    if range.is_nan() || range <= 0.0 {
        return vec![0; x.len()];
    }

    let bin_width = range / n_bins as f64;
    x.iter()
        .map(|&v| {
            let bin = ((v - min_val) / bin_width) as usize;
            bin.min(n_bins - 1)
        })
        .collect()
}

/// Plug-in mutual information estimate (nats) between two labelings
fn mutual_information(x: &[usize], y: &[usize]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }

    let mut joint: HashMap<(usize, usize), usize> = HashMap::new();
    let mut x_counts: HashMap<usize, usize> = HashMap::new();
    let mut y_counts: HashMap<usize, usize> = HashMap::new();
    for (&xb, &yb) in x.iter().zip(y.iter()) {
        *joint.entry((xb, yb)).or_insert(0) += 1;
        *x_counts.entry(xb).or_insert(0) += 1;
        *y_counts.entry(yb).or_insert(0) += 1;
    }

    let mut mi = 0.0;
    for (&(xb, yb), &count) in &joint {
        let p_xy = count as f64 / n;
        let p_x = x_counts[&xb] as f64 / n;
        let p_y = y_counts[&yb] as f64 / n;
        mi += p_xy * (p_xy / (p_x * p_y)).ln();
    }

    mi.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_informative_column_selected() {
        // column 1 determines the class, columns 0 and 2 are constant-ish noise
        let x = array![
            [1.0, 0.0, 5.0],
            [1.0, 0.0, 5.0],
            [1.0, 1.0, 5.0],
            [1.0, 1.0, 5.0],
            [1.0, 0.0, 5.0],
            [1.0, 1.0, 5.0],
        ];
        let y = array![0.0, 0.0, 1.0, 1.0, 0.0, 1.0];

        let mut selector = MutualInfoSelector::new(1, TaskKind::Classification);
        selector.fit(&x, &y).unwrap();
        assert_eq!(selector.selected_indices().unwrap(), &[1]);
    }

    #[test]
    fn test_selection_keeps_column_order() {
        let x = Array2::from_shape_fn((30, 4), |(i, j)| match j {
            0 => 0.0,
            1 => i as f64,
            2 => 1.0,
            _ => (i * 2) as f64,
        });
        let y = Array1::from_shape_fn(30, |i| i as f64 * 3.0);

        let mut selector = MutualInfoSelector::new(2, TaskKind::Regression);
        let out = selector.fit_transform(&x, &y).unwrap();
        assert_eq!(selector.selected_indices().unwrap(), &[1, 3]);
        assert_eq!(out.ncols(), 2);
        assert_eq!(out[[5, 1]], 10.0);
    }

    #[test]
    fn test_k_capped_at_feature_count() {
        let x = array![[1.0, 2.0], [2.0, 1.0], [3.0, 0.0]];
        let y = array![0.0, 1.0, 0.0];
        let mut selector = MutualInfoSelector::new(10, TaskKind::Classification);
        let out = selector.fit_transform(&x, &y).unwrap();
        assert_eq!(out.ncols(), 2);
    }
}
