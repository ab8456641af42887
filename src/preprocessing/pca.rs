//! PCA - Principal Component Analysis
//!
//! Computes the top-k eigenvectors of the covariance matrix using power
//! iteration with deflation. Input is centered but not rescaled; the
//! pipeline has already robust-scaled its features.

use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

const MAX_ITER: usize = 300;
const TOL: f64 = 1e-10;

/// Fitted principal components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pca {
    n_components: usize,
    random_state: u64,
    mean: Option<Array1<f64>>,
    /// n_components x n_features, one unit eigenvector per row
    components: Option<Array2<f64>>,
    explained_variance: Option<Vec<f64>>,
}

impl Pca {
    pub fn new(n_components: usize, random_state: u64) -> Self {
        Self {
            n_components: n_components.max(1),
            random_state,
            mean: None,
            components: None,
            explained_variance: None,
        }
    }

    /// Fit `min(n_components, n_features, n_samples)` components
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let (n, d) = x.dim();
        if n == 0 || d == 0 {
            return Err(QuickmlError::ComputationError(
                "PCA requires at least one sample and one feature".to_string(),
            ));
        }

        let k = self.n_components.min(d).min(n);
        let mean = x.mean_axis(Axis(0)).ok_or_else(|| {
            QuickmlError::ComputationError("cannot center empty matrix".to_string())
        })?;
        let centered = x - &mean;
        let cov = centered.t().dot(&centered) / ((n as f64) - 1.0).max(1.0);

        let (eigenvalues, components) = self.power_iteration(cov, k);

        self.mean = Some(mean);
        self.components = Some(components);
        self.explained_variance = Some(eigenvalues);
        Ok(self)
    }

    /// Project onto the fitted components
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, components) = match (&self.mean, &self.components) {
            (Some(m), Some(c)) => (m, c),
            _ => return Err(QuickmlError::ModelNotFitted),
        };
        if x.ncols() != mean.len() {
            return Err(QuickmlError::ShapeError {
                expected: format!("{} features", mean.len()),
                actual: format!("{} features", x.ncols()),
            });
        }

        let centered = x - mean;
        Ok(centered.dot(&components.t()))
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    pub fn n_components_fitted(&self) -> usize {
        self.components.as_ref().map_or(0, |c| c.nrows())
    }

    pub fn explained_variance(&self) -> Option<&[f64]> {
        self.explained_variance.as_deref()
    }

    fn power_iteration(&self, mut work: Array2<f64>, k: usize) -> (Vec<f64>, Array2<f64>) {
        let d = work.nrows();
        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut eigenvalues = Vec::with_capacity(k);
        let mut components = Array2::zeros((k, d));

        for c in 0..k {
            let mut v = Array1::<f64>::from_shape_fn(d, |_| rng.gen_range(-1.0..1.0));
            let norm = v.dot(&v).sqrt().max(1e-12);
            v /= norm;

            let mut eigenvalue = 0.0f64;
            for _ in 0..MAX_ITER {
                let w = work.dot(&v);
                let new_eigenvalue = v.dot(&w);
                let w_norm = w.dot(&w).sqrt();
                if w_norm < 1e-12 {
                    // remaining variance is zero
                    eigenvalue = 0.0;
                    break;
                }
                let new_v = w / w_norm;
                let diff = (&new_v - &v).mapv(|x| x * x).sum().sqrt();

                v = new_v;
                eigenvalue = new_eigenvalue;
                if diff < TOL {
                    break;
                }
            }

            // largest-magnitude loading is made positive
            let pivot = v
                .iter()
                .copied()
                .fold(0.0f64, |acc, x| if x.abs() > acc.abs() { x } else { acc });
            if pivot < 0.0 {
                v.mapv_inplace(|x| -x);
            }

            let eigenvalue = eigenvalue.max(0.0);
            for i in 0..d {
                for j in 0..d {
                    work[[i, j]] -= eigenvalue * v[i] * v[j];
                }
            }

            eigenvalues.push(eigenvalue);
            components.row_mut(c).assign(&v);
        }

        (eigenvalues, components)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_pca_linear_data() {
        let x = array![[1.0, 2.0], [2.0, 4.0], [3.0, 6.0], [4.0, 8.0], [5.0, 10.0]];
        let mut pca = Pca::new(2, 42);
        let out = pca.fit_transform(&x).unwrap();

        assert_eq!(out.dim(), (5, 2));
        let ev = pca.explained_variance().unwrap();
        assert!(ev[0] > 0.95 * (ev[0] + ev[1]));

        // first component is the direction (1, 2)/sqrt(5), sign positive
        assert!(out[[4, 0]] > 0.0);
        assert!((out[[4, 0]] - 2.0 * 5.0f64.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_components_capped() {
        let x = array![[1.0, 0.0, 3.0], [0.0, 1.0, 2.0]];
        let mut pca = Pca::new(5, 42);
        pca.fit(&x).unwrap();
        assert_eq!(pca.n_components_fitted(), 2);
    }

    #[test]
    fn test_deterministic() {
        let x = Array2::from_shape_fn((20, 4), |(i, j)| ((i * 7 + j * 3) % 11) as f64);
        let a = Pca::new(3, 42).fit_transform(&x).unwrap();
        let b = Pca::new(3, 42).fit_transform(&x).unwrap();
        assert_eq!(a, b);
    }
}
