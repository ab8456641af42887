//! Support Vector Machine implementations
//!
//! SVM classifier trained with SMO (Sequential Minimal Optimization), one-vs-rest
//! for more than two classes, and an epsilon-insensitive SVM regressor.

use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training returns an error instead of allocating n².
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Kernel function type
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum KernelType {
    /// K(x, y) = x · y
    Linear,
    /// K(x, y) = exp(-γ ||x - y||²)
    Rbf { gamma: f64 },
}

impl KernelType {
    /// RBF kernel with `gamma = 1 / (n_features · Var(X))`, the variance
    /// taken over every entry of `x`. Falls back to 1 for constant input.
    pub fn rbf_scaled(x: &Array2<f64>) -> Self {
        let n_features = x.ncols().max(1) as f64;
        let var = x.var(0.0);
        let gamma = if var > 0.0 && var.is_finite() {
            1.0 / (n_features * var)
        } else {
            1.0
        };
        KernelType::Rbf { gamma }
    }

    fn compute(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        match self {
            KernelType::Linear => a.dot(&b),
            KernelType::Rbf { gamma } => {
                let norm_sq: f64 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (-gamma * norm_sq).exp()
            }
        }
    }

    /// Full symmetric kernel matrix, rows computed in parallel
    fn matrix(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(QuickmlError::TrainingError(format!(
                "dataset has {} samples, exceeding the maximum {} for an SVM kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }

        let rows: Vec<Vec<f64>> = (0..n)
            .into_par_iter()
            .map(|i| (i..n).map(|j| self.compute(x.row(i), x.row(j))).collect())
            .collect();

        let mut k = Array2::zeros((n, n));
        for (i, row_vals) in rows.into_iter().enumerate() {
            for (offset, val) in row_vals.into_iter().enumerate() {
                let j = i + offset;
                k[[i, j]] = val;
                k[[j, i]] = val;
            }
        }
        Ok(k)
    }
}

/// SVM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// Kernel; `None` resolves to a scaled RBF kernel at fit time
    pub kernel: Option<KernelType>,
    /// Tolerance for stopping criterion
    pub tol: f64,
    pub max_iter: usize,
    pub random_state: u64,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            kernel: None,
            tol: 1e-3,
            max_iter: 1000,
            random_state: 42,
            epsilon: 0.1,
        }
    }
}

/// A single binary SVM trained for one class vs rest
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinarySvm {
    support_vectors: Array2<f64>,
    /// alpha_i · y_i per support vector
    dual_coef: Array1<f64>,
    bias: f64,
}

impl BinarySvm {
    fn score(&self, kernel: &KernelType, sample: ArrayView1<f64>) -> f64 {
        self.support_vectors
            .rows()
            .into_iter()
            .zip(self.dual_coef.iter())
            .fold(self.bias, |acc, (sv, coef)| acc + coef * kernel.compute(sample, sv))
    }
}

/// Support Vector Classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    config: SvmConfig,
    kernel: Option<KernelType>,
    classes: Vec<i64>,
    /// One machine for binary problems, one per class otherwise
    machines: Vec<BinarySvm>,
    is_fitted: bool,
}

impl SvmClassifier {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            kernel: None,
            classes: Vec::new(),
            machines: Vec::new(),
            is_fitted: false,
        }
    }

    /// Fit the classifier (binary directly, multi-class via one-vs-rest)
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(QuickmlError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        for (i, &v) in y.iter().enumerate() {
            if (v - v.round()).abs() > 1e-9 {
                return Err(QuickmlError::TrainingError(format!(
                    "SVM classifier requires integer class labels, but sample {} has label {}",
                    i, v
                )));
            }
        }

        let mut classes: Vec<i64> = y.iter().map(|&v| v.round() as i64).collect();
        classes.sort_unstable();
        classes.dedup();
        if classes.len() < 2 {
            return Err(QuickmlError::TrainingError(
                "SVM requires at least 2 distinct classes".to_string(),
            ));
        }

        let kernel = self.config.kernel.unwrap_or_else(|| KernelType::rbf_scaled(x));
        let kernel_matrix = kernel.matrix(x)?;

        let targets: Vec<i64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        self.machines = targets
            .iter()
            .map(|&cls| {
                let y_binary = y.mapv(|v| if v.round() as i64 == cls { 1.0 } else { -1.0 });
                self.smo_train(x, &y_binary, &kernel_matrix)
            })
            .collect::<Result<Vec<_>>>()?;

        self.kernel = Some(kernel);
        self.classes = classes;
        self.is_fitted = true;
        Ok(self)
    }

    /// Simplified SMO with random second-index choice
    fn smo_train(&self, x: &Array2<f64>, y: &Array1<f64>, k: &Array2<f64>) -> Result<BinarySvm> {
        let n = x.nrows();
        let c = self.config.c;
        let tol = self.config.tol;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut bias = 0.0;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);

        let decision = |alphas: &Array1<f64>, bias: f64, idx: usize| -> f64 {
            let mut sum = bias;
            for i in 0..n {
                if alphas[i] != 0.0 {
                    sum += alphas[i] * y[i] * k[[i, idx]];
                }
            }
            sum
        };

        let mut passes = 0;
        let max_passes = 5;
        let mut total_iter = 0;

        while n > 1 && passes < max_passes && total_iter < self.config.max_iter {
            let mut num_changed = 0;

            for i in 0..n {
                let e_i = decision(&alphas, bias, i) - y[i];
                if !((y[i] * e_i < -tol && alphas[i] < c) || (y[i] * e_i > tol && alphas[i] > 0.0)) {
                    continue;
                }

                let j = loop {
                    let j = rng.gen_range(0..n);
                    if j != i {
                        break j;
                    }
                };
                let e_j = decision(&alphas, bias, j) - y[j];

                let alpha_i_old = alphas[i];
                let alpha_j_old = alphas[j];

                let (l, h) = if y[i] != y[j] {
                    ((alpha_j_old - alpha_i_old).max(0.0), (c + alpha_j_old - alpha_i_old).min(c))
                } else {
                    ((alpha_i_old + alpha_j_old - c).max(0.0), (alpha_i_old + alpha_j_old).min(c))
                };
                if (l - h).abs() < 1e-10 {
                    continue;
                }

                let eta = 2.0 * k[[i, j]] - k[[i, i]] - k[[j, j]];
                if eta >= 0.0 {
                    continue;
                }

                alphas[j] = (alpha_j_old - y[j] * (e_i - e_j) / eta).clamp(l, h);
                if (alphas[j] - alpha_j_old).abs() < 1e-5 {
                    continue;
                }
                alphas[i] = alpha_i_old + y[i] * y[j] * (alpha_j_old - alphas[j]);

                let b1 = bias
                    - e_i
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, i]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[i, j]];
                let b2 = bias
                    - e_j
                    - y[i] * (alphas[i] - alpha_i_old) * k[[i, j]]
                    - y[j] * (alphas[j] - alpha_j_old) * k[[j, j]];

                bias = if alphas[i] > 0.0 && alphas[i] < c {
                    b1
                } else if alphas[j] > 0.0 && alphas[j] < c {
                    b2
                } else {
                    (b1 + b2) / 2.0
                };

                num_changed += 1;
            }

            total_iter += 1;
            if num_changed == 0 {
                passes += 1;
            } else {
                passes = 0;
            }
        }

        let support: Vec<usize> = (0..n).filter(|&i| alphas[i] > 1e-8).collect();
        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = alphas[idx] * y[idx];
        }

        Ok(BinarySvm {
            support_vectors,
            dual_coef,
            bias,
        })
    }

    /// Predict class labels
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let kernel = match (&self.kernel, self.is_fitted) {
            (Some(k), true) => k,
            _ => return Err(QuickmlError::ModelNotFitted),
        };

        let predictions: Vec<f64> = x
            .rows()
            .into_iter()
            .collect::<Vec<_>>()
            .into_par_iter()
            .map(|sample| {
                if self.classes.len() == 2 {
                    let score = self.machines[0].score(kernel, sample);
                    if score >= 0.0 {
                        self.classes[1] as f64
                    } else {
                        self.classes[0] as f64
                    }
                } else {
                    let mut best = (f64::NEG_INFINITY, self.classes[0]);
                    for (machine, &cls) in self.machines.iter().zip(self.classes.iter()) {
                        let score = machine.score(kernel, sample);
                        if score > best.0 {
                            best = (score, cls);
                        }
                    }
                    best.1 as f64
                }
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    pub fn classes(&self) -> &[i64] {
        &self.classes
    }

    pub fn n_support_vectors(&self) -> usize {
        self.machines.iter().map(|m| m.support_vectors.nrows()).sum()
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmRegressor {
    config: SvmConfig,
    kernel: Option<KernelType>,
    support_vectors: Option<Array2<f64>>,
    /// alpha - alpha* per support vector
    dual_coef: Option<Array1<f64>>,
    bias: f64,
    is_fitted: bool,
}

impl SvmRegressor {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            kernel: None,
            support_vectors: None,
            dual_coef: None,
            bias: 0.0,
            is_fitted: false,
        }
    }

    /// Fit by projected coordinate steps on the epsilon-insensitive loss.
    ///
    /// Kernel predictions are kept in a running vector and only updated for
    /// the coefficients that move.
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n = x.nrows();
        if n != y.len() {
            return Err(QuickmlError::ShapeError {
                expected: format!("y length = {}", n),
                actual: format!("y length = {}", y.len()),
            });
        }

        let kernel = self.config.kernel.unwrap_or_else(|| KernelType::rbf_scaled(x));
        let k = kernel.matrix(x)?;
        let c = self.config.c;
        let epsilon = self.config.epsilon;
        let learning_rate: f64 = 0.01;

        let mut alphas = Array1::<f64>::zeros(n);
        let mut alphas_star = Array1::<f64>::zeros(n);
        let mut bias: f64 = y.mean().unwrap_or(0.0);
        // kernel part of the prediction for every sample
        let mut f = Array1::<f64>::zeros(n);

        for _ in 0..self.config.max_iter {
            let mut max_change: f64 = 0.0;

            for i in 0..n {
                let error = f[i] + bias - y[i];

                let delta = if error > epsilon {
                    let new_val = (alphas_star[i] + learning_rate).min(c);
                    let d = new_val - alphas_star[i];
                    alphas_star[i] = new_val;
                    -d
                } else if error < -epsilon {
                    let new_val = (alphas[i] + learning_rate).min(c);
                    let d = new_val - alphas[i];
                    alphas[i] = new_val;
                    d
                } else {
                    0.0
                };

                if delta != 0.0 {
                    max_change = max_change.max(delta.abs());
                    f.scaled_add(delta, &k.row(i));
                }

                let bias_update = learning_rate * 0.1 * error;
                max_change = max_change.max(bias_update.abs());
                bias -= bias_update;
            }

            if max_change < self.config.tol {
                break;
            }
        }

        let combined = &alphas - &alphas_star;
        let support: Vec<usize> = (0..n).filter(|&i| combined[i].abs() > 1e-8).collect();
        let mut support_vectors = Array2::zeros((support.len(), x.ncols()));
        let mut dual_coef = Array1::zeros(support.len());
        for (row, &idx) in support.iter().enumerate() {
            support_vectors.row_mut(row).assign(&x.row(idx));
            dual_coef[row] = combined[idx];
        }

        self.kernel = Some(kernel);
        self.support_vectors = Some(support_vectors);
        self.dual_coef = Some(dual_coef);
        self.bias = bias;
        self.is_fitted = true;
        Ok(self)
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (kernel, sv, coef) = match (&self.kernel, &self.support_vectors, &self.dual_coef) {
            (Some(k), Some(sv), Some(c)) if self.is_fitted => (k, sv, c),
            _ => return Err(QuickmlError::ModelNotFitted),
        };

        Ok(x.rows()
            .into_iter()
            .map(|sample| {
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .fold(self.bias, |acc, (row, a)| acc + a * kernel.compute(sample, row))
            })
            .collect())
    }

    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map_or(0, |sv| sv.nrows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_vec(
            (10, 2),
            vec![
                1.0, 1.0, 1.5, 1.2, 2.0, 2.0, 1.2, 1.8, 0.8, 1.5, //
                5.0, 5.0, 5.5, 5.2, 6.0, 6.0, 5.2, 5.8, 4.8, 5.5,
            ],
        )
        .unwrap();
        let y = Array1::from_vec(vec![0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        (x, y)
    }

    #[test]
    fn test_svc_linear_separable() {
        let (x, y) = separable_data();
        let config = SvmConfig {
            kernel: Some(KernelType::Linear),
            ..Default::default()
        };
        let mut svm = SvmClassifier::new(config);
        svm.fit(&x, &y).unwrap();

        let pred = svm.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct as f64 / 10.0 > 0.8, "correct = {}", correct);
        assert!(svm.n_support_vectors() > 0);
    }

    #[test]
    fn test_svc_rbf_multiclass() {
        // three clusters at the corners of a triangle
        let centers = [(0.0, 0.0), (6.0, 0.0), (0.0, 6.0)];
        let x = Array2::from_shape_fn((30, 2), |(i, j)| {
            let (cx, cy) = centers[i / 10];
            let jitter = (i % 10) as f64 * 0.05;
            if j == 0 { cx + jitter } else { cy - jitter }
        });
        let y = Array1::from_shape_fn(30, |i| (i / 10) as f64);

        let mut svm = SvmClassifier::new(SvmConfig::default());
        svm.fit(&x, &y).unwrap();
        assert_eq!(svm.classes(), &[0, 1, 2]);

        let pred = svm.predict(&x).unwrap();
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        assert!(correct >= 24, "correct = {}", correct);
    }

    #[test]
    fn test_svc_rejects_fractional_labels() {
        let (x, _) = separable_data();
        let y = Array1::from_elem(10, 0.5);
        assert!(SvmClassifier::new(SvmConfig::default()).fit(&x, &y).is_err());
    }

    #[test]
    fn test_scaled_gamma() {
        let x = Array2::from_shape_vec((2, 2), vec![0.0, 0.0, 2.0, 2.0]).unwrap();
        // variance over all entries is 1
        assert_eq!(KernelType::rbf_scaled(&x), KernelType::Rbf { gamma: 0.5 });
    }

    #[test]
    fn test_svr_tracks_trend() {
        let x = Array2::from_shape_fn((40, 1), |(i, _)| i as f64 / 10.0);
        let y = Array1::from_shape_fn(40, |i| (i as f64 / 10.0).sin());

        let mut svr = SvmRegressor::new(SvmConfig::default());
        svr.fit(&x, &y).unwrap();
        let pred = svr.predict(&x).unwrap();
        let mae = pred.iter().zip(y.iter()).map(|(p, t)| (p - t).abs()).sum::<f64>() / 40.0;
        assert!(mae < 0.5, "mae = {}", mae);
    }
}
