//! K-Means clustering and silhouette scoring
//!
//! KMeans is unsupervised: it takes X only and assigns cluster labels.

use crate::error::{QuickmlError, Result};
use ndarray::{Array1, Array2, ArrayView1};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

// ═══════════════════════════════════════════════════════════════════════════
//  K-Means Clustering
// ═══════════════════════════════════════════════════════════════════════════

/// K-Means clustering with k-means++ initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KMeans {
    pub n_clusters: usize,
    pub max_iter: usize,
    pub tol: f64,
    pub random_state: u64,
    /// Fitted cluster centroids (n_clusters × n_features)
    centroids: Option<Array2<f64>>,
    /// Cluster labels assigned during fit
    pub labels: Option<Array1<f64>>,
    /// Sum of squared distances to nearest centroid
    pub inertia: Option<f64>,
    pub is_fitted: bool,
}

impl Default for KMeans {
    fn default() -> Self {
        Self::new(3)
    }
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            n_clusters: n_clusters.max(1),
            max_iter: 300,
            tol: 1e-4,
            random_state: 42,
            centroids: None,
            labels: None,
            inertia: None,
            is_fitted: false,
        }
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// K-means++ initialization: pick centroids spread apart
    fn kmeans_pp_init(x: &Array2<f64>, k: usize, rng: &mut ChaCha8Rng) -> Array2<f64> {
        let n_samples = x.nrows();
        let mut centroids = Array2::zeros((k, x.ncols()));

        let first = rng.gen_range(0..n_samples);
        centroids.row_mut(0).assign(&x.row(first));

        for c in 1..k {
            let dists: Vec<f64> = (0..n_samples)
                .map(|i| {
                    (0..c)
                        .map(|j| euclidean_sq(x.row(i), centroids.row(j)))
                        .fold(f64::MAX, f64::min)
                })
                .collect();

            // weighted by D²
            let total: f64 = dists.iter().sum();
            let chosen = if total <= 0.0 {
                rng.gen_range(0..n_samples)
            } else {
                let r = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                dists
                    .iter()
                    .position(|&d| {
                        cumulative += d;
                        cumulative >= r
                    })
                    .unwrap_or(n_samples - 1)
            };
            centroids.row_mut(c).assign(&x.row(chosen));
        }

        centroids
    }

    fn nearest(&self, centroids: &Array2<f64>, row: ArrayView1<f64>) -> usize {
        let mut best_c = 0;
        let mut best_dist = f64::MAX;
        for c in 0..self.n_clusters {
            let d = euclidean_sq(row, centroids.row(c));
            if d < best_dist {
                best_dist = d;
                best_c = c;
            }
        }
        best_c
    }

    /// Fit the model (unsupervised)
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        if n_samples < self.n_clusters {
            return Err(QuickmlError::TrainingError(format!(
                "n_samples ({}) < n_clusters ({})",
                n_samples, self.n_clusters
            )));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.random_state);
        let mut centroids = Self::kmeans_pp_init(x, self.n_clusters, &mut rng);
        let mut labels = vec![usize::MAX; n_samples];

        for _iter in 0..self.max_iter {
            // assignment
            let new_labels: Vec<usize> = (0..n_samples)
                .into_par_iter()
                .map(|i| self.nearest(&centroids, x.row(i)))
                .collect();
            let changed = new_labels.iter().zip(labels.iter()).filter(|(a, b)| a != b).count();
            labels = new_labels;

            // update
            let mut new_centroids = Array2::<f64>::zeros(centroids.dim());
            let mut counts = vec![0usize; self.n_clusters];
            for (i, &c) in labels.iter().enumerate() {
                counts[c] += 1;
                let mut row = new_centroids.row_mut(c);
                row += &x.row(i);
            }
            for c in 0..self.n_clusters {
                if counts[c] > 0 {
                    new_centroids.row_mut(c).mapv_inplace(|v| v / counts[c] as f64);
                } else {
                    // empty cluster, reseed from a random sample
                    let idx = rng.gen_range(0..n_samples);
                    new_centroids.row_mut(c).assign(&x.row(idx));
                }
            }

            let shift: f64 = centroids
                .iter()
                .zip(new_centroids.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            centroids = new_centroids;

            if changed == 0 || shift < self.tol {
                break;
            }
        }

        // final assignment against the settled centroids
        let labels: Vec<usize> = (0..n_samples)
            .into_par_iter()
            .map(|i| self.nearest(&centroids, x.row(i)))
            .collect();
        let inertia: f64 = labels
            .iter()
            .enumerate()
            .map(|(i, &c)| euclidean_sq(x.row(i), centroids.row(c)))
            .sum();

        self.centroids = Some(centroids);
        self.labels = Some(labels.into_iter().map(|c| c as f64).collect());
        self.inertia = Some(inertia);
        self.is_fitted = true;
        Ok(self)
    }

    /// Predict cluster labels for new data
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let centroids = self.centroids.as_ref().ok_or(QuickmlError::ModelNotFitted)?;
        let labels: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| self.nearest(centroids, x.row(i)) as f64)
            .collect();
        Ok(Array1::from_vec(labels))
    }

    pub fn centroids(&self) -> Option<&Array2<f64>> {
        self.centroids.as_ref()
    }
}

fn euclidean_sq(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

// ═══════════════════════════════════════════════════════════════════════════
//  Silhouette
// ═══════════════════════════════════════════════════════════════════════════

/// Mean silhouette coefficient over all samples (Euclidean distance).
///
/// Returns `None` unless there are between 2 and n-1 distinct labels.
/// Samples alone in their cluster score 0.
pub fn silhouette_score(x: &Array2<f64>, labels: &Array1<f64>) -> Option<f64> {
    let n = x.nrows();
    if n != labels.len() || n < 3 {
        return None;
    }

    let mut cluster_ids: Vec<i64> = labels.iter().map(|&l| l.round() as i64).collect();
    let assignment = cluster_ids.clone();
    cluster_ids.sort_unstable();
    cluster_ids.dedup();
    let k = cluster_ids.len();
    if k < 2 || k > n - 1 {
        return None;
    }

    let index_of = |id: i64| cluster_ids.binary_search(&id).unwrap_or(0);
    let cluster_of: Vec<usize> = assignment.iter().map(|&id| index_of(id)).collect();
    let mut sizes = vec![0usize; k];
    for &c in &cluster_of {
        sizes[c] += 1;
    }

    let total: f64 = (0..n)
        .into_par_iter()
        .map(|i| {
            let own = cluster_of[i];
            if sizes[own] <= 1 {
                return 0.0;
            }

            let mut sums = vec![0.0f64; k];
            for j in 0..n {
                if i != j {
                    sums[cluster_of[j]] += euclidean_sq(x.row(i), x.row(j)).sqrt();
                }
            }

            let a = sums[own] / (sizes[own] - 1) as f64;
            let b = (0..k)
                .filter(|&c| c != own && sizes[c] > 0)
                .map(|c| sums[c] / sizes[c] as f64)
                .fold(f64::INFINITY, f64::min);

            let denom = a.max(b);
            if denom > 0.0 {
                (b - a) / denom
            } else {
                0.0
            }
        })
        .sum();

    Some(total / n as f64)
}
