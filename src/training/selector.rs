//! Best-model selection across the stock trainers

use super::metrics::MetricBundle;
use super::models::{ModelKind, TrainOptions, TrainingData};
use super::persistence::{ArtifactRef, ModelStore};
use super::trainers::{train_and_persist, trainer_for, SvmMode, TrainingResult};
use crate::error::{QuickmlError, Result};
use crate::preprocessing::{distinct_count, TaskKind, CLASSIFICATION_MAX_CLASSES};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How metric bundles are ranked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// `accuracy` when set and non-zero, otherwise `-rmse`
    #[default]
    Legacy,
    /// Classifier accuracy for classification targets, `r2` for regression
    TaskAware,
}

impl ScoringPolicy {
    /// Higher is better; unscorable bundles get `-inf`.
    pub fn score(&self, metrics: &MetricBundle, task: TaskKind) -> f64 {
        match self {
            ScoringPolicy::Legacy => match metrics.accuracy {
                Some(acc) if acc != 0.0 => acc,
                _ => metrics.rmse.map_or(f64::NEG_INFINITY, |rmse| -rmse),
            },
            ScoringPolicy::TaskAware => {
                let score = match task {
                    TaskKind::Classification if metrics.is_classification() => metrics.accuracy,
                    TaskKind::Classification => None,
                    TaskKind::Regression => metrics.r2,
                };
                score.unwrap_or(f64::NEG_INFINITY)
            }
        }
    }
}

impl FromStr for ScoringPolicy {
    type Err = QuickmlError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "legacy" => Ok(ScoringPolicy::Legacy),
            "task_aware" | "task-aware" => Ok(ScoringPolicy::TaskAware),
            other => Err(QuickmlError::ValidationError(format!(
                "unknown scoring policy '{}'",
                other
            ))),
        }
    }
}

/// Winner of a selection run
#[derive(Debug, Clone)]
pub struct BestModelResult {
    pub model: ModelKind,
    pub metrics: MetricBundle,
    pub artifact: ArtifactRef,
    /// Every candidate's bundle, in training order
    pub candidates: Vec<(ModelKind, MetricBundle)>,
}

impl BestModelResult {
    pub fn model_name(&self) -> &'static str {
        self.model.display_name()
    }
}

/// Trains every applicable model on one dataset and keeps the best
#[derive(Debug, Clone, Default)]
pub struct BestModelSelector {
    pub policy: ScoringPolicy,
    pub options: TrainOptions,
    pub svm_mode: SvmMode,
}

impl BestModelSelector {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    /// Models tried for this target: k-means joins only for targets with
    /// more than 10 distinct values.
    pub fn candidates(&self, data: &TrainingData) -> Vec<ModelKind> {
        let mut kinds = vec![ModelKind::LinearRegression, ModelKind::RandomForest, ModelKind::Svm];
        if distinct_count(&data.y.to_vec()) > CLASSIFICATION_MAX_CLASSES {
            kinds.push(ModelKind::KMeans);
        }
        kinds
    }

    /// Run all candidates and return the highest-scoring one. Any trainer
    /// failure aborts the run; equal scores keep the earlier model.
    pub fn select(
        &self,
        data: &TrainingData,
        store: &ModelStore,
        cancel: &CancellationToken,
    ) -> Result<BestModelResult> {
        let task = TaskKind::infer(&data.y.to_vec(), CLASSIFICATION_MAX_CLASSES);
        let mut best: Option<(f64, TrainingResult)> = None;
        let mut candidates = Vec::new();

        for kind in self.candidates(data) {
            let trainer = trainer_for(kind, self.svm_mode);
            let result = train_and_persist(trainer.as_ref(), data, &self.options, store, cancel)?;
            let score = self.policy.score(&result.metrics, task);
            debug!(model = kind.name(), score, "Candidate scored");

            candidates.push((kind, result.metrics.clone()));
            let better = best.as_ref().map_or(true, |(top, _)| score > *top);
            if better {
                best = Some((score, result));
            }
        }

        let (score, winner) = best.ok_or_else(|| {
            QuickmlError::TrainingError("no candidate models were trained".to_string())
        })?;
        info!(
            model = winner.kind.name(),
            score,
            policy = ?self.policy,
            "Best model selected"
        );

        Ok(BestModelResult {
            model: winner.kind,
            metrics: winner.metrics,
            artifact: winner.artifact,
            candidates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use ndarray::{Array1, Array2};
    use std::sync::Arc;

    fn bundle(accuracy: Option<f64>, rmse: Option<f64>) -> MetricBundle {
        MetricBundle {
            accuracy,
            rmse,
            ..MetricBundle::default()
        }
    }

    #[test]
    fn test_legacy_prefers_accuracy() {
        let policy = ScoringPolicy::Legacy;
        let task = TaskKind::Regression;
        assert_eq!(policy.score(&bundle(Some(0.9), Some(3.0)), task), 0.9);
        assert_eq!(policy.score(&bundle(Some(0.0), Some(3.0)), task), -3.0);
        assert_eq!(policy.score(&bundle(None, Some(2.0)), task), -2.0);
        assert_eq!(policy.score(&bundle(None, None), task), f64::NEG_INFINITY);
    }

    #[test]
    fn test_task_aware() {
        let policy = ScoringPolicy::TaskAware;
        let mut classifier = bundle(Some(0.8), None);
        classifier.confusion_matrix = Some(vec![vec![1]]);
        let percent = bundle(Some(70.0), Some(1.0));

        assert_eq!(policy.score(&classifier, TaskKind::Classification), 0.8);
        assert_eq!(policy.score(&percent, TaskKind::Classification), f64::NEG_INFINITY);

        let mut reg = bundle(None, Some(1.0));
        reg.r2 = Some(0.5);
        assert_eq!(policy.score(&reg, TaskKind::Regression), 0.5);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("task_aware".parse::<ScoringPolicy>().unwrap(), ScoringPolicy::TaskAware);
        assert_eq!("LEGACY".parse::<ScoringPolicy>().unwrap(), ScoringPolicy::Legacy);
        assert!("best".parse::<ScoringPolicy>().is_err());
    }

    #[test]
    fn test_select_picks_max_score() {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| 100.0 + 3.0 * i as f64);
        let data = TrainingData::new(x, y).unwrap();

        let store = Arc::new(MemoryStore::new());
        let models = ModelStore::new(store.clone(), store);
        let selector = BestModelSelector::default();

        let kinds = selector.candidates(&data);
        assert_eq!(kinds.len(), 4);

        let result = selector.select(&data, &models, &CancellationToken::new()).unwrap();
        assert_eq!(result.candidates.len(), 4);

        let task = TaskKind::Regression;
        let top = result
            .candidates
            .iter()
            .map(|(_, m)| selector.policy.score(m, task))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(selector.policy.score(&result.metrics, task), top);
        assert_eq!(result.metrics.file_id.as_deref(), Some(result.artifact.file_id.as_str()));
    }

    #[test]
    fn test_kmeans_skipped_for_few_classes() {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| i as f64);
        let y = Array1::from_shape_fn(20, |i| (i % 2) as f64);
        let data = TrainingData::new(x, y).unwrap();
        assert!(!BestModelSelector::default().candidates(&data).contains(&ModelKind::KMeans));
    }
}
