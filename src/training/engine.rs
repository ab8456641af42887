//! Training jobs: run a single trainer or best-model selection off the async
//! runtime, bounded by a deadline.

use super::metrics::MetricBundle;
use super::models::{ModelKind, TrainOptions, TrainingData};
use super::persistence::{ArtifactRef, ModelStore};
use super::selector::{BestModelSelector, ScoringPolicy};
use super::trainers::{train_and_persist, trainer_for, SvmMode};
use crate::error::{QuickmlError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// What a job trains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrainTarget {
    Single(ModelKind),
    BestModel,
}

/// Result of a finished job
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// `linear_regression`-style name for single runs, display name of the
    /// winner for best-model runs
    pub model_type: String,
    pub metrics: MetricBundle,
    pub artifact: ArtifactRef,
}

/// One training request, ready to run
#[derive(Debug, Clone)]
pub struct TrainingJob {
    pub data: TrainingData,
    pub target: TrainTarget,
    pub options: TrainOptions,
    pub policy: ScoringPolicy,
    pub svm_mode: SvmMode,
}

impl TrainingJob {
    pub fn new(data: TrainingData, target: TrainTarget) -> Self {
        Self {
            data,
            target,
            options: TrainOptions::default(),
            policy: ScoringPolicy::default(),
            svm_mode: SvmMode::default(),
        }
    }

    pub fn with_policy(mut self, policy: ScoringPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_options(mut self, options: TrainOptions) -> Self {
        self.options = options;
        self
    }

    /// Run on the current thread.
    pub fn run_blocking(&self, store: &ModelStore, cancel: &CancellationToken) -> Result<JobOutcome> {
        match self.target {
            TrainTarget::Single(kind) => {
                let trainer = trainer_for(kind, self.svm_mode);
                let result = train_and_persist(trainer.as_ref(), &self.data, &self.options, store, cancel)?;
                Ok(JobOutcome {
                    model_type: kind.name().to_string(),
                    metrics: result.metrics,
                    artifact: result.artifact,
                })
            }
            TrainTarget::BestModel => {
                let selector = BestModelSelector {
                    policy: self.policy,
                    options: self.options.clone(),
                    svm_mode: self.svm_mode,
                };
                let best = selector.select(&self.data, store, cancel)?;
                Ok(JobOutcome {
                    model_type: best.model_name().to_string(),
                    metrics: best.metrics,
                    artifact: best.artifact,
                })
            }
        }
    }

    /// Run on the blocking pool. When `deadline` passes first the token is
    /// cancelled, so the trainer stops at its next check, and the job fails
    /// with [`QuickmlError::Cancelled`].
    pub async fn run(self, store: ModelStore, deadline: Duration) -> Result<JobOutcome> {
        let cancel = CancellationToken::new();
        let worker_token = cancel.clone();
        let target = self.target;

        let handle = tokio::task::spawn_blocking(move || self.run_blocking(&store, &worker_token));

        match tokio::time::timeout(deadline, handle).await {
            Ok(Ok(outcome)) => {
                if let Ok(done) = &outcome {
                    info!(model = %done.model_type, file_id = %done.artifact.file_id, "Training job finished");
                }
                outcome
            }
            Ok(Err(join_err)) => Err(QuickmlError::TrainingError(format!(
                "training task failed: {}",
                join_err
            ))),
            Err(_) => {
                cancel.cancel();
                warn!(?target, deadline_secs = deadline.as_secs(), "Training deadline exceeded");
                Err(QuickmlError::Cancelled(format!(
                    "training exceeded the {}s deadline",
                    deadline.as_secs()
                )))
            }
        }
    }
}
