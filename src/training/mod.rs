//! Model training module
//!
//! Provides the estimators and the policy around them:
//! - Linear regression (ordinary least squares)
//! - Decision trees and Random Forests
//! - Support Vector Machines (SMO classifier, epsilon-SVR)
//! - K-Means clustering with silhouette scoring
//! - Hold-out and k-fold evaluation, metric bundles
//! - Trainers, artifact persistence and best-model selection

mod engine;
mod models;
pub mod clustering;
pub mod cross_validation;
pub mod decision_tree;
pub mod linear_models;
pub mod metrics;
pub mod persistence;
pub mod random_forest;
pub mod selector;
pub mod svm;
pub mod trainers;

pub use clustering::{silhouette_score, KMeans};
pub use cross_validation::{cross_val_predict, k_fold_split, train_test_split, CVSplit, TrainTestSplit};
pub use decision_tree::{DecisionTree, TreeNode};
pub use engine::{JobOutcome, TrainTarget, TrainingJob};
pub use linear_models::LinearRegression;
pub use metrics::{ClassificationReport, MetricBundle};
pub use models::{ModelKind, TrainOptions, TrainedModel, TrainingData};
pub use persistence::{ArtifactRef, ModelStore};
pub use random_forest::RandomForest;
pub use selector::{BestModelResult, BestModelSelector, ScoringPolicy};
pub use svm::{KernelType, SvmClassifier, SvmConfig, SvmRegressor};
pub use trainers::{
    train_and_persist, trainer_for, KMeansTrainer, LinearRegressionTrainer, RandomForestTrainer,
    SvmMode, SvmTrainer, Trainer, TrainingResult,
};
