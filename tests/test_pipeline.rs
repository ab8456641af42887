//! Integration test: upload bytes → detect target → preprocess → train → select

use std::sync::Arc;

use polars::prelude::*;
use quickml::data::{frame_from_documents, frame_to_documents, parse_bytes, DatasetFormat};
use quickml::preprocessing::{detect_target_column, PreprocessingConfig, Preprocessor, TaskKind};
use quickml::store::{DocumentStore, FileStore, MemoryStore};
use quickml::training::{
    BestModelSelector, ModelKind, ModelStore, ScoringPolicy, TrainOptions, TrainTarget, TrainingData,
    TrainingJob,
};
use tokio_util::sync::CancellationToken;

const CATEGORIES: [&str; 5] = ["red", "green", "blue", "black", "white"];

/// 100 rows: `amount` unique floats, `category` with 5 values, `label` 0/1
fn mixed_csv() -> String {
    let mut csv = String::from("amount,category,label\n");
    for i in 0..100 {
        let amount = 10.0 + i as f64 * 1.37 + (i % 7) as f64 * 0.011;
        let category = CATEGORIES[i % 5];
        let label = if amount > 70.0 { 1 } else { 0 };
        csv.push_str(&format!("{},{},{}\n", amount, category, label));
    }
    csv
}

fn regression_frame(n: usize, offset: f64) -> DataFrame {
    let x1: Vec<f64> = (0..n).map(|i| i as f64 + offset).collect();
    let x2: Vec<f64> = (0..n).map(|i| ((i * 13) % 17) as f64).collect();
    let x3: Vec<f64> = (0..n).map(|i| (i as f64 * 0.3).sin()).collect();
    let y: Vec<f64> = (0..n)
        .map(|i| 4.0 * i as f64 + 2.0 * ((i * 13) % 17) as f64 + 5.0)
        .collect();
    df!(
        "x1" => &x1,
        "x2" => &x2,
        "x3" => &x3,
        "price" => &y
    )
    .unwrap()
}

#[test]
fn test_mixed_csv_detects_label_and_limits_features() {
    let df = parse_bytes(DatasetFormat::Csv, mixed_csv().as_bytes()).unwrap();
    assert_eq!(df.height(), 100);

    // through the document layer, as the server stores it
    let docs = frame_to_documents(&df).unwrap();
    let df = frame_from_documents(&docs).unwrap();

    let target = detect_target_column(&df).unwrap();
    assert_eq!(target, "label");

    let config = PreprocessingConfig::default().with_k_features(3).with_pca(false, 5);
    let out = Preprocessor::with_config(config).fit_transform(&df, &target).unwrap();
    assert!(out.selected_features.len() <= 3);
    assert_eq!(out.features.width(), out.selected_features.len());
    assert_eq!(out.task, TaskKind::Classification);
    assert_eq!(out.target_column(), "label");
}

#[test]
fn test_default_pipeline_outputs_pca_columns() {
    let df = parse_bytes(DatasetFormat::Csv, mixed_csv().as_bytes()).unwrap();
    let out = Preprocessor::new().fit_transform(&df, "label").unwrap();

    let names = out.feature_names();
    assert!(!names.is_empty() && names.len() <= 5);
    assert!(names.iter().all(|n| n.starts_with("pca_")));

    let frame = out.to_frame().unwrap();
    assert!(frame.column("label").is_ok());
}

#[test]
fn test_each_call_standardizes_its_own_input() {
    let config = PreprocessingConfig::default().with_pca(false, 5);
    let a = Preprocessor::with_config(config.clone())
        .fit_transform(&regression_frame(60, 0.0), "price")
        .unwrap();
    let b = Preprocessor::with_config(config)
        .fit_transform(&regression_frame(60, 5000.0), "price")
        .unwrap();

    // robust scaling removes the shift in x1
    let xa = a.feature_matrix().unwrap();
    let xb = b.feature_matrix().unwrap();
    assert_eq!(xa.dim(), xb.dim());
    for (va, vb) in xa.iter().zip(xb.iter()) {
        assert!((va - vb).abs() < 1e-9);
    }
}

#[test]
fn test_training_on_processed_documents() {
    let df = regression_frame(80, 0.0);
    let out = Preprocessor::new().fit_transform(&df, "price").unwrap();

    let store = Arc::new(MemoryStore::new());
    store.insert_many("processed_test", out.to_documents().unwrap()).unwrap();
    let stored = frame_from_documents(&store.find_all("processed_test").unwrap()).unwrap();

    let data = TrainingData::from_frame(&stored, "price").unwrap();
    assert_eq!(data.n_samples(), 80);

    let models = ModelStore::new(store.clone(), store.clone());
    let job = TrainingJob::new(data.clone(), TrainTarget::Single(ModelKind::LinearRegression));
    let first = job.run_blocking(&models, &CancellationToken::new()).unwrap();
    let second = job.run_blocking(&models, &CancellationToken::new()).unwrap();

    // fixed seed split gives identical scores
    assert_eq!(first.metrics.rmse, second.metrics.rmse);
    assert_eq!(first.metrics.r2, second.metrics.r2);
    assert!(first.metrics.file_id.is_some());
}

#[test]
fn test_best_model_selection_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(FileStore::open(dir.path()).unwrap());
    let models = ModelStore::new(store.clone(), store.clone());

    let df = regression_frame(60, 0.0);
    let data = TrainingData::from_frame(&df, "price").unwrap();

    let selector = BestModelSelector::new(ScoringPolicy::TaskAware)
        .with_options(TrainOptions::default());
    let best = selector.select(&data, &models, &CancellationToken::new()).unwrap();

    // continuous target: k-means joins, r2 decides
    assert_eq!(best.candidates.len(), 4);
    let top_r2 = best
        .candidates
        .iter()
        .filter_map(|(_, m)| m.r2)
        .fold(f64::NEG_INFINITY, f64::max);
    assert_eq!(best.metrics.r2, Some(top_r2));

    let restored = models.load(&best.artifact.file_id).unwrap();
    assert_eq!(restored.kind(), best.model);

    let metrics_docs = store.find_all(&best.artifact.metrics_collection).unwrap();
    assert_eq!(metrics_docs.len(), 1);
    assert!(metrics_docs[0].contains_key("silhouette_score"));
}

#[test]
fn test_legacy_policy_prefers_accuracy() {
    let df = regression_frame(60, 0.0);
    let data = TrainingData::from_frame(&df, "price").unwrap();
    let store = Arc::new(MemoryStore::new());
    let models = ModelStore::new(store.clone(), store);

    let best = BestModelSelector::default()
        .select(&data, &models, &CancellationToken::new())
        .unwrap();

    let any_accuracy = best
        .candidates
        .iter()
        .any(|(_, m)| m.accuracy.map_or(false, |a| a != 0.0));
    if any_accuracy {
        let top = best
            .candidates
            .iter()
            .filter_map(|(_, m)| m.accuracy.filter(|a| *a != 0.0))
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(best.metrics.accuracy, Some(top));
    } else {
        let min_rmse = best
            .candidates
            .iter()
            .filter_map(|(_, m)| m.rmse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(best.metrics.rmse, Some(min_rmse));
    }
}
