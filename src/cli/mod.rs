//! quickml CLI Module
//!
//! Command-line access to target detection, preprocessing, training and
//! best-model selection on local files, plus the `serve` command.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::data::load_path;
use crate::preprocessing::{detect_target_column, PreprocessingConfig, Preprocessor};
use crate::server::{run_server, ServerConfig, StoreBackend};
use crate::store::FileStore;
use crate::training::{
    BestModelSelector, MetricBundle, ModelKind, ModelStore, ScoringPolicy, TrainOptions, TrainTarget,
    TrainingData, TrainingJob,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn metric_line(name: &str, value: Option<f64>) {
    let shown = value.map_or_else(|| "null".to_string(), |v| format!("{:.4}", v));
    println!("  {:<18} {}", muted(name), shown.white());
}

fn print_metrics(metrics: &MetricBundle) {
    metric_line("rmse", metrics.rmse);
    metric_line("r2", metrics.r2);
    metric_line("mae", metrics.mae);
    metric_line("accuracy", metrics.accuracy);
    metric_line("precision", metrics.precision);
    metric_line("recall", metrics.recall);
    metric_line("f1_score", metrics.f1_score);
    metric_line("silhouette_score", metrics.silhouette_score);
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "quickml")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "AutoML helper: target detection, preprocessing, training and model selection")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the web server
    Serve {
        /// Server port
        #[arg(short, long, env = "API_PORT", default_value = "8080")]
        port: u16,

        /// Server host
        #[arg(long, env = "API_HOST", default_value = "0.0.0.0")]
        host: String,

        /// Directory for the file store
        #[arg(long, env = "DATA_DIR", default_value = "./data")]
        data_dir: String,

        /// Store backend (file, memory)
        #[arg(long, env = "STORE_BACKEND", default_value = "file")]
        store: String,
    },

    /// Print the column that would be used as the prediction target
    DetectTarget {
        /// Input data file (CSV, JSON, Parquet, or Excel)
        #[arg(short, long)]
        data: PathBuf,
    },

    /// Run the preprocessing pipeline and write the result as CSV
    Preprocess {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        output: PathBuf,

        /// Target column (detected when omitted)
        #[arg(short, long)]
        target: Option<String>,

        /// Features kept by mutual-information selection
        #[arg(short, long, default_value = "10")]
        k: usize,

        /// Categories kept per categorical column
        #[arg(long, default_value = "5")]
        top_n: usize,

        /// Drop rows outside the 1.5·IQR fences
        #[arg(long)]
        remove_outliers: bool,

        /// Skip PCA
        #[arg(long)]
        no_pca: bool,

        #[arg(long, default_value = "5")]
        pca_components: usize,
    },

    /// Train one model
    Train {
        #[arg(short, long)]
        data: PathBuf,

        /// linear_regression, random_forest, svm or k_means
        #[arg(short, long, default_value = "linear_regression")]
        model: String,

        #[arg(short, long)]
        target: Option<String>,

        /// Preprocess the file before training
        #[arg(long)]
        preprocess: bool,

        /// 5-fold cross-validated evaluation instead of a hold-out split
        #[arg(long)]
        cross_validation: bool,

        /// Where model artifacts are written
        #[arg(long, env = "DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },

    /// Train every applicable model and keep the best
    Select {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long)]
        target: Option<String>,

        #[arg(long)]
        preprocess: bool,

        #[arg(long)]
        cross_validation: bool,

        /// legacy or task_aware
        #[arg(long, env = "SCORING_POLICY", default_value = "legacy")]
        policy: String,

        #[arg(long, env = "DATA_DIR", default_value = "./data")]
        data_dir: PathBuf,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

fn load(path: &Path) -> anyhow::Result<DataFrame> {
    step_run(&format!("Loading {}", path.display()));
    let start = Instant::now();
    let df = load_path(path)?;
    step_done(&format!("{} rows × {} cols in {:?}", df.height(), df.width(), start.elapsed()));
    Ok(df)
}

/// Resolve the target and build the training matrix, optionally through the
/// preprocessing pipeline.
fn training_data(df: &DataFrame, target: Option<String>, preprocess: bool) -> anyhow::Result<TrainingData> {
    let target = match target {
        Some(t) => t,
        None => detect_target_column(df)?,
    };
    println!("  {:<18} {}", muted("target"), target.cyan());

    if preprocess {
        step_run("Preprocessing");
        let out = Preprocessor::new().fit_transform(df, &target)?;
        let frame = out.to_frame()?;
        step_done(&format!("{} features", out.selected_features.len()));
        Ok(TrainingData::from_frame(&frame, &target)?)
    } else {
        Ok(TrainingData::from_frame(df, &target)?)
    }
}

fn model_store(data_dir: &Path) -> anyhow::Result<ModelStore> {
    let store = Arc::new(FileStore::open(data_dir)?);
    Ok(ModelStore::new(store.clone(), store))
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_serve(host: String, port: u16, data_dir: String, store: &str) -> anyhow::Result<()> {
    let config = ServerConfig {
        host,
        port,
        data_dir,
        store_backend: store.parse::<StoreBackend>()?,
        ..ServerConfig::default()
    };
    run_server(config).await
}

pub fn cmd_detect_target(data: &Path) -> anyhow::Result<()> {
    section("Detect target");
    let df = load(data)?;
    let target = detect_target_column(&df)?;
    println!();
    println!("  {:<18} {}", muted("target"), target.white().bold());
    println!();
    Ok(())
}

pub fn cmd_preprocess(
    data: &Path,
    output: &Path,
    target: Option<String>,
    config: PreprocessingConfig,
) -> anyhow::Result<()> {
    section("Preprocess");
    let df = load(data)?;
    let target = match target {
        Some(t) => t,
        None => detect_target_column(&df)?,
    };

    step_run("Processing");
    let start = Instant::now();
    let mut preprocessor = Preprocessor::with_config(config);
    let out = preprocessor.fit_transform(&df, &target)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!("  {:<18} {}", muted("target"), target.cyan());
    println!("  {:<18} {:?}", muted("task"), out.task);
    println!("  {:<18} {}", muted("selected"), out.selected_features.join(", "));

    step_run(&format!("Saving → {}", output.display()));
    let mut frame = out.to_frame()?;
    let mut file = std::fs::File::create(output)?;
    CsvWriter::new(&mut file).finish(&mut frame)?;
    step_done(&format!("{} rows × {} cols", frame.height(), frame.width()));

    println!();
    Ok(())
}

pub fn cmd_train(
    data: &Path,
    model: &str,
    target: Option<String>,
    preprocess: bool,
    cross_validation: bool,
    data_dir: &Path,
) -> anyhow::Result<()> {
    section("Train");
    let kind: ModelKind = model.parse()?;
    let df = load(data)?;
    let training = training_data(&df, target, preprocess)?;
    let store = model_store(data_dir)?;

    step_run(&format!("Training {}", kind.name().cyan()));
    let start = Instant::now();
    let job = TrainingJob::new(training, TrainTarget::Single(kind))
        .with_options(TrainOptions::default().with_cross_validation(cross_validation));
    let outcome = job.run_blocking(&store, &CancellationToken::new())?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    print_metrics(&outcome.metrics);
    println!("  {:<18} {}", muted("file_id"), outcome.artifact.file_id.white());
    println!("  {:<18} {}", muted("filename"), outcome.artifact.filename.white());
    println!();
    Ok(())
}

pub fn cmd_select(
    data: &Path,
    target: Option<String>,
    preprocess: bool,
    cross_validation: bool,
    policy: &str,
    data_dir: &Path,
) -> anyhow::Result<()> {
    section("Best model");
    let policy: ScoringPolicy = policy.parse()?;
    let df = load(data)?;
    let training = training_data(&df, target, preprocess)?;
    let store = model_store(data_dir)?;

    step_run("Training candidates");
    let start = Instant::now();
    let selector = BestModelSelector::new(policy)
        .with_options(TrainOptions::default().with_cross_validation(cross_validation));
    let best = selector.select(&training, &store, &CancellationToken::new())?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<20} {:>10} {:>10} {:>10}", muted("Model"), muted("accuracy"), muted("rmse"), muted("r2"));
    println!("  {}", dim(&"─".repeat(54)));
    let fmt = |v: Option<f64>| v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x));
    for (kind, metrics) in &best.candidates {
        println!(
            "  {:<20} {:>10} {:>10} {:>10}",
            kind.display_name(),
            fmt(metrics.accuracy),
            fmt(metrics.rmse),
            fmt(metrics.r2)
        );
    }
    println!("  {}", dim(&"─".repeat(54)));
    println!();
    println!("  {} {} {}", ok("best"), best.model_name().white().bold(), dim(&best.artifact.file_id));
    println!();
    Ok(())
}
