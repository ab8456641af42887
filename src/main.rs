//! quickml - Main Entry Point

use clap::Parser;
use quickml::cli::{cmd_detect_target, cmd_preprocess, cmd_select, cmd_serve, cmd_train, Cli, Commands};
use quickml::preprocessing::PreprocessingConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quickml=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, data_dir, store } => {
            cmd_serve(host, port, data_dir, &store).await?;
        }
        Commands::DetectTarget { data } => {
            cmd_detect_target(&data)?;
        }
        Commands::Preprocess { data, output, target, k, top_n, remove_outliers, no_pca, pca_components } => {
            let config = PreprocessingConfig::default()
                .with_k_features(k)
                .with_top_n_categories(top_n)
                .with_outlier_removal(remove_outliers)
                .with_pca(!no_pca, pca_components);
            cmd_preprocess(&data, &output, target, config)?;
        }
        Commands::Train { data, model, target, preprocess, cross_validation, data_dir } => {
            tokio::task::block_in_place(|| {
                cmd_train(&data, &model, target, preprocess, cross_validation, &data_dir)
            })?;
        }
        Commands::Select { data, target, preprocess, cross_validation, policy, data_dir } => {
            tokio::task::block_in_place(|| {
                cmd_select(&data, target, preprocess, cross_validation, &policy, &data_dir)
            })?;
        }
    }

    Ok(())
}
