// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! URL classifier trainer
//!
//! Fits the random forest on a labeled CSV, prints the held-out evaluation
//! and writes the model bundle the API server loads.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use url_classifier::{ArtifactName, TrainingConfig, TrainingPipeline};

#[derive(Parser, Debug)]
#[command(
    name = "url-trainer",
    about = "Train the malicious URL classifier and persist the model bundle"
)]
struct Cli {
    /// YAML training config. Flags below override its values.
    #[arg(long, env = "URL_TRAINER_CONFIG")]
    config: Option<PathBuf>,

    /// CSV dataset of labeled URLs.
    #[arg(long)]
    dataset: Option<PathBuf>,

    /// Header of the URL column.
    #[arg(long)]
    url_column: Option<String>,

    /// Header of the category column.
    #[arg(long)]
    label_column: Option<String>,

    /// Directory the artifact is written to.
    #[arg(long)]
    artifact_dir: Option<PathBuf>,

    /// Name the artifact is saved under.
    #[arg(long)]
    artifact_name: Option<String>,

    /// Share of each class held out for evaluation.
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Seed for the split and the forest.
    #[arg(long)]
    seed: Option<u64>,

    /// Number of trees.
    #[arg(long)]
    n_estimators: Option<usize>,

    /// Maximum tree depth.
    #[arg(long)]
    max_depth: Option<usize>,
}

impl Cli {
    fn apply(self, mut config: TrainingConfig) -> Result<TrainingConfig> {
        if let Some(dataset) = self.dataset {
            config.dataset = dataset;
        }
        if let Some(url_column) = self.url_column {
            config.columns.url = url_column;
        }
        if let Some(label_column) = self.label_column {
            config.columns.label = label_column;
        }
        if let Some(artifact_dir) = self.artifact_dir {
            config.artifact_dir = artifact_dir;
        }
        if let Some(artifact_name) = self.artifact_name {
            config.artifact_name = ArtifactName::new(artifact_name)?;
        }
        if let Some(test_fraction) = self.test_fraction {
            config.test_fraction = test_fraction;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
            config.forest.seed = seed;
        }
        if let Some(n_estimators) = self.n_estimators {
            config.forest.n_estimators = n_estimators;
        }
        if let Some(max_depth) = self.max_depth {
            config.forest.max_depth = Some(max_depth);
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let base = match &cli.config {
        Some(path) => TrainingConfig::from_file(path)
            .await
            .with_context(|| format!("loading training config {}", path.display()))?,
        None => TrainingConfig::default(),
    };
    let config = cli.apply(base)?;

    info!(
        dataset = %config.dataset.display(),
        artifact = %config.artifact_name,
        n_estimators = config.forest.n_estimators,
        "Starting training run"
    );

    let pipeline = TrainingPipeline::new(config)?;
    let outcome = pipeline.run().await.context("training run failed")?;

    info!(
        model_id = %outcome.bundle.model_id,
        train_rows = outcome.train_rows,
        test_rows = outcome.test_rows,
        accuracy = outcome.report.accuracy,
        artifact = ?outcome.artifact_path,
        "Training complete"
    );
    println!("Accuracy: {:.4}\n", outcome.report.accuracy);
    println!("{}", outcome.report);

    Ok(())
}
