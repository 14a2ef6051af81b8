// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Offline training pipeline
//!
//! Loads a labeled CSV, derives the label codec from the observed categories,
//! extracts features, fits a random forest on a stratified training split,
//! evaluates it on the held-out split and persists the resulting bundle.
//! Any failure aborts the run before anything is written.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument};

use crate::{
    artifact::{ArtifactName, ArtifactStore, DEFAULT_ARTIFACT_DIR, ModelBundle},
    classifier::Classifier,
    dataset::{Dataset, DatasetColumns},
    error::{ClassifierError, ClassifierResult},
    evaluation::ClassificationReport,
    features::{FeatureVector, extract},
    forest::{ForestParams, RandomForest},
    labels::{ClassId, LabelCodec},
    split::stratified_split,
};

/// Settings of a training run, loadable from YAML
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// CSV file of labeled URLs
    pub dataset: PathBuf,
    /// Column names within the dataset
    pub columns: DatasetColumns,
    /// Directory the artifact is written to
    pub artifact_dir: PathBuf,
    /// Name the artifact is saved under
    pub artifact_name: ArtifactName,
    /// Share of each class held out for evaluation
    pub test_fraction: f64,
    /// Seed of the train/test split
    pub seed: u64,
    /// Random forest hyperparameters
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: PathBuf::from("data/malicious_phish.csv"),
            columns: DatasetColumns::default(),
            artifact_dir: PathBuf::from(DEFAULT_ARTIFACT_DIR),
            artifact_name: ArtifactName::default(),
            test_fraction: 0.2,
            seed: 42,
            forest: ForestParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Load training settings from a YAML file
    pub async fn from_file<P: AsRef<Path>>(path: P) -> ClassifierResult<Self> {
        let path = path.as_ref();
        debug!("Loading training config from: {}", path.display());

        let content = fs::read_to_string(path).await.map_err(|e| {
            ClassifierError::io(format!("Failed to read {}: {e}", path.display()))
        })?;

        let config: TrainingConfig = serde_yaml::from_str(&content).map_err(|e| {
            ClassifierError::yaml(format!("Failed to parse {}: {e}", path.display()))
        })?;

        info!("Loaded training config from {}", path.display());
        Ok(config)
    }

    /// Validate the settings
    pub fn validate(&self) -> ClassifierResult<()> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ClassifierError::config(format!(
                "test_fraction must be between 0 and 1, got {}",
                self.test_fraction
            )));
        }
        if self.columns.url.is_empty() || self.columns.label.is_empty() {
            return Err(ClassifierError::config("dataset column names cannot be empty"));
        }
        if self.columns.url == self.columns.label {
            return Err(ClassifierError::config(
                "URL and label columns must be different",
            ));
        }
        self.forest.validate()
    }
}

/// Result of a completed training run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// The persisted bundle
    pub bundle: ModelBundle,
    /// Held-out evaluation
    pub report: ClassificationReport,
    /// Rows fitted on
    pub train_rows: usize,
    /// Rows evaluated on
    pub test_rows: usize,
    /// Where the artifact was written, once saved
    pub artifact_path: Option<PathBuf>,
}

/// Offline training pipeline
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    /// Create a pipeline with validated settings
    pub fn new(config: TrainingConfig) -> ClassifierResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Settings of this pipeline
    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load the configured dataset, train, evaluate and persist
    #[instrument(skip(self), fields(dataset = %self.config.dataset.display()))]
    pub async fn run(&self) -> ClassifierResult<TrainingOutcome> {
        let dataset = Dataset::from_path(&self.config.dataset, &self.config.columns).await?;
        let mut outcome = self.train(&dataset)?;

        let store = ArtifactStore::new(&self.config.artifact_dir);
        let path = store
            .save(&self.config.artifact_name, &outcome.bundle)
            .await?;
        outcome.artifact_path = Some(path);

        Ok(outcome)
    }

    /// Train and evaluate on an in-memory dataset without persisting
    #[instrument(skip(self, dataset), fields(rows = dataset.len()))]
    pub fn train(&self, dataset: &Dataset) -> ClassifierResult<TrainingOutcome> {
        if dataset.is_empty() {
            return Err(ClassifierError::invalid_input("dataset has no rows"));
        }

        let codec = LabelCodec::from_observed(dataset.rows().iter().map(|row| &row.label))?;
        info!(labels = ?codec.labels(), "Unique labels in dataset");

        let features: Vec<FeatureVector> = dataset.rows().iter().map(|row| extract(&row.url)).collect();
        let labels = dataset
            .rows()
            .iter()
            .map(|row| codec.encode(&row.label))
            .collect::<ClassifierResult<Vec<ClassId>>>()?;

        let split = stratified_split(&labels, self.config.test_fraction, self.config.seed)?;
        let (train_x, train_y) = select(&features, &labels, &split.train);
        let (test_x, test_y) = select(&features, &labels, &split.test);
        info!(
            train_rows = train_x.len(),
            test_rows = test_x.len(),
            "Split dataset"
        );

        let forest = RandomForest::fit(&train_x, &train_y, codec.len(), &self.config.forest)?;

        let predicted = test_x
            .iter()
            .map(|row| forest.predict(row))
            .collect::<ClassifierResult<Vec<ClassId>>>()?;
        let report = ClassificationReport::evaluate(&codec, &test_y, &predicted)?;
        info!(accuracy = report.accuracy, "Evaluated on held-out split");

        let bundle = ModelBundle::new(codec, forest)?;
        Ok(TrainingOutcome {
            bundle,
            report,
            train_rows: train_x.len(),
            test_rows: test_x.len(),
            artifact_path: None,
        })
    }
}

fn select(
    features: &[FeatureVector],
    labels: &[ClassId],
    rows: &[usize],
) -> (Vec<FeatureVector>, Vec<ClassId>) {
    rows.iter().map(|&row| (features[row], labels[row])).unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::LabeledUrl;
    use tempfile::tempdir;

    const SAMPLE_CSV: &str = "\
url,type
https://www.google.com,benign
https://github.com/rust-lang/rust,benign
https://en.wikipedia.org/wiki/Rust,benign
https://docs.rs/tokio,benign
https://crates.io/crates/serde,benign
https://www.rust-lang.org/learn,benign
http://paypal-secure.login-verify.example.xyz/signin.php?acct=1,phishing
http://apple.id-confirm.example.top/verify.php?session=22,phishing
http://bank.update-details.example.info/login.php?u=333,phishing
http://secure.account-check.example.click/auth.php?t=4444,phishing
http://free-download.example.ru/setup.exe,malware
http://cracked-apps.example.cn/installer.exe?id=9,malware
http://driver-update.example.su/driver.exe,malware
";

    fn sample_dataset() -> Dataset {
        Dataset::from_reader(SAMPLE_CSV.as_bytes(), &DatasetColumns::default())
            .expect("sample dataset")
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestParams {
                n_estimators: 15,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn codec_follows_first_seen_order() {
        let pipeline = TrainingPipeline::new(quick_config()).expect("valid config");
        let outcome = pipeline.train(&sample_dataset()).expect("train");

        assert_eq!(
            outcome.bundle.labels.labels(),
            ["benign", "phishing", "malware"]
        );
        assert_eq!(outcome.train_rows + outcome.test_rows, 13);
        assert_eq!(outcome.report.classes.len(), 3);
        assert!(outcome.report.classes.iter().all(|m| m.support >= 1));
    }

    #[test]
    fn training_is_reproducible() {
        let pipeline = TrainingPipeline::new(quick_config()).expect("valid config");
        let a = pipeline.train(&sample_dataset()).expect("train");
        let b = pipeline.train(&sample_dataset()).expect("train");

        assert_eq!(a.bundle.forest, b.bundle.forest);
        assert_eq!(a.report, b.report);
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let pipeline = TrainingPipeline::new(quick_config()).expect("valid config");
        let err = pipeline.train(&Dataset::new(Vec::new())).expect_err("empty");
        assert!(err.is_input_error());
    }

    #[test]
    fn single_class_dataset_trains() {
        let rows = (0..5)
            .map(|i| LabeledUrl {
                url: format!("https://site{i}.example.com"),
                label: "benign".to_string(),
            })
            .collect();
        let pipeline = TrainingPipeline::new(quick_config()).expect("valid config");
        let outcome = pipeline.train(&Dataset::new(rows)).expect("train");
        assert_eq!(outcome.bundle.labels.len(), 1);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = TrainingConfig {
            test_fraction: 1.5,
            ..TrainingConfig::default()
        };
        assert!(TrainingPipeline::new(config).is_err());
    }

    #[tokio::test]
    async fn run_persists_loadable_artifact() {
        let dir = tempdir().expect("tempdir");
        let dataset_path = dir.path().join("urls.csv");
        std::fs::write(&dataset_path, SAMPLE_CSV).expect("write dataset");

        let config = TrainingConfig {
            dataset: dataset_path,
            artifact_dir: dir.path().join("models"),
            ..quick_config()
        };
        let pipeline = TrainingPipeline::new(config).expect("valid config");
        let outcome = pipeline.run().await.expect("run");

        let path = outcome.artifact_path.expect("saved");
        assert!(path.ends_with("rf_malicious_url.json"));

        let loaded = ArtifactStore::new(dir.path().join("models"))
            .load(&ArtifactName::default())
            .await
            .expect("load");
        assert_eq!(loaded.model_id, outcome.bundle.model_id);
    }

    #[tokio::test]
    async fn config_from_yaml() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("training.yaml");
        std::fs::write(
            &path,
            "dataset: data/urls.csv\n\
             artifact_name: rf_v2\n\
             test_fraction: 0.25\n\
             columns:\n  label: category\n\
             forest:\n  n_estimators: 50\n  max_depth: 12\n  max_features: log2\n",
        )
        .expect("write config");

        let config = TrainingConfig::from_file(&path).await.expect("parse");
        assert_eq!(config.dataset, PathBuf::from("data/urls.csv"));
        assert_eq!(config.artifact_name.as_str(), "rf_v2");
        assert_eq!(config.columns.url, "url");
        assert_eq!(config.columns.label, "category");
        assert_eq!(config.forest.n_estimators, 50);
        assert_eq!(config.forest.max_depth, Some(12));
        assert_eq!(config.forest.min_samples_split, 2);
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn config_rejects_bad_artifact_name() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("training.yaml");
        std::fs::write(&path, "artifact_name: ../escape\n").expect("write config");

        assert!(TrainingConfig::from_file(&path).await.is_err());
    }
}
