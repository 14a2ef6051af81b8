// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Malicious URL classification for QR-code scanning
//!
//! This crate decides whether a URL embedded in a QR code is safe to follow.
//! It contains both halves of the system: an offline training pipeline that
//! fits a random forest on labeled URLs, and an online serving pipeline that
//! classifies one URL at a time with the persisted model.
//!
//! # Key Features
//!
//! - **Shared feature contract**: training and serving call the same total,
//!   deterministic [`extract`] function over a fixed nine-field schema
//! - **Persisted label codec**: the category names a model was trained with
//!   travel inside its bundle, so serving always decodes ids correctly
//! - **Reproducible training**: stratified splitting and forest growth are
//!   driven by fixed seeds
//! - **Degraded serving**: a missing or inconsistent artifact never crashes
//!   the host; requests receive a configuration error instead
//!
//! # Architecture
//!
//! - [`features`]: URL splitting and feature extraction
//! - [`labels`]: category name and class id mapping
//! - [`classifier`]: the trained-model trait
//! - [`forest`]: random forest implementation of [`Classifier`]
//! - [`artifact`]: model bundles and their on-disk store
//! - [`dataset`], [`split`], [`evaluation`]: training data handling
//! - [`training`]: the offline pipeline
//! - [`predictor`]: the online pipeline
//! - [`error`]: error taxonomy
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use url_classifier::{ArtifactName, ArtifactStore, ServingPipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = ArtifactStore::new("models");
//! let pipeline = ServingPipeline::load(&store, &ArtifactName::default()).await;
//!
//! let prediction = pipeline.check_url(Some("http://example.com/login.php"))?;
//! println!("{}", prediction.verdict);
//! # Ok(())
//! # }
//! ```

pub mod artifact;
pub mod classifier;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod features;
pub mod forest;
pub mod labels;
pub mod predictor;
pub mod split;
pub mod training;

// Re-export main types for convenience
pub use artifact::{ArtifactName, ArtifactStore, ModelBundle};
pub use classifier::Classifier;
pub use dataset::{Dataset, DatasetColumns, LabeledUrl};
pub use error::{ClassifierError, ClassifierResult};
pub use evaluation::ClassificationReport;
pub use features::{FEATURE_COUNT, FEATURE_NAMES, FeatureVector, extract};
pub use forest::{ClassWeight, ForestParams, MaxFeatures, RandomForest};
pub use labels::{ClassId, LabelCodec};
pub use predictor::{Prediction, ServingPipeline};
pub use shared_types::Verdict;
pub use split::{SplitIndices, stratified_split};
pub use training::{TrainingConfig, TrainingOutcome, TrainingPipeline};
