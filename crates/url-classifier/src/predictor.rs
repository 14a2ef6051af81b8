// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Online serving pipeline
//!
//! This module provides the [`ServingPipeline`], which loads a persisted
//! model once and then classifies one URL per call. Loading never fails
//! outright: a missing or inconsistent artifact leaves the pipeline in a
//! degraded state that answers every request with a configuration error,
//! so the hosting process stays up and reports why.

use std::{fmt, sync::Arc, time::Instant};

use serde::Serialize;
use shared_types::Verdict;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    artifact::{ArtifactName, ArtifactStore, ModelBundle},
    classifier::Classifier,
    error::{ClassifierError, ClassifierResult},
    features::extract,
    labels::{ClassId, LabelCodec},
};

/// Outcome of classifying one URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    /// Binary decision
    pub verdict: Verdict,
    /// Category the model predicted
    pub category: String,
    /// Class id the model emitted
    pub class_id: ClassId,
}

struct LoadedModel {
    classifier: Arc<dyn Classifier>,
    labels: LabelCodec,
    model_id: Option<Uuid>,
}

enum ModelState {
    Ready(LoadedModel),
    Degraded { reason: String },
}

/// Loaded-once classifier with its label codec
///
/// Immutable after construction, so it is shared across request handlers
/// behind an `Arc` without locking.
pub struct ServingPipeline {
    state: ModelState,
}

impl ServingPipeline {
    /// Load the artifact called `name` from `store`
    ///
    /// Any load failure yields a degraded pipeline rather than an error.
    #[instrument(skip(store), fields(dir = %store.dir().display()))]
    pub async fn load(store: &ArtifactStore, name: &ArtifactName) -> Self {
        match store.load(name).await {
            Ok(bundle) => Self::from_bundle(bundle),
            Err(e) => {
                error!(error = %e, "Model artifact failed to load, serving degraded");
                Self::degraded(e.to_string())
            }
        }
    }

    /// Serve a bundle already in memory
    pub fn from_bundle(bundle: ModelBundle) -> Self {
        if let Err(e) = bundle.validate() {
            warn!(error = %e, "Rejected inconsistent model bundle");
            return Self::degraded(e.to_string());
        }

        info!(
            model_id = %bundle.model_id,
            labels = ?bundle.labels.labels(),
            "Serving pipeline ready"
        );
        Self {
            state: ModelState::Ready(LoadedModel {
                classifier: Arc::new(bundle.forest),
                labels: bundle.labels,
                model_id: Some(bundle.model_id),
            }),
        }
    }

    /// Serve an arbitrary classifier with the codec its ids were encoded with
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the codec and classifier disagree on
    /// the number of classes
    pub fn with_classifier(
        classifier: Arc<dyn Classifier>,
        labels: LabelCodec,
    ) -> ClassifierResult<Self> {
        if classifier.n_classes() != labels.len() {
            return Err(ClassifierError::config(format!(
                "label codec has {} classes but classifier has {}",
                labels.len(),
                classifier.n_classes()
            )));
        }
        Ok(Self {
            state: ModelState::Ready(LoadedModel {
                classifier,
                labels,
                model_id: None,
            }),
        })
    }

    /// A pipeline that rejects every request with `reason`
    pub fn degraded(reason: impl Into<String>) -> Self {
        Self {
            state: ModelState::Degraded {
                reason: reason.into(),
            },
        }
    }

    /// Whether a model is loaded
    pub fn is_ready(&self) -> bool {
        matches!(self.state, ModelState::Ready(_))
    }

    /// Why the model is unavailable, if it is
    pub fn degraded_reason(&self) -> Option<&str> {
        match &self.state {
            ModelState::Ready(_) => None,
            ModelState::Degraded { reason } => Some(reason),
        }
    }

    /// Id of the loaded bundle
    pub fn model_id(&self) -> Option<Uuid> {
        match &self.state {
            ModelState::Ready(model) => model.model_id,
            ModelState::Degraded { .. } => None,
        }
    }

    /// Category names of the loaded model
    pub fn labels(&self) -> Option<&LabelCodec> {
        match &self.state {
            ModelState::Ready(model) => Some(&model.labels),
            ModelState::Degraded { .. } => None,
        }
    }

    /// Classify a single URL
    ///
    /// # Errors
    ///
    /// - [`ClassifierError::ModelUnavailable`] when degraded, checked first
    /// - [`ClassifierError::InvalidInput`] when `url` is absent or empty
    /// - [`ClassifierError::Internal`] when prediction or decoding fails
    #[instrument(skip(self, url), fields(url_len = url.map(str::len)))]
    pub fn check_url(&self, url: Option<&str>) -> ClassifierResult<Prediction> {
        let model = match &self.state {
            ModelState::Ready(model) => model,
            ModelState::Degraded { reason } => {
                return Err(ClassifierError::model_unavailable(reason));
            }
        };

        let url = url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ClassifierError::invalid_input("No URL provided"))?;

        let start_time = Instant::now();
        let features = extract(url);

        let class_id = model.classifier.predict(&features).map_err(|e| {
            error!(error = %e, "Classifier failed on extracted features");
            ClassifierError::internal(format!("prediction failed: {e}"))
        })?;
        let category = model.labels.decode(class_id).map_err(|e| {
            error!(error = %e, class_id, "Classifier emitted an undecodable class");
            ClassifierError::internal(format!("decoding failed: {e}"))
        })?;
        let verdict = Verdict::from_category(category);

        debug!(
            class_id,
            category,
            %verdict,
            elapsed = ?start_time.elapsed(),
            "Classified URL"
        );

        Ok(Prediction {
            verdict,
            category: category.to_string(),
            class_id,
        })
    }
}

impl fmt::Debug for ServingPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state {
            ModelState::Ready(model) => f
                .debug_struct("ServingPipeline")
                .field("model_id", &model.model_id)
                .field("labels", &model.labels)
                .finish_non_exhaustive(),
            ModelState::Degraded { reason } => f
                .debug_struct("ServingPipeline")
                .field("degraded", reason)
                .finish(),
        }
    }
}
