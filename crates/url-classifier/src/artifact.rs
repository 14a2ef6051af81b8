// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Persisted model bundles
//!
//! A [`ModelBundle`] carries everything serving needs to reproduce training's
//! decisions: the fitted forest, the label codec it was trained with and the
//! feature schema it expects. Bundles live as JSON documents in an
//! [`ArtifactStore`] directory, addressed by a validated [`ArtifactName`].

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    classifier::Classifier,
    error::{ClassifierError, ClassifierResult},
    features::{FEATURE_COUNT, FEATURE_NAMES},
    forest::RandomForest,
    labels::LabelCodec,
};

/// Bundle layout version written by this crate
pub const BUNDLE_FORMAT_VERSION: Version = Version::new(1, 0, 0);

/// Artifact name used when none is configured
pub const DEFAULT_ARTIFACT_NAME: &str = "rf_malicious_url";

/// Artifact directory used when none is configured
pub const DEFAULT_ARTIFACT_DIR: &str = "models";

static ARTIFACT_NAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.-]*$").expect("artifact name regex is valid")
});

/// Name of a persisted artifact, safe to use as a file stem
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArtifactName(String);

impl ArtifactName {
    /// Create a new artifact name with validation
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty, contains characters outside
    /// `[A-Za-z0-9_.-]`, starts with a separator or contains `..`
    pub fn new(value: impl Into<String>) -> ClassifierResult<Self> {
        let name = value.into();
        if !ARTIFACT_NAME_REGEX.is_match(&name) || name.contains("..") {
            return Err(ClassifierError::InvalidArtifactName { name });
        }
        Ok(Self(name))
    }

    /// Get the string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ArtifactName {
    fn default() -> Self {
        Self(DEFAULT_ARTIFACT_NAME.to_string())
    }
}

impl fmt::Display for ArtifactName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for ArtifactName {
    type Error = ClassifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ArtifactName> for String {
    fn from(name: ArtifactName) -> Self {
        name.0
    }
}

/// A fitted forest together with the metadata needed to serve it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBundle {
    /// Layout version of this document
    pub format_version: Version,
    /// Unique id of this training run
    pub model_id: Uuid,
    /// When the forest was fitted
    pub trained_at: DateTime<Utc>,
    /// Feature names in the column order the forest was fitted on
    pub feature_names: Vec<String>,
    /// Codec the class ids were encoded with at training time
    pub labels: LabelCodec,
    /// The fitted classifier
    pub forest: RandomForest,
}

impl ModelBundle {
    /// Bundle a freshly fitted forest with its training codec
    ///
    /// # Errors
    ///
    /// Returns an error if the forest and codec disagree on the class count
    /// or the forest was not fitted on the committed feature schema
    pub fn new(labels: LabelCodec, forest: RandomForest) -> ClassifierResult<Self> {
        let bundle = Self {
            format_version: BUNDLE_FORMAT_VERSION,
            model_id: Uuid::new_v4(),
            trained_at: Utc::now(),
            feature_names: FEATURE_NAMES.iter().map(ToString::to_string).collect(),
            labels,
            forest,
        };
        bundle.validate()?;
        Ok(bundle)
    }

    /// Check the bundle can be served by this build
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.format_version.major != BUNDLE_FORMAT_VERSION.major {
            return Err(ClassifierError::config(format!(
                "bundle format {} is incompatible with {}",
                self.format_version, BUNDLE_FORMAT_VERSION
            )));
        }

        if self.feature_names != FEATURE_NAMES {
            return Err(ClassifierError::schema(format!(
                "bundle features [{}] differ from [{}]",
                self.feature_names.join(", "),
                FEATURE_NAMES.join(", ")
            )));
        }

        if self.forest.n_features() != FEATURE_COUNT {
            return Err(ClassifierError::schema(format!(
                "forest expects {} features, schema has {FEATURE_COUNT}",
                self.forest.n_features()
            )));
        }

        self.forest.validate()?;

        if self.labels.len() != self.forest.n_classes() {
            return Err(ClassifierError::config(format!(
                "label codec has {} classes but forest has {}",
                self.labels.len(),
                self.forest.n_classes()
            )));
        }

        Ok(())
    }
}

/// Directory of JSON model bundles
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `dir`
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path of the artifact called `name`
    pub fn path_for(&self, name: &ArtifactName) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Persist `bundle` under `name`, replacing any previous artifact
    ///
    /// The document is written to a temporary sibling and renamed into place,
    /// so readers only ever observe a complete artifact.
    #[instrument(skip(self, bundle), fields(model_id = %bundle.model_id))]
    pub async fn save(&self, name: &ArtifactName, bundle: &ModelBundle) -> ClassifierResult<PathBuf> {
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            ClassifierError::io(format!("Failed to create {}: {e}", self.dir.display()))
        })?;

        let path = self.path_for(name);
        let staging = self
            .dir
            .join(format!(".{name}.json.{}.tmp", Uuid::new_v4().simple()));
        let document = serde_json::to_vec(bundle)?;

        fs::write(&staging, &document).await.map_err(|e| {
            ClassifierError::io(format!("Failed to write {}: {e}", staging.display()))
        })?;
        if let Err(e) = fs::rename(&staging, &path).await {
            let _ = fs::remove_file(&staging).await;
            return Err(ClassifierError::io(format!(
                "Failed to move artifact into {}: {e}",
                path.display()
            )));
        }

        info!(
            path = %path.display(),
            bytes = document.len(),
            "Saved model artifact"
        );
        Ok(path)
    }

    /// Load and validate the artifact called `name`
    #[instrument(skip(self))]
    pub async fn load(&self, name: &ArtifactName) -> ClassifierResult<ModelBundle> {
        let path = self.path_for(name);
        debug!("Loading model artifact from: {}", path.display());

        let content = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ClassifierError::model_unavailable(format!(
                    "artifact '{name}' not found at {}",
                    path.display()
                ))
            } else {
                ClassifierError::io(format!("Failed to read {}: {e}", path.display()))
            }
        })?;

        let bundle: ModelBundle = serde_json::from_slice(&content).map_err(|e| {
            ClassifierError::json(format!("Failed to parse {}: {e}", path.display()))
        })?;
        bundle.validate()?;

        info!(
            model_id = %bundle.model_id,
            trained_at = %bundle.trained_at,
            classes = bundle.labels.len(),
            "Loaded model artifact"
        );
        Ok(bundle)
    }
}
