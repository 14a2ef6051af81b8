// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Category name <-> class id mapping
//!
//! A [`LabelCodec`] is built once and never mutated. The training pipeline
//! derives it from the dataset in first-seen order and persists it inside the
//! model bundle; serving decodes with that persisted codec, so the id a tree
//! votes for always names the category it was trained on.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use shared_types::Verdict;

use crate::error::{ClassifierError, ClassifierResult};

/// Classifier-internal class identifier
pub type ClassId = usize;

/// Categories of the standard malicious URL dataset, in id order
pub const STANDARD_CATEGORIES: [&str; 5] = ["benign", "malware", "defacement", "phishing", "safe"];

/// Bidirectional mapping between category names and class ids
///
/// The id of a category is its position in the label list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct LabelCodec {
    labels: Vec<String>,
}

impl LabelCodec {
    /// Create a codec from an ordered list of distinct category names
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, or contains an empty or
    /// duplicate name
    pub fn new(labels: Vec<String>) -> ClassifierResult<Self> {
        if labels.is_empty() {
            return Err(ClassifierError::config("label set cannot be empty"));
        }

        let mut seen = HashSet::with_capacity(labels.len());
        for label in &labels {
            if label.is_empty() {
                return Err(ClassifierError::config("label names cannot be empty"));
            }
            if !seen.insert(label.as_str()) {
                return Err(ClassifierError::config(format!(
                    "duplicate label '{label}'"
                )));
            }
        }

        Ok(Self { labels })
    }

    /// Enumerate the distinct names of `observed` in first-seen order
    ///
    /// # Errors
    ///
    /// Returns an error if `observed` yields no names or an empty name
    pub fn from_observed<I, S>(observed: I) -> ClassifierResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = HashSet::new();
        let mut labels = Vec::new();
        for name in observed {
            let name = name.as_ref();
            if seen.insert(name.to_string()) {
                labels.push(name.to_string());
            }
        }
        Self::new(labels)
    }

    /// The fixed five-category mapping of the standard dataset
    pub fn standard() -> Self {
        Self {
            labels: STANDARD_CATEGORIES.iter().map(ToString::to_string).collect(),
        }
    }

    /// Class id of `name`
    pub fn encode(&self, name: &str) -> ClassifierResult<ClassId> {
        self.labels
            .iter()
            .position(|label| label == name)
            .ok_or_else(|| ClassifierError::unknown_label(format!("category '{name}'")))
    }

    /// Category name of class `id`
    pub fn decode(&self, id: ClassId) -> ClassifierResult<&str> {
        self.labels
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| {
                ClassifierError::unknown_label(format!(
                    "class id {id} (codec has {} classes)",
                    self.labels.len()
                ))
            })
    }

    /// Verdict for class `id`
    pub fn verdict(&self, id: ClassId) -> ClassifierResult<Verdict> {
        self.decode(id).map(Verdict::from_category)
    }

    /// Number of classes
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Always false for a constructed codec; present for API symmetry
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Category names in id order
    pub fn labels(&self) -> &[String] {
        &self.labels
    }
}

impl TryFrom<Vec<String>> for LabelCodec {
    type Error = ClassifierError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        Self::new(labels)
    }
}

impl From<LabelCodec> for Vec<String> {
    fn from(codec: LabelCodec) -> Self {
        codec.labels
    }
}
