// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! The trained-model seam between the pipelines and the learning algorithm

use crate::{error::ClassifierResult, features::FeatureVector, labels::ClassId};

/// A fitted multi-class model over [`FeatureVector`]s
///
/// Implementations are immutable after fitting and deterministic at
/// inference, so one instance can be shared by concurrent requests.
#[cfg_attr(test, mockall::automock)]
pub trait Classifier: Send + Sync {
    /// Number of classes the model can emit
    fn n_classes(&self) -> usize;

    /// Predict the class id of a feature vector
    ///
    /// # Errors
    ///
    /// Returns a schema error if the vector's width differs from the width
    /// the model was trained on
    fn predict(&self, features: &FeatureVector) -> ClassifierResult<ClassId>;
}
