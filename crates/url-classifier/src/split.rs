// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Stratified train/test partitioning

use std::collections::BTreeMap;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    error::{ClassifierError, ClassifierResult},
    labels::ClassId,
};

/// Row indices of each partition, in original row order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    /// Rows to fit on
    pub train: Vec<usize>,
    /// Rows to evaluate on
    pub test: Vec<usize>,
}

/// Split row indices so every class keeps its proportion in both partitions
///
/// Each class sends `round(n_c * test_fraction)` randomly chosen rows to the
/// test partition, clamped so that a class with at least two rows appears in
/// both partitions. A class with a single row stays in training.
///
/// # Errors
///
/// Returns a configuration error unless `0 < test_fraction < 1`, and a data
/// shape error for an empty label list
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn stratified_split(
    labels: &[ClassId],
    test_fraction: f64,
    seed: u64,
) -> ClassifierResult<SplitIndices> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ClassifierError::config(format!(
            "test_fraction must be between 0 and 1, got {test_fraction}"
        )));
    }
    if labels.is_empty() {
        return Err(ClassifierError::data_shape("cannot split an empty dataset"));
    }

    let mut by_class: BTreeMap<ClassId, Vec<usize>> = BTreeMap::new();
    for (row, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(row);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut in_test = vec![false; labels.len()];
    for rows in by_class.values_mut() {
        let n = rows.len();
        if n < 2 {
            continue;
        }
        let n_test = ((n as f64 * test_fraction).round() as usize).clamp(1, n - 1);
        rows.shuffle(&mut rng);
        for &row in &rows[..n_test] {
            in_test[row] = true;
        }
    }

    let (test, train): (Vec<usize>, Vec<usize>) =
        (0..labels.len()).partition(|&row| in_test[row]);
    Ok(SplitIndices { train, test })
}
