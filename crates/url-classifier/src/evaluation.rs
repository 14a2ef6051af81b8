// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Held-out evaluation of a fitted classifier

use std::fmt;

use crate::{
    error::{ClassifierError, ClassifierResult},
    labels::{ClassId, LabelCodec},
};

/// Precision, recall and F1 of one class
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// Category name
    pub label: String,
    /// Fraction of predictions of this class that were correct
    pub precision: f64,
    /// Fraction of this class's rows that were predicted correctly
    pub recall: f64,
    /// Harmonic mean of precision and recall
    pub f1: f64,
    /// Rows of this class in the evaluation set
    pub support: usize,
}

/// Averages over classes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AverageMetrics {
    /// Averaged precision
    pub precision: f64,
    /// Averaged recall
    pub recall: f64,
    /// Averaged F1
    pub f1: f64,
}

/// Accuracy, per-class metrics and confusion matrix of a prediction run
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationReport {
    /// Fraction of rows predicted correctly
    pub accuracy: f64,
    /// Metrics per class, in class id order
    pub classes: Vec<ClassMetrics>,
    /// Unweighted mean over classes
    pub macro_avg: AverageMetrics,
    /// Mean over classes weighted by support
    pub weighted_avg: AverageMetrics,
    /// `confusion[actual][predicted]` row counts
    pub confusion: Vec<Vec<usize>>,
    /// Rows evaluated
    pub total: usize,
}

impl ClassificationReport {
    /// Compare predictions against ground truth
    ///
    /// Ratios with a zero denominator are reported as 0.
    #[allow(clippy::cast_precision_loss)]
    pub fn evaluate(
        codec: &LabelCodec,
        actual: &[ClassId],
        predicted: &[ClassId],
    ) -> ClassifierResult<Self> {
        if actual.len() != predicted.len() {
            return Err(ClassifierError::data_shape(format!(
                "{} actual labels but {} predictions",
                actual.len(),
                predicted.len()
            )));
        }

        let n_classes = codec.len();
        let mut confusion = vec![vec![0usize; n_classes]; n_classes];
        for (&truth, &guess) in actual.iter().zip(predicted) {
            if truth >= n_classes || guess >= n_classes {
                return Err(ClassifierError::unknown_label(format!(
                    "class id outside 0..{n_classes} in evaluation"
                )));
            }
            confusion[truth][guess] += 1;
        }

        let total = actual.len();
        let correct: usize = (0..n_classes).map(|c| confusion[c][c]).sum();

        let mut classes = Vec::with_capacity(n_classes);
        for (class, label) in codec.labels().iter().enumerate() {
            let true_positive = confusion[class][class];
            let support: usize = confusion[class].iter().sum();
            let predicted_total: usize = confusion.iter().map(|row| row[class]).sum();

            let precision = ratio(true_positive, predicted_total);
            let recall = ratio(true_positive, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            classes.push(ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1,
                support,
            });
        }

        let macro_avg = average(&classes, |_| 1.0);
        let weighted_avg = average(&classes, |m| m.support as f64);

        Ok(Self {
            accuracy: ratio(correct, total),
            classes,
            macro_avg,
            weighted_avg,
            confusion,
            total,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn average(classes: &[ClassMetrics], weight: impl Fn(&ClassMetrics) -> f64) -> AverageMetrics {
    let total_weight: f64 = classes.iter().map(&weight).sum();
    if total_weight <= 0.0 {
        return AverageMetrics {
            precision: 0.0,
            recall: 0.0,
            f1: 0.0,
        };
    }
    let weighted = |value: fn(&ClassMetrics) -> f64| {
        classes.iter().map(|m| weight(m) * value(m)).sum::<f64>() / total_weight
    };
    AverageMetrics {
        precision: weighted(|m| m.precision),
        recall: weighted(|m| m.recall),
        f1: weighted(|m| m.f1),
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.chars().count())
            .chain(std::iter::once("weighted avg".len()))
            .max()
            .unwrap_or_default();

        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, avg.precision, avg.recall, avg.f1, self.total
            )?;
        }

        writeln!(f)?;
        writeln!(f, "confusion matrix (rows: actual, columns: predicted)")?;
        write!(f, "{:>width$}", "")?;
        for m in &self.classes {
            write!(f, " {:>10}", m.label)?;
        }
        writeln!(f)?;
        for (m, row) in self.classes.iter().zip(&self.confusion) {
            write!(f, "{:>width$}", m.label)?;
            for count in row {
                write!(f, " {count:>10}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
