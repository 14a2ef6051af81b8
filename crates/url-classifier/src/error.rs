// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Error types for URL classification operations
//!
//! This module provides the error taxonomy shared by training and serving:
//! input errors, configuration errors, schema errors and internal errors.
//! Feature extraction and the verdict rule never produce errors; everything
//! here surfaces at a pipeline boundary.

use thiserror::Error;

/// Result type alias for URL classification operations
pub type ClassifierResult<T> = Result<T, ClassifierError>;

/// Error types for URL classification operations
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// Missing or malformed caller input (empty URL, bad training row)
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Configuration file or parameter is invalid
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// The classifier artifact is missing or failed to load
    #[error("Model unavailable: {reason}")]
    ModelUnavailable { reason: String },

    /// Feature schema does not match the one the model was trained with
    #[error("Schema mismatch: {message}")]
    SchemaMismatch { message: String },

    /// Training data has an unusable shape
    #[error("Data shape error: {message}")]
    DataShape { message: String },

    /// Class id or category name unknown to the label codec
    #[error("Unknown label: {message}")]
    UnknownLabel { message: String },

    /// Artifact name failed validation
    #[error("Invalid artifact name: {name}")]
    InvalidArtifactName { name: String },

    /// JSON serialization/deserialization error
    #[error("JSON error: {message}")]
    Json { message: String },

    /// YAML parsing error
    #[error("YAML error: {message}")]
    Yaml { message: String },

    /// CSV parsing error
    #[error("CSV error: {message}")]
    Csv { message: String },

    /// I/O error (file operations)
    #[error("I/O error: {message}")]
    Io { message: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ClassifierError {
    /// Create an invalid input error
    pub fn invalid_input<T: ToString>(message: T) -> Self {
        Self::InvalidInput {
            message: message.to_string(),
        }
    }

    /// Create a configuration error
    pub fn config<T: ToString>(message: T) -> Self {
        Self::Configuration {
            message: message.to_string(),
        }
    }

    /// Create a model unavailable error
    pub fn model_unavailable<T: ToString>(reason: T) -> Self {
        Self::ModelUnavailable {
            reason: reason.to_string(),
        }
    }

    /// Create a schema mismatch error
    pub fn schema<T: ToString>(message: T) -> Self {
        Self::SchemaMismatch {
            message: message.to_string(),
        }
    }

    /// Create a data shape error
    pub fn data_shape<T: ToString>(message: T) -> Self {
        Self::DataShape {
            message: message.to_string(),
        }
    }

    /// Create an unknown label error
    pub fn unknown_label<T: ToString>(message: T) -> Self {
        Self::UnknownLabel {
            message: message.to_string(),
        }
    }

    /// Create a JSON error
    pub fn json<T: ToString>(message: T) -> Self {
        Self::Json {
            message: message.to_string(),
        }
    }

    /// Create a YAML error
    pub fn yaml<T: ToString>(message: T) -> Self {
        Self::Yaml {
            message: message.to_string(),
        }
    }

    /// Create a CSV error
    pub fn csv<T: ToString>(message: T) -> Self {
        Self::Csv {
            message: message.to_string(),
        }
    }

    /// Create an I/O error
    pub fn io<T: ToString>(message: T) -> Self {
        Self::Io {
            message: message.to_string(),
        }
    }

    /// Create an internal error
    pub fn internal<T: ToString>(message: T) -> Self {
        Self::Internal {
            message: message.to_string(),
        }
    }

    /// Check if this error was caused by the caller's input
    pub fn is_input_error(&self) -> bool {
        matches!(self, ClassifierError::InvalidInput { .. })
    }

    /// Check if this error indicates a configuration problem
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClassifierError::Configuration { .. }
                | ClassifierError::ModelUnavailable { .. }
                | ClassifierError::InvalidArtifactName { .. }
        )
    }

    /// Check if this error indicates a feature schema mismatch
    pub fn is_schema_error(&self) -> bool {
        matches!(self, ClassifierError::SchemaMismatch { .. })
    }
}

/// Convert from JSON errors
impl From<serde_json::Error> for ClassifierError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json {
            message: err.to_string(),
        }
    }
}

/// Convert from YAML errors
impl From<serde_yaml::Error> for ClassifierError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml {
            message: err.to_string(),
        }
    }
}

/// Convert from CSV errors
impl From<csv::Error> for ClassifierError {
    fn from(err: csv::Error) -> Self {
        Self::Csv {
            message: err.to_string(),
        }
    }
}

/// Convert from I/O errors
impl From<std::io::Error> for ClassifierError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_constructors() {
        let input_err = ClassifierError::invalid_input("no URL provided");
        assert!(matches!(input_err, ClassifierError::InvalidInput { .. }));

        let unavailable = ClassifierError::model_unavailable("file not found");
        assert!(matches!(
            unavailable,
            ClassifierError::ModelUnavailable { .. }
        ));

        let schema_err = ClassifierError::schema("expected 9 features, got 8");
        assert!(matches!(schema_err, ClassifierError::SchemaMismatch { .. }));
    }

    #[test]
    fn error_classification() {
        let input_err = ClassifierError::invalid_input("empty url");
        assert!(input_err.is_input_error());
        assert!(!input_err.is_config_error());

        let unavailable = ClassifierError::model_unavailable("missing");
        assert!(unavailable.is_config_error());
        assert!(!unavailable.is_input_error());

        let schema_err = ClassifierError::schema("wrong order");
        assert!(schema_err.is_schema_error());
        assert!(!schema_err.is_config_error());

        let internal = ClassifierError::internal("boom");
        assert!(!internal.is_input_error());
        assert!(!internal.is_config_error());
        assert!(!internal.is_schema_error());
    }

    #[test]
    fn error_display() {
        let error = ClassifierError::data_shape("3 rows but 2 labels");
        let display = error.to_string();
        assert!(display.contains("Data shape error"));
        assert!(display.contains("3 rows but 2 labels"));
    }

    #[test]
    fn io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error = ClassifierError::from(io);
        assert!(matches!(error, ClassifierError::Io { .. }));
        assert!(error.to_string().contains("gone"));
    }
}
