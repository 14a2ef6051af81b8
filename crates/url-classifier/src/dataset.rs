// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Labeled URL datasets
//!
//! Training data is a CSV file with a header row. Only the URL and label
//! columns are read; any other columns are ignored.

use std::{io::Read, path::Path};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::{debug, info};

use crate::error::{ClassifierError, ClassifierResult};

/// One training example
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledUrl {
    /// Raw URL text
    pub url: String,
    /// Category name
    pub label: String,
}

/// Header names of the columns holding URLs and labels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetColumns {
    /// URL column
    pub url: String,
    /// Category column
    pub label: String,
}

impl Default for DatasetColumns {
    fn default() -> Self {
        Self {
            url: "url".to_string(),
            label: "type".to_string(),
        }
    }
}

/// An in-memory labeled dataset
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dataset {
    rows: Vec<LabeledUrl>,
}

impl Dataset {
    /// Build a dataset from rows already in memory
    pub fn new(rows: Vec<LabeledUrl>) -> Self {
        Self { rows }
    }

    /// Read a CSV dataset from a file
    pub async fn from_path<P: AsRef<Path>>(
        path: P,
        columns: &DatasetColumns,
    ) -> ClassifierResult<Self> {
        let path = path.as_ref();
        debug!("Loading dataset from: {}", path.display());

        let content = fs::read(path).await.map_err(|e| {
            ClassifierError::io(format!("Failed to read {}: {e}", path.display()))
        })?;
        let dataset = Self::from_reader(content.as_slice(), columns)?;

        info!(
            rows = dataset.len(),
            "Loaded dataset from {}",
            path.display()
        );
        Ok(dataset)
    }

    /// Read a CSV dataset from any reader
    ///
    /// # Errors
    ///
    /// Returns a schema error if a configured column is missing, and an input
    /// error for an empty dataset or a row with an empty URL or label
    pub fn from_reader<R: Read>(reader: R, columns: &DatasetColumns) -> ClassifierResult<Self> {
        let mut csv = csv::Reader::from_reader(reader);
        let headers = csv.headers()?.clone();

        let column_index = |name: &str| {
            headers.iter().position(|h| h == name).ok_or_else(|| {
                ClassifierError::schema(format!("dataset has no '{name}' column"))
            })
        };
        let url_index = column_index(&columns.url)?;
        let label_index = column_index(&columns.label)?;

        let mut rows = Vec::new();
        for (index, record) in csv.records().enumerate() {
            let record = record?;
            let line = index + 1;
            let url = record.get(url_index).unwrap_or_default();
            let label = record.get(label_index).unwrap_or_default();

            if url.is_empty() {
                return Err(ClassifierError::invalid_input(format!(
                    "data line {line}: empty URL"
                )));
            }
            if label.is_empty() {
                return Err(ClassifierError::invalid_input(format!(
                    "data line {line}: empty label"
                )));
            }

            rows.push(LabeledUrl {
                url: url.to_string(),
                label: label.to_string(),
            });
        }

        if rows.is_empty() {
            return Err(ClassifierError::invalid_input("dataset has no rows"));
        }

        Ok(Self { rows })
    }

    /// All rows in file order
    pub fn rows(&self) -> &[LabeledUrl] {
        &self.rows
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the dataset has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_configured_columns() {
        let csv = "id,url,type,extra\n1,http://a.com,benign,x\n2,http://b.com/x.php,phishing,y\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &DatasetColumns::default())
            .expect("valid dataset");

        assert_eq!(dataset.len(), 2);
        assert_eq!(
            dataset.rows()[1],
            LabeledUrl {
                url: "http://b.com/x.php".to_string(),
                label: "phishing".to_string(),
            }
        );
    }

    #[test]
    fn custom_column_names() {
        let csv = "link,category\nhttp://a.com,safe\n";
        let columns = DatasetColumns {
            url: "link".to_string(),
            label: "category".to_string(),
        };
        let dataset = Dataset::from_reader(csv.as_bytes(), &columns).expect("valid dataset");
        assert_eq!(dataset.rows()[0].label, "safe");
    }

    #[test]
    fn missing_column_is_schema_error() {
        let csv = "url,label\nhttp://a.com,benign\n";
        let err = Dataset::from_reader(csv.as_bytes(), &DatasetColumns::default())
            .expect_err("no type column");
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("'type'"));
    }

    #[test]
    fn empty_fields_name_the_line() {
        let csv = "url,type\nhttp://a.com,benign\n,phishing\n";
        let err = Dataset::from_reader(csv.as_bytes(), &DatasetColumns::default())
            .expect_err("empty url");
        assert!(err.is_input_error());
        assert!(err.to_string().contains("data line 2"));
    }

    #[test]
    fn empty_dataset_is_input_error() {
        let err = Dataset::from_reader("url,type\n".as_bytes(), &DatasetColumns::default())
            .expect_err("no rows");
        assert!(err.is_input_error());
    }

    #[test]
    fn quoted_urls_keep_commas() {
        let csv = "url,type\n\"http://a.com/?q=1,2\",benign\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &DatasetColumns::default())
            .expect("valid dataset");
        assert_eq!(dataset.rows()[0].url, "http://a.com/?q=1,2");
    }

    #[test]
    fn whitespace_url_is_kept_like_serving() {
        let csv = "url,type\n\" \",benign\n";
        let dataset = Dataset::from_reader(csv.as_bytes(), &DatasetColumns::default())
            .expect("whitespace is not empty");
        assert_eq!(dataset.rows()[0].url, " ");
    }
}
