// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! URL verdict types

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Category names that map to a [`Verdict::Safe`] verdict.
///
/// Every other category a classifier can emit is treated as malicious.
pub const BENIGN_CATEGORIES: [&str; 2] = ["benign", "safe"];

/// Final safety decision for a scanned URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    /// The URL's predicted category is benign
    Safe,
    /// The URL's predicted category is any non-benign class
    Malicious,
}

impl Verdict {
    /// Derive a verdict from a decoded category name
    pub fn from_category(category: &str) -> Self {
        if is_malicious(category) {
            Verdict::Malicious
        } else {
            Verdict::Safe
        }
    }

    /// Check if the verdict is malicious
    pub fn is_malicious(self) -> bool {
        matches!(self, Verdict::Malicious)
    }

    /// Wire representation
    pub fn as_str(self) -> &'static str {
        match self {
            Verdict::Safe => "SAFE",
            Verdict::Malicious => "MALICIOUS",
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision rule over category names: anything outside
/// [`BENIGN_CATEGORIES`] is malicious.
pub fn is_malicious(category: &str) -> bool {
    !BENIGN_CATEGORIES.contains(&category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decision_rule() {
        assert!(!is_malicious("benign"));
        assert!(!is_malicious("safe"));
        assert!(is_malicious("phishing"));
        assert!(is_malicious("malware"));
        assert!(is_malicious("defacement"));
    }

    #[test]
    fn decision_rule_is_case_sensitive() {
        assert!(is_malicious("Benign"));
        assert!(is_malicious(""));
    }

    #[test]
    fn verdict_from_category() {
        assert_eq!(Verdict::from_category("benign"), Verdict::Safe);
        assert_eq!(Verdict::from_category("phishing"), Verdict::Malicious);
        assert!(Verdict::Malicious.is_malicious());
        assert!(!Verdict::Safe.is_malicious());
    }

    #[test]
    fn serde_uses_uppercase() {
        let serialized = serde_json::to_string(&Verdict::Safe).expect("serialize verdict");
        assert_eq!(serialized, "\"SAFE\"");

        let deserialized: Verdict =
            serde_json::from_str("\"MALICIOUS\"").expect("deserialize verdict");
        assert_eq!(deserialized, Verdict::Malicious);
        assert_eq!(Verdict::Malicious.to_string(), "MALICIOUS");
    }
}
