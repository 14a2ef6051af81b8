// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! URL feature extraction
//!
//! Maps a URL string to a fixed nine-field numeric [`FeatureVector`]. The
//! extractor is total: any string, including the empty string or text that is
//! not a URI at all, yields a vector. Training and serving call the same
//! [`extract`] so the two halves can never disagree on a feature.
//!
//! Components are found by syntactic splitting ([`UrlParts::split`]) rather
//! than a validating URL parser. A validating parser would normalise the
//! input (lower-casing hosts, adding a root path, percent-encoding), which
//! changes the character counts the model was trained on.

/// Number of fields in a [`FeatureVector`]
pub const FEATURE_COUNT: usize = 9;

/// Feature names in their committed column order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "url_length",
    "domain_length",
    "path_length",
    "query_length",
    "num_special_chars",
    "has_https",
    "num_subdomains",
    "num_slashes",
    "has_php",
];

const SPECIAL_CHARS: &str = "!@#$%^&*()_+-=[]{}|;:,.<>?/";

// Schemes whose last path segment may carry `;params`
const SCHEMES_WITH_PARAMS: [&str; 16] = [
    "", "ftp", "hdl", "prospero", "http", "imap", "https", "shttp", "rtsp", "rtsps", "rtspu",
    "sip", "sips", "mms", "sftp", "tel",
];

/// Numeric summary of a URL used as classifier input
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FeatureVector {
    /// Character count of the whole URL
    pub url_length: usize,
    /// Character count of the network location
    pub domain_length: usize,
    /// Character count of the path
    pub path_length: usize,
    /// Character count of the query string
    pub query_length: usize,
    /// Count of characters from the special character set
    pub num_special_chars: usize,
    /// Scheme is exactly `https`
    pub has_https: bool,
    /// Dot-separated labels in the network location, minus one
    pub num_subdomains: usize,
    /// Count of `/` in the whole URL
    pub num_slashes: usize,
    /// URL contains `.php`, case-insensitively
    pub has_php: bool,
}

impl FeatureVector {
    /// Extract the feature vector of `url`
    pub fn from_url(url: &str) -> Self {
        extract(url)
    }

    /// Values in [`FEATURE_NAMES`] order, booleans coerced to 0/1
    #[allow(clippy::cast_precision_loss)]
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.url_length as f64,
            self.domain_length as f64,
            self.path_length as f64,
            self.query_length as f64,
            self.num_special_chars as f64,
            f64::from(u8::from(self.has_https)),
            self.num_subdomains as f64,
            self.num_slashes as f64,
            f64::from(u8::from(self.has_php)),
        ]
    }

    /// `(name, value)` pairs in committed order
    pub fn named(&self) -> [(&'static str, f64); FEATURE_COUNT] {
        let values = self.to_array();
        std::array::from_fn(|i| (FEATURE_NAMES[i], values[i]))
    }
}

/// Extract the feature vector of `url`. Never fails.
pub fn extract(url: &str) -> FeatureVector {
    let parts = UrlParts::split(url);
    let domain_length = parts.netloc.chars().count();

    FeatureVector {
        url_length: url.chars().count(),
        domain_length,
        path_length: parts.path.chars().count(),
        query_length: parts.query.chars().count(),
        num_special_chars: url.chars().filter(|c| SPECIAL_CHARS.contains(*c)).count(),
        has_https: parts.scheme == "https",
        num_subdomains: if domain_length == 0 {
            0
        } else {
            parts.netloc.split('.').count() - 1
        },
        num_slashes: url.matches('/').count(),
        has_php: url.to_lowercase().contains(".php"),
    }
}

/// Syntactic components of a URL
///
/// Absent components are empty strings, never errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParts {
    /// Lower-cased scheme, without the trailing `:`
    pub scheme: String,
    /// Network location (userinfo, host and port)
    pub netloc: String,
    /// Path, without `;params` on the last segment
    pub path: String,
    /// Last-segment parameters, without the leading `;`
    pub params: String,
    /// Query string, without the leading `?`
    pub query: String,
    /// Fragment, without the leading `#`
    pub fragment: String,
}

impl UrlParts {
    /// Split `url` into its components
    pub fn split(url: &str) -> Self {
        let cleaned: String = url
            .trim_start_matches(|c: char| c <= ' ')
            .chars()
            .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
            .collect();

        let (scheme, rest) = split_scheme(&cleaned);

        let (netloc, rest) = match rest.strip_prefix("//") {
            Some(after) => {
                let end = after.find(['/', '?', '#']).unwrap_or(after.len());
                after.split_at(end)
            }
            None => ("", rest),
        };

        let (rest, fragment) = rest.split_once('#').unwrap_or((rest, ""));
        let (rest, query) = rest.split_once('?').unwrap_or((rest, ""));

        let (path, params) = if SCHEMES_WITH_PARAMS.contains(&scheme.as_str()) {
            split_params(rest)
        } else {
            (rest, "")
        };

        Self {
            scheme,
            netloc: netloc.to_string(),
            path: path.to_string(),
            params: params.to_string(),
            query: query.to_string(),
            fragment: fragment.to_string(),
        }
    }
}

fn split_scheme(url: &str) -> (String, &str) {
    let Some(colon) = url.find(':') else {
        return (String::new(), url);
    };
    let candidate = &url[..colon];

    let starts_with_letter = candidate
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic());
    let valid = candidate
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

    if starts_with_letter && valid {
        (candidate.to_ascii_lowercase(), &url[colon + 1..])
    } else {
        (String::new(), url)
    }
}

fn split_params(path: &str) -> (&str, &str) {
    let search_from = path.rfind('/').unwrap_or(0);
    match path[search_from..].find(';') {
        Some(offset) => {
            let at = search_from + offset;
            (&path[..at], &path[at + 1..])
        }
        None => (path, ""),
    }
}
