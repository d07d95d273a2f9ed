//! Record types shared by every pipeline stage.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Output columns, in the order they are written to every sink.
pub const FEATURE_COLUMNS: [&str; 9] = [
    "url_length",
    "num_subdomains",
    "has_https",
    "num_hyphens",
    "num_special_chars",
    "has_suspicious_keyword",
    "num_external_links",
    "num_scripts",
    "label",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    Benign,
    Phishing,
}

impl Label {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Benign => 0,
            Self::Phishing => 1,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Benign => "benign",
            Self::Phishing => "phishing",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row as read from the bulk source. NULL columns stay `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub url: Option<String>,
    pub source_markup: Option<String>,
    pub observed_at: Option<DateTime<Utc>>,
}

impl RawRecord {
    pub fn new(
        url: impl Into<String>,
        source_markup: impl Into<String>,
        observed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            url: Some(url.into()),
            source_markup: Some(source_markup.into()),
            observed_at,
        }
    }

    pub fn has_content(&self) -> bool {
        self.url.is_some() && self.source_markup.is_some()
    }

    pub fn url_or_empty(&self) -> &str {
        self.url.as_deref().unwrap_or_default()
    }

    pub fn markup_or_empty(&self) -> &str {
        self.source_markup.as_deref().unwrap_or_default()
    }
}

/// A batch of raw records sharing one label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledBatch {
    pub label: Label,
    pub records: Vec<RawRecord>,
}

impl LabeledBatch {
    pub fn new(label: Label, records: Vec<RawRecord>) -> Self {
        Self { label, records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fixed-schema feature row. Field order is the CSV column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub url_length: u64,
    pub num_subdomains: u64,
    pub has_https: u8,
    pub num_hyphens: u64,
    pub num_special_chars: u64,
    pub has_suspicious_keyword: u8,
    pub num_external_links: u64,
    pub num_scripts: u64,
    pub label: u8,
}
