//! URL and markup feature transform.
//!
//! Every function here is pure. Malformed URLs never fail a batch: a network location that
//! cannot be parsed counts as zero subdomains.

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;
use tracing::warn;

use crate::record::{FeatureRecord, Label, LabeledBatch, RawRecord};

pub const SUSPICIOUS_KEYWORDS: [&str; 6] =
    ["login", "secure", "account", "verify", "update", "password"];

const SPECIAL_CHARS: [char; 4] = ['@', '%', '#', '$'];
const HTTPS_PREFIX: &str = "https";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetlocError {
    #[error("unbalanced IPv6 brackets in network location: {0}")]
    InvalidIpv6(String),
}

/// Features of one batch plus the number of rows whose subdomain count had to be clamped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFeatures {
    pub records: Vec<FeatureRecord>,
    pub clamped_subdomains: usize,
}

fn external_link_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"href=["']http"#).expect("valid external link pattern"))
}

fn script_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<script(?:\s[^>]*)?>").expect("valid script tag pattern"))
}

/// Returns the `netloc` part of a URL, or an empty string when the URL has no authority.
///
/// Follows the usual split rules: an optional `scheme:` prefix, then an authority only when
/// the remainder starts with `//`, ending at the first `/`, `?` or `#`.
pub fn network_location(url: &str) -> Result<String, NetlocError> {
    let cleaned: String = url
        .trim_start_matches(|c: char| c <= ' ')
        .chars()
        .filter(|c| !matches!(c, '\t' | '\r' | '\n'))
        .collect();
    let rest = match cleaned.find(':') {
        Some(idx) if idx > 0 && is_scheme(&cleaned[..idx]) => &cleaned[idx + 1..],
        _ => cleaned.as_str(),
    };

    let Some(after_slashes) = rest.strip_prefix("//") else {
        return Ok(String::new());
    };
    let end = after_slashes
        .find(&['/', '?', '#'][..])
        .unwrap_or(after_slashes.len());
    let netloc = &after_slashes[..end];

    if netloc.contains('[') != netloc.contains(']') {
        return Err(NetlocError::InvalidIpv6(netloc.to_string()));
    }
    Ok(netloc.to_string())
}

fn is_scheme(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Dot-separated label count minus two. Negative for bare hostnames such as `localhost`.
fn signed_subdomain_count(url: &str) -> i64 {
    match network_location(url) {
        Ok(netloc) if !netloc.is_empty() => netloc.split('.').count() as i64 - 2,
        _ => 0,
    }
}

pub fn has_https(url: &str) -> u8 {
    u8::from(url.starts_with(HTTPS_PREFIX))
}

pub fn count_special_chars(url: &str) -> u64 {
    url.chars().filter(|c| SPECIAL_CHARS.contains(c)).count() as u64
}

pub fn has_suspicious_keyword(url: &str) -> u8 {
    let lowered = url.to_lowercase();
    u8::from(
        SUSPICIOUS_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword)),
    )
}

pub fn count_external_links(markup: &str) -> u64 {
    external_link_pattern().find_iter(markup).count() as u64
}

pub fn count_scripts(markup: &str) -> u64 {
    script_pattern().find_iter(markup).count() as u64
}

fn build_record(record: &RawRecord, label: Label, num_subdomains: u64) -> FeatureRecord {
    let url = record.url_or_empty();
    let markup = record.markup_or_empty();

    FeatureRecord {
        url_length: url.chars().count() as u64,
        num_subdomains,
        has_https: has_https(url),
        num_hyphens: url.matches('-').count() as u64,
        num_special_chars: count_special_chars(url),
        has_suspicious_keyword: has_suspicious_keyword(url),
        num_external_links: count_external_links(markup),
        num_scripts: count_scripts(markup),
        label: label.as_u8(),
    }
}

/// Maps one raw record to its feature row.
pub fn transform(record: &RawRecord, label: Label) -> FeatureRecord {
    let subdomains = signed_subdomain_count(record.url_or_empty()).max(0) as u64;
    build_record(record, label, subdomains)
}

/// Transforms a whole batch, stamping the batch label onto every row.
pub fn extract_batch(batch: &LabeledBatch) -> BatchFeatures {
    let mut clamped_subdomains = 0usize;
    let records = batch
        .records
        .iter()
        .map(|record| {
            let signed = signed_subdomain_count(record.url_or_empty());
            if signed < 0 {
                clamped_subdomains += 1;
            }
            build_record(record, batch.label, signed.max(0) as u64)
        })
        .collect();

    if clamped_subdomains > 0 {
        warn!(
            component = "features",
            event = "features.negative_subdomains_clamped",
            label = %batch.label,
            clamped_rows = clamped_subdomains,
            batch_rows = batch.len()
        );
    }

    BatchFeatures {
        records,
        clamped_subdomains,
    }
}
