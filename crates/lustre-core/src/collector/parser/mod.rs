//! Parsers for Lustre pseudo-files.
//!
//! These are pure functions that turn the content of one file into a list of
//! [`MetricRecord`](crate::metric::MetricRecord)s. They never touch the
//! filesystem and are designed to be easily testable with string inputs.
//!
//! A file that lacks the expected pattern yields an empty list, not an error:
//! which fields are present varies between Lustre and kernel versions. Only
//! content that should be numeric but is not produces a [`ParseError`].

mod histogram;
mod jobstats;
mod list;
mod scalar;
mod summary;

pub use histogram::{HistogramSection, bucket_to_bytes, parse_histogram};
pub use jobstats::{JOB_OPERATIONS, JobQuery, JobRecord, job_records, parse_job_blocks};
pub use list::parse_numeric_list;
pub use scalar::{parse_health, parse_scalar};
pub use summary::{SummaryField, SummaryQuery, parse_summary};

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Returns every numeric token of `text`, left to right.
///
/// A token is the leftmost match of either a decimal fraction
/// (`[0-9]*\.[0-9]+`) or, failing that, an integer (`[0-9]+`). All parsers
/// share this rule so that tokenization never differs between formats.
pub fn numeric_tokens(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        let start = i;
        let mut j = i;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        let int_end = j;

        // Fraction alternative wins when a dot followed by a digit comes next.
        if j + 1 < bytes.len() && bytes[j] == b'.' && bytes[j + 1].is_ascii_digit() {
            j += 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            tokens.push(&text[start..j]);
            i = j;
        } else if int_end > start {
            tokens.push(&text[start..int_end]);
            i = int_end;
        } else {
            i += 1;
        }
    }

    tokens
}

/// Parses every numeric token of `text` as `f64`.
pub fn numeric_values(text: &str) -> Vec<f64> {
    numeric_tokens(text)
        .into_iter()
        .filter_map(|t| t.parse().ok())
        .collect()
}

/// Parses one whitespace-separated field, reporting which field was malformed.
pub(crate) fn parse_field(raw: &str, what: &str) -> Result<f64, ParseError> {
    raw.trim()
        .parse()
        .map_err(|_| ParseError::new(format!("invalid {}: {:?}", what, raw)))
}
