//! Whitespace-delimited counter files with a fixed column layout.
//!
//! `lnet/stats` is the main user:
//!
//! ```text
//! 0 16 0 1911487 1898918 0 0 498100008 543996712 0 0
//! ```

use super::numeric_values;
use crate::metric::MetricRecord;

/// Returns the number at position `index` of `content`.
///
/// A file with fewer numbers yields no record.
pub fn parse_numeric_list(content: &str, index: usize, name: &str, help: &str) -> Vec<MetricRecord> {
    numeric_values(content)
        .get(index)
        .map(|&value| vec![MetricRecord::new(name, help, value)])
        .unwrap_or_default()
}
