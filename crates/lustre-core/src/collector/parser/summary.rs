//! Summary-line files (`stats`, `md_stats`).
//!
//! Each line describes one operation:
//!
//! ```text
//! snapshot_time             1495035142.697801 secs.usecs
//! read_bytes                1262 samples [bytes] 1024 1048576 5672395063
//! statfs                    81813 samples [reqs]
//! ```
//!
//! Layout: `<op> <count> samples [<unit>] <min> <max> <sum> [<sumsq>]`.
//! The bracketed unit is missing on some kernels, so the min/max/sum fields
//! are located relative to it rather than by absolute position.

use super::{ParseError, parse_field};
use crate::metric::MetricRecord;

/// Which quantity of a summary line to extract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryField {
    Samples,
    Minimum,
    Maximum,
    Sum,
}

/// What to extract from a summary-line file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryQuery {
    /// One field of the line for `operation`.
    Field {
        operation: &'static str,
        field: SummaryField,
    },
    /// The sample count of every operation line, labelled with `operation`.
    Operations,
}

struct SummaryLine<'a> {
    operation: &'a str,
    count: &'a str,
    /// Fields after the optional unit token: min, max, sum, sumsq.
    stats: Vec<&'a str>,
}

fn split_line(line: &str) -> Option<SummaryLine<'_>> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 3 || fields[2] != "samples" {
        return None;
    }
    let mut rest = &fields[3..];
    if rest.first().is_some_and(|f| f.starts_with('[')) {
        rest = &rest[1..];
    }
    Some(SummaryLine {
        operation: fields[0],
        count: fields[1],
        stats: rest.to_vec(),
    })
}

/// Parses a summary-line file according to `query`.
pub fn parse_summary(
    content: &str,
    query: &SummaryQuery,
    name: &str,
    help: &str,
) -> Result<Vec<MetricRecord>, ParseError> {
    match query {
        SummaryQuery::Field { operation, field } => {
            let Some(line) = content
                .lines()
                .filter_map(split_line)
                .find(|l| l.operation == *operation)
            else {
                return Ok(Vec::new());
            };

            let raw = match field {
                SummaryField::Samples => Some(line.count),
                SummaryField::Minimum => line.stats.first().copied(),
                SummaryField::Maximum => line.stats.get(1).copied(),
                SummaryField::Sum => line.stats.get(2).copied(),
            };
            match raw {
                Some(raw) => Ok(vec![MetricRecord::new(
                    name,
                    help,
                    parse_field(raw, operation)?,
                )]),
                None => Ok(Vec::new()),
            }
        }
        SummaryQuery::Operations => content
            .lines()
            .filter_map(split_line)
            .map(|line| {
                let value = parse_field(line.count, line.operation)?;
                Ok(MetricRecord::new(name, help, value).with_label("operation", line.operation))
            })
            .collect(),
    }
}
