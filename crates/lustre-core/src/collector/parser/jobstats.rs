//! Per-job block files (`job_stats`).
//!
//! Format (YAML-like, one block per job):
//!
//! ```text
//! job_stats:
//! - job_id:          29
//!   snapshot_time:   1493326943
//!   write_bytes:     { samples:         262, unit: bytes, min: 1048576, max: 1048576, sum:       274726912 }
//!   getattr:         { samples:           0, unit:  reqs }
//! ```
//!
//! Parsing is split in two steps so that the blocks of one file are parsed
//! once and then queried by every definition that reads the same file.

use std::collections::HashMap;

use super::{numeric_tokens, numeric_values};
use crate::metric::MetricRecord;

/// Operations reported per job when all operations are requested.
pub const JOB_OPERATIONS: [&str; 22] = [
    "open",
    "close",
    "mknod",
    "link",
    "unlink",
    "mkdir",
    "rmdir",
    "rename",
    "getattr",
    "setattr",
    "getxattr",
    "setxattr",
    "statfs",
    "sync",
    "samedir_rename",
    "crossdir_rename",
    "punch",
    "destroy",
    "create",
    "get_info",
    "set_info",
    "quotactl",
];

/// Parsed content of one job block.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct JobRecord {
    pub id: String,
    /// Field name -> every number found right of the field's colon.
    pub fields: HashMap<String, Vec<f64>>,
}

impl JobRecord {
    /// Sub-value `index` of `field`, if present.
    pub fn value(&self, field: &str, index: usize) -> Option<f64> {
        self.fields.get(field).and_then(|v| v.get(index)).copied()
    }
}

/// What to extract from parsed job blocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobQuery {
    /// Sub-value `index` of one field, e.g. `write_bytes` index 3 (sum).
    Field { field: &'static str, index: usize },
    /// Sample count of every operation in [`JOB_OPERATIONS`].
    Operations,
}

/// Splits a line into its key and the text after the first colon.
///
/// The list marker of the first line of a block (`- job_id:`) is dropped.
fn split_key(line: &str) -> Option<(&str, &str)> {
    let (key, rest) = line.split_once(':')?;
    let key = key.trim();
    let key = key.strip_prefix('-').map(str::trim_start).unwrap_or(key);
    if key.is_empty() {
        return None;
    }
    Some((key, rest))
}

fn job_id(raw: &str) -> String {
    match numeric_tokens(raw).first() {
        Some(token) => (*token).to_string(),
        None => raw.trim().to_string(),
    }
}

fn push_job(jobs: &mut Vec<JobRecord>, job: JobRecord) {
    match jobs.iter_mut().find(|j| j.id == job.id) {
        Some(existing) => *existing = job,
        None => jobs.push(job),
    }
}

/// Parses every job block of a `job_stats` file.
///
/// Lines before the first `job_id` line are ignored. A job id that appears
/// twice keeps its first position but takes the later block's fields.
pub fn parse_job_blocks(content: &str) -> Vec<JobRecord> {
    let mut jobs: Vec<JobRecord> = Vec::new();
    let mut current: Option<JobRecord> = None;

    for line in content.lines() {
        let Some((key, rest)) = split_key(line) else {
            continue;
        };

        if key == "job_id" {
            if let Some(job) = current.take() {
                push_job(&mut jobs, job);
            }
            current = Some(JobRecord {
                id: job_id(rest),
                fields: HashMap::new(),
            });
            continue;
        }

        if let Some(job) = current.as_mut() {
            job.fields.insert(key.to_string(), numeric_values(rest));
        }
    }

    if let Some(job) = current.take() {
        push_job(&mut jobs, job);
    }

    jobs
}

/// Builds records from parsed jobs. Every record carries a `jobid` label.
///
/// Jobs lacking the requested field, or with too few sub-values, are skipped.
pub fn job_records(
    jobs: &[JobRecord],
    query: &JobQuery,
    name: &str,
    help: &str,
) -> Vec<MetricRecord> {
    let mut records = Vec::new();

    for job in jobs {
        match query {
            JobQuery::Field { field, index } => {
                if let Some(value) = job.value(field, *index) {
                    records.push(MetricRecord::new(name, help, value).with_label("jobid", &job.id));
                }
            }
            JobQuery::Operations => {
                for operation in JOB_OPERATIONS {
                    if let Some(value) = job.value(operation, 0) {
                        records.push(
                            MetricRecord::new(name, help, value)
                                .with_label("jobid", &job.id)
                                .with_label("operation", operation),
                        );
                    }
                }
            }
        }
    }

    records
}
