//! Turns catalog definitions plus cached file contents into labelled records.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collector::cache::PathCache;
use crate::collector::catalog::{FormatKind, MetricDefinition};
use crate::collector::error::CollectError;
use crate::collector::parser::{
    JobRecord, ParseError, job_records, parse_health, parse_histogram, parse_job_blocks,
    parse_numeric_list, parse_scalar, parse_summary,
};
use crate::collector::traits::FileSystem;
use crate::metric::MetricRecord;

/// Extracts the entity (target) name from a resolved path.
///
/// The entity is the directory holding the file, skipping `depth` extra
/// levels for files such as `pool/granted`. Lock namespace decorations
/// (`filter-` prefix, `_UUID` suffix) are stripped.
pub fn entity_name(path: &Path, depth: usize) -> Result<String, CollectError> {
    let text = path.to_string_lossy();
    let elements: Vec<&str> = text.split('/').collect();
    let index = elements
        .len()
        .checked_sub(2 + depth)
        .ok_or_else(|| CollectError::Path(text.to_string()))?;

    let name = elements[index];
    let name = name.strip_prefix("filter-").unwrap_or(name);
    let name = name.strip_suffix("_UUID").unwrap_or(name);
    Ok(name.to_string())
}

/// Directory kind of a multi-valued path, e.g. `osc` in
/// `osc/lustre-OST0000-osc-ffff8803/rpc_stats`.
fn type_label(path: &Path) -> Option<String> {
    let text = path.to_string_lossy();
    let elements: Vec<&str> = text.split('/').collect();
    elements
        .len()
        .checked_sub(3)
        .map(|i| elements[i].to_string())
}

/// Builds records for one source collection.
///
/// Parsed `job_stats` files are kept per path, so the nine job definitions
/// reading the same file parse it once.
pub struct Assembler<'a, F: FileSystem + 'static> {
    cache: &'a PathCache<F>,
    base: &'a Path,
    jobs: HashMap<PathBuf, Arc<[JobRecord]>>,
}

impl<'a, F: FileSystem + 'static> Assembler<'a, F> {
    pub fn new(cache: &'a PathCache<F>, base: &'a Path) -> Self {
        Self {
            cache,
            base,
            jobs: HashMap::new(),
        }
    }

    /// Assembles every definition.
    ///
    /// Missing files and malformed content only drop the affected records;
    /// any other I/O error aborts the source.
    pub fn assemble(
        &mut self,
        definitions: &[MetricDefinition],
    ) -> Result<Vec<MetricRecord>, CollectError> {
        let mut records = Vec::new();
        for def in definitions {
            let paths = self.cache.resolve(&def.pattern(self.base));
            for path in paths.iter() {
                match self.collect_path(def, path) {
                    Ok(mut found) => records.append(&mut found),
                    Err(CollectError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                        debug!(path = %path.display(), "file vanished, skipping");
                    }
                    Err(CollectError::Io(e)) => return Err(CollectError::Io(e)),
                    Err(e) => {
                        warn!(metric = def.name, path = %path.display(), error = %e, "skipping malformed data");
                    }
                }
            }
        }
        Ok(records)
    }

    fn collect_path(
        &mut self,
        def: &MetricDefinition,
        path: &Path,
    ) -> Result<Vec<MetricRecord>, CollectError> {
        let target = entity_name(path, def.depth())?;
        let content = self.cache.read(path)?;

        let records = self.parse(def, path, &content)?;
        let kind_label = if def.multiple_values {
            type_label(path)
        } else {
            None
        };

        Ok(records
            .into_iter()
            .map(|record| {
                let mut labels = Vec::with_capacity(record.labels.len() + 3);
                labels.push(("component".to_string(), def.component.label().to_string()));
                labels.push(("target".to_string(), target.clone()));
                labels.extend(record.labels);
                if let Some(kind) = &kind_label {
                    labels.push(("type".to_string(), kind.clone()));
                }
                MetricRecord {
                    kind: def.kind,
                    labels,
                    ..record
                }
            })
            .collect())
    }

    fn parse(
        &mut self,
        def: &MetricDefinition,
        path: &Path,
        content: &str,
    ) -> Result<Vec<MetricRecord>, ParseError> {
        match &def.format {
            FormatKind::Scalar => parse_scalar(content, def.name, def.help),
            FormatKind::Health => Ok(parse_health(content, def.name, def.help)),
            FormatKind::Summary(query) => parse_summary(content, query, def.name, def.help),
            FormatKind::JobStats(query) => {
                let jobs = self
                    .jobs
                    .entry(path.to_path_buf())
                    .or_insert_with(|| parse_job_blocks(content).into());
                Ok(job_records(jobs, query, def.name, def.help))
            }
            FormatKind::Histogram(section) => parse_histogram(content, section, def.name, def.help),
            FormatKind::NumericList { index } => {
                Ok(parse_numeric_list(content, *index, def.name, def.help))
            }
        }
    }
}
