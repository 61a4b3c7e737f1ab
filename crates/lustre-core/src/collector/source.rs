//! Collection sources: one per kernel tree.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collector::assembler::Assembler;
use crate::collector::cache::PathCache;
use crate::collector::catalog::{MetricDefinition, SourceKind, enabled_definitions};
use crate::collector::error::CollectError;
use crate::collector::traits::FileSystem;
use crate::config::CollectorConfig;
use crate::metric::MetricRecord;

/// A unit of collection the coordinator runs on its own thread.
pub trait Source: Send + Sync {
    /// Name used in logs and in the `collector` label.
    fn name(&self) -> &str;

    /// Performs one full collection.
    fn collect(&self) -> Result<Vec<MetricRecord>, CollectError>;
}

/// A kernel tree (`procfs`, `procsys`, `sysfs`) and the definitions read
/// from it.
pub struct LustreSource<F: FileSystem + 'static> {
    kind: SourceKind,
    base: PathBuf,
    definitions: Vec<MetricDefinition>,
    fs: Arc<F>,
    reader_threads: usize,
}

impl<F: FileSystem + 'static> LustreSource<F> {
    pub fn new(
        kind: SourceKind,
        base: impl Into<PathBuf>,
        definitions: Vec<MetricDefinition>,
        fs: Arc<F>,
        reader_threads: usize,
    ) -> Self {
        Self {
            kind,
            base: base.into(),
            definitions,
            fs,
            reader_threads,
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }
}

impl<F: FileSystem + 'static> Source for LustreSource<F> {
    fn name(&self) -> &str {
        self.kind.as_str()
    }

    fn collect(&self) -> Result<Vec<MetricRecord>, CollectError> {
        let cache = PathCache::new(Arc::clone(&self.fs), self.reader_threads);

        for def in &self.definitions {
            let paths = cache.resolve(&def.pattern(&self.base));
            cache.prefetch(paths.iter().map(PathBuf::as_path));
        }
        cache.wait();
        debug!(
            source = self.name(),
            files = cache.cached_files(),
            "prefetch complete"
        );

        let result = Assembler::new(&cache, &self.base).assemble(&self.definitions);
        cache.release_all();
        result
    }
}

/// Builds one source per kernel tree that has enabled definitions.
///
/// A tree whose base directory is missing is dropped with a warning: the
/// node simply does not run that part of Lustre.
pub fn build_sources<F: FileSystem + 'static>(
    fs: Arc<F>,
    config: &CollectorConfig,
    reader_threads: usize,
) -> Vec<Arc<dyn Source>> {
    let mut grouped: BTreeMap<SourceKind, Vec<MetricDefinition>> = BTreeMap::new();
    for def in enabled_definitions(config) {
        grouped.entry(def.component.source()).or_default().push(def);
    }

    let mut sources: Vec<Arc<dyn Source>> = Vec::new();
    for (kind, definitions) in grouped {
        let base = kind.base_path(config);
        if !fs.exists(&base) {
            warn!(source = kind.as_str(), base = %base.display(), "base path missing, source disabled");
            continue;
        }
        debug!(
            source = kind.as_str(),
            definitions = definitions.len(),
            "source enabled"
        );
        sources.push(Arc::new(LustreSource::new(
            kind,
            base,
            definitions,
            Arc::clone(&fs),
            reader_threads,
        )));
    }
    sources
}
