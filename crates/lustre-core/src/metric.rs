//! Uniform metric record shape produced by the parsers and the assembler.

use serde::Serialize;

/// Prometheus value type of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Monotonically increasing counter.
    Counter,
    /// Point-in-time value.
    Gauge,
    #[default]
    Untyped,
}

/// One observation: a metric name, its help text, a value and its labels.
///
/// Parsers emit records that only carry their format-specific labels
/// (`operation`, `jobid`, `size`, ...). The assembler prepends the
/// `component` and `target` labels and stamps the value kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub name: String,
    pub help: String,
    pub kind: ValueKind,
    pub value: f64,
    pub labels: Vec<(String, String)>,
}

impl MetricRecord {
    pub fn new(name: impl Into<String>, help: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            kind: ValueKind::Untyped,
            value,
            labels: Vec::new(),
        }
    }

    /// Appends an extra label.
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    /// Returns the value of the label `key`, if present.
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}
