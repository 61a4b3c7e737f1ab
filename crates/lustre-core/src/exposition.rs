//! Prometheus text exposition of round reports.
//!
//! Counter and gauge families go through `prometheus::TextEncoder`, which
//! has no support for untyped families. Those are written here directly in
//! the same text format.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use prometheus::proto::{Counter, Gauge, LabelPair, Metric, MetricFamily, MetricType};
use prometheus::{Encoder, HistogramOpts, HistogramVec, Registry, TextEncoder};
use tracing::debug;

use crate::collector::coordinator::RoundReport;
use crate::metric::{MetricRecord, ValueKind};

/// Prefix prepended to every record name.
pub const NAMESPACE: &str = "lustre";

const SCRAPE_DURATION: &str = "lustre_exporter_scrape_duration_seconds";
const SCRAPE_DURATION_HELP: &str = "lustre_exporter: Duration of a collector scrape.";

/// Round ids remembered to avoid observing a round twice. Far more than
/// the rounds that can be in flight at once.
const OBSERVED_ROUNDS: usize = 64;

/// Records sharing one metric name, duplicates removed.
struct Family<'a> {
    name: &'a str,
    help: &'a str,
    kind: ValueKind,
    records: Vec<&'a MetricRecord>,
}

/// Groups records by name, sorted by name.
///
/// The first record of a name decides its help text and type. Records that
/// repeat an already seen label set are dropped.
fn group(records: &[MetricRecord]) -> Vec<Family<'_>> {
    let mut grouped: BTreeMap<&str, Vec<&MetricRecord>> = BTreeMap::new();
    for record in records {
        grouped.entry(record.name.as_str()).or_default().push(record);
    }

    grouped
        .into_iter()
        .map(|(name, all)| {
            let first = all[0];
            let mut seen: HashSet<&[(String, String)]> = HashSet::new();
            let mut records = Vec::with_capacity(all.len());
            for record in all {
                if !seen.insert(record.labels.as_slice()) {
                    debug!(metric = name, labels = ?record.labels, "duplicate label set dropped");
                    continue;
                }
                records.push(record);
            }
            Family {
                name,
                help: &first.help,
                kind: first.kind,
                records,
            }
        })
        .collect()
}

/// Encodes report records and keeps the collector self-observability
/// histogram.
pub struct Exposition {
    registry: Registry,
    scrape_duration: HistogramVec,
    /// Ids of the most recently observed rounds.
    observed: Mutex<VecDeque<u64>>,
}

impl Exposition {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let scrape_duration = HistogramVec::new(
            HistogramOpts::new(SCRAPE_DURATION, SCRAPE_DURATION_HELP),
            &["collector", "result"],
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        Ok(Self {
            registry,
            scrape_duration,
            observed: Mutex::new(VecDeque::with_capacity(OBSERVED_ROUNDS)),
        })
    }

    /// Feeds per-source durations of `report` into the histogram. A round
    /// served to many callers is observed only once, whatever order rounds
    /// are rendered in.
    pub fn observe(&self, report: &RoundReport) {
        {
            let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
            if observed.contains(&report.id) {
                return;
            }
            if observed.len() == OBSERVED_ROUNDS {
                observed.pop_front();
            }
            observed.push_back(report.id);
        }
        for outcome in &report.outcomes {
            self.scrape_duration
                .with_label_values(&[outcome.source.as_str(), outcome.outcome.as_str()])
                .observe(outcome.duration.as_secs_f64());
        }
    }

    /// Renders `report` plus the self-observability histogram in the
    /// Prometheus text format.
    pub fn render(&self, report: &RoundReport) -> Result<Vec<u8>, prometheus::Error> {
        self.observe(report);

        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        for family in group(&report.records) {
            match family.kind {
                ValueKind::Untyped => write_untyped(&family, &mut buffer)?,
                ValueKind::Counter | ValueKind::Gauge => {
                    encoder.encode(&[to_family(&family)], &mut buffer)?
                }
            }
        }
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Counter and gauge families of `records`, sorted by name. Untyped records
/// are left out.
pub fn families(records: &[MetricRecord]) -> Vec<MetricFamily> {
    group(records)
        .iter()
        .filter(|family| family.kind != ValueKind::Untyped)
        .map(to_family)
        .collect()
}

fn to_family(family: &Family<'_>) -> MetricFamily {
    let metrics: Vec<Metric> = family
        .records
        .iter()
        .map(|record| to_metric(record, family.kind))
        .collect();

    let mut out = MetricFamily::default();
    out.set_name(format!("{NAMESPACE}_{}", family.name));
    out.set_help(family.help.to_string());
    out.set_field_type(match family.kind {
        ValueKind::Counter => MetricType::COUNTER,
        _ => MetricType::GAUGE,
    });
    out.set_metric(metrics.into());
    out
}

fn to_metric(record: &MetricRecord, kind: ValueKind) -> Metric {
    let labels: Vec<LabelPair> = record
        .labels
        .iter()
        .map(|(name, value)| {
            let mut pair = LabelPair::default();
            pair.set_name(name.clone());
            pair.set_value(value.clone());
            pair
        })
        .collect();

    let mut metric = Metric::default();
    metric.set_label(labels.into());
    if kind == ValueKind::Counter {
        let mut counter = Counter::default();
        counter.set_value(record.value);
        metric.set_counter(counter);
    } else {
        let mut gauge = Gauge::default();
        gauge.set_value(record.value);
        metric.set_gauge(gauge);
    }
    metric
}

fn write_untyped(family: &Family<'_>, out: &mut Vec<u8>) -> std::io::Result<()> {
    let name = format!("{NAMESPACE}_{}", family.name);
    writeln!(out, "# HELP {name} {}", escape_help(family.help))?;
    writeln!(out, "# TYPE {name} untyped")?;
    for record in &family.records {
        out.extend_from_slice(name.as_bytes());
        if !record.labels.is_empty() {
            let labels: Vec<String> = record
                .labels
                .iter()
                .map(|(key, value)| format!("{key}=\"{}\"", escape_label(value)))
                .collect();
            write!(out, "{{{}}}", labels.join(","))?;
        }
        writeln!(out, " {}", format_value(record.value))?;
    }
    Ok(())
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::coordinator::{Outcome, SourceOutcome};
    use chrono::Utc;
    use std::time::Duration;

    fn record(name: &str, kind: ValueKind, value: f64, target: &str) -> MetricRecord {
        let mut record = MetricRecord::new(name, format!("{name} help"), value)
            .with_label("component", "ost")
            .with_label("target", target);
        record.kind = kind;
        record
    }

    fn report(id: u64, records: Vec<MetricRecord>) -> RoundReport {
        let now = Utc::now();
        RoundReport {
            id,
            created_at: now,
            started_at: now,
            finished_at: now,
            duration: Duration::from_millis(5),
            outcomes: vec![
                SourceOutcome {
                    source: "procfs".into(),
                    outcome: Outcome::Success,
                    duration: Duration::from_millis(4),
                    error: None,
                    records: records.len(),
                },
                SourceOutcome {
                    source: "sysfs".into(),
                    outcome: Outcome::Error,
                    duration: Duration::from_millis(1),
                    error: Some("denied".into()),
                    records: 0,
                },
            ],
            records,
        }
    }

    fn render(exposition: &Exposition, report: &RoundReport) -> String {
        String::from_utf8(exposition.render(report).unwrap()).unwrap()
    }

    const PROCFS_SUCCESS_COUNT: &str =
        "lustre_exporter_scrape_duration_seconds_count{collector=\"procfs\",result=\"success\"}";

    #[test]
    fn test_families_group_and_dedup() {
        let records = vec![
            record("capacity_kilobytes", ValueKind::Gauge, 10240.0, "lustre-OST0000"),
            record("stats_total", ValueKind::Counter, 3.0, "lustre-OST0000"),
            record("capacity_kilobytes", ValueKind::Gauge, 20480.0, "lustre-OST0001"),
            record("capacity_kilobytes", ValueKind::Gauge, 1.0, "lustre-OST0000"),
            record("health_check", ValueKind::Untyped, 1.0, "lustre"),
        ];

        let families = families(&records);
        assert_eq!(families.len(), 2);
        assert_eq!(families[0].get_name(), "lustre_capacity_kilobytes");
        assert_eq!(families[0].get_field_type(), MetricType::GAUGE);
        assert_eq!(families[0].get_metric().len(), 2);
        assert_eq!(families[0].get_metric()[0].get_gauge().get_value(), 10240.0);
        assert_eq!(families[1].get_name(), "lustre_stats_total");
        assert_eq!(families[1].get_field_type(), MetricType::COUNTER);
    }

    #[test]
    fn test_render_text() {
        let exposition = Exposition::new().unwrap();
        let records = vec![
            record("capacity_kilobytes", ValueKind::Gauge, 10240.0, "lustre-OST0000"),
            record("stats_total", ValueKind::Counter, 3.0, "lustre-OST0000"),
        ];
        let text = render(&exposition, &report(1, records));

        assert!(text.contains("# HELP lustre_capacity_kilobytes capacity_kilobytes help"));
        assert!(text.contains("# TYPE lustre_capacity_kilobytes gauge"));
        assert!(text.contains(
            "lustre_capacity_kilobytes{component=\"ost\",target=\"lustre-OST0000\"} 10240"
        ));
        assert!(text.contains("# TYPE lustre_stats_total counter"));
        assert!(text.contains(&format!("{PROCFS_SUCCESS_COUNT} 1")));
        assert!(text.contains(
            "lustre_exporter_scrape_duration_seconds_count{collector=\"sysfs\",result=\"error\"} 1"
        ));
    }

    #[test]
    fn test_render_untyped() {
        let exposition = Exposition::new().unwrap();
        let mut quoted = record("health_check", ValueKind::Untyped, 0.0, "odd\"name");
        quoted.help = "Current health\nstatus.".to_string();
        let records = vec![
            record("health_check", ValueKind::Untyped, 1.0, "lustre"),
            quoted,
            record("health_check", ValueKind::Untyped, 5.0, "lustre"),
            MetricRecord::new("unlabelled", "h", f64::NAN),
        ];
        let text = render(&exposition, &report(1, records));

        assert!(text.contains("# HELP lustre_health_check health_check help\n"));
        assert!(text.contains("# TYPE lustre_health_check untyped\n"));
        assert!(text.contains("lustre_health_check{component=\"ost\",target=\"lustre\"} 1\n"));
        assert!(text.contains("lustre_health_check{component=\"ost\",target=\"odd\\\"name\"} 0\n"));
        assert!(!text.contains("} 5\n"));
        assert!(text.contains("# TYPE lustre_unlabelled untyped\nlustre_unlabelled NaN\n"));
    }

    #[test]
    fn test_help_and_value_escaping() {
        assert_eq!(escape_help("a\\b\nc"), "a\\\\b\\nc");
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
        assert_eq!(format_value(2.5), "2.5");
        assert_eq!(format_value(f64::INFINITY), "+Inf");
        assert_eq!(format_value(f64::NEG_INFINITY), "-Inf");
    }

    #[test]
    fn test_round_observed_once() {
        let exposition = Exposition::new().unwrap();
        let shared = report(7, Vec::new());
        for _ in 0..3 {
            exposition.render(&shared).unwrap();
        }
        let text = render(&exposition, &report(8, Vec::new()));
        assert!(text.contains(&format!("{PROCFS_SUCCESS_COUNT} 2")));
    }

    #[test]
    fn test_rounds_rendered_out_of_order_are_observed() {
        let exposition = Exposition::new().unwrap();
        exposition.render(&report(5, Vec::new())).unwrap();
        let text = render(&exposition, &report(4, Vec::new()));
        assert!(text.contains(&format!("{PROCFS_SUCCESS_COUNT} 2")));

        let text = render(&exposition, &report(5, Vec::new()));
        assert!(text.contains(&format!("{PROCFS_SUCCESS_COUNT} 2")));
    }

    #[test]
    fn test_empty_report_renders() {
        let exposition = Exposition::new().unwrap();
        let mut empty = report(1, Vec::new());
        empty.outcomes.clear();
        let text = render(&exposition, &empty);
        assert!(!text.contains("lustre_capacity"));
    }
}
