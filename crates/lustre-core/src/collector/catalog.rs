//! Declarative catalog of Lustre metrics.
//!
//! Every entry maps one pseudo-file (relative to a source base directory) to
//! an exposed metric name. The file format is fixed here, when the entry is
//! registered, so the assembler never has to guess from file names.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::collector::parser::{HistogramSection, JobQuery, SummaryField, SummaryQuery};
use crate::config::{CollectorConfig, ConfigError, DetailLevel};
use crate::metric::ValueKind;

/// Lustre role a metric belongs to; exported as the `component` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Component {
    Ost,
    Mdt,
    Mgs,
    Mds,
    Client,
    Generic,
    Lnet,
    Health,
}

impl Component {
    pub const ALL: [Component; 8] = [
        Component::Ost,
        Component::Mdt,
        Component::Mgs,
        Component::Mds,
        Component::Client,
        Component::Generic,
        Component::Lnet,
        Component::Health,
    ];

    /// Name used on the command line.
    pub fn as_str(self) -> &'static str {
        match self {
            Component::Ost => "ost",
            Component::Mdt => "mdt",
            Component::Mgs => "mgs",
            Component::Mds => "mds",
            Component::Client => "client",
            Component::Generic => "generic",
            Component::Lnet => "lnet",
            Component::Health => "health",
        }
    }

    /// Value of the `component` label.
    pub fn label(self) -> &'static str {
        match self {
            Component::Ost => "OST",
            Component::Mdt => "MDT",
            Component::Mgs => "MGS",
            Component::Mds => "MDS",
            other => other.as_str(),
        }
    }

    pub fn source(self) -> SourceKind {
        match self {
            Component::Lnet => SourceKind::Procsys,
            Component::Health => SourceKind::Sysfs,
            _ => SourceKind::Procfs,
        }
    }
}

impl FromStr for Component {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        Component::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .ok_or_else(|| ConfigError::UnknownComponent(s.to_string()))
    }
}

/// Kernel tree a group of definitions is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// `<proc>/fs/lustre`
    Procfs,
    /// `<proc>/sys/lnet`
    Procsys,
    /// `<sys>/fs/lustre`
    Sysfs,
}

impl SourceKind {
    pub const ALL: [SourceKind; 3] = [SourceKind::Procfs, SourceKind::Procsys, SourceKind::Sysfs];

    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Procfs => "procfs",
            SourceKind::Procsys => "procsys",
            SourceKind::Sysfs => "sysfs",
        }
    }

    /// Base directory of this source under the configured roots.
    pub fn base_path(self, config: &CollectorConfig) -> PathBuf {
        match self {
            SourceKind::Procfs => config.proc_path.join("fs/lustre"),
            SourceKind::Procsys => config.proc_path.join("sys/lnet"),
            SourceKind::Sysfs => config.sys_path.join("fs/lustre"),
        }
    }
}

/// On-disk format of a definition's file and what to extract from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatKind {
    Scalar,
    Health,
    Summary(SummaryQuery),
    JobStats(JobQuery),
    Histogram(HistogramSection),
    NumericList { index: usize },
}

/// One catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    /// File name; may contain `/` (e.g. `pool/granted`).
    pub file: &'static str,
    pub component: Component,
    /// Glob of the directories holding `file`, relative to the source base.
    pub path: &'static str,
    pub name: &'static str,
    pub help: &'static str,
    pub kind: ValueKind,
    pub format: FormatKind,
    /// Adds a `type` label naming the directory kind (`osc`, `mdc`).
    pub multiple_values: bool,
    pub level: DetailLevel,
}

impl MetricDefinition {
    /// Core gauge; scalar, or health for `health_check`.
    fn new(
        component: Component,
        path: &'static str,
        file: &'static str,
        name: &'static str,
        help: &'static str,
    ) -> Self {
        let format = if file == "health_check" {
            FormatKind::Health
        } else {
            FormatKind::Scalar
        };
        Self {
            file,
            component,
            path,
            name,
            help,
            kind: ValueKind::Gauge,
            format,
            multiple_values: false,
            level: DetailLevel::Core,
        }
    }

    fn counter(mut self) -> Self {
        self.kind = ValueKind::Counter;
        self
    }

    fn extended(mut self) -> Self {
        self.level = DetailLevel::Extended;
        self
    }

    fn multiple(mut self) -> Self {
        self.multiple_values = true;
        self
    }

    fn summary(mut self, query: SummaryQuery) -> Self {
        self.format = FormatKind::Summary(query);
        self
    }

    fn jobs(mut self, query: JobQuery) -> Self {
        self.format = FormatKind::JobStats(query);
        self
    }

    fn histogram(mut self, title: &'static str) -> Self {
        self.format = FormatKind::Histogram(HistogramSection::new(title));
        self
    }

    fn list(mut self, index: usize) -> Self {
        self.format = FormatKind::NumericList { index };
        self
    }

    /// Number of directory levels inside `file`.
    pub fn depth(&self) -> usize {
        self.file.matches('/').count()
    }

    /// Full glob pattern under `base`.
    pub fn pattern(&self, base: &Path) -> PathBuf {
        let mut pattern = base.to_path_buf();
        if !self.path.is_empty() {
            pattern.push(self.path);
        }
        pattern.push(self.file);
        pattern
    }
}

const READ_SAMPLES_HELP: &str = "Total number of reads that have been recorded.";
const READ_MINIMUM_HELP: &str = "The minimum read size in bytes.";
const READ_MAXIMUM_HELP: &str = "The maximum read size in bytes.";
const READ_TOTAL_HELP: &str = "The total number of bytes that have been read.";
const WRITE_SAMPLES_HELP: &str = "Total number of writes that have been recorded.";
const WRITE_MINIMUM_HELP: &str = "The minimum write size in bytes.";
const WRITE_MAXIMUM_HELP: &str = "The maximum write size in bytes.";
const WRITE_TOTAL_HELP: &str = "The total number of bytes that have been written.";
const STATS_HELP: &str = "Number of operations the filesystem has performed.";

const JOB_READ_SAMPLES_HELP: &str = "Total number of reads that have been recorded for the given job.";
const JOB_READ_MINIMUM_HELP: &str = "The minimum read size in bytes for the given job.";
const JOB_READ_MAXIMUM_HELP: &str = "The maximum read size in bytes for the given job.";
const JOB_READ_TOTAL_HELP: &str = "The total number of bytes that have been read for the given job.";
const JOB_WRITE_SAMPLES_HELP: &str = "Total number of writes that have been recorded for the given job.";
const JOB_WRITE_MINIMUM_HELP: &str = "The minimum write size in bytes for the given job.";
const JOB_WRITE_MAXIMUM_HELP: &str = "The maximum write size in bytes for the given job.";
const JOB_WRITE_TOTAL_HELP: &str = "The total number of bytes that have been written for the given job.";
const JOB_STATS_HELP: &str = "Number of operations the filesystem has performed for the given job.";

const PAGES_PER_BULK_HELP: &str = "Total number of pages per block RPC.";
const DISCONTIGUOUS_PAGES_HELP: &str = "Total number of logical discontinuities per RPC.";
const IOS_IN_FLIGHT_HELP: &str = "Current number of I/O operations that are processing during the snapshot.";
const IO_TIME_HELP: &str = "Total time in milliseconds the filesystem has spent processing various object sizes.";
const DISK_IO_SIZE_HELP: &str = "Total number of operations the filesystem has performed for the given size.";
const PAGES_PER_RPC_HELP: &str = "Total number of pages per RPC.";
const RPCS_IN_FLIGHT_HELP: &str = "Current number of RPCs that are processing during the snapshot.";
const RPCS_OFFSET_HELP: &str = "Current RPC offset by size.";

const BLOCKSIZE_HELP: &str = "Filesystem block size in bytes.";
const FILESFREE_HELP: &str = "The number of inodes (objects) available.";
const FILESTOTAL_HELP: &str = "The maximum number of inodes (objects) the filesystem can hold.";
const KBYTESAVAIL_HELP: &str = "Number of kilobytes readily available in the pool.";
const KBYTESFREE_HELP: &str = "Number of kilobytes allocated to the pool.";
const KBYTESTOTAL_HELP: &str = "Capacity of the pool in kilobytes.";
const EXPORTS_HELP: &str = "Number of exports (client connections) held by the target.";
const QUOTA_IUSED_HELP: &str = "Returns '1' if a valid address is returned within the pool, referencing whether free space can be allocated.";
const HEALTH_HELP: &str = "Current health status for the indicated instance: 1 refers to 'healthy', 0 refers to 'unhealthy'.";

fn summary_field(operation: &'static str, field: SummaryField) -> SummaryQuery {
    SummaryQuery::Field { operation, field }
}

fn job_field(field: &'static str, index: usize) -> JobQuery {
    JobQuery::Field { field, index }
}

/// Read/write byte summaries and the per-operation counter of a `stats` file.
fn stats_definitions(component: Component, path: &'static str) -> Vec<MetricDefinition> {
    use SummaryField::{Maximum, Minimum, Samples, Sum};
    let def = |name, help| MetricDefinition::new(component, path, "stats", name, help);
    vec![
        def("read_samples_total", READ_SAMPLES_HELP)
            .counter()
            .summary(summary_field("read_bytes", Samples)),
        def("read_minimum_size_bytes", READ_MINIMUM_HELP)
            .summary(summary_field("read_bytes", Minimum))
            .extended(),
        def("read_maximum_size_bytes", READ_MAXIMUM_HELP)
            .summary(summary_field("read_bytes", Maximum))
            .extended(),
        def("read_bytes_total", READ_TOTAL_HELP)
            .counter()
            .summary(summary_field("read_bytes", Sum)),
        def("write_samples_total", WRITE_SAMPLES_HELP)
            .counter()
            .summary(summary_field("write_bytes", Samples)),
        def("write_minimum_size_bytes", WRITE_MINIMUM_HELP)
            .summary(summary_field("write_bytes", Minimum))
            .extended(),
        def("write_maximum_size_bytes", WRITE_MAXIMUM_HELP)
            .summary(summary_field("write_bytes", Maximum))
            .extended(),
        def("write_bytes_total", WRITE_TOTAL_HELP)
            .counter()
            .summary(summary_field("write_bytes", Sum)),
        def("stats_total", STATS_HELP)
            .counter()
            .summary(SummaryQuery::Operations)
            .extended(),
    ]
}

/// Per-job byte summaries and operation counters of a `job_stats` file.
fn job_definitions(component: Component, path: &'static str) -> Vec<MetricDefinition> {
    let def = |name, help| MetricDefinition::new(component, path, "job_stats", name, help);
    vec![
        def("job_read_samples_total", JOB_READ_SAMPLES_HELP)
            .counter()
            .jobs(job_field("read_bytes", 0)),
        def("job_read_minimum_size_bytes", JOB_READ_MINIMUM_HELP)
            .jobs(job_field("read_bytes", 1))
            .extended(),
        def("job_read_maximum_size_bytes", JOB_READ_MAXIMUM_HELP)
            .jobs(job_field("read_bytes", 2))
            .extended(),
        def("job_read_bytes_total", JOB_READ_TOTAL_HELP)
            .counter()
            .jobs(job_field("read_bytes", 3)),
        def("job_write_samples_total", JOB_WRITE_SAMPLES_HELP)
            .counter()
            .jobs(job_field("write_bytes", 0)),
        def("job_write_minimum_size_bytes", JOB_WRITE_MINIMUM_HELP)
            .jobs(job_field("write_bytes", 1))
            .extended(),
        def("job_write_maximum_size_bytes", JOB_WRITE_MAXIMUM_HELP)
            .jobs(job_field("write_bytes", 2))
            .extended(),
        def("job_write_bytes_total", JOB_WRITE_TOTAL_HELP)
            .counter()
            .jobs(job_field("write_bytes", 3)),
        def("job_stats_total", JOB_STATS_HELP)
            .counter()
            .jobs(JobQuery::Operations),
    ]
}

/// Space and inode usage of an OSD.
fn osd_definitions(component: Component, path: &'static str) -> Vec<MetricDefinition> {
    let def = |file, name, help| MetricDefinition::new(component, path, file, name, help);
    vec![
        def("blocksize", "blocksize_bytes", BLOCKSIZE_HELP).extended(),
        def("filesfree", "inodes_free", FILESFREE_HELP),
        def("filestotal", "inodes_maximum", FILESTOTAL_HELP),
        def("kbytesavail", "available_kilobytes", KBYTESAVAIL_HELP),
        def("kbytesfree", "free_kilobytes", KBYTESFREE_HELP),
        def("kbytestotal", "capacity_kilobytes", KBYTESTOTAL_HELP),
    ]
}

fn ost_definitions() -> Vec<MetricDefinition> {
    const OBD: &str = "obdfilter/*";
    const LDLM: &str = "ldlm/namespaces/filter-*";
    let c = Component::Ost;
    let def = |file, name, help| MetricDefinition::new(c, OBD, file, name, help);
    let lock = |file, name, help| MetricDefinition::new(c, LDLM, file, name, help);

    let mut defs = osd_definitions(c, OBD);
    defs.extend([
        def("brw_size", "brw_size_megabytes", "Block read/write size in megabytes.").extended(),
        def("brw_stats", "pages_per_bulk_rw_total", PAGES_PER_BULK_HELP)
            .counter()
            .histogram("pages per bulk r/w"),
        def("brw_stats", "discontiguous_pages_total", DISCONTIGUOUS_PAGES_HELP)
            .counter()
            .histogram("discontiguous pages"),
        def("brw_stats", "disk_io_now", IOS_IN_FLIGHT_HELP).histogram("disk I/Os in flight"),
        def("brw_stats", "io_time_milliseconds_total", IO_TIME_HELP)
            .counter()
            .histogram("I/O time"),
        def("brw_stats", "disk_io_total", DISK_IO_SIZE_HELP)
            .counter()
            .histogram("disk I/O size"),
        def("degraded", "degraded", "Binary indicator as to whether or not the pool is degraded - 0 for not degraded, 1 for degraded."),
        def("grant_compat_disable", "grant_compat_disabled", "Binary indicator as to whether clients with OBD_CONNECT_GRANT_PARAM setting will be granted space.").extended(),
        def("grant_precreate", "grant_precreate_capacity_bytes", "Maximum space in bytes that clients can preallocate for objects.").extended(),
        def("job_cleanup_interval", "job_cleanup_interval_seconds", "Interval in seconds between cleanup of tuning statistics.").extended(),
        def("lfsck_speed_limit", "lfsck_speed_limit", "Maximum operations per second LFSCK (Lustre filesystem verification) can run.").extended(),
        def("num_exports", "exports", EXPORTS_HELP),
        def("precreate_batch", "precreate_batch", "Maximum number of objects that can be included in a single transaction.").extended(),
        def("recovery_time_hard", "recovery_time_hard_seconds", "Maximum timeout 'recover_time_soft' can increment to for a single server.").extended(),
        def("recovery_time_soft", "recovery_time_soft_seconds", "Duration in seconds for a client to attempt to reconnect after a crash.").extended(),
        def("soft_sync_limit", "soft_sync_limit", "Number of RPCs necessary before triggering a sync.").extended(),
        def("sync_journal", "sync_journal_enabled", "Binary indicator as to whether or not the journal is set for asynchronous commits.").extended(),
        def("tot_dirty", "exports_dirty_bytes", "Bytes of dirty cache reported by all exports."),
        def("tot_granted", "exports_granted_bytes", "Bytes of space granted to all exports."),
        def("tot_pending", "exports_pending_bytes", "Bytes of grant space pending for all exports."),
        lock("lock_count", "lock_count", "Number of locks held in the namespace."),
        lock("lock_timeouts", "lock_timeout_total", "Number of lock timeouts.").counter(),
        lock("contended_locks", "lock_contended_threshold", "Number of locks on a resource above which it counts as contended.").extended(),
        lock("contention_seconds", "lock_contention_seconds", "Time in seconds a resource stays contended.").extended(),
        lock("pool/granted", "lock_granted", "Number of granted locks.").extended(),
        lock("pool/grant_rate", "lock_grant_rate", "Lock grant rate.").extended(),
        lock("pool/cancel_rate", "lock_cancel_rate", "Lock cancel rate.").extended(),
        lock("pool/grant_speed", "lock_grant_speed", "Lock grant speed.").extended(),
    ]);
    defs.extend(stats_definitions(c, OBD));
    defs.extend(job_definitions(c, OBD));
    defs
}

fn mdt_definitions() -> Vec<MetricDefinition> {
    const MDT: &str = "mdt/*";
    let c = Component::Mdt;
    vec![
        MetricDefinition::new(c, MDT, "num_exports", "exports", EXPORTS_HELP),
        MetricDefinition::new(c, MDT, "md_stats", "stats_total", STATS_HELP)
            .counter()
            .summary(SummaryQuery::Operations),
        MetricDefinition::new(c, MDT, "job_stats", "job_stats_total", JOB_STATS_HELP)
            .counter()
            .jobs(JobQuery::Operations),
    ]
}

fn server_osd_definitions(component: Component, path: &'static str) -> Vec<MetricDefinition> {
    let mut defs = osd_definitions(component, path);
    defs.push(
        MetricDefinition::new(component, path, "quota_iused_estimate", "quota_iused_estimate", QUOTA_IUSED_HELP)
            .extended(),
    );
    defs
}

fn client_definitions() -> Vec<MetricDefinition> {
    const LLITE: &str = "llite/*";
    let c = Component::Client;
    let def = |file, name, help| MetricDefinition::new(c, LLITE, file, name, help);

    let mut defs = osd_definitions(c, LLITE);
    defs.extend([
        def("checksum_pages", "checksum_pages_enabled", "Returns '1' if data checksumming is enabled for the client.").extended(),
        def("default_easize", "default_ea_size_bytes", "Default extended attribute (EA) size in bytes.").extended(),
        def("lazystatfs", "lazystatfs_enabled", "Returns '1' if lazystatfs (a non-blocking alternative to statfs) is enabled for the client.").extended(),
        def("max_read_ahead_mb", "maximum_read_ahead_megabytes", "Maximum number of megabytes to read ahead.").extended(),
        def("max_read_ahead_per_file_mb", "maximum_read_ahead_per_file_megabytes", "Maximum number of megabytes per file to read ahead.").extended(),
        def("max_read_ahead_whole_mb", "maximum_read_ahead_whole_megabytes", "Maximum file size in megabytes for a file to be read in its entirety.").extended(),
        def("statahead_agl", "statahead_agl_enabled", "Returns '1' if the Asynchronous Glimpse Lock (AGL) for statahead is enabled.").extended(),
        def("statahead_max", "statahead_maximum", "Maximum window size for statahead.").extended(),
        def("xattr_cache", "xattr_cache_enabled", "Returns '1' if extended attribute cache is enabled.").extended(),
    ]);
    defs.extend(stats_definitions(c, LLITE));

    for path in ["mdc/*", "osc/*"] {
        let rpc = |name, help| MetricDefinition::new(c, path, "rpc_stats", name, help).multiple();
        defs.extend([
            rpc("pages_per_rpc_total", PAGES_PER_RPC_HELP)
                .counter()
                .histogram("pages per rpc"),
            rpc("rpcs_in_flight", RPCS_IN_FLIGHT_HELP).histogram("rpcs in flight"),
            rpc("rpcs_offset", RPCS_OFFSET_HELP).histogram("offset").extended(),
        ]);
    }
    defs
}

fn lnet_definitions() -> Vec<MetricDefinition> {
    let c = Component::Lnet;
    let def = |file, name, help| MetricDefinition::new(c, "", file, name, help);
    let stat = |index, name, help| def("stats", name, help).list(index);

    vec![
        def("catastrophe", "catastrophe_enabled", "Returns 1 if currently in catastrophe mode.").extended(),
        def("console_backoff", "console_backoff_enabled", "Returns non-zero number if console_backoff is enabled.").extended(),
        def("console_max_delay_centisecs", "console_max_delay_centiseconds", "Maximum time in centiseconds before the console logs a message.").extended(),
        def("console_min_delay_centisecs", "console_min_delay_centiseconds", "Minimum time in centiseconds before the console logs a message.").extended(),
        def("console_ratelimit", "console_ratelimit_enabled", "Returns 1 if the console message rate limiting is enabled.").extended(),
        def("debug_mb", "debug_megabytes", "Maximum buffer size in megabytes for the LNET debug messages.").extended(),
        def("fail_err", "fail_error_total", "Number of errors that have been thrown.").counter(),
        def("fail_val", "fail_maximum", "Maximum number of times to fail."),
        def("lnet_memused", "lnet_memory_used_bytes", "Number of bytes allocated by LNET."),
        def("panic_on_lbug", "panic_on_lbug_enabled", "Returns 1 if panic_on_lbug is enabled.").extended(),
        def("watchdog_ratelimit", "watchdog_ratelimit_enabled", "Returns 1 if the watchdog rate limiter is enabled.").extended(),
        stat(0, "allocated", "Number of messages currently allocated."),
        stat(1, "maximum", "Maximum number of outstanding messages."),
        stat(2, "errors_total", "Total number of errors.").counter(),
        stat(3, "send_count_total", "Total number of messages that have been sent.").counter(),
        stat(4, "receive_count_total", "Total number of messages that have been received.").counter(),
        stat(5, "route_count_total", "Total number of messages that have been routed.").counter(),
        stat(6, "drop_count_total", "Total number of messages that have been dropped.").counter(),
        stat(7, "send_bytes_total", "Total number of bytes sent.").counter(),
        stat(8, "receive_bytes_total", "Total number of bytes received.").counter(),
        stat(9, "route_bytes_total", "Total number of bytes for routed messages.").counter(),
        stat(10, "drop_bytes_total", "Total number of bytes that have been dropped.").counter(),
    ]
}

/// The complete catalog, in registration order.
pub fn catalog() -> Vec<MetricDefinition> {
    let mut defs = ost_definitions();
    defs.extend(mdt_definitions());
    defs.extend(server_osd_definitions(Component::Mgs, "mgs/MGS/osd"));
    defs.extend(server_osd_definitions(Component::Mds, "mds/MDS/osd"));
    defs.extend(client_definitions());
    defs.push(MetricDefinition::new(Component::Generic, "", "health_check", "health_check", HEALTH_HELP));
    defs.extend(lnet_definitions());
    defs.push(MetricDefinition::new(Component::Health, "", "health_check", "health_check", HEALTH_HELP));
    defs
}

/// Catalog entries enabled by `config`.
pub fn enabled_definitions(config: &CollectorConfig) -> Vec<MetricDefinition> {
    catalog()
        .into_iter()
        .filter(|def| {
            let level = config.level(def.component);
            level != DetailLevel::Disabled && def.level <= level
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_component_parse() {
        assert_eq!("ost".parse::<Component>().unwrap(), Component::Ost);
        assert_eq!("LNET".parse::<Component>().unwrap(), Component::Lnet);
        assert_eq!(
            "oss".parse::<Component>(),
            Err(ConfigError::UnknownComponent("oss".to_string()))
        );
    }

    #[test]
    fn test_component_source() {
        assert_eq!(Component::Ost.source(), SourceKind::Procfs);
        assert_eq!(Component::Generic.source(), SourceKind::Procfs);
        assert_eq!(Component::Lnet.source(), SourceKind::Procsys);
        assert_eq!(Component::Health.source(), SourceKind::Sysfs);
        assert_eq!(Component::Ost.label(), "OST");
        assert_eq!(Component::Client.label(), "client");
    }

    #[test]
    fn test_base_paths() {
        let config = CollectorConfig::new("/host/proc", "/host/sys");
        assert_eq!(
            SourceKind::Procfs.base_path(&config),
            PathBuf::from("/host/proc/fs/lustre")
        );
        assert_eq!(
            SourceKind::Procsys.base_path(&config),
            PathBuf::from("/host/proc/sys/lnet")
        );
        assert_eq!(
            SourceKind::Sysfs.base_path(&config),
            PathBuf::from("/host/sys/fs/lustre")
        );
    }

    #[test]
    fn test_pattern_and_depth() {
        let defs = catalog();
        let granted = defs.iter().find(|d| d.file == "pool/granted").unwrap();
        assert_eq!(granted.depth(), 1);
        assert_eq!(
            granted.pattern(Path::new("/proc/fs/lustre")),
            PathBuf::from("/proc/fs/lustre/ldlm/namespaces/filter-*/pool/granted")
        );

        let lnet = defs
            .iter()
            .find(|d| d.component == Component::Lnet && d.file == "stats")
            .unwrap();
        assert_eq!(lnet.depth(), 0);
        assert_eq!(
            lnet.pattern(Path::new("/proc/sys/lnet")),
            PathBuf::from("/proc/sys/lnet/stats")
        );
    }

    #[test]
    fn test_formats_resolved_at_registration() {
        for def in catalog() {
            let expected_match = match (&def.format, def.file) {
                (FormatKind::Health, file) => file == "health_check",
                (FormatKind::Summary(_), file) => file == "stats" || file == "md_stats",
                (FormatKind::JobStats(_), file) => file == "job_stats",
                (FormatKind::Histogram(_), file) => file == "brw_stats" || file == "rpc_stats",
                (FormatKind::NumericList { index }, file) => file == "stats" && *index <= 10,
                (FormatKind::Scalar, file) => !file.contains("stats") && file != "health_check",
            };
            assert!(expected_match, "{} ({}) has {:?}", def.name, def.file, def.format);
        }
    }

    #[test]
    fn test_lnet_stats_cover_all_columns() {
        let mut indices: Vec<usize> = catalog()
            .iter()
            .filter_map(|d| match d.format {
                FormatKind::NumericList { index } => Some(index),
                _ => None,
            })
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_help_consistent_per_name() {
        let mut help: HashMap<&str, &str> = HashMap::new();
        for def in catalog() {
            let previous = help.entry(def.name).or_insert(def.help);
            assert_eq!(*previous, def.help, "help differs for {}", def.name);
        }
    }

    #[test]
    fn test_total_suffix_only_on_counters() {
        for def in catalog() {
            assert_eq!(
                def.name.ends_with("_total"),
                def.kind == ValueKind::Counter,
                "{} is a {:?}",
                def.name,
                def.kind
            );
        }
        let names: Vec<_> = catalog().iter().map(|d| d.name).collect();
        for name in ["exports", "exports_granted_bytes", "lock_count", "lock_granted"] {
            assert!(names.contains(&name), "missing {name}");
        }
    }

    #[test]
    fn test_enabled_definitions_levels() {
        let all = catalog().len();
        let mut config = CollectorConfig::default();
        assert_eq!(enabled_definitions(&config).len(), all);

        config.set_level(Component::Lnet, DetailLevel::Core);
        let defs = enabled_definitions(&config);
        assert!(defs.iter().any(|d| d.name == "send_count_total"));
        assert!(!defs.iter().any(|d| d.name == "catastrophe_enabled"));

        config.set_level(Component::Lnet, DetailLevel::Disabled);
        let defs = enabled_definitions(&config);
        assert!(!defs.iter().any(|d| d.component == Component::Lnet));
    }
}
