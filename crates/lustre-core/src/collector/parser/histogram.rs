//! Histogram tables (`brw_stats`, `rpc_stats`).
//!
//! A file holds several sections separated by blank lines:
//!
//! ```text
//! disk I/O size          ios  %  cum %   |  ios % cum %
//! 8:                      4   15  15     |  0   0   0
//! 1K:                     2    7  46     |  0   0   0
//! ```
//!
//! Each data line is `<bucket>: <read> <%> <cum%> | <write> <%> <cum%>`, or a
//! single column `<bucket>: <count> <%> <cum%>` for sections without a
//! read/write split.

use super::{ParseError, parse_field};
use crate::metric::MetricRecord;

/// Which section of a histogram file a definition reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistogramSection {
    /// Leading text of the section's title line.
    pub title: &'static str,
    /// Convert `K`/`M`/`G` bucket suffixes to a byte count.
    pub byte_buckets: bool,
}

impl HistogramSection {
    pub const fn new(title: &'static str) -> Self {
        Self {
            title,
            byte_buckets: true,
        }
    }
}

/// Converts a size-suffixed bucket (`4K`, `1M`, `2G`) to its byte count.
///
/// Buckets without a known suffix, with a prefix that is not an unsigned
/// integer, or whose byte count overflows are returned unchanged.
pub fn bucket_to_bytes(bucket: &str) -> String {
    let upper = bucket.to_ascii_uppercase();
    let (digits, multiplier) = match upper.as_bytes().last() {
        Some(b'K') => (&upper[..upper.len() - 1], 1u64 << 10),
        Some(b'M') => (&upper[..upper.len() - 1], 1u64 << 20),
        Some(b'G') => (&upper[..upper.len() - 1], 1u64 << 30),
        _ => return bucket.to_string(),
    };
    digits
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(multiplier))
        .map_or_else(|| bucket.to_string(), |bytes| bytes.to_string())
}

/// Returns the lines of the section starting with `title`, title excluded.
fn section_lines<'a>(content: &'a str, title: &str) -> Option<Vec<&'a str>> {
    let mut lines = content.lines();
    lines.find(|line| line.starts_with(title))?;
    Some(lines.take_while(|line| !line.trim().is_empty()).collect())
}

/// Parses one section of a histogram file.
///
/// Dual-column lines produce a `read` and a `write` record, single-column
/// lines one record without operation. Every record carries a `size` label.
/// A missing section yields no records.
pub fn parse_histogram(
    content: &str,
    section: &HistogramSection,
    name: &str,
    help: &str,
) -> Result<Vec<MetricRecord>, ParseError> {
    let Some(lines) = section_lines(content, section.title) else {
        return Ok(Vec::new());
    };

    let mut records = Vec::new();
    for line in lines {
        let fields: Vec<&str> = line.split_whitespace().collect();
        let dual = fields.contains(&"|");
        if (dual && fields.len() < 6) || (!dual && fields.len() < 4) {
            continue;
        }

        let bucket = fields[0].trim_end_matches(':');
        let bucket = if section.byte_buckets {
            bucket_to_bytes(bucket)
        } else {
            bucket.to_string()
        };

        if dual {
            let read = parse_field(fields[1], section.title)?;
            let write = parse_field(fields[5], section.title)?;
            records.push(
                MetricRecord::new(name, help, read)
                    .with_label("operation", "read")
                    .with_label("size", bucket.as_str()),
            );
            records.push(
                MetricRecord::new(name, help, write)
                    .with_label("operation", "write")
                    .with_label("size", bucket),
            );
        } else {
            let value = parse_field(fields[1], section.title)?;
            records.push(MetricRecord::new(name, help, value).with_label("size", bucket));
        }
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BRW_STATS: &str = "\
snapshot_time:         1495035142.697801 (secs.usecs)

                           read      |     write
pages per bulk r/w     rpcs  %   cum % |  rpcs % cum %
1:                     14    53  53    |  0    0 0
2:                     12    46  100   |  0    0 0

                           read      |     write
discontiguous pages    rpcs  %   cum % |  rpcs  % cum %
0:                     26    100 100   |  0     0 0
1:                      0      0 100   |  0     0 0

                           read      |     write
disk I/O size          ios  %  cum %   |  ios % cum %
8:                      4   15  15     |  0   0   0
16:                     0    0  15     |  0   0   0
512:                    1    3  38     |  0   0   0
1K:                     2    7  46     |  0   0   0
8K:                    14   53 100     |  3   0   0
";

    fn values(records: &[MetricRecord], op: &str) -> Vec<(String, f64)> {
        records
            .iter()
            .filter(|r| r.label("operation") == Some(op))
            .map(|r| (r.label("size").unwrap().to_string(), r.value))
            .collect()
    }

    #[test]
    fn test_bucket_to_bytes() {
        assert_eq!(bucket_to_bytes("1K"), "1024");
        assert_eq!(bucket_to_bytes("8k"), "8192");
        assert_eq!(bucket_to_bytes("4M"), "4194304");
        assert_eq!(bucket_to_bytes("1G"), "1073741824");
        assert_eq!(bucket_to_bytes("512"), "512");
        assert_eq!(bucket_to_bytes("xK"), "xK");
        assert_eq!(bucket_to_bytes(""), "");
        assert_eq!(bucket_to_bytes("1.5K"), "1.5K");
        assert_eq!(bucket_to_bytes("infK"), "infK");
        assert_eq!(bucket_to_bytes("-1K"), "-1K");
        assert_eq!(bucket_to_bytes("99999999999999999G"), "99999999999999999G");
    }

    #[test]
    fn test_dual_section_two_records_per_line() {
        let section = HistogramSection::new("pages per bulk r/w");
        let records = parse_histogram(BRW_STATS, &section, "pages_per_bulk_rw_total", "h").unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(
            values(&records, "read"),
            vec![("1".to_string(), 14.0), ("2".to_string(), 12.0)]
        );
        assert_eq!(
            values(&records, "write"),
            vec![("1".to_string(), 0.0), ("2".to_string(), 0.0)]
        );
        assert!(records.iter().all(|r| !r.label("size").unwrap().ends_with(':')));
    }

    #[test]
    fn test_section_stops_at_blank_line() {
        let section = HistogramSection::new("discontiguous pages");
        let records = parse_histogram(BRW_STATS, &section, "m", "h").unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(values(&records, "read")[0], ("0".to_string(), 26.0));
    }

    #[test]
    fn test_byte_buckets() {
        let section = HistogramSection::new("disk I/O size");
        let records = parse_histogram(BRW_STATS, &section, "m", "h").unwrap();
        assert_eq!(records.len(), 10);

        let reads = values(&records, "read");
        assert_eq!(reads[3], ("1024".to_string(), 2.0));
        assert_eq!(reads[4], ("8192".to_string(), 14.0));
        assert_eq!(values(&records, "write")[4], ("8192".to_string(), 3.0));

        let raw = HistogramSection {
            title: "disk I/O size",
            byte_buckets: false,
        };
        let records = parse_histogram(BRW_STATS, &raw, "m", "h").unwrap();
        assert_eq!(values(&records, "read")[3].0, "1K");
    }

    #[test]
    fn test_missing_section() {
        let section = HistogramSection::new("I/O time");
        assert!(parse_histogram(BRW_STATS, &section, "m", "h").unwrap().is_empty());
        assert!(parse_histogram("", &section, "m", "h").unwrap().is_empty());
    }

    #[test]
    fn test_single_column_and_short_lines() {
        let content = "\
rpcs in flight        rpcs   % cum %
0:                      5   50  50
1:
3:                      7
4:                      7   50
2:                      5   50 100
";
        let section = HistogramSection::new("rpcs in flight");
        let records = parse_histogram(content, &section, "m", "h").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].label("operation"), None);
        assert_eq!(records[1].label("size"), Some("2"));
        assert_eq!(records[1].value, 5.0);
    }

    #[test]
    fn test_short_dual_line_skipped() {
        let content = "\
pages per rpc         rpcs   % cum % |       rpcs   % cum %
1:                       0   0   0   |
2:                       4  10  10   |          1  50  50
";
        let section = HistogramSection::new("pages per rpc");
        let records = parse_histogram(content, &section, "m", "h").unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(values(&records, "write"), vec![("2".to_string(), 1.0)]);
    }

    #[test]
    fn test_malformed_count() {
        let content = "offset                rpcs   % cum %\n0:  x 1 2\n";
        let section = HistogramSection::new("offset");
        assert!(parse_histogram(content, &section, "m", "h").is_err());
    }
}
