//! Single-value files: `kbytestotal`, `num_exports`, `lnet_memused`, ...

use super::{ParseError, parse_field};
use crate::metric::MetricRecord;

/// Parses a file whose whole content is one number.
///
/// Empty content yields no record; anything else must parse as `f64`.
pub fn parse_scalar(content: &str, name: &str, help: &str) -> Result<Vec<MetricRecord>, ParseError> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    let value = parse_field(trimmed, name)?;
    Ok(vec![MetricRecord::new(name, help, value)])
}

/// Parses `health_check`: `healthy` maps to 1, any other status to 0.
pub fn parse_health(content: &str, name: &str, help: &str) -> Vec<MetricRecord> {
    let value = if content.trim() == "healthy" { 1.0 } else { 0.0 };
    vec![MetricRecord::new(name, help, value)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scalar_matches_trimmed_float() {
        for text in ["4096\n", "  0 ", "1.5\n", "18446744073709551615\n"] {
            let records = parse_scalar(text, "blocksize", "help").unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].value, text.trim().parse::<f64>().unwrap());
            assert_eq!(records[0].name, "blocksize");
        }
    }

    #[test]
    fn test_parse_scalar_empty() {
        assert!(parse_scalar("\n", "blocksize", "help").unwrap().is_empty());
    }

    #[test]
    fn test_parse_scalar_malformed() {
        let err = parse_scalar("not a number\n", "blocksize", "help").unwrap_err();
        assert!(err.message.contains("blocksize"));
    }

    #[test]
    fn test_parse_health() {
        assert_eq!(parse_health("healthy\n", "health_check", "h")[0].value, 1.0);
        assert_eq!(
            parse_health("NOT HEALTHY\n", "health_check", "h")[0].value,
            0.0
        );
    }
}
