//! Plain-text line protocol, one `<path> <value> <unix_seconds>` record per
//! line, as consumed by carbon-style receivers.
//!
//! The sink that ships these lines over the network lives outside this crate;
//! this module only renders them from a [`StatsSummary`].

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};
use crate::export::StatsSummary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineProtocolConfig {
    /// First path segment of every record (default: `stats`)
    pub prefix: String,
}

impl Default for LineProtocolConfig {
    fn default() -> Self {
        Self {
            prefix: "stats".to_string(),
        }
    }
}

impl LineProtocolConfig {
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().is_empty() {
            return Err(MetricsError::InvalidConfig {
                message: "line protocol prefix must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Makes a metric name safe for a dotted path.
///
/// Whitespace runs become `_`, `/` becomes `-`, anything outside
/// `[a-zA-Z_-0-9.]` is dropped and the result is lower-cased. An empty result
/// is replaced by `"1"`.
///
/// ```rust
/// use loka_stats::line_protocol::sanitize_key;
///
/// assert_eq!(sanitize_key("GET /api/users  ok"), "get_-api-users_ok");
/// assert_eq!(sanitize_key("%%%"), "1");
/// ```
pub fn sanitize_key(key: &str) -> String {
    let mut sanitized = String::with_capacity(key.len());
    let mut in_whitespace = false;

    for c in key.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                sanitized.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;

        match c {
            '/' => sanitized.push('-'),
            'a'..='z' | 'A'..='Z' | '0'..='9' | '_' | '-' | '.' => {
                sanitized.push(c.to_ascii_lowercase())
            }
            _ => {}
        }
    }

    if sanitized.is_empty() {
        "1".to_string()
    } else {
        sanitized
    }
}

/// Renders every value of `summary` as line-protocol records.
pub fn render(summary: &StatsSummary, config: &LineProtocolConfig, unix_seconds: i64) -> String {
    let prefix = &config.prefix;
    let mut output = String::with_capacity(64 * (summary.counters.len() + summary.gauges.len()));

    for (key, value) in &summary.counters {
        let key = sanitize_key(key);
        let _ = writeln!(output, "{prefix}.counters.{key} {value} {unix_seconds}");
    }

    for (key, value) in &summary.gauges {
        let key = sanitize_key(key);
        let _ = writeln!(output, "{prefix}.gauges.{key} {value} {unix_seconds}");
    }

    for (key, metric) in &summary.metrics {
        let key = sanitize_key(key);
        let fields = [
            ("mean", metric.average.to_string()),
            ("upper", metric.max.to_string()),
            ("upper_99", metric.p99.to_string()),
            ("lower", metric.min.to_string()),
            ("count", metric.count.to_string()),
        ];
        for (field, value) in fields {
            let _ = writeln!(
                output,
                "{prefix}.timers.{key}.{field} {value} {unix_seconds}"
            );
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MetricRegistry;

    #[test]
    fn test_sanitize_key() {
        assert_eq!(sanitize_key("simple"), "simple");
        assert_eq!(sanitize_key("With Spaces\tand\ttabs"), "with_spaces_and_tabs");
        assert_eq!(sanitize_key("a/b/c"), "a-b-c");
        assert_eq!(sanitize_key("db.query{table=\"users\"}"), "db.querytableusers");
        assert_eq!(sanitize_key("__ok-1.2"), "__ok-1.2");
        assert_eq!(sanitize_key(""), "1");
        assert_eq!(sanitize_key("été"), "t");
    }

    #[test]
    fn test_render_sections() {
        let registry = MetricRegistry::new();
        registry.increment("hits", 7);
        registry.add_gauge("queue depth", || 1.5);
        registry.record_metric("api/login", 10.0);

        let config = LineProtocolConfig::default();
        let output = render(&registry.summary(), &config, 1_700_000_000);
        let lines: Vec<&str> = output.lines().collect();

        assert_eq!(lines[0], "stats.counters.hits 7 1700000000");
        assert_eq!(lines[1], "stats.gauges.queue_depth 1.5 1700000000");
        assert_eq!(lines[2], "stats.timers.api-login.mean 10 1700000000");
        assert_eq!(lines[3], "stats.timers.api-login.upper 10 1700000000");
        assert_eq!(lines[4], "stats.timers.api-login.upper_99 10 1700000000");
        assert_eq!(lines[5], "stats.timers.api-login.lower 10 1700000000");
        assert_eq!(lines[6], "stats.timers.api-login.count 1 1700000000");
        assert_eq!(lines.len(), 7);
        assert!(output.ends_with('\n'));
    }

    #[test]
    fn test_validate_prefix() {
        let config = LineProtocolConfig {
            prefix: " ".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(MetricsError::InvalidConfig { .. })
        ));
        assert!(LineProtocolConfig::default().validate().is_ok());
    }
}
