//! Translation of a resource identity into a backend range query.
//!
//! Path segments are untrusted: label values are escaped before they are
//! placed inside the selector, and a metric name that is not a plain
//! identifier is matched through the `__name__` label instead of being
//! spliced into the query text.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};

use crate::config::QueryWindowConfig;

/// The resource a metrics request is about, taken from the request path.
#[derive(Clone, Debug, PartialEq)]
pub struct ResourceIdentity {
    pub namespace: String,
    pub name: String,
    pub metric_name: String,
}

/// Time range covered by a range query.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step: Duration,
}

impl QueryWindow {
    /// Start timestamp in the RFC 3339 form the backend accepts.
    pub fn start_param(&self) -> String {
        self.start.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// End timestamp in the RFC 3339 form the backend accepts.
    pub fn end_param(&self) -> String {
        self.end.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Step expressed in (possibly fractional) seconds.
    pub fn step_param(&self) -> String {
        self.step.as_secs_f64().to_string()
    }
}

/// A query string in the backend's query language.
#[derive(Clone, Debug, PartialEq)]
pub struct BackendQuery(String);

impl BackendQuery {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BackendQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the backend needs to run one range query.
#[derive(Clone, Debug, PartialEq)]
pub struct RangeQuery {
    pub query: BackendQuery,
    pub window: QueryWindow,
}

/// Builds range queries over a fixed trailing window.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueryBuilder {
    window: QueryWindowConfig,
}

impl QueryBuilder {
    pub fn new(window: QueryWindowConfig) -> Self {
        Self { window }
    }

    /// Builds the query for `identity` with the window ending at `now`.
    pub fn build(&self, identity: &ResourceIdentity, now: DateTime<Utc>) -> RangeQuery {
        RangeQuery {
            query: selector(identity),
            window: QueryWindow {
                start: now - self.window.range(),
                end: now,
                step: self.window.step(),
            },
        }
    }
}

fn selector(identity: &ResourceIdentity) -> BackendQuery {
    let name = escape_label_value(&identity.name);
    let namespace = escape_label_value(&identity.namespace);

    let query = if is_metric_name(&identity.metric_name) {
        format!(
            r#"{}{{name="{name}",namespace="{namespace}"}}"#,
            identity.metric_name
        )
    } else {
        format!(
            r#"{{__name__="{}",name="{name}",namespace="{namespace}"}}"#,
            escape_label_value(&identity.metric_name)
        )
    };
    BackendQuery(query)
}

/// Escapes a string for use inside a double-quoted label matcher value.
pub fn escape_label_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str(r"\\"),
            '"' => escaped.push_str(r#"\""#),
            '\n' => escaped.push_str(r"\n"),
            c => escaped.push(c),
        }
    }
    escaped
}

/// Whether `name` matches `[a-zA-Z_:][a-zA-Z0-9_:]*`.
pub fn is_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};

    fn identity(namespace: &str, name: &str, metric_name: &str) -> ResourceIdentity {
        ResourceIdentity {
            namespace: namespace.to_string(),
            name: name.to_string(),
            metric_name: metric_name.to_string(),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_query_string_format() {
        let builder = QueryBuilder::default();
        let query = builder.build(
            &identity("default", "vm1", "kubevirt_vmi_network_errors_total"),
            fixed_now(),
        );
        assert_eq!(
            query.query.as_str(),
            r#"kubevirt_vmi_network_errors_total{name="vm1",namespace="default"}"#
        );
    }

    #[test]
    fn test_default_window_is_ten_minutes_at_one_second() {
        let now = fixed_now();
        let query = QueryBuilder::default().build(&identity("ns", "vm", "up"), now);
        assert_eq!(query.window.end, now);
        assert_eq!(query.window.end - query.window.start, TimeDelta::minutes(10));
        assert_eq!(query.window.step, Duration::from_secs(1));
        assert!(query.window.start < query.window.end);
    }

    #[test]
    fn test_configured_window() {
        let window =
            QueryWindowConfig::new(Duration::from_secs(3600), Duration::from_secs(30)).unwrap();
        let query = QueryBuilder::new(window).build(&identity("ns", "vm", "up"), fixed_now());
        assert_eq!(query.window.end - query.window.start, TimeDelta::hours(1));
        assert_eq!(query.window.step_param(), "30");
    }

    #[test]
    fn test_window_params() {
        let query = QueryBuilder::default().build(&identity("ns", "vm", "up"), fixed_now());
        assert_eq!(query.window.start_param(), "2024-05-01T11:50:00.000Z");
        assert_eq!(query.window.end_param(), "2024-05-01T12:00:00.000Z");
        assert_eq!(query.window.step_param(), "1");
    }

    #[test]
    fn test_fractional_step_param() {
        let window =
            QueryWindowConfig::new(Duration::from_secs(60), Duration::from_millis(500)).unwrap();
        let query = QueryBuilder::new(window).build(&identity("ns", "vm", "up"), fixed_now());
        assert_eq!(query.window.step_param(), "0.5");
    }

    #[test]
    fn test_label_values_are_escaped() {
        let query = QueryBuilder::default().build(
            &identity("default", r#"vm1",namespace=~".*"#, "up"),
            fixed_now(),
        );
        assert_eq!(
            query.query.as_str(),
            r#"up{name="vm1\",namespace=~\".*",namespace="default"}"#
        );
    }

    #[test]
    fn test_backslash_and_newline_escaping() {
        assert_eq!(escape_label_value(r"a\b"), r"a\\b");
        assert_eq!(escape_label_value("a\nb"), r"a\nb");
        assert_eq!(escape_label_value("plain-name.1"), "plain-name.1");
    }

    #[test]
    fn test_non_identifier_metric_uses_name_label() {
        let query = QueryBuilder::default().build(
            &identity("default", "vm1", "up or vector(1)"),
            fixed_now(),
        );
        assert_eq!(
            query.query.as_str(),
            r#"{__name__="up or vector(1)",name="vm1",namespace="default"}"#
        );
    }

    #[test]
    fn test_is_metric_name() {
        assert!(is_metric_name("kubevirt_vmi_network_errors_total"));
        assert!(is_metric_name("job:requests:rate5m"));
        assert!(is_metric_name("_hidden"));
        assert!(!is_metric_name(""));
        assert!(!is_metric_name("1metric"));
        assert!(!is_metric_name("metric{a=\"b\"}"));
        assert!(!is_metric_name("rate(x[5m])"));
    }

    #[test]
    fn test_display_matches_as_str() {
        let query = QueryBuilder::default().build(&identity("a", "b", "c"), fixed_now());
        assert_eq!(query.query.to_string(), query.query.as_str());
    }
}
