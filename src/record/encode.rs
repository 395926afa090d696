//! Text exposition encoding of emitted records.
//!
//! [`TextSink`] renders pushed records back into the exposition format, one
//! `# HELP`/`# TYPE` block per metric name, samples in push order. Used by
//! the CLI driver to print a collection cycle to stdout.

use std::collections::HashSet;
use std::fmt::Write as _;

use super::{MetricRecord, MetricSink, RecordPayload};

/// A [`MetricSink`] that renders records as exposition-format text.
#[derive(Debug, Default)]
pub struct TextSink {
    out: String,
    /// Metric names whose HELP/TYPE block was already written.
    announced: HashSet<String>,
}

impl TextSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rendered text so far.
    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Consumes the sink and returns the rendered text.
    pub fn into_string(self) -> String {
        self.out
    }

    fn announce(&mut self, record: &MetricRecord) {
        if self.announced.contains(&record.descriptor.name) {
            return;
        }
        self.announced.insert(record.descriptor.name.clone());
        if !record.descriptor.help.is_empty() {
            let _ = writeln!(
                self.out,
                "# HELP {} {}",
                record.descriptor.name,
                escape_help(&record.descriptor.help)
            );
        }
        let _ = writeln!(
            self.out,
            "# TYPE {} {}",
            record.descriptor.name,
            record.type_str()
        );
    }

    fn write_sample(
        &mut self,
        name: &str,
        record: &MetricRecord,
        extra: Option<(&str, String)>,
        value: String,
    ) {
        self.out.push_str(name);
        let has_extra = extra.is_some();
        if !record.descriptor.label_names.is_empty() || has_extra {
            self.out.push('{');
            let mut first = true;
            for (label_name, label_value) in record
                .descriptor
                .label_names
                .iter()
                .zip(record.label_values.iter())
            {
                if !first {
                    self.out.push(',');
                }
                first = false;
                let _ = write!(
                    self.out,
                    "{}=\"{}\"",
                    label_name,
                    escape_label_value(label_value)
                );
            }
            if let Some((extra_name, extra_value)) = extra {
                if !first {
                    self.out.push(',');
                }
                let _ = write!(self.out, "{}=\"{}\"", extra_name, extra_value);
            }
            self.out.push('}');
        }
        let _ = writeln!(self.out, " {}", value);
    }
}

impl MetricSink for TextSink {
    fn push(&mut self, record: MetricRecord) {
        self.announce(&record);
        let name = record.descriptor.name.clone();
        match &record.payload {
            RecordPayload::Scalar { value, .. } => {
                self.write_sample(&name, &record, None, format_value(*value));
            }
            RecordPayload::Summary {
                count,
                sum,
                quantiles,
            } => {
                for (quantile, value) in quantiles {
                    self.write_sample(
                        &name,
                        &record,
                        Some(("quantile", format_value(*quantile))),
                        format_value(*value),
                    );
                }
                self.write_sample(&format!("{}_sum", name), &record, None, format_value(*sum));
                self.write_sample(&format!("{}_count", name), &record, None, count.to_string());
            }
            RecordPayload::Histogram {
                count,
                sum,
                buckets,
            } => {
                for (upper_bound, cumulative) in buckets {
                    self.write_sample(
                        &name,
                        &record,
                        Some(("le", format_value(*upper_bound))),
                        cumulative.to_string(),
                    );
                }
                self.write_sample(&format!("{}_sum", name), &record, None, format_value(*sum));
                self.write_sample(&format!("{}_count", name), &record, None, count.to_string());
            }
        }
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        format!("{}", value)
    }
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn escape_help(help: &str) -> String {
    help.replace('\\', "\\\\").replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordDescriptor, ValueKind};

    fn scalar(name: &str, help: &str, names: &[&str], values: &[&str], v: f64) -> MetricRecord {
        MetricRecord {
            descriptor: RecordDescriptor::new(
                name,
                help,
                names.iter().map(|s| s.to_string()).collect(),
            ),
            label_values: values.iter().map(|s| s.to_string()).collect(),
            payload: RecordPayload::Scalar {
                kind: ValueKind::Gauge,
                value: v,
            },
        }
    }

    #[test]
    fn test_scalar_with_labels() {
        let mut sink = TextSink::new();
        sink.push(scalar("m", "help text", &["a", "b"], &["x", ""], 1.0));
        assert_eq!(
            sink.as_str(),
            "# HELP m help text\n# TYPE m gauge\nm{a=\"x\",b=\"\"} 1\n"
        );
    }

    #[test]
    fn test_help_and_type_written_once_per_name() {
        let mut sink = TextSink::new();
        sink.push(scalar("m", "h", &["file"], &["a.prom"], 1.0));
        sink.push(scalar("m", "h", &["file"], &["b.prom"], 2.0));
        let text = sink.into_string();
        assert_eq!(text.matches("# TYPE m gauge").count(), 1);
        assert!(text.contains("m{file=\"a.prom\"} 1\n"));
        assert!(text.contains("m{file=\"b.prom\"} 2\n"));
    }

    #[test]
    fn test_label_value_escaping() {
        let mut sink = TextSink::new();
        sink.push(scalar("m", "", &["p"], &["a\\b\"c\nd"], 0.0));
        assert!(sink.as_str().contains("m{p=\"a\\\\b\\\"c\\nd\"} 0\n"));
    }

    #[test]
    fn test_special_values() {
        let mut sink = TextSink::new();
        sink.push(scalar("m", "", &[], &[], f64::INFINITY));
        assert!(sink.as_str().contains("m +Inf\n"));
    }

    #[test]
    fn test_summary_rendering() {
        let mut sink = TextSink::new();
        sink.push(MetricRecord {
            descriptor: RecordDescriptor::new("lat", "latency", vec!["svc".to_string()]),
            label_values: vec!["api".to_string()],
            payload: RecordPayload::Summary {
                count: 5,
                sum: 12.5,
                quantiles: vec![(0.5, 1.0), (0.99, 4.0)],
            },
        });
        let text = sink.into_string();
        assert!(text.contains("# TYPE lat summary\n"));
        assert!(text.contains("lat{svc=\"api\",quantile=\"0.5\"} 1\n"));
        assert!(text.contains("lat{svc=\"api\",quantile=\"0.99\"} 4\n"));
        assert!(text.contains("lat_sum{svc=\"api\"} 12.5\n"));
        assert!(text.contains("lat_count{svc=\"api\"} 5\n"));
    }

    #[test]
    fn test_histogram_rendering() {
        let mut sink = TextSink::new();
        sink.push(MetricRecord {
            descriptor: RecordDescriptor::new("size", "", vec![]),
            label_values: vec![],
            payload: RecordPayload::Histogram {
                count: 6,
                sum: 300.0,
                buckets: vec![(100.0, 5), (f64::INFINITY, 6)],
            },
        });
        let text = sink.into_string();
        assert!(text.contains("# TYPE size histogram\n"));
        assert!(text.contains("size{le=\"100\"} 5\n"));
        assert!(text.contains("size{le=\"+Inf\"} 6\n"));
        assert!(text.contains("size_sum 300\n"));
        assert!(text.contains("size_count 6\n"));
    }
}
