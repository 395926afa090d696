//! Label-schema normalization and conversion of parsed series into records.
//!
//! Before emission, every family's series are padded to a shared label-name
//! vector (the union of the family's label names within one file), then
//! converted into the record shape matching the family's declared kind.

use crate::expfmt::{MetricFamily, MetricKind, SampleValue, Series};
use crate::record::{MetricRecord, RecordDescriptor, RecordPayload, ValueKind};

/// Computes the union of label names across a family's series, in discovery
/// order (first series' labels first, then names newly introduced by later
/// series). Deterministic so descriptors stay stable within a cycle.
pub fn label_name_union(family: &MetricFamily) -> Vec<String> {
    let mut union: Vec<String> = Vec::new();
    for series in &family.series {
        for label in &series.labels {
            if !union.contains(&label.name) {
                union.push(label.name.clone());
            }
        }
    }
    union
}

/// Pads one series to the family's label-name union.
///
/// Returns `(label_names, label_values)` of equal length: the series' own
/// labels first in their original order, then every union name the series
/// lacks, paired with an empty-string value.
pub fn padded_labels(series: &Series, union: &[String]) -> (Vec<String>, Vec<String>) {
    let mut names: Vec<String> = Vec::with_capacity(union.len());
    let mut values: Vec<String> = Vec::with_capacity(union.len());
    for label in &series.labels {
        names.push(label.name.clone());
        values.push(label.value.clone());
    }
    for name in union {
        if !series.has_label(name) {
            names.push(name.clone());
            values.push(String::new());
        }
    }
    (names, values)
}

/// Converts one series into an emittable record according to its family's
/// declared kind.
///
/// Returns `None` when the kind cannot be emitted (declared `unknown`, or a
/// kind/value mismatch); the caller logs and drops the series.
pub fn convert_series(
    family: &MetricFamily,
    series: &Series,
    label_names: Vec<String>,
    label_values: Vec<String>,
) -> Option<MetricRecord> {
    let payload = match (family.kind, &series.value) {
        (MetricKind::Counter, SampleValue::Scalar(value)) => RecordPayload::Scalar {
            kind: ValueKind::Counter,
            value: *value,
        },
        (MetricKind::Gauge, SampleValue::Scalar(value)) => RecordPayload::Scalar {
            kind: ValueKind::Gauge,
            value: *value,
        },
        (MetricKind::Untyped, SampleValue::Scalar(value)) => RecordPayload::Scalar {
            kind: ValueKind::Untyped,
            value: *value,
        },
        (
            MetricKind::Summary,
            SampleValue::Summary {
                count,
                sum,
                quantiles,
            },
        ) => RecordPayload::Summary {
            count: *count,
            sum: *sum,
            quantiles: quantiles.clone(),
        },
        (
            MetricKind::Histogram,
            SampleValue::Histogram {
                count,
                sum,
                buckets,
            },
        ) => RecordPayload::Histogram {
            count: *count,
            sum: *sum,
            buckets: buckets.clone(),
        },
        _ => return None,
    };

    Some(MetricRecord {
        descriptor: RecordDescriptor::new(
            family.name.clone(),
            family.help.clone().unwrap_or_default(),
            label_names,
        ),
        label_values,
        payload,
    })
}
