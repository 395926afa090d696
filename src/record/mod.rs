//! Emission-boundary types: the records the collector pushes downstream.
//!
//! A [`MetricRecord`] pairs a descriptor (name, help, ordered label names)
//! with a type-specific payload and an ordered label-value list. The
//! label-value order always matches the descriptor's label-name order; the
//! collector guarantees this pairing when it builds records.

pub mod encode;

pub use encode::TextSink;

/// Value semantics of a scalar record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Counter,
    Gauge,
    Untyped,
}

impl ValueKind {
    /// The exposition-format `# TYPE` token for this kind.
    pub fn type_str(&self) -> &'static str {
        match self {
            ValueKind::Counter => "counter",
            ValueKind::Gauge => "gauge",
            ValueKind::Untyped => "untyped",
        }
    }
}

/// Identity and schema of an emitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordDescriptor {
    pub name: String,
    pub help: String,
    pub label_names: Vec<String>,
}

impl RecordDescriptor {
    pub fn new(
        name: impl Into<String>,
        help: impl Into<String>,
        label_names: Vec<String>,
    ) -> Self {
        Self {
            name: name.into(),
            help: help.into(),
            label_names,
        }
    }
}

/// Type-specific payload of an emitted record.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordPayload {
    Scalar {
        kind: ValueKind,
        value: f64,
    },
    Summary {
        count: u64,
        sum: f64,
        quantiles: Vec<(f64, f64)>,
    },
    Histogram {
        count: u64,
        sum: f64,
        buckets: Vec<(f64, u64)>,
    },
}

/// One metric pushed to the emission sink.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub descriptor: RecordDescriptor,
    /// Ordered to match `descriptor.label_names` exactly.
    pub label_values: Vec<String>,
    pub payload: RecordPayload,
}

impl MetricRecord {
    /// The `# TYPE` token for this record.
    pub fn type_str(&self) -> &'static str {
        match &self.payload {
            RecordPayload::Scalar { kind, .. } => kind.type_str(),
            RecordPayload::Summary { .. } => "summary",
            RecordPayload::Histogram { .. } => "histogram",
        }
    }
}

/// Destination for constructed metric records.
///
/// The collector only ever pushes; it never reads back or reorders what a
/// sink already received.
pub trait MetricSink {
    fn push(&mut self, record: MetricRecord);
}

impl MetricSink for Vec<MetricRecord> {
    fn push(&mut self, record: MetricRecord) {
        Vec::push(self, record);
    }
}
