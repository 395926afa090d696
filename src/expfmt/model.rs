//! Data model for parsed exposition-format metrics.
//!
//! A [`MetricFamily`] is a named group of [`Series`] sharing one kind and one
//! help string. Families are owned per source file; nothing in this module
//! merges families across files.

/// Metric kind declared by a `# TYPE` line (or `Untyped` when absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Untyped,
    Summary,
    Histogram,
    /// Declared as `unknown` in the input. Series of this kind are dropped
    /// at emission with a diagnostic.
    Unknown,
}

impl MetricKind {
    /// The exposition-format token for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Untyped => "untyped",
            MetricKind::Summary => "summary",
            MetricKind::Histogram => "histogram",
            MetricKind::Unknown => "unknown",
        }
    }
}

/// One name/value label pair.
///
/// Label order is preserved from the input; consumers depend on it for
/// descriptor stability within a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// The sampled value of one series.
///
/// Quantile and bucket maps are kept as ordered pair vectors because `f64`
/// keys have no total order usable in a `BTreeMap`.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleValue {
    /// Counter, gauge, untyped and unknown families carry a single float.
    Scalar(f64),
    /// Sample count, sample sum, and (quantile, value) pairs.
    Summary {
        count: u64,
        sum: f64,
        quantiles: Vec<(f64, f64)>,
    },
    /// Sample count, sample sum, and (upper bound, cumulative count) pairs.
    Histogram {
        count: u64,
        sum: f64,
        buckets: Vec<(f64, u64)>,
    },
}

/// One labeled instance of a family.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    /// Label pairs in input order. Names are unique within a series; the
    /// `quantile` and `le` grouping labels are never stored here.
    pub labels: Vec<Label>,
    pub value: SampleValue,
    /// Client-supplied timestamp in milliseconds. Presence invalidates the
    /// whole source file during collection.
    pub timestamp_ms: Option<i64>,
}

impl Series {
    /// Returns true if any label has the given name.
    pub fn has_label(&self, name: &str) -> bool {
        self.labels.iter().any(|l| l.name == name)
    }
}

/// A named group of series sharing kind and help metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricFamily {
    pub name: String,
    /// `None` until a `# HELP` line is seen; the collector synthesizes a
    /// help string referencing the source file before emission.
    pub help: Option<String>,
    pub kind: MetricKind,
    pub series: Vec<Series>,
}

impl MetricFamily {
    pub fn new(name: impl Into<String>, kind: MetricKind) -> Self {
        Self {
            name: name.into(),
            help: None,
            kind,
            series: Vec::new(),
        }
    }
}
