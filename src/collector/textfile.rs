//! Textfile collector: folds externally produced metric snapshot files from
//! one directory into a single outgoing record stream.
//!
//! Invoked once per collection cycle. Each cycle does a fresh full scan of
//! the configured directory, processes every `.prom` file strictly in
//! sequence, and finishes by emitting per-file mtime bookkeeping plus one
//! scrape-error flag record. A cycle never fails outright: one malformed
//! producer file must not blind the consumer to every other file, so all
//! failures are folded into the scrape-error flag and diagnostics.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{debug, error, warn};

use crate::collector::convert::{convert_series, label_name_union, padded_labels};
use crate::collector::dedup::{SeenRegistry, friendly_series_string, series_hash};
use crate::collector::traits::{FileSystem, RealFs};
use crate::expfmt::{CarriageReturnFilter, MetricFamily, parse};
use crate::record::{MetricRecord, MetricSink, RecordDescriptor, RecordPayload, ValueKind};

/// File extension recognized as a metric snapshot input.
const INPUT_EXTENSION: &str = ".prom";

/// Default textfile input directory.
#[cfg(windows)]
pub const DEFAULT_DIRECTORY: &str = "C:\\Program Files\\promfile\\textfile_inputs";
#[cfg(not(windows))]
pub const DEFAULT_DIRECTORY: &str = "/var/lib/promfile/textfile";

const MTIME_METRIC: &str = "promfile_textfile_mtime_seconds";
const MTIME_HELP: &str = "Unixtime mtime of textfiles successfully read.";
const SCRAPE_ERROR_METRIC: &str = "promfile_textfile_scrape_error";
const SCRAPE_ERROR_HELP: &str =
    "1 if there was an error opening or reading a file, 0 otherwise";

/// Per-cycle mutable state, created fresh for every collect call and
/// discarded at cycle end. Threaded explicitly so concurrent cycles share
/// nothing.
#[derive(Default)]
struct CycleState {
    seen: SeenRegistry,
    /// File name -> mtime, only for files that parsed and validated.
    /// BTreeMap iteration gives the sorted bookkeeping order.
    mtimes: BTreeMap<String, SystemTime>,
    scrape_error: bool,
}

/// Collector exposing metrics read from snapshot files in one directory.
pub struct TextfileCollector<F: FileSystem> {
    fs: F,
    directory: String,
    /// Only set by tests to get predictable mtime output.
    fixed_mtime: Option<f64>,
}

impl TextfileCollector<RealFs> {
    /// Creates a collector reading the real filesystem.
    ///
    /// An empty directory string is the valid "no textfiles configured"
    /// state; such a collector emits only the scrape-error record.
    pub fn new(directory: impl Into<String>) -> Self {
        Self::with_fs(RealFs::new(), directory)
    }
}

impl<F: FileSystem> TextfileCollector<F> {
    /// Creates a collector over the given filesystem implementation.
    pub fn with_fs(fs: F, directory: impl Into<String>) -> Self {
        Self {
            fs,
            directory: directory.into(),
            fixed_mtime: None,
        }
    }

    /// Forces a fixed mtime value for all bookkeeping records.
    pub fn with_fixed_mtime(mut self, mtime: f64) -> Self {
        self.fixed_mtime = Some(mtime);
        self
    }

    /// Runs one collection cycle, pushing every emitted record to `sink`.
    ///
    /// Always completes; failures are reported through the scrape-error
    /// record and diagnostics, never by aborting the cycle.
    pub fn collect<S: MetricSink>(&self, sink: &mut S) {
        let mut state = CycleState::default();

        match self.fs.read_dir(Path::new(&self.directory)) {
            Ok(mut entries) => {
                entries.sort();
                for path in entries {
                    let is_input = path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| n.ends_with(INPUT_EXTENSION));
                    if !is_input {
                        continue;
                    }
                    self.process_file(&path, &mut state, sink);
                }
            }
            Err(e) => {
                // An empty configured path is not an error, it just means no
                // textfiles were configured.
                if !self.directory.is_empty() {
                    error!(
                        directory = %self.directory,
                        error = %e,
                        "failed to read textfile directory"
                    );
                    state.scrape_error = true;
                }
            }
        }

        self.export_mtimes(&state, sink);
        sink.push(MetricRecord {
            descriptor: RecordDescriptor::new(SCRAPE_ERROR_METRIC, SCRAPE_ERROR_HELP, Vec::new()),
            label_values: Vec::new(),
            payload: RecordPayload::Scalar {
                kind: ValueKind::Gauge,
                value: if state.scrape_error { 1.0 } else { 0.0 },
            },
        });
    }

    fn process_file<S: MetricSink>(&self, path: &Path, state: &mut CycleState, sink: &mut S) {
        debug!(file = %path.display(), "processing textfile");

        let mtime = match self.fs.mtime(path) {
            Ok(mtime) => mtime,
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to stat textfile");
                state.scrape_error = true;
                return;
            }
        };

        let reader = match self.fs.open(path) {
            Ok(reader) => reader,
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to open textfile");
                state.scrape_error = true;
                return;
            }
        };

        // The reader is consumed (and the handle dropped) inside parse on
        // every path, success or failure.
        let mut families = match parse(CarriageReturnFilter::new(reader)) {
            Ok(families) => families,
            Err(e) => {
                error!(file = %path.display(), error = %e, "failed to parse textfile");
                state.scrape_error = true;
                return;
            }
        };

        // Client-supplied timestamps are incompatible with the push model
        // this collector guarantees; they invalidate the whole file, not
        // just the offending series.
        for family in families.values() {
            for series in &family.series {
                if series.timestamp_ms.is_some() {
                    error!(
                        file = %path.display(),
                        metric = %family.name,
                        "textfile contains client-side timestamps, skipping entire file"
                    );
                    state.scrape_error = true;
                    return;
                }
            }
        }

        for family in families.values_mut() {
            if family.help.is_none() {
                family.help = Some(format!("Metric read from {}", path.display()));
            }
        }

        // Recorded only once the file has parsed and validated, so a failed
        // file does not look freshly read in the bookkeeping.
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            state.mtimes.insert(name.to_string(), mtime);
        }

        for family in families.values() {
            self.emit_family(family, path, state, sink);
        }
    }

    fn emit_family<S: MetricSink>(
        &self,
        family: &MetricFamily,
        path: &Path,
        state: &mut CycleState,
        sink: &mut S,
    ) {
        let union = label_name_union(family);
        for series in &family.series {
            let (label_names, label_values) = padded_labels(series, &union);

            let hash = series_hash(&family.name, &series.labels);
            if let Some(owner) = state.seen.observe(hash, path) {
                warn!(
                    metric = %friendly_series_string(&family.name, &label_names, &label_values),
                    file = %path.display(),
                    first_seen = %owner.display(),
                    "series already collected, skipping duplicate"
                );
                continue;
            }

            match convert_series(family, series, label_names, label_values) {
                Some(record) => sink.push(record),
                None => {
                    warn!(
                        metric = %family.name,
                        kind = %family.kind.as_str(),
                        file = %path.display(),
                        "unknown metric type, skipping series"
                    );
                }
            }
        }
    }

    fn export_mtimes<S: MetricSink>(&self, state: &CycleState, sink: &mut S) {
        for (name, mtime) in &state.mtimes {
            let seconds = match self.fixed_mtime {
                Some(fixed) => fixed,
                None => mtime
                    .duration_since(UNIX_EPOCH)
                    .map(|d| d.as_secs() as f64)
                    .unwrap_or(0.0),
            };
            sink.push(MetricRecord {
                descriptor: RecordDescriptor::new(
                    MTIME_METRIC,
                    MTIME_HELP,
                    vec!["file".to_string()],
                ),
                label_values: vec![name.clone()],
                payload: RecordPayload::Scalar {
                    kind: ValueKind::Gauge,
                    value: seconds,
                },
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::mock::MockFs;

    fn collect_records(fs: MockFs, directory: &str) -> Vec<MetricRecord> {
        let collector = TextfileCollector::with_fs(fs, directory);
        let mut records: Vec<MetricRecord> = Vec::new();
        collector.collect(&mut records);
        records
    }

    fn named<'a>(records: &'a [MetricRecord], name: &str) -> Vec<&'a MetricRecord> {
        records
            .iter()
            .filter(|r| r.descriptor.name == name)
            .collect()
    }

    fn scalar_value(record: &MetricRecord) -> f64 {
        match record.payload {
            RecordPayload::Scalar { value, .. } => value,
            ref other => panic!("expected scalar payload, got {:?}", other),
        }
    }

    fn scrape_error(records: &[MetricRecord]) -> f64 {
        let last = records.last().expect("no records emitted");
        assert_eq!(last.descriptor.name, SCRAPE_ERROR_METRIC);
        scalar_value(last)
    }

    #[test]
    fn test_empty_directory_emits_only_scrape_error() {
        let mut fs = MockFs::new();
        fs.add_dir("/textfiles");
        let records = collect_records(fs, "/textfiles");

        assert_eq!(records.len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
        assert!(records[0].descriptor.label_names.is_empty());
    }

    #[test]
    fn test_unconfigured_directory_is_not_an_error() {
        let records = collect_records(MockFs::new(), "");
        assert_eq!(records.len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_unreadable_directory_sets_scrape_error() {
        let records = collect_records(MockFs::new(), "/missing");
        assert_eq!(records.len(), 1);
        assert_eq!(scrape_error(&records), 1.0);
    }

    #[test]
    fn test_non_prom_files_ignored() {
        let mut fs = MockFs::new();
        fs.add_file("/t/notes.txt", "up 1\n");
        fs.add_file("/t/metrics.prom.bak", "up 1\n");
        let records = collect_records(fs, "/t");
        assert_eq!(records.len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_single_line_round_trip() {
        let mut fs = MockFs::new();
        fs.add_file_with_mtime("/t/a.prom", "my_metric{label=\"x\"} 1\n", 1700000000);
        let records = collect_records(fs, "/t");

        assert_eq!(records.len(), 3);

        let metric = &records[0];
        assert_eq!(metric.descriptor.name, "my_metric");
        assert_eq!(metric.descriptor.label_names, vec!["label"]);
        assert_eq!(metric.label_values, vec!["x"]);
        assert_eq!(
            metric.payload,
            RecordPayload::Scalar {
                kind: ValueKind::Untyped,
                value: 1.0
            }
        );

        let mtimes = named(&records, MTIME_METRIC);
        assert_eq!(mtimes.len(), 1);
        assert_eq!(mtimes[0].label_values, vec!["a.prom"]);
        assert_eq!(scalar_value(mtimes[0]), 1700000000.0);

        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_declared_types_convert() {
        let input = "\
# HELP reqs Requests.
# TYPE reqs counter
reqs 10
# TYPE temp gauge
temp 21.5
";
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", input);
        let records = collect_records(fs, "/t");

        let reqs = named(&records, "reqs");
        assert_eq!(
            reqs[0].payload,
            RecordPayload::Scalar {
                kind: ValueKind::Counter,
                value: 10.0
            }
        );
        assert_eq!(reqs[0].descriptor.help, "Requests.");

        let temp = named(&records, "temp");
        assert_eq!(
            temp[0].payload,
            RecordPayload::Scalar {
                kind: ValueKind::Gauge,
                value: 21.5
            }
        );
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_missing_help_is_synthesized_from_path() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "m 1\n");
        let records = collect_records(fs, "/t");
        assert_eq!(
            named(&records, "m")[0].descriptor.help,
            "Metric read from /t/a.prom"
        );
    }

    #[test]
    fn test_parse_failure_quarantines_file() {
        let mut fs = MockFs::new();
        fs.add_file("/t/bad.prom", "{{{not metrics\n");
        fs.add_file("/t/good.prom", "ok 1\n");
        let records = collect_records(fs, "/t");

        assert_eq!(scrape_error(&records), 1.0);
        assert_eq!(named(&records, "ok").len(), 1);

        // Only the good file gets an mtime record.
        let mtimes = named(&records, MTIME_METRIC);
        assert_eq!(mtimes.len(), 1);
        assert_eq!(mtimes[0].label_values, vec!["good.prom"]);
    }

    #[test]
    fn test_open_failure_sets_flag_and_continues() {
        let mut fs = MockFs::new();
        fs.add_unreadable_file("/t/secret.prom");
        fs.add_file("/t/open.prom", "ok 1\n");
        let records = collect_records(fs, "/t");

        assert_eq!(scrape_error(&records), 1.0);
        assert_eq!(named(&records, "ok").len(), 1);
        assert_eq!(named(&records, MTIME_METRIC).len(), 1);
    }

    #[test]
    fn test_timestamp_invalidates_entire_file() {
        // The second series is well-formed, but the file still yields
        // nothing.
        let input = "\
with_ts 5 1395066363000
fine 1
";
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", input);
        let records = collect_records(fs, "/t");

        assert_eq!(scrape_error(&records), 1.0);
        assert!(named(&records, "with_ts").is_empty());
        assert!(named(&records, "fine").is_empty());
        assert!(named(&records, MTIME_METRIC).is_empty());
    }

    #[test]
    fn test_duplicate_series_across_files() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "m{x=\"1\"} 1\n");
        // Same family, same labels modulo insertion order.
        fs.add_file("/t/b.prom", "m{x=\"1\"} 2\n");
        let records = collect_records(fs, "/t");

        let emitted = named(&records, "m");
        assert_eq!(emitted.len(), 1);
        assert_eq!(scalar_value(emitted[0]), 1.0);
        // Duplicates are a warning, not a scrape failure.
        assert_eq!(scrape_error(&records), 0.0);
        // Both files are still accounted as successfully read.
        assert_eq!(named(&records, MTIME_METRIC).len(), 2);
    }

    #[test]
    fn test_duplicate_detection_is_label_order_independent() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "m{a=\"1\",b=\"2\"} 1\n");
        fs.add_file("/t/b.prom", "m{b=\"2\",a=\"1\"} 9\n");
        let records = collect_records(fs, "/t");

        assert_eq!(named(&records, "m").len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_label_union_padding_within_family() {
        let input = "\
m{a=\"1\",b=\"2\"} 1
m{a=\"3\",c=\"4\"} 2
";
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", input);
        let records = collect_records(fs, "/t");

        let emitted = named(&records, "m");
        assert_eq!(emitted.len(), 2);
        for record in &emitted {
            assert_eq!(record.descriptor.label_names.len(), 3);
            assert_eq!(record.label_values.len(), 3);
        }
        assert_eq!(emitted[0].descriptor.label_names, vec!["a", "b", "c"]);
        assert_eq!(emitted[0].label_values, vec!["1", "2", ""]);
        assert_eq!(emitted[1].descriptor.label_names, vec!["a", "c", "b"]);
        assert_eq!(emitted[1].label_values, vec!["3", "4", ""]);
    }

    #[test]
    fn test_no_label_union_across_files() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "m{a=\"1\"} 1\n");
        fs.add_file("/t/b.prom", "m{b=\"2\"} 2\n");
        let records = collect_records(fs, "/t");

        let emitted = named(&records, "m");
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[0].descriptor.label_names, vec!["a"]);
        assert_eq!(emitted[1].descriptor.label_names, vec!["b"]);
    }

    #[test]
    fn test_mtime_records_sorted_by_file_name() {
        let mut fs = MockFs::new();
        fs.add_file_with_mtime("/t/zz.prom", "a 1\n", 300);
        fs.add_file_with_mtime("/t/aa.prom", "b 1\n", 100);
        fs.add_file_with_mtime("/t/mm.prom", "c 1\n", 200);
        let records = collect_records(fs, "/t");

        let mtimes = named(&records, MTIME_METRIC);
        assert_eq!(mtimes.len(), 3);
        assert_eq!(mtimes[0].label_values, vec!["aa.prom"]);
        assert_eq!(mtimes[1].label_values, vec!["mm.prom"]);
        assert_eq!(mtimes[2].label_values, vec!["zz.prom"]);
        assert_eq!(scalar_value(mtimes[0]), 100.0);
        assert_eq!(scalar_value(mtimes[1]), 200.0);
        assert_eq!(scalar_value(mtimes[2]), 300.0);
    }

    #[test]
    fn test_fixed_mtime_override() {
        let mut fs = MockFs::new();
        fs.add_file_with_mtime("/t/a.prom", "a 1\n", 1700000000);
        fs.add_file_with_mtime("/t/b.prom", "b 1\n", 1800000000);

        let collector = TextfileCollector::with_fs(fs, "/t").with_fixed_mtime(1.0);
        let mut records: Vec<MetricRecord> = Vec::new();
        collector.collect(&mut records);

        for record in named(&records, MTIME_METRIC) {
            assert_eq!(scalar_value(record), 1.0);
        }
    }

    #[test]
    fn test_unknown_type_series_dropped_without_flag() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "# TYPE mystery unknown\nmystery 3\nok 1\n");
        let records = collect_records(fs, "/t");

        assert!(named(&records, "mystery").is_empty());
        assert_eq!(named(&records, "ok").len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
        // The file itself still counts as successfully read.
        assert_eq!(named(&records, MTIME_METRIC).len(), 1);
    }

    #[test]
    fn test_summary_and_histogram_emission() {
        let input = "\
# TYPE lat summary
lat{quantile=\"0.5\"} 2
lat{quantile=\"0.9\"} 5
lat_sum 100
lat_count 20
# TYPE sz histogram
sz_bucket{le=\"10\"} 1
sz_bucket{le=\"+Inf\"} 3
sz_sum 25
sz_count 3
";
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", input);
        let records = collect_records(fs, "/t");

        let lat = named(&records, "lat");
        assert_eq!(lat.len(), 1);
        assert_eq!(
            lat[0].payload,
            RecordPayload::Summary {
                count: 20,
                sum: 100.0,
                quantiles: vec![(0.5, 2.0), (0.9, 5.0)],
            }
        );

        let sz = named(&records, "sz");
        assert_eq!(sz.len(), 1);
        assert_eq!(
            sz[0].payload,
            RecordPayload::Histogram {
                count: 3,
                sum: 25.0,
                buckets: vec![(10.0, 1), (f64::INFINITY, 3)],
            }
        );
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_carriage_returns_do_not_change_outcome() {
        let lf = "# TYPE m gauge\nm{a=\"1\"} 4\n";
        let crlf = "# TYPE m gauge\r\nm{a=\"1\"} 4\r\n";

        let mut fs_lf = MockFs::new();
        fs_lf.add_file("/t/a.prom", lf);
        let mut fs_crlf = MockFs::new();
        fs_crlf.add_file("/t/a.prom", crlf);

        let from_lf = collect_records(fs_lf, "/t");
        let from_crlf = collect_records(fs_crlf, "/t");
        assert_eq!(from_lf, from_crlf);
    }

    #[test]
    fn test_file_with_only_comments_counts_as_read() {
        let mut fs = MockFs::new();
        fs.add_file("/t/a.prom", "# nothing to see here\n");
        let records = collect_records(fs, "/t");

        assert_eq!(named(&records, MTIME_METRIC).len(), 1);
        assert_eq!(scrape_error(&records), 0.0);
    }

    #[test]
    fn test_real_fs_round_trip() {
        use std::io::Write as _;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("real.prom");
        let mut file = std::fs::File::create(&path).unwrap();
        // CRLF line endings on purpose.
        file.write_all(b"# TYPE real_metric gauge\r\nreal_metric{src=\"disk\"} 42\r\n")
            .unwrap();
        drop(file);

        let collector = TextfileCollector::new(dir.path().to_str().unwrap());
        let mut records: Vec<MetricRecord> = Vec::new();
        collector.collect(&mut records);

        let emitted = named(&records, "real_metric");
        assert_eq!(emitted.len(), 1);
        assert_eq!(scalar_value(emitted[0]), 42.0);
        assert_eq!(emitted[0].label_values, vec!["disk"]);

        let mtimes = named(&records, MTIME_METRIC);
        assert_eq!(mtimes.len(), 1);
        assert_eq!(mtimes[0].label_values, vec!["real.prom"]);
        assert!(scalar_value(mtimes[0]) > 0.0);
        // Whole seconds only.
        assert_eq!(scalar_value(mtimes[0]).fract(), 0.0);

        assert_eq!(scrape_error(&records), 0.0);
    }
}
