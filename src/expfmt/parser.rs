//! Parser for the line-oriented text exposition format.
//!
//! Converts raw snapshot bytes into [`MetricFamily`] structures keyed by
//! family name. Pure line-oriented parsing, designed to be testable with
//! string inputs.
//!
//! Format summary:
//! - `# HELP <name> <text>` sets a family's help string (`\\` and `\n` escapes)
//! - `# TYPE <name> <kind>` declares a family's kind; must precede samples
//! - any other `#` line is a comment and is ignored
//! - `name[{label="value",...}] value [timestamp_ms]` is a sample
//!
//! Summary families group `name{quantile="..."}`, `name_sum` and
//! `name_count` lines into one series per label set (excluding `quantile`);
//! histogram families do the same with `name_bucket{le="..."}`.

use std::collections::{BTreeMap, HashMap};
use std::io::Read;

use super::model::{Label, MetricFamily, MetricKind, SampleValue, Series};

/// Error raised for unparseable input, carrying the 1-based line number
/// (0 when the input could not be read at all).
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

impl ParseError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: {}", self.line, self.message)
        } else {
            write!(f, "{}", self.message)
        }
    }
}

impl std::error::Error for ParseError {}

/// Parses an exposition-format byte stream into families keyed by name.
///
/// One error is surfaced for any unparseable input; no partial results are
/// returned. Input must be valid UTF-8.
pub fn parse<R: Read>(mut reader: R) -> Result<BTreeMap<String, MetricFamily>, ParseError> {
    let mut input = String::new();
    reader
        .read_to_string(&mut input)
        .map_err(|e| ParseError::new(0, format!("reading input: {}", e)))?;
    parse_text(&input)
}

/// Parses exposition-format text content. See [`parse`].
pub fn parse_text(input: &str) -> Result<BTreeMap<String, MetricFamily>, ParseError> {
    let mut parser = Parser::default();
    for (idx, line) in input.lines().enumerate() {
        parser.line(idx + 1, line)?;
    }
    Ok(parser.finish())
}

/// Which component of a summary/histogram family a suffixed sample feeds.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Part {
    Sum,
    Count,
    Bucket,
}

/// A single parsed sample line, before family routing.
struct RawSample {
    name: String,
    labels: Vec<Label>,
    value: f64,
    timestamp_ms: Option<i64>,
}

/// Per-family accumulation state.
struct FamilyState {
    family: MetricFamily,
    saw_type: bool,
    saw_help: bool,
    saw_samples: bool,
    /// Label-set key -> series index, for summary/histogram grouping.
    groups: HashMap<String, usize>,
}

impl FamilyState {
    fn new(name: &str) -> Self {
        Self {
            family: MetricFamily::new(name, MetricKind::Untyped),
            saw_type: false,
            saw_help: false,
            saw_samples: false,
            groups: HashMap::new(),
        }
    }

    /// Appends a stand-alone scalar series (counter/gauge/untyped/unknown).
    fn attach_scalar(&mut self, sample: RawSample) {
        self.saw_samples = true;
        self.family.series.push(Series {
            labels: sample.labels,
            value: SampleValue::Scalar(sample.value),
            timestamp_ms: sample.timestamp_ms,
        });
    }

    /// Merges a `name{quantile="..."}` line into its summary series.
    fn attach_quantile(&mut self, lineno: usize, mut sample: RawSample) -> Result<(), ParseError> {
        self.saw_samples = true;
        let quantile = take_float_label(lineno, &mut sample.labels, "quantile")?;
        let idx = self.group_index(&sample);
        let series = &mut self.family.series[idx];
        if sample.timestamp_ms.is_some() {
            series.timestamp_ms = sample.timestamp_ms;
        }
        if let SampleValue::Summary { quantiles, .. } = &mut series.value {
            quantiles.push((quantile, sample.value));
        }
        Ok(())
    }

    /// Merges a `_sum`/`_count`/`_bucket` line into its grouped series.
    fn attach_part(
        &mut self,
        lineno: usize,
        part: Part,
        mut sample: RawSample,
    ) -> Result<(), ParseError> {
        self.saw_samples = true;
        let bound = if part == Part::Bucket {
            Some(take_float_label(lineno, &mut sample.labels, "le")?)
        } else {
            None
        };
        let idx = self.group_index(&sample);
        let series = &mut self.family.series[idx];
        if sample.timestamp_ms.is_some() {
            series.timestamp_ms = sample.timestamp_ms;
        }
        match (&mut series.value, part) {
            (
                SampleValue::Summary { sum, .. } | SampleValue::Histogram { sum, .. },
                Part::Sum,
            ) => *sum = sample.value,
            (
                SampleValue::Summary { count, .. } | SampleValue::Histogram { count, .. },
                Part::Count,
            ) => *count = sample.value as u64,
            (SampleValue::Histogram { buckets, .. }, Part::Bucket) => {
                // `bound` is always present for Part::Bucket
                buckets.push((bound.unwrap_or(f64::INFINITY), sample.value as u64));
            }
            _ => {}
        }
        Ok(())
    }

    /// Finds or creates the series for this sample's label set (with the
    /// grouping label already removed). First-seen label order is kept.
    fn group_index(&mut self, sample: &RawSample) -> usize {
        let mut pairs: Vec<(&str, &str)> = sample
            .labels
            .iter()
            .map(|l| (l.name.as_str(), l.value.as_str()))
            .collect();
        pairs.sort();
        let key: String = pairs
            .iter()
            .map(|(n, v)| format!("{}\u{1}{}\u{2}", n, v))
            .collect();

        if let Some(&idx) = self.groups.get(&key) {
            return idx;
        }
        let empty = match self.family.kind {
            MetricKind::Histogram => SampleValue::Histogram {
                count: 0,
                sum: 0.0,
                buckets: Vec::new(),
            },
            _ => SampleValue::Summary {
                count: 0,
                sum: 0.0,
                quantiles: Vec::new(),
            },
        };
        self.family.series.push(Series {
            labels: sample.labels.clone(),
            value: empty,
            timestamp_ms: None,
        });
        let idx = self.family.series.len() - 1;
        self.groups.insert(key, idx);
        idx
    }
}

#[derive(Default)]
struct Parser {
    families: BTreeMap<String, FamilyState>,
}

impl Parser {
    fn line(&mut self, lineno: usize, line: &str) -> Result<(), ParseError> {
        let line = line.trim_start();
        if line.is_empty() {
            return Ok(());
        }
        if let Some(rest) = line.strip_prefix('#') {
            return self.comment_line(lineno, rest);
        }
        let sample = parse_sample(lineno, line)?;
        self.attach_sample(lineno, sample)
    }

    fn comment_line(&mut self, lineno: usize, rest: &str) -> Result<(), ParseError> {
        // Only "# HELP" and "# TYPE" carry meaning; everything else after a
        // '#' is a comment.
        let Some(rest) = rest.strip_prefix(' ') else {
            return Ok(());
        };
        let (keyword, remainder) = match rest.split_once(' ') {
            Some((k, r)) => (k, r),
            None => (rest, ""),
        };
        match keyword {
            "HELP" => self.help_line(lineno, remainder),
            "TYPE" => self.type_line(lineno, remainder),
            _ => Ok(()),
        }
    }

    fn help_line(&mut self, lineno: usize, rest: &str) -> Result<(), ParseError> {
        let rest = rest.trim_start();
        let (name, help_raw) = match rest.split_once(' ') {
            Some((n, h)) => (n, h),
            None => (rest, ""),
        };
        validate_metric_name(lineno, name)?;
        let help = unescape_help(lineno, help_raw)?;
        let state = self.family_entry(name);
        if state.saw_help {
            return Err(ParseError::new(
                lineno,
                format!("second HELP line for metric family {:?}", name),
            ));
        }
        state.saw_help = true;
        state.family.help = Some(help);
        Ok(())
    }

    fn type_line(&mut self, lineno: usize, rest: &str) -> Result<(), ParseError> {
        let mut tokens = rest.split_whitespace();
        let name = tokens.next().unwrap_or("");
        let kind_token = tokens.next().unwrap_or("");
        if tokens.next().is_some() {
            return Err(ParseError::new(lineno, "unexpected text after TYPE line"));
        }
        validate_metric_name(lineno, name)?;
        let kind = match kind_token {
            "counter" => MetricKind::Counter,
            "gauge" => MetricKind::Gauge,
            "untyped" => MetricKind::Untyped,
            "summary" => MetricKind::Summary,
            "histogram" => MetricKind::Histogram,
            "unknown" => MetricKind::Unknown,
            other => {
                return Err(ParseError::new(
                    lineno,
                    format!("unknown metric type {:?}", other),
                ));
            }
        };
        let state = self.family_entry(name);
        if state.saw_type {
            return Err(ParseError::new(
                lineno,
                format!("second TYPE line for metric family {:?}", name),
            ));
        }
        if state.saw_samples {
            return Err(ParseError::new(
                lineno,
                format!(
                    "TYPE line for metric family {:?} must appear before its samples",
                    name
                ),
            ));
        }
        state.saw_type = true;
        state.family.kind = kind;
        Ok(())
    }

    fn attach_sample(&mut self, lineno: usize, sample: RawSample) -> Result<(), ParseError> {
        // Exact family name first: scalar kinds and summary quantile lines.
        if let Some(state) = self.families.get_mut(&sample.name) {
            return match state.family.kind {
                MetricKind::Summary => state.attach_quantile(lineno, sample),
                MetricKind::Histogram => Err(ParseError::new(
                    lineno,
                    format!(
                        "histogram {:?} samples must use the _bucket, _sum or _count suffix",
                        sample.name
                    ),
                )),
                _ => {
                    state.attach_scalar(sample);
                    Ok(())
                }
            };
        }
        // Suffixed samples feed a previously declared summary/histogram.
        if let Some((base, part)) = suffix_route(&sample.name) {
            if let Some(state) = self.families.get_mut(&base) {
                let routed = match (state.family.kind, part) {
                    (MetricKind::Summary, Part::Sum | Part::Count) => true,
                    (MetricKind::Histogram, _) => true,
                    _ => false,
                };
                if routed {
                    return state.attach_part(lineno, part, sample);
                }
            }
        }
        // Otherwise a fresh implicitly-untyped family named after the sample.
        let state = self.family_entry(&sample.name);
        state.attach_scalar(sample);
        Ok(())
    }

    fn family_entry(&mut self, name: &str) -> &mut FamilyState {
        self.families
            .entry(name.to_string())
            .or_insert_with(|| FamilyState::new(name))
    }

    fn finish(self) -> BTreeMap<String, MetricFamily> {
        self.families
            .into_iter()
            .map(|(name, state)| (name, state.family))
            .collect()
    }
}

fn suffix_route(name: &str) -> Option<(String, Part)> {
    if let Some(base) = name.strip_suffix("_sum") {
        Some((base.to_string(), Part::Sum))
    } else if let Some(base) = name.strip_suffix("_count") {
        Some((base.to_string(), Part::Count))
    } else if let Some(base) = name.strip_suffix("_bucket") {
        Some((base.to_string(), Part::Bucket))
    } else {
        None
    }
}

/// Removes the named label from the set and parses its value as a float.
/// Used for the `quantile` and `le` grouping labels.
fn take_float_label(
    lineno: usize,
    labels: &mut Vec<Label>,
    name: &str,
) -> Result<f64, ParseError> {
    let idx = labels
        .iter()
        .position(|l| l.name == name)
        .ok_or_else(|| ParseError::new(lineno, format!("expected {:?} label", name)))?;
    let label = labels.remove(idx);
    label.value.parse::<f64>().map_err(|_| {
        ParseError::new(
            lineno,
            format!(
                "expected float as {:?} label value, got {:?}",
                name, label.value
            ),
        )
    })
}

fn validate_metric_name(lineno: usize, name: &str) -> Result<(), ParseError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(c) => {
            (c.is_ascii_alphabetic() || c == '_' || c == ':')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ParseError::new(
            lineno,
            format!("invalid metric name {:?}", name),
        ))
    }
}

fn unescape_help(lineno: usize, raw: &str) -> Result<String, ParseError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some(other) => {
                return Err(ParseError::new(
                    lineno,
                    format!("invalid escape sequence \\{} in help text", other),
                ));
            }
            None => {
                return Err(ParseError::new(
                    lineno,
                    "trailing backslash in help text",
                ));
            }
        }
    }
    Ok(out)
}

/// Character cursor over one sample line.
struct Cursor<'a> {
    s: &'a str,
    pos: usize,
    line: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<char> {
        self.s[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_spaces(&mut self) {
        while matches!(self.peek(), Some(' ') | Some('\t')) {
            self.pos += 1;
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.line, message)
    }

    fn take_metric_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {
                self.pos += 1;
            }
            _ => return Err(self.err("invalid metric name start")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.s[start..self.pos].to_string())
    }

    fn take_label_name(&mut self) -> Result<String, ParseError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.pos += 1;
            }
            _ => return Err(self.err("invalid label name start")),
        }
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        Ok(self.s[start..self.pos].to_string())
    }

    /// Reads a quoted label value; the opening quote is already consumed.
    fn take_quoted_value(&mut self) -> Result<String, ParseError> {
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.err("unterminated label value")),
                Some('"') => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('\\') => out.push('\\'),
                    Some('"') => out.push('"'),
                    Some('n') => out.push('\n'),
                    Some(other) => {
                        return Err(
                            self.err(format!("invalid escape sequence \\{} in label value", other))
                        );
                    }
                    None => return Err(self.err("unterminated label value")),
                },
                Some(c) => out.push(c),
            }
        }
    }
}

fn parse_sample(lineno: usize, line: &str) -> Result<RawSample, ParseError> {
    let mut cur = Cursor {
        s: line,
        pos: 0,
        line: lineno,
    };

    let name = cur.take_metric_name()?;
    cur.skip_spaces();

    let mut labels: Vec<Label> = Vec::new();
    if cur.peek() == Some('{') {
        cur.bump();
        loop {
            cur.skip_spaces();
            match cur.peek() {
                Some('}') => {
                    cur.bump();
                    break;
                }
                None => return Err(cur.err("unexpected end of line in label set")),
                _ => {}
            }
            let label_name = cur.take_label_name()?;
            cur.skip_spaces();
            if cur.bump() != Some('=') {
                return Err(cur.err("expected '=' after label name"));
            }
            cur.skip_spaces();
            if cur.bump() != Some('"') {
                return Err(cur.err("expected '\"' to start label value"));
            }
            let label_value = cur.take_quoted_value()?;
            if labels.iter().any(|l| l.name == label_name) {
                return Err(cur.err(format!("duplicate label name {:?}", label_name)));
            }
            labels.push(Label::new(label_name, label_value));
            cur.skip_spaces();
            match cur.bump() {
                Some(',') => continue,
                Some('}') => break,
                _ => return Err(cur.err("expected ',' or '}' after label value")),
            }
        }
    }

    cur.skip_spaces();
    let mut tokens = line[cur.pos..].split_whitespace();
    let value_token = tokens.next().ok_or_else(|| cur.err("missing sample value"))?;
    let value = value_token
        .parse::<f64>()
        .map_err(|_| cur.err(format!("invalid sample value {:?}", value_token)))?;
    let timestamp_ms = match tokens.next() {
        Some(token) => Some(
            token
                .parse::<i64>()
                .map_err(|_| cur.err(format!("invalid timestamp {:?}", token)))?,
        ),
        None => None,
    };
    if tokens.next().is_some() {
        return Err(cur.err("unexpected text after timestamp"));
    }

    Ok(RawSample {
        name,
        labels,
        value,
        timestamp_ms,
    })
}
