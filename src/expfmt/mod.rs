//! Text exposition format support.
//!
//! This module provides everything needed to turn raw snapshot-file bytes
//! into structured metric families:
//! - `model` - [`MetricFamily`], [`Series`] and friends
//! - `parser` - the line-oriented text format parser
//! - `filter` - a `Read` decorator stripping carriage returns, so CRLF and
//!   LF inputs parse identically

pub mod filter;
pub mod model;
pub mod parser;

pub use filter::CarriageReturnFilter;
pub use model::{Label, MetricFamily, MetricKind, SampleValue, Series};
pub use parser::{ParseError, parse, parse_text};
