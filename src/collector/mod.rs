//! Textfile metric snapshot collection pipeline.
//!
//! One collection cycle flows through a fixed sequence of stages:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   TextfileCollector                      │
//! │  scan dir ─> per-file parse/validate ─> dedup ─> pad ─>  │
//! │  convert ─> sink, then mtime bookkeeping + error flag    │
//! │                           │                              │
//! │                    ┌──────▼──────┐                       │
//! │                    │  FileSystem │ (trait)               │
//! │                    └──────┬──────┘                       │
//! └───────────────────────────┼──────────────────────────────┘
//!                 ┌───────────┴───────────┐
//!          ┌──────▼──────┐         ┌──────▼──────┐
//!          │   RealFs    │         │   MockFs    │
//!          │ (production)│         │  (testing)  │
//!          └─────────────┘         └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use promfile::collector::{MockFs, TextfileCollector};
//! use promfile::record::MetricRecord;
//!
//! let mut fs = MockFs::new();
//! fs.add_file("/textfiles/job.prom", "job_result 1\n");
//!
//! let collector = TextfileCollector::with_fs(fs, "/textfiles");
//! let mut records: Vec<MetricRecord> = Vec::new();
//! collector.collect(&mut records);
//! assert_eq!(records.len(), 3); // metric + mtime + scrape-error
//! ```

pub mod convert;
pub mod dedup;
pub mod mock;
pub mod textfile;
pub mod traits;

pub use mock::MockFs;
pub use textfile::{DEFAULT_DIRECTORY, TextfileCollector};
pub use traits::{FileSystem, RealFs};
