//! promfile - republishes directory-dropped metric snapshot files as one
//! metrics stream.
//!
//! Producers (cron jobs, scripts, sidecars) periodically write `.prom` files
//! in the text exposition format into a directory; each collection cycle
//! scans that directory, parses and validates every file, deduplicates the
//! contained series, normalizes label schemas, and pushes the result to an
//! emission sink together with per-file mtime bookkeeping and a scrape-error
//! flag.
//!
//! Provides:
//! - `collector` - directory scan, validation, dedup, label normalization
//! - `expfmt` - exposition format model, parser, carriage-return filtering
//! - `record` - emission-boundary records, sink trait, text encoding

pub mod collector;
pub mod expfmt;
pub mod record;
