//! promfile - textfile metric snapshot dump tool.
//!
//! Runs one collection cycle over the configured textfile directory and
//! prints the resulting metrics stream in the text exposition format to
//! stdout. Failures never abort the cycle; they surface through the
//! `promfile_textfile_scrape_error` record and log diagnostics.

use clap::Parser;
use tracing::{Level, debug};
use tracing_subscriber::EnvFilter;

use promfile::collector::{DEFAULT_DIRECTORY, TextfileCollector};
use promfile::record::TextSink;

/// Textfile metric snapshot collector.
#[derive(Parser)]
#[command(name = "promfile", about = "Textfile metric snapshot collector", version)]
struct Args {
    /// Directory to read .prom metric snapshot files from.
    /// An empty value means no textfiles are configured.
    #[arg(short, long, default_value = DEFAULT_DIRECTORY)]
    directory: String,

    /// Increase logging verbosity (-v for debug, -vv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("promfile={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    debug!(directory = %args.directory, "starting collection cycle");

    let collector = TextfileCollector::new(&args.directory);
    let mut sink = TextSink::new();
    collector.collect(&mut sink);

    print!("{}", sink.as_str());
}
