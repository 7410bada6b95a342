use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Environment variable holding a `tracing` filter directive.
pub const LOG_ENV: &str = "NEST_LOG";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase log verbosity (-v: debug, -vv: trace). Overrides NEST_LOG.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Create a nest from files and directories.
    #[command(alias = "c")]
    Create {
        /// One or more input files or directories to add to the nest.
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// The path of the nest to write (e.g., app.zip).
        #[arg(short, long)]
        output: PathBuf,

        /// In-archive directory to store every input under. Defaults to the archive root.
        #[arg(long, value_name = "NEST_PATH")]
        under: Option<String>,
    },

    /// Expand a nest into a directory.
    #[command(alias = "x")]
    Expand {
        /// The nest to expand.
        #[arg(required = true)]
        archive: PathBuf,

        /// The directory to expand into. Created if missing.
        #[arg(short, long)]
        output: PathBuf,

        /// Redirect an in-archive path (file or directory) to another expansion path.
        /// May be repeated.
        #[arg(long = "link", value_name = "NEST_PATH=EXPAND_PATH", value_parser = parse_link)]
        links: Vec<(String, String)>,
    },

    /// List the entries and recorded locations of a nest.
    #[command(alias = "l")]
    List {
        /// The nest to list.
        #[arg(required = true)]
        archive: PathBuf,

        /// Print the listing as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Parses a `NEST_PATH=EXPAND_PATH` pair.
pub fn parse_link(value: &str) -> Result<(String, String), String> {
    let (nest_path, expand_path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NEST_PATH=EXPAND_PATH, got '{value}'"))?;
    if nest_path.is_empty() || expand_path.is_empty() {
        return Err(format!("both sides of '{value}' must be non-empty"));
    }
    Ok((nest_path.to_owned(), expand_path.to_owned()))
}

/// Log filter for a verbosity count; without `-v` the `NEST_LOG` variable
/// decides, falling back to warnings only.
pub fn log_filter(verbose: u8) -> EnvFilter {
    match verbose {
        0 => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("nest=debug"),
        _ => EnvFilter::new("nest=trace"),
    }
}

/// Installs the stderr log subscriber.
pub fn init_logging(verbose: u8) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Parses command-line arguments using `clap`.
///
/// Usage errors, `--help` and `--version` exit the process from here.
pub fn run() -> Result<Args, Box<dyn std::error::Error>> {
    Ok(Args::parse())
}
