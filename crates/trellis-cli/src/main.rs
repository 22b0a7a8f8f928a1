//! Trellis CLI - Read and check `broccoli-viz.*.json` files written by a build.

use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::inspect::InspectArgs;
use commands::validate::ValidateArgs;

/// Overrides the `-v` derived filter when set.
const LOG_ENV: &str = "TRELLIS_LOG";

/// Crates whose events the `-v` flag controls.
const LOG_TARGETS: [&str; 3] = ["trellis", "trellis_core", "trellis_observe"];

/// Inspect build instrumentation output
#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output format
    #[arg(short = 'f', long, global = true, default_value = "human")]
    pub format: OutputFormat,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only report failures through the exit code
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

impl Cli {
    /// Log level for the crate targets.
    fn log_level(&self) -> &'static str {
        if self.quiet {
            return "off";
        }
        match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    }
}

/// Output format options.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable output
    #[default]
    Human,
    /// JSON output
    Json,
    /// Compact JSON (single line)
    JsonCompact,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Print a file's summary and its slowest nodes
    Inspect(InspectArgs),
    /// Check a file's node list is a well-formed sub-tree
    Validate(ValidateArgs),
}

impl Commands {
    /// Run the command, writing its result to stdout.
    pub fn execute(self, format: OutputFormat) -> anyhow::Result<()> {
        match self {
            Commands::Inspect(args) => commands::inspect::execute(args, format),
            Commands::Validate(args) => commands::validate::execute(args, format),
        }
    }
}

fn log_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| {
        let directives: Vec<String> = LOG_TARGETS
            .iter()
            .map(|target| format!("{}={}", target, level))
            .collect();
        EnvFilter::new(directives.join(","))
    })
}

/// Logs go to stderr so JSON output on stdout stays parseable.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_level());

    let quiet = cli.quiet;
    match cli.command.execute(cli.format) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if !quiet {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_inspect() {
        let cli = Cli::try_parse_from([
            "trellis",
            "inspect",
            "broccoli-viz.build.0.json",
            "--top",
            "3",
            "-f",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Inspect(args) => {
                assert_eq!(args.file.to_str(), Some("broccoli-viz.build.0.json"));
                assert_eq!(args.top, 3);
            }
            Commands::Validate(_) => panic!("expected inspect"),
        }
    }

    #[test]
    fn test_parse_validate_defaults() {
        let cli = Cli::try_parse_from(["trellis", "validate", "broccoli-viz.init.json"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Human);
        assert_eq!(cli.log_level(), "warn");
        assert!(matches!(cli.command, Commands::Validate(_)));
    }

    #[test]
    fn test_file_is_required() {
        assert!(Cli::try_parse_from(["trellis", "validate"]).is_err());
        assert!(Cli::try_parse_from(["trellis", "inspect", "-f", "json-compact"]).is_err());
    }

    #[test]
    fn test_log_level() {
        let cli = Cli::try_parse_from(["trellis", "-vv", "validate", "a.json"]).unwrap();
        assert_eq!(cli.log_level(), "debug");

        let cli = Cli::try_parse_from(["trellis", "validate", "a.json", "-q"]).unwrap();
        assert_eq!(cli.log_level(), "off");

        assert!(Cli::try_parse_from(["trellis", "-v", "-q", "validate", "a.json"]).is_err());
    }
}
