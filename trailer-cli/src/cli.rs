use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

#[derive(Parser, Debug)]
#[command(
    name = "trailr",
    version,
    about = "Resolve scene page URLs to direct trailer video URLs",
    long_about = None
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, env = "TRAILR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Provider registry file, overrides the configured one
    #[arg(short, long, global = true, env = "TRAILR_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Per-request timeout in seconds, overrides the configured one
    #[arg(short, long, global = true)]
    pub timeout: Option<u64>,

    /// Keep credentials in memory only
    #[arg(long, global = true)]
    pub no_cache: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Json)]
    pub output: OutputFormat,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Resolve one or more scene URLs
    Resolve {
        /// Scene page URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Resolve newline-separated URLs from a file or stdin
    Batch {
        /// Input file, `-` for stdin
        #[arg(short, long, default_value = "-")]
        input: String,

        /// Maximum resolutions in flight
        #[arg(short = 'j', long)]
        max_concurrent: Option<usize>,
    },

    /// List configured providers
    Providers,

    /// Show or reset the configuration
    Config {
        /// Print the effective configuration
        #[arg(long)]
        show: bool,

        /// Overwrite the configuration file with defaults
        #[arg(long, conflicts_with = "show")]
        reset: bool,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Single-line JSON
    JsonCompact,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_resolve_with_global_flags() {
        let args = Args::try_parse_from([
            "trailr",
            "resolve",
            "https://www.example.com/videos/1",
            "https://www.example.com/videos/2",
            "--output",
            "json-compact",
            "-v",
        ])
        .unwrap();

        assert_eq!(args.output, OutputFormat::JsonCompact);
        assert!(args.verbose);
        match args.command {
            Commands::Resolve { urls } => assert_eq!(urls.len(), 2),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn batch_reads_stdin_by_default() {
        let args = Args::try_parse_from(["trailr", "batch"]).unwrap();
        match args.command {
            Commands::Batch {
                input,
                max_concurrent,
            } => {
                assert_eq!(input, "-");
                assert_eq!(max_concurrent, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn resolve_requires_a_url() {
        assert!(Args::try_parse_from(["trailr", "resolve"]).is_err());
    }
}
