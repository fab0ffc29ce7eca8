mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::process;

use anyhow::Context;
use clap::Parser;
use tracing::{Level, error};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use crate::{
    cli::{Args, Commands, OutputFormat},
    commands::CommandExecutor,
    config::AppConfig,
};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let output_format = args.output;

    if let Err(e) = run(args).await {
        error!("Application error: {e:#}");

        let error_json = serde_json::json!({
            "status": "error",
            "message": format!("{e:#}"),
        });
        let rendered = match output_format {
            OutputFormat::Json => serde_json::to_string_pretty(&error_json),
            OutputFormat::JsonCompact => serde_json::to_string(&error_json),
        };
        match rendered {
            Ok(rendered) => println!("{rendered}"),
            Err(_) => eprintln!("Error: {e:#}"),
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    init_logging(args.verbose, args.quiet)?;

    if let Commands::Completions { shell } = args.command {
        use clap::CommandFactory;
        use clap_complete::generate;

        let mut cmd = Args::command();
        let bin_name = cmd.get_name().to_string();
        generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
        return Ok(());
    }

    // Reset runs before loading so it can replace a broken file.
    if let Some(path) = reset_config(&args)? {
        eprintln!("Configuration reset to defaults at {}", path.display());
        return Ok(());
    }

    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }

    match args.command {
        Commands::Config { show, .. } => {
            if show {
                println!("{}", config.show()?);
            } else {
                eprintln!(
                    "Use --show to display current configuration or --reset to reset to defaults"
                );
            }
            return Ok(());
        }
        Commands::Completions { .. } => return Ok(()),
        _ => {}
    }

    let executor = CommandExecutor::new(config, args.output)
        .with_registry(args.registry)
        .with_no_cache(args.no_cache);

    match args.command {
        Commands::Resolve { urls } => executor.resolve_urls(urls).await?,
        Commands::Batch {
            input,
            max_concurrent,
        } => executor
            .batch(&input, max_concurrent)
            .await
            .with_context(|| format!("batch input {input}"))?,
        Commands::Providers => executor.list_providers()?,
        Commands::Config { .. } | Commands::Completions { .. } => {}
    }

    Ok(())
}

fn reset_config(args: &Args) -> anyhow::Result<Option<std::path::PathBuf>> {
    match args.command {
        Commands::Config { reset: true, .. } => Ok(Some(
            AppConfig::reset(args.config.as_deref()).context("resetting configuration")?,
        )),
        _ => Ok(None),
    }
}

fn init_logging(verbose: bool, quiet: bool) -> anyhow::Result<()> {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env().add_directive(Level::INFO.into())
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_level(verbose),
        )
        .try_init()
        .context("initialising logging")?;
    Ok(())
}
