mod args;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use args::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    let filter = match cli.verbose {
        0 => "ezmp3=info,ezmp3_core=info",
        1 => "ezmp3=debug,ezmp3_core=debug",
        2 => "ezmp3=trace,ezmp3_core=trace",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Some(Commands::Extract { url, options }) => {
            commands::extract::run(&url, &options, cli.config.as_deref()).await
        }
        Some(Commands::Convert {
            input,
            output,
            backend,
        }) => commands::convert::run(&input, output.as_deref(), &backend, cli.config.as_deref()).await,
        Some(Commands::Doctor) => commands::doctor::run(cli.config.as_deref()).await,
        Some(Commands::Config) => commands::config::run(cli.config.as_deref()).await,
        None => {
            // If URL provided directly, treat as extract command
            if let Some(url) = cli.url {
                let options = args::ExtractOptions {
                    output: cli.output,
                    keep_temp: cli.keep_temp,
                };
                commands::extract::run(&url, &options, cli.config.as_deref()).await
            } else {
                use clap::CommandFactory;
                Cli::command().print_help()?;
                println!();
                Ok(())
            }
        }
    }
}
