mod cli;

use clap::Parser;
use serde::Serialize;
use std::process;
use std::sync::Arc;
use tokio_stream::StreamExt;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use videohelp::downloader::{
    DirectoryOpener, Downloader, InfoFetcher, NoopDirectoryOpener, ProcessRunner, SystemDirectoryOpener,
    TokioProcessRunner, ToolManager,
};
use videohelp::{Config, Result};

use crate::cli::{Args, Commands};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    if let Err(e) = run(args).await {
        error!("{}", e);
        print_json(&serde_json::json!({ "error": e.to_string() }));
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;
    tracing::debug!(?config, "configuration loaded");

    let runner: Arc<dyn ProcessRunner> = Arc::new(TokioProcessRunner::new());

    match args.command {
        Commands::Info { url } => {
            let fetcher = InfoFetcher::new(runner, &config.ytdlp_path).with_timeout(config.info_timeout);
            print_json(&fetcher.fetch_info(&url).await?);
        }

        Commands::Formats { url } => {
            let fetcher = InfoFetcher::new(runner, &config.ytdlp_path).with_timeout(config.info_timeout);
            print!("{}", fetcher.list_formats(&url).await?);
        }

        Commands::Download { url } => {
            let tools = ToolManager::new(runner.clone(), &config.ytdlp_path, &config.ffmpeg_path);
            tools.check_ffmpeg().await?;

            let opener: Arc<dyn DirectoryOpener> = if config.open_directory {
                Arc::new(SystemDirectoryOpener::new())
            } else {
                Arc::new(NoopDirectoryOpener)
            };
            let downloader = Arc::new(
                Downloader::new(runner, opener)
                    .with_download_timeout(config.download_timeout)
                    .with_merge_timeout(config.download_timeout),
            );

            let (mut events, handle) = downloader.download_stream(config.request(url));
            while let Some(event) = events.next().await {
                print_json(&event);
            }
            // The terminal event has been printed already; only the exit status is left
            let succeeded = match handle.await {
                Ok(result) => result.is_ok(),
                Err(e) => {
                    error!("download task aborted: {}", e);
                    false
                }
            };
            if !succeeded {
                process::exit(1);
            }
        }

        Commands::Tools => {
            let tools = ToolManager::new(runner, &config.ytdlp_path, &config.ffmpeg_path);
            print_json(&tools.all_tools().await);
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> Result<Config> {
    let mut config = Config::from_env()?;
    if let Some(dir) = &args.output_dir {
        config = config.with_output_dir(dir);
    }
    if let Some(path) = &args.ytdlp {
        config = config.with_ytdlp_path(path);
    }
    if let Some(path) = &args.ffmpeg {
        config = config.with_ffmpeg_path(path);
    }
    if args.no_open {
        config = config.with_open_directory(false);
    }
    Ok(config)
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{}", line),
        Err(e) => error!("failed to serialize output: {}", e),
    }
}

/// Logs go to stderr; stdout is reserved for JSON output
fn init_logging(verbose: bool, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(verbose))
        .with(filter)
        .init();
}
