use std::time::Instant;

use clap::Parser;
use config::ProgramConfig;
use courier_engine::{ApiClient, RawResponse, RequestError, ResponseSource};
use error::AppError;
use futures::future::join_all;
use tracing::{Level, error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod cli;
mod config;
mod error;
mod utils;

use cli::CliArgs;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() {
    if let Err(e) = bootstrap() {
        eprintln!("Error: {e}");
        // Log the full error for debugging
        error!(error = ?e, "Application failed");
        std::process::exit(1);
    }
}

#[tokio::main]
async fn bootstrap() -> Result<(), AppError> {
    // Parse command-line arguments
    let args = CliArgs::parse();

    // Setup logging; stdout carries results only
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.as_str().to_ascii_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| AppError::Initialization(e.to_string()))?;

    let program_config = ProgramConfig::from_args(&args)?;
    let client = ApiClient::new(program_config.client_config.clone())?;

    info!(
        paths = args.paths.len(),
        concurrency = program_config.concurrency,
        rounds = program_config.rounds,
        "Starting requests"
    );

    let mut failed = 0;
    let mut total = 0;

    for round in 1..=program_config.rounds {
        let started = Instant::now();

        let mut batch = Vec::with_capacity(args.paths.len() * program_config.concurrency);
        for path in &args.paths {
            for _ in 0..program_config.concurrency {
                let request = program_config.request(path)?;
                let client = client.clone();
                batch.push(async move { (path, client.execute_raw(request).await) });
            }
        }

        let results = join_all(batch).await;
        total += results.len();

        for (path, result) in results {
            match result {
                Ok(response) => print_response(round, path, &response, program_config.print_body),
                Err(err) => {
                    failed += 1;
                    print_failure(round, path, &err);
                }
            }
        }

        info!(
            round,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Round finished"
        );
    }

    if failed > 0 {
        return Err(AppError::RequestsFailed { failed, total });
    }
    Ok(())
}

fn print_response(round: usize, path: &str, response: &RawResponse, print_body: bool) {
    let source = match response.source {
        ResponseSource::Network => "network",
        ResponseSource::Revalidated => "revalidated",
    };
    println!(
        "[{round}] {path} -> {} ({source}, {} bytes)",
        response.status,
        response.body.len()
    );

    if print_body {
        println!("{}", String::from_utf8_lossy(&response.body));
    }
}

fn print_failure(round: usize, path: &str, err: &RequestError) {
    let kind = match err {
        RequestError::Transport(_) => "offline",
        RequestError::Protocol { .. } => "rejected",
        RequestError::NoCachedData { .. } => "no cached data",
        RequestError::InvalidUrl(_) => "invalid url",
        _ => "error",
    };
    println!("[{round}] {path} -> {kind}: {err}");
}
