//! Keep-alive pinger.
//!
//! Hits the backend's public URL on a fixed period so an idle host is never
//! put to sleep. Failed pings are logged and the next tick proceeds; there is
//! no retry or backoff.

use std::time::Duration;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Public URL of the backend to keep awake.
    #[arg(env = "PING_URL")]
    url: String,

    /// Minutes between pings.
    #[arg(long, env = "PING_INTERVAL_MINUTES", default_value_t = 14)]
    interval: u64,
}

#[tokio::main]
async fn main() {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let args = Args::parse();
    let mut timer = tokio::time::interval(Duration::from_secs(args.interval * 60));

    info!("Pinging {} every {} minutes", args.url, args.interval);

    loop {
        timer.tick().await;
        ping(&args.url).await;
    }
}

async fn ping(url: &str) {
    info!("Pinging server to keep it alive...");

    match reqwest::get(url).await {
        Ok(response) if response.status().is_success() => info!("Server is active"),
        Ok(response) => error!(
            "Failed to ping server with status code: {}",
            response.status()
        ),
        Err(err) => error!("Error during server wakeup: {err}"),
    }
}
