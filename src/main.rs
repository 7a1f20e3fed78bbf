//! Tangram - a small asset-bundling pipeline
//!
//! Resolves a module graph from configured entry points, runs per-type
//! transforms, partitions the graph into chunks under a split policy, and
//! emits named artifacts with post-processing plugins.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod bundler;
mod cli;
mod config;
mod emit;
mod error;
mod graph;
mod plugins;
mod resolver;
mod split;
mod transform;
mod utils;

pub use cli::Cli;

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tangram=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("tangram=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    cli.execute().await
}
