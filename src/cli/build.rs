//! Build command implementation

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Args, ValueEnum};
use colored::Colorize;
use tracing::info;

use crate::bundler::Bundler;
use crate::config::Config;
use crate::utils::format_size;

/// Build mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Readable output, no minification
    Development,
    /// Minified output
    Production,
}

/// Build the project
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Output directory override
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,

    /// Build mode
    #[arg(long, value_enum, default_value_t = Mode::Production)]
    pub mode: Mode,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &str) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path);
        let mut config = Config::load(config_path)?;

        if let Some(outdir) = &self.outdir {
            config.output.path = outdir.display().to_string();
        }

        eprintln!(
            "{} Building project ({:?} mode)...",
            "→".blue(),
            self.mode
        );

        let bundler = Bundler::new(config, BuildOptions { mode: self.mode })?;

        let result = match bundler.build().await {
            Ok(result) => result,
            Err(err) => {
                eprintln!(
                    "\n{} Build failed in {} phase: {}\n",
                    "✗".red().bold(),
                    err.phase(),
                    err
                );
                return Err(err.into());
            }
        };

        let duration = start.elapsed();

        eprintln!(
            "\n{} Built {} module(s) into {} chunk(s) in {:.2}s\n",
            "✓".green().bold(),
            result.module_count,
            result.chunk_count,
            duration.as_secs_f64()
        );

        // Print artifact summary
        for artifact in &result.artifacts {
            eprintln!(
                "  {} {} {}",
                "•".dimmed(),
                artifact.path.display().to_string().cyan(),
                format_size(artifact.size).dimmed()
            );
        }

        eprintln!();

        Ok(())
    }
}

/// Build options derived from command arguments
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub mode: Mode,
}
