//! Build error taxonomy
//!
//! Every phase failure carries enough context (module path, step, phase)
//! to be printed by the CLI without further interpretation.

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the build pipeline
#[derive(Debug, Error)]
pub enum BuildError {
    /// An import specifier could not be mapped to a file
    #[error("cannot resolve import '{specifier}' from {}", importer.display())]
    UnresolvedImport {
        specifier: String,
        importer: PathBuf,
    },

    /// A transform step rejected a module
    #[error("transform '{transform}' (step {step}) failed for {}: {message}", path.display())]
    Transform {
        path: PathBuf,
        step: usize,
        transform: String,
        message: String,
    },

    /// The split policy is invalid or self-contradictory
    #[error("invalid split policy: {0}")]
    SplitPolicy(String),

    /// An artifact could not be written
    #[error("cannot emit {}: {source}", path.display())]
    Emit {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A source file could not be read
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration references something that does not exist
    #[error("configuration error: {0}")]
    Config(String),
}

impl BuildError {
    /// Short phase label for the CLI error summary
    pub fn phase(&self) -> &'static str {
        match self {
            BuildError::UnresolvedImport { .. } | BuildError::Io { .. } => "resolve",
            BuildError::Transform { .. } => "transform",
            BuildError::SplitPolicy(_) => "split",
            BuildError::Emit { .. } => "emit",
            BuildError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
