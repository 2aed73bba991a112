//! Error type definitions for epg-collate.

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

/// Top-level application error type
///
/// Everything in here is fatal to the run: startup validation, playlist
/// loading, and final guide writing. Per-site failures never reach this type.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration errors (bad flag combinations, malformed values)
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Missing or invalid host tooling (grabber manifest, sites list)
    #[error("Startup error: {message}")]
    Startup { message: String },

    /// Filesystem errors carrying the path that failed
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// HTTP errors while fetching a playlist
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Final guide write failure; the run has failed to deliver its artifact
    #[error("Failed to write guide to {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl AppError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a startup error
    pub fn startup<S: Into<String>>(message: S) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Wrap an I/O error with the path it occurred on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Per-site grabber failure taxonomy
///
/// Each variant maps to one way a single `launch` attempt can fail. The
/// scheduler retries on any of these with safer settings; after the last
/// attempt the site is recorded as failed (and appended to the backoff list
/// when enabled).
#[derive(Error, Debug)]
pub enum LaunchError {
    /// The grabber process could not be spawned or waited on
    #[error("failed to spawn grabber: {0}")]
    Spawn(#[from] std::io::Error),

    /// The wall-clock timer expired and the child was killed
    #[error("grabber exceeded wall clock of {limit_secs}s and was killed")]
    WallClock { limit_secs: u64 },

    /// The grabber exited with a non-zero status
    #[error("grabber exited with {status}")]
    Exited { status: ExitStatus },

    /// The grabber exited cleanly but produced no artifact
    #[error("grabber exited 0 but produced no artifact at {}", path.display())]
    MissingArtifact { path: PathBuf },

    /// The artifact exists but holds fewer programmes than the threshold
    #[error("artifact holds {found} programme(s), below threshold {required}")]
    Undersized { found: usize, required: usize },
}
