//! Runtime configuration for the fetch and merge phases.
//!
//! These structs are assembled from CLI flags in `main.rs`; defaults mirror
//! the flag table defaults so library callers get the same behavior.

use std::path::PathBuf;

/// Per-site grabber invocation settings.
///
/// `command` is the argv prefix the launcher extends with the site/output
/// contract (`--site <site> --output <path>` plus optional pass-throughs).
#[derive(Debug, Clone)]
pub struct GrabberConfig {
    /// Command prefix, e.g. `["npm", "run", "grab", "---"]`
    pub command: Vec<String>,
    /// Days of guide data to request (pass-through)
    pub days: Option<u32>,
    /// Grabber-internal connection parallelism (pass-through)
    pub max_connections: u32,
    /// Grabber HTTP timeout in milliseconds (pass-through + `TIMEOUT` env)
    pub timeout_ms: Option<u64>,
    /// Inter-request delay in milliseconds (pass-through + `DELAY` env)
    pub delay_ms: Option<u64>,
    /// Hard kill timer for one grabber run
    pub wall_clock_secs: u64,
    /// Minimum `<programme ` count for an artifact to be considered valid
    pub min_programmes: usize,
}

impl Default for GrabberConfig {
    fn default() -> Self {
        Self {
            command: vec![
                "npm".to_string(),
                "run".to_string(),
                "grab".to_string(),
                "---".to_string(),
            ],
            days: None,
            max_connections: 10,
            timeout_ms: None,
            delay_ms: None,
            wall_clock_secs: 1800,
            min_programmes: 5,
        }
    }
}

impl GrabberConfig {
    /// Derive the settings used for a retry attempt: fewer connections, a
    /// fixed inter-request delay, and a tighter kill timer. Everything else
    /// is unchanged.
    pub fn safer_retry(&self) -> Self {
        Self {
            max_connections: self.max_connections.min(5),
            delay_ms: Some(1000),
            wall_clock_secs: self.wall_clock_secs.min(600),
            ..self.clone()
        }
    }
}

/// Fetch scheduler settings.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub grabber: GrabberConfig,
    /// Number of concurrent scheduler workers
    pub concurrency: usize,
    /// Retries after the first failed attempt
    pub retries: u32,
    /// Reuse existing non-empty artifacts instead of re-grabbing
    pub resume: bool,
    /// Directory the per-site artifacts are written to
    pub artifact_dir: PathBuf,
    /// Progress report cadence in seconds; 0 disables the reporter
    pub progress_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            grabber: GrabberConfig::default(),
            concurrency: 3,
            retries: 1,
            resume: false,
            artifact_dir: PathBuf::from(".epg-tmp"),
            progress_secs: 30,
        }
    }
}

/// Merge engine settings.
#[derive(Debug, Clone, Default)]
pub struct MergeOptions {
    /// Fuzzy-match window in seconds
    pub fuzzy_secs: u64,
    /// Preferred sites, strongest first; used for channel ordering and
    /// programme tie-breaks
    pub prefer_sites: Vec<String>,
}

impl MergeOptions {
    pub fn new(fuzzy_secs: u64, prefer_sites: Vec<String>) -> Self {
        Self {
            fuzzy_secs,
            prefer_sites,
        }
    }

    /// Fuzzy window in milliseconds, the unit the matcher compares in.
    pub fn fuzzy_ms(&self) -> i64 {
        self.fuzzy_secs as i64 * 1000
    }
}
