//! Centralized error handling for epg-collate.
//!
//! Startup problems (missing host tooling, unreadable sites list, malformed
//! config) surface as [`AppError`] and abort the run. Per-site grabber
//! failures are represented by [`LaunchError`] and stay inside the fetch
//! scheduler as data; a single bad site never fails the batch.

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;
