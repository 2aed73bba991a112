//! Site list loading.
//!
//! Sites are short hostname-shaped identifiers, one per line, with `#`
//! comments and blank lines ignored. Entries that do not look like hostnames
//! are silently dropped. When the sites file is absent, the list is derived
//! from the direct subdirectory names of `./sites` (the grabber's site
//! configuration tree).

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};

use crate::errors::{AppError, AppResult};

static HOSTNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9.-]+\.[a-z]{2,}$").unwrap());

/// True when `entry` has the accepted lowercase hostname shape.
pub fn is_valid_site(entry: &str) -> bool {
    HOSTNAME_RE.is_match(entry)
}

/// Parse sites-file content into the ordered list of valid sites.
pub fn parse_sites(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter(|line| {
            let ok = is_valid_site(line);
            if !ok {
                debug!("dropping non-hostname sites entry: {line}");
            }
            ok
        })
        .map(str::to_string)
        .collect()
}

/// Load the site list from `sites_file`, falling back to enumerating the
/// subdirectories of `sites_dir` when the file does not exist.
pub fn load_sites(sites_file: &Path, sites_dir: &Path) -> AppResult<Vec<String>> {
    if sites_file.exists() {
        let content =
            std::fs::read_to_string(sites_file).map_err(|e| AppError::io(sites_file, e))?;
        let sites = parse_sites(&content);
        info!("loaded {} site(s) from {}", sites.len(), sites_file.display());
        return Ok(sites);
    }

    if !sites_dir.is_dir() {
        return Err(AppError::startup(format!(
            "sites file {} not found and no {} directory to enumerate",
            sites_file.display(),
            sites_dir.display()
        )));
    }

    let mut sites: Vec<String> = std::fs::read_dir(sites_dir)
        .map_err(|e| AppError::io(sites_dir, e))?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_valid_site(name))
        .collect();
    sites.sort();
    info!(
        "derived {} site(s) from {} subdirectories",
        sites.len(),
        sites_dir.display()
    );
    Ok(sites)
}
