//! Persistent back-off list.
//!
//! One site per line, append-only. Sites on the list are skipped on later
//! runs unless the operator forces them back in. Appends go through the OS
//! append mode so concurrent workers interleave at line granularity instead
//! of clobbering each other.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

#[derive(Debug)]
pub struct BackoffList {
    path: PathBuf,
    known: HashSet<String>,
}

impl BackoffList {
    /// Load the list; a missing file is an empty list.
    pub fn load(path: &Path) -> Self {
        let known = match std::fs::read_to_string(path) {
            Ok(content) => content
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(_) => HashSet::new(),
        };
        if !known.is_empty() {
            info!("backoff list {}: {} site(s)", path.display(), known.len());
        }
        Self {
            path: path.to_path_buf(),
            known,
        }
    }

    pub fn contains(&self, site: &str) -> bool {
        self.known.contains(site)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Append one site. The in-memory set is not updated; the batch has
    /// already decided to attempt this site, and the entry matters next run.
    pub fn append(&self, site: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{site}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let list = BackoffList::load(&dir.path().join("absent.txt"));
        assert!(list.is_empty());
        assert!(!list.contains("tvtv.us"));
    }

    #[test]
    fn test_append_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".skip-sites.txt");

        let list = BackoffList::load(&path);
        list.append("tvtv.us").unwrap();
        list.append("gatotv.com").unwrap();

        let reloaded = BackoffList::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.contains("tvtv.us"));
        assert!(reloaded.contains("gatotv.com"));
    }

    #[test]
    fn test_append_never_rewrites(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".skip-sites.txt");
        std::fs::write(&path, "already.here\n").unwrap();

        let list = BackoffList::load(&path);
        list.append("new.site").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "already.here\nnew.site\n");
    }
}
