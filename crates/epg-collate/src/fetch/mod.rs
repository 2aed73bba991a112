//! Bounded-concurrency fetch scheduler.
//!
//! A fixed pool of workers drains the site list through a shared monotonic
//! index. Each worker resumes from an existing artifact when allowed,
//! otherwise launches the grabber, retrying with safer settings on failure.
//! Chronically failing sites are appended to the persistent back-off list.
//! No ordering is guaranteed between workers; the merge phase reorders
//! successes itself.

pub mod backoff;
pub mod launcher;
pub mod progress;

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tracing::{info, warn};

use crate::config::FetchConfig;
use backoff::BackoffList;
use progress::{ProgressCounters, spawn_reporter};

/// Disjoint result lists for one batch.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub succeeded: Vec<String>,
    pub failed: Vec<String>,
    /// Sites excluded up front by the back-off list
    pub skipped: Vec<String>,
    /// Subset of `succeeded` satisfied by an existing artifact
    pub resumed: usize,
}

pub struct FetchScheduler {
    config: FetchConfig,
    /// Present when back-off is enabled and not overridden by `--force`
    backoff: Option<Arc<BackoffList>>,
}

struct WorkerContext {
    config: FetchConfig,
    backoff: Option<Arc<BackoffList>>,
    sites: Vec<String>,
    next: AtomicUsize,
    counters: Arc<ProgressCounters>,
    outcome: Mutex<BatchOutcome>,
}

impl FetchScheduler {
    pub fn new(config: FetchConfig, backoff: Option<BackoffList>) -> Self {
        Self {
            config,
            backoff: backoff.map(Arc::new),
        }
    }

    /// Artifact path for one site: `<artifact_dir>/<site>.xml`.
    pub fn artifact_path(&self, site: &str) -> PathBuf {
        artifact_path(&self.config, site)
    }

    /// Drain the site list and return the batch outcome. Blocks until every
    /// worker has quiesced; the artifact directory is not touched afterwards.
    pub async fn run(&self, sites: Vec<String>) -> std::io::Result<BatchOutcome> {
        tokio::fs::create_dir_all(&self.config.artifact_dir).await?;

        let (attempt, skipped): (Vec<String>, Vec<String>) = match &self.backoff {
            Some(list) => sites.into_iter().partition(|s| !list.contains(s)),
            None => (sites, Vec::new()),
        };
        for site in &skipped {
            info!("skipping {site}: on back-off list");
        }

        let counters = ProgressCounters::new(attempt.len());
        let reporter = spawn_reporter(counters.clone(), self.config.progress_secs);

        let worker_count = self.config.concurrency.max(1).min(attempt.len().max(1));
        let context = Arc::new(WorkerContext {
            config: self.config.clone(),
            backoff: self.backoff.clone(),
            sites: attempt,
            next: AtomicUsize::new(0),
            counters,
            outcome: Mutex::new(BatchOutcome {
                skipped,
                ..BatchOutcome::default()
            }),
        });

        let workers: Vec<_> = (0..worker_count)
            .map(|_| {
                let context = context.clone();
                tokio::spawn(async move { worker_loop(context).await })
            })
            .collect();
        for worker in workers {
            worker.await.ok();
        }

        if let Some(reporter) = reporter {
            reporter.abort();
        }

        let mut outcome = context.outcome.lock().unwrap_or_else(|e| e.into_inner());
        Ok(std::mem::take(&mut *outcome))
    }
}

fn artifact_path(config: &FetchConfig, site: &str) -> PathBuf {
    config.artifact_dir.join(format!("{site}.xml"))
}

async fn worker_loop(context: Arc<WorkerContext>) {
    loop {
        let idx = context.next.fetch_add(1, Ordering::SeqCst);
        let Some(site) = context.sites.get(idx) else {
            break;
        };

        context.counters.running.fetch_add(1, Ordering::Relaxed);
        let result = fetch_site(&context, site).await;
        context.counters.running.fetch_sub(1, Ordering::Relaxed);

        let mut outcome = context.outcome.lock().unwrap_or_else(|e| e.into_inner());
        match result {
            Ok(resumed) => {
                context.counters.done.fetch_add(1, Ordering::Relaxed);
                outcome.succeeded.push(site.clone());
                if resumed {
                    outcome.resumed += 1;
                }
            }
            Err(()) => {
                context.counters.failed.fetch_add(1, Ordering::Relaxed);
                outcome.failed.push(site.clone());
            }
        }
    }
}

/// Fetch one site. `Ok(true)` means an existing artifact was reused.
async fn fetch_site(context: &WorkerContext, site: &str) -> Result<bool, ()> {
    let out_path = artifact_path(&context.config, site);

    if context.config.resume {
        if let Ok(meta) = tokio::fs::metadata(&out_path).await {
            if meta.len() > 0 {
                info!("resuming {site}: reusing {}", out_path.display());
                return Ok(true);
            }
        }
    }

    let mut grabber = context.config.grabber.clone();
    for attempt in 0..=context.config.retries {
        if attempt > 0 {
            grabber = grabber.safer_retry();
            info!(
                "retrying {site} (attempt {}/{}) with safer settings",
                attempt + 1,
                context.config.retries + 1
            );
        }
        match launcher::launch(site, &out_path, &grabber).await {
            Ok(()) => {
                info!("fetched {site}");
                return Ok(false);
            }
            Err(e) => warn!("grab attempt {} for {site} failed: {e}", attempt + 1),
        }
    }

    if let Some(backoff) = &context.backoff {
        // best effort: a failed append must not fail the site bookkeeping
        if let Err(e) = backoff.append(site) {
            warn!("could not append {site} to back-off list: {e}");
        } else {
            info!("added {site} to back-off list");
        }
    }
    Err(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrabberConfig;
    use std::path::Path;

    /// Stand-in grabber that branches on `--site`: `good.example` writes a
    /// valid artifact, `bad.example` exits non-zero, `flaky.example` fails
    /// once then succeeds (marker file).
    fn fake_grabber(dir: &Path) -> PathBuf {
        let path = dir.join("grabber.sh");
        let marker = dir.join("flaky.marker");
        let script = format!(
            r#"#!/bin/sh
out=""
site=""
prev=""
for a in "$@"; do
  if [ "$prev" = "--output" ]; then out="$a"; fi
  if [ "$prev" = "--site" ]; then site="$a"; fi
  prev="$a"
done
if [ "$site" = "bad.example" ]; then exit 1; fi
if [ "$site" = "flaky.example" ] && [ ! -f "{marker}" ]; then
  touch "{marker}"
  exit 1
fi
: > "$out"
i=0
while [ $i -lt 6 ]; do
  printf '%s\n' '<programme start="s" stop="t" channel="c"></programme>' >> "$out"
  i=$((i+1))
done
"#,
            marker = marker.display()
        );
        std::fs::write(&path, script).unwrap();
        path
    }

    fn config_for(dir: &Path) -> FetchConfig {
        FetchConfig {
            grabber: GrabberConfig {
                command: vec![
                    "sh".to_string(),
                    fake_grabber(dir).to_string_lossy().into_owned(),
                ],
                wall_clock_secs: 30,
                ..GrabberConfig::default()
            },
            concurrency: 2,
            retries: 1,
            resume: false,
            artifact_dir: dir.join("artifacts"),
            progress_secs: 0,
        }
    }

    #[tokio::test]
    async fn test_batch_partitions_success_and_failure() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = FetchScheduler::new(config_for(dir.path()), None);
        let outcome = scheduler
            .run(vec!["good.example".to_string(), "bad.example".to_string()])
            .await
            .unwrap();
        assert_eq!(outcome.succeeded, vec!["good.example"]);
        assert_eq!(outcome.failed, vec!["bad.example"]);
        assert!(scheduler.artifact_path("good.example").exists());
        assert!(!scheduler.artifact_path("bad.example").exists());
    }

    #[tokio::test]
    async fn test_retry_recovers_flaky_site() {
        let dir = tempfile::tempdir().unwrap();
        let scheduler = FetchScheduler::new(config_for(dir.path()), None);
        let outcome = scheduler.run(vec!["flaky.example".to_string()]).await.unwrap();
        assert_eq!(outcome.succeeded, vec!["flaky.example"]);
        assert!(outcome.failed.is_empty());
    }

    #[tokio::test]
    async fn test_resume_reuses_artifact_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.resume = true;
        // a grabber that cannot possibly run
        config.grabber.command = vec!["/nonexistent/grabber".to_string()];
        std::fs::create_dir_all(&config.artifact_dir).unwrap();
        std::fs::write(
            config.artifact_dir.join("good.example.xml"),
            "<tv><programme start=\"s\"></programme></tv>",
        )
        .unwrap();

        let scheduler = FetchScheduler::new(config, None);
        let outcome = scheduler.run(vec!["good.example".to_string()]).await.unwrap();
        assert_eq!(outcome.succeeded, vec!["good.example"]);
        assert_eq!(outcome.resumed, 1);
    }

    #[tokio::test]
    async fn test_empty_resume_artifact_is_not_reused() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_for(dir.path());
        config.resume = true;
        std::fs::create_dir_all(&config.artifact_dir).unwrap();
        std::fs::write(config.artifact_dir.join("good.example.xml"), "").unwrap();

        let scheduler = FetchScheduler::new(config, None);
        let outcome = scheduler.run(vec!["good.example".to_string()]).await.unwrap();
        assert_eq!(outcome.resumed, 0);
        assert_eq!(outcome.succeeded, vec!["good.example"]);
    }

    #[tokio::test]
    async fn test_terminal_failure_appends_to_backoff() {
        let dir = tempfile::tempdir().unwrap();
        let backoff_path = dir.path().join(".skip-sites.txt");
        let scheduler = FetchScheduler::new(
            config_for(dir.path()),
            Some(BackoffList::load(&backoff_path)),
        );
        let outcome = scheduler.run(vec!["bad.example".to_string()]).await.unwrap();
        assert_eq!(outcome.failed, vec!["bad.example"]);

        let reloaded = BackoffList::load(&backoff_path);
        assert!(reloaded.contains("bad.example"));
    }

    #[tokio::test]
    async fn test_backoff_sites_not_attempted() {
        let dir = tempfile::tempdir().unwrap();
        let backoff_path = dir.path().join(".skip-sites.txt");
        std::fs::write(&backoff_path, "good.example\n").unwrap();

        let scheduler = FetchScheduler::new(
            config_for(dir.path()),
            Some(BackoffList::load(&backoff_path)),
        );
        let outcome = scheduler.run(vec!["good.example".to_string()]).await.unwrap();
        assert_eq!(outcome.skipped, vec!["good.example"]);
        assert!(outcome.succeeded.is_empty());
        assert!(outcome.failed.is_empty());
        // never launched, so no artifact appeared
        assert!(!scheduler.artifact_path("good.example").exists());
    }
}
