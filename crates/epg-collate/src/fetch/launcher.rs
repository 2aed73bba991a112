//! Single grabber subprocess launch.
//!
//! Spawns the external grabber for one site, enforces the wall-clock kill
//! timer, and validates the artifact it leaves behind. A non-zero exit or an
//! undersized artifact deletes the output; a wall-clock kill leaves any
//! partial artifact in place for inspection or a later run.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::GrabberConfig;
use crate::errors::LaunchError;

/// Count programme records with the cheap structural token scan used for
/// artifact validation. Not a parse.
pub fn count_programme_tokens(content: &str) -> usize {
    content.matches("<programme ").count()
}

/// Run the grabber for `site`, writing its artifact to `out_path`.
///
/// Returns `Ok(())` only when the process exited 0 within the wall clock and
/// the artifact holds at least `min_programmes` records.
pub async fn launch(
    site: &str,
    out_path: &Path,
    config: &GrabberConfig,
) -> Result<(), LaunchError> {
    let (program, prefix) = config
        .command
        .split_first()
        .ok_or_else(|| LaunchError::Spawn(std::io::Error::other("empty grabber command")))?;

    let mut command = Command::new(program);
    command
        .args(prefix)
        .arg("--site")
        .arg(site)
        .arg("--output")
        .arg(out_path)
        .arg("--maxConnections")
        .arg(config.max_connections.to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true);

    if let Some(days) = config.days {
        command.arg("--days").arg(days.to_string());
    }
    if let Some(delay) = config.delay_ms {
        command.arg("--delay").arg(delay.to_string());
        command.env("DELAY", delay.to_string());
    }
    if let Some(timeout) = config.timeout_ms {
        command.arg("--timeout").arg(timeout.to_string());
        command.env("TIMEOUT", timeout.to_string());
    }

    debug!("launching grabber for {site} -> {}", out_path.display());
    let mut child = command.spawn()?;

    let wall_clock = Duration::from_secs(config.wall_clock_secs);
    let status = match tokio::time::timeout(wall_clock, child.wait()).await {
        Ok(status) => status?,
        Err(_elapsed) => {
            warn!(
                "grabber for {site} exceeded {}s, killing",
                config.wall_clock_secs
            );
            child.kill().await.ok();
            return Err(LaunchError::WallClock {
                limit_secs: config.wall_clock_secs,
            });
        }
    };

    if !status.success() {
        remove_artifact(out_path).await;
        return Err(LaunchError::Exited { status });
    }

    let content = match tokio::fs::read_to_string(out_path).await {
        Ok(content) => content,
        Err(_) => {
            return Err(LaunchError::MissingArtifact {
                path: out_path.to_path_buf(),
            });
        }
    };

    let found = count_programme_tokens(&content);
    if found < config.min_programmes {
        remove_artifact(out_path).await;
        return Err(LaunchError::Undersized {
            found,
            required: config.min_programmes,
        });
    }

    Ok(())
}

async fn remove_artifact(path: &Path) {
    if tokio::fs::remove_file(path).await.is_ok() {
        debug!("removed artifact {}", path.display());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// A stand-in grabber: a shell script that receives the contracted argv
    /// and interprets `$out` as the `--output` value.
    fn fake_grabber(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("grabber.sh");
        let script = format!(
            "#!/bin/sh\nout=\"\"\nprev=\"\"\nfor a in \"$@\"; do\n  if [ \"$prev\" = \"--output\" ]; then out=\"$a\"; fi\n  prev=\"$a\"\ndone\n{body}\n"
        );
        std::fs::write(&path, script).unwrap();
        path
    }

    fn config_for(script: &Path) -> GrabberConfig {
        GrabberConfig {
            command: vec!["sh".to_string(), script.to_string_lossy().into_owned()],
            wall_clock_secs: 30,
            min_programmes: 5,
            ..GrabberConfig::default()
        }
    }

    fn write_programmes_body(count: usize) -> String {
        format!(
            ": > \"$out\"\ni=0\nwhile [ $i -lt {count} ]; do\n  printf '%s\\n' '<programme start=\"s\" stop=\"t\" channel=\"c\"></programme>' >> \"$out\"\n  i=$((i+1))\ndone"
        )
    }

    #[test]
    fn test_token_count() {
        assert_eq!(count_programme_tokens("<tv></tv>"), 0);
        assert_eq!(
            count_programme_tokens("<programme start=\"a\"><programme start=\"b\">"),
            2
        );
        // the closing tag and a bare `<programme>` are not counted
        assert_eq!(count_programme_tokens("</programme><programme>"), 0);
    }

    #[tokio::test]
    async fn test_successful_launch() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_grabber(dir.path(), &write_programmes_body(6));
        let out = dir.path().join("site.xml");
        launch("tvtv.us", &out, &config_for(&script)).await.unwrap();
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_undersized_artifact_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_grabber(dir.path(), &write_programmes_body(2));
        let out = dir.path().join("site.xml");
        let err = launch("tvtv.us", &out, &config_for(&script)).await.unwrap_err();
        assert!(matches!(
            err,
            LaunchError::Undersized { found: 2, required: 5 }
        ));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_nonzero_exit_deletes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let body = format!("{}\nexit 3", write_programmes_body(6));
        let script = fake_grabber(dir.path(), &body);
        let out = dir.path().join("site.xml");
        let err = launch("tvtv.us", &out, &config_for(&script)).await.unwrap_err();
        assert!(matches!(err, LaunchError::Exited { .. }));
        assert!(!out.exists());
    }

    #[tokio::test]
    async fn test_clean_exit_without_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let script = fake_grabber(dir.path(), "exit 0");
        let out = dir.path().join("site.xml");
        let err = launch("tvtv.us", &out, &config_for(&script)).await.unwrap_err();
        assert!(matches!(err, LaunchError::MissingArtifact { .. }));
    }

    #[tokio::test]
    async fn test_wall_clock_kill() {
        let dir = tempfile::tempdir().unwrap();
        // writes a partial artifact, then hangs
        let body = "printf '%s\\n' '<programme start=\"s\">' > \"$out\"\nsleep 30";
        let script = fake_grabber(dir.path(), body);
        let out = dir.path().join("site.xml");
        let mut config = config_for(&script);
        config.wall_clock_secs = 1;

        let started = std::time::Instant::now();
        let err = launch("tvtv.us", &out, &config).await.unwrap_err();
        assert!(matches!(err, LaunchError::WallClock { limit_secs: 1 }));
        // killed within a bounded grace period, not after the sleep finishes
        assert!(started.elapsed() < Duration::from_secs(10));
        // the partial artifact is left in place, unlike the exit/undersized paths
        assert!(out.exists());
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("site.xml");
        let config = GrabberConfig {
            command: vec!["/nonexistent/grabber-binary".to_string()],
            ..GrabberConfig::default()
        };
        let err = launch("tvtv.us", &out, &config).await.unwrap_err();
        assert!(matches!(err, LaunchError::Spawn(_)));
    }
}
