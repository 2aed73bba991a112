use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use epg_collate::{
    config::{FetchConfig, GrabberConfig, MergeOptions},
    enrich::enrich_guide,
    errors::AppError,
    fetch::{FetchScheduler, backoff::BackoffList},
    merge::GuideMerger,
    models::BatchSummary,
    playlist::{filter_guide, load_channel_ids},
    relevancy,
    sites::load_sites,
    xmltv::{lexer::parse_document, writer::write_guide},
};

#[derive(Parser)]
#[command(name = "epg-collate")]
#[command(version)]
#[command(about = "Runs per-site EPG grabbers in parallel and merges their XMLTV output into one guide")]
struct Cli {
    /// Input list of sites, one hostname per line
    #[arg(long, default_value = "epgsites.txt")]
    sites: PathBuf,

    /// Final output XMLTV document
    #[arg(long, default_value = "guide.xml")]
    out: PathBuf,

    /// Days of guide data to request (passed through to the grabber)
    #[arg(long)]
    days: Option<u32>,

    /// Per-site grabber connection parallelism (pass-through)
    #[arg(long = "maxConnections", default_value_t = 10)]
    max_connections: u32,

    /// Number of concurrent site workers
    #[arg(long = "siteConcurrency", default_value_t = 3)]
    site_concurrency: usize,

    /// Grabber HTTP timeout in milliseconds (pass-through + TIMEOUT env)
    #[arg(long)]
    timeout: Option<u64>,

    /// Inter-request delay in milliseconds (pass-through + DELAY env)
    #[arg(long)]
    delay: Option<u64>,

    /// Retries with safer settings after a failed attempt
    #[arg(long, default_value_t = 1)]
    retries: u32,

    /// Reuse existing artifacts instead of re-grabbing
    #[arg(long, default_value_t = false)]
    resume: bool,

    /// M3U playlist (path or http(s) URL) whose tvg-ids filter the guide
    #[arg(long)]
    playlist: Option<String>,

    /// Fuzzy-match window in seconds for programme deduplication
    #[arg(long = "fuzzySec", default_value_t = 90)]
    fuzzy_sec: u64,

    /// Comma-separated tie-break site order, strongest first
    #[arg(long = "preferSites")]
    prefer_sites: Option<String>,

    /// Hard kill timer per site in seconds
    #[arg(long = "siteWallClockSec", default_value_t = 1800)]
    site_wall_clock_sec: u64,

    /// Minimum programme count for a site artifact to count as valid
    #[arg(long = "minProg", default_value_t = 5)]
    min_prog: usize,

    /// Skip sites on the back-off list and append new chronic failures
    #[arg(long, default_value_t = false)]
    backoff: bool,

    /// Back-off list location
    #[arg(long = "backoffFile", default_value = ".skip-sites.txt")]
    backoff_file: PathBuf,

    /// Attempt every site regardless of the back-off list
    #[arg(long, default_value_t = false)]
    force: bool,

    /// Progress report cadence in seconds; 0 disables
    #[arg(long = "progressSec", default_value_t = 30)]
    progress_sec: u64,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Rank sites by how many playlist channels each can supply
    Analyze,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("epg_collate={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Some(Command::Analyze) => run_analyze(&cli).await,
        None => run_collate(&cli).await,
    }
}

/// The main pipeline: fetch every site, then merge, filter, enrich, write.
async fn run_collate(cli: &Cli) -> Result<()> {
    info!("starting epg-collate v{}", env!("CARGO_PKG_VERSION"));
    check_grab_manifest(Path::new("package.json"))?;

    let sites = load_sites(&cli.sites, Path::new("sites"))?;
    if sites.is_empty() {
        bail!("no valid sites to fetch");
    }

    let backoff = if cli.backoff && !cli.force {
        Some(BackoffList::load(&cli.backoff_file))
    } else {
        if cli.backoff && cli.force {
            info!("--force set: back-off list ignored for this run");
        }
        None
    };

    let fetch_config = FetchConfig {
        grabber: GrabberConfig {
            days: cli.days,
            max_connections: cli.max_connections,
            timeout_ms: cli.timeout,
            delay_ms: cli.delay,
            wall_clock_secs: cli.site_wall_clock_sec,
            min_programmes: cli.min_prog,
            ..GrabberConfig::default()
        },
        concurrency: cli.site_concurrency,
        retries: cli.retries,
        resume: cli.resume,
        progress_secs: cli.progress_sec,
        ..FetchConfig::default()
    };

    let started = Instant::now();
    let mut summary = BatchSummary {
        sites_attempted: sites.len(),
        ..BatchSummary::default()
    };

    let scheduler = FetchScheduler::new(fetch_config, backoff);
    let outcome = scheduler
        .run(sites)
        .await
        .context("could not prepare artifact directory")?;
    summary.sites_succeeded = outcome.succeeded.len();
    summary.sites_failed = outcome.failed.len();
    summary.sites_skipped_backoff = outcome.skipped.len();
    summary.sites_resumed = outcome.resumed;
    if !outcome.failed.is_empty() {
        warn!("failed sites: {}", outcome.failed.join(", "));
    }

    let channel_filter = match &cli.playlist {
        Some(source) => {
            let ids = load_channel_ids(source).await?;
            if ids.is_empty() {
                warn!("playlist produced no channel ids; filtering disabled");
                None
            } else {
                Some(ids)
            }
        }
        None => None,
    };

    let merge_opts = MergeOptions::new(cli.fuzzy_sec, parse_prefer_sites(&cli.prefer_sites));
    let mut merger = GuideMerger::new(merge_opts);
    for site in merger.merge_order(&outcome.succeeded) {
        let path = scheduler.artifact_path(&site);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) => {
                warn!("skipping {site}: cannot read {}: {e}", path.display());
                continue;
            }
        };
        let doc = parse_document(&content, &site);
        info!(
            "merging {site}: {} channel(s), {} programme(s)",
            doc.channels.len(),
            doc.programmes.len()
        );
        merger.absorb(doc);
    }
    let mut guide = merger.into_guide();

    if let Some(keep) = &channel_filter {
        filter_guide(&mut guide, keep);
    }
    summary.categories_enriched = enrich_guide(&mut guide);
    summary.channels_merged = guide.channel_count();
    summary.programmes_merged = guide.programme_count();

    let generator = format!("epg-collate/{}", env!("CARGO_PKG_VERSION"));
    let file = std::fs::File::create(&cli.out).map_err(|e| AppError::Write {
        path: cli.out.clone(),
        source: e,
    })?;
    let mut writer = BufWriter::new(file);
    write_guide(&mut writer, &guide, &generator)
        .and_then(|_| writer.flush())
        .map_err(|e| AppError::Write {
            path: cli.out.clone(),
            source: e,
        })?;

    summary.elapsed_secs = started.elapsed().as_secs();
    info!(
        "batch complete: attempted={} succeeded={} failed={} skipped={} resumed={} elapsed={}s",
        summary.sites_attempted,
        summary.sites_succeeded,
        summary.sites_failed,
        summary.sites_skipped_backoff,
        summary.sites_resumed,
        summary.elapsed_secs
    );
    info!(
        "guide written to {}: channels={} programmes={} categories_enriched={}",
        cli.out.display(),
        summary.channels_merged,
        summary.programmes_merged,
        summary.categories_enriched
    );
    Ok(())
}

/// The `analyze` subcommand: rank sites by playlist coverage.
async fn run_analyze(cli: &Cli) -> Result<()> {
    let Some(playlist) = &cli.playlist else {
        return Err(AppError::configuration("analyze requires --playlist").into());
    };
    let sites = load_sites(&cli.sites, Path::new("sites"))?;
    let ids = load_channel_ids(playlist).await?;
    if ids.is_empty() {
        bail!("playlist {playlist} carries no tvg-id attributes to match against");
    }
    info!(
        "analyzing {} site(s) against {} playlist channel(s)",
        sites.len(),
        ids.len()
    );
    let results = relevancy::rank_sites(Path::new("sites"), &sites, &ids);
    relevancy::print_report(&results);
    Ok(())
}

/// Split the `--preferSites` CSV, dropping empty fragments.
fn parse_prefer_sites(raw: &Option<String>) -> Vec<String> {
    raw.as_deref()
        .unwrap_or("")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The working tree must carry the grabber toolchain: a `package.json` with a
/// `grab` script. Anything else is a fatal startup error.
fn check_grab_manifest(path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path).with_context(|| {
        format!(
            "no grabber manifest at {}; run from a working tree with a `grab` script",
            path.display()
        )
    })?;
    let manifest: serde_json::Value =
        serde_json::from_str(&content).context("grabber manifest is not valid JSON")?;
    if manifest
        .get("scripts")
        .and_then(|s| s.get("grab"))
        .is_none()
    {
        bail!("grabber manifest {} has no `grab` script", path.display());
    }
    Ok(())
}
