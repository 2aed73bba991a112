//! Site relevancy analysis.
//!
//! Ranks candidate sites by how many of the playlist's channels each can
//! supply, using the `<site>.channels.xml` manifests in the local grabber
//! site tree. The report helps an operator trim their sites file to the
//! sources that actually cover their playlist.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

static CHANNEL_ENTRY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<channel [^>]*id=""#).unwrap());

/// Coverage of one site against the playlist.
#[derive(Debug)]
pub struct SiteRelevancy {
    pub site: String,
    /// Playlist channel ids found in the site's channel manifest
    pub matches: usize,
    /// Total channel entries the site declares
    pub total_channels: usize,
}

/// Score one site's channel manifest against the playlist ids.
fn analyze_site(sites_dir: &Path, site: &str, playlist_ids: &BTreeSet<String>) -> SiteRelevancy {
    let manifest = sites_dir.join(site).join(format!("{site}.channels.xml"));
    let content = match std::fs::read_to_string(&manifest) {
        Ok(content) => content,
        Err(_) => {
            return SiteRelevancy {
                site: site.to_string(),
                matches: 0,
                total_channels: 0,
            };
        }
    };

    let total_channels = CHANNEL_ENTRY_RE.find_iter(&content).count();
    let matches = playlist_ids
        .iter()
        .filter(|id| content.contains(id.as_str()))
        .count();

    SiteRelevancy {
        site: site.to_string(),
        matches,
        total_channels,
    }
}

/// Analyze every site and return the ranking, most relevant first.
pub fn rank_sites(
    sites_dir: &Path,
    sites: &[String],
    playlist_ids: &BTreeSet<String>,
) -> Vec<SiteRelevancy> {
    if !sites_dir.is_dir() {
        warn!("sites directory {} not found", sites_dir.display());
    }
    let mut results: Vec<SiteRelevancy> = sites
        .iter()
        .map(|site| analyze_site(sites_dir, site, playlist_ids))
        .collect();
    results.sort_by(|a, b| b.matches.cmp(&a.matches).then_with(|| a.site.cmp(&b.site)));
    results
}

/// Print the ranked report to stdout.
pub fn print_report(results: &[SiteRelevancy]) {
    println!("Site                     | Playlist matches | Total channels on site");
    println!("-------------------------|------------------|-----------------------");
    for r in results {
        println!(
            "{:<24} | {:>16} | {:>22}",
            r.site, r.matches, r.total_channels
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_manifest(dir: &Path, site: &str, ids: &[&str]) {
        let site_dir = dir.join(site);
        std::fs::create_dir_all(&site_dir).unwrap();
        let mut content = String::from("<channels>\n");
        for id in ids {
            content.push_str(&format!(
                "  <channel site=\"{site}\" id=\"{id}\">{id}</channel>\n"
            ));
        }
        content.push_str("</channels>\n");
        std::fs::write(site_dir.join(format!("{site}.channels.xml")), content).unwrap();
    }

    #[test]
    fn test_ranking_by_match_count() {
        let dir = tempfile::tempdir().unwrap();
        write_manifest(dir.path(), "rich.example", &["ch1", "ch2", "ch3"]);
        write_manifest(dir.path(), "poor.example", &["ch9"]);

        let playlist: BTreeSet<String> =
            ["ch1", "ch2"].iter().map(|s| s.to_string()).collect();
        let sites = vec!["poor.example".to_string(), "rich.example".to_string()];
        let results = rank_sites(dir.path(), &sites, &playlist);

        assert_eq!(results[0].site, "rich.example");
        assert_eq!(results[0].matches, 2);
        assert_eq!(results[0].total_channels, 3);
        assert_eq!(results[1].site, "poor.example");
        assert_eq!(results[1].matches, 0);
    }

    #[test]
    fn test_missing_manifest_scores_zero() {
        let dir = tempfile::tempdir().unwrap();
        let playlist: BTreeSet<String> = ["ch1".to_string()].into_iter().collect();
        let results = rank_sites(dir.path(), &["ghost.example".to_string()], &playlist);
        assert_eq!(results[0].matches, 0);
        assert_eq!(results[0].total_channels, 0);
    }
}
