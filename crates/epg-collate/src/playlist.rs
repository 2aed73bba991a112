//! Playlist loading and channel-id filtering.
//!
//! The playlist is an M3U document read from a local path or an `http(s)://`
//! URL; the only thing consumed from it is the set of `tvg-id` attribute
//! values. Filtering drops every merged channel (and its programmes) whose id
//! is not in the set.

use std::collections::BTreeSet;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, warn};

use crate::errors::{AppError, AppResult};
use crate::models::MergedGuide;

static TVG_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"tvg-id="([^"]+)""#).unwrap());

/// Extract the deduplicated set of tvg-ids from M3U content.
pub fn extract_channel_ids(content: &str) -> BTreeSet<String> {
    TVG_ID_RE
        .captures_iter(content)
        .map(|c| c[1].to_string())
        .collect()
}

/// Load a playlist from a URL or file path and return its tvg-id set.
pub async fn load_channel_ids(source: &str) -> AppResult<BTreeSet<String>> {
    let content = if source.starts_with("http://") || source.starts_with("https://") {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;
        client.get(source).send().await?.error_for_status()?.text().await?
    } else {
        std::fs::read_to_string(source).map_err(|e| AppError::io(source, e))?
    };

    let ids = extract_channel_ids(&content);
    if ids.is_empty() {
        warn!("playlist {source} carries no tvg-id attributes");
    } else {
        info!("playlist {source}: {} unique channel ids", ids.len());
    }
    Ok(ids)
}

/// Drop every channel whose id is absent from `keep`, along with its
/// programmes. An empty set empties the guide.
pub fn filter_guide(guide: &mut MergedGuide, keep: &BTreeSet<String>) {
    let before = guide.channel_count();
    guide.channels.retain(|id, _| keep.contains(id));
    guide.programmes.retain(|id, _| keep.contains(id));
    let dropped = before - guide.channel_count();
    if dropped > 0 {
        info!("playlist filter dropped {dropped} channel(s)");
    }
}
