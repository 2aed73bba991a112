//! Data model for channels, programmes and the merged guide state.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};

/// One channel as seen in a single source document.
///
/// `raw_xml` holds the original `<channel>…</channel>` fragment exactly as it
/// appeared in the artifact; the writer emits it verbatim.
#[derive(Debug, Clone)]
pub struct Channel {
    pub id: String,
    pub display_name: String,
    pub icon: Option<String>,
    pub url: Option<String>,
    pub source_site: String,
    pub raw_xml: String,
}

/// A text payload with an optional `lang` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LangText {
    pub lang: Option<String>,
    pub text: String,
}

impl LangText {
    pub fn new(lang: Option<String>, text: impl Into<String>) -> Self {
        Self {
            lang,
            text: text.into(),
        }
    }

    /// Composite key used for union-merging: `lang|text`.
    pub fn key(&self) -> String {
        format!("{}|{}", self.lang.as_deref().unwrap_or(""), self.text)
    }
}

/// An `episode-num` entry with its optional numbering system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EpisodeNum {
    pub system: Option<String>,
    pub text: String,
}

/// Credits lists, one per role, order-preserving.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Credits {
    pub directors: Vec<String>,
    pub actors: Vec<String>,
    pub writers: Vec<String>,
    pub producers: Vec<String>,
    pub presenters: Vec<String>,
}

impl Credits {
    pub fn is_empty(&self) -> bool {
        self.directors.is_empty()
            && self.actors.is_empty()
            && self.writers.is_empty()
            && self.producers.is_empty()
            && self.presenters.is_empty()
    }

    /// Set-union of every role list, preserving first-seen order.
    pub fn union(&self, other: &Credits) -> Credits {
        fn merge(a: &[String], b: &[String]) -> Vec<String> {
            let mut out = a.to_vec();
            for name in b {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            out
        }
        Credits {
            directors: merge(&self.directors, &other.directors),
            actors: merge(&self.actors, &other.actors),
            writers: merge(&self.writers, &other.writers),
            producers: merge(&self.producers, &other.producers),
            presenters: merge(&self.presenters, &other.presenters),
        }
    }
}

/// One programme record.
///
/// Invariant: `start <= stop`; the lexer never produces a record violating
/// this, and merge only widens the interval.
#[derive(Debug, Clone)]
pub struct Programme {
    pub channel: String,
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
    pub titles: Vec<LangText>,
    pub sub_titles: Vec<LangText>,
    pub descs: Vec<LangText>,
    pub credits: Credits,
    pub categories: BTreeSet<String>,
    pub episode_nums: Vec<EpisodeNum>,
    pub icons: BTreeSet<String>,
    pub ratings: BTreeSet<String>,
    pub source_site: String,
}

impl Programme {
    /// Primary title text, used for logging and enrichment.
    pub fn primary_title(&self) -> &str {
        self.titles.first().map(|t| t.text.as_str()).unwrap_or("")
    }
}

/// The parse result of one site artifact.
#[derive(Debug, Default)]
pub struct GuideDocument {
    pub channels: Vec<Channel>,
    pub programmes: Vec<Programme>,
    /// Programme records dropped for unparseable or inverted times
    pub dropped: usize,
}

/// The merged guide: one best channel per id, one deduplicated programme list
/// per channel id. BTreeMap keys give the writer a deterministic channel
/// order.
#[derive(Debug, Default)]
pub struct MergedGuide {
    pub channels: BTreeMap<String, Channel>,
    pub programmes: BTreeMap<String, Vec<Programme>>,
}

impl MergedGuide {
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn programme_count(&self) -> usize {
        self.programmes.values().map(|v| v.len()).sum()
    }
}

/// Counters for one scheduler batch, logged at the end of the run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub sites_attempted: usize,
    pub sites_succeeded: usize,
    pub sites_failed: usize,
    pub sites_skipped_backoff: usize,
    pub sites_resumed: usize,
    pub channels_merged: usize,
    pub programmes_merged: usize,
    pub categories_enriched: usize,
    pub elapsed_secs: u64,
}
