//! XMLTV merge engine.
//!
//! Folds parsed site artifacts into a single guide: one best-scoring channel
//! per id, and per-channel programme lists deduplicated under the fuzzy
//! temporal match. Artifacts must be absorbed in merge order (non-preferred
//! sites first, preferred sites last) so that richer later entries win
//! channel replacements and preferred sites are weighted on programme ties.

pub mod fuzzy;
pub mod score;

use tracing::debug;

use crate::config::MergeOptions;
use crate::models::{EpisodeNum, GuideDocument, LangText, MergedGuide, Programme};

use fuzzy::same_broadcast;
use score::{score_channel, score_programme};

/// Position of a site in the preference list; earlier is stronger.
fn site_rank(prefer: &[String], site: &str) -> Option<usize> {
    prefer.iter().position(|s| s == site)
}

pub struct GuideMerger {
    opts: MergeOptions,
    guide: MergedGuide,
}

impl GuideMerger {
    pub fn new(opts: MergeOptions) -> Self {
        Self {
            opts,
            guide: MergedGuide::default(),
        }
    }

    /// Reorder successful sites for absorption: non-preferred sites keep
    /// their original order, preferred sites move to the end in the order
    /// given by `preferSites`.
    pub fn merge_order(&self, sites: &[String]) -> Vec<String> {
        let mut ordered: Vec<String> = sites
            .iter()
            .filter(|s| site_rank(&self.opts.prefer_sites, s).is_none())
            .cloned()
            .collect();
        for preferred in &self.opts.prefer_sites {
            if sites.contains(preferred) {
                ordered.push(preferred.clone());
            }
        }
        ordered
    }

    /// Fold one parsed artifact into the merged state.
    pub fn absorb(&mut self, doc: GuideDocument) {
        for channel in doc.channels {
            let keep_existing = self
                .guide
                .channels
                .get(&channel.id)
                .is_some_and(|existing| score_channel(&channel) <= score_channel(existing));
            if keep_existing {
                debug!(
                    "keeping channel {}: offer from {} scores no higher",
                    channel.id, channel.source_site
                );
            } else {
                self.guide.channels.insert(channel.id.clone(), channel);
            }
        }

        for programme in doc.programmes {
            let list = self
                .guide
                .programmes
                .entry(programme.channel.clone())
                .or_default();
            match list
                .iter()
                .position(|existing| same_broadcast(existing, &programme, self.opts.fuzzy_ms()))
            {
                Some(idx) => {
                    let existing = list[idx].clone();
                    list[idx] = fuse(existing, programme, &self.opts.prefer_sites);
                }
                None => list.push(programme),
            }
        }
    }

    pub fn into_guide(self) -> MergedGuide {
        self.guide
    }
}

/// Fuse two records of the same broadcast into one.
///
/// The higher quality score wins; on ties the preference list decides (a
/// listed site outranks an unlisted one, an earlier listing outranks a later
/// one) and `a` wins by default. The fused interval spans both inputs.
pub fn fuse(a: Programme, b: Programme, prefer: &[String]) -> Programme {
    let (score_a, score_b) = (score_programme(&a), score_programme(&b));
    let (winner, loser) = if score_a > score_b {
        (a, b)
    } else if score_b > score_a {
        (b, a)
    } else {
        match (
            site_rank(prefer, &a.source_site),
            site_rank(prefer, &b.source_site),
        ) {
            (Some(rank_a), Some(rank_b)) if rank_b < rank_a => (b, a),
            (None, Some(_)) => (b, a),
            _ => (a, b),
        }
    };

    let start = winner.start.min(loser.start);
    let stop = winner.stop.max(loser.stop);

    // first desc's length picks one side's descriptions wholesale
    let winner_desc_len = winner.descs.first().map(|d| d.text.len()).unwrap_or(0);
    let loser_desc_len = loser.descs.first().map(|d| d.text.len()).unwrap_or(0);
    let descs = if loser_desc_len > winner_desc_len {
        loser.descs
    } else {
        winner.descs
    };

    let mut categories = winner.categories;
    categories.extend(loser.categories);
    let mut icons = winner.icons;
    icons.extend(loser.icons);
    let mut ratings = winner.ratings;
    ratings.extend(loser.ratings);

    Programme {
        channel: winner.channel,
        start,
        stop,
        titles: union_lang_texts(winner.titles, loser.titles),
        sub_titles: union_lang_texts(winner.sub_titles, loser.sub_titles),
        descs,
        credits: winner.credits.union(&loser.credits),
        categories,
        episode_nums: union_episode_nums(winner.episode_nums, loser.episode_nums),
        icons,
        ratings,
        source_site: winner.source_site,
    }
}

/// Union keyed on `lang|text`; a colliding loser entry replaces the winner's
/// in place (last-writer-wins), new entries append.
fn union_lang_texts(winner: Vec<LangText>, loser: Vec<LangText>) -> Vec<LangText> {
    let mut out = winner;
    for entry in loser {
        match out.iter().position(|e| e.key() == entry.key()) {
            Some(idx) => out[idx] = entry,
            None => out.push(entry),
        }
    }
    out
}

/// Union keyed on the episode text alone.
fn union_episode_nums(winner: Vec<EpisodeNum>, loser: Vec<EpisodeNum>) -> Vec<EpisodeNum> {
    let mut out = winner;
    for entry in loser {
        match out.iter().position(|e| e.text == entry.text) {
            Some(idx) => out[idx] = entry,
            None => out.push(entry),
        }
    }
    out
}
