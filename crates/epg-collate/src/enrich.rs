//! Rule-based category enrichment.
//!
//! A static table maps category names to regex lists. Each merged programme's
//! titles and descriptions are concatenated, lowercased and scanned; a
//! matching category not already on the record is added. The table is
//! process-wide and immutable.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::models::{MergedGuide, Programme};

static ENRICHMENT_TABLE: LazyLock<Vec<(&'static str, Vec<Regex>)>> = LazyLock::new(|| {
    fn rules(patterns: &[&str]) -> Vec<Regex> {
        patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){p}")).unwrap())
            .collect()
    }
    vec![
        (
            "Sports",
            rules(&[
                r"\b(nfl|nba|mlb|nhl|ncaa|fifa|uefa|premier league)\b",
                r"\b(football|soccer|basketball|baseball|hockey|tennis|golf|cricket|rugby)\b",
                r"\b(olympics|grand prix|motogp|nascar|formula 1|formula one)\b",
                r"\bsports?center\b",
            ]),
        ),
        (
            "News",
            rules(&[
                r"\b(news|newscast|headlines)\b",
                r"\b(breaking|world|local|evening|morning) news\b",
                r"\bweather (report|update)\b",
            ]),
        ),
        (
            "Movies",
            rules(&[
                r"\b(movie|film|cinema)\b",
                r"\bfeature presentation\b",
            ]),
        ),
        (
            "Kids",
            rules(&[
                r"\b(cartoon|animated series|kids|children)\b",
                r"\b(sesame street|paw patrol|peppa pig)\b",
            ]),
        ),
        (
            "Documentary",
            rules(&[
                r"\b(documentary|docuseries)\b",
                r"\b(nature|wildlife|history) (special|series)\b",
            ]),
        ),
        (
            "Music",
            rules(&[
                r"\b(concert|music video|live session|symphony|orchestra)\b",
                r"\btop of the pops\b",
            ]),
        ),
        (
            "Reality",
            rules(&[
                r"\breality (tv|show|series)\b",
                r"\b(big brother|survivor|bake off)\b",
            ]),
        ),
    ]
});

/// Scan buffer for one programme: lowercased titles and descriptions.
fn scan_buffer(programme: &Programme) -> String {
    let mut buf = String::new();
    for title in &programme.titles {
        buf.push_str(&title.text.to_lowercase());
        buf.push(' ');
    }
    for desc in &programme.descs {
        buf.push_str(&desc.text.to_lowercase());
        buf.push(' ');
    }
    buf
}

/// Apply the enrichment table to one programme; returns categories added.
pub fn enrich_programme(programme: &mut Programme) -> usize {
    let buffer = scan_buffer(programme);
    let mut added = 0;
    for (category, rules) in ENRICHMENT_TABLE.iter() {
        if programme.categories.contains(*category) {
            continue;
        }
        if rules.iter().any(|r| r.is_match(&buffer)) {
            programme.categories.insert(category.to_string());
            added += 1;
        }
    }
    added
}

/// Apply the table across the merged guide; returns total categories added.
pub fn enrich_guide(guide: &mut MergedGuide) -> usize {
    let mut added = 0;
    for list in guide.programmes.values_mut() {
        for programme in list.iter_mut() {
            added += enrich_programme(programme);
        }
    }
    if added > 0 {
        debug!("enrichment added {added} categories");
    }
    added
}
