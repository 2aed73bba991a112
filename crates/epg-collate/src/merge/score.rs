//! Quality scoring for channels and programmes.
//!
//! Scores only matter pairwise: a richer record beats a sparser one when two
//! sources describe the same channel or broadcast. The absolute values carry
//! no meaning.

use crate::models::{Channel, Programme};

/// Channel richness: icon and homepage presence plus a capped credit for the
/// display-name length.
pub fn score_channel(channel: &Channel) -> u32 {
    let mut score = 0;
    if channel.icon.is_some() {
        score += 3;
    }
    if channel.url.is_some() {
        score += 2;
    }
    score + (channel.display_name.len() as u32 / 6).min(10)
}

/// Programme richness: capped credit for the primary description length plus
/// flat bonuses for categories, sub-title, episode number, icon and rating.
pub fn score_programme(programme: &Programme) -> u32 {
    let desc_len = programme
        .descs
        .first()
        .map(|d| d.text.len())
        .unwrap_or(0) as u32;
    let mut score = (desc_len / 50).min(10);
    score += 2 * programme.categories.len() as u32;
    if !programme.sub_titles.is_empty() {
        score += 3;
    }
    if !programme.episode_nums.is_empty() {
        score += 5;
    }
    if !programme.icons.is_empty() {
        score += 1;
    }
    if !programme.ratings.is_empty() {
        score += 1;
    }
    score
}
