//! Fuzzy temporal matching.
//!
//! Two programme records on the same channel describe the same broadcast when
//! their intervals strictly overlap, or when both endpoints sit within the
//! configured window. Sources report the same broadcast with small schedule
//! skews, and some truncate programmes at day boundaries.

use crate::models::Programme;

/// Decide whether `a` and `b` refer to the same broadcast.
pub fn same_broadcast(a: &Programme, b: &Programme, fuzzy_ms: i64) -> bool {
    let (a_start, a_stop) = (a.start.timestamp_millis(), a.stop.timestamp_millis());
    let (b_start, b_stop) = (b.start.timestamp_millis(), b.stop.timestamp_millis());

    if a_start < b_stop && a_stop > b_start {
        return true;
    }
    (a_start - b_start).abs() <= fuzzy_ms && (a_stop - b_stop).abs() <= fuzzy_ms
}
