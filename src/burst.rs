//! Burst detection
//!
//! Photos taken in rapid succession are grouped into numbered bursts with a
//! single greedy pass over the time-ordered photo set.

use crate::config::BurstConfig;
use crate::media::MediaRecord;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One detected burst
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurstGroup {
    /// Sequential id, starting at 1
    pub id: u32,
    /// Record positions (in the input slice) in timestamp order
    pub members: Vec<usize>,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl BurstGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Detect bursts over `(position, instant)` pairs
///
/// Entries are stably sorted by instant, so equal instants keep their input
/// order. A gap equal to the maximum interval still joins the run.
pub fn detect_bursts(times: &[(usize, NaiveDateTime)], config: &BurstConfig) -> Vec<BurstGroup> {
    let mut ordered = times.to_vec();
    ordered.sort_by_key(|(_, time)| *time);

    let max_gap = Duration::milliseconds((config.max_interval_secs * 1000.0).round() as i64);
    let mut groups = Vec::new();
    let mut run: Vec<(usize, NaiveDateTime)> = Vec::new();

    for entry in ordered {
        if let Some((_, last)) = run.last()
            && entry.1 - *last > max_gap
        {
            close_run(&mut run, config.min_count, &mut groups);
        }
        run.push(entry);
    }
    close_run(&mut run, config.min_count, &mut groups);

    groups
}

fn close_run(
    run: &mut Vec<(usize, NaiveDateTime)>,
    min_count: usize,
    groups: &mut Vec<BurstGroup>,
) {
    if run.len() >= min_count
        && let (Some(first), Some(last)) = (run.first(), run.last())
    {
        groups.push(BurstGroup {
            id: groups.len() as u32 + 1,
            start: first.1,
            end: last.1,
            members: run.iter().map(|(pos, _)| *pos).collect(),
        });
    }
    run.clear();
}

/// Assign burst group ids and indices to the photos of `records`
///
/// Previous assignments are cleared first. Videos and records without a
/// resolved date never take part.
pub fn assign_bursts(records: &mut [MediaRecord], config: &BurstConfig) -> Vec<BurstGroup> {
    for record in records.iter_mut() {
        record.clear_burst();
    }

    let times: Vec<(usize, NaiveDateTime)> = records
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_photo())
        .filter_map(|(pos, r)| r.precise_time().map(|t| (pos, t)))
        .collect();

    let groups = detect_bursts(&times, config);

    for group in &groups {
        for (i, pos) in group.members.iter().enumerate() {
            records[*pos].set_burst(group.id, i as u32 + 1);
        }
        debug!(
            group = group.id,
            count = group.len(),
            start = %group.start,
            end = %group.end,
            "Detected burst"
        );
    }

    groups
}
