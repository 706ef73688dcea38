//! Reconciliation of extracted candidate records against open gaps.
//!
//! A candidate fills a gap when its departure corresponds to the gap's
//! prior-arrival location, its arrival to the gap's next-departure
//! location, and its travel date sits in or near the gap period. Candidates
//! are pooled globally: each is usable by at most one gap, and gaps are
//! resolved in itinerary order.
//!
//! Resolution policy is conservative: a single record wins whenever one
//! matches; a pair of records is accepted only when it is location-chained
//! and date-contiguous end to end (a car lift followed by a flight). Longer
//! chains are left to the unfilled report rather than guessed at.

use std::collections::HashSet;

use crate::config::WindowConfig;
use crate::country::{city_matches, is_alpha2};
use crate::models::{CandidateRecord, Gap};

/// One gap's accepted candidate legs, in chronological order.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub gap_index: usize,
    pub legs: Vec<CandidateRecord>,
}

fn country_compatible(a: &str, b: &str) -> bool {
    // Only enforce equality when both sides are trustworthy codes.
    if !is_alpha2(a) || !is_alpha2(b) {
        return true;
    }
    a.eq_ignore_ascii_case(b)
}

/// Hard filter: does the candidate depart from the gap's prior-arrival
/// location?
fn departs_from_gap(candidate: &CandidateRecord, gap: &Gap) -> bool {
    city_matches(&candidate.departure_city, &gap.prior_arrival_city)
        && country_compatible(&candidate.departure_country, &gap.prior_arrival_country)
}

/// Hard filter: does the candidate arrive at the gap's next-departure
/// location?
fn arrives_at_gap(candidate: &CandidateRecord, gap: &Gap) -> bool {
    city_matches(&candidate.arrival_city, &gap.next_departure_city)
        && country_compatible(&candidate.arrival_country, &gap.next_departure_country)
}

/// Days from the gap period to the candidate's departure date; zero when
/// the date lies inside the period.
fn distance_to_gap(candidate: &CandidateRecord, gap: &Gap) -> i64 {
    if candidate.departure_date < gap.prior_arrival_date {
        (gap.prior_arrival_date - candidate.departure_date).num_days()
    } else if candidate.departure_date > gap.next_departure_date {
        (candidate.departure_date - gap.next_departure_date).num_days()
    } else {
        0
    }
}

fn within_slack(candidate: &CandidateRecord, gap: &Gap, slack_days: i64) -> bool {
    distance_to_gap(candidate, gap) <= slack_days
}

fn overlaps(a: &CandidateRecord, b: &CandidateRecord) -> bool {
    a.departure_instant() < b.arrival_instant() && b.departure_instant() < a.arrival_instant()
}

/// Match candidates to gaps, resolving each gap to zero, one, or (for
/// chained transport) two records.
pub fn match_candidates(
    gaps: &[Gap],
    candidates: &[CandidateRecord],
    window: &WindowConfig,
) -> Vec<Resolution> {
    // Inverted candidates are malformed; drop them before scoring.
    let pool: Vec<(usize, &CandidateRecord)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.arrival_instant() >= c.departure_instant())
        .collect();

    let mut used: HashSet<usize> = HashSet::new();
    let mut accepted: Vec<CandidateRecord> = Vec::new();
    let mut resolutions = Vec::new();

    for (gap_index, gap) in gaps.iter().enumerate() {
        if let Some(idx) = pick_single(gap, &pool, &used, &accepted, window) {
            let candidate = candidates[idx].clone();
            used.insert(idx);
            accepted.push(candidate.clone());
            resolutions.push(Resolution {
                gap_index,
                legs: vec![candidate],
            });
            continue;
        }

        if let Some((first, second)) = pick_chain(gap, &pool, &used, window) {
            let legs = vec![candidates[first].clone(), candidates[second].clone()];
            used.insert(first);
            used.insert(second);
            accepted.extend(legs.iter().cloned());
            resolutions.push(Resolution { gap_index, legs });
        }
    }

    resolutions
}

/// Best single candidate for a gap: exact-period dates first, then nearest
/// date, then non-overlap with already-accepted records, then the most
/// populated extraction.
fn pick_single(
    gap: &Gap,
    pool: &[(usize, &CandidateRecord)],
    used: &HashSet<usize>,
    accepted: &[CandidateRecord],
    window: &WindowConfig,
) -> Option<usize> {
    pool.iter()
        .filter(|(idx, c)| {
            !used.contains(idx)
                && departs_from_gap(c, gap)
                && arrives_at_gap(c, gap)
                && within_slack(c, gap, window.match_slack_days)
        })
        .min_by_key(|(_, c)| {
            (
                distance_to_gap(c, gap),
                accepted.iter().any(|a| overlaps(a, c)),
                std::cmp::Reverse(c.populated_fields),
            )
        })
        .map(|(idx, _)| *idx)
}

/// Two-leg chain closing the gap end to end: the first leg departs the
/// gap's start, the second arrives at its end, the intermediate locations
/// agree, and the dates are contiguous.
fn pick_chain(
    gap: &Gap,
    pool: &[(usize, &CandidateRecord)],
    used: &HashSet<usize>,
    window: &WindowConfig,
) -> Option<(usize, usize)> {
    let slack = window.match_slack_days;

    let mut best: Option<((i64, std::cmp::Reverse<u32>), (usize, usize))> = None;

    for (i, first) in pool.iter().filter(|(idx, _)| !used.contains(idx)) {
        if !departs_from_gap(first, gap) || !within_slack(first, gap, slack) {
            continue;
        }
        for (j, second) in pool.iter().filter(|(idx, _)| !used.contains(idx)) {
            if i == j
                || !arrives_at_gap(second, gap)
                || !within_slack(second, gap, slack)
                || !city_matches(&first.arrival_city, &second.departure_city)
                || first.arrival_instant() > second.departure_instant()
            {
                continue;
            }

            let score = (
                distance_to_gap(first, gap) + distance_to_gap(second, gap),
                std::cmp::Reverse(first.populated_fields + second.populated_fields),
            );
            if best.as_ref().map_or(true, |(s, _)| score < *s) {
                best = Some((score, (*i, *j)));
            }
        }
    }

    best.map(|(_, pair)| pair)
}
