//! Gap analysis over the sorted leg sequence.
//!
//! A gap exists between two adjacent legs when the first leg's arrival city
//! differs from the next leg's departure city. Classification is COUNTRY
//! when the normalized country codes differ, CITY otherwise. The analyzer
//! is a pure function of the sequence and refuses unsorted input so that
//! ordering bugs surface at the call site instead of producing bogus gaps.

use std::collections::BTreeMap;

use crate::country::{city_eq, clean_city_name, is_alpha2, normalize_country};
use crate::models::{Gap, GapKind, IncongruentEvent, IncongruentKind, TravelLeg};

/// The input sequence was not chronologically sorted.
///
/// Fatal to the analysis step; the caller must sort and retry. Sorting is
/// deliberately not performed here.
#[derive(Debug)]
pub struct DataOrderingError {
    /// Index of the first leg that is out of order relative to its
    /// predecessor.
    pub index: usize,
}

impl std::fmt::Display for DataOrderingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "leg sequence is not chronologically sorted (first violation at index {})",
            self.index
        )
    }
}

impl std::error::Error for DataOrderingError {}

/// Scan the sorted sequence and emit one [`Gap`] per adjacent pair whose
/// arrival city differs from the next departure city.
pub fn analyze_gaps(legs: &[TravelLeg]) -> Result<Vec<Gap>, DataOrderingError> {
    for (i, pair) in legs.windows(2).enumerate() {
        if pair[0].sort_key() > pair[1].sort_key() {
            return Err(DataOrderingError { index: i + 1 });
        }
    }

    let mut gaps = Vec::new();
    for (i, pair) in legs.windows(2).enumerate() {
        let prior = &pair[0];
        let next = &pair[1];

        if city_eq(&prior.arrival_city, &next.departure_city) {
            continue;
        }

        let prior_country = normalize_country(&prior.arrival_country);
        let next_country = normalize_country(&next.departure_country);
        let low_confidence = !is_alpha2(&prior_country) || !is_alpha2(&next_country);

        let kind = if prior_country.eq_ignore_ascii_case(&next_country) {
            GapKind::City
        } else {
            GapKind::Country
        };

        gaps.push(Gap {
            prior_index: i,
            next_index: i + 1,
            kind,
            low_confidence,
            prior_arrival_country: prior_country,
            prior_arrival_city: clean_city_name(&prior.arrival_city),
            prior_arrival_date: prior.arrival_date,
            next_departure_country: next_country,
            next_departure_city: clean_city_name(&next.departure_city),
            next_departure_date: next.departure_date,
        });
    }

    Ok(gaps)
}

/// Flag groups of legs departing the same location with overlapping or
/// near-duplicate schedules: likely missed flights or duplicate entries.
/// Reported only; nothing is auto-resolved.
pub fn detect_incongruent_events(legs: &[TravelLeg]) -> Vec<IncongruentEvent> {
    let mut events = Vec::new();

    // Multiple departures from the same city on the same date.
    let mut by_departure: BTreeMap<(String, chrono::NaiveDate), Vec<usize>> = BTreeMap::new();
    for (i, leg) in legs.iter().enumerate() {
        let city = clean_city_name(&leg.departure_city).to_lowercase();
        by_departure
            .entry((city, leg.departure_date))
            .or_default()
            .push(i);
    }

    for ((_, date), indices) in &by_departure {
        if indices.len() > 1 {
            events.push(IncongruentEvent {
                kind: IncongruentKind::MultipleDepartures,
                city: clean_city_name(&legs[indices[0]].departure_city),
                date: *date,
                leg_indices: indices.clone(),
            });
        }
    }

    // Same city and date with departure times under two hours apart.
    for i in 0..legs.len() {
        for j in (i + 1)..legs.len() {
            let (a, b) = (&legs[i], &legs[j]);
            if a.departure_date != b.departure_date
                || !city_eq(&a.departure_city, &b.departure_city)
            {
                continue;
            }
            let (Some(ta), Some(tb)) = (a.departure_time, b.departure_time) else {
                continue;
            };
            let diff = (ta - tb).abs();
            if diff < chrono::Duration::hours(2) {
                events.push(IncongruentEvent {
                    kind: IncongruentKind::OverlappingTimes {
                        first: ta,
                        second: tb,
                    },
                    city: clean_city_name(&a.departure_city),
                    date: a.departure_date,
                    leg_indices: vec![i, j],
                });
            }
        }
    }

    events
}
