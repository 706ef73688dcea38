//! Chronological insertion of matched records with re-validation.
//!
//! Matched insertions are applied one at a time, in ascending order of
//! their resolved departure instant, so each re-validation sees a
//! consistent, fully updated sequence. After each insertion the gap
//! analyzer re-runs over the store: if the targeted gap survives, or any
//! inserted leg leaves a fresh discontinuity against its new neighbors,
//! the insertion is rolled back and the gap stays reported as unfilled.

use chrono::NaiveDateTime;

use crate::gaps::analyze_gaps;
use crate::matcher::Resolution;
use crate::models::{Gap, TravelLeg};
use crate::store::ItineraryStore;

/// Per-gap result of the merge step.
#[derive(Debug, Default)]
pub struct MergeOutcome {
    /// Gap index and the email sources of its inserted legs.
    pub filled: Vec<(usize, Vec<String>)>,
    /// Gap index and the re-validation failure that rejected it.
    pub rejected: Vec<(usize, String)>,
}

/// Insert every resolution's legs into the store at their chronological
/// positions, re-validating after each resolution.
pub fn merge_resolutions(
    store: &mut ItineraryStore,
    gaps: &[Gap],
    mut resolutions: Vec<Resolution>,
) -> MergeOutcome {
    resolutions.sort_by_key(|r| {
        r.legs
            .first()
            .map(|l| l.departure_instant())
            .unwrap_or(NaiveDateTime::MIN)
    });

    let mut outcome = MergeOutcome::default();

    for resolution in resolutions {
        let Some(gap) = gaps.get(resolution.gap_index) else {
            continue;
        };

        let snapshot = store.snapshot();
        let inserted: Vec<TravelLeg> = resolution
            .legs
            .into_iter()
            .map(|c| c.into_leg())
            .collect();
        for leg in &inserted {
            store.insert(leg.clone());
        }

        match validate_insertion(store.legs(), &inserted, gap) {
            Ok(()) => {
                let sources = inserted.iter().map(|l| l.source_file.clone()).collect();
                outcome.filled.push((resolution.gap_index, sources));
            }
            Err(reason) => {
                store.restore(snapshot);
                outcome.rejected.push((resolution.gap_index, reason));
            }
        }
    }

    outcome
}

/// Re-run the gap analyzer and confirm the targeted gap is closed and the
/// inserted legs seam cleanly with their neighbors.
fn validate_insertion(
    legs: &[TravelLeg],
    inserted: &[TravelLeg],
    target: &Gap,
) -> Result<(), String> {
    let new_gaps = analyze_gaps(legs).map_err(|e| e.to_string())?;

    for gap in &new_gaps {
        let touches_inserted = [gap.prior_index, gap.next_index]
            .iter()
            .any(|&i| inserted.iter().any(|leg| &legs[i] == leg));
        if touches_inserted {
            return Err(format!(
                "inserted leg leaves a discontinuity at {} -> {}",
                gap.prior_arrival_city, gap.next_departure_city
            ));
        }

        if gap.prior_arrival_city.eq_ignore_ascii_case(&target.prior_arrival_city)
            && gap
                .next_departure_city
                .eq_ignore_ascii_case(&target.next_departure_city)
            && gap.prior_arrival_date == target.prior_arrival_date
            && gap.next_departure_date == target.next_departure_date
        {
            return Err("targeted gap still present after insertion".to_string());
        }
    }

    Ok(())
}
