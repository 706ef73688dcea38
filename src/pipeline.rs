//! Pipeline orchestration for the CLI commands.
//!
//! Wires the components end to end for a fill run: load and sort the
//! itinerary, analyze gaps, scan and filter the email corpus, run batched
//! extraction, match candidates to gaps, merge with re-validation, and
//! persist the completed itinerary under a timestamped name. Also hosts
//! the lighter `gaps` and `check` commands.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::batcher::{self, ExtractionOutcome};
use crate::config::{Config, WindowConfig};
use crate::connector_mail;
use crate::country::city_eq;
use crate::extraction;
use crate::filter::{gap_window, keyword_filter, temporal_filter};
use crate::gaps::{analyze_gaps, detect_incongruent_events};
use crate::matcher::match_candidates;
use crate::merge::{merge_resolutions, MergeOutcome};
use crate::models::{Gap, GapKind, GapOutcome, IncongruentEvent, TravelLeg};
use crate::store::{output_filename, ItineraryStore};
use crate::vocab::Vocabulary;

/// Identify gaps in the configured itinerary without touching the corpus.
pub fn run_gaps(config: &Config) -> Result<()> {
    let store = ItineraryStore::load(&config.itinerary.path)?;
    let gaps = analyze_gaps(store.legs()).context("gap analysis failed")?;
    let events = detect_incongruent_events(store.legs());

    println!("gaps {}", config.itinerary.path.display());
    println!("  legs loaded: {}", store.len());
    print_gap_listing(&gaps);
    print_incongruent(&events);

    Ok(())
}

/// Check whether the configured itinerary's gaps are already connected in
/// an arbitrary existing CSV file.
pub fn run_check(config: &Config, file: &Path) -> Result<()> {
    let store = ItineraryStore::load(&config.itinerary.path)?;
    let gaps = analyze_gaps(store.legs()).context("gap analysis failed")?;
    let check = ItineraryStore::load(file)?;

    let mut filled = 0usize;
    println!("check {}", file.display());
    for (i, gap) in gaps.iter().enumerate() {
        let connected = check.legs().iter().any(|leg| connects(leg, gap));
        if connected {
            filled += 1;
            println!(
                "  #{} {} {} -> {}: connected",
                i + 1,
                gap.kind.label(),
                gap.prior_arrival_city,
                gap.next_departure_city
            );
        } else {
            println!(
                "  #{} {} {} -> {}: not connected",
                i + 1,
                gap.kind.label(),
                gap.prior_arrival_city,
                gap.next_departure_city
            );
        }
    }
    println!("  gaps connected: {}/{}", filled, gaps.len());

    Ok(())
}

fn connects(leg: &TravelLeg, gap: &Gap) -> bool {
    city_eq(&leg.departure_city, &gap.prior_arrival_city)
        && city_eq(&leg.arrival_city, &gap.next_departure_city)
}

/// Full processing: detect gaps, mine the corpus for evidence, extract,
/// match, merge, and save the completed itinerary.
pub async fn run_fill(config: &Config) -> Result<()> {
    let mut store = ItineraryStore::load(&config.itinerary.path)?;
    let gaps = analyze_gaps(store.legs()).context("gap analysis failed")?;
    let events = detect_incongruent_events(store.legs());

    println!("fill {}", config.itinerary.path.display());
    println!("  legs loaded: {}", store.len());
    print_gap_listing(&gaps);

    if gaps.is_empty() {
        println!("  nothing to fill");
        print_incongruent(&events);
        return save_store(&store, config);
    }

    // Corpus scan and the two filtering stages.
    let corpus = connector_mail::scan_mailbox(config)?;
    println!("  emails scanned: {}", corpus.len());

    let vocab = Vocabulary::load(&config.keywords.path)?;
    let terms = vocab.with_gap_terms(&gaps);
    println!(
        "  keywords: {} ({} from vocabulary)",
        terms.len(),
        vocab.len()
    );

    let kept = keyword_filter(corpus, &terms);
    println!("  keyword matches: {}", kept.len());

    let kept = temporal_filter(kept, &gaps, &config.window);
    println!("  within gap windows: {}", kept.len());

    // Batched extraction over the pooled working set.
    let provider = extraction::create_provider(&config.extraction)?;
    let provider: Arc<dyn extraction::ExtractionProvider> = Arc::from(provider);
    let outcome = batcher::run_extraction(provider, &config.extraction, &kept, &gaps).await?;
    println!(
        "  extraction batches: {} ({} failed)",
        outcome.batches_total, outcome.batches_failed
    );
    println!("  candidate records: {}", outcome.candidates.len());

    // Reconcile and merge.
    let resolutions = match_candidates(&gaps, &outcome.candidates, &config.window);
    let merge_outcome = merge_resolutions(&mut store, &gaps, resolutions);

    let outcomes = gap_outcomes(&gaps, &merge_outcome, &outcome, &config.window);
    print_report(&gaps, &outcomes);
    print_incongruent(&events);

    save_store(&store, config)
}

/// Decide each gap's reported outcome.
///
/// An unfilled gap is `RetriesExhausted` only when a failed batch held an
/// email dated inside that gap's evidence window; otherwise there was
/// simply no matching evidence.
pub fn gap_outcomes(
    gaps: &[Gap],
    merge: &MergeOutcome,
    extraction: &ExtractionOutcome,
    window: &WindowConfig,
) -> Vec<GapOutcome> {
    gaps.iter()
        .enumerate()
        .map(|(i, gap)| {
            if let Some((_, sources)) = merge.filled.iter().find(|(idx, _)| *idx == i) {
                return GapOutcome::Filled {
                    sources: sources.clone(),
                };
            }
            if let Some((_, reason)) = merge.rejected.iter().find(|(idx, _)| *idx == i) {
                return GapOutcome::ValidationRejected {
                    reason: reason.clone(),
                };
            }

            let w = gap_window(gap, window);
            let evidence_lost = extraction
                .failed_emails
                .iter()
                .any(|(_, date)| date.map(|d| w.contains(d)).unwrap_or(false));
            if evidence_lost {
                GapOutcome::RetriesExhausted
            } else {
                GapOutcome::NoMatchingEvidence
            }
        })
        .collect()
}

fn print_gap_listing(gaps: &[Gap]) {
    let country = gaps.iter().filter(|g| g.kind == GapKind::Country).count();
    let city = gaps.len() - country;

    for (i, gap) in gaps.iter().enumerate() {
        let confidence = if gap.low_confidence {
            "  (low-confidence classification)"
        } else {
            ""
        };
        println!(
            "  #{} {} {} ({}) -> {} ({}), {} to {} [{} days]{}",
            i + 1,
            gap.kind.label(),
            gap.prior_arrival_city,
            gap.prior_arrival_country,
            gap.next_departure_city,
            gap.next_departure_country,
            gap.prior_arrival_date,
            gap.next_departure_date,
            gap.days_between(),
            confidence
        );
    }
    println!(
        "  country gaps: {} ({})",
        country,
        GapKind::Country.severity().label()
    );
    println!(
        "  city gaps: {} ({})",
        city,
        GapKind::City.severity().label()
    );
}

fn print_report(gaps: &[Gap], outcomes: &[GapOutcome]) {
    let filled = outcomes
        .iter()
        .filter(|o| matches!(o, GapOutcome::Filled { .. }))
        .count();

    println!("gap report");
    for (i, (gap, outcome)) in gaps.iter().zip(outcomes).enumerate() {
        let status = match outcome {
            GapOutcome::Filled { sources } => format!("filled via {}", sources.join(", ")),
            GapOutcome::NoMatchingEvidence => "unfilled (no matching evidence)".to_string(),
            GapOutcome::RetriesExhausted => "unfilled (retries exhausted)".to_string(),
            GapOutcome::ValidationRejected { reason } => {
                format!("unfilled (validation rejected: {})", reason)
            }
        };
        println!(
            "  #{} {} {} -> {}: {}",
            i + 1,
            gap.kind.label(),
            gap.prior_arrival_city,
            gap.next_departure_city,
            status
        );
    }
    println!("  gaps filled: {}/{}", filled, gaps.len());
}

fn print_incongruent(events: &[IncongruentEvent]) {
    if events.is_empty() {
        return;
    }
    println!("warnings");
    for event in events {
        println!("  {}", event);
    }
}

fn save_store(store: &ItineraryStore, config: &Config) -> Result<()> {
    let name = output_filename(chrono::Local::now().naive_local());
    let path = config.itinerary.output_dir.join(name);
    store.save(&path)?;
    println!("  written: {}", path.display());
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GapKind;
    use chrono::NaiveDate;

    fn gap(prior: &str, next: &str) -> Gap {
        Gap {
            prior_index: 0,
            next_index: 1,
            kind: GapKind::Country,
            low_confidence: false,
            prior_arrival_country: "PH".into(),
            prior_arrival_city: "Manila".into(),
            prior_arrival_date: NaiveDate::parse_from_str(prior, "%Y-%m-%d").unwrap(),
            next_departure_country: "MY".into(),
            next_departure_city: "Kuala Lumpur".into(),
            next_departure_date: NaiveDate::parse_from_str(next, "%Y-%m-%d").unwrap(),
        }
    }

    fn window() -> WindowConfig {
        WindowConfig {
            lookback_days: 365,
            lookahead_days: 7,
            match_slack_days: 7,
        }
    }

    #[test]
    fn test_outcome_filled() {
        let gaps = vec![gap("2023-02-05", "2023-02-08")];
        let merge = MergeOutcome {
            filled: vec![(0, vec!["mail-0001.eml".to_string()])],
            rejected: vec![],
        };
        let extraction = ExtractionOutcome::default();

        let outcomes = gap_outcomes(&gaps, &merge, &extraction, &window());
        assert!(matches!(outcomes[0], GapOutcome::Filled { .. }));
    }

    #[test]
    fn test_outcome_retries_exhausted_vs_no_evidence() {
        let gaps = vec![
            gap("2023-02-05", "2023-02-08"),
            gap("2024-06-01", "2024-06-05"),
        ];
        let merge = MergeOutcome::default();
        // One failed batch carried an email inside the first gap's window
        // only.
        let extraction = ExtractionOutcome {
            batches_total: 2,
            batches_failed: 1,
            failed_emails: vec![(
                "lost.eml".to_string(),
                NaiveDate::from_ymd_opt(2023, 2, 6),
            )],
            ..Default::default()
        };

        let outcomes = gap_outcomes(&gaps, &merge, &extraction, &window());
        assert_eq!(outcomes[0], GapOutcome::RetriesExhausted);
        assert_eq!(outcomes[1], GapOutcome::NoMatchingEvidence);
    }

    #[test]
    fn test_outcome_validation_rejected() {
        let gaps = vec![gap("2023-02-05", "2023-02-08")];
        let merge = MergeOutcome {
            filled: vec![],
            rejected: vec![(0, "targeted gap still present after insertion".to_string())],
        };
        let extraction = ExtractionOutcome::default();

        let outcomes = gap_outcomes(&gaps, &merge, &extraction, &window());
        assert!(matches!(outcomes[0], GapOutcome::ValidationRejected { .. }));
    }
}
