//! Itinerary store: persisted CSV itinerary and its chronological-order
//! invariant.
//!
//! The store owns the ordered leg sequence. Loading normalizes country
//! codes, drops malformed rows with a warning, and sorts; only the merge
//! step appends to it, and every append re-establishes the order.

use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::country::normalize_country;
use crate::models::{MalformedRecordError, TravelLeg, SOURCE_ORIGINAL};

/// Column layout of the persisted itinerary file.
#[derive(Debug, Deserialize, Serialize)]
struct CsvRow {
    departure_country: String,
    departure_city: String,
    departure_date: String,
    #[serde(default)]
    departure_time: String,
    arrival_country: String,
    arrival_city: String,
    arrival_date: String,
    #[serde(default)]
    arrival_time: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    source_file: String,
}

fn parse_date(field: &'static str, value: &str) -> Result<NaiveDate, MalformedRecordError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| MalformedRecordError::BadDate {
        field,
        value: value.to_string(),
    })
}

/// Parse an optional `HH:MM` time. Empty and `N/A` mean absent.
fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("n/a") {
        return None;
    }
    NaiveTime::parse_from_str(value, "%H:%M").ok()
}

fn format_time(time: Option<NaiveTime>) -> String {
    time.map(|t| t.format("%H:%M").to_string()).unwrap_or_default()
}

fn row_to_leg(row: CsvRow) -> Result<TravelLeg, MalformedRecordError> {
    let leg = TravelLeg {
        departure_country: normalize_country(&row.departure_country),
        departure_city: row.departure_city.trim().to_string(),
        departure_date: parse_date("departure_date", &row.departure_date)?,
        departure_time: parse_time(&row.departure_time),
        arrival_country: normalize_country(&row.arrival_country),
        arrival_city: row.arrival_city.trim().to_string(),
        arrival_date: parse_date("arrival_date", &row.arrival_date)?,
        arrival_time: parse_time(&row.arrival_time),
        notes: row.notes.trim().to_string(),
        source_file: if row.source_file.trim().is_empty() {
            SOURCE_ORIGINAL.to_string()
        } else {
            row.source_file.trim().to_string()
        },
    };

    if leg.arrival_instant() < leg.departure_instant() {
        return Err(MalformedRecordError::InvertedInstants);
    }

    Ok(leg)
}

fn leg_to_row(leg: &TravelLeg) -> CsvRow {
    CsvRow {
        departure_country: leg.departure_country.clone(),
        departure_city: leg.departure_city.clone(),
        departure_date: leg.departure_date.format("%Y-%m-%d").to_string(),
        departure_time: format_time(leg.departure_time),
        arrival_country: leg.arrival_country.clone(),
        arrival_city: leg.arrival_city.clone(),
        arrival_date: leg.arrival_date.format("%Y-%m-%d").to_string(),
        arrival_time: format_time(leg.arrival_time),
        notes: leg.notes.clone(),
        source_file: leg.source_file.clone(),
    }
}

/// Ordered in-memory collection of travel legs.
#[derive(Debug, Clone, Default)]
pub struct ItineraryStore {
    legs: Vec<TravelLeg>,
}

impl ItineraryStore {
    /// Build a store from unsorted legs; sorts on construction.
    pub fn from_legs(legs: Vec<TravelLeg>) -> Self {
        let mut store = Self { legs };
        store.sort();
        store
    }

    /// Load and sort the itinerary from a CSV file.
    ///
    /// Malformed rows (unparseable dates, inverted instants) are dropped
    /// with a warning; they never abort the load.
    pub fn load(path: &Path) -> Result<Self> {
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("failed to open itinerary file: {}", path.display()))?;

        let mut legs = Vec::new();
        let mut dropped = 0usize;
        for (i, result) in reader.deserialize::<CsvRow>().enumerate() {
            let row = result
                .with_context(|| format!("failed to read itinerary row {}", i + 1))?;
            match row_to_leg(row) {
                Ok(leg) => legs.push(leg),
                Err(e) => {
                    eprintln!("Warning: dropping itinerary row {}: {}", i + 1, e);
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            eprintln!("Warning: dropped {} malformed itinerary rows", dropped);
        }

        Ok(Self::from_legs(legs))
    }

    pub fn legs(&self) -> &[TravelLeg] {
        &self.legs
    }

    pub fn len(&self) -> usize {
        self.legs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.legs.is_empty()
    }

    /// Re-establish chronological order (stable, so equal keys keep their
    /// relative order).
    pub fn sort(&mut self) {
        self.legs.sort_by_key(|leg| leg.sort_key());
    }

    pub fn is_sorted(&self) -> bool {
        self.legs.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
    }

    /// Insert a leg at its chronological position and return the index it
    /// landed at. Equal sort keys insert after existing legs.
    pub fn insert(&mut self, leg: TravelLeg) -> usize {
        let key = leg.sort_key();
        let pos = self.legs.partition_point(|l| l.sort_key() <= key);
        self.legs.insert(pos, leg);
        pos
    }

    /// Copy of the current sequence, for rollback around a rejected merge.
    pub fn snapshot(&self) -> Vec<TravelLeg> {
        self.legs.clone()
    }

    pub fn restore(&mut self, legs: Vec<TravelLeg>) {
        self.legs = legs;
    }

    /// Persist the itinerary, chronologically sorted, to a CSV file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)
            .with_context(|| format!("failed to create output file: {}", path.display()))?;

        for leg in &self.legs {
            writer.serialize(leg_to_row(leg))?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Output filename with an embedded generation timestamp, matching the
/// input naming style (`all-travel-20230206-0930.csv`).
pub fn output_filename(now: chrono::NaiveDateTime) -> String {
    format!("all-travel-{}.csv", now.format("%Y%m%d-%H%M"))
}
