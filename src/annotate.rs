//! Connection-analysis annotation for an existing itinerary CSV.
//!
//! Adds `next_country_match` and `next_city_match` columns that record
//! whether each row's arrival already connects to the following row's
//! departure. A labelling pass only: rows are never reordered or modified.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::country::city_eq;

/// Values written into the connection columns.
const MATCH_YES: &str = "yes";
const MATCH_NO: &str = "no";
const MATCH_NA: &str = "n/a";

#[derive(Debug, Clone, serde::Deserialize)]
struct AnnotateRow {
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

/// Compute the two connection columns for each row. The last row has no
/// successor and gets `n/a`.
fn connection_columns(rows: &[AnnotateRow]) -> Vec<(String, String)> {
    rows.iter()
        .enumerate()
        .map(|(i, row)| {
            let Some(next) = rows.get(i + 1) else {
                return (MATCH_NA.to_string(), MATCH_NA.to_string());
            };

            let country_match = !row.arrival_country.is_empty()
                && !next.departure_country.is_empty()
                && row
                    .arrival_country
                    .eq_ignore_ascii_case(&next.departure_country);
            let city_match = !row.arrival_city.is_empty()
                && !next.departure_city.is_empty()
                && city_eq(&row.arrival_city, &next.departure_city);

            (
                if country_match { MATCH_YES } else { MATCH_NO }.to_string(),
                if city_match { MATCH_YES } else { MATCH_NO }.to_string(),
            )
        })
        .collect()
}

/// Derived output path: `<stem>_with_connections.csv` next to the input.
pub fn annotated_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "itinerary".to_string());
    input.with_file_name(format!("{}_with_connections.csv", stem))
}

/// Read an itinerary CSV, append the connection columns, and write the
/// annotated copy. Returns the output path.
pub fn run_annotate(input: &Path) -> Result<PathBuf> {
    let mut reader = csv::Reader::from_path(input)
        .with_context(|| format!("failed to open itinerary file: {}", input.display()))?;

    let rows: Vec<AnnotateRow> = reader
        .deserialize()
        .collect::<Result<_, _>>()
        .with_context(|| "failed to read itinerary rows")?;

    let columns = connection_columns(&rows);
    let output = annotated_path(input);

    let mut writer = csv::Writer::from_path(&output)
        .with_context(|| format!("failed to create output file: {}", output.display()))?;
    writer.write_record([
        "departure_country",
        "departure_city",
        "departure_date",
        "departure_time",
        "arrival_country",
        "arrival_city",
        "arrival_date",
        "arrival_time",
        "notes",
        "source_file",
        "next_country_match",
        "next_city_match",
    ])?;

    let mut country_matches = 0usize;
    let mut city_matches = 0usize;

    for (row, (country_col, city_col)) in rows.iter().zip(&columns) {
        if country_col == MATCH_YES {
            country_matches += 1;
        }
        if city_col == MATCH_YES {
            city_matches += 1;
        }
        writer.write_record([
            row.departure_country.as_str(),
            row.departure_city.as_str(),
            row.departure_date.as_str(),
            row.departure_time.as_str(),
            row.arrival_country.as_str(),
            row.arrival_city.as_str(),
            row.arrival_date.as_str(),
            row.arrival_time.as_str(),
            row.notes.as_str(),
            row.source_file.as_str(),
            country_col.as_str(),
            city_col.as_str(),
        ])?;
    }
    writer.flush()?;

    let pairs = rows.len().saturating_sub(1);
    println!("annotate {}", input.display());
    println!("  rows: {}", rows.len());
    println!("  country matches: {}/{}", country_matches, pairs);
    println!("  city matches: {}/{}", city_matches, pairs);
    println!("  written: {}", output.display());

    Ok(output)
}
