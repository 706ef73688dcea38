//! Core data models used throughout Itinerary Harness.
//!
//! These types represent the travel legs, detected gaps, extraction
//! candidates, and email documents that flow through the gap-filling
//! pipeline.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Source attribution value for legs present in the input itinerary.
pub const SOURCE_ORIGINAL: &str = "Original";

/// One journey segment of the itinerary.
///
/// Invariant: the departure instant is never after the arrival instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TravelLeg {
    pub departure_country: String,
    pub departure_city: String,
    pub departure_date: NaiveDate,
    pub departure_time: Option<NaiveTime>,
    pub arrival_country: String,
    pub arrival_city: String,
    pub arrival_date: NaiveDate,
    pub arrival_time: Option<NaiveTime>,
    pub notes: String,
    /// `"Original"` for rows loaded from the input file, otherwise the
    /// email file the leg was extracted from.
    pub source_file: String,
}

impl TravelLeg {
    /// Chronological sort key: departure date, then time.
    ///
    /// Legs without a departure time sort before timed legs on the same
    /// date (`None < Some` in `Option`'s ordering). One deterministic rule,
    /// applied everywhere legs are ordered.
    pub fn sort_key(&self) -> (NaiveDate, Option<NaiveTime>) {
        (self.departure_date, self.departure_time)
    }

    /// Departure instant with a missing time treated as midnight.
    pub fn departure_instant(&self) -> NaiveDateTime {
        self.departure_date
            .and_time(self.departure_time.unwrap_or(NaiveTime::MIN))
    }

    /// Arrival instant with a missing time treated as midnight.
    pub fn arrival_instant(&self) -> NaiveDateTime {
        self.arrival_date
            .and_time(self.arrival_time.unwrap_or(NaiveTime::MIN))
    }
}

/// Classification of a detected gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GapKind {
    /// Arrival and next-departure country codes differ.
    Country,
    /// Countries match but cities differ.
    City,
}

impl GapKind {
    pub fn severity(&self) -> Severity {
        match self {
            GapKind::Country => Severity::Critical,
            GapKind::City => Severity::Moderate,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GapKind::Country => "COUNTRY",
            GapKind::City => "CITY",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Moderate,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::Moderate => "moderate",
        }
    }
}

/// A detected discontinuity between leg `prior_index` and leg `next_index`.
///
/// Exists iff the prior leg's arrival city differs from the next leg's
/// departure city (case-insensitive, after airport-code stripping).
#[derive(Debug, Clone)]
pub struct Gap {
    pub prior_index: usize,
    pub next_index: usize,
    pub kind: GapKind,
    /// Set when either country field could not be normalized to a known
    /// ISO 3166-1 alpha-2 code, making the COUNTRY/CITY classification
    /// unreliable.
    pub low_confidence: bool,
    pub prior_arrival_country: String,
    pub prior_arrival_city: String,
    pub prior_arrival_date: NaiveDate,
    pub next_departure_country: String,
    pub next_departure_city: String,
    pub next_departure_date: NaiveDate,
}

impl Gap {
    /// Whole days between the prior arrival and the next departure.
    pub fn days_between(&self) -> i64 {
        (self.next_departure_date - self.prior_arrival_date).num_days()
    }
}

/// A travel record extracted from one email, not yet confirmed against
/// any gap.
#[derive(Debug, Clone)]
pub struct CandidateRecord {
    pub departure_country: String,
    pub departure_city: String,
    pub departure_date: NaiveDate,
    pub departure_time: Option<NaiveTime>,
    pub arrival_country: String,
    pub arrival_city: String,
    pub arrival_date: NaiveDate,
    pub arrival_time: Option<NaiveTime>,
    pub notes: String,
    /// The email file this record was extracted from.
    pub source_file: String,
    /// How many optional fields the extraction populated. Used as a
    /// confidence proxy when breaking ties between candidates.
    pub populated_fields: u32,
}

impl CandidateRecord {
    pub fn departure_instant(&self) -> NaiveDateTime {
        self.departure_date
            .and_time(self.departure_time.unwrap_or(NaiveTime::MIN))
    }

    pub fn arrival_instant(&self) -> NaiveDateTime {
        self.arrival_date
            .and_time(self.arrival_time.unwrap_or(NaiveTime::MIN))
    }

    /// Convert into a [`TravelLeg`] carrying the originating email as its
    /// source attribution.
    pub fn into_leg(self) -> TravelLeg {
        TravelLeg {
            departure_country: self.departure_country,
            departure_city: self.departure_city,
            departure_date: self.departure_date,
            departure_time: self.departure_time,
            arrival_country: self.arrival_country,
            arrival_city: self.arrival_city,
            arrival_date: self.arrival_date,
            arrival_time: self.arrival_time,
            notes: self.notes,
            source_file: self.source_file,
        }
    }
}

/// A record (input row or extraction output) that failed validation.
///
/// The offending record is dropped and logged; it never aborts a run.
#[derive(Debug)]
pub enum MalformedRecordError {
    MissingField(&'static str),
    BadDate { field: &'static str, value: String },
    InvertedInstants,
}

impl std::fmt::Display for MalformedRecordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MalformedRecordError::MissingField(field) => {
                write!(f, "missing required field: {}", field)
            }
            MalformedRecordError::BadDate { field, value } => {
                write!(f, "unparseable date in {}: '{}'", field, value)
            }
            MalformedRecordError::InvertedInstants => {
                write!(f, "arrival instant precedes departure instant")
            }
        }
    }
}

impl std::error::Error for MalformedRecordError {}

/// Parsed representation of one exported email message.
#[derive(Debug, Clone)]
pub struct EmailDocument {
    pub file: String,
    pub subject: String,
    pub sender: String,
    /// Send date, when the Date header could be parsed.
    pub date: Option<NaiveDate>,
    /// Cleaned plain-text body (HTML parts converted to text).
    pub body: String,
}

/// A data-quality flag for legs departing the same location with
/// conflicting schedules. Reported, never auto-resolved.
#[derive(Debug, Clone)]
pub struct IncongruentEvent {
    pub kind: IncongruentKind,
    pub city: String,
    pub date: NaiveDate,
    /// Indices of the conflicting legs in the sorted sequence.
    pub leg_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncongruentKind {
    /// More than one leg departs the same city on the same date.
    MultipleDepartures,
    /// Two departures from the same city on the same date less than two
    /// hours apart.
    OverlappingTimes { first: NaiveTime, second: NaiveTime },
}

impl std::fmt::Display for IncongruentEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            IncongruentKind::MultipleDepartures => write!(
                f,
                "multiple departures from {} on {} ({} legs)",
                self.city,
                self.date,
                self.leg_indices.len()
            ),
            IncongruentKind::OverlappingTimes { first, second } => write!(
                f,
                "overlapping departures from {} on {} at {} and {}",
                self.city,
                self.date,
                first.format("%H:%M"),
                second.format("%H:%M")
            ),
        }
    }
}

/// Filling outcome for one gap, reported at the end of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GapOutcome {
    /// Filled by one or more inserted legs; carries their email sources.
    Filled { sources: Vec<String> },
    /// No candidate record matched the gap.
    NoMatchingEvidence,
    /// A batch whose emails fell inside the gap's window failed after
    /// exhausting retries, so evidence may have been lost.
    RetriesExhausted,
    /// A matching candidate was found but its insertion was rejected by
    /// re-validation.
    ValidationRejected { reason: String },
}
