//! Evidence filtering: keyword and temporal reduction of the email corpus.
//!
//! Both filters are pure and deterministic. The keyword stage cuts a corpus
//! of tens of thousands of messages down to the travel-related fraction
//! before any extraction call is made; the temporal stage then keeps only
//! messages whose send date could plausibly document one of the open gaps.
//! The result is a single pooled working set processed once, not once per
//! gap.

use chrono::{Duration, NaiveDate};

use crate::config::WindowConfig;
use crate::models::{EmailDocument, Gap};

/// Keep documents where at least one vocabulary term appears in the
/// subject, sender, or body (case-insensitive substring match).
pub fn keyword_filter(docs: Vec<EmailDocument>, terms: &[String]) -> Vec<EmailDocument> {
    docs.into_iter()
        .filter(|doc| {
            let subject = doc.subject.to_lowercase();
            let sender = doc.sender.to_lowercase();
            let body = doc.body.to_lowercase();
            terms.iter().any(|term| {
                subject.contains(term) || sender.contains(term) || body.contains(term)
            })
        })
        .collect()
}

/// The date range in which evidence for a gap may have been sent.
///
/// The lookback captures advance bookings made long before travel; the
/// lookahead buffer captures late confirmations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GapWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl GapWindow {
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Compute a gap's evidence window:
/// `[prior_arrival − lookback, next_departure + lookahead]`.
pub fn gap_window(gap: &Gap, window: &WindowConfig) -> GapWindow {
    GapWindow {
        start: gap.prior_arrival_date - Duration::days(window.lookback_days),
        end: gap.next_departure_date + Duration::days(window.lookahead_days),
    }
}

/// Keep documents whose send date falls inside at least one gap's window.
/// Documents without a parseable date cannot satisfy any window and are
/// dropped.
pub fn temporal_filter(
    docs: Vec<EmailDocument>,
    gaps: &[Gap],
    window: &WindowConfig,
) -> Vec<EmailDocument> {
    let windows: Vec<GapWindow> = gaps.iter().map(|g| gap_window(g, window)).collect();

    docs.into_iter()
        .filter(|doc| match doc.date {
            Some(date) => windows.iter().any(|w| w.contains(date)),
            None => false,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GapKind;

    fn doc(subject: &str, sender: &str, body: &str, date: Option<&str>) -> EmailDocument {
        EmailDocument {
            file: "mail-0001.eml".into(),
            subject: subject.into(),
            sender: sender.into(),
            date: date.map(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").unwrap()),
            body: body.into(),
        }
    }

    fn gap(prior_arrival: &str, next_departure: &str) -> Gap {
        Gap {
            prior_index: 0,
            next_index: 1,
            kind: GapKind::Country,
            low_confidence: false,
            prior_arrival_country: "PH".into(),
            prior_arrival_city: "Manila".into(),
            prior_arrival_date: NaiveDate::parse_from_str(prior_arrival, "%Y-%m-%d").unwrap(),
            next_departure_country: "MY".into(),
            next_departure_city: "Kuala Lumpur".into(),
            next_departure_date: NaiveDate::parse_from_str(next_departure, "%Y-%m-%d").unwrap(),
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
    fn test_keyword_match_in_any_field() {
        let docs = vec![
            doc("Your flight confirmation", "noreply@shop.example", "order", Some("2023-02-01")),
            doc("Receipt", "bookings@airasia.com", "order", Some("2023-02-01")),
            doc("Hi", "friend@example.com", "see you at the airport", Some("2023-02-01")),
            doc("Invoice", "billing@shop.example", "your order has shipped", Some("2023-02-01")),
        ];
        let terms = vec!["flight".to_string(), "airasia".to_string(), "airport".to_string()];
        let kept = keyword_filter(docs, &terms);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_keyword_filter_monotonic_in_vocabulary() {
        let docs: Vec<_> = vec![
            doc("flight to KL", "a@example.com", "", Some("2023-02-01")),
            doc("dinner plans", "b@example.com", "see you tonight", Some("2023-02-01")),
        ];
        let base = vec!["flight".to_string()];
        let extended = vec!["flight".to_string(), "dinner".to_string()];

        let kept_base = keyword_filter(docs.clone(), &base);
        let kept_extended = keyword_filter(docs, &extended);
        assert!(kept_extended.len() >= kept_base.len());
    }

    #[test]
    fn test_temporal_window_bounds() {
        let g = gap("2023-02-06", "2023-02-09");
        let w = window();

        let docs = vec![
            doc("a", "a@example.com", "", Some("2022-01-15")), // > 12 months before
            doc("b", "b@example.com", "", Some("2022-02-05")), // one day outside lookback
            doc("c", "c@example.com", "", Some("2022-06-01")), // advance booking, in window
            doc("d", "d@example.com", "", Some("2023-02-10")), // inside lookahead buffer
            doc("e", "e@example.com", "", Some("2023-02-17")), // past lookahead buffer
            doc("f", "f@example.com", "", None),               // undated
        ];

        let kept = temporal_filter(docs, &[g], &w);
        let subjects: Vec<_> = kept.iter().map(|d| d.subject.as_str()).collect();
        assert_eq!(subjects, vec!["c", "d"]);
    }

    #[test]
    fn test_temporal_any_gap_retains() {
        let gaps = vec![gap("2023-02-06", "2023-02-09"), gap("2024-06-01", "2024-06-05")];
        let docs = vec![doc("later trip", "x@example.com", "", Some("2024-05-20"))];
        let kept = temporal_filter(docs, &gaps, &window());
        assert_eq!(kept.len(), 1);
    }
}
