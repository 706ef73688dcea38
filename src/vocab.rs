//! Travel keyword vocabulary.
//!
//! A flat file of terms, one per line, maintained outside the code and
//! reloadable between runs. The vocabulary is held by an explicit value
//! passed to the filters rather than ambient state, and gap locations are
//! injected per run via [`Vocabulary::with_gap_terms`].

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::country::country_search_terms;
use crate::models::Gap;

/// Minimal built-in term list used when the vocabulary file is missing.
const FALLBACK_TERMS: &[&str] = &[
    "flight", "airline", "airport", "departure", "arrival", "boarding",
    "ticket", "booking", "reservation", "itinerary", "hotel", "travel",
    "trip", "journey", "vacation", "holiday", "tour", "tourism",
];

/// The active keyword vocabulary, lowercased.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    path: Option<PathBuf>,
    terms: Vec<String>,
}

impl Vocabulary {
    /// Load terms from a file, skipping blank lines and `#` comments.
    ///
    /// Falls back to the built-in list (with a warning) when the file does
    /// not exist; other I/O errors are surfaced.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            eprintln!(
                "Warning: keywords file not found: {}; using built-in fallback list",
                path.display()
            );
            return Ok(Self {
                path: Some(path.to_path_buf()),
                terms: FALLBACK_TERMS.iter().map(|t| t.to_string()).collect(),
            });
        }

        let terms = read_terms(path)?;
        Ok(Self {
            path: Some(path.to_path_buf()),
            terms,
        })
    }

    /// Build a vocabulary from an in-memory term list.
    pub fn from_terms(terms: impl IntoIterator<Item = String>) -> Self {
        Self {
            path: None,
            terms: terms
                .into_iter()
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }

    /// Re-read the backing file, picking up edits made since [`load`].
    ///
    /// [`load`]: Vocabulary::load
    pub fn reload(&mut self) -> Result<()> {
        if let Some(path) = self.path.clone() {
            if path.exists() {
                self.terms = read_terms(&path)?;
            }
        }
        Ok(())
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// The run's effective term list: the vocabulary plus every gap's
    /// location names (cities, country codes, and common country-name
    /// variants), deduplicated and lowercased. Location terms keep emails
    /// that mention a gap endpoint but none of the generic travel words.
    pub fn with_gap_terms(&self, gaps: &[Gap]) -> Vec<String> {
        let mut combined = self.terms.clone();

        for gap in gaps {
            for city in [&gap.prior_arrival_city, &gap.next_departure_city] {
                let city = city.trim().to_lowercase();
                if !city.is_empty() {
                    combined.push(city);
                }
            }
            combined.extend(country_search_terms(&gap.prior_arrival_country));
            combined.extend(country_search_terms(&gap.next_departure_country));
        }

        combined.sort();
        combined.dedup();
        combined
    }
}

fn read_terms(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read keywords file: {}", path.display()))?;

    Ok(content
        .lines()
        .map(|line| line.trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| line.to_lowercase())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GapKind;
    use chrono::NaiveDate;

    fn gap(prior_city: &str, prior_country: &str, next_city: &str, next_country: &str) -> Gap {
        Gap {
            prior_index: 0,
            next_index: 1,
            kind: GapKind::Country,
            low_confidence: false,
            prior_arrival_country: prior_country.into(),
            prior_arrival_city: prior_city.into(),
            prior_arrival_date: NaiveDate::from_ymd_opt(2023, 2, 5).unwrap(),
            next_departure_country: next_country.into(),
            next_departure_city: next_city.into(),
            next_departure_date: NaiveDate::from_ymd_opt(2023, 2, 8).unwrap(),
        }
    }

    #[test]
    fn test_load_skips_comments_and_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.txt");
        std::fs::write(&path, "# travel terms\nFlight\n\nboarding pass\n").unwrap();

        let vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.terms(), &["flight", "boarding pass"]);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = Vocabulary::load(&dir.path().join("nope.txt")).unwrap();
        assert!(vocab.terms().contains(&"flight".to_string()));
    }

    #[test]
    fn test_reload_picks_up_edits() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("keywords.txt");
        std::fs::write(&path, "flight\n").unwrap();

        let mut vocab = Vocabulary::load(&path).unwrap();
        assert_eq!(vocab.len(), 1);

        std::fs::write(&path, "flight\nferry\n").unwrap();
        vocab.reload().unwrap();
        assert_eq!(vocab.len(), 2);
    }

    #[test]
    fn test_gap_terms_injected() {
        let vocab = Vocabulary::from_terms(["flight".to_string()]);
        let terms = vocab.with_gap_terms(&[gap("Manila", "PH", "Kuala Lumpur", "MY")]);

        assert!(terms.contains(&"manila".to_string()));
        assert!(terms.contains(&"kuala lumpur".to_string()));
        assert!(terms.contains(&"philippines".to_string()));
        assert!(terms.contains(&"malaysia".to_string()));
        assert!(terms.contains(&"my".to_string()));
        // Base vocabulary is always retained.
        assert!(terms.contains(&"flight".to_string()));
    }

    #[test]
    fn test_gap_terms_deduplicated() {
        let vocab = Vocabulary::from_terms(["manila".to_string()]);
        let terms = vocab.with_gap_terms(&[gap("Manila", "PH", "Manila", "PH")]);
        assert_eq!(terms.iter().filter(|t| t.as_str() == "manila").count(), 1);
    }
}
