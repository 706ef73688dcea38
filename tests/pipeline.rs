//! End-to-end pipeline tests over temporary fixtures: a small itinerary
//! CSV, a handful of `.eml` files, and a mock extraction provider standing
//! in for the network.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use itinerary_harness::batcher::run_extraction;
use itinerary_harness::config::{Config, ExtractionConfig};
use itinerary_harness::connector_mail::scan_mailbox;
use itinerary_harness::extraction::{ExtractionError, ExtractionProvider};
use itinerary_harness::filter::{keyword_filter, temporal_filter};
use itinerary_harness::gaps::analyze_gaps;
use itinerary_harness::matcher::match_candidates;
use itinerary_harness::merge::merge_resolutions;
use itinerary_harness::models::{GapKind, GapOutcome};
use itinerary_harness::pipeline::gap_outcomes;
use itinerary_harness::store::ItineraryStore;
use itinerary_harness::vocab::Vocabulary;

/// Provider that returns a canned completion.
struct CannedProvider {
    response: String,
}

#[async_trait]
impl ExtractionProvider for CannedProvider {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn extract(&self, _prompt: &str) -> Result<String, ExtractionError> {
        Ok(self.response.clone())
    }
}

/// Provider that always hits the rate limit.
struct RateLimitedProvider;

#[async_trait]
impl ExtractionProvider for RateLimitedProvider {
    fn model_name(&self) -> &str {
        "rate-limited"
    }

    async fn extract(&self, _prompt: &str) -> Result<String, ExtractionError> {
        Err(ExtractionError::Transient("tokens per min exceeded".into()))
    }
}

fn setup_env(root: &Path, itinerary_csv: &str, emails: &[(&str, &str)]) -> Config {
    let mail_dir = root.join("mail");
    fs::create_dir_all(&mail_dir).unwrap();
    for (name, content) in emails {
        fs::write(mail_dir.join(name), content).unwrap();
    }

    let itinerary_path = root.join("itinerary.csv");
    fs::write(&itinerary_path, itinerary_csv).unwrap();

    let keywords_path = root.join("travel_keywords.txt");
    fs::write(&keywords_path, "# travel terms\nflight\nairline\nbooking\nhotel\n").unwrap();

    let config_toml = format!(
        r#"
        [itinerary]
        path = "{itin}"
        output_dir = "{out}"

        [mailbox]
        root = "{mail}"

        [keywords]
        path = "{keywords}"

        [extraction]
        batch_size = 8
        max_retries = 1
        inter_batch_delay_ms = 10
        concurrency = 2
        "#,
        itin = itinerary_path.display(),
        out = root.display(),
        mail = mail_dir.display(),
        keywords = keywords_path.display(),
    );
    toml::from_str(&config_toml).unwrap()
}

const HEADER: &str = "departure_country,departure_city,departure_date,departure_time,arrival_country,arrival_city,arrival_date,arrival_time,notes,source_file\n";

fn flight_eml(subject: &str, date_header: &str, body: &str) -> String {
    format!(
        "From: AirAsia <noreply@airasia.com>\r\n\
         To: traveller@example.com\r\n\
         Subject: {}\r\n\
         Date: {}\r\n\
         Content-Type: text/plain; charset=utf-8\r\n\
         \r\n\
         {}\r\n",
        subject, date_header, body
    )
}

#[tokio::test]
async fn country_gap_filled_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let itinerary = format!(
        "{}GB,London,2023-02-04,10:00,PH,Manila,2023-02-05,06:30,Flight,Original\n\
         MY,Kuala Lumpur,2023-02-08,09:00,SG,Singapore,2023-02-08,10:05,Flight,Original\n",
        HEADER
    );
    let config = setup_env(
        tmp.path(),
        &itinerary,
        &[
            (
                "booking.eml",
                &flight_eml(
                    "Flight confirmation AK822",
                    "Mon, 6 Feb 2023 10:15:00 +0800",
                    "Your flight from Manila (MNL) to Kuala Lumpur (KUL) departs 2023-02-06 08:30.",
                ),
            ),
            (
                "noise.eml",
                &flight_eml("Grocery receipt", "Mon, 6 Feb 2023 12:00:00 +0800", "milk, eggs, bread"),
            ),
        ],
    );

    let mut store = ItineraryStore::load(&config.itinerary.path).unwrap();
    let gaps = analyze_gaps(store.legs()).unwrap();
    assert_eq!(gaps.len(), 1);
    assert_eq!(gaps[0].kind, GapKind::Country);

    let corpus = scan_mailbox(&config).unwrap();
    assert_eq!(corpus.len(), 2);

    let vocab = Vocabulary::load(&config.keywords.path).unwrap();
    let terms = vocab.with_gap_terms(&gaps);
    let kept = keyword_filter(corpus, &terms);
    assert_eq!(kept.len(), 1, "only the booking email survives keywords");

    let kept = temporal_filter(kept, &gaps, &config.window);
    assert_eq!(kept.len(), 1);

    let provider = Arc::new(CannedProvider {
        response: r#"[{
            "departure_country": "PH", "departure_city": "Manila (MNL)",
            "departure_date": "2023-02-06", "departure_time": "08:30",
            "arrival_country": "MY", "arrival_city": "Kuala Lumpur (KUL)",
            "arrival_date": "2023-02-06", "arrival_time": "12:10",
            "notes": "Flight AK822", "source_file": "booking.eml"
        }]"#
        .to_string(),
    });
    let extraction = run_extraction(provider, &config.extraction, &kept, &gaps)
        .await
        .unwrap();
    assert_eq!(extraction.candidates.len(), 1);

    let resolutions = match_candidates(&gaps, &extraction.candidates, &config.window);
    let merge = merge_resolutions(&mut store, &gaps, resolutions);
    assert_eq!(merge.filled.len(), 1);

    // Re-validation: zero remaining gaps at that position.
    assert!(analyze_gaps(store.legs()).unwrap().is_empty());
    assert_eq!(store.len(), 3);
    assert_eq!(store.legs()[1].source_file, "booking.eml");

    let outcomes = gap_outcomes(&gaps, &merge, &extraction, &config.window);
    assert_eq!(
        outcomes[0],
        GapOutcome::Filled {
            sources: vec!["booking.eml".to_string()]
        }
    );

    // The completed itinerary survives a save/load round trip, sorted.
    let out = tmp.path().join("out.csv");
    store.save(&out).unwrap();
    let reloaded = ItineraryStore::load(&out).unwrap();
    assert!(reloaded.is_sorted());
    assert_eq!(reloaded.len(), 3);
}

#[tokio::test]
async fn city_gap_filled_by_car_lift() {
    let tmp = TempDir::new().unwrap();
    let itinerary = format!(
        "{}FR,Paris,2023-02-28,09:00,GB,Battle,2023-03-01,11:00,Flight and taxi,Original\n\
         GB,London,2023-03-05,14:00,FR,Paris,2023-03-05,16:10,Flight,Original\n",
        HEADER
    );
    let config = setup_env(
        tmp.path(),
        &itinerary,
        &[(
            "lift.eml",
            &flight_eml(
                "Lift to London on Thursday",
                "Thu, 2 Mar 2023 08:00:00 +0000",
                "I can give you a lift from Battle to London on the 2nd.",
            ),
        )],
    );

    let mut store = ItineraryStore::load(&config.itinerary.path).unwrap();
    let gaps = analyze_gaps(store.legs()).unwrap();
    assert_eq!(gaps.len(), 1);
    // Same country, different cities.
    assert_eq!(gaps[0].kind, GapKind::City);

    let corpus = scan_mailbox(&config).unwrap();
    let terms = Vocabulary::load(&config.keywords.path)
        .unwrap()
        .with_gap_terms(&gaps);
    // Retained by the injected gap location terms, not the generic
    // vocabulary.
    let kept = keyword_filter(corpus, &terms);
    assert_eq!(kept.len(), 1);

    let kept = temporal_filter(kept, &gaps, &config.window);
    let provider = Arc::new(CannedProvider {
        response: r#"[{
            "departure_country": "GB", "departure_city": "Battle",
            "departure_date": "2023-03-02", "departure_time": "",
            "arrival_country": "GB", "arrival_city": "London",
            "arrival_date": "2023-03-02", "arrival_time": "",
            "notes": "Car lift", "source_file": "lift.eml"
        }]"#
        .to_string(),
    });
    let extraction = run_extraction(provider, &config.extraction, &kept, &gaps)
        .await
        .unwrap();

    let resolutions = match_candidates(&gaps, &extraction.candidates, &config.window);
    let merge = merge_resolutions(&mut store, &gaps, resolutions);
    assert_eq!(merge.filled.len(), 1);
    assert!(analyze_gaps(store.legs()).unwrap().is_empty());
    assert_eq!(store.legs()[1].notes, "Car lift");
}

#[tokio::test]
async fn no_evidence_distinct_from_retries_exhausted() {
    let tmp = TempDir::new().unwrap();
    let itinerary = format!(
        "{}GB,London,2023-02-04,10:00,PH,Manila,2023-02-05,06:30,Flight,Original\n\
         MY,Kuala Lumpur,2023-02-08,09:00,SG,Singapore,2023-02-08,10:05,Flight,Original\n",
        HEADER
    );
    let config = setup_env(
        tmp.path(),
        &itinerary,
        &[(
            "unrelated.eml",
            &flight_eml("Grocery receipt", "Mon, 6 Feb 2023 12:00:00 +0800", "milk, eggs"),
        )],
    );

    let store = ItineraryStore::load(&config.itinerary.path).unwrap();
    let gaps = analyze_gaps(store.legs()).unwrap();

    // Zero keyword matches: extraction sees an empty pool, and the gap is
    // reported unfilled with no matching evidence.
    let corpus = scan_mailbox(&config).unwrap();
    let terms = Vocabulary::from_terms(["flight".to_string()]).with_gap_terms(&[]);
    let kept = keyword_filter(corpus, &terms);
    assert!(kept.is_empty());

    let provider = Arc::new(CannedProvider {
        response: "[]".to_string(),
    });
    let extraction = run_extraction(provider, &config.extraction, &kept, &gaps)
        .await
        .unwrap();
    assert_eq!(extraction.batches_total, 0);

    let merge = Default::default();
    let outcomes = gap_outcomes(&gaps, &merge, &extraction, &config.window);
    assert_eq!(outcomes[0], GapOutcome::NoMatchingEvidence);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_reported_per_gap() {
    let tmp = TempDir::new().unwrap();
    let itinerary = format!(
        "{}GB,London,2023-02-04,10:00,PH,Manila,2023-02-05,06:30,Flight,Original\n\
         MY,Kuala Lumpur,2023-02-08,09:00,SG,Singapore,2023-02-08,10:05,Flight,Original\n",
        HEADER
    );
    let config = setup_env(
        tmp.path(),
        &itinerary,
        &[(
            "booking.eml",
            &flight_eml(
                "Flight confirmation AK822",
                "Mon, 6 Feb 2023 10:15:00 +0800",
                "Manila to Kuala Lumpur",
            ),
        )],
    );

    let store = ItineraryStore::load(&config.itinerary.path).unwrap();
    let gaps = analyze_gaps(store.legs()).unwrap();
    let corpus = scan_mailbox(&config).unwrap();
    let kept = temporal_filter(corpus, &gaps, &config.window);
    assert_eq!(kept.len(), 1);

    let extraction = run_extraction(
        Arc::new(RateLimitedProvider),
        &config.extraction,
        &kept,
        &gaps,
    )
    .await
    .unwrap();
    assert_eq!(extraction.batches_failed, 1);

    let merge = Default::default();
    let outcomes = gap_outcomes(&gaps, &merge, &extraction, &config.window);
    // The failed batch held an email inside this gap's window: evidence
    // may have been lost, which is distinct from having none.
    assert_eq!(outcomes[0], GapOutcome::RetriesExhausted);
}

#[test]
fn default_extraction_config_matches_production_values() {
    let config = ExtractionConfig::default();
    assert_eq!(config.batch_size, 8);
    assert_eq!(config.body_budget, 800);
    assert_eq!(config.inter_batch_delay_ms, 1000);
    assert_eq!(config.max_retries, 3);
}
