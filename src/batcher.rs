//! Extraction batching, retry/backoff, and candidate validation.
//!
//! The filtered email pool is partitioned into fixed-size batches; each
//! batch becomes one extraction call carrying the open-gap context and the
//! required output schema. Calls run concurrently under a semaphore, with a
//! fixed delay between dispatches as a proactive rate-limit control, and
//! each batch walks an explicit retry state machine
//! (`Pending -> Sent -> Success | Failed`) with exponential backoff on
//! transient failures. A failed batch degrades matching completeness for
//! the gaps whose evidence it held; it never aborts the run.

use anyhow::{bail, Result};
use chrono::NaiveDate;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::ExtractionConfig;
use crate::country::normalize_country;
use crate::extraction::{ExtractionError, ExtractionProvider};
use crate::models::{CandidateRecord, EmailDocument, Gap, MalformedRecordError};

/// Ceiling on the base backoff wait.
const BACKOFF_CAP_SECS: u64 = 64;

/// Base backoff before the retry following `failures` transient failures:
/// `2^failures` seconds, capped. Strictly increasing until the cap.
pub fn base_backoff(failures: u32) -> Duration {
    let secs = 1u64 << failures.min(BACKOFF_CAP_SECS.ilog2());
    Duration::from_secs(secs.min(BACKOFF_CAP_SECS))
}

/// Base backoff plus up to one second of random jitter, so concurrent
/// batches hitting the same rate limit don't retry in lockstep.
fn backoff_with_jitter(failures: u32) -> Duration {
    let jitter = Duration::from_millis(rand::rng().random_range(0..1000));
    base_backoff(failures) + jitter
}

/// Per-batch retry state. Attempt count is carried as data rather than
/// loop-local bookkeeping so failures are reportable with their history.
#[derive(Debug)]
enum BatchState {
    Pending,
    Sent { attempt: u32 },
    Success { raw: String },
    Failed { attempts: u32, error: ExtractionError },
}

/// Drive one batch through the state machine until Success or Failed.
async fn drive_batch(
    provider: &dyn ExtractionProvider,
    prompt: &str,
    max_retries: u32,
) -> BatchState {
    let mut state = BatchState::Pending;
    loop {
        state = match state {
            BatchState::Pending => BatchState::Sent { attempt: 0 },
            BatchState::Sent { attempt } => {
                if attempt > 0 {
                    tokio::time::sleep(backoff_with_jitter(attempt - 1)).await;
                }
                match provider.extract(prompt).await {
                    Ok(raw) => BatchState::Success { raw },
                    Err(ExtractionError::Transient(e)) if attempt < max_retries => {
                        eprintln!(
                            "Warning: transient extraction failure (attempt {} of {}): {}",
                            attempt + 1,
                            max_retries + 1,
                            e
                        );
                        BatchState::Sent { attempt: attempt + 1 }
                    }
                    Err(error) => BatchState::Failed {
                        attempts: attempt + 1,
                        error,
                    },
                }
            }
            done => return done,
        };
    }
}

/// Everything accumulated across all batches of one extraction run.
#[derive(Debug, Default)]
pub struct ExtractionOutcome {
    pub candidates: Vec<CandidateRecord>,
    pub batches_total: usize,
    pub batches_failed: usize,
    /// (file, send date) of every email in a failed batch. The reporter
    /// uses these to distinguish gaps whose evidence may have been lost
    /// from gaps that simply had none.
    pub failed_emails: Vec<(String, Option<NaiveDate>)>,
}

/// Build the prompt for one batch: open-gap context, the batch's emails
/// (bodies truncated to the character budget), and the output schema with
/// the country-code normalization rule.
pub fn build_prompt(batch: &[EmailDocument], gaps: &[Gap], body_budget: usize) -> String {
    let mut prompt = String::from("GAPS TO FILL:\n");
    for (i, gap) in gaps.iter().enumerate() {
        prompt.push_str(&format!(
            "GAP #{} ({}): {} ({}) -> {} ({}), {} to {} [{} days]\n",
            i + 1,
            gap.kind.label(),
            gap.prior_arrival_city,
            gap.prior_arrival_country,
            gap.next_departure_city,
            gap.next_departure_country,
            gap.prior_arrival_date,
            gap.next_departure_date,
            gap.days_between(),
        ));
    }

    prompt.push_str(
        "\nAnalyze the following emails and extract any travel information that could fill \
         these gaps. Look for:\n\
         - Flight bookings, confirmations, itineraries\n\
         - Hotel reservations and check-ins\n\
         - Car rentals, train tickets, bus bookings\n\
         - Car lifts and informal transportation\n\
         - Any travel between the gap locations\n\n\
         If an email contains multiple travel segments (outbound and return flights, \
         connections, multi-city itineraries), extract ALL of them as separate entries.\n\n\
         EMAILS TO ANALYZE:\n",
    );

    for doc in batch {
        let truncated: String = doc.body.chars().take(body_budget).collect();
        prompt.push_str(&format!(
            "\n--- EMAIL: {} ---\nDate: {}\nSubject: {}\nFrom: {}\nContent: {}\n",
            doc.file,
            doc.date.map(|d| d.to_string()).unwrap_or_default(),
            doc.subject,
            doc.sender,
            truncated,
        ));
    }

    prompt.push_str(
        "\nReturn ONLY a JSON array of travel entries in this format:\n\
         [\n  {\n    \"departure_country\": \"XX\",\n    \"departure_city\": \"City Name\",\n    \
         \"departure_date\": \"YYYY-MM-DD\",\n    \"departure_time\": \"HH:MM\",\n    \
         \"arrival_country\": \"XX\",\n    \"arrival_city\": \"City Name\",\n    \
         \"arrival_date\": \"YYYY-MM-DD\",\n    \"arrival_time\": \"HH:MM\",\n    \
         \"notes\": \"Description\",\n    \"source_file\": \"filename.eml\"\n  }\n]\n\n\
         Country codes must be ISO 3166-1 alpha-2 (two letters): UK -> GB, \
         United Kingdom -> GB, USA -> US. Do not use full country names or 3-letter codes. \
         Use an empty string for unknown times.\n\
         If no travel information is found, return an empty array [].\n",
    );

    prompt
}

/// Pull the first JSON array out of the raw completion text. Models wrap
/// the array in prose often enough that strict parsing of the whole
/// response is a losing game.
pub fn parse_candidate_values(raw: &str) -> Vec<serde_json::Value> {
    let Some(start) = raw.find('[') else {
        return Vec::new();
    };
    let Some(end) = raw.rfind(']') else {
        return Vec::new();
    };
    if end < start {
        return Vec::new();
    }

    match serde_json::from_str::<serde_json::Value>(&raw[start..=end]) {
        Ok(serde_json::Value::Array(values)) => values,
        _ => Vec::new(),
    }
}

fn json_str(value: &serde_json::Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty() && s != "Unknown" && s != "null")
}

fn require_date(
    value: &serde_json::Value,
    key: &'static str,
) -> Result<NaiveDate, MalformedRecordError> {
    let raw = json_str(value, key).ok_or(MalformedRecordError::MissingField(key))?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d").map_err(|_| MalformedRecordError::BadDate {
        field: key,
        value: raw,
    })
}

/// Validate one extracted JSON object against the candidate schema.
///
/// Anything failing validation is a [`MalformedRecordError`], never a
/// silent partial record.
pub fn candidate_from_json(
    value: &serde_json::Value,
) -> Result<CandidateRecord, MalformedRecordError> {
    let departure_country = json_str(value, "departure_country")
        .ok_or(MalformedRecordError::MissingField("departure_country"))?;
    let departure_city = json_str(value, "departure_city")
        .ok_or(MalformedRecordError::MissingField("departure_city"))?;
    let arrival_country = json_str(value, "arrival_country")
        .ok_or(MalformedRecordError::MissingField("arrival_country"))?;
    let arrival_city = json_str(value, "arrival_city")
        .ok_or(MalformedRecordError::MissingField("arrival_city"))?;

    let departure_date = require_date(value, "departure_date")?;
    let arrival_date = require_date(value, "arrival_date")?;

    let departure_time =
        json_str(value, "departure_time").and_then(|t| chrono::NaiveTime::parse_from_str(&t, "%H:%M").ok());
    let arrival_time =
        json_str(value, "arrival_time").and_then(|t| chrono::NaiveTime::parse_from_str(&t, "%H:%M").ok());

    let notes = json_str(value, "notes").unwrap_or_default();
    let source_file = json_str(value, "source_file").unwrap_or_default();

    let populated_fields = [
        !departure_country.is_empty(),
        !departure_city.is_empty(),
        true, // departure_date
        departure_time.is_some(),
        !arrival_country.is_empty(),
        !arrival_city.is_empty(),
        true, // arrival_date
        arrival_time.is_some(),
        !notes.is_empty(),
        !source_file.is_empty(),
    ]
    .iter()
    .filter(|b| **b)
    .count() as u32;

    let candidate = CandidateRecord {
        departure_country: normalize_country(&departure_country),
        departure_city,
        departure_date,
        departure_time,
        arrival_country: normalize_country(&arrival_country),
        arrival_city,
        arrival_date,
        arrival_time,
        notes,
        source_file,
        populated_fields,
    };

    if candidate.arrival_instant() < candidate.departure_instant() {
        return Err(MalformedRecordError::InvertedInstants);
    }

    Ok(candidate)
}

/// Parse and validate a batch's raw output, tagging each candidate with
/// its source email. Entries naming a file outside the batch fall back to
/// the batch's first email.
fn candidates_from_raw(raw: &str, batch: &[EmailDocument]) -> Vec<CandidateRecord> {
    let mut out = Vec::new();
    for value in parse_candidate_values(raw) {
        match candidate_from_json(&value) {
            Ok(mut candidate) => {
                if !batch.iter().any(|doc| doc.file == candidate.source_file) {
                    candidate.source_file = batch
                        .first()
                        .map(|doc| doc.file.clone())
                        .unwrap_or_default();
                }
                out.push(candidate);
            }
            Err(e) => {
                eprintln!("Warning: dropping malformed extracted record: {}", e);
            }
        }
    }
    out
}

/// Run extraction over the filtered pool: partition into batches, dispatch
/// under the concurrency cap with the inter-batch delay, retry transient
/// failures, and accumulate every validated candidate.
///
/// Permanent failures (bad credential, malformed request) abort the run;
/// exhausted retries only fail their own batch.
pub async fn run_extraction(
    provider: Arc<dyn ExtractionProvider>,
    config: &ExtractionConfig,
    emails: &[EmailDocument],
    gaps: &[Gap],
) -> Result<ExtractionOutcome> {
    let batches: Vec<Vec<EmailDocument>> = emails
        .chunks(config.batch_size)
        .map(|c| c.to_vec())
        .collect();

    let mut outcome = ExtractionOutcome {
        batches_total: batches.len(),
        ..Default::default()
    };

    if batches.is_empty() {
        return Ok(outcome);
    }

    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let inter_batch_delay = Duration::from_millis(config.inter_batch_delay_ms);
    let max_retries = config.max_retries;

    let mut tasks: JoinSet<(Vec<EmailDocument>, BatchState)> = JoinSet::new();

    for (i, batch) in batches.into_iter().enumerate() {
        // Stagger dispatches regardless of outcome; together with the
        // semaphore this is the sole throttle on the shared rate budget.
        if i > 0 {
            tokio::time::sleep(inter_batch_delay).await;
        }

        let prompt = build_prompt(&batch, gaps, config.body_budget);
        let provider = Arc::clone(&provider);
        let semaphore = Arc::clone(&semaphore);

        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let state = drive_batch(provider.as_ref(), &prompt, max_retries).await;
            (batch, state)
        });
    }

    let mut permanent: Option<ExtractionError> = None;

    while let Some(joined) = tasks.join_next().await {
        let (batch, state) = joined?;
        match state {
            BatchState::Success { raw } => {
                outcome
                    .candidates
                    .extend(candidates_from_raw(&raw, &batch));
            }
            BatchState::Failed { attempts, error } => {
                eprintln!(
                    "Warning: extraction batch failed after {} attempts: {}",
                    attempts, error
                );
                outcome.batches_failed += 1;
                outcome
                    .failed_emails
                    .extend(batch.iter().map(|doc| (doc.file.clone(), doc.date)));
                if matches!(error, ExtractionError::Permanent(_)) {
                    permanent = Some(error);
                }
            }
            // drive_batch only returns terminal states.
            BatchState::Pending | BatchState::Sent { .. } => unreachable!(),
        }
    }

    if let Some(error) = permanent {
        bail!("extraction aborted: {}", error);
    }

    Ok(outcome)
}
