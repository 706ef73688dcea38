use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub itinerary: ItineraryConfig,
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub keywords: KeywordsConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ItineraryConfig {
    /// Input itinerary CSV.
    pub path: PathBuf,
    /// Directory for the timestamped output file. Defaults to the current
    /// directory.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailboxConfig {
    /// Directory containing the exported `.eml` files.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.eml".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct KeywordsConfig {
    /// Flat term list, one per line. Hot-reloadable between runs.
    pub path: PathBuf,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./config/travel_keywords.txt"),
        }
    }
}

/// Date windows used by the temporal filter and the gap matcher.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct WindowConfig {
    /// How far before a gap's prior arrival an email may have been sent
    /// and still count as evidence (advance bookings).
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Buffer after the gap's next departure (late confirmations).
    #[serde(default = "default_lookahead_days")]
    pub lookahead_days: i64,
    /// Slack around the gap period when matching candidate travel dates.
    #[serde(default = "default_match_slack_days")]
    pub match_slack_days: i64,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            lookahead_days: default_lookahead_days(),
            match_slack_days: default_match_slack_days(),
        }
    }
}

fn default_lookback_days() -> i64 {
    365
}
fn default_lookahead_days() -> i64 {
    7
}
fn default_match_slack_days() -> i64 {
    7
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExtractionConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    /// Emails per extraction call. Sized to stay under the per-minute
    /// token budget.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Body characters included per email in the batch prompt.
    #[serde(default = "default_body_budget")]
    pub body_budget: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Delay between batch dispatches, applied regardless of outcome.
    #[serde(default = "default_inter_batch_delay_ms")]
    pub inter_batch_delay_ms: u64,
    /// Maximum extraction calls in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            batch_size: default_batch_size(),
            body_budget: default_body_budget(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            inter_batch_delay_ms: default_inter_batch_delay_ms(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    8
}
fn default_body_budget() -> usize {
    800
}
fn default_max_retries() -> u32 {
    3
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_inter_batch_delay_ms() -> u64 {
    1000
}
fn default_concurrency() -> usize {
    4
}

impl ExtractionConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.extraction.batch_size == 0 {
        anyhow::bail!("extraction.batch_size must be > 0");
    }

    if config.extraction.concurrency == 0 {
        anyhow::bail!("extraction.concurrency must be > 0");
    }

    if config.window.lookback_days < 0 || config.window.lookahead_days < 0 {
        anyhow::bail!("window.lookback_days and window.lookahead_days must be >= 0");
    }

    if config.extraction.is_enabled() && config.extraction.model.is_none() {
        anyhow::bail!(
            "extraction.model must be specified when provider is '{}'",
            config.extraction.provider
        );
    }

    match config.extraction.provider.as_str() {
        "disabled" | "openai" => {}
        other => anyhow::bail!(
            "Unknown extraction provider: '{}'. Must be disabled or openai.",
            other
        ),
    }

    Ok(config)
}
