//! # Itinerary Harness
//!
//! Reconstructs a continuous travel history from a partially complete
//! itinerary by detecting geographic gaps between consecutive legs, mining
//! an unstructured email export for evidence of the missing legs, and
//! merging AI-extracted travel records back in under chronological-ordering
//! invariants.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────┐   ┌─────────────────┐   ┌─────────┐
//! │ Itinerary │──▶│   Gap    │──▶│ Keyword+Temporal │──▶│ Batched │
//! │   (CSV)   │   │ Analyzer │   │     Filters      │   │ Extract │
//! └───────────┘   └────┬─────┘   └─────────────────┘   └────┬────┘
//!                      │ gap context                        │
//!                      ▼                                    ▼
//!                 ┌──────────┐                        ┌──────────┐
//!                 │  Merger/ │◀───────────────────────│   Gap    │
//!                 │ Validator│      resolutions       │ Matcher  │
//!                 └──────────┘                        └──────────┘
//! ```
//!
//! The gap set is the central shared artifact: both filters, the batch
//! prompt, and the matcher all consume it.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`store`] | CSV itinerary store with chronological-order invariant |
//! | [`gaps`] | Gap analyzer and incongruent-event detection |
//! | [`vocab`] | Keyword vocabulary (reloadable, gap-term injection) |
//! | [`filter`] | Keyword and temporal evidence filters |
//! | [`connector_mail`] | `.eml` corpus connector |
//! | [`extraction`] | AI extraction provider abstraction |
//! | [`batcher`] | Batching, retry state machine, candidate validation |
//! | [`matcher`] | Candidate-to-gap reconciliation |
//! | [`merge`] | Chronological insertion with re-validation |
//! | [`pipeline`] | End-to-end orchestration for the CLI |
//! | [`annotate`] | Connection-analysis annotation utility |

pub mod annotate;
pub mod batcher;
pub mod config;
pub mod connector_mail;
pub mod country;
pub mod extraction;
pub mod filter;
pub mod gaps;
pub mod matcher;
pub mod merge;
pub mod models;
pub mod pipeline;
pub mod store;
pub mod vocab;
