//! gnbtriage-core: severity triage for 5G base-station test logs
//!
//! Classifies log bundles captured from DU, CU, and UE processes into a
//! small set of severities, each with a fixed confidence, a root-cause
//! summary, and evidence citing the rules that fired.
//!
//! # Architecture
//!
//! ```text
//! bundle files / JSONL ──► bundle ──► classifier ──► report ──► results JSON
//!                                        │   ▲
//!                                 catalog   evidence
//!
//! analyze / organize / categorize / breakdown drive batches over the above
//! ```
//!
//! # Modules
//!
//! - `bundle`: bundle loading and file discovery
//! - `catalog`: tiered detection rules with stable identifiers
//! - `evidence`: targeted extraction (assertions, IPv4, connect retries)
//! - `classifier`: the ordered severity cascade
//! - `report`: per-case records and batch summaries
//! - `analyze`: batch classification of files, directories, and JSONL
//! - `organize`: per-severity folder layout and error-case isolation
//! - `categorize`: coarse failure categories for dataset curation
//! - `breakdown`: crash and SCTP sub-cluster counts
//! - `config`: configuration management
//! - `logging`: structured logging setup
//! - `error`: error types with remediation guidance

#![forbid(unsafe_code)]

pub mod analyze;
pub mod breakdown;
pub mod bundle;
pub mod catalog;
pub mod categorize;
pub mod classifier;
pub mod config;
pub mod error;
pub mod evidence;
pub mod logging;
pub mod organize;
pub mod report;

pub use bundle::LogBundle;
pub use classifier::{Classifier, Severity, Verdict, classify};
pub use config::Config;
pub use error::{Error, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
