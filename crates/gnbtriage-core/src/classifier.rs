//! Severity classifier: the ordered decision cascade.
//!
//! ```text
//! 1 crash tier ───────────────────────────► ComponentCrash      0.95
//! 2 success tier + >= 2 success signals ──► NoError             0.90
//! 3 connection-failure tier ──────────────► ConnectionFailure   0.85
//! 4 abnormal tier ────────────────────────► ComponentAbnormal   0.70
//! 5 UE connect() retries > threshold ─────► ConnectionFailure   0.80
//! 6 metadata error_type present ──────────► ComponentAbnormal   0.50
//! 7 success tier (uncorroborated) ────────► NoError             0.70
//! 8 otherwise ────────────────────────────► Unknown             0.30
//! ```
//!
//! First match wins. Confidences and thresholds come from
//! [`ClassifierConfig`]; the defaults reproduce the values above.

use serde::{Deserialize, Serialize};

use crate::bundle::LogBundle;
use crate::catalog::{self, Rule, Tier};
use crate::config::ClassifierConfig;
use crate::evidence::{self, SuccessSignals};

/// Evidence marker recorded when nothing in the bundle decides the case.
pub const INSUFFICIENT_INFORMATION: &str = "insufficient log information";

// ============================================================================
// Severity
// ============================================================================

/// Verdict severity; the discriminant is the reported stage number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    NoError = 0,
    ComponentCrash = 1,
    ComponentAbnormal = 2,
    ConnectionFailure = 3,
    Unknown = 4,
}

impl Severity {
    pub const ALL: [Self; 5] = [
        Self::NoError,
        Self::ComponentCrash,
        Self::ComponentAbnormal,
        Self::ConnectionFailure,
        Self::Unknown,
    ];

    /// Stage number as written to reports.
    pub fn stage(self) -> i32 {
        self as i32
    }

    pub fn from_stage(stage: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.stage() == stage)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::NoError => "No Error",
            Self::ComponentCrash => "Component Crash",
            Self::ComponentAbnormal => "Component Abnormal",
            Self::ConnectionFailure => "UE Connection Failed",
            Self::Unknown => "Unknown",
        }
    }

    /// Directory name used when organizing bundles by severity.
    pub fn folder_name(self) -> &'static str {
        match self {
            Self::NoError => "severity_0_no_error",
            Self::ComponentCrash => "severity_1_crash",
            Self::ComponentAbnormal => "severity_2_abnormal",
            Self::ConnectionFailure => "severity_3_ue_failure",
            Self::Unknown => "severity_unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ============================================================================
// Verdict
// ============================================================================

/// Cascade step that produced a verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Crash,
    CorroboratedSuccess,
    ConnectionFailure,
    Abnormal,
    RepeatedConnectFailure,
    MetadataFallback,
    ResidualSuccess,
    Uncertain,
}

impl Step {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::CorroboratedSuccess => "corroborated_success",
            Self::ConnectionFailure => "connection_failure",
            Self::Abnormal => "abnormal",
            Self::RepeatedConnectFailure => "repeated_connect_failure",
            Self::MetadataFallback => "metadata_fallback",
            Self::ResidualSuccess => "residual_success",
            Self::Uncertain => "uncertain",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The classifier's structured output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub severity: Severity,
    /// Fixed constant of the deciding step, in [0, 1]
    pub confidence: f64,
    pub summary: String,
    /// Rule ids and extracted fragments, first-found order
    pub evidence: Vec<String>,
    pub rule: Step,
}

// ============================================================================
// Classifier
// ============================================================================

/// Runs the cascade with a fixed set of thresholds and confidences.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    /// Classify one bundle. Total and deterministic.
    pub fn classify(&self, bundle: &LogBundle) -> Verdict {
        let verdict = self.run_cascade(bundle);
        tracing::debug!(
            case_id = bundle.case_id.as_deref().unwrap_or(""),
            rule = %verdict.rule,
            severity = verdict.severity.stage(),
            confidence = verdict.confidence,
            "Classified bundle"
        );
        verdict
    }

    fn run_cascade(&self, bundle: &LogBundle) -> Verdict {
        let corpus = bundle.corpus();
        let meta = &bundle.metadata;
        let filename = meta.filename_or_default();
        let confidence = &self.config.confidence;

        let crash = catalog::matching_rules(Tier::Crash, &corpus);
        if !crash.is_empty() {
            let mut evidence = rule_ids(&crash);
            if let Some(expr) = evidence::extract_assertion(&corpus) {
                evidence.push(expr.to_string());
            }
            return Verdict {
                severity: Severity::ComponentCrash,
                confidence: confidence.crash,
                summary: format!(
                    "Component crash: assertion failure or forced exit detected in {filename}, error type: {}",
                    meta.error_type
                ),
                evidence,
                rule: Step::Crash,
            };
        }

        let success = catalog::matching_rules(Tier::Success, &corpus);
        if !success.is_empty() {
            let signals = SuccessSignals::detect(&corpus);
            if signals.count() >= self.config.success_corroboration {
                let mut evidence = rule_ids(&success);
                if let Some(ipv4) = evidence::extract_ipv4(&corpus) {
                    evidence.push(format!("IPv4 configured: {ipv4}"));
                }
                return Verdict {
                    severity: Severity::NoError,
                    confidence: confidence.success,
                    summary: format!(
                        "No error: the UE in {filename} established a connection and acquired an IP address; all main procedures completed"
                    ),
                    evidence,
                    rule: Step::CorroboratedSuccess,
                };
            }
        }

        let conn_failure = catalog::matching_rules(Tier::ConnectionFailure, &corpus);
        if !conn_failure.is_empty() {
            return Verdict {
                severity: Severity::ConnectionFailure,
                confidence: confidence.connection_failure,
                summary: format!(
                    "UE connection failure: components started but the UE could not complete the connection; failure detected in module {}",
                    meta.affected_module_or_default()
                ),
                evidence: rule_ids(&conn_failure),
                rule: Step::ConnectionFailure,
            };
        }

        let abnormal = catalog::matching_rules(Tier::Abnormal, &corpus);
        if !abnormal.is_empty() {
            let mut summary = format!(
                "Component abnormal: module {} in {filename} reported errors without crashing",
                meta.affected_module_or_default()
            );
            if !meta.impact_description.is_empty() {
                summary.push_str("; ");
                summary.push_str(&meta.impact_description);
            }
            return Verdict {
                severity: Severity::ComponentAbnormal,
                confidence: confidence.abnormal,
                summary,
                evidence: rule_ids(&abnormal),
                rule: Step::Abnormal,
            };
        }

        let ue_stream = bundle.stream(&self.config.ue_stream);
        if success.is_empty() && evidence::has_connect_retries(ue_stream) {
            let attempts = evidence::count_connect_failures(ue_stream);
            if attempts > self.config.connect_failure_threshold {
                return Verdict {
                    severity: Severity::ConnectionFailure,
                    confidence: confidence.repeated_connect_failure,
                    summary: format!(
                        "UE connection failure: the UE could not connect to the DU ({attempts} attempts)"
                    ),
                    evidence: vec![format!("{attempts} connection attempts failed")],
                    rule: Step::RepeatedConnectFailure,
                };
            }
        }

        if !meta.error_type.is_empty() {
            return Verdict {
                severity: Severity::ComponentAbnormal,
                confidence: confidence.metadata_fallback,
                summary: format!(
                    "Possible abnormality: configuration error ({}) in {filename}, but the logs show no explicit crash or failure",
                    meta.error_type
                ),
                evidence: vec![
                    format!("config error: {}", meta.error_type),
                    format!("impact: {}", meta.impact_description),
                ],
                rule: Step::MetadataFallback,
            };
        }

        if !success.is_empty() {
            return Verdict {
                severity: Severity::NoError,
                confidence: confidence.residual_success,
                summary: format!(
                    "No error: no obvious errors found in {filename}, with signs of a successful connection"
                ),
                evidence: rule_ids(&success),
                rule: Step::ResidualSuccess,
            };
        }

        Verdict {
            severity: Severity::Unknown,
            confidence: confidence.uncertain,
            summary: format!(
                "Undetermined: log information is insufficient for a clear classification, file {filename}"
            ),
            evidence: vec![INSUFFICIENT_INFORMATION.to_string()],
            rule: Step::Uncertain,
        }
    }
}

fn rule_ids(rules: &[&Rule]) -> Vec<String> {
    rules.iter().map(|rule| rule.id.to_string()).collect()
}

/// Classify with the default thresholds and confidences.
pub fn classify(bundle: &LogBundle) -> Verdict {
    Classifier::default().classify(bundle)
}
