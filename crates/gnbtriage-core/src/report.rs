//! Per-case report records and batch summaries.

use std::fmt::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bundle::LogBundle;
use crate::classifier::{Severity, Verdict};
use crate::config::ReportConfig;
use crate::error::LoadError;

/// Stage written for inputs that could not be loaded.
pub const PROCESSING_ERROR_STAGE: i32 = -1;

const RULE: &str = "======================================================================";
const THIN_RULE: &str = "----------------------------------------------------------------------";

// ============================================================================
// Component
// ============================================================================

/// Harness component a case's config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    #[serde(rename = "DU")]
    Du,
    #[serde(rename = "CU")]
    Cu,
    #[serde(rename = "UE")]
    Ue,
    Unknown,
    /// The input failed to load
    Error,
}

impl Component {
    /// Infer from a file name: first of `DU`, `CU`, `UE` found in the
    /// upper-cased name wins.
    pub fn from_filename(filename: &str) -> Self {
        let upper = filename.to_uppercase();
        if upper.contains("DU") {
            Self::Du
        } else if upper.contains("CU") {
            Self::Cu
        } else if upper.contains("UE") {
            Self::Ue
        } else {
            Self::Unknown
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Du => "DU",
            Self::Cu => "CU",
            Self::Ue => "UE",
            Self::Unknown => "Unknown",
            Self::Error => "Error",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Records
// ============================================================================

/// One line of a classification results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub case_id: String,
    /// 0-4 for verdicts, -1 for processing errors
    pub severity_stage: i32,
    pub root_cause_summary: String,
    pub evidence_keywords: Vec<String>,
    pub component: Component,
    pub confidence: f64,
}

impl CaseRecord {
    /// Record for an input that could not be loaded or parsed.
    pub fn processing_error(case_id: impl Into<String>, error: &dyn std::fmt::Display) -> Self {
        let message = error.to_string();
        Self {
            case_id: case_id.into(),
            severity_stage: PROCESSING_ERROR_STAGE,
            root_cause_summary: format!("Error processing file: {message}"),
            evidence_keywords: vec![message],
            component: Component::Error,
            confidence: 0.0,
        }
    }

    pub fn is_processing_error(&self) -> bool {
        self.severity_stage == PROCESSING_ERROR_STAGE
    }

    pub fn severity(&self) -> Option<Severity> {
        Severity::from_stage(self.severity_stage)
    }
}

/// Human label for a stage number, including the processing-error sentinel.
pub fn stage_label(stage: i32) -> String {
    match Severity::from_stage(stage) {
        Some(severity) => severity.label().to_string(),
        None if stage == PROCESSING_ERROR_STAGE => "Processing Error".to_string(),
        None => format!("Unknown ({stage})"),
    }
}

/// Assembles [`CaseRecord`]s from verdicts.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordBuilder {
    /// Keep at most this many evidence entries; `None` keeps all
    pub evidence_limit: Option<usize>,
}

impl RecordBuilder {
    pub fn new(evidence_limit: Option<usize>) -> Self {
        Self { evidence_limit }
    }

    pub fn build(&self, case_id: impl Into<String>, bundle: &LogBundle, verdict: &Verdict) -> CaseRecord {
        CaseRecord {
            case_id: case_id.into(),
            severity_stage: verdict.severity.stage(),
            root_cause_summary: verdict.summary.clone(),
            evidence_keywords: self.limit_evidence(&verdict.evidence),
            component: Component::from_filename(&bundle.metadata.filename),
            confidence: verdict.confidence,
        }
    }

    pub fn limit_evidence(&self, evidence: &[String]) -> Vec<String> {
        let keep = self.evidence_limit.unwrap_or(evidence.len()).min(evidence.len());
        evidence[..keep].to_vec()
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Count of records at one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCount {
    pub severity_stage: i32,
    pub label: String,
    pub count: usize,
    pub percentage: f64,
}

/// Low-confidence case listed for manual review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewCase {
    pub case_id: String,
    pub severity_stage: i32,
    pub confidence: f64,
    pub root_cause_summary: String,
}

/// Aggregate statistics over a set of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total: usize,
    /// Ascending by stage
    pub stages: Vec<StageCount>,
    pub high_confidence_threshold: f64,
    pub low_confidence_threshold: f64,
    /// confidence >= high threshold
    pub high_confidence: usize,
    /// between the two thresholds
    pub medium_confidence: usize,
    /// confidence < low threshold
    pub low_confidence: usize,
    /// First low-confidence cases, in record order
    pub review: Vec<ReviewCase>,
}

fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64 * 100.0
    }
}

impl ReportSummary {
    pub fn from_records(records: &[CaseRecord], config: &ReportConfig) -> Self {
        let total = records.len();

        let mut counts = std::collections::BTreeMap::<i32, usize>::new();
        for record in records {
            *counts.entry(record.severity_stage).or_default() += 1;
        }
        let stages = counts
            .into_iter()
            .map(|(stage, count)| StageCount {
                severity_stage: stage,
                label: stage_label(stage),
                count,
                percentage: percentage(count, total),
            })
            .collect();

        let high = records
            .iter()
            .filter(|r| r.confidence >= config.high_confidence)
            .count();
        let low: Vec<&CaseRecord> = records
            .iter()
            .filter(|r| r.confidence < config.low_confidence)
            .collect();

        Self {
            total,
            stages,
            high_confidence_threshold: config.high_confidence,
            low_confidence_threshold: config.low_confidence,
            high_confidence: high,
            medium_confidence: total.saturating_sub(high + low.len()),
            low_confidence: low.len(),
            review: low
                .iter()
                .take(config.review_limit)
                .map(|r| ReviewCase {
                    case_id: r.case_id.clone(),
                    severity_stage: r.severity_stage,
                    confidence: r.confidence,
                    root_cause_summary: r.root_cause_summary.clone(),
                })
                .collect(),
        }
    }

    pub fn count_for(&self, stage: i32) -> usize {
        self.stages
            .iter()
            .find(|s| s.severity_stage == stage)
            .map_or(0, |s| s.count)
    }

    /// Plain-text summary for the console or a summary file.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "5G gNB/OAI Log Analysis Summary");
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "Total files analyzed: {}", self.total);
        let _ = writeln!(out);
        let _ = writeln!(out, "Severity Distribution:");
        let _ = writeln!(out, "{THIN_RULE}");
        for stage in &self.stages {
            let _ = writeln!(
                out,
                "  Severity {} - {}: {} ({:.1}%)",
                stage.severity_stage, stage.label, stage.count, stage.percentage
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(
            out,
            "High Confidence (>= {:.2}): {} cases ({:.1}%)",
            self.high_confidence_threshold,
            self.high_confidence,
            percentage(self.high_confidence, self.total)
        );
        let _ = writeln!(
            out,
            "Medium Confidence: {} cases ({:.1}%)",
            self.medium_confidence,
            percentage(self.medium_confidence, self.total)
        );
        let _ = writeln!(
            out,
            "Low Confidence (< {:.2}): {} cases ({:.1}%)",
            self.low_confidence_threshold,
            self.low_confidence,
            percentage(self.low_confidence, self.total)
        );

        if !self.review.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Low Confidence Cases (may need manual review):");
            let _ = writeln!(out, "{THIN_RULE}");
            for case in &self.review {
                let reason: String = case.root_cause_summary.chars().take(80).collect();
                let ellipsis = if case.root_cause_summary.chars().count() > 80 { "..." } else { "" };
                let _ = writeln!(out, "  {}", case.case_id);
                let _ = writeln!(
                    out,
                    "    Severity: {}, Confidence: {:.2}",
                    case.severity_stage, case.confidence
                );
                let _ = writeln!(out, "    Reason: {reason}{ellipsis}");
            }
        }
        out
    }
}

// ============================================================================
// Batch report
// ============================================================================

/// Everything a `classify` run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// RFC 3339 UTC timestamp
    pub generated_at: String,
    pub total: usize,
    pub records: Vec<CaseRecord>,
    pub summary: ReportSummary,
}

impl BatchReport {
    pub fn new(records: Vec<CaseRecord>, config: &ReportConfig) -> Self {
        let summary = ReportSummary::from_records(&records, config);
        Self {
            generated_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            total: records.len(),
            records,
            summary,
        }
    }
}

/// Read records from a results file.
///
/// Accepts either a bare JSON array of records or a [`BatchReport`].
pub fn load_records(path: &Path) -> Result<Vec<CaseRecord>, LoadError> {
    let origin = path.display().to_string();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: origin.clone(),
        source,
    })?;
    let value: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| LoadError::Json {
            path: origin.clone(),
            source,
        })?;

    let records = match value {
        serde_json::Value::Array(items) => serde_json::Value::Array(items),
        serde_json::Value::Object(mut map) => map.remove("records").ok_or_else(|| {
            LoadError::Shape(format!("{origin} has no `records` array"))
        })?,
        _ => {
            return Err(LoadError::Shape(format!(
                "{origin} must hold an array of records or a batch report"
            )));
        }
    };
    serde_json::from_value(records).map_err(|source| LoadError::Json { path: origin, source })
}
