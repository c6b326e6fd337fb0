//! Copy bundles into per-severity folders, and isolate failing cases.

use std::collections::BTreeMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};

use memchr::memmem;
use serde::{Deserialize, Serialize};

use crate::bundle;
use crate::classifier::{Classifier, Severity};
use crate::report::RecordBuilder;

/// Report written at the root of the organized tree.
pub const REPORT_FILE_NAME: &str = "classification_report.json";

/// Marker whose presence means the UE completed PDU session setup.
pub const SUCCESS_MARKER: &str = "Received PDU Session Establishment Accept";

/// One organized bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganizeEntry {
    /// Path relative to the source root
    pub source_file: String,
    pub severity_stage: i32,
    pub destination_folder: String,
    pub root_cause_summary: String,
    pub confidence: f64,
    pub evidence_keywords: Vec<String>,
}

/// Result of an [`organize`] run.
#[derive(Debug, Clone)]
pub struct OrganizeOutcome {
    pub entries: Vec<OrganizeEntry>,
    pub counts: BTreeMap<Severity, usize>,
    /// Files skipped because they could not be loaded
    pub unreadable: usize,
    pub report_path: PathBuf,
}

impl OrganizeOutcome {
    pub fn render_text(&self) -> String {
        let total = self.entries.len() + self.unreadable;
        let mut out = String::new();
        let _ = writeln!(out, "Classification Summary");
        for severity in Severity::ALL {
            let count = self.counts.get(&severity).copied().unwrap_or(0);
            let pct = if total == 0 {
                0.0
            } else {
                count as f64 / total as f64 * 100.0
            };
            let _ = writeln!(
                out,
                "  {}: {count} files ({pct:.1}%)",
                severity.folder_name()
            );
        }
        if self.unreadable > 0 {
            let _ = writeln!(out, "  skipped (unreadable): {}", self.unreadable);
        }
        let _ = writeln!(out, "Classification report: {}", self.report_path.display());
        out
    }
}

/// Classify every `*.json` under `source` (recursively) and copy it to
/// `dest/<severity folder>/<relative path>`.
pub fn organize(
    source: &Path,
    dest: &Path,
    classifier: &Classifier,
    builder: &RecordBuilder,
) -> crate::Result<OrganizeOutcome> {
    std::fs::create_dir_all(dest)?;
    for severity in Severity::ALL {
        std::fs::create_dir_all(dest.join(severity.folder_name()))?;
    }

    let files = bundle::discover_bundle_files(source, true)?;
    tracing::info!(
        source = %source.display(),
        dest = %dest.display(),
        files = files.len(),
        "Organizing bundles"
    );

    let mut entries = Vec::with_capacity(files.len());
    let mut counts = BTreeMap::new();
    let mut unreadable = 0;

    for path in &files {
        let bundle = match bundle::load_bundle_file(path) {
            Ok(bundle) => bundle,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable bundle");
                unreadable += 1;
                continue;
            }
        };
        let verdict = classifier.classify(&bundle);

        let relative = path.strip_prefix(source).unwrap_or(path);
        let folder = verdict.severity.folder_name();
        let target = dest.join(folder).join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(path, &target)?;

        *counts.entry(verdict.severity).or_insert(0) += 1;
        entries.push(OrganizeEntry {
            source_file: relative.display().to_string(),
            severity_stage: verdict.severity.stage(),
            destination_folder: folder.to_string(),
            root_cause_summary: verdict.summary,
            confidence: verdict.confidence,
            evidence_keywords: builder.limit_evidence(&verdict.evidence),
        });
    }

    let report_path = dest.join(REPORT_FILE_NAME);
    std::fs::write(&report_path, serde_json::to_string_pretty(&entries)?)?;
    tracing::info!(
        organized = entries.len(),
        unreadable,
        report = %report_path.display(),
        "Organize complete"
    );

    Ok(OrganizeOutcome {
        entries,
        counts,
        unreadable,
        report_path,
    })
}

/// Result of [`isolate_error_cases`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IsolateOutcome {
    /// Bundles without the success marker, copied to the destination
    pub copied: usize,
    pub skipped_success: usize,
    pub unreadable: usize,
}

/// Copy every top-level `*.json` in `source` whose raw text lacks
/// [`SUCCESS_MARKER`] into `dest`.
pub fn isolate_error_cases(source: &Path, dest: &Path) -> crate::Result<IsolateOutcome> {
    std::fs::create_dir_all(dest)?;
    let finder = memmem::Finder::new(SUCCESS_MARKER);
    let mut outcome = IsolateOutcome::default();

    for path in bundle::discover_bundle_files(source, false)? {
        let text = match std::fs::read(&path) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Skipping unreadable file");
                outcome.unreadable += 1;
                continue;
            }
        };
        if finder.find(&text).is_some() {
            tracing::debug!(path = %path.display(), "Success case skipped");
            outcome.skipped_success += 1;
            continue;
        }
        if let Some(name) = path.file_name() {
            std::fs::copy(&path, dest.join(name))?;
            tracing::debug!(path = %path.display(), "Error case copied");
            outcome.copied += 1;
        }
    }

    tracing::info!(
        copied = outcome.copied,
        skipped_success = outcome.skipped_success,
        unreadable = outcome.unreadable,
        "Isolation complete"
    );
    Ok(outcome)
}
