//! Batch classification driver.
//!
//! Turns files, directories, and JSONL corpora into [`CaseRecord`]s. Load
//! failures never abort a batch: each becomes a processing-error record in
//! its input position.

use std::path::Path;

use crate::bundle::{self, LogBundle};
use crate::classifier::Classifier;
use crate::report::{CaseRecord, RecordBuilder};

/// Classifier plus record builder, applied to inputs in order.
#[derive(Debug, Clone, Default)]
pub struct Analyzer {
    classifier: Classifier,
    builder: RecordBuilder,
}

impl Analyzer {
    pub fn new(classifier: Classifier, builder: RecordBuilder) -> Self {
        Self { classifier, builder }
    }

    /// Classify an in-memory bundle under the given case id.
    pub fn analyze_bundle(&self, case_id: impl Into<String>, bundle: &LogBundle) -> CaseRecord {
        let verdict = self.classifier.classify(bundle);
        self.builder.build(case_id, bundle, &verdict)
    }

    /// Classify one bundle file. The case id is `<parent dir>/<file name>`.
    pub fn analyze_file(&self, path: &Path) -> CaseRecord {
        let case_id = file_case_id(path);
        let span = crate::triage_span!("analyze_file", case_id = case_id.as_str());
        let _guard = span.enter();

        match bundle::load_bundle_file(path) {
            Ok(bundle) => self.analyze_bundle(case_id, &bundle),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to load bundle");
                CaseRecord::processing_error(case_id, &err)
            }
        }
    }

    /// Classify every `*.json` file in a directory, sorted by path.
    pub fn analyze_directory(&self, dir: &Path, recursive: bool) -> crate::Result<Vec<CaseRecord>> {
        let files = bundle::discover_bundle_files(dir, recursive)?;
        tracing::info!(path = %dir.display(), files = files.len(), "Analyzing directory");

        let mut records = Vec::with_capacity(files.len());
        for (index, path) in files.iter().enumerate() {
            records.push(self.analyze_file(path));
            if (index + 1) % 10 == 0 {
                tracing::debug!(done = index + 1, total = files.len(), "Progress");
            }
        }
        Ok(records)
    }

    /// Classify each line of a JSONL corpus.
    ///
    /// The case id is the bundle's own `case_id`, or `<file name>:<line>`.
    pub fn analyze_jsonl(&self, path: &Path) -> crate::Result<Vec<CaseRecord>> {
        let file_name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let entries = bundle::load_jsonl(path)?;
        tracing::info!(path = %path.display(), entries = entries.len(), "Analyzing JSONL corpus");

        Ok(entries
            .into_iter()
            .map(|(line, parsed)| {
                let fallback_id = format!("{file_name}:{line}");
                match parsed {
                    Ok(bundle) => {
                        let case_id = bundle.case_id.clone().unwrap_or(fallback_id);
                        self.analyze_bundle(case_id, &bundle)
                    }
                    Err(err) => CaseRecord::processing_error(fallback_id, &err),
                }
            })
            .collect())
    }

    /// Classify a mixed list of inputs, preserving input order.
    ///
    /// Directories are scanned for `*.json`, `*.jsonl` files are read line by
    /// line, anything else is treated as a single bundle file. An unreadable
    /// file or corpus becomes one processing-error record; only a directory
    /// that cannot be listed fails the batch.
    pub fn analyze_inputs<P: AsRef<Path>>(
        &self,
        inputs: &[P],
        recursive: bool,
    ) -> crate::Result<Vec<CaseRecord>> {
        let mut records = Vec::new();
        for input in inputs {
            let input = input.as_ref();
            if input.is_dir() {
                records.extend(self.analyze_directory(input, recursive)?);
            } else if input.extension().is_some_and(|ext| ext == "jsonl") {
                match self.analyze_jsonl(input) {
                    Ok(jsonl) => records.extend(jsonl),
                    Err(err) => {
                        tracing::warn!(path = %input.display(), error = %err, "Failed to read JSONL corpus");
                        records.push(CaseRecord::processing_error(file_case_id(input), &err));
                    }
                }
            } else {
                records.push(self.analyze_file(input));
            }
        }

        let errors = records.iter().filter(|r| r.is_processing_error()).count();
        tracing::info!(total = records.len(), errors, "Batch classification complete");
        Ok(records)
    }
}

/// `<parent dir name>/<file name>`, or the file name alone at a root.
pub fn file_case_id(path: &Path) -> String {
    let file = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    match path.parent().and_then(Path::file_name) {
        Some(parent) => format!("{}/{file}", parent.to_string_lossy()),
        None => file,
    }
}
