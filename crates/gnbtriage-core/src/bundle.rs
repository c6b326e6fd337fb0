//! Log bundle loading.
//!
//! A bundle is one test case: the captured stdout of each harness process
//! (`du.stdout.log`, `cu.stdout.log`, `ue.stdout.log`, ...) plus the metadata
//! describing the injected fault. Bundles arrive either as one JSON document
//! per file or as one JSON object per line of a JSONL corpus:
//!
//! ```json
//! {
//!   "case_id": "case_17",
//!   "logs": { "du.stdout.log": "...", "ue.stdout.log": ["line 1", "line 2"] },
//!   "original_json_data": { "filename": "du_gnb.conf", "error_type": "invalid_value" },
//!   "misconfigured_param": "pdsch_AntennaPorts_XP"
//! }
//! ```

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::LoadError;

/// Fault-injection metadata attached to a test case.
///
/// Every field defaults to the empty string when absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaseMetadata {
    pub filename: String,
    pub affected_module: String,
    pub error_type: String,
    pub impact_description: String,
}

impl CaseMetadata {
    /// Config file name used in summaries, `"unknown"` when absent.
    pub fn filename_or_default(&self) -> &str {
        non_empty_or(&self.filename, "unknown")
    }

    /// Affected module used in summaries, `"Unknown"` when absent.
    pub fn affected_module_or_default(&self) -> &str {
        non_empty_or(&self.affected_module, "Unknown")
    }

    fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(map)) = value else {
            return Self::default();
        };
        let field = |name: &str| map.get(name).map(value_to_text).unwrap_or_default();
        Self {
            filename: field("filename"),
            affected_module: field("affected_module"),
            error_type: field("error_type"),
            impact_description: field("impact_description"),
        }
    }
}

fn non_empty_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() { fallback } else { value }
}

/// Render a loosely typed metadata value as text.
fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The set of log streams and metadata belonging to one test case.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogBundle {
    /// Identifier carried inside the document, if any
    pub case_id: Option<String>,
    /// Stream name to raw text
    pub streams: BTreeMap<String, String>,
    pub metadata: CaseMetadata,
    /// Parameter the harness deliberately misconfigured, if recorded
    pub misconfigured_param: Option<String>,
}

impl LogBundle {
    /// Start an empty bundle; mostly useful in tests and fixtures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a stream.
    #[must_use]
    pub fn with_stream(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.streams.insert(name.into(), text.into());
        self
    }

    /// Replace the metadata.
    #[must_use]
    pub fn with_metadata(mut self, metadata: CaseMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// All streams joined in key order, each followed by a newline.
    pub fn corpus(&self) -> String {
        let capacity = self.streams.values().map(|s| s.len() + 1).sum();
        let mut corpus = String::with_capacity(capacity);
        for text in self.streams.values() {
            corpus.push_str(text);
            corpus.push('\n');
        }
        corpus
    }

    /// Text of a single named stream, empty when the stream is absent.
    pub fn stream(&self, name: &str) -> &str {
        self.streams.get(name).map_or("", String::as_str)
    }

    /// Build a bundle from a parsed JSON document.
    pub fn from_value(value: &Value) -> Result<Self, LoadError> {
        let Value::Object(root) = value else {
            return Err(LoadError::Shape(format!(
                "expected a JSON object, found {}",
                json_kind(value)
            )));
        };

        let mut streams = BTreeMap::new();
        match root.get("logs") {
            None | Some(Value::Null) => {}
            Some(Value::Object(logs)) => {
                for (name, content) in logs {
                    streams.insert(name.clone(), stream_text(name, content)?);
                }
            }
            Some(other) => {
                return Err(LoadError::Shape(format!(
                    "`logs` must be an object, found {}",
                    json_kind(other)
                )));
            }
        }

        let case_id = root
            .get("case_id")
            .map(value_to_text)
            .filter(|id| !id.is_empty());
        let misconfigured_param = root
            .get("misconfigured_param")
            .filter(|v| !v.is_null())
            .map(value_to_text);

        Ok(Self {
            case_id,
            streams,
            metadata: CaseMetadata::from_value(root.get("original_json_data")),
            misconfigured_param,
        })
    }

    /// Parse a bundle from JSON text.
    pub fn from_json_str(text: &str, origin: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(text).map_err(|source| LoadError::Json {
            path: origin.to_string(),
            source,
        })?;
        Self::from_value(&value)
    }
}

fn stream_text(name: &str, content: &Value) -> Result<String, LoadError> {
    match content {
        Value::String(text) => Ok(text.clone()),
        Value::Array(parts) => {
            let mut lines = Vec::with_capacity(parts.len());
            for part in parts {
                match part {
                    Value::String(line) => lines.push(line.as_str()),
                    other => {
                        return Err(LoadError::Shape(format!(
                            "stream `{name}` contains a non-string entry ({})",
                            json_kind(other)
                        )));
                    }
                }
            }
            Ok(lines.join("\n"))
        }
        other => Err(LoadError::Shape(format!(
            "stream `{name}` must be a string or list of strings, found {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Load a single-document bundle file.
pub fn load_bundle_file(path: &Path) -> Result<LogBundle, LoadError> {
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    LogBundle::from_json_str(&text, &path.display().to_string())
}

/// One parsed line of a JSONL corpus.
pub type JsonlEntry = (usize, Result<LogBundle, LoadError>);

/// Load every non-blank line of a JSONL corpus.
///
/// Line numbers are 1-based. A malformed line, including one that is not
/// valid UTF-8, yields an `Err` entry and does not stop the scan; only
/// failing to open or read the file is fatal.
pub fn load_jsonl(path: &Path) -> Result<Vec<JsonlEntry>, LoadError> {
    let read_err = |source| LoadError::Read {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(read_err)?;
    let mut reader = BufReader::new(file);

    let mut entries = Vec::new();
    let mut buf = Vec::new();
    let mut line_number = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf).map_err(read_err)? == 0 {
            break;
        }
        line_number += 1;
        let parsed = match std::str::from_utf8(&buf) {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => parse_jsonl_line(line, line_number),
            Err(e) => Err(LoadError::JsonLine {
                line: line_number,
                message: format!("invalid UTF-8: {e}"),
            }),
        };
        if let Err(err) = &parsed {
            tracing::warn!(path = %path.display(), line = line_number, error = %err, "Skipping malformed bundle line");
        }
        entries.push((line_number, parsed));
    }
    Ok(entries)
}

fn parse_jsonl_line(line: &str, line_number: usize) -> Result<LogBundle, LoadError> {
    serde_json::from_str::<Value>(line)
        .map_err(|e| LoadError::JsonLine {
            line: line_number,
            message: e.to_string(),
        })
        .and_then(|value| LogBundle::from_value(&value))
}

/// Collect `*.json` files under `dir`, sorted by path.
pub fn discover_bundle_files(dir: &Path, recursive: bool) -> crate::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    collect_json_files(dir, recursive, &mut files)?;
    files.sort();
    Ok(files)
}

fn collect_json_files(dir: &Path, recursive: bool, out: &mut Vec<PathBuf>) -> crate::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        // Symlinked directories are not followed, so link cycles cannot recurse.
        if entry.file_type()?.is_dir() {
            if recursive {
                collect_json_files(&path, recursive, out)?;
            }
        } else if path.extension().is_some_and(|ext| ext == "json") {
            out.push(path);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn list_streams_are_joined_with_newlines() {
        let bundle = LogBundle::from_value(&json!({
            "logs": { "ue.stdout.log": ["first", "second"], "du.stdout.log": "du text" }
        }))
        .unwrap();
        assert_eq!(bundle.stream("ue.stdout.log"), "first\nsecond");
        assert_eq!(bundle.stream("du.stdout.log"), "du text");
        assert_eq!(bundle.stream("cu.stdout.log"), "");
    }

    #[test]
    fn corpus_follows_key_order() {
        let bundle = LogBundle::new()
            .with_stream("ue.stdout.log", "ue")
            .with_stream("cu.stdout.log", "cu")
            .with_stream("du.stdout.log", "du");
        assert_eq!(bundle.corpus(), "cu\ndu\nue\n");
    }

    #[test]
    fn empty_bundle_has_empty_corpus() {
        assert_eq!(LogBundle::new().corpus(), "");
    }

    #[test]
    fn missing_logs_field_is_tolerated() {
        let bundle = LogBundle::from_value(&json!({ "case_id": "c1" })).unwrap();
        assert!(bundle.streams.is_empty());
        assert_eq!(bundle.case_id.as_deref(), Some("c1"));
    }

    #[test]
    fn metadata_defaults_and_loose_values() {
        let bundle = LogBundle::from_value(&json!({
            "logs": {},
            "original_json_data": { "filename": "du_gnb.conf", "error_type": 7, "affected_module": null }
        }))
        .unwrap();
        assert_eq!(bundle.metadata.filename, "du_gnb.conf");
        assert_eq!(bundle.metadata.error_type, "7");
        assert_eq!(bundle.metadata.affected_module, "");
        assert_eq!(bundle.metadata.affected_module_or_default(), "Unknown");
        assert_eq!(CaseMetadata::default().filename_or_default(), "unknown");
    }

    #[test]
    fn misconfigured_param_rendered_as_text() {
        let bundle = LogBundle::from_value(&json!({ "misconfigured_param": 42 })).unwrap();
        assert_eq!(bundle.misconfigured_param.as_deref(), Some("42"));
        let bundle = LogBundle::from_value(&json!({ "misconfigured_param": null })).unwrap();
        assert!(bundle.misconfigured_param.is_none());
    }

    #[test]
    fn non_object_document_is_shape_error() {
        let err = LogBundle::from_value(&json!([1, 2])).unwrap_err();
        assert!(matches!(err, LoadError::Shape(_)));
    }

    #[test]
    fn non_text_stream_is_shape_error() {
        let err = LogBundle::from_value(&json!({ "logs": { "du.stdout.log": 5 } })).unwrap_err();
        assert!(err.to_string().contains("du.stdout.log"));
        let err =
            LogBundle::from_value(&json!({ "logs": { "du.stdout.log": ["ok", {}] } })).unwrap_err();
        assert!(matches!(err, LoadError::Shape(_)));
    }

    #[test]
    fn invalid_json_text_is_json_error() {
        let err = LogBundle::from_json_str("{ nope", "case.json").unwrap_err();
        match err {
            LoadError::Json { path, .. } => assert_eq!(path, "case.json"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn load_bundle_file_missing_is_read_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let err = load_bundle_file(&tmp.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, LoadError::Read { .. }));
    }

    #[test]
    fn jsonl_skips_blank_lines_and_keeps_bad_ones() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("all.jsonl");
        std::fs::write(
            &path,
            "{\"logs\":{\"a\":\"x\"}}\n\n{broken\n{\"logs\":{\"b\":[\"y\"]}}\n",
        )
        .unwrap();

        let entries = load_jsonl(&path).unwrap();
        let lines: Vec<usize> = entries.iter().map(|(line, _)| *line).collect();
        assert_eq!(lines, vec![1, 3, 4]);
        assert!(entries[0].1.is_ok());
        assert!(matches!(
            entries[1].1,
            Err(LoadError::JsonLine { line: 3, .. })
        ));
        assert_eq!(entries[2].1.as_ref().unwrap().stream("b"), "y");
    }

    #[test]
    fn discover_sorted_and_optionally_recursive() {
        let tmp = tempfile::TempDir::new().unwrap();
        let nested = tmp.path().join("case_2");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(tmp.path().join("b.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("a.json"), "{}").unwrap();
        std::fs::write(tmp.path().join("notes.txt"), "").unwrap();
        std::fs::write(tmp.path().join("all.jsonl"), "").unwrap();
        std::fs::write(nested.join("c.json"), "{}").unwrap();

        let flat = discover_bundle_files(tmp.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);

        let deep = discover_bundle_files(tmp.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&nested.join("c.json")));
    }

    #[test]
    fn jsonl_invalid_utf8_line_is_isolated() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("corpus.jsonl");
        let mut bytes = b"{\"logs\":{\"a\":\"x\"}}\n".to_vec();
        bytes.extend_from_slice(b"{\"logs\":{\"b\":\"\xff\xfe\"}}\n");
        bytes.extend_from_slice(b"{\"logs\":{\"c\":\"z\"}}");
        std::fs::write(&path, bytes).unwrap();

        let entries = load_jsonl(&path).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries[0].1.is_ok());
        assert!(matches!(
            &entries[1].1,
            Err(LoadError::JsonLine { line: 2, message }) if message.contains("UTF-8")
        ));
        assert_eq!(entries[2].1.as_ref().unwrap().stream("c"), "z");
    }

    #[cfg(unix)]
    #[test]
    fn recursive_discovery_ignores_symlinked_dirs() {
        let tmp = tempfile::TempDir::new().unwrap();
        let case = tmp.path().join("case_1");
        std::fs::create_dir_all(&case).unwrap();
        std::fs::write(case.join("001.json"), "{}").unwrap();
        std::os::unix::fs::symlink(tmp.path(), case.join("loop")).unwrap();

        let files = discover_bundle_files(tmp.path(), true).unwrap();
        assert_eq!(files, vec![case.join("001.json")]);
    }
}
