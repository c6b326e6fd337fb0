//! Error types for gnbtriage-core

use std::fmt::Write;
use thiserror::Error;

/// A suggested command, shown as `label: command`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationCommand {
    pub label: String,
    pub command: String,
}

/// How to get past an error: a one-line summary, commands to run, and
/// fallbacks when the commands do not apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remediation {
    pub summary: String,
    pub commands: Vec<RemediationCommand>,
    pub alternatives: Vec<String>,
}

impl Remediation {
    #[must_use]
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            commands: Vec::new(),
            alternatives: Vec::new(),
        }
    }

    #[must_use]
    pub fn command(mut self, label: impl Into<String>, command: impl Into<String>) -> Self {
        let (label, command) = (label.into(), command.into());
        self.commands.push(RemediationCommand { label, command });
        self
    }

    #[must_use]
    pub fn alternative(mut self, alternative: impl Into<String>) -> Self {
        self.alternatives.push(alternative.into());
        self
    }

    /// Plain-text block printed under the error on stderr.
    #[must_use]
    pub fn render_plain(&self) -> String {
        let mut out = format!("To fix:\n  {}\n", self.summary);
        if !self.commands.is_empty() {
            out.push_str("  Commands:\n");
            for RemediationCommand { label, command } in &self.commands {
                let _ = writeln!(out, "    - {label}: {command}");
            }
        }
        if !self.alternatives.is_empty() {
            out.push_str("  Alternatives:\n");
            for alternative in &self.alternatives {
                let _ = writeln!(out, "    - {alternative}");
            }
        }
        out
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for gnbtriage-core
#[derive(Error, Debug)]
pub enum Error {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Log bundle loading errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Results and report (de)serialization
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    #[must_use]
    pub fn remediation(&self) -> Option<Remediation> {
        match self {
            Self::Config(err) => Some(err.remediation()),
            Self::Load(err) => Some(err.remediation()),
            Self::Io(_) => Some(
                Remediation::new("A bundle directory or output path is missing or not writable.")
                    .command("Show effective paths", "gnbt config")
                    .alternative("Organize and isolate create their destination; the source must already exist."),
            ),
            Self::Json(_) => Some(
                Remediation::new("A results file or report could not be encoded or decoded as JSON.")
                    .command("Regenerate results", "gnbt classify <INPUT> --output results.json")
                    .alternative("`gnbt summary` accepts a classify report or a bare array of records."),
            ),
        }
    }
}

/// Errors raised while turning a file or JSON line into a log bundle.
///
/// Batch drivers turn these into processing-error records instead of failing.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid JSON on line {line}: {message}")]
    JsonLine { line: usize, message: String },

    #[error("unexpected bundle shape: {0}")]
    Shape(String),
}

impl LoadError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::Read { path, .. } => {
                Remediation::new(format!("Could not read {path}. Check that it exists and is readable."))
                    .command("Check path", format!("ls -l \"{path}\""))
                    .alternative("Re-run the log merge step that produced this bundle.")
            }
            Self::Json { path, .. } => {
                Remediation::new(format!("{path} is not valid JSON. Fix or regenerate the bundle."))
                    .command("Validate JSON", format!("python -m json.tool < \"{path}\""))
                    .alternative("Remove the file from the input directory to skip it.")
            }
            Self::JsonLine { line, .. } => {
                Remediation::new(format!("Line {line} of the JSONL input is malformed."))
                    .command("Show line", format!("sed -n '{line}p' <input.jsonl>"))
                    .alternative("Malformed lines are counted and skipped; fix the line to include it.")
            }
            Self::Shape(_) => Remediation::new(
                "The bundle must be a JSON object with a `logs` mapping of stream name to text.",
            )
            .command("List rules", "gnbt rules")
            .alternative("Stream values may be a string or a list of strings."),
        }
    }
}

/// Problems locating, reading, or validating `gnbtriage.toml`, and missing
/// required paths.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file {0}: {1}")]
    ReadFailed(String, String),

    #[error("Failed to parse config: {0}")]
    ParseFailed(String),

    #[error("Failed to serialize config: {0}")]
    SerializeFailed(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("No {0} given on the command line or in [paths]")]
    MissingPath(&'static str),
}

impl ConfigError {
    #[must_use]
    pub fn remediation(&self) -> Remediation {
        match self {
            Self::FileNotFound(path) => {
                Remediation::new(format!("No config file at {path}; --config must name an existing file."))
                    .command("Print the defaults as a starting point", "gnbt config > gnbtriage.toml")
                    .alternative("Drop --config to fall back to $GNBT_CONFIG or ./gnbtriage.toml.")
            }
            Self::ReadFailed(path, _) => {
                Remediation::new(format!("{path} exists but could not be read."))
                    .command("Inspect permissions", format!("ls -l \"{path}\""))
                    .alternative("Unset GNBT_CONFIG if it points at a stale location.")
            }
            Self::ParseFailed(_) => Remediation::new("gnbtriage.toml is not valid TOML for this version.")
                .command("Compare with the defaults", "gnbt config")
                .alternative("Unknown keys are ignored; check the section names and value types."),
            Self::SerializeFailed(_) => Remediation::new("The effective configuration could not be rendered as TOML.")
                .command("Print the built-in defaults", "gnbt --config /dev/null config")
                .alternative("Remove non-finite confidence values from the file."),
            Self::ValidationError(_) => Remediation::new("A [classifier] or [report] value is out of range.")
                .command("Compare with the defaults", "gnbt config")
                .alternative("Confidences lie in [0, 1], low_confidence <= high_confidence, and success_corroboration >= 1."),
            Self::MissingPath(what) => Remediation::new(format!(
                "Provide the {what} as an argument or set it in the [paths] section."
            ))
            .command("Show effective paths", "gnbt config")
            .alternative("Run with --help to see the positional arguments."),
        }
    }
}

/// `Error: <message>`, followed by a blank line and the remediation block.
#[must_use]
pub fn format_error_with_remediation(error: &Error) -> String {
    match error.remediation() {
        Some(remediation) => format!("Error: {error}\n\n{}", remediation.render_plain()),
        None => format!("Error: {error}"),
    }
}
