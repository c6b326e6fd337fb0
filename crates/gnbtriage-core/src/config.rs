//! Configuration management for gnbtriage
//!
//! Handles loading and validation of `gnbtriage.toml`. Every section is
//! optional; a missing file yields the built-in defaults, which reproduce the
//! classification constants the harness has always used.
//!
//! ```toml
//! [logging]
//! level = "debug"
//! format = "json"
//!
//! [paths]
//! inputs = ["runs/op1_100_case_1", "runs/op1_100_case_2"]
//! results = "out/classification_results.json"
//!
//! [classifier]
//! ue_stream = "ue.stdout.log"
//! connect_failure_threshold = 10
//!
//! [report]
//! evidence_limit = 3
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::evidence::SuccessSignals;
use crate::logging::LogConfig;

/// Config file name looked up in the working directory and the user config dir.
pub const CONFIG_FILE_NAME: &str = "gnbtriage.toml";

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "GNBT_CONFIG";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-friendly output for interactive use
    #[default]
    Pretty,
    /// JSON lines for CI and log shipping
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("unknown log format: {s}. Expected one of: pretty, json")),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings
    pub logging: LogConfig,

    /// Default input and output locations
    pub paths: PathsConfig,

    /// Classification thresholds and confidence constants
    pub classifier: ClassifierConfig,

    /// Batch report settings
    pub report: ReportConfig,
}

/// Default filesystem locations used when the CLI is given none.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Directories or bundle files to classify
    pub inputs: Vec<PathBuf>,
    /// JSONL file with one bundle per line (categorize/breakdown)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jsonl: Option<PathBuf>,
    /// Where classification results are written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<PathBuf>,
    /// Where the plain-text summary is written
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<PathBuf>,
    /// Source tree for organize/isolate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    /// Destination tree for organize/isolate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<PathBuf>,
    /// CSV output for categorize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_csv: Option<PathBuf>,
    /// Statistics output for categorize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub categories_stats: Option<PathBuf>,
}

/// Classifier thresholds and the fixed confidence attached to each rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Stream inspected by the repeated connect-failure heuristic
    pub ue_stream: String,
    /// Success sub-signals needed for a corroborated success (1 to 4)
    pub success_corroboration: usize,
    /// Connect failures must exceed this count to fire
    pub connect_failure_threshold: usize,
    pub confidence: ConfidenceTable,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ue_stream: "ue.stdout.log".to_string(),
            success_corroboration: 2,
            connect_failure_threshold: 10,
            confidence: ConfidenceTable::default(),
        }
    }
}

/// Confidence constants, one per cascade step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceTable {
    pub crash: f64,
    pub success: f64,
    pub connection_failure: f64,
    pub abnormal: f64,
    pub repeated_connect_failure: f64,
    pub metadata_fallback: f64,
    pub residual_success: f64,
    pub uncertain: f64,
}

impl Default for ConfidenceTable {
    fn default() -> Self {
        Self {
            crash: 0.95,
            success: 0.90,
            connection_failure: 0.85,
            abnormal: 0.70,
            repeated_connect_failure: 0.80,
            metadata_fallback: 0.50,
            residual_success: 0.70,
            uncertain: 0.30,
        }
    }
}

impl ConfidenceTable {
    fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("crash", self.crash),
            ("success", self.success),
            ("connection_failure", self.connection_failure),
            ("abnormal", self.abnormal),
            ("repeated_connect_failure", self.repeated_connect_failure),
            ("metadata_fallback", self.metadata_fallback),
            ("residual_success", self.residual_success),
            ("uncertain", self.uncertain),
        ]
    }
}

/// Batch report settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Evidence entries kept per record in bulk reports
    pub evidence_limit: usize,
    /// Records at or above this confidence count as high confidence
    pub high_confidence: f64,
    /// Records below this confidence are listed for manual review
    pub low_confidence: f64,
    /// Low-confidence cases printed in the console summary
    pub review_limit: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            evidence_limit: 3,
            high_confidence: 0.85,
            low_confidence: 0.60,
            review_limit: 10,
        }
    }
}

impl Config {
    /// Load configuration, resolving the path via [`resolve_config_path`].
    ///
    /// An explicit path that does not exist is an error; an implicit lookup
    /// that finds nothing falls back to defaults.
    pub fn load(explicit: Option<&Path>) -> crate::Result<Self> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ConfigError::FileNotFound(path.display().to_string()).into());
            }
        }
        match resolve_config_path(explicit) {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No config file found; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::ReadFailed(path.display().to_string(), e.to_string())
        })?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(config_path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Parse and validate configuration from TOML text.
    pub fn from_toml_str(content: &str) -> crate::Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> crate::Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::SerializeFailed(e.to_string()).into())
    }

    /// Check value ranges that serde cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        let classifier = &self.classifier;
        if classifier.ue_stream.trim().is_empty() {
            return Err(
                ConfigError::ValidationError("classifier.ue_stream must not be empty".into()).into(),
            );
        }
        if !(1..=SuccessSignals::COUNT).contains(&classifier.success_corroboration) {
            return Err(ConfigError::ValidationError(format!(
                "classifier.success_corroboration = {} is outside 1..={}",
                classifier.success_corroboration,
                SuccessSignals::COUNT
            ))
            .into());
        }
        for (name, value) in classifier.confidence.entries() {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "classifier.confidence.{name} = {value} is outside [0, 1]"
                ))
                .into());
            }
        }

        let report = &self.report;
        for (name, value) in [
            ("high_confidence", report.high_confidence),
            ("low_confidence", report.low_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "report.{name} = {value} is outside [0, 1]"
                ))
                .into());
            }
        }
        if report.low_confidence > report.high_confidence {
            return Err(ConfigError::ValidationError(format!(
                "report.low_confidence ({}) exceeds report.high_confidence ({})",
                report.low_confidence, report.high_confidence
            ))
            .into());
        }
        Ok(())
    }
}

/// Resolve the config file path.
///
/// Order: explicit path, `$GNBT_CONFIG`, `./gnbtriage.toml`,
/// `<config_dir>/gnbtriage/gnbtriage.toml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }

    if let Ok(env_path) = std::env::var(CONFIG_ENV_VAR) {
        if !env_path.trim().is_empty() {
            return Some(PathBuf::from(env_path));
        }
    }

    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.exists() {
        return Some(local);
    }

    dirs::config_dir()
        .map(|dir| dir.join("gnbtriage").join(CONFIG_FILE_NAME))
        .filter(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.classifier.ue_stream, "ue.stdout.log");
        assert_eq!(config.classifier.success_corroboration, 2);
        assert_eq!(config.classifier.connect_failure_threshold, 10);
        assert_eq!(config.report.evidence_limit, 3);
    }

    #[test]
    fn default_confidences_match_cascade() {
        let table = ConfidenceTable::default();
        assert!((table.crash - 0.95).abs() < f64::EPSILON);
        assert!((table.success - 0.90).abs() < f64::EPSILON);
        assert!((table.connection_failure - 0.85).abs() < f64::EPSILON);
        assert!((table.abnormal - 0.70).abs() < f64::EPSILON);
        assert!((table.repeated_connect_failure - 0.80).abs() < f64::EPSILON);
        assert!((table.metadata_fallback - 0.50).abs() < f64::EPSILON);
        assert!((table.residual_success - 0.70).abs() < f64::EPSILON);
        assert!((table.uncertain - 0.30).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = Config::from_toml_str("").unwrap();
        assert_eq!(config.classifier, ClassifierConfig::default());
        assert_eq!(config.report, ReportConfig::default());
        assert!(config.paths.inputs.is_empty());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = Config::from_toml_str(
            r#"
            [classifier]
            ue_stream = "ue.log"

            [classifier.confidence]
            crash = 0.99

            [paths]
            inputs = ["a", "b"]
            results = "out/results.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.classifier.ue_stream, "ue.log");
        assert_eq!(config.classifier.connect_failure_threshold, 10);
        assert!((config.classifier.confidence.crash - 0.99).abs() < f64::EPSILON);
        assert!((config.classifier.confidence.success - 0.90).abs() < f64::EPSILON);
        assert_eq!(config.paths.inputs, vec![PathBuf::from("a"), PathBuf::from("b")]);
        assert_eq!(config.paths.results, Some(PathBuf::from("out/results.json")));
    }

    #[test]
    fn invalid_toml_is_parse_error() {
        let err = Config::from_toml_str("[classifier\nue_stream = 1").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ParseFailed(_))));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let err = Config::from_toml_str("[classifier.confidence]\nabnormal = 1.5").unwrap_err();
        match err {
            Error::Config(ConfigError::ValidationError(msg)) => {
                assert!(msg.contains("abnormal"), "{msg}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn inverted_confidence_bands_rejected() {
        let err =
            Config::from_toml_str("[report]\nlow_confidence = 0.9\nhigh_confidence = 0.5")
                .unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ValidationError(_))));
    }

    #[test]
    fn empty_ue_stream_rejected() {
        let err = Config::from_toml_str("[classifier]\nue_stream = \"  \"").unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::ValidationError(_))));
    }

    #[test]
    fn success_corroboration_bounded_by_signal_count() {
        for bad in [0, 5] {
            let toml = format!("[classifier]\nsuccess_corroboration = {bad}");
            let err = Config::from_toml_str(&toml).unwrap_err();
            assert!(
                matches!(err, Error::Config(ConfigError::ValidationError(ref msg)) if msg.contains("success_corroboration")),
                "{bad} accepted"
            );
        }
        let config = Config::from_toml_str("[classifier]\nsuccess_corroboration = 4").unwrap();
        assert_eq!(config.classifier.success_corroboration, 4);
    }

    #[test]
    fn toml_roundtrip_preserves_values() {
        let mut config = Config::default();
        config.classifier.connect_failure_threshold = 25;
        config.paths.source = Some(PathBuf::from("merge_only_error"));
        let text = config.to_toml_string().unwrap();
        let back = Config::from_toml_str(&text).unwrap();
        assert_eq!(back.classifier.connect_failure_threshold, 25);
        assert_eq!(back.paths.source, Some(PathBuf::from("merge_only_error")));
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[report]\nreview_limit = 4\n").unwrap();
        let config = Config::load(Some(path.as_path())).unwrap();
        assert_eq!(config.report.review_limit, 4);
    }

    #[test]
    fn load_missing_explicit_path_fails() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nope.toml");
        let err = Config::load(Some(path.as_path())).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn log_format_parse_and_display() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
        assert_eq!(LogFormat::Json.to_string(), "json");
    }
}
