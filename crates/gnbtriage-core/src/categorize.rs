//! Failure categorization of JSONL corpora.
//!
//! Independent of the severity cascade: this assigns each bundle a coarse
//! root-cause category for dataset curation. Categories are checked in five
//! priority levels; the first matching category wins.
//!
//! | Level | Categories |
//! |-------|------------|
//! | 1 | GTP/interface creation, RF/ARFCN, encoding/buffer, DNS/address |
//! | 2 | configuration/syntax |
//! | 3 | SCTP connection refused |
//! | 4 | general crash/assertion |
//! | 5 | PLMN/cell-id mismatch, RF/hardware/feature missing |

use std::fmt::Write;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::bundle;

/// Stats bucket for lines that could not be parsed into a bundle.
pub const JSON_DECODE_ERROR: &str = "JSON Decode Error";

/// Characters of corpus kept in a CSV snippet.
pub const SNIPPET_CHARS: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    GtpInterfaceCreation,
    RadioFrequencyArfcn,
    EncodingBufferOverflow,
    DnsAddressResolution,
    ConfigurationSyntax,
    SctpConnectionRefused,
    GeneralCrash,
    PlmnCellIdMismatch,
    RfHardwareMissing,
    Unknown,
    EmptyLog,
}

impl FailureCategory {
    pub fn label(self) -> &'static str {
        match self {
            Self::GtpInterfaceCreation => "GTP/Interface Creation Failure",
            Self::RadioFrequencyArfcn => "Radio Frequency/ARFCN Issue",
            Self::EncodingBufferOverflow => "Encoding/Buffer Overflow",
            Self::DnsAddressResolution => "DNS/Address Resolution Error",
            Self::ConfigurationSyntax => "Configuration/Syntax Error",
            Self::SctpConnectionRefused => "SCTP Connection Refused",
            Self::GeneralCrash => "General Component Crash/Assertion",
            Self::PlmnCellIdMismatch => "Network/PLMN/Cell ID Mismatch",
            Self::RfHardwareMissing => "RF/Hardware/Feature Missing",
            Self::Unknown => "Unknown/Other",
            Self::EmptyLog => "Empty Log",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Categories in evaluation order; within a level, table order decides.
const PRIORITY: [FailureCategory; 9] = [
    FailureCategory::GtpInterfaceCreation,
    FailureCategory::RadioFrequencyArfcn,
    FailureCategory::EncodingBufferOverflow,
    FailureCategory::DnsAddressResolution,
    FailureCategory::ConfigurationSyntax,
    FailureCategory::SctpConnectionRefused,
    FailureCategory::GeneralCrash,
    FailureCategory::PlmnCellIdMismatch,
    FailureCategory::RfHardwareMissing,
];

const CATEGORY_PATTERNS: &[(FailureCategory, &str)] = &[
    (FailureCategory::GtpInterfaceCreation, r"Assertion.*gtpInst > 0"),
    (FailureCategory::GtpInterfaceCreation, r"cannot create DU F1-U GTP module"),
    (FailureCategory::GtpInterfaceCreation, r"sctp_handle_new_association_req"),
    (FailureCategory::GtpInterfaceCreation, r"Assertion.*status == 0"),
    (FailureCategory::RadioFrequencyArfcn, r"Assertion.*freq.*3000000000"),
    (FailureCategory::RadioFrequencyArfcn, r"Assertion.*nrarfcn >= N_OFFs"),
    (FailureCategory::RadioFrequencyArfcn, r"Assertion.*delta_f_RA_PRACH < 6"),
    (FailureCategory::RadioFrequencyArfcn, r"Assertion.*subcarrier_offset"),
    (FailureCategory::EncodingBufferOverflow, r"Assertion.*enc_rval.encoded > 0"),
    (FailureCategory::EncodingBufferOverflow, r"Assertion.*bw_index"),
    (FailureCategory::DnsAddressResolution, r"getaddrinfo error"),
    (FailureCategory::DnsAddressResolution, r"Name or service not known"),
    (FailureCategory::ConfigurationSyntax, r"syntax error"),
    (FailureCategory::ConfigurationSyntax, r"unknown option"),
    (FailureCategory::ConfigurationSyntax, r"invalid value"),
    (FailureCategory::ConfigurationSyntax, r"config_execcheck"),
    (FailureCategory::ConfigurationSyntax, r"Failed to parse"),
    (FailureCategory::ConfigurationSyntax, r"Error in configuration"),
    (FailureCategory::ConfigurationSyntax, r"mismatch in.*configuration"),
    (FailureCategory::SctpConnectionRefused, r"Connection refused"),
    (FailureCategory::SctpConnectionRefused, r"connect.*failed"),
    (FailureCategory::SctpConnectionRefused, r"errno\(111\)"),
    (FailureCategory::GeneralCrash, r"Assertion.*failed"),
    (FailureCategory::GeneralCrash, r"Segmentation fault"),
    (FailureCategory::GeneralCrash, r"dumping core"),
    (FailureCategory::GeneralCrash, r"exiting with status 1"),
    (FailureCategory::GeneralCrash, r"AS_ASSERT"),
    (FailureCategory::GeneralCrash, r"Exiting execution"),
    (FailureCategory::GeneralCrash, r"Exiting OAI softmodem"),
    (FailureCategory::GeneralCrash, r"_Assert_Exit_"),
    (FailureCategory::PlmnCellIdMismatch, r"PLMN.*mismatch"),
    (FailureCategory::PlmnCellIdMismatch, r"CellIdentity.*mismatch"),
    (FailureCategory::PlmnCellIdMismatch, r"TAC.*mismatch"),
    (FailureCategory::PlmnCellIdMismatch, r"Network.*configuration.*mismatch"),
    (FailureCategory::PlmnCellIdMismatch, r"Dropping.*due to.*mismatch"),
    (FailureCategory::RfHardwareMissing, r"rfsimulator.*failed"),
    (FailureCategory::RfHardwareMissing, r"features not found"),
    (FailureCategory::RfHardwareMissing, r"No radio device"),
    (FailureCategory::RfHardwareMissing, r"Failed to load.*library"),
    (FailureCategory::RfHardwareMissing, r"Device.*not found"),
];

static COMPILED: LazyLock<Vec<(FailureCategory, Regex)>> = LazyLock::new(|| {
    CATEGORY_PATTERNS
        .iter()
        .map(|&(category, pattern)| {
            let regex = Regex::new(&format!("(?im){pattern}"))
                .expect("category patterns are valid regexes");
            (category, regex)
        })
        .collect()
});

/// Assign a corpus to its highest-priority matching category.
pub fn categorize(corpus: &str) -> FailureCategory {
    if corpus.is_empty() {
        return FailureCategory::EmptyLog;
    }
    PRIORITY
        .into_iter()
        .find(|category| {
            COMPILED
                .iter()
                .filter(|(c, _)| c == category)
                .any(|(_, regex)| regex.is_match(corpus))
        })
        .unwrap_or(FailureCategory::Unknown)
}

/// One CSV row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizedRow {
    pub line: usize,
    pub category: FailureCategory,
    /// `"N/A"` when the bundle does not record one
    pub misconfigured_param: String,
    pub snippet: String,
}

/// First [`SNIPPET_CHARS`] characters of the corpus on a single line.
pub fn snippet(corpus: &str) -> String {
    corpus
        .chars()
        .take(SNIPPET_CHARS)
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

/// Count and source lines of one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryBucket {
    pub label: String,
    pub count: usize,
    pub lines: Vec<usize>,
}

/// Per-category tallies, kept in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategoryStats {
    buckets: Vec<CategoryBucket>,
}

impl CategoryStats {
    pub fn record(&mut self, label: &str, line: usize) {
        if let Some(bucket) = self.buckets.iter_mut().find(|b| b.label == label) {
            bucket.count += 1;
            bucket.lines.push(line);
        } else {
            self.buckets.push(CategoryBucket {
                label: label.to_string(),
                count: 1,
                lines: vec![line],
            });
        }
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(|b| b.count).sum()
    }

    pub fn count(&self, label: &str) -> usize {
        self.buckets
            .iter()
            .find(|b| b.label == label)
            .map_or(0, |b| b.count)
    }

    /// Buckets by descending count; ties keep first-seen order.
    pub fn most_common(&self) -> Vec<&CategoryBucket> {
        let mut sorted: Vec<_> = self.buckets.iter().collect();
        sorted.sort_by(|a, b| b.count.cmp(&a.count));
        sorted
    }

    pub fn render_text(&self) -> String {
        let total = self.total();
        let mut out = String::new();
        let _ = writeln!(out, "Classification Statistics:");
        let _ = writeln!(out, "==========================");
        let _ = writeln!(out, "Total Entries: {total}");
        let _ = writeln!(out);
        for bucket in self.most_common() {
            let pct = if total > 0 {
                bucket.count as f64 / total as f64 * 100.0
            } else {
                0.0
            };
            let lines: Vec<String> = bucket.lines.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "Category: {}", bucket.label);
            let _ = writeln!(out, "Count: {} ({pct:.2}%)", bucket.count);
            let _ = writeln!(out, "Lines: {}", lines.join(", "));
            let _ = writeln!(out, "{}", "-".repeat(40));
        }
        out
    }
}

/// Rows plus statistics for one corpus.
#[derive(Debug, Clone, Default)]
pub struct CategorizeRun {
    pub rows: Vec<CategorizedRow>,
    pub stats: CategoryStats,
}

/// Categorize every line of a JSONL corpus.
///
/// Malformed lines produce no row and are tallied under [`JSON_DECODE_ERROR`].
pub fn categorize_jsonl(path: &Path) -> crate::Result<CategorizeRun> {
    let mut run = CategorizeRun::default();
    for (line, parsed) in bundle::load_jsonl(path)? {
        match parsed {
            Ok(bundle) => {
                let corpus = bundle.corpus();
                let category = categorize(&corpus);
                run.stats.record(category.label(), line);
                run.rows.push(CategorizedRow {
                    line,
                    category,
                    misconfigured_param: bundle
                        .misconfigured_param
                        .unwrap_or_else(|| "N/A".to_string()),
                    snippet: snippet(&corpus),
                });
            }
            Err(_) => run.stats.record(JSON_DECODE_ERROR, line),
        }
    }
    tracing::info!(
        path = %path.display(),
        rows = run.rows.len(),
        decode_errors = run.stats.count(JSON_DECODE_ERROR),
        "Categorization complete"
    );
    Ok(run)
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Render rows as CSV with a `Line,Category,Misconfigured_Param,Snippet` header.
pub fn format_csv(rows: &[CategorizedRow]) -> String {
    let mut output = String::from("Line,Category,Misconfigured_Param,Snippet\n");
    for row in rows {
        let _ = writeln!(
            output,
            "{},{},{},{}",
            row.line,
            csv_field(row.category.label()),
            csv_field(&row.misconfigured_param),
            csv_field(&row.snippet),
        );
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_corpus_is_empty_log() {
        assert_eq!(categorize(""), FailureCategory::EmptyLog);
        assert_eq!(categorize("\n"), FailureCategory::Unknown);
    }

    #[test]
    fn specific_assertion_beats_general_crash() {
        let corpus = "Assertion (gtpInst > 0) failed!\nExiting execution\n";
        assert_eq!(categorize(corpus), FailureCategory::GtpInterfaceCreation);
    }

    #[test]
    fn config_beats_sctp_and_crash() {
        let corpus = "config_execcheck: invalid value\nConnection refused\nSegmentation fault\n";
        assert_eq!(categorize(corpus), FailureCategory::ConfigurationSyntax);
    }

    #[test]
    fn sctp_beats_general_crash() {
        let corpus = "[SCTP] connect() failed errno(111)\nAssertion (x) failed\n";
        assert_eq!(categorize(corpus), FailureCategory::SctpConnectionRefused);
    }

    #[test]
    fn dns_in_first_level() {
        let corpus = "getaddrinfo error: Name or service not known\nconnect failed\n";
        assert_eq!(categorize(corpus), FailureCategory::DnsAddressResolution);
    }

    #[test]
    fn lowest_levels_and_fallback() {
        assert_eq!(
            categorize("PLMN 001.01 mismatch with AMF"),
            FailureCategory::PlmnCellIdMismatch
        );
        assert_eq!(categorize("No radio device found"), FailureCategory::RfHardwareMissing);
        assert_eq!(categorize("all quiet"), FailureCategory::Unknown);
    }

    #[test]
    fn snippet_is_single_line_and_bounded() {
        let corpus = format!("a\nb\n{}", "x".repeat(500));
        let s = snippet(&corpus);
        assert_eq!(s.chars().count(), SNIPPET_CHARS);
        assert!(s.starts_with("a b "));
    }

    #[test]
    fn csv_quotes_when_needed() {
        let rows = vec![CategorizedRow {
            line: 4,
            category: FailureCategory::Unknown,
            misconfigured_param: "N/A".into(),
            snippet: "says \"hi\", then leaves".into(),
        }];
        let csv = format_csv(&rows);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("Line,Category,Misconfigured_Param,Snippet"));
        assert_eq!(
            lines.next(),
            Some("4,Unknown/Other,N/A,\"says \"\"hi\"\", then leaves\"")
        );
    }

    #[test]
    fn stats_most_common_with_stable_ties() {
        let mut stats = CategoryStats::default();
        stats.record("B", 1);
        stats.record("A", 2);
        stats.record("A", 3);
        stats.record("C", 4);
        let order: Vec<_> = stats.most_common().iter().map(|b| b.label.as_str()).collect();
        assert_eq!(order, vec!["A", "B", "C"]);
        assert_eq!(stats.total(), 4);

        let text = stats.render_text();
        assert!(text.contains("Total Entries: 4"));
        assert!(text.contains("Category: A\nCount: 2 (50.00%)\nLines: 2, 3\n"));
    }

    #[test]
    fn jsonl_run_counts_decode_errors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("all.jsonl");
        std::fs::write(
            &path,
            concat!(
                "{\"logs\":{\"du\":[\"Segmentation fault\"]},\"misconfigured_param\":\"gNB_ID\"}\n",
                "{oops\n",
                "{\"logs\":{}}\n",
            ),
        )
        .unwrap();

        let run = categorize_jsonl(&path).unwrap();
        assert_eq!(run.rows.len(), 2);
        assert_eq!(run.rows[0].category, FailureCategory::GeneralCrash);
        assert_eq!(run.rows[0].misconfigured_param, "gNB_ID");
        assert_eq!(run.rows[1].category, FailureCategory::EmptyLog);
        assert_eq!(run.rows[1].misconfigured_param, "N/A");
        assert_eq!(run.stats.count(JSON_DECODE_ERROR), 1);
    }
}
