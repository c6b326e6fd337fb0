//! Crash and SCTP sub-cluster breakdown over a corpus of bundles.

use std::fmt::Write;
use std::path::Path;
use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;
use serde::Serialize;

use crate::bundle::{self, LogBundle};
use crate::evidence;

static SCTP_FAILED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SCTP.*failed").expect("valid SCTP pattern"));

/// Counter that remembers first-seen order for tie breaking.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Tally {
    entries: Vec<(String, usize)>,
}

impl Tally {
    pub fn add(&mut self, key: &str) {
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 += 1;
        } else {
            self.entries.push((key.to_string(), 1));
        }
    }

    pub fn get(&self, key: &str) -> usize {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map_or(0, |(_, count)| *count)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Top `n` keys by descending count; ties keep first-seen order.
    pub fn most_common(&self, n: usize) -> Vec<(&str, usize)> {
        let mut sorted: Vec<(&str, usize)> =
            self.entries.iter().map(|(k, c)| (k.as_str(), *c)).collect();
        sorted.sort_by(|a, b| b.1.cmp(&a.1));
        sorted.truncate(n);
        sorted
    }
}

/// SCTP-level failure detail, most specific first.
fn sctp_detail(corpus: &str) -> Option<&'static str> {
    if memmem::find(corpus.as_bytes(), b"Connection refused").is_some() {
        Some("Connection Refused")
    } else if SCTP_FAILED.is_match(corpus) {
        Some("SCTP Failed (Generic)")
    } else if memmem::find(corpus.as_bytes(), b"getaddrinfo error").is_some() {
        Some("DNS/Addr Error")
    } else {
        None
    }
}

/// Crash signatures and SCTP details counted across bundles.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CrashBreakdown {
    pub crashes: Tally,
    pub sctp: Tally,
    /// JSONL lines that could not be loaded
    pub skipped: usize,
}

impl CrashBreakdown {
    pub fn from_bundles<'a>(bundles: impl IntoIterator<Item = &'a LogBundle>) -> Self {
        let mut breakdown = Self::default();
        for bundle in bundles {
            breakdown.add(bundle);
        }
        breakdown
    }

    /// Breakdown of every loadable line of a JSONL corpus.
    pub fn from_jsonl(path: &Path) -> crate::Result<Self> {
        let mut breakdown = Self::default();
        for (_, parsed) in bundle::load_jsonl(path)? {
            match parsed {
                Ok(bundle) => breakdown.add(&bundle),
                Err(_) => breakdown.skipped += 1,
            }
        }
        Ok(breakdown)
    }

    pub fn add(&mut self, bundle: &LogBundle) {
        let corpus = bundle.corpus();
        if let Some(signature) = evidence::crash_signature(&corpus) {
            self.crashes.add(&signature);
        }
        if let Some(detail) = sctp_detail(&corpus) {
            self.sctp.add(detail);
        }
    }

    pub fn render_text(&self, top: usize) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "--- CRASH BREAKDOWN ---");
        for (key, count) in self.crashes.most_common(top) {
            let _ = writeln!(out, "{key}: {count}");
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "--- SCTP BREAKDOWN ---");
        for (key, count) in self.sctp.most_common(top) {
            let _ = writeln!(out, "{key}: {count}");
        }
        out
    }
}
