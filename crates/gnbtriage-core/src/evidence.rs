//! Targeted extraction helpers used to refine a verdict.
//!
//! Unlike the catalog, these checks are case-sensitive: they look for the
//! exact wording the softmodem and UE emit. Every helper returns `None` or a
//! zero count when nothing is found; none of them can fail.

use std::sync::LazyLock;

use memchr::memmem;
use regex::Regex;

static ASSERTION_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Assertion \(([^)]+)\) failed").expect("valid assertion pattern")
});
static ASSERTION_EXPR_LAZY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Assertion \((.*?)\) failed").expect("valid assertion pattern")
});
static IPV4_LITERAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"IPv4\s+[\d.]+").expect("valid IPv4 pattern"));
static CONNECT_FAILURE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"connect\(\).*failed").expect("valid connect pattern"));
static EXIT_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"In (.*?) \.\.").expect("valid exit context pattern"));

fn contains(haystack: &str, needle: &str) -> bool {
    memmem::find(haystack.as_bytes(), needle.as_bytes()).is_some()
}

/// Parenthesized expression of the first `Assertion (...) failed` message.
///
/// Only attempted when the corpus mentions both `Assertion` and `failed`.
pub fn extract_assertion(corpus: &str) -> Option<&str> {
    if !contains(corpus, "Assertion") || !contains(corpus, "failed") {
        return None;
    }
    ASSERTION_EXPR
        .captures(corpus)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// First `IPv4 <address>` literal, e.g. `IPv4 10.0.0.5`.
pub fn extract_ipv4(corpus: &str) -> Option<&str> {
    IPV4_LITERAL.find(corpus).map(|m| m.as_str())
}

/// Whether a UE stream shows socket-level connect retries at all.
pub fn has_connect_retries(ue_stream: &str) -> bool {
    contains(ue_stream, "connect() to") && contains(ue_stream, "failed, errno")
}

/// Number of `connect() ... failed` occurrences in a single stream.
pub fn count_connect_failures(stream: &str) -> usize {
    CONNECT_FAILURE.find_iter(stream).count()
}

/// The four binary end-to-end success signals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SuccessSignals {
    pub pdu_session_accept: bool,
    pub rrc_connected: bool,
    pub cbra_succeeded: bool,
    pub ipv4_configured: bool,
}

impl SuccessSignals {
    /// Number of distinct signals; the corroboration threshold cannot exceed it.
    pub const COUNT: usize = 4;

    pub fn detect(corpus: &str) -> Self {
        Self {
            pdu_session_accept: contains(corpus, "PDU Session Establishment Accept"),
            rrc_connected: contains(corpus, "RRC_CONNECTED reached"),
            cbra_succeeded: contains(corpus, "CBRA procedure succeeded"),
            ipv4_configured: IPV4_LITERAL.is_match(corpus),
        }
    }

    /// How many of the four signals are present.
    pub fn count(&self) -> usize {
        [
            self.pdu_session_accept,
            self.rrc_connected,
            self.cbra_succeeded,
            self.ipv4_configured,
        ]
        .into_iter()
        .filter(|present| *present)
        .count()
    }
}

/// Function name from the `In <fn> ..` line preceding a forced exit.
pub fn exit_context(corpus: &str) -> Option<&str> {
    EXIT_FUNCTION
        .captures(corpus)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Coarse crash signature used to cluster crashes across a corpus.
///
/// Assertions win over segfaults, which win over forced exits.
pub fn crash_signature(corpus: &str) -> Option<String> {
    if contains(corpus, "Assertion") {
        return Some(match ASSERTION_EXPR_LAZY.captures(corpus).and_then(|c| c.get(1)) {
            Some(expr) => format!("Assertion: {}", expr.as_str()),
            None => "Assertion (Other)".to_string(),
        });
    }
    if contains(corpus, "Segmentation fault") {
        return Some("Segmentation Fault".to_string());
    }
    if contains(corpus, "Exiting execution") {
        return Some(match exit_context(corpus) {
            Some(function) => format!("Exit in: {function}"),
            None => "Generic Exit".to_string(),
        });
    }
    None
}
