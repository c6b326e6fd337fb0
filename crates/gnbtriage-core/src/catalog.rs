//! Pattern catalog: the static, tiered detection rules.
//!
//! Every rule belongs to exactly one [`Tier`] and carries a stable identifier
//! (`crash:segfault`, `success:rrc-connected`, ...) which is what verdict
//! evidence cites. Patterns are matched case-insensitively against the whole
//! corpus in multi-line mode; `.` does not cross line boundaries.
//!
//! ```text
//! corpus ──► Crash ──► Success ──► ConnectionFailure ──► Abnormal
//!            (each tier fires if any one of its rules matches)
//! ```

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// Tiers
// ============================================================================

/// A priority-ordered group of detection rules sharing a severity outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Crash,
    Success,
    ConnectionFailure,
    Abnormal,
}

impl Tier {
    /// All tiers in cascade order.
    pub const ALL: [Self; 4] = [
        Self::Crash,
        Self::Success,
        Self::ConnectionFailure,
        Self::Abnormal,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Crash => "crash",
            Self::Success => "success",
            Self::ConnectionFailure => "connection_failure",
            Self::Abnormal => "abnormal",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ============================================================================
// Rules
// ============================================================================

/// A single compiled detection rule.
#[derive(Debug)]
pub struct Rule {
    /// Stable identifier cited in evidence
    pub id: &'static str,
    pub tier: Tier,
    /// Source pattern, without the case/multi-line flags
    pub pattern: &'static str,
    pub description: &'static str,
    regex: Regex,
}

impl Rule {
    /// Whether this rule matches anywhere in `text`.
    pub fn is_match(&self, text: &str) -> bool {
        self.regex.is_match(text)
    }
}

/// Rule table: (id, tier, pattern, description), in evaluation order.
const RULE_TABLE: &[(&str, Tier, &str, &str)] = &[
    // --- crash ---
    ("crash:assertion-failed", Tier::Crash, r"Assertion.*failed", "assertion failure"),
    ("crash:assert-exit", Tier::Crash, r"Assert_Exit_", "assert exit helper"),
    ("crash:exiting-execution", Tier::Crash, r"Exiting execution", "forced process exit"),
    ("crash:exit-fun", Tier::Crash, r"exit_fun", "abnormal exit helper"),
    ("crash:segfault", Tier::Crash, r"Segmentation fault", "segmentation fault"),
    ("crash:config-execcheck", Tier::Crash, r"config_execcheck.*failed", "configuration check failure"),
    ("crash:fatal", Tier::Crash, r"fatal", "fatal error"),
    ("crash:abort", Tier::Crash, r"abort\(\)", "abort() called"),
    ("crash:core-dump", Tier::Crash, r"core dump", "core dump"),
    // --- success ---
    ("success:pdu-session-accept", Tier::Success, r"PDU Session Establishment Accept", "PDU session established"),
    ("success:ra-succeeded", Tier::Success, r"RA procedure succeeded", "random access succeeded"),
    ("success:rrc-connected", Tier::Success, r"RRC_CONNECTED reached", "RRC connected state reached"),
    ("success:cbra-succeeded", Tier::Success, r"CBRA procedure succeeded", "contention-based random access succeeded"),
    ("success:ipv4-configured", Tier::Success, r"successfully configured.*IPv4", "IPv4 address configured"),
    ("success:pdu-session-accept-received", Tier::Success, r"Received PDU Session Establishment Accept", "UE received PDU session accept"),
    // --- connection failure ---
    ("connfail:ra-failed", Tier::ConnectionFailure, r"RA procedure.*failed", "random access failed"),
    ("connfail:rrc-reject", Tier::ConnectionFailure, r"RRC.*reject", "RRC connection rejected"),
    ("connfail:registration-reject", Tier::ConnectionFailure, r"Registration.*reject", "registration rejected"),
    ("connfail:pdu-session-failed", Tier::ConnectionFailure, r"PDU.*session.*failed", "PDU session establishment failed"),
    ("connfail:attach-failed", Tier::ConnectionFailure, r"attach.*failed", "attach failed"),
    ("connfail:connection-reject", Tier::ConnectionFailure, r"connection.*reject", "connection rejected"),
    ("connfail:ue-connection-failed", Tier::ConnectionFailure, r"UE.*connection.*failed", "UE connection failed"),
    // --- abnormal ---
    ("abnormal:error", Tier::Abnormal, r"ERROR", "ERROR log marker"),
    ("abnormal:critical", Tier::Abnormal, r"CRITICAL", "CRITICAL log marker"),
    ("abnormal:initialization-failed", Tier::Abnormal, r"failed.*initialization", "initialization failure"),
    ("abnormal:init-failed", Tier::Abnormal, r"failed.*init", "init failure"),
    ("abnormal:connection-failed", Tier::Abnormal, r"Connection.*failed", "generic connection failure"),
    ("abnormal:timeout-exceeded", Tier::Abnormal, r"timeout.*exceeded", "timeout exceeded"),
    ("abnormal:retry-limit", Tier::Abnormal, r"retry.*limit", "retry limit reached"),
];

static CATALOG: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    RULE_TABLE
        .iter()
        .map(|&(id, tier, pattern, description)| Rule {
            id,
            tier,
            pattern,
            description,
            regex: Regex::new(&format!("(?im){pattern}"))
                .expect("catalog patterns are valid regexes"),
        })
        .collect()
});

/// Every rule in catalog order.
pub fn all_rules() -> &'static [Rule] {
    &CATALOG
}

/// Rules of one tier, in catalog order.
pub fn rules(tier: Tier) -> impl Iterator<Item = &'static Rule> {
    CATALOG.iter().filter(move |rule| rule.tier == tier)
}

/// Look up a rule by identifier.
pub fn rule(id: &str) -> Option<&'static Rule> {
    CATALOG.iter().find(|rule| rule.id == id)
}

/// Rules of `tier` matching `corpus`, in catalog order.
pub fn matching_rules(tier: Tier, corpus: &str) -> Vec<&'static Rule> {
    rules(tier).filter(|rule| rule.is_match(corpus)).collect()
}

/// Whether any rule of `tier` matches `corpus`.
pub fn tier_fires(tier: Tier, corpus: &str) -> bool {
    rules(tier).any(|rule| rule.is_match(corpus))
}
