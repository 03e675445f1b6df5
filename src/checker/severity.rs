//! Severity classification of raw OSV records.
//!
//! Upstream records carry severity in different places, or not at all.
//! Classification walks an ordered chain of rules and takes the first
//! match; a record no rule recognizes is [`SeverityLevel::Unknown`].

use super::osv::RawVulnerability;
use crate::model::SeverityLevel;
use regex::Regex;
use std::sync::LazyLock;

/// Trailing decimal number after the last `/` or `:`, or the whole string.
static TRAILING_SCORE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[/:])(\d+(?:\.\d+)?)$").expect("score pattern is valid")
});

type Rule = fn(&RawVulnerability) -> Option<SeverityLevel>;

/// Rules in priority order.
const RULES: &[Rule] = &[from_database_specific, from_cvss_score];

/// Classifies one record. Never fails.
pub fn classify(vuln: &RawVulnerability) -> SeverityLevel {
    RULES
        .iter()
        .find_map(|rule| rule(vuln))
        .unwrap_or(SeverityLevel::Unknown)
}

fn from_database_specific(vuln: &RawVulnerability) -> Option<SeverityLevel> {
    let severity = vuln.database_specific.as_ref()?.severity.as_deref()?;
    parse_severity_string(severity)
}

fn from_cvss_score(vuln: &RawVulnerability) -> Option<SeverityLevel> {
    let score = vuln
        .severity
        .as_ref()?
        .iter()
        .find_map(|s| s.score.as_deref())?;
    severity_from_score(parse_cvss_score(score)?)
}

/// Maps a database-specific severity label, case-insensitively.
pub fn parse_severity_string(severity: &str) -> Option<SeverityLevel> {
    match severity.to_lowercase().as_str() {
        "critical" => Some(SeverityLevel::Critical),
        "high" => Some(SeverityLevel::High),
        "moderate" | "medium" => Some(SeverityLevel::Moderate),
        "low" => Some(SeverityLevel::Low),
        _ => None,
    }
}

/// Extracts the numeric score from a CVSS-style score string.
///
/// Accepts a bare number (`"7.5"`) or a vector whose last component is a
/// number (`"CVSS:3.1/AV:N/...:7.8"`). Returns `None` when the string does
/// not end in a decimal number.
pub fn parse_cvss_score(score: &str) -> Option<f64> {
    let captures = TRAILING_SCORE.captures(score.trim())?;
    captures.get(1)?.as_str().parse().ok()
}

/// Buckets a numeric score. Scores of zero or below have no bucket.
pub fn severity_from_score(score: f64) -> Option<SeverityLevel> {
    match score {
        s if s >= 9.0 => Some(SeverityLevel::Critical),
        s if s >= 7.0 => Some(SeverityLevel::High),
        s if s >= 4.0 => Some(SeverityLevel::Moderate),
        s if s > 0.0 => Some(SeverityLevel::Low),
        _ => None,
    }
}
