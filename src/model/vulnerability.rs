use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Placeholder used when an upstream record has no summary.
pub const NO_SUMMARY: &str = "No summary available";

/// Discrete severity of a vulnerability record.
///
/// Variant order is the ranking order: `Critical` sorts first and
/// `Unknown` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Critical,
    High,
    Moderate,
    Low,
    Unknown,
}

impl SeverityLevel {
    /// Sort rank, 0 for critical through 4 for unknown.
    pub fn rank(&self) -> u8 {
        match self {
            SeverityLevel::Critical => 0,
            SeverityLevel::High => 1,
            SeverityLevel::Moderate => 2,
            SeverityLevel::Low => 3,
            SeverityLevel::Unknown => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Critical => "critical",
            SeverityLevel::High => "high",
            SeverityLevel::Moderate => "moderate",
            SeverityLevel::Low => "low",
            SeverityLevel::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A normalized vulnerability record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub id: String,
    pub summary: String,
    pub severity: SeverityLevel,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub url: String,
}

/// Per-package tally of record severities.
///
/// `total` counts every record, including `unknown` ones, which have no
/// bucket of their own. `total` minus the named buckets is the unknown count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub total: usize,
    pub critical: usize,
    pub high: usize,
    pub moderate: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn tally<'a>(severities: impl IntoIterator<Item = &'a SeverityLevel>) -> Self {
        let mut counts = Self::default();
        for severity in severities {
            counts.total += 1;
            match severity {
                SeverityLevel::Critical => counts.critical += 1,
                SeverityLevel::High => counts.high += 1,
                SeverityLevel::Moderate => counts.moderate += 1,
                SeverityLevel::Low => counts.low += 1,
                SeverityLevel::Unknown => {}
            }
        }
        counts
    }

    /// Records with no named bucket.
    pub fn unknown(&self) -> usize {
        self.total - self.critical - self.high - self.moderate - self.low
    }
}

/// Vulnerabilities found for one package version, sorted by severity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageVulnerabilities {
    pub package: String,
    pub version: String,
    pub vulnerabilities: Vec<VulnerabilityRecord>,
    pub counts: SeverityCounts,
}

impl PackageVulnerabilities {
    /// Sorts records by severity rank and derives the counts.
    ///
    /// The sort is stable, so records of equal severity keep upstream order.
    pub fn new(
        package: impl Into<String>,
        version: impl Into<String>,
        mut vulnerabilities: Vec<VulnerabilityRecord>,
    ) -> Self {
        vulnerabilities.sort_by_key(|v| v.severity.rank());
        let counts = SeverityCounts::tally(vulnerabilities.iter().map(|v| &v.severity));

        Self {
            package: package.into(),
            version: version.into(),
            vulnerabilities,
            counts,
        }
    }

    /// The most severe level present.
    pub fn worst(&self) -> Option<SeverityLevel> {
        self.vulnerabilities.first().map(|v| v.severity)
    }
}

/// Package name to its vulnerabilities. Packages without known
/// vulnerabilities are absent.
pub type ResultMap = BTreeMap<String, PackageVulnerabilities>;

/// Response body returned to callers and stored in the response cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityResponse {
    pub results: ResultMap,
}

impl VulnerabilityResponse {
    pub fn new(results: ResultMap) -> Self {
        Self { results }
    }

    pub fn total_vulnerabilities(&self) -> usize {
        self.results.values().map(|p| p.counts.total).sum()
    }

    pub fn worst(&self) -> Option<SeverityLevel> {
        self.results.values().filter_map(|p| p.worst()).min()
    }
}
