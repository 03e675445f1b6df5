//! Upstream vulnerability lookups and per-record normalization.

mod advisory;
mod executor;
mod osv;
mod severity;

pub use advisory::advisory_url;
pub use executor::PackageQueryExecutor;
pub use osv::{DatabaseSpecific, OsvClient, RawSeverity, RawVulnerability, DEFAULT_API_URL};
pub use severity::{classify, parse_cvss_score, parse_severity_string, severity_from_score};

use crate::model::PackageQuery;
use anyhow::Result;
use async_trait::async_trait;

/// A vulnerability database that can be queried per npm package version.
#[async_trait]
pub trait VulnerabilitySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Returns the raw records affecting `query`, possibly none.
    async fn lookup(&self, query: &PackageQuery) -> Result<Vec<RawVulnerability>>;
}
