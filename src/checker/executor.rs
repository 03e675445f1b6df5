use super::advisory::advisory_url;
use super::osv::RawVulnerability;
use super::severity::classify;
use super::VulnerabilitySource;
use crate::model::{PackageQuery, PackageVulnerabilities, VulnerabilityRecord, NO_SUMMARY};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Runs the lookup for one package and normalizes the response.
pub struct PackageQueryExecutor {
    source: Arc<dyn VulnerabilitySource>,
    timeout: Duration,
}

impl PackageQueryExecutor {
    pub fn new(source: Arc<dyn VulnerabilitySource>, timeout: Duration) -> Self {
        Self { source, timeout }
    }

    /// Returns `None` when the lookup fails, times out, or finds nothing.
    ///
    /// Failures stay local to the package; they are logged and never
    /// reach the caller.
    pub async fn query(&self, query: &PackageQuery) -> Option<PackageVulnerabilities> {
        let raw = match tokio::time::timeout(self.timeout, self.source.lookup(query)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                debug!(package = %query, source = self.source.name(), "lookup failed: {:#}", e);
                return None;
            }
            Err(_) => {
                debug!(package = %query, timeout = ?self.timeout, "lookup timed out");
                return None;
            }
        };

        if raw.is_empty() {
            return None;
        }

        let records = raw.into_iter().map(normalize).collect();
        Some(PackageVulnerabilities::new(
            query.name.clone(),
            query.version.clone(),
            records,
        ))
    }
}

fn normalize(vuln: RawVulnerability) -> VulnerabilityRecord {
    let severity = classify(&vuln);
    let url = advisory_url(&vuln);

    VulnerabilityRecord {
        summary: vuln
            .summary
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| NO_SUMMARY.to_string()),
        aliases: vuln.aliases.unwrap_or_default(),
        id: vuln.id,
        severity,
        url,
    }
}
