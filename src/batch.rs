//! Bounded, wave-based fan-out over many package lookups.

use crate::checker::PackageQueryExecutor;
use crate::model::{PackageQuery, ResultMap};
use futures::future::join_all;
use tracing::debug;

/// Maximum number of concurrent upstream lookups.
pub const WAVE_SIZE: usize = 10;

pub struct BatchOrchestrator {
    executor: PackageQueryExecutor,
}

impl BatchOrchestrator {
    pub fn new(executor: PackageQueryExecutor) -> Self {
        Self { executor }
    }

    /// Looks up every valid query and collects the packages with findings.
    ///
    /// Queries run in consecutive waves of [`WAVE_SIZE`]. A wave is fully
    /// joined before the next one starts and before its results are merged.
    /// When a name appears more than once, the last successful lookup wins.
    pub async fn run(&self, queries: &[PackageQuery]) -> ResultMap {
        let valid: Vec<&PackageQuery> = queries.iter().filter(|q| q.is_valid()).collect();
        let mut results = ResultMap::new();

        if valid.is_empty() {
            return results;
        }

        let waves = valid.len().div_ceil(WAVE_SIZE);
        for (index, wave) in valid.chunks(WAVE_SIZE).enumerate() {
            debug!(wave = index + 1, of = waves, size = wave.len(), "starting wave");

            let outcomes = join_all(wave.iter().map(|q| self.executor.query(q))).await;

            for found in outcomes.into_iter().flatten() {
                results.insert(found.package.clone(), found);
            }
        }

        debug!(
            queried = valid.len(),
            affected = results.len(),
            "vulnerability lookup finished"
        );
        results
    }
}
