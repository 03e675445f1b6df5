//! Core data types for package queries and vulnerability results.
//!
//! - [`PackageQuery`] - A (name, version) pair to look up
//! - [`SeverityLevel`] - Ranked severity of a single record
//! - [`VulnerabilityRecord`] - A normalized upstream record
//! - [`PackageVulnerabilities`] - Sorted records and counts for one package
//! - [`VulnerabilityResponse`] - The combined result map
//!
//! # Example
//!
//! ```
//! use depwatch::model::{PackageVulnerabilities, SeverityLevel, VulnerabilityRecord};
//!
//! let record = VulnerabilityRecord {
//!     id: "GHSA-35jh-r3h4-6jhm".to_string(),
//!     summary: "Command injection in lodash".to_string(),
//!     severity: SeverityLevel::High,
//!     aliases: vec!["CVE-2021-23337".to_string()],
//!     url: "https://github.com/advisories/GHSA-35jh-r3h4-6jhm".to_string(),
//! };
//!
//! let pkg = PackageVulnerabilities::new("lodash", "4.17.20", vec![record]);
//! assert_eq!(pkg.counts.high, 1);
//! ```

mod package;
mod vulnerability;

pub use package::*;
pub use vulnerability::*;
