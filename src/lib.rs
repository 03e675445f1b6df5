//! Known-vulnerability lookup for npm packages, backed by OSV.
//!
//! Given (name, version) pairs, depwatch queries OSV in bounded waves,
//! classifies and links every record, and returns a per-package map of
//! ranked vulnerabilities with severity counts. Responses are cached with
//! a stale-while-revalidate policy.
//!
//! # Example
//!
//! ```no_run
//! use depwatch::{Config, VulnerabilityService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = VulnerabilityService::from_config(&Config::default())?;
//!     let body = json!({"packages": [{"name": "lodash", "version": "4.17.20"}]});
//!
//!     let response = service.handle(Some(&body)).await?;
//!     for (name, found) in &response.results {
//!         println!("{}: {} known vulnerabilities", name, found.counts.total);
//!     }
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod cache;
pub mod checker;
pub mod config;
pub mod error;
pub mod model;
pub mod output;
pub mod resolver;
pub mod service;

pub use batch::BatchOrchestrator;
pub use cache::{derive_key, Cache};
pub use config::Config;
pub use error::RequestError;
pub use model::{
    PackageQuery, PackageVulnerabilities, ResultMap, SeverityCounts, SeverityLevel,
    VulnerabilityRecord, VulnerabilityResponse,
};
pub use service::VulnerabilityService;
