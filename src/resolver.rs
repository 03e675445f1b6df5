//! Version constraint resolution against the npm registry.
//!
//! The lookup pipeline only understands concrete versions. The CLI uses a
//! [`VersionResolver`] to turn `name@^1.2.0` style specs into one.

use anyhow::Result;
use async_trait::async_trait;
use semver::{Version, VersionReq};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_REGISTRY_URL: &str = "https://registry.npmjs.org";

/// Resolves a version constraint to one concrete version.
#[async_trait]
pub trait VersionResolver: Send + Sync {
    /// Returns `None` if nothing satisfies the constraint or the
    /// registry cannot be reached.
    async fn resolve(&self, name: &str, constraint: &str) -> Option<String>;
}

pub struct NpmResolver {
    client: reqwest::Client,
    registry_url: String,
}

#[derive(Deserialize)]
struct Packument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, String>,
    #[serde(default)]
    versions: HashMap<String, serde_json::Value>,
}

impl NpmResolver {
    pub fn new(registry_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn fetch_packument(&self, name: &str) -> Result<Packument> {
        // Scoped names keep their '@' but the slash must be escaped.
        let url = format!("{}/{}", self.registry_url, name.replace('/', "%2f"));

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!(
                "registry returned status code {} for {}",
                response.status(),
                name
            );
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl VersionResolver for NpmResolver {
    async fn resolve(&self, name: &str, constraint: &str) -> Option<String> {
        let constraint = constraint.trim();

        // Exact versions need no registry round trip.
        if let Ok(version) = Version::parse(constraint.trim_start_matches('v')) {
            return Some(version.to_string());
        }

        let packument = match self.fetch_packument(name).await {
            Ok(packument) => packument,
            Err(e) => {
                debug!(package = name, "registry lookup failed: {:#}", e);
                return None;
            }
        };

        if let Some(tagged) = packument.dist_tags.get(constraint) {
            return Some(tagged.clone());
        }
        if constraint.is_empty() || constraint == "*" {
            return packument.dist_tags.get("latest").cloned();
        }

        pick_version(packument.versions.keys().map(String::as_str), constraint)
    }
}

/// Picks the highest stable version satisfying `constraint`.
///
/// Versions that are not valid semver are ignored, as are pre-releases.
/// `constraint` uses npm range syntax: `||` unions, space-separated
/// comparators and `a - b` hyphen ranges are accepted.
pub fn pick_version<'a>(
    versions: impl IntoIterator<Item = &'a str>,
    constraint: &str,
) -> Option<String> {
    let reqs = constraint
        .split("||")
        .map(parse_npm_range)
        .collect::<Option<Vec<_>>>()?;

    versions
        .into_iter()
        .filter_map(|v| Version::parse(v).ok())
        .filter(|v| v.pre.is_empty() && reqs.iter().any(|req| req.matches(v)))
        .max()
        .map(|v| v.to_string())
}

/// Converts one npm range (no `||`) into a [`VersionReq`].
fn parse_npm_range(range: &str) -> Option<VersionReq> {
    let range = range.trim();
    if range.is_empty() {
        return Some(VersionReq::STAR);
    }

    if let Some((low, high)) = range.split_once(" - ") {
        return VersionReq::parse(&format!(">={}, <={}", low.trim(), high.trim())).ok();
    }

    let mut comparators = Vec::new();
    let mut operator = String::new();
    for token in range.split_whitespace() {
        let token = token.trim_end_matches(',');
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            // Operator written apart from its version, as in `>= 1.2.0`.
            operator.push_str(token);
            continue;
        }

        let token = token.trim_start_matches('v');
        let bare = token.chars().all(|c| c.is_ascii_digit() || c == '.');
        let comparator = if operator.is_empty() && bare {
            // A bare npm version is exact; the semver crate would read it as a caret.
            format!("={}", token)
        } else {
            format!("{}{}", std::mem::take(&mut operator), token)
        };
        comparators.push(comparator);
    }

    if !operator.is_empty() {
        return None;
    }
    VersionReq::parse(&comparators.join(", ")).ok()
}
