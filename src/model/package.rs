use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single (name, version) pair to look up.
///
/// Queries are built leniently from request bodies: a missing or
/// non-string field becomes an empty string, and [`is_valid`](Self::is_valid)
/// decides later whether the entry takes part in a lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PackageQuery {
    pub name: String,
    pub version: String,
}

impl PackageQuery {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
        }
    }

    /// Builds a query from one element of a request's `packages` array.
    ///
    /// Never fails. Anything that is not an object with string `name` and
    /// `version` fields yields a query that is not valid.
    pub fn from_value(value: &Value) -> Self {
        let field = |key: &str| {
            value
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };

        Self {
            name: field("name"),
            version: field("version"),
        }
    }

    /// Both name and version are present and non-empty.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.version.is_empty()
    }

    /// Renders the query as `name@version`.
    pub fn spec(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

impl std::fmt::Display for PackageQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

/// Splits a command-line spec such as `lodash@^4.17.0` or
/// `@babel/core@7.24.0` into name and version constraint.
///
/// A spec without a version part gets the constraint `latest`.
pub fn split_spec(spec: &str) -> (String, String) {
    // The leading '@' of a scoped name is not a separator.
    let offset = usize::from(spec.starts_with('@'));
    match spec[offset..].rfind('@') {
        Some(idx) => {
            let idx = idx + offset;
            (spec[..idx].to_string(), spec[idx + 1..].to_string())
        }
        None => (spec.to_string(), "latest".to_string()),
    }
}
