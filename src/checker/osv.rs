use crate::model::PackageQuery;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default public OSV endpoint.
pub const DEFAULT_API_URL: &str = "https://api.osv.dev";

/// Ecosystem every query is scoped to.
const ECOSYSTEM: &str = "npm";

/// Single-package OSV client.
///
/// Each lookup is one `POST /v1/query` request. The client-level timeout
/// bounds the whole request, body included.
pub struct OsvClient {
    client: reqwest::Client,
    api_url: String,
}

impl OsvClient {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let user_agent = format!("depwatch/{}", env!("CARGO_PKG_VERSION"));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn query_url(&self) -> String {
        format!("{}/v1/query", self.api_url)
    }
}

#[async_trait]
impl super::VulnerabilitySource for OsvClient {
    fn name(&self) -> &'static str {
        "OSV.dev"
    }

    async fn lookup(&self, query: &PackageQuery) -> Result<Vec<RawVulnerability>> {
        let body = OsvQuery {
            package: OsvPackage {
                name: query.name.clone(),
                ecosystem: ECOSYSTEM.to_string(),
            },
            version: query.version.clone(),
        };

        let response = self.client.post(self.query_url()).json(&body).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("OSV API returned status code {}", response.status());
        }

        let response: OsvQueryResponse = response.json().await?;
        Ok(response.vulns)
    }
}

#[derive(Debug, Serialize)]
struct OsvQuery {
    package: OsvPackage,
    version: String,
}

#[derive(Debug, Serialize)]
struct OsvPackage {
    name: String,
    ecosystem: String,
}

#[derive(Debug, Deserialize)]
struct OsvQueryResponse {
    #[serde(default)]
    vulns: Vec<RawVulnerability>,
}

/// An upstream vulnerability record as returned by OSV.
///
/// Only the fields used for classification and linking are read. All of
/// them may be absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawVulnerability {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub aliases: Option<Vec<String>>,
    #[serde(default)]
    pub severity: Option<Vec<RawSeverity>>,
    #[serde(default)]
    pub database_specific: Option<DatabaseSpecific>,
}

/// Entry of the OSV `severity` array, e.g. `{"type": "CVSS_V3", "score": "..."}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawSeverity {
    #[serde(rename = "type", default)]
    pub severity_type: Option<String>,
    #[serde(default)]
    pub score: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseSpecific {
    #[serde(default)]
    pub severity: Option<String>, // "CRITICAL", "HIGH", "MODERATE", "LOW"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checker::{PackageQueryExecutor, VulnerabilitySource};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Serves one HTTP response on a local port and returns the base URL.
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
        });

        format!("http://{}", addr)
    }

    async fn read_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    fn lodash() -> PackageQuery {
        PackageQuery::new("lodash", "4.17.20")
    }

    #[test]
    fn test_osv_client_creation() {
        let client = OsvClient::new(DEFAULT_API_URL, Duration::from_secs(5)).unwrap();
        assert_eq!(client.name(), "OSV.dev");
        assert_eq!(client.query_url(), "https://api.osv.dev/v1/query");
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let client = OsvClient::new("http://localhost:8080/", Duration::from_secs(5)).unwrap();
        assert_eq!(client.query_url(), "http://localhost:8080/v1/query");
    }

    #[test]
    fn test_query_serialize() {
        let query = OsvQuery {
            package: OsvPackage {
                name: "lodash".to_string(),
                ecosystem: ECOSYSTEM.to_string(),
            },
            version: "4.17.21".to_string(),
        };

        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "package": {"name": "lodash", "ecosystem": "npm"},
                "version": "4.17.21"
            })
        );
    }

    #[test]
    fn test_response_without_vulns() {
        let response: OsvQueryResponse = serde_json::from_str("{}").unwrap();
        assert!(response.vulns.is_empty());
    }

    #[test]
    fn test_response_with_partial_records() {
        let json = r#"{
            "vulns": [
                {
                    "id": "GHSA-35jh-r3h4-6jhm",
                    "summary": "Command Injection in lodash",
                    "aliases": ["CVE-2021-23337"],
                    "database_specific": {"severity": "HIGH", "cwe_ids": ["CWE-77"]},
                    "severity": [
                        {"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L/PR:H/UI:N/S:U/C:H/I:H/A:H"}
                    ]
                },
                {"summary": "no id"},
                {}
            ]
        }"#;

        let response: OsvQueryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.vulns.len(), 3);

        let first = &response.vulns[0];
        assert_eq!(first.id, "GHSA-35jh-r3h4-6jhm");
        assert_eq!(
            first.database_specific.as_ref().and_then(|d| d.severity.as_deref()),
            Some("HIGH")
        );
        assert_eq!(first.aliases.as_deref(), Some(&["CVE-2021-23337".to_string()][..]));

        assert_eq!(response.vulns[1].id, "");
        assert!(response.vulns[2].summary.is_none());
    }

    #[tokio::test]
    async fn test_lookup_parses_vulns() {
        let url = serve_once("200 OK", r#"{"vulns": [{"id": "GHSA-35jh-r3h4-6jhm"}]}"#).await;
        let client = OsvClient::new(url, Duration::from_secs(5)).unwrap();

        let vulns = client.lookup(&lodash()).await.unwrap();
        assert_eq!(vulns.len(), 1);
        assert_eq!(vulns[0].id, "GHSA-35jh-r3h4-6jhm");
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let url = serve_once("500 Internal Server Error", "{}").await;
        let client = OsvClient::new(url, Duration::from_secs(5)).unwrap();

        let err = client.lookup(&lodash()).await.unwrap_err();
        assert!(err.to_string().contains("500"));

        let url = serve_once("500 Internal Server Error", "{}").await;
        let client = OsvClient::new(url, Duration::from_secs(5)).unwrap();
        let executor = PackageQueryExecutor::new(Arc::new(client), Duration::from_secs(5));
        assert!(executor.query(&lodash()).await.is_none());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_failure() {
        let url = serve_once("200 OK", "<html>rate limited</html>").await;
        let client = OsvClient::new(url, Duration::from_secs(5)).unwrap();

        assert!(client.lookup(&lodash()).await.is_err());

        let url = serve_once("200 OK", "<html>rate limited</html>").await;
        let client = OsvClient::new(url, Duration::from_secs(5)).unwrap();
        let executor = PackageQueryExecutor::new(Arc::new(client), Duration::from_secs(5));
        assert!(executor.query(&lodash()).await.is_none());
    }
}
