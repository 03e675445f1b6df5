use super::osv::RawVulnerability;

const GITHUB_ADVISORY_URL: &str = "https://github.com/advisories";
const NVD_DETAIL_URL: &str = "https://nvd.nist.gov/vuln/detail";
const OSV_DETAIL_URL: &str = "https://osv.dev/vulnerability";

/// Picks the canonical reference URL for a record.
///
/// GitHub advisories link to the advisory database, otherwise the first
/// CVE alias links to NVD, and everything else links to OSV itself.
pub fn advisory_url(vuln: &RawVulnerability) -> String {
    if vuln.id.starts_with("GHSA-") {
        return format!("{}/{}", GITHUB_ADVISORY_URL, vuln.id);
    }

    let cve = vuln
        .aliases
        .iter()
        .flatten()
        .find(|alias| alias.starts_with("CVE-"));

    match cve {
        Some(cve) => format!("{}/{}", NVD_DETAIL_URL, cve),
        None => format!("{}/{}", OSV_DETAIL_URL, vuln.id),
    }
}
