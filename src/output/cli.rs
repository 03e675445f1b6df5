use crate::model::{SeverityLevel, VulnerabilityResponse};
use anyhow::Result;
use std::fmt::Write;
use tabled::{settings::Style, Table, Tabled};

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "Version")]
    version: String,
    #[tabled(rename = "Total")]
    total: usize,
    #[tabled(rename = "Critical")]
    critical: usize,
    #[tabled(rename = "High")]
    high: usize,
    #[tabled(rename = "Moderate")]
    moderate: usize,
    #[tabled(rename = "Low")]
    low: usize,
}

#[derive(Tabled)]
struct VulnRow {
    #[tabled(rename = "Severity")]
    severity: String,
    #[tabled(rename = "Package")]
    package: String,
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Summary")]
    summary: String,
    #[tabled(rename = "Link")]
    url: String,
}

pub fn print_cli_table(response: &VulnerabilityResponse, checked: usize) -> Result<()> {
    print!("{}", render_table(response, checked));
    Ok(())
}

/// Renders the human-readable report. `checked` is the number of packages
/// that were submitted, affected or not.
pub fn render_table(response: &VulnerabilityResponse, checked: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out);

    if response.results.is_empty() {
        let _ = writeln!(out, "No known vulnerabilities in {} packages.", checked);
        return out;
    }

    let _ = writeln!(
        out,
        "{} of {} packages have known vulnerabilities:",
        response.results.len(),
        checked
    );
    let _ = writeln!(out);

    let rows: Vec<PackageRow> = response
        .results
        .values()
        .map(|p| PackageRow {
            package: truncate(&p.package, 40),
            version: p.version.clone(),
            total: p.counts.total,
            critical: p.counts.critical,
            high: p.counts.high,
            moderate: p.counts.moderate,
            low: p.counts.low,
        })
        .collect();
    let _ = writeln!(out, "{}", Table::new(rows).with(Style::rounded()));

    let _ = writeln!(out);
    let _ = writeln!(out, "Vulnerabilities:");
    let _ = writeln!(out);

    let rows: Vec<VulnRow> = response
        .results
        .values()
        .flat_map(|p| {
            p.vulnerabilities.iter().map(move |v| VulnRow {
                severity: format_severity(&v.severity),
                package: truncate(&p.package, 30),
                id: v.id.clone(),
                summary: truncate(&v.summary, 50),
                url: v.url.clone(),
            })
        })
        .collect();
    let _ = writeln!(out, "{}", Table::new(rows).with(Style::rounded()));

    let _ = writeln!(out);
    write_summary(&mut out, response);
    out
}

fn write_summary(out: &mut String, response: &VulnerabilityResponse) {
    let (mut critical, mut high, mut moderate, mut low, mut unknown) = (0, 0, 0, 0, 0);
    for p in response.results.values() {
        critical += p.counts.critical;
        high += p.counts.high;
        moderate += p.counts.moderate;
        low += p.counts.low;
        unknown += p.counts.unknown();
    }

    let _ = writeln!(out, "Summary:");
    let _ = writeln!(
        out,
        "  Vulnerabilities: {} total ({} critical, {} high, {} moderate, {} low, {} unknown)",
        response.total_vulnerabilities(),
        critical,
        high,
        moderate,
        low,
        unknown
    );

    let score = calculate_health_score(response);
    let _ = writeln!(out);
    let _ = writeln!(out, "Health Score: {}/100 {}", score, health_score_indicator(score));
}

fn format_severity(severity: &SeverityLevel) -> String {
    match severity {
        SeverityLevel::Critical => "\x1b[31mCRITICAL\x1b[0m".to_string(),
        SeverityLevel::High => "\x1b[91mHIGH\x1b[0m".to_string(),
        SeverityLevel::Moderate => "\x1b[33mMODERATE\x1b[0m".to_string(),
        SeverityLevel::Low => "\x1b[32mLOW\x1b[0m".to_string(),
        SeverityLevel::Unknown => "UNKNOWN".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max_len - 3).collect();
        format!("{}...", cut)
    }
}

/// Health score (0-100): every vulnerability deducts by severity.
fn calculate_health_score(response: &VulnerabilityResponse) -> u8 {
    let mut score: i64 = 100;

    for p in response.results.values() {
        for v in &p.vulnerabilities {
            score -= match v.severity {
                SeverityLevel::Critical => 25,
                SeverityLevel::High => 15,
                SeverityLevel::Moderate => 8,
                SeverityLevel::Low => 3,
                SeverityLevel::Unknown => 5,
            };
        }
    }

    score.clamp(0, 100) as u8
}

fn health_score_indicator(score: u8) -> &'static str {
    match score {
        90..=100 => "[Excellent]",
        70..=89 => "[Good]",
        50..=69 => "[Fair]",
        25..=49 => "[Poor]",
        _ => "[Critical]",
    }
}
