use crate::model::VulnerabilityResponse;
use anyhow::Result;

pub fn print_json(response: &VulnerabilityResponse) -> Result<()> {
    let json = serde_json::to_string_pretty(response)?;
    println!("{}", json);
    Ok(())
}
