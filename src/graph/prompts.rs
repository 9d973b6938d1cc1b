//! Summary-prompt template loading.
//!
//! The analyst-facing summary prompt lives in a JSON resource keyed by
//! deployment site (proxy-enabled deployments are the cn_site). Fallback
//! chain: site file → configured override → hardcoded default.

use serde_json::Value;
use std::path::Path;

/// Default incident-summary prompt used when neither the site file nor the
/// configuration provides one.
pub const DEFAULT_SUMMARY_PROMPT: &str = "\
You are a cybersecurity analyst. Based on the incident information from the SIEM system and the knowledge base, generate a concise, clear, and attack-centric incident summary. Focus primarily on the attack sequence and how the incident unfolded. The summary should include:
1. overview: incident ID/name, time, and attack type (one or two sentences only).
2. Attack progression (core section):
 - Describe how the attack started (initial trigger).
 - Show the progression path with key steps in chronological order.
 - Explain how alerts relate to each stage and how the attack chain forms end-to-end.
 - Merge duplicate or low-value alerts; keep only those necessary to explain the sequence.
3. Root cause/context: vulnerabilities, misconfigurations, attacker techniques, or behavioral indicators.
4. Mitigation (if available): direct and actionable containment or remediation steps.

Requirements:
 - Write in clear paragraphs, not as a list of alerts.
 - Around 150-220 words.
 - Focus almost entirely on the attack process clarity; all non-essential details can be omitted.
 - No separate Impact/Critical Alerts sections unless required to explain the chain.";

/// Load the summary prompt for the deployment site from the JSON resource.
/// Returns `None` (with a log line saying why) whenever the file is missing,
/// unparseable, or has no entry for the site — callers fall back.
pub fn load_prompt_template(path: &Path, proxy_enabled: bool) -> Option<String> {
    let site = if proxy_enabled { "cn_site" } else { "eu_site" };

    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(_) => {
            tracing::warn!(
                "Prompt JSON file not found at {}, using default prompt",
                path.display()
            );
            return None;
        }
    };

    let data: Value = match serde_json::from_str(&contents) {
        Ok(data) => data,
        Err(err) => {
            tracing::warn!(
                "Failed to parse prompt JSON file {}: {}, using default prompt",
                path.display(),
                err
            );
            return None;
        }
    };

    match data
        .get(site)
        .and_then(|site_prompts| site_prompts.get("summary_prompt"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|prompt| !prompt.is_empty())
    {
        Some(prompt) => {
            tracing::info!("Loaded prompt from JSON for site: {}", site);
            Some(prompt.to_string())
        }
        None => {
            tracing::warn!(
                "No prompt found for site {} in JSON file, using default prompt",
                site
            );
            None
        }
    }
}
