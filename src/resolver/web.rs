/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::resolver::web
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Resolve a version by scraping a download page with an
    ordered list of regexes.

  Security / Safety Notes:
    Plain GET requests only.

  Dependencies:
    regex for extraction.

  Operational Scope:
    Last strategy of the resolver chain.

  Revision History:
    2026-10-18 COD  Authored web scraping strategy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Configured patterns always tried before generic ones
============================================================*/

use regex::RegexBuilder;

use crate::error::{Result, SynwingetError};
use crate::github::GithubClient;
use crate::logger::Logger;
use crate::package_info::VersionResult;

const FALLBACK_PATTERNS: &[&str] = &[
    r#"version["\s:]+(\d+\.\d+\.\d+)"#,
    r"v(\d+\.\d+\.\d+)",
    r"(\d+\.\d+\.\d+)",
];

/// Scrape `url` and return the first version-like match.
pub async fn resolve(
    client: &GithubClient,
    url: &str,
    patterns: &[String],
    logger: &Logger,
) -> Result<Option<VersionResult>> {
    let page = client.page_text(url).await?;
    let result = extract_version(&page, patterns)?;
    if result.is_none() {
        logger.warn("WEB", format!("No version pattern matched {url}"));
    }
    Ok(result)
}

/// Try configured patterns, then the generic fallbacks, against `page`.
pub fn extract_version(page: &str, patterns: &[String]) -> Result<Option<VersionResult>> {
    let ordered = patterns
        .iter()
        .map(String::as_str)
        .chain(FALLBACK_PATTERNS.iter().copied());

    for pattern in ordered {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|err| SynwingetError::Config(format!("Invalid regex `{pattern}`: {err}")))?;

        for caps in regex.captures_iter(page) {
            let Some(found) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let candidate = found.as_str();
            if !looks_like_version(candidate) {
                continue;
            }
            let mut result = VersionResult::new(candidate);
            for name in regex.capture_names().flatten() {
                if let Some(value) = caps.name(name) {
                    result
                        .metadata
                        .insert(name.to_string(), value.as_str().to_string());
                }
            }
            return Ok(Some(result));
        }
    }
    Ok(None)
}

fn looks_like_version(candidate: &str) -> bool {
    let mut parts = 0;
    for part in candidate.split(['.', '-']) {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return false;
        }
        parts += 1;
    }
    parts >= 2
}
