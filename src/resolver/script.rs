/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::resolver::script
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Resolve a version by running a PowerShell probe script and
    matching its output against a regex.

  Security / Safety Notes:
    Scripts come from repository-controlled checkver files and
    run with user privileges under a fixed timeout.

  Dependencies:
    regex for extraction; command runner for pwsh.

  Operational Scope:
    Second strategy of the resolver chain; also produces the
    release notes text for `releaseNotesScript`.

  Revision History:
    2026-10-18 COD  Authored script strategy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Named captures flow through untouched as metadata
    - Normalisation never loses the upstream spelling
============================================================*/

use std::time::Duration;

use regex::Regex;

use crate::command;
use crate::error::{Result, SynwingetError};
use crate::logger::Logger;
use crate::package_info::VersionResult;
use crate::version::normalize_parts;

/// Execute a PowerShell script and return trimmed stdout, if any.
pub async fn run_powershell(script: &str, timeout: Duration) -> Result<Option<String>> {
    let output = command::run("pwsh", &["-NoProfile", "-Command", script], None, timeout).await?;
    let stdout = output.stdout.trim();
    if output.success() && !stdout.is_empty() {
        Ok(Some(stdout.to_string()))
    } else {
        Ok(None)
    }
}

/// Run `script` and extract the version from its output.
pub async fn resolve(
    script: &str,
    pattern: &str,
    replace: Option<&str>,
    timeout: Duration,
    logger: &Logger,
) -> Result<Option<VersionResult>> {
    let regex = Regex::new(pattern)
        .map_err(|err| SynwingetError::Config(format!("Invalid regex `{pattern}`: {err}")))?;

    let Some(output) = run_powershell(script, timeout).await? else {
        logger.warn("SCRIPT", "Version script produced no output");
        return Ok(None);
    };
    logger.debug("SCRIPT", format!("Script output: {output}"));

    let result = extract_version(&regex, &output, replace);
    if result.is_none() {
        logger.warn(
            "SCRIPT",
            format!("Regex `{pattern}` did not match the script output"),
        );
    }
    Ok(result)
}

/// Apply `regex` (and the optional `${N}` replace template) to `output`.
pub fn extract_version(regex: &Regex, output: &str, replace: Option<&str>) -> Option<VersionResult> {
    let caps = regex.captures(output)?;

    let raw = match replace {
        Some(template) => {
            let mut expanded = String::new();
            caps.expand(template, &mut expanded);
            expanded
        }
        None => caps.get(1).or_else(|| caps.get(0))?.as_str().to_string(),
    };
    let raw = raw.trim().to_string();
    if raw.is_empty() {
        return None;
    }

    let version = normalize_parts(&raw);
    let mut result = VersionResult::new(version.clone());
    for name in regex.capture_names().flatten() {
        if let Some(value) = caps.name(name) {
            result
                .metadata
                .insert(name.to_string(), value.as_str().to_string());
        }
    }
    if version != raw {
        result.metadata.insert("versionOriginal".into(), raw);
    }
    Some(result)
}
