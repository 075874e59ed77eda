/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::patch::validate
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Confirm patched manifests still parse as YAML and report
    top-level keys that appear more than once.

  Security / Safety Notes:
    Read-only; findings are warnings, never failures.

  Dependencies:
    serde_yaml for the syntax check.

  Operational Scope:
    Run by the materializer after each file is written.

  Revision History:
    2026-10-18 COD  Authored post-patch validation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Assistive checks surface problems without blocking review
============================================================*/

use std::collections::BTreeMap;

use super::context::{scan, ContextKey, LineKind};
use crate::logger::Logger;

/// Findings for one manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub parse_error: Option<String>,
    /// Top-level keys seen more than once, with their counts.
    pub duplicates: Vec<(String, usize)>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.parse_error.is_none() && self.duplicates.is_empty()
    }
}

pub fn validate_manifest(content: &str) -> ValidationReport {
    let parse_error = serde_yaml::from_str::<serde_yaml::Value>(content)
        .err()
        .map(|err| err.to_string());

    let lines: Vec<&str> = content.lines().collect();
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for info in scan(&lines) {
        if let LineKind::Field { name, list_item: false, .. } = &info.kind {
            if info.context == ContextKey::TopLevel {
                *counts.entry(name.clone()).or_default() += 1;
            }
        }
    }

    ValidationReport {
        parse_error,
        duplicates: counts.into_iter().filter(|(_, count)| *count > 1).collect(),
    }
}

/// Validate and log findings against `label`; returns whether it was clean.
pub fn validate_and_log(content: &str, label: &str, logger: &Logger) -> bool {
    let report = validate_manifest(content);
    if let Some(err) = &report.parse_error {
        logger.warn("VALIDATE", format!("{label} is not valid YAML: {err}"));
    }
    for (field, count) in &report.duplicates {
        logger.warn(
            "VALIDATE",
            format!("{label}: top-level field {field} appears {count} times"),
        );
    }
    if report.is_clean() {
        logger.debug("VALIDATE", format!("{label} validated"));
    }
    report.is_clean()
}
