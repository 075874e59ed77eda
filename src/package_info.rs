/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::package_info
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Shared structures passed between pipeline stages: the
    resolver's VersionResult and the UpdateInfo JSON document.

  Security / Safety Notes:
    Documents are written to operator-controlled paths; no
    credentials are ever part of these structures.

  Dependencies:
    serde / serde_json for the inter-stage JSON contract.

  Operational Scope:
    Written by `resolve`, read by `update`, mirrored into the
    GitHub Actions output file.

  Revision History:
    2026-10-18 COD  Introduced UpdateInfo contract.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Clear data contracts between stages
    - Serializable structures for workflow output
============================================================*/

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::PackageConfig;
use crate::error::{Result, SynwingetError};

/// Output of version resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionResult {
    pub version: String,
    /// Named capture groups, reused as template placeholders.
    pub metadata: BTreeMap<String, String>,
    pub release_notes: Option<String>,
    pub release_notes_url: Option<String>,
}

impl VersionResult {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            ..Self::default()
        }
    }
}

/// Resolver → updater contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub package_identifier: String,
    pub version: String,
    pub installer_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_urls: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
    #[serde(rename = "checkver_config")]
    pub checkver_config: PackageConfig,
}

impl UpdateInfo {
    pub fn is_multi_arch(&self) -> bool {
        self.installer_urls
            .as_ref()
            .map(|urls| !urls.is_empty())
            .unwrap_or(false)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            SynwingetError::Filesystem(format!(
                "Failed to open version info {}: {err}",
                path.display()
            ))
        })?;
        serde_json::from_reader(file).map_err(|err| {
            SynwingetError::Serialization(format!(
                "Failed to decode version info {}: {err}",
                path.display()
            ))
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|err| {
            SynwingetError::Serialization(format!("Failed to encode version info: {err}"))
        })
    }

    /// Persist the document to the given path.
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|err| {
                SynwingetError::Filesystem(format!(
                    "Failed to create output directory {}: {err}",
                    parent.display()
                ))
            })?;
        }
        let file = File::create(path).map_err(|err| {
            SynwingetError::Filesystem(format!(
                "Failed to create version info {}: {err}",
                path.display()
            ))
        })?;
        serde_json::to_writer_pretty(file, self).map_err(|err| {
            SynwingetError::Filesystem(format!(
                "Failed to write version info {}: {err}",
                path.display()
            ))
        })
    }
}

/// Append `key=value` lines to the file named by `$GITHUB_OUTPUT`, if set.
pub fn write_github_output(pairs: &[(&str, &str)]) -> Result<()> {
    match std::env::var_os("GITHUB_OUTPUT") {
        Some(path) if !path.is_empty() => append_outputs(Path::new(&path), pairs),
        _ => Ok(()),
    }
}

fn append_outputs(path: &Path, pairs: &[(&str, &str)]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| {
            SynwingetError::Filesystem(format!(
                "Failed to open GitHub output {}: {err}",
                path.display()
            ))
        })?;
    for (key, value) in pairs {
        let value = value.replace(['\r', '\n'], " ");
        writeln!(file, "{key}={value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_config() -> PackageConfig {
        let mut config = PackageConfig::from_yaml("packageIdentifier: Zalo.Zalo\n").unwrap();
        config.fill_derived().unwrap();
        config
    }

    #[test]
    fn update_info_uses_workflow_field_names() {
        let info = UpdateInfo {
            package_identifier: "Zalo.Zalo".into(),
            version: "25.8.2".into(),
            installer_url: "https://res.zalo.me/Zalo-25.8.2-win64.msi".into(),
            installer_urls: None,
            metadata: BTreeMap::new(),
            release_notes: None,
            release_notes_url: None,
            checkver_config: sample_config(),
        };
        let json = info.to_json().unwrap();
        assert!(json.contains("\"packageIdentifier\": \"Zalo.Zalo\""));
        assert!(json.contains("\"installerUrl\""));
        assert!(json.contains("\"checkver_config\""));
        assert!(json.contains("\"manifestPath\": \"manifests/z/Zalo/Zalo\""));
        assert!(!json.contains("installerUrls"));
        assert!(!info.is_multi_arch());
    }

    #[test]
    fn round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("version.json");
        let mut urls = BTreeMap::new();
        urls.insert("x64".to_string(), "https://e.invalid/x64.zip".to_string());
        let info = UpdateInfo {
            package_identifier: "Zalo.Zalo".into(),
            version: "1.0".into(),
            installer_url: "https://e.invalid/x64.zip".into(),
            installer_urls: Some(urls),
            metadata: BTreeMap::new(),
            release_notes: Some("notes".into()),
            release_notes_url: None,
            checkver_config: sample_config(),
        };
        info.write(&path).unwrap();
        let loaded = UpdateInfo::load(&path).unwrap();
        assert!(loaded.is_multi_arch());
        assert_eq!(loaded.release_notes.as_deref(), Some("notes"));
        assert_eq!(loaded.checkver_config.package_identifier, "Zalo.Zalo");
    }

    #[test]
    fn outputs_are_single_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("github_output");
        append_outputs(&path, &[("has_update", "true"), ("version", "1.2\n3")]).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body, "has_update=true\nversion=1.2 3\n");
    }
}
