/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load per-package checkver descriptors (YAML) and the runner
    settings file (TOML) that governs remotes and timeouts.

  Security / Safety Notes:
    Tokens are read from the environment only and are never
    persisted inside either configuration document.

  Dependencies:
    serde_yaml for checkver files, toml + dirs for settings.

  Operational Scope:
    Loaded once at start-up; immutable for the rest of the run.

  Revision History:
    2026-10-18 COD  Authored package and runner configuration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Derived defaults instead of mandatory boilerplate
    - Explicit errors naming the offending key or file
============================================================*/

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SynwingetError};

const DEFAULT_UPSTREAM_REPO: &str = "microsoft/winget-pkgs";
const DEFAULT_UPSTREAM_BRANCH: &str = "master";

/// Per-package configuration loaded from `<PackageId>.checkver.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageConfig {
    #[serde(default)]
    pub package_identifier: String,
    #[serde(default)]
    pub manifest_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkver: Option<CheckverSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubSection>,
    /// Legacy web scraping entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_url_template: Option<UrlTemplate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub update_metadata: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes_script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes_url_template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_notes_url: Option<String>,
}

/// `checkver:` accepts either a keyword (`github`) or a detailed mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CheckverSpec {
    Keyword(String),
    Detailed(CheckverDetails),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckverDetails {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_regex: Option<String>,
    #[serde(default)]
    pub append_dot_zero: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regexes: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Companion block for `checkver: github`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GithubSection {
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub append_dot_zero: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_regex: Option<String>,
}

/// Installer URL template: one string, or one per architecture.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UrlTemplate {
    Single(String),
    PerArchitecture(BTreeMap<String, String>),
}

/// A version-resolution strategy, in resolver priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    Github {
        repo: String,
        tag_regex: Option<String>,
        append_dot_zero: bool,
    },
    Script {
        script: String,
        regex: String,
        replace: Option<String>,
    },
    Web {
        url: String,
        regexes: Vec<String>,
    },
}

impl PackageConfig {
    /// Load a checkver file, deriving identifier and manifest path when absent.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynwingetError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        let mut config = Self::from_yaml(&raw)
            .map_err(|err| SynwingetError::Config(format!("{}: {err}", path.display())))?;
        if config.package_identifier.is_empty() {
            config.package_identifier = derive_package_identifier(path)?;
        }
        config.fill_derived()?;
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        serde_yaml::from_str(raw)
            .map_err(|err| SynwingetError::Config(format!("Invalid checkver YAML: {err}")))
    }

    /// Fill `manifestPath` from the identifier when it was not given.
    pub fn fill_derived(&mut self) -> Result<()> {
        if self.package_identifier.is_empty() {
            return Err(SynwingetError::Config(
                "packageIdentifier is missing".into(),
            ));
        }
        if self.manifest_path.is_empty() {
            self.manifest_path = derive_manifest_path(&self.package_identifier)?;
        }
        Ok(())
    }

    pub fn wants_metadata(&self, field: &str) -> bool {
        self.update_metadata.iter().any(|entry| entry == field)
    }

    /// Ordered strategy chain: GitHub, then script, then web scraping.
    pub fn strategies(&self) -> Vec<Strategy> {
        let mut github = None;
        let mut script = None;
        let mut web = None;

        match &self.checkver {
            Some(CheckverSpec::Keyword(keyword)) if keyword.eq_ignore_ascii_case("github") => {
                if let Some(section) = &self.github {
                    if !section.owner.is_empty() && !section.repo.is_empty() {
                        github = Some(Strategy::Github {
                            repo: format!("{}/{}", section.owner, section.repo),
                            tag_regex: section.tag_regex.clone(),
                            append_dot_zero: section.append_dot_zero,
                        });
                    }
                }
            }
            Some(CheckverSpec::Keyword(url)) if url.starts_with("http") => {
                web = Some(Strategy::Web {
                    url: url.clone(),
                    regexes: Vec::new(),
                });
            }
            Some(CheckverSpec::Detailed(details)) => {
                match details.kind.as_deref().unwrap_or_default() {
                    "github" => {
                        if let Some(repo) = details.repo.as_ref().filter(|r| !r.is_empty()) {
                            github = Some(Strategy::Github {
                                repo: repo.clone(),
                                tag_regex: details.tag_regex.clone(),
                                append_dot_zero: details.append_dot_zero,
                            });
                        }
                    }
                    "script" => {
                        if let (Some(body), Some(regex)) = (&details.script, &details.regex) {
                            if !body.is_empty() && !regex.is_empty() {
                                script = Some(Strategy::Script {
                                    script: body.clone(),
                                    regex: regex.clone(),
                                    replace: details.replace.clone().filter(|r| !r.is_empty()),
                                });
                            }
                        }
                    }
                    _ => {}
                }
                if let Some(url) = &details.url {
                    let mut regexes: Vec<String> = details.regex.iter().cloned().collect();
                    regexes.extend(details.regexes.iter().cloned());
                    if details.kind.as_deref() == Some("script") {
                        regexes.clear();
                    }
                    web = Some(Strategy::Web {
                        url: url.clone(),
                        regexes,
                    });
                }
            }
            _ => {}
        }

        if web.is_none() {
            if let Some(url) = &self.check_url {
                web = Some(Strategy::Web {
                    url: url.clone(),
                    regexes: Vec::new(),
                });
            }
        }

        [github, script, web].into_iter().flatten().collect()
    }
}

/// `Microsoft.PowerShell.checkver.yaml` → `Microsoft.PowerShell`.
pub fn derive_package_identifier(path: &Path) -> Result<String> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let id = name
        .strip_suffix(".checkver.yaml")
        .or_else(|| name.strip_suffix(".checkver.yml"))
        .unwrap_or(&name);
    if id.is_empty() {
        return Err(SynwingetError::Config(format!(
            "Cannot derive packageIdentifier from {}",
            path.display()
        )));
    }
    Ok(id.to_string())
}

/// `Seelen.SeelenUI` → `manifests/s/Seelen/SeelenUI`.
pub fn derive_manifest_path(package_id: &str) -> Result<String> {
    let (publisher, package) = package_id
        .split_once('.')
        .filter(|(publisher, package)| !publisher.is_empty() && !package.is_empty())
        .ok_or_else(|| {
            SynwingetError::Config(format!(
                "Invalid package identifier format: {package_id}"
            ))
        })?;
    let first = publisher
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase())
        .unwrap_or('_');
    Ok(format!(
        "manifests/{first}/{publisher}/{}",
        package.replace('.', "/")
    ))
}

/// Runner settings shared by every package run.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub upstream_repo: String,
    pub upstream_branch: String,
    pub fork_repo: Option<String>,
    pub clone_depth: u32,
    pub http_timeout: u64,
    pub download_timeout: u64,
    pub command_timeout: u64,
    pub git_timeout: u64,
    pub max_retries: usize,
    pub user_agent: String,
    pub log_dir: Option<PathBuf>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            upstream_repo: DEFAULT_UPSTREAM_REPO.into(),
            upstream_branch: DEFAULT_UPSTREAM_BRANCH.into(),
            fork_repo: None,
            clone_depth: 50,
            http_timeout: 30,
            download_timeout: 60,
            command_timeout: 30,
            git_timeout: 120,
            max_retries: 3,
            user_agent: "Syn-Winget/0.3 (winget-pkgs-updater)".into(),
            log_dir: None,
        }
    }
}

impl RunnerConfig {
    /// Load settings from an explicit path, the user config dir, or defaults.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        let candidate = match path {
            Some(explicit) => Some(explicit.to_path_buf()),
            None => dirs::config_dir()
                .map(|dir| dir.join("syn-winget").join("config.toml"))
                .filter(|p| p.is_file()),
        };

        let Some(file) = candidate else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&file).map_err(|err| {
            SynwingetError::Config(format!("Failed to read {}: {err}", file.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| SynwingetError::Config(format!("{}: {err}", file.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|err| SynwingetError::Config(format!("Invalid settings TOML: {err}")))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.log_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("syn-winget")
                .join("logs")
        })
    }

    /// Fork to push branches to: settings, `WINGET_FORK_REPO`, or the
    /// workflow owner's `winget-pkgs`.
    pub fn fork_repo(&self) -> Result<String> {
        if let Some(repo) = self.fork_repo.as_ref().filter(|r| !r.is_empty()) {
            return Ok(repo.clone());
        }
        if let Ok(repo) = std::env::var("WINGET_FORK_REPO") {
            if !repo.is_empty() {
                return Ok(repo);
            }
        }
        match std::env::var("GITHUB_REPOSITORY_OWNER") {
            Ok(owner) if !owner.is_empty() => Ok(format!("{owner}/winget-pkgs")),
            _ => Err(SynwingetError::Config(
                "No fork repository configured (fork_repo, WINGET_FORK_REPO or GITHUB_REPOSITORY_OWNER)"
                    .into(),
            )),
        }
    }
}

/// Token for GitHub API calls and pushes, if the environment provides one.
pub fn github_token() -> Option<String> {
    ["GITHUB_TOKEN", "GH_TOKEN", "WINGET_PKGS_TOKEN"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_identifier_and_manifest_path() {
        let id = derive_package_identifier(Path::new("cfg/Seelen.SeelenUI.checkver.yaml")).unwrap();
        assert_eq!(id, "Seelen.SeelenUI");
        assert_eq!(
            derive_manifest_path(&id).unwrap(),
            "manifests/s/Seelen/SeelenUI"
        );
        assert!(derive_manifest_path("NoDots").is_err());
    }

    #[test]
    fn parses_script_checkver_with_arch_templates() {
        let raw = r#"
packageIdentifier: UniKey.UniKey
checkver:
  type: script
  script: Invoke-WebRequest https://unikey.org
  regex: 'unikey(?<rcversion>\d+RC\d)-(?<build>\d{6})'
  replace: "4.6.${2}"
installerUrlTemplate:
  x64: https://unikey.org/assets/release/unikey{rcversion}-{build}-win64.zip
  x86: https://unikey.org/assets/release/unikey{rcversion}-{build}-win32.zip
updateMetadata:
  - ReleaseNotes
"#;
        let mut config = PackageConfig::from_yaml(raw).unwrap();
        config.fill_derived().unwrap();
        assert_eq!(config.manifest_path, "manifests/u/UniKey/UniKey");
        assert!(config.wants_metadata("ReleaseNotes"));
        assert!(!config.wants_metadata("ReleaseNotesUrl"));
        match config.installer_url_template {
            Some(UrlTemplate::PerArchitecture(ref map)) => assert_eq!(map.len(), 2),
            ref other => panic!("unexpected template {other:?}"),
        }
        assert_eq!(
            config.strategies(),
            vec![Strategy::Script {
                script: "Invoke-WebRequest https://unikey.org".into(),
                regex: r"unikey(?<rcversion>\d+RC\d)-(?<build>\d{6})".into(),
                replace: Some("4.6.${2}".into()),
            }]
        );
    }

    #[test]
    fn keyword_github_uses_companion_section() {
        let raw = r#"
packageIdentifier: Microsoft.PowerShell
checkver: github
github:
  owner: PowerShell
  repo: PowerShell
  appendDotZero: true
checkUrl: https://example.invalid/downloads
installerUrlTemplate: https://github.com/PowerShell/PowerShell/releases/download/v{versionShort}/PowerShell-{versionShort}-win-x64.msi
"#;
        let config = PackageConfig::from_yaml(raw).unwrap();
        let strategies = config.strategies();
        assert_eq!(strategies.len(), 2);
        assert_eq!(
            strategies[0],
            Strategy::Github {
                repo: "PowerShell/PowerShell".into(),
                tag_regex: None,
                append_dot_zero: true,
            }
        );
        assert!(matches!(strategies[1], Strategy::Web { .. }));
    }

    #[test]
    fn runner_settings_fill_defaults() {
        let config = RunnerConfig::from_toml("fork_repo = \"me/winget-pkgs\"\nclone_depth = 10\n")
            .unwrap();
        assert_eq!(config.fork_repo().unwrap(), "me/winget-pkgs");
        assert_eq!(config.clone_depth, 10);
        assert_eq!(config.upstream_repo, "microsoft/winget-pkgs");
        assert_eq!(config.http_timeout, 30);
    }
}
