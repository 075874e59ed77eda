/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::resolver
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Walk the checkver strategy chain, attach release notes, and
    assemble the UpdateInfo handed to the update stage.

  Security / Safety Notes:
    Strategy failures degrade to warnings; nothing here writes
    outside the requested output file.

  Dependencies:
    GitHub client, command runner, regex-backed strategies.

  Operational Scope:
    Backs the `resolve` subcommand.

  Revision History:
    2026-10-18 COD  Authored resolver chain and upstream check.
  ------------------------------------------------------------
  SSE Principles Observed:
    - First strategy yielding a version wins
    - "No update" is an outcome, not an error
============================================================*/

pub mod releases;
pub mod script;
pub mod template;
pub mod web;

use std::collections::BTreeMap;
use std::time::Duration;

use crate::config::{PackageConfig, RunnerConfig, Strategy, UrlTemplate};
use crate::error::{Result, SynwingetError};
use crate::github::GithubClient;
use crate::logger::Logger;
use crate::package_info::{UpdateInfo, VersionResult};
use crate::version::VersionKey;

pub use template::{render_template, template_vars};

/// Outcome of the resolve stage.
#[derive(Debug)]
pub enum Resolution {
    /// A version newer than anything upstream.
    Update(Box<UpdateInfo>),
    /// The resolved version is already published upstream.
    UpToDate(String),
    /// No strategy produced a version, or no installer URL can be built.
    NotFound,
}

/// Drives version discovery for one package.
pub struct Resolver<'a> {
    client: &'a GithubClient,
    settings: &'a RunnerConfig,
    logger: &'a Logger,
}

impl<'a> Resolver<'a> {
    pub fn new(client: &'a GithubClient, settings: &'a RunnerConfig, logger: &'a Logger) -> Self {
        Self {
            client,
            settings,
            logger,
        }
    }

    fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.command_timeout.max(1))
    }

    /// Full resolve stage: version, release info, URLs, upstream check.
    pub async fn run(&self, config: &PackageConfig) -> Result<Resolution> {
        if config.installer_url_template.is_none() {
            self.logger.warn(
                "CHECKVER",
                format!("{} has no installerUrlTemplate", config.package_identifier),
            );
            return Ok(Resolution::NotFound);
        }
        let Some(mut result) = self.resolve(config).await else {
            return Ok(Resolution::NotFound);
        };
        self.logger.info(
            "VERSION",
            format!("{} resolved to {}", config.package_identifier, result.version),
        );

        if self.already_published(config, &result.version).await {
            return Ok(Resolution::UpToDate(result.version));
        }

        self.fill_release_info(config, &mut result).await;
        let info = build_update_info(config, result)?;
        self.probe_installers(&info).await;
        Ok(Resolution::Update(Box::new(info)))
    }

    /// Try each configured strategy in order; failures fall through.
    pub async fn resolve(&self, config: &PackageConfig) -> Option<VersionResult> {
        let strategies = config.strategies();
        if strategies.is_empty() {
            self.logger.warn(
                "CHECKVER",
                format!(
                    "{} has no usable checkver strategy",
                    config.package_identifier
                ),
            );
            return None;
        }

        for strategy in strategies {
            let attempt = match &strategy {
                Strategy::Github {
                    repo,
                    tag_regex,
                    append_dot_zero,
                } => {
                    releases::resolve(
                        self.client,
                        config,
                        repo,
                        tag_regex.as_deref(),
                        *append_dot_zero,
                        self.logger,
                    )
                    .await
                }
                Strategy::Script {
                    script,
                    regex,
                    replace,
                } => {
                    script::resolve(
                        script,
                        regex,
                        replace.as_deref(),
                        self.script_timeout(),
                        self.logger,
                    )
                    .await
                }
                Strategy::Web { url, regexes } => {
                    web::resolve(self.client, url, regexes, self.logger).await
                }
            };

            match attempt {
                Ok(Some(result)) => return Some(result),
                Ok(None) => {}
                Err(err) => self
                    .logger
                    .warn("CHECKVER", format!("{} strategy failed: {err}", strategy_name(&strategy))),
            }
        }

        self.logger.warn(
            "CHECKVER",
            format!("No version found for {}", config.package_identifier),
        );
        None
    }

    /// Whether `version` already has a directory under the upstream manifest path.
    pub async fn already_published(&self, config: &PackageConfig, version: &str) -> bool {
        let listing = self
            .client
            .list_directory(
                &self.settings.upstream_repo,
                &config.manifest_path,
                Some(&self.settings.upstream_branch),
            )
            .await;
        match listing {
            Ok(entries) => {
                let published = entries
                    .iter()
                    .filter(|entry| entry.is_dir())
                    .map(|entry| entry.name.as_str());
                version_listed(published, version)
            }
            Err(err) => {
                self.logger.debug(
                    "UPSTREAM",
                    format!("Could not list {}: {err}", config.manifest_path),
                );
                false
            }
        }
    }

    async fn fill_release_info(&self, config: &PackageConfig, result: &mut VersionResult) {
        lift_release_metadata(result);
        if result.release_notes.is_none() {
            if let Some(script) = config.release_notes_script.as_deref() {
                match script::run_powershell(script, self.script_timeout()).await {
                    Ok(Some(notes)) => result.release_notes = Some(notes),
                    Ok(None) => self
                        .logger
                        .warn("NOTES", "releaseNotesScript produced no output"),
                    Err(err) => self
                        .logger
                        .warn("NOTES", format!("releaseNotesScript failed: {err}")),
                }
            }
        }
        if result.release_notes_url.is_none() {
            if let Some(template) = config.release_notes_url_template.as_deref() {
                let vars = template_vars(&result.version, &result.metadata);
                match render_template(template, &vars) {
                    Ok(url) => result.release_notes_url = Some(url),
                    Err(err) => self.logger.warn("NOTES", err.to_string()),
                }
            }
        }
        if result.release_notes.is_none() {
            result.release_notes = config.release_notes.clone();
        }
        if result.release_notes_url.is_none() {
            result.release_notes_url = config.release_notes_url.clone();
        }
    }

    async fn probe_installers(&self, info: &UpdateInfo) {
        let urls: Vec<&String> = match &info.installer_urls {
            Some(map) => map.values().collect(),
            None => vec![&info.installer_url],
        };
        for url in urls {
            if !self.client.probe(url).await {
                self.logger
                    .warn("PROBE", format!("Installer URL not reachable: {url}"));
            }
        }
    }
}

/// Render installer URL(s) and assemble the stage contract.
pub fn build_update_info(config: &PackageConfig, result: VersionResult) -> Result<UpdateInfo> {
    let vars = template_vars(&result.version, &result.metadata);
    let (installer_url, installer_urls) = match &config.installer_url_template {
        Some(UrlTemplate::Single(template)) => (render_template(template, &vars)?, None),
        Some(UrlTemplate::PerArchitecture(templates)) => {
            let mut urls = BTreeMap::new();
            for (arch, template) in templates {
                urls.insert(arch.clone(), render_template(template, &vars)?);
            }
            let primary = urls
                .get("x64")
                .or_else(|| urls.values().next())
                .cloned()
                .ok_or_else(|| {
                    SynwingetError::Config("installerUrlTemplate mapping is empty".into())
                })?;
            (primary, Some(urls))
        }
        None => {
            return Err(SynwingetError::Config(format!(
                "{} has no installerUrlTemplate",
                config.package_identifier
            )))
        }
    };

    Ok(UpdateInfo {
        package_identifier: config.package_identifier.clone(),
        version: result.version,
        installer_url,
        installer_urls,
        metadata: result.metadata,
        release_notes: result.release_notes,
        release_notes_url: result.release_notes_url,
        checkver_config: config.clone(),
    })
}

/// Named `releasenotes` / `releasenotesurl` groups feed the release info.
pub fn lift_release_metadata(result: &mut VersionResult) {
    let lookup = |wanted: &str| {
        result
            .metadata
            .iter()
            .find(|(name, value)| name.eq_ignore_ascii_case(wanted) && !value.trim().is_empty())
            .map(|(_, value)| value.trim().to_string())
    };
    let notes = lookup("releasenotes");
    let notes_url = lookup("releasenotesurl");
    if result.release_notes.is_none() {
        result.release_notes = notes;
    }
    if result.release_notes_url.is_none() {
        result.release_notes_url = notes_url;
    }
}

/// Compare directory names against `version` by parsed ordering.
pub fn version_listed<'a, I>(published: I, version: &str) -> bool
where
    I: IntoIterator<Item = &'a str>,
{
    let wanted = VersionKey::parse(version);
    published
        .into_iter()
        .any(|name| VersionKey::parse(name) == wanted)
}

fn strategy_name(strategy: &Strategy) -> &'static str {
    match strategy {
        Strategy::Github { .. } => "github",
        Strategy::Script { .. } => "script",
        Strategy::Web { .. } => "web",
    }
}
