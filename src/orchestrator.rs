/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::orchestrator
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Drive the `update` stage: duplicate PR guard, installer
    fetch, manifest materialization, commit, push and PR.

  Security / Safety Notes:
    Clones live in a scoped temporary directory removed on
    every exit path. A token is required before any clone.

  Dependencies:
    installer, materialize, git, pr modules; tempfile.

  Operational Scope:
    Invoked by `syn-winget update <VERSION_JSON>`.

  Revision History:
    2026-10-18 COD  Authored update orchestration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Strictly sequential, one package per invocation
    - Existing OPEN or MERGED PRs end the run successfully
============================================================*/

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{github_token, RunnerConfig};
use crate::error::{Result, SynwingetError};
use crate::git::{branch_name, commit_message, GitWorkspace};
use crate::github::GithubClient;
use crate::installer::{Fetcher, InstallerArtifact, MsiinfoExtractor, PwshSignatureHasher};
use crate::logger::Logger;
use crate::materialize::materialize;
use crate::package_info::UpdateInfo;
use crate::patch::{PatchRequest, ProductCodes};
use crate::pr::{create_pr, find_existing_pr};

/// Switches for the update stage.
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub no_pr: bool,
    /// Patch this existing clone in place; no git or PR work.
    pub fork_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// An OPEN or MERGED PR already carries this version.
    AlreadyProposed(u64),
    /// Manifests written to a local clone only.
    Patched(PathBuf),
    /// Branch pushed without opening a PR.
    Pushed(String),
    /// Template produced no diff against the fork.
    NothingToCommit,
    Submitted(String),
}

/// Translate fetched artifacts into the engine's patch request.
pub fn build_patch_request(info: &UpdateInfo, artifacts: &[InstallerArtifact]) -> PatchRequest {
    let mut request = PatchRequest::for_version(info.version.clone());
    request.release_notes = info.release_notes.clone();
    request.release_notes_url = info.release_notes_url.clone();

    if info.is_multi_arch() {
        for artifact in artifacts {
            request
                .installer_urls
                .insert(artifact.architecture.clone(), artifact.url.clone());
            request
                .arch_hashes
                .insert(artifact.architecture.clone(), artifact.sha256.clone());
            if let Some(code) = &artifact.product_code {
                request
                    .product_codes
                    .per_arch
                    .insert(artifact.architecture.clone(), code.clone());
            }
        }
        request.signature_sha256 = artifacts.iter().find_map(|a| a.signature_sha256.clone());
    } else if let Some(artifact) = artifacts.first() {
        request.installer_url = Some(artifact.url.clone());
        request.installer_sha256 = Some(artifact.sha256.clone());
        request.signature_sha256 = artifact.signature_sha256.clone();
        request.product_codes = ProductCodes {
            default: artifact.product_code.clone(),
            per_arch: BTreeMap::new(),
        };
    }
    request
}

/// Architecture → URL map to download; single-installer packages use `default`.
pub fn download_targets(info: &UpdateInfo) -> BTreeMap<String, String> {
    match &info.installer_urls {
        Some(urls) if !urls.is_empty() => urls.clone(),
        _ => BTreeMap::from([("default".to_string(), info.installer_url.clone())]),
    }
}

/// Run the whole update stage for one resolved version.
pub async fn run_update(
    info: &UpdateInfo,
    options: &UpdateOptions,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<UpdateOutcome> {
    let package_id = info.package_identifier.as_str();
    let version = info.version.as_str();
    logger.info("UPDATE", format!("Updating {package_id} to {version}"));
    if let Some(urls) = &info.installer_urls {
        let archs: Vec<&str> = urls.keys().map(String::as_str).collect();
        logger.info("UPDATE", format!("Architectures: {}", archs.join(", ")));
    }

    if !options.no_pr {
        if let Some(existing) = find_existing_pr(package_id, version, settings, logger).await {
            logger.info("UPDATE", "Skipping update; a PR already exists");
            return Ok(UpdateOutcome::AlreadyProposed(existing.number));
        }
    }

    let token = github_token();
    let client = GithubClient::new(settings, token.clone())?;
    let tool_timeout = Duration::from_secs(settings.command_timeout.max(1));
    let fetcher = Fetcher::new(
        &client,
        logger,
        MsiinfoExtractor::new(tool_timeout),
        PwshSignatureHasher::new(tool_timeout),
    );
    let artifacts = fetcher.fetch_all(&download_targets(info)).await?;
    let request = build_patch_request(info, &artifacts);
    let mut config = info.checkver_config.clone();
    if config.package_identifier.is_empty() {
        config.package_identifier = info.package_identifier.clone();
    }
    config.fill_derived()?;
    let config = &config;

    if let Some(fork_path) = &options.fork_path {
        logger.info("UPDATE", format!("Using existing clone {}", fork_path.display()));
        let target =
            materialize(fork_path, config, version, &request, &client, settings, logger).await?;
        logger.info("UPDATE", format!("Manifests written to {}", target.display()));
        return Ok(UpdateOutcome::Patched(target));
    }

    let Some(token) = token else {
        return Err(SynwingetError::Config(
            "GITHUB_TOKEN or GH_TOKEN must be set to clone and push".into(),
        ));
    };
    let fork_repo = settings.fork_repo()?;
    let scratch = tempfile::Builder::new()
        .prefix("syn-winget-")
        .tempdir()
        .map_err(|err| {
            SynwingetError::Filesystem(format!("Failed to create clone directory: {err}"))
        })?;
    let clone_dir = scratch.path().join("winget-pkgs");

    let workspace =
        GitWorkspace::clone_fork(&fork_repo, Some(token.as_str()), &clone_dir, settings, logger).await?;
    workspace.sync_upstream(settings, logger).await?;
    let branch = branch_name(package_id, version);
    workspace.create_branch(&branch).await?;
    logger.info("GIT", format!("Created branch {branch}"));

    materialize(workspace.root(), config, version, &request, &client, settings, logger).await?;

    let message = commit_message(package_id, version);
    if !workspace.commit_all(&message).await? {
        logger.warn("GIT", "No changes to commit");
        return Ok(UpdateOutcome::NothingToCommit);
    }
    workspace.push(&branch, logger).await?;

    if options.no_pr {
        logger.info("UPDATE", format!("Pushed {branch}; PR creation disabled"));
        return Ok(UpdateOutcome::Pushed(branch));
    }
    let url = create_pr(&message, &branch, &fork_repo, settings, logger).await?;
    Ok(UpdateOutcome::Submitted(url))
}
