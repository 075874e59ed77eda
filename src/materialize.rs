/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::materialize
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Pick the template version directory, copy its manifests into
    the new version directory, and patch each file by kind.

  Security / Safety Notes:
    Pinned templates are staged in a throwaway directory outside
    the working tree so they can never be committed.

  Dependencies:
    tempfile for staging, GithubClient for pinned templates.

  Operational Scope:
    Second step of the `update` subcommand.

  Revision History:
    2026-10-18 COD  Authored template selection and copy/patch.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Existing version directories are never overwritten
    - Every written file is re-validated
============================================================*/

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::{PackageConfig, RunnerConfig};
use crate::error::{Result, SynwingetError};
use crate::github::GithubClient;
use crate::logger::Logger;
use crate::patch::{add_missing_architectures, patch_manifest, validate_and_log, PatchRequest};
use crate::version::{compare_versions, latest_version};

/// Role of a manifest file within the version/installer/locale triad.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManifestKind {
    Version,
    Installer,
    Locale,
}

impl ManifestKind {
    pub fn classify(file_name: &str) -> Self {
        if file_name.contains(".installer.") {
            ManifestKind::Installer
        } else if file_name.contains(".locale.") {
            ManifestKind::Locale
        } else {
            ManifestKind::Version
        }
    }

    /// Narrow a full request to the fields this kind of file carries.
    pub fn request(self, full: &PatchRequest) -> PatchRequest {
        let mut request = PatchRequest {
            version: full.version.clone(),
            release_date: full.release_date,
            ..PatchRequest::default()
        };
        match self {
            ManifestKind::Installer => {
                request.installer_url = full.installer_url.clone();
                request.installer_urls = full.installer_urls.clone();
                request.installer_sha256 = full.installer_sha256.clone();
                request.arch_hashes = full.arch_hashes.clone();
                request.signature_sha256 = full.signature_sha256.clone();
                request.product_codes = full.product_codes.clone();
            }
            ManifestKind::Locale => {
                request.release_notes = full.release_notes.clone();
                request.release_notes_url = full.release_notes_url.clone();
            }
            ManifestKind::Version => {}
        }
        request
    }
}

/// Highest version directory under `package_dir`, excluding `target`.
pub fn select_template(package_dir: &Path, target: &str) -> Result<Option<(String, PathBuf)>> {
    if !package_dir.is_dir() {
        return Ok(None);
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(package_dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name != target && name.starts_with(|c: char| c.is_ascii_digit()) {
            names.push(name);
        }
    }
    Ok(latest_version(names.iter().map(String::as_str))
        .map(|name| (name.to_string(), package_dir.join(name))))
}

/// Copy and patch every `*.yaml` in `template_dir` into `target_dir`.
pub fn materialize_from(
    template_dir: &Path,
    target_dir: &Path,
    request: &PatchRequest,
    logger: &Logger,
) -> Result<Vec<PathBuf>> {
    let mut sources = Vec::new();
    for entry in fs::read_dir(template_dir).map_err(|err| {
        SynwingetError::Filesystem(format!(
            "Failed to read template {}: {err}",
            template_dir.display()
        ))
    })? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "yaml") {
            sources.push(path);
        }
    }
    sources.sort();
    if sources.is_empty() {
        return Err(SynwingetError::Manifest(format!(
            "Template {} holds no manifest files",
            template_dir.display()
        )));
    }

    fs::create_dir_all(target_dir).map_err(|err| {
        SynwingetError::Filesystem(format!(
            "Failed to create {}: {err}",
            target_dir.display()
        ))
    })?;

    let mut written = Vec::with_capacity(sources.len());
    for source in sources {
        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let kind = ManifestKind::classify(&file_name);
        let original = fs::read_to_string(&source).map_err(|err| {
            SynwingetError::Filesystem(format!("Failed to read {}: {err}", source.display()))
        })?;

        logger.info("PATCH", format!("Updating {file_name}"));
        let file_request = kind.request(request);
        let mut patched = patch_manifest(&original, &file_request, logger);
        if kind == ManifestKind::Installer && !request.arch_hashes.is_empty() {
            patched = add_missing_architectures(
                &patched,
                &request.arch_hashes,
                &request.installer_urls,
                logger,
            );
        }

        let destination = target_dir.join(&file_name);
        fs::write(&destination, &patched).map_err(|err| {
            SynwingetError::Filesystem(format!(
                "Failed to write {}: {err}",
                destination.display()
            ))
        })?;
        validate_and_log(&patched, &file_name, logger);
        written.push(destination);
    }
    Ok(written)
}

/// Create `<manifestPath>/<version>` inside `repo_root`.
pub async fn materialize(
    repo_root: &Path,
    config: &PackageConfig,
    version: &str,
    request: &PatchRequest,
    client: &GithubClient,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<PathBuf> {
    let package_dir = repo_root.join(&config.manifest_path);
    let target_dir = package_dir.join(version);
    if target_dir.exists() {
        return Err(SynwingetError::Manifest(format!(
            "Version directory {} already exists",
            target_dir.display()
        )));
    }

    if let Some((template_version, template_dir)) = select_template(&package_dir, version)? {
        if compare_versions(&template_version, version).is_ge() {
            logger.warn(
                "TEMPLATE",
                format!("Template version {template_version} is not older than {version}"),
            );
        }
        logger.info(
            "TEMPLATE",
            format!("Copying from version {template_version}"),
        );
        materialize_from(&template_dir, &target_dir, request, logger)?;
        return Ok(target_dir);
    }

    let (Some(commit), Some(template_version)) = (
        config.template_commit.as_deref(),
        config.template_version.as_deref(),
    ) else {
        return Err(SynwingetError::Manifest(format!(
            "No existing versions under {} and no templateCommit/templateVersion pin",
            config.manifest_path
        )));
    };

    logger.info(
        "TEMPLATE",
        format!("Using pinned template {template_version} from commit {commit}"),
    );
    let staging = fetch_pinned_template(config, commit, template_version, client, settings, logger)
        .await?;
    materialize_from(staging.path(), &target_dir, request, logger)?;
    Ok(target_dir)
}

async fn fetch_pinned_template(
    config: &PackageConfig,
    commit: &str,
    template_version: &str,
    client: &GithubClient,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<TempDir> {
    let staging = tempfile::Builder::new()
        .prefix("syn-winget-template-")
        .tempdir()
        .map_err(|err| {
            SynwingetError::Filesystem(format!("Failed to create staging directory: {err}"))
        })?;

    let remote_dir = format!("{}/{template_version}", config.manifest_path);
    let entries = client
        .list_directory(&settings.upstream_repo, &remote_dir, Some(commit))
        .await?;

    let mut fetched = 0;
    for entry in entries.iter().filter(|e| !e.is_dir() && e.name.ends_with(".yaml")) {
        let text = client
            .raw_file(
                &settings.upstream_repo,
                commit,
                &format!("{remote_dir}/{}", entry.name),
            )
            .await?;
        fs::write(staging.path().join(&entry.name), text)?;
        logger.debug("TEMPLATE", format!("Fetched {}", entry.name));
        fetched += 1;
    }
    if fetched == 0 {
        return Err(SynwingetError::Manifest(format!(
            "Pinned template {remote_dir}@{commit} contains no manifests"
        )));
    }
    Ok(staging)
}
