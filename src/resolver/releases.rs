/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::resolver::releases
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Resolve the newest upstream version from GitHub releases,
    optionally filtered by a tag regex.

  Security / Safety Notes:
    Read-only API access; token forwarded only when present.

  Dependencies:
    regex for tag filtering.

  Operational Scope:
    First strategy of the resolver chain.

  Revision History:
    2026-10-18 COD  Authored GitHub release strategy.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Drafts never count as releases
    - Metadata fetched only when the package asks for it
============================================================*/

use regex::Regex;

use crate::config::PackageConfig;
use crate::error::{Result, SynwingetError};
use crate::github::{GithubClient, Release};
use crate::logger::Logger;
use crate::package_info::VersionResult;
use crate::version::append_dot_zero;

/// Look up the newest release of `repo`.
pub async fn resolve(
    client: &GithubClient,
    config: &PackageConfig,
    repo: &str,
    tag_regex: Option<&str>,
    dot_zero: bool,
    logger: &Logger,
) -> Result<Option<VersionResult>> {
    let (release, version) = match tag_regex {
        Some(pattern) => {
            let regex = Regex::new(pattern).map_err(|err| {
                SynwingetError::Config(format!("Invalid tagRegex `{pattern}`: {err}"))
            })?;
            let releases = client.releases(repo).await?;
            match pick_matching_release(releases, &regex) {
                Some(found) => found,
                None => {
                    logger.warn("GITHUB", format!("No release tag of {repo} matches `{pattern}`"));
                    return Ok(None);
                }
            }
        }
        None => {
            logger.debug("GITHUB", format!("Fetching latest release of {repo}"));
            let release = client.latest_release(repo).await?;
            let version = strip_tag_prefix(&release.tag_name).to_string();
            (release, version)
        }
    };

    if version.is_empty() {
        return Ok(None);
    }

    let version = if dot_zero {
        append_dot_zero(&version)
    } else {
        version
    };

    let mut result = VersionResult::new(version);
    if config.wants_metadata("ReleaseNotes") {
        match release.body.as_deref().map(str::trim).filter(|b| !b.is_empty()) {
            Some(body) => result.release_notes = Some(body.to_string()),
            None => logger.warn(
                "GITHUB",
                "ReleaseNotes requested but the release has no body",
            ),
        }
    }
    if config.wants_metadata("ReleaseNotesUrl") {
        result.release_notes_url = release.html_url.clone().filter(|u| !u.is_empty());
    }
    Ok(Some(result))
}

fn pick_matching_release(releases: Vec<Release>, regex: &Regex) -> Option<(Release, String)> {
    releases
        .into_iter()
        .filter(|release| !release.draft)
        .find_map(|release| {
            let caps = regex.captures(&release.tag_name)?;
            let version = caps
                .get(1)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| strip_tag_prefix(&release.tag_name).to_string());
            Some((release, version))
        })
}

/// `v7.5.4` → `7.5.4`.
pub fn strip_tag_prefix(tag: &str) -> &str {
    tag.trim_start_matches(['v', 'V'])
}
