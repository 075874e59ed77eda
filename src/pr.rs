/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::pr
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Detect pull requests already filed for a package version and
    open new ones against the upstream repository via `gh`.

  Security / Safety Notes:
    `gh` reads its token from the environment; nothing is passed
    on the command line.

  Dependencies:
    serde_json for `gh --json` output, command runner.

  Operational Scope:
    Guard at the start of `update`, publish step at the end.

  Revision History:
    2026-10-18 COD  Authored duplicate PR guard and creation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Lookup failures degrade to "no existing PR"
    - Closed PRs never block a new submission
============================================================*/

use std::time::Duration;

use serde::Deserialize;

use crate::command;
use crate::config::RunnerConfig;
use crate::error::{Result, SynwingetError};
use crate::logger::Logger;

/// One row of `gh pr list --json number,title,state`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub state: String,
}

impl PullRequestSummary {
    /// Open and merged PRs mean the version is already handled.
    pub fn blocks_submission(&self) -> bool {
        matches!(self.state.to_ascii_uppercase().as_str(), "OPEN" | "MERGED")
    }
}

/// Case-insensitive identifier match plus an exact version match.
pub fn title_matches(title: &str, package_id: &str, version: &str) -> bool {
    title
        .to_ascii_lowercase()
        .contains(&package_id.to_ascii_lowercase())
        && title.contains(version)
}

/// First listed PR for this package version that blocks submission.
pub fn blocking_pr(
    candidates: &[PullRequestSummary],
    package_id: &str,
    version: &str,
) -> Option<PullRequestSummary> {
    candidates
        .iter()
        .filter(|pr| title_matches(&pr.title, package_id, version))
        .find(|pr| pr.blocks_submission())
        .cloned()
}

pub fn parse_pr_list(raw: &str) -> Result<Vec<PullRequestSummary>> {
    serde_json::from_str(raw).map_err(|err| {
        SynwingetError::Serialization(format!("Unexpected `gh pr list` output: {err}"))
    })
}

/// Search upstream for an open or merged PR; lookup errors yield `None`.
pub async fn find_existing_pr(
    package_id: &str,
    version: &str,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Option<PullRequestSummary> {
    let search = format!("{package_id} {version} in:title");
    let output = command::run_checked(
        "gh",
        &[
            "pr",
            "list",
            "--repo",
            &settings.upstream_repo,
            "--search",
            &search,
            "--state",
            "all",
            "--json",
            "number,title,state",
            "--limit",
            "10",
        ],
        None,
        Duration::from_secs(settings.command_timeout.max(1)),
    )
    .await;

    let candidates = match output.and_then(|out| parse_pr_list(&out.stdout)) {
        Ok(candidates) => candidates,
        Err(err) => {
            logger.warn("PR", format!("Could not check for existing PRs: {err}"));
            return None;
        }
    };

    let found = blocking_pr(&candidates, package_id, version);
    match &found {
        Some(pr) => logger.info(
            "PR",
            format!("PR #{} ({}) already covers {package_id} {version}", pr.number, pr.state),
        ),
        None => logger.debug(
            "PR",
            format!("{} candidate PRs, none blocking", candidates.len()),
        ),
    }
    found
}

/// Workflow details used in the PR body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    pub repository: Option<String>,
    pub server_url: String,
    pub run_number: Option<String>,
    pub run_id: Option<String>,
}

impl RunContext {
    pub fn from_env() -> Self {
        let var = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            repository: var("GITHUB_REPOSITORY"),
            server_url: var("GITHUB_SERVER_URL").unwrap_or_else(|| "https://github.com".into()),
            run_number: var("GITHUB_RUN_NUMBER"),
            run_id: var("GITHUB_RUN_ID"),
        }
    }
}

pub fn pr_body(context: &RunContext) -> String {
    let Some(repository) = &context.repository else {
        return "Automated by Syn-Winget.".to_string();
    };
    let repo_url = format!("{}/{repository}", context.server_url.trim_end_matches('/'));
    match (&context.run_number, &context.run_id) {
        (Some(number), Some(id)) => format!(
            "Automated by [{repository}]({repo_url}) in workflow run [#{number}]({repo_url}/actions/runs/{id})."
        ),
        _ => format!("Automated by [{repository}]({repo_url})."),
    }
}

/// `owner:branch` head reference for a PR from the fork.
pub fn head_ref(fork_repo: &str, branch: &str) -> String {
    let owner = fork_repo.split('/').next().unwrap_or(fork_repo);
    format!("{owner}:{branch}")
}

/// Open the PR and return the URL `gh` prints.
pub async fn create_pr(
    title: &str,
    branch: &str,
    fork_repo: &str,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<String> {
    let body = pr_body(&RunContext::from_env());
    let head = head_ref(fork_repo, branch);
    logger.info("PR", format!("Opening PR from {head}"));
    let output = command::run_checked(
        "gh",
        &[
            "pr",
            "create",
            "--repo",
            &settings.upstream_repo,
            "--base",
            &settings.upstream_branch,
            "--title",
            title,
            "--body",
            &body,
            "--head",
            &head,
        ],
        None,
        Duration::from_secs(settings.command_timeout.max(1)),
    )
    .await?;
    let url = output.stdout.trim().to_string();
    logger.info("PR", format!("Created {url}"));
    Ok(url)
}
