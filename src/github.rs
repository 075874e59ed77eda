/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::github
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Query the GitHub REST API and plain HTTPS endpoints for
    releases, repository listings, raw files and web pages.

  Security / Safety Notes:
    Sends the workflow token only to api.github.com. Requests
    are read-only; nothing is written through the API.

  Dependencies:
    reqwest for HTTP, serde for response parsing, urlencoding.

  Operational Scope:
    Used by the resolver, the upstream short-circuit, and the
    pinned-template bootstrap in the materializer.

  Revision History:
    2026-10-18 COD  Adapted retrying HTTP client for GitHub.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Defensive retry logic with exponential backoff
    - Structured response parsing with explicit error paths
    - Configurable timeouts
============================================================*/

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::time::sleep;
use urlencoding::encode;

use crate::config::RunnerConfig;
use crate::error::{Result, SynwingetError};

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";
const BROWSER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// A GitHub release as returned by the releases API.
#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub draft: bool,
    #[serde(default)]
    pub prerelease: bool,
}

/// One entry of a repository contents listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub download_url: Option<String>,
}

impl ContentEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == "dir"
    }
}

/// HTTP client shared by every network-facing stage.
#[derive(Clone)]
pub struct GithubClient {
    client: reqwest::Client,
    token: Option<String>,
    max_retries: usize,
    download_timeout: Duration,
}

impl GithubClient {
    /// Construct a new client from runner settings.
    pub fn new(config: &RunnerConfig, token: Option<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout.max(1)))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|err| {
                SynwingetError::Network(format!("Failed to build HTTP client: {err}"))
            })?;

        Ok(Self {
            client,
            token,
            max_retries: config.max_retries.max(1),
            download_timeout: Duration::from_secs(config.download_timeout.max(1)),
        })
    }

    /// Underlying client, for streaming downloads.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn download_timeout(&self) -> Duration {
        self.download_timeout
    }

    pub async fn latest_release(&self, repo: &str) -> Result<Release> {
        self.api_json(&format!("{API_BASE}/repos/{repo}/releases/latest"))
            .await
    }

    pub async fn releases(&self, repo: &str) -> Result<Vec<Release>> {
        self.api_json(&format!("{API_BASE}/repos/{repo}/releases?per_page=30"))
            .await
    }

    /// List a directory of `repo` at an optional git ref.
    pub async fn list_directory(
        &self,
        repo: &str,
        path: &str,
        reference: Option<&str>,
    ) -> Result<Vec<ContentEntry>> {
        let mut url = format!("{API_BASE}/repos/{repo}/contents/{}", encode_path(path));
        if let Some(reference) = reference {
            url.push_str("?ref=");
            url.push_str(&encode(reference));
        }
        self.api_json(&url).await
    }

    /// Fetch a file's text from raw.githubusercontent.com.
    pub async fn raw_file(&self, repo: &str, reference: &str, path: &str) -> Result<String> {
        let url = format!("{RAW_BASE}/{repo}/{}/{}", encode(reference), encode_path(path));
        self.text_with(self.client.get(&url), &url).await
    }

    /// Fetch a web page with a browser user agent.
    pub async fn page_text(&self, url: &str) -> Result<String> {
        self.text_with(self.client.get(url).header(USER_AGENT, BROWSER_AGENT), url)
            .await
    }

    /// Whether `url` answers a HEAD request with 200 after redirects.
    pub async fn probe(&self, url: &str) -> bool {
        match self
            .client
            .head(url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) => response.status() == StatusCode::OK,
            Err(_) => false,
        }
    }

    async fn api_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let mut attempt = 0;
        loop {
            let mut request = self
                .client
                .get(url)
                .header(ACCEPT, "application/vnd.github+json");
            if let Some(token) = &self.token {
                request = request.header(AUTHORIZATION, format!("token {token}"));
            }

            let response = request.send().await.map_err(|err| {
                SynwingetError::Network(format!("GitHub request to {url} failed: {err}"))
            })?;
            let status = response.status();

            if status == StatusCode::OK {
                return response.json::<T>().await.map_err(|err| {
                    SynwingetError::Serialization(format!(
                        "Failed to decode GitHub response from {url}: {err}"
                    ))
                });
            }

            attempt += 1;
            if !is_retryable(status) || attempt >= self.max_retries {
                return Err(SynwingetError::Network(format!(
                    "GitHub request {url} failed with status {status} after {attempt} attempt(s)"
                )));
            }
            sleep(backoff(attempt)).await;
        }
    }

    async fn text_with(&self, request: RequestBuilder, url: &str) -> Result<String> {
        let response = request
            .send()
            .await
            .map_err(|err| SynwingetError::Network(format!("Request to {url} failed: {err}")))?;
        if response.status() != StatusCode::OK {
            return Err(SynwingetError::Network(format!(
                "Request to {url} returned status {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|err| SynwingetError::Network(format!("Failed to read body of {url}: {err}")))
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS
}

fn backoff(attempt: usize) -> Duration {
    let exponent = (attempt as u32).min(6);
    Duration::from_millis(250_u64.saturating_mul(1_u64 << exponent))
}

fn encode_path(path: &str) -> String {
    path.trim_matches('/')
        .split('/')
        .map(|segment| encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
