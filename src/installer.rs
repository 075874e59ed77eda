/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::installer
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Download installer artifacts per architecture, compute their
    SHA-256, and pull embedded identifiers (MSI ProductCode,
    MSIX signature hash) through pluggable external tools.

  Security / Safety Notes:
    Downloads land in scoped temp files that are removed on
    every exit path. Artifacts are hashed, never executed.

  Dependencies:
    reqwest (via GithubClient) for streaming, sha2 for digests,
    tempfile for scoped storage, regex for GUID validation.

  Operational Scope:
    First step of the `update` subcommand.

  Revision History:
    2026-10-18 COD  Authored fetch/hash stage and tool seams.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Missing helper tools degrade to warnings
    - One failed architecture never sinks the others
============================================================*/

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::command;
use crate::error::{Result, SynwingetError};
use crate::github::GithubClient;
use crate::logger::Logger;

static PRODUCT_CODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^ProductCode\t(\{[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}\})\s*$")
        .expect("valid product code regex")
});

static HEX_DIGEST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-F]{64}$").expect("valid digest regex"));

/// Installer packaging inferred from the download URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerKind {
    Msi,
    Msix,
    Zip,
    Exe,
}

impl InstallerKind {
    pub fn from_url(url: &str) -> Self {
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .to_ascii_lowercase();
        if path.ends_with(".msi") {
            InstallerKind::Msi
        } else if path.ends_with(".msix") || path.ends_with(".msixbundle") {
            InstallerKind::Msix
        } else if path.ends_with(".zip") {
            InstallerKind::Zip
        } else {
            InstallerKind::Exe
        }
    }

    fn suffix(self) -> &'static str {
        match self {
            InstallerKind::Msi => ".msi",
            InstallerKind::Msix => ".msix",
            InstallerKind::Zip => ".zip",
            InstallerKind::Exe => ".exe",
        }
    }
}

/// Hashed artifact for one architecture. The download itself is gone by
/// the time this value exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerArtifact {
    pub architecture: String,
    pub url: String,
    pub sha256: String,
    pub signature_sha256: Option<String>,
    pub product_code: Option<String>,
}

/// Reads the ProductCode out of an MSI.
#[allow(async_fn_in_trait)]
pub trait ProductCodeExtractor {
    async fn product_code(&self, path: &Path) -> Result<Option<String>>;
}

/// Computes the MSIX signature hash WinGet expects in `SignatureSha256`.
#[allow(async_fn_in_trait)]
pub trait SignatureHasher {
    async fn signature_sha256(&self, path: &Path) -> Result<Option<String>>;
}

/// Stand-in used when no tool is available on this host.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unavailable;

impl ProductCodeExtractor for Unavailable {
    async fn product_code(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

impl SignatureHasher for Unavailable {
    async fn signature_sha256(&self, _path: &Path) -> Result<Option<String>> {
        Ok(None)
    }
}

/// `msiinfo export <msi> Property` from msitools.
#[derive(Debug, Clone)]
pub struct MsiinfoExtractor {
    timeout: Duration,
}

impl MsiinfoExtractor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ProductCodeExtractor for MsiinfoExtractor {
    async fn product_code(&self, path: &Path) -> Result<Option<String>> {
        let path = path.to_string_lossy();
        let output = command::run_checked(
            "msiinfo",
            &["export", path.as_ref(), "Property"],
            None,
            self.timeout,
        )
        .await?;
        Ok(parse_product_code(&output.stdout))
    }
}

/// Hash of `AppxSignature.p7x` inside the package, computed by pwsh.
#[derive(Debug, Clone)]
pub struct PwshSignatureHasher {
    timeout: Duration,
}

impl PwshSignatureHasher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl SignatureHasher for PwshSignatureHasher {
    async fn signature_sha256(&self, path: &Path) -> Result<Option<String>> {
        let script = signature_script(&path.to_string_lossy());
        let output = command::run_checked(
            "pwsh",
            &["-NoProfile", "-Command", &script],
            None,
            self.timeout,
        )
        .await?;
        let digest = output.stdout.trim().to_ascii_uppercase();
        Ok(HEX_DIGEST.is_match(&digest).then_some(digest))
    }
}

fn signature_script(package: &str) -> String {
    let quoted = package.replace('\'', "''");
    format!(
        "Add-Type -AssemblyName System.IO.Compression.FileSystem; \
         $zip = [System.IO.Compression.ZipFile]::OpenRead('{quoted}'); \
         try {{ \
           $entry = $zip.Entries | Where-Object {{ $_.FullName -eq 'AppxSignature.p7x' }} | Select-Object -First 1; \
           if ($entry) {{ \
             $stream = $entry.Open(); \
             try {{ $sha = [System.Security.Cryptography.SHA256]::Create(); \
                   ($sha.ComputeHash($stream) | ForEach-Object {{ $_.ToString('X2') }}) -join '' }} \
             finally {{ $stream.Dispose() }} \
           }} \
         }} finally {{ $zip.Dispose() }}"
    )
}

/// First braced GUID on a `ProductCode` row of an msiinfo Property dump.
pub fn parse_product_code(property_table: &str) -> Option<String> {
    PRODUCT_CODE
        .captures(property_table)
        .map(|caps| caps[1].to_ascii_uppercase())
        .filter(|code| code.len() == 38)
}

/// Uppercase hex SHA-256 of a file.
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|err| {
        SynwingetError::Filesystem(format!("Failed to open {}: {err}", path.display()))
    })?;
    let mut hasher = Sha256::new();
    let mut buffer = [0_u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    let digest = format!("{:X}", hasher.finalize());
    if !HEX_DIGEST.is_match(&digest) {
        return Err(SynwingetError::Runtime(format!(
            "Unexpected digest format for {}",
            path.display()
        )));
    }
    Ok(digest)
}

/// Stream `url` into a scoped temp file; the file is removed when dropped.
pub async fn download(client: &GithubClient, url: &str) -> Result<NamedTempFile> {
    let kind = InstallerKind::from_url(url);
    let mut file = tempfile::Builder::new()
        .prefix("syn-winget-")
        .suffix(kind.suffix())
        .tempfile()
        .map_err(|err| SynwingetError::Filesystem(format!("Failed to create temp file: {err}")))?;

    let mut response = client
        .http()
        .get(url)
        .timeout(client.download_timeout())
        .send()
        .await
        .map_err(|err| SynwingetError::Network(format!("Download of {url} failed: {err}")))?;
    if response.status() != StatusCode::OK {
        return Err(SynwingetError::Network(format!(
            "Download of {url} returned status {}",
            response.status()
        )));
    }
    let expected = response.content_length();

    let mut written: u64 = 0;
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|err| SynwingetError::Network(format!("Download of {url} interrupted: {err}")))?
    {
        file.write_all(&chunk)?;
        written += chunk.len() as u64;
    }
    file.flush()?;

    let on_disk = file.as_file().metadata()?.len();
    if written == 0 || on_disk == 0 {
        return Err(SynwingetError::Network(format!(
            "Download of {url} produced an empty file"
        )));
    }
    if on_disk != written || expected.is_some_and(|len| len != written) {
        return Err(SynwingetError::Network(format!(
            "Download of {url} is incomplete ({written} bytes received, {on_disk} on disk)"
        )));
    }
    Ok(file)
}

/// Download, hash and inspect installers.
pub struct Fetcher<'a, P, S> {
    client: &'a GithubClient,
    logger: &'a Logger,
    product_codes: P,
    signatures: S,
}

impl<'a, P, S> Fetcher<'a, P, S>
where
    P: ProductCodeExtractor,
    S: SignatureHasher,
{
    pub fn new(client: &'a GithubClient, logger: &'a Logger, product_codes: P, signatures: S) -> Self {
        Self {
            client,
            logger,
            product_codes,
            signatures,
        }
    }

    /// Process one installer; the temp file never outlives this call.
    pub async fn fetch(&self, architecture: &str, url: &str) -> Result<InstallerArtifact> {
        self.logger
            .info("FETCH", format!("Downloading {architecture} installer {url}"));
        let file = download(self.client, url).await?;
        let sha256 = sha256_file(file.path())?;
        self.logger
            .info("HASH", format!("{architecture} InstallerSha256 {sha256}"));

        let mut artifact = InstallerArtifact {
            architecture: architecture.to_string(),
            url: url.to_string(),
            sha256,
            signature_sha256: None,
            product_code: None,
        };

        match InstallerKind::from_url(url) {
            InstallerKind::Msi => {
                artifact.product_code = self
                    .soft(self.product_codes.product_code(file.path()).await, "ProductCode");
            }
            InstallerKind::Msix => {
                artifact.signature_sha256 = self.soft(
                    self.signatures.signature_sha256(file.path()).await,
                    "SignatureSha256",
                );
            }
            InstallerKind::Zip | InstallerKind::Exe => {}
        }
        Ok(artifact)
    }

    /// Fetch every architecture, skipping failures; at least one must succeed.
    pub async fn fetch_all(&self, urls: &BTreeMap<String, String>) -> Result<Vec<InstallerArtifact>> {
        let mut artifacts = Vec::new();
        for (architecture, url) in urls {
            match self.fetch(architecture, url).await {
                Ok(artifact) => artifacts.push(artifact),
                Err(err) => self
                    .logger
                    .warn("FETCH", format!("Skipping {architecture}: {err}")),
            }
        }
        if artifacts.is_empty() {
            return Err(SynwingetError::Network(
                "No installer could be downloaded for any architecture".into(),
            ));
        }
        Ok(artifacts)
    }

    fn soft(&self, outcome: Result<Option<String>>, field: &str) -> Option<String> {
        match outcome {
            Ok(Some(value)) => {
                self.logger.info("INSPECT", format!("{field} {value}"));
                Some(value)
            }
            Ok(None) => {
                self.logger
                    .warn("INSPECT", format!("{field} could not be determined"));
                None
            }
            Err(err) if err.is_tool_missing() => {
                self.logger
                    .warn("INSPECT", format!("{field} skipped: {err}"));
                None
            }
            Err(err) => {
                self.logger
                    .warn("INSPECT", format!("{field} extraction failed: {err}"));
                None
            }
        }
    }
}
