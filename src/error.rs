/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise Syn-Winget error types so every pipeline stage
    reports failures with the same vocabulary and exit status.

  Security / Safety Notes:
    Error contexts never embed access tokens; remote URLs are
    redacted by the caller before being formatted into errors.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for the binary entry point.

  Revision History:
    2026-10-18 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for workflow tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for Syn-Winget operations.
pub type Result<T> = std::result::Result<T, SynwingetError>;

/// Enumerates high-level error domains surfaced by Syn-Winget.
#[derive(Debug, Error)]
pub enum SynwingetError {
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Command `{command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Manifest: {0}")]
    Manifest(String),
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl SynwingetError {
    /// Hard failures exit with status 1 whatever the category.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(1)
    }

    /// Whether the error stems from a missing external tool.
    pub fn is_tool_missing(&self) -> bool {
        matches!(self, SynwingetError::CommandMissing { .. })
    }
}
