/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::command
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Run external tools (git, gh, pwsh, msiinfo) with bounded
    runtimes and uniform failure reporting.

  Security / Safety Notes:
    Executes binaries with user privileges only. Arguments are
    passed as a vector; no shell interpolation takes place.

  Dependencies:
    tokio::process for async command execution.

  Operational Scope:
    Backs version scripts, installer inspection, git and PR
    operations.

  Revision History:
    2026-10-18 COD  Extracted command runner helpers.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Every subprocess bounded by a timeout
    - Reusable helpers for external command diagnostics
============================================================*/

use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::error::{Result, SynwingetError};
use crate::logger::redact;

/// Captured result of a finished command.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    fn from_output(output: Output) -> Self {
        Self {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
    }
}

/// Run `program args…` and return its output whatever the exit status.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let child = command.output();
    let output = match tokio::time::timeout(timeout, child).await {
        Ok(result) => result.map_err(|err| map_spawn_error(err, program))?,
        Err(_) => {
            return Err(SynwingetError::Timeout {
                command: describe(program, args),
                seconds: timeout.as_secs(),
            })
        }
    };
    Ok(CommandOutput::from_output(output))
}

/// Run a command and fail unless it exits with status 0.
pub async fn run_checked(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<CommandOutput> {
    let output = run(program, args, cwd, timeout).await?;
    if !output.success() {
        return Err(SynwingetError::CommandFailure {
            command: describe(program, args),
            status: output.status,
            stderr: redact(&output.stderr),
        });
    }
    Ok(output)
}

fn describe(program: &str, args: &[&str]) -> String {
    redact(format!("{program} {}", args.join(" ")).trim())
}

fn map_spawn_error(err: io::Error, command: &str) -> SynwingetError {
    if err.kind() == io::ErrorKind::NotFound {
        SynwingetError::CommandMissing {
            command: command.into(),
        }
    } else {
        SynwingetError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}
