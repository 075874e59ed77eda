/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::main
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Entry point for Syn-Winget. `resolve` turns a checkver file
    into version JSON; `update` turns version JSON into patched
    manifests and a pull request.

  Security / Safety Notes:
    Tokens come from the environment only and are redacted from
    every log line.

  Dependencies:
    clap for CLI parsing, chrono for session stamps.

  Operational Scope:
    Invoked once per package by CI workflows or operators.

  Revision History:
    2026-10-18 COD  Authored Syn-Winget runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand};

use synwinget::config::{github_token, PackageConfig, RunnerConfig};
use synwinget::error::Result;
use synwinget::github::GithubClient;
use synwinget::logger::Logger;
use synwinget::orchestrator::{run_update, UpdateOptions, UpdateOutcome};
use synwinget::package_info::{write_github_output, UpdateInfo};
use synwinget::resolver::{Resolution, Resolver};

/// Command-line arguments for Syn-Winget.
#[derive(Debug, Parser)]
#[command(
    name = "syn-winget",
    version,
    author = "Synavera Systems",
    about = "WinGet manifest updater"
)]
struct Cli {
    /// Override runner settings path.
    #[arg(long, value_name = "PATH", global = true)]
    settings: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH", global = true)]
    log: Option<PathBuf>,
    /// Enable verbose logging to stderr.
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Resolve the latest upstream version and emit version JSON.
    Resolve {
        /// Package checkver file.
        #[arg(value_name = "CHECKVER_YAML")]
        checkver: PathBuf,
        /// Also write the JSON to this path.
        #[arg(long, value_name = "JSON_PATH")]
        output: Option<PathBuf>,
    },
    /// Fetch installers, patch manifests and open a PR.
    Update {
        #[arg(value_name = "VERSION_JSON")]
        version_json: PathBuf,
        /// Skip the PR guard and PR creation.
        #[arg(long, action = ArgAction::SetTrue)]
        no_pr: bool,
        /// Patch an existing clone in place instead of cloning.
        #[arg(long, value_name = "PATH")]
        fork_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[Syn-Winget] {}", err);
            err.exit_code()
        }
    }
}

async fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let settings = RunnerConfig::load_from_optional_path(cli.settings.as_deref())?;

    let stage = match &cli.command {
        Command::Resolve { .. } => "resolve",
        Command::Update { .. } => "update",
    };
    let session_stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let log_path = cli
        .log
        .clone()
        .or_else(|| Some(settings.log_dir().join(format!("{stage}_{session_stamp}.log"))));
    let logger = Logger::new(log_path, cli.verbose)?
        .with_quiet_stdout(matches!(cli.command, Command::Resolve { .. }));

    let code = match &cli.command {
        Command::Resolve { checkver, output } => {
            resolve(checkver, output.as_deref(), &settings, &logger).await?
        }
        Command::Update {
            version_json,
            no_pr,
            fork_path,
        } => {
            let options = UpdateOptions {
                no_pr: *no_pr,
                fork_path: fork_path.clone(),
            };
            update(version_json, &options, &settings, &logger).await?
        }
    };

    logger.finalize()?;
    Ok(code)
}

async fn resolve(
    checkver: &Path,
    output: Option<&Path>,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<ExitCode> {
    let config = PackageConfig::load(checkver)?;
    logger.info(
        "INIT",
        format!("Resolving {} from {}", config.package_identifier, checkver.display()),
    );
    let client = GithubClient::new(settings, github_token())?;
    let resolver = Resolver::new(&client, settings, logger);

    match resolver.run(&config).await? {
        Resolution::Update(info) => {
            println!("{}", info.to_json()?);
            if let Some(path) = output {
                info.write(path)?;
                logger.info("OUTPUT", format!("Version info written to {}", path.display()));
            }
            write_github_output(&[
                ("has_update", "true"),
                ("version", info.version.as_str()),
                ("package_id", info.package_identifier.as_str()),
                ("installer_url", info.installer_url.as_str()),
            ])?;
        }
        Resolution::UpToDate(version) => {
            logger.info(
                "SUMMARY",
                format!("{} {version} already published; nothing to do", config.package_identifier),
            );
            write_github_output(&[("has_update", "false")])?;
        }
        Resolution::NotFound => {
            logger.warn(
                "SUMMARY",
                format!("No version found for {}", config.package_identifier),
            );
            write_github_output(&[("has_update", "false")])?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn update(
    version_json: &Path,
    options: &UpdateOptions,
    settings: &RunnerConfig,
    logger: &Logger,
) -> Result<ExitCode> {
    let info = UpdateInfo::load(version_json)?;
    let outcome = run_update(&info, options, settings, logger).await?;
    let summary = match outcome {
        UpdateOutcome::AlreadyProposed(number) => format!("PR #{number} already exists"),
        UpdateOutcome::Patched(dir) => format!("Manifests updated in {}", dir.display()),
        UpdateOutcome::Pushed(branch) => format!("Branch {branch} pushed (no PR created)"),
        UpdateOutcome::NothingToCommit => "No manifest changes to submit".to_string(),
        UpdateOutcome::Submitted(url) => format!("Pull request created: {url}"),
    };
    logger.info(
        "SUMMARY",
        format!("{} {}: {summary}", info.package_identifier, info.version),
    );
    Ok(ExitCode::SUCCESS)
}
