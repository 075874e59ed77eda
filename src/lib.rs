/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Library surface for Syn-Winget: version resolution,
    installer hashing, manifest patching and PR publication
    for WinGet package manifests.

  Security / Safety Notes:
    Network access is limited to HTTPS GET/HEAD requests and
    the git/gh command-line tools.

  Dependencies:
    See Cargo.toml.

  Operational Scope:
    Consumed by the `syn-winget` binary and integration tests.

  Revision History:
    2026-10-18 COD  Split library from binary entry point.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
============================================================*/

pub mod command;
pub mod config;
pub mod error;
pub mod git;
pub mod github;
pub mod installer;
pub mod logger;
pub mod materialize;
pub mod orchestrator;
pub mod package_info;
pub mod patch;
pub mod pr;
pub mod resolver;
pub mod version;
