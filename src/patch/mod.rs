/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::patch
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Line-oriented manifest patching that keeps comments, key
    order and block scalars exactly as authored.

  Security / Safety Notes:
    Pure text transformation; no I/O.

  Dependencies:
    regex, chrono, serde_yaml (validation only).

  Operational Scope:
    Shared by the materializer and scenario tests.

  Revision History:
    2026-10-18 COD  Authored patch module layout.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Manifests are never round-tripped through a YAML tree
============================================================*/

pub mod architecture;
pub mod context;
pub mod engine;
pub mod validate;

pub use architecture::{add_missing_architectures, existing_architectures};
pub use context::{scan, ContextKey, LineInfo, LineKind};
pub use engine::{normalize_notes, patch_manifest, PatchRequest, ProductCodes};
pub use validate::{validate_and_log, validate_manifest, ValidationReport};
