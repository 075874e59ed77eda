/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::patch::architecture
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Append installer entries for architectures the new release
    ships but the previous manifest did not list.

  Security / Safety Notes:
    Pure text transformation.

  Dependencies:
    Line scanner from patch::context.

  Operational Scope:
    Installer manifests only, after the main patch pass.

  Revision History:
    2026-10-18 COD  Authored missing architecture insertion.
  ------------------------------------------------------------
  SSE Principles Observed:
    - New entries mirror the last entry's nested layout
    - Deterministic ordering by architecture name
============================================================*/

use std::collections::{BTreeMap, BTreeSet};

use super::context::{LineInfo, LineKind};
use super::engine::{valid_hashes, ManifestText};
use crate::logger::Logger;

/// Architectures named by `- Architecture:` entries, in file order.
pub fn existing_architectures(content: &str) -> Vec<String> {
    let doc = ManifestText::parse(content);
    let infos = doc.scan();
    let mut seen: Vec<String> = Vec::new();
    for info in &infos {
        if !info.is_field("Architecture") {
            continue;
        }
        if let Some(arch) = &info.architecture {
            if !seen.contains(&arch.arch) {
                seen.push(arch.arch.clone());
            }
        }
    }
    seen
}

/// Insert an entry for every architecture in `hashes` missing from `content`.
pub fn add_missing_architectures(
    content: &str,
    hashes: &BTreeMap<String, String>,
    urls: &BTreeMap<String, String>,
    logger: &Logger,
) -> String {
    let hashes = &valid_hashes(hashes, logger);
    let present: BTreeSet<String> = existing_architectures(content).into_iter().collect();
    let missing: Vec<&String> = hashes.keys().filter(|arch| !present.contains(*arch)).collect();
    if missing.is_empty() {
        return content.to_string();
    }

    let mut doc = ManifestText::parse(content);
    let infos = doc.scan();
    let Some(last) = last_entry(&infos) else {
        logger.warn(
            "ARCH",
            "No installer entry to model new architectures on; leaving manifest unchanged",
        );
        return content.to_string();
    };

    let opener = &doc.lines[last.start];
    let Some(key_column) = infos[last.start].key_column() else {
        return content.to_string();
    };
    let entry_prefix = opener[..key_column].to_string();
    let field_indent = " ".repeat(key_column);
    let nested = nested_installer_lines(&doc.lines, &infos, &last, key_column);

    let mut block = Vec::new();
    for arch in missing {
        let Some(url) = urls.get(arch) else {
            logger.warn(
                "ARCH",
                format!("No installer URL for new architecture {arch}; not adding it"),
            );
            continue;
        };
        block.push(format!("{entry_prefix}Architecture: {arch}"));
        block.extend(nested.iter().cloned());
        block.push(format!("{field_indent}InstallerUrl: {url}"));
        block.push(format!("{field_indent}InstallerSha256: {}", hashes[arch]));
        logger.info("ARCH", format!("Added {arch} installer entry"));
    }

    let insert_at = last.end + 1;
    doc.lines.splice(insert_at..insert_at, block);
    doc.render()
}

/// Inclusive line range of an installer entry.
#[derive(Debug, Clone, Copy)]
struct EntrySpan {
    index: usize,
    start: usize,
    end: usize,
}

fn last_entry(infos: &[LineInfo]) -> Option<EntrySpan> {
    let index = infos
        .iter()
        .filter_map(|info| info.architecture.as_ref().map(|arch| arch.index))
        .max()?;
    let start = infos.iter().position(|info| {
        info.architecture.as_ref().is_some_and(|arch| arch.index == index)
    })?;
    let end = infos.iter().rposition(|info| {
        info.architecture.as_ref().is_some_and(|arch| arch.index == index)
            && !matches!(info.kind, LineKind::Blank | LineKind::Comment)
    })?;
    Some(EntrySpan { index, start, end })
}

/// Lines from `NestedInstallerType:` up to the entry's URL or hash field.
fn nested_installer_lines(
    lines: &[String],
    infos: &[LineInfo],
    entry: &EntrySpan,
    key_column: usize,
) -> Vec<String> {
    let mut nested = Vec::new();
    let mut collecting = false;
    for position in entry.start + 1..=entry.end {
        let info = &infos[position];
        if info.architecture.as_ref().map(|arch| arch.index) != Some(entry.index) {
            continue;
        }
        let at_entry_level = info.key_column() == Some(key_column);
        if at_entry_level && (info.is_field("InstallerUrl") || info.is_field("InstallerSha256")) {
            if collecting {
                break;
            }
            continue;
        }
        if at_entry_level && info.is_field("NestedInstallerType") {
            collecting = true;
        } else if collecting && at_entry_level && !is_nested_field(info) {
            collecting = false;
        }
        if collecting {
            nested.push(lines[position].clone());
        }
    }
    nested
}

fn is_nested_field(info: &LineInfo) -> bool {
    info.field_name()
        .is_some_and(|name| name.starts_with("NestedInstaller"))
}
