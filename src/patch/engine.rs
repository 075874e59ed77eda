/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::patch::engine
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Rewrite one manifest's text for a new version: version
    strings, installer endpoints, identifiers, release data,
    followed by duplicate and blank-line cleanup.

  Security / Safety Notes:
    Pure text transformation; callers own all file I/O.

  Dependencies:
    regex for value patterns, chrono for ReleaseDate.

  Operational Scope:
    Invoked once per manifest file by the materializer.

  Revision History:
    2026-10-18 COD  Authored line-oriented patch engine.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Only fields already present are rewritten
    - Formatting outside rewritten lines is preserved byte for byte
============================================================*/

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::{NoExpand, Regex};

use super::context::{parse_field, scan, ContextKey, LineInfo, LineKind};
use crate::logger::Logger;

static PACKAGE_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"PackageVersion:\s*([\d.]+)").expect("valid version regex"));
static SINGLE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"InstallerUrl:\s*https?://\S+").expect("valid url regex"));
static SINGLE_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"InstallerSha256:\s*[A-Fa-f0-9]+").expect("valid hash regex"));
static SIGNATURE_HASH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"SignatureSha256:\s*[A-Fa-f0-9]+").expect("valid hash regex"));
static SHA256_HEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{64}$").expect("valid digest regex"));

/// Product codes to write: one for single-installer packages, or per architecture.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductCodes {
    pub default: Option<String>,
    pub per_arch: BTreeMap<String, String>,
}

impl ProductCodes {
    pub fn is_empty(&self) -> bool {
        self.default.is_none() && self.per_arch.is_empty()
    }

    fn for_line(&self, info: &LineInfo) -> Option<&String> {
        match &info.architecture {
            Some(arch) => self.per_arch.get(&arch.arch).or(self.default.as_ref()),
            None => self.default.as_ref(),
        }
    }
}

/// Everything a manifest may need rewritten. Absent values leave the
/// matching fields untouched.
#[derive(Debug, Clone, Default)]
pub struct PatchRequest {
    pub version: Option<String>,
    /// Single-installer URL, applied wherever `InstallerUrl:` appears.
    pub installer_url: Option<String>,
    pub installer_urls: BTreeMap<String, String>,
    pub installer_sha256: Option<String>,
    pub arch_hashes: BTreeMap<String, String>,
    pub signature_sha256: Option<String>,
    pub product_codes: ProductCodes,
    pub release_notes: Option<String>,
    pub release_notes_url: Option<String>,
    /// Defaults to today.
    pub release_date: Option<NaiveDate>,
}

impl PatchRequest {
    pub fn for_version(version: impl Into<String>) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::default()
        }
    }
}

/// Manifest held as lines, with the original line ending remembered.
#[derive(Debug, Clone)]
pub(crate) struct ManifestText {
    pub(crate) lines: Vec<String>,
    crlf: bool,
    trailing_newline: bool,
}

impl ManifestText {
    pub(crate) fn parse(content: &str) -> Self {
        let crlf = content.contains("\r\n");
        let trailing_newline = content.ends_with('\n');
        let body = content.strip_suffix('\n').unwrap_or(content);
        let lines = if content.is_empty() {
            Vec::new()
        } else {
            body.split('\n')
                .map(|line| line.strip_suffix('\r').unwrap_or(line).to_string())
                .collect()
        };
        Self {
            lines,
            crlf,
            trailing_newline,
        }
    }

    pub(crate) fn render(&self) -> String {
        let newline = if self.crlf { "\r\n" } else { "\n" };
        let mut out = self.lines.join(newline);
        if self.trailing_newline {
            out.push_str(newline);
        }
        out
    }

    pub(crate) fn scan(&self) -> Vec<LineInfo> {
        scan(&self.lines)
    }
}

/// Apply `request` to one manifest's text.
pub fn patch_manifest(content: &str, request: &PatchRequest, logger: &Logger) -> String {
    let mut doc = ManifestText::parse(content);

    if let Some(version) = &request.version {
        substitute_version(&mut doc, version, logger);
    }

    update_endpoint(
        &mut doc,
        "InstallerUrl",
        &request.installer_urls,
        request.installer_url.as_deref(),
        &SINGLE_URL,
        logger,
    );
    let arch_hashes = valid_hashes(&request.arch_hashes, logger);
    let single_hash = request
        .installer_sha256
        .as_deref()
        .filter(|hash| is_sha256(hash, "InstallerSha256", logger));
    update_endpoint(
        &mut doc,
        "InstallerSha256",
        &arch_hashes,
        single_hash,
        &SINGLE_HASH,
        logger,
    );

    if let Some(signature) = request
        .signature_sha256
        .as_deref()
        .filter(|hash| is_sha256(hash, "SignatureSha256", logger))
    {
        let count = replace_everywhere(
            &mut doc,
            &SIGNATURE_HASH,
            &format!("SignatureSha256: {signature}"),
        );
        if count > 0 {
            logger.debug("PATCH", "Updated SignatureSha256");
        }
    }

    if !request.product_codes.is_empty() {
        let codes = &request.product_codes;
        rewrite_field(&mut doc, "ProductCode", logger, |info, _| {
            codes.for_line(info).map(|code| format!("'{code}'"))
        });
    }

    let date = request
        .release_date
        .unwrap_or_else(|| Local::now().date_naive())
        .format("%Y-%m-%d")
        .to_string();
    rewrite_field(&mut doc, "ReleaseDate", logger, |_, _| Some(date.clone()));

    if let Some(notes) = request.release_notes.as_deref() {
        let notes = normalize_notes(notes);
        if !notes.is_empty() {
            rewrite_field(&mut doc, "ReleaseNotes", logger, |_, key_column| {
                Some(literal_block(&notes, key_column + 2))
            });
        }
    }
    if let Some(url) = request.release_notes_url.as_deref().filter(|u| !u.is_empty()) {
        rewrite_field(&mut doc, "ReleaseNotesUrl", logger, |_, _| Some(url.to_string()));
    }

    remove_duplicate_fields(&mut doc, logger);
    collapse_blank_runs(&mut doc);
    doc.render()
}

/// Schema and platform versions that may coincide with the package version.
const VERSION_EXEMPT_FIELDS: &[&str] = &["ManifestVersion", "MinimumOSVersion"];
const SCHEMA_DIRECTIVE: &str = "# yaml-language-server:";

/// Replace every textual occurrence of the old `PackageVersion`.
fn substitute_version(doc: &mut ManifestText, version: &str, logger: &Logger) {
    let old = doc.lines.iter().find_map(|line| {
        PACKAGE_VERSION
            .captures(line)
            .map(|caps| caps[1].trim_end_matches('.').to_string())
    });
    let Some(old) = old.filter(|old| !old.is_empty()) else {
        logger.debug("PATCH", "No PackageVersion field; version substitution skipped");
        return;
    };
    if old == version {
        return;
    }

    // Short forms (`2.3.0` as `2.3` in URL tags) are matched in the same
    // pass so freshly written text is never rescanned.
    let short = old
        .strip_suffix(".0")
        .zip(version.strip_suffix(".0"))
        .filter(|(old_short, _)| old_short.contains('.'));
    let alternation = match short {
        Some((old_short, _)) => format!("{}|{}", regex::escape(&old), regex::escape(old_short)),
        None => regex::escape(&old),
    };
    let Ok(pattern) = Regex::new(&alternation) else {
        return;
    };

    let mut count = 0;
    let mut short_count = 0;
    for line in &mut doc.lines {
        if !pattern.is_match(line) {
            continue;
        }
        if parse_field(line).is_some_and(|field| VERSION_EXEMPT_FIELDS.contains(&field.name.as_str())) {
            continue;
        }
        if line.trim_start().starts_with(SCHEMA_DIRECTIVE) {
            continue;
        }
        let original = line.clone();
        *line = pattern
            .replace_all(&original, |caps: &regex::Captures<'_>| {
                let Some(found) = caps.get(0) else {
                    return String::new();
                };
                if !stands_alone(&original, found.start(), found.end()) {
                    return found.as_str().to_string();
                }
                if found.as_str() == old.as_str() {
                    count += 1;
                    version.to_string()
                } else {
                    short_count += 1;
                    short.map_or(version, |(_, new_short)| new_short).to_string()
                }
            })
            .into_owned();
    }
    logger.debug(
        "PATCH",
        format!("Replaced {count} occurrence(s) of {old} with {version}"),
    );
    if short_count > 0 {
        logger.debug(
            "PATCH",
            format!("Replaced {short_count} short form(s) of {old}"),
        );
    }
}

/// True when `line[start..end]` is not part of a longer version or number.
fn stands_alone(line: &str, start: usize, end: usize) -> bool {
    let before: Vec<char> = line[..start].chars().rev().take(2).collect();
    let after: Vec<char> = line[end..].chars().take(2).collect();
    !continues_number(&before) && !continues_number(&after)
}

/// A digit, or a dot followed by a digit, directly next to the match.
fn continues_number(neighbours: &[char]) -> bool {
    match neighbours {
        [first, ..] if first.is_ascii_digit() => true,
        ['.', second, ..] => second.is_ascii_digit(),
        _ => false,
    }
}

/// Per-architecture rewrite when `per_arch` is populated, otherwise a
/// pattern replacement with the single value.
fn update_endpoint(
    doc: &mut ManifestText,
    field: &str,
    per_arch: &BTreeMap<String, String>,
    single: Option<&str>,
    single_pattern: &Regex,
    logger: &Logger,
) {
    if !per_arch.is_empty() {
        rewrite_field(doc, field, logger, |info, _| {
            info.architecture
                .as_ref()
                .and_then(|arch| per_arch.get(&arch.arch))
                .cloned()
        });
    } else if let Some(value) = single {
        let count = replace_everywhere(doc, single_pattern, &format!("{field}: {value}"));
        if count > 0 {
            logger.debug("PATCH", format!("Updated {field}"));
        }
    }
}

fn replace_everywhere(doc: &mut ManifestText, pattern: &Regex, replacement: &str) -> usize {
    let mut count = 0;
    for line in &mut doc.lines {
        if pattern.is_match(line) {
            count += 1;
            *line = pattern.replace_all(line, NoExpand(replacement)).into_owned();
        }
    }
    count
}

/// Rewrite the first `field` line of every context for which `value_for`
/// yields a value; later lines of the same field in that context are
/// removed. `value_for` receives the line info and the key column.
pub(crate) fn rewrite_field<F>(doc: &mut ManifestText, field: &str, logger: &Logger, mut value_for: F)
where
    F: FnMut(&LineInfo, usize) -> Option<String>,
{
    let infos = doc.scan();
    let mut written: HashSet<ContextKey> = HashSet::new();
    let mut output = Vec::with_capacity(doc.lines.len());
    let mut dropping_continuation = false;

    for (line, info) in doc.lines.drain(..).zip(infos) {
        if dropping_continuation {
            if info.kind == LineKind::ScalarContent {
                continue;
            }
            dropping_continuation = false;
        }

        let LineKind::Field { name, key_column, .. } = &info.kind else {
            output.push(line);
            continue;
        };
        if name != field {
            output.push(line);
            continue;
        }
        let Some(value) = value_for(&info, *key_column) else {
            output.push(line);
            continue;
        };

        if !written.insert(info.context.clone()) {
            logger.warn(
                "PATCH",
                format!("Removed duplicate {field} in {}", info.context),
            );
            dropping_continuation = true;
            continue;
        }

        let rewritten = format!("{}{field}: {value}", &line[..*key_column]);
        output.extend(rewritten.split('\n').map(str::to_string));
        dropping_continuation = true;
        logger.debug("PATCH", format!("Updated {field} in {}", info.context));
    }

    doc.lines = output;
}

/// Drop every repeat of a field within one context.
pub(crate) fn remove_duplicate_fields(doc: &mut ManifestText, logger: &Logger) {
    let infos = doc.scan();
    let mut seen: HashSet<(ContextKey, String)> = HashSet::new();
    let mut output = Vec::with_capacity(doc.lines.len());
    let mut dropping_continuation = false;

    for (line, info) in doc.lines.drain(..).zip(infos) {
        if dropping_continuation {
            if info.kind == LineKind::ScalarContent {
                continue;
            }
            dropping_continuation = false;
        }

        if let LineKind::Field {
            name,
            value,
            list_item,
            ..
        } = &info.kind
        {
            let opens_section = value.is_empty() && !*list_item;
            if !opens_section && !seen.insert((info.context.clone(), name.clone())) {
                logger.warn(
                    "CLEANUP",
                    format!("Removed duplicate {name} in {}", info.context),
                );
                dropping_continuation = true;
                continue;
            }
        }
        output.push(line);
    }

    doc.lines = output;
}

/// Collapse runs of blank lines outside scalar bodies to a single one.
pub(crate) fn collapse_blank_runs(doc: &mut ManifestText) {
    let infos = doc.scan();
    let mut output = Vec::with_capacity(doc.lines.len());
    let mut previous_blank = false;
    for (line, info) in doc.lines.drain(..).zip(infos) {
        let blank = info.kind == LineKind::Blank;
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        output.push(line);
    }
    doc.lines = output;
}

/// `\n` line endings, no leading blank lines, no trailing whitespace.
pub fn normalize_notes(notes: &str) -> String {
    let unified = notes.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = unified.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|l| !l.is_empty()).map_or(start, |i| i + 1);
    lines[start..end].join("\n")
}

/// `|-` header plus body lines indented to `indent` spaces.
fn literal_block(notes: &str, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let header = if notes.starts_with([' ', '\t']) {
        "|2-"
    } else {
        "|-"
    };
    let mut block = String::from(header);
    for line in notes.split('\n') {
        block.push('\n');
        if !line.is_empty() {
            block.push_str(&pad);
            block.push_str(line);
        }
    }
    block
}

fn is_sha256(value: &str, field: &str, logger: &Logger) -> bool {
    let valid = SHA256_HEX.is_match(value);
    if !valid {
        logger.warn(
            "PATCH",
            format!("Ignoring malformed {field} value `{value}`"),
        );
    }
    valid
}

pub(crate) fn valid_hashes(hashes: &BTreeMap<String, String>, logger: &Logger) -> BTreeMap<String, String> {
    hashes
        .iter()
        .filter(|(_, hash)| is_sha256(hash, "InstallerSha256", logger))
        .map(|(arch, hash)| (arch.clone(), hash.clone()))
        .collect()
}
