/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::patch::context
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Classify every line of a manifest and attach the context it
    lives in (top level, named section, architecture block, or
    list item) without building a YAML tree.

  Security / Safety Notes:
    Pure text analysis.

  Dependencies:
    regex for key detection.

  Operational Scope:
    Re-run by every patch step over the current line buffer.

  Revision History:
    2026-10-18 COD  Authored indentation-stack line scanner.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Context identity is a typed key, never a formatted string
    - Block scalar bodies are opaque to field matching
============================================================*/

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent> *)(?P<dash>-[ ]+)?(?P<key>[A-Za-z_][A-Za-z0-9_.-]*):(?:[ \t]+(?P<value>.*?))?[ \t]*$")
        .expect("valid field regex")
});

static BLOCK_INDICATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[|>][0-9+-]*(?:[ \t]+#.*)?$").expect("valid indicator regex"));

/// Where a line sits, for once-per-context rewrites and duplicate detection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ContextKey {
    TopLevel,
    /// Fields under a key with no inline value, opened on `line`.
    Section { name: String, line: usize },
    /// `index` counts installer entries from 1 across the file.
    ArchitectureBlock { index: usize, arch: String },
    /// A list entry whose dash sits at `indent`, opened on `line`.
    ListItem { indent: usize, line: usize },
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextKey::TopLevel => f.write_str("top level"),
            ContextKey::Section { name, .. } => write!(f, "{name} section"),
            ContextKey::ArchitectureBlock { index, arch } => {
                write!(f, "{arch} installer (entry {index})")
            }
            ContextKey::ListItem { line, .. } => write!(f, "list item at line {}", line + 1),
        }
    }
}

/// The architecture entry a line belongs to, at any depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchitectureRef {
    pub index: usize,
    pub arch: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Blank,
    Comment,
    Field {
        name: String,
        /// Inline value with surrounding whitespace removed; empty for
        /// section openers.
        value: String,
        /// Byte offset of the key; everything before it is indentation
        /// and an optional list dash.
        key_column: usize,
        list_item: bool,
    },
    /// Body of a block scalar or continuation of a multi-line value.
    ScalarContent,
    Other,
}

#[derive(Debug, Clone)]
pub struct LineInfo {
    pub kind: LineKind,
    pub context: ContextKey,
    pub architecture: Option<ArchitectureRef>,
    pub in_apps_entries: bool,
}

impl LineInfo {
    /// Field name when the line is `Name: value` or `- Name: value`.
    pub fn field_name(&self) -> Option<&str> {
        match &self.kind {
            LineKind::Field { name, .. } => Some(name.as_str()),
            _ => None,
        }
    }

    pub fn is_field(&self, field: &str) -> bool {
        self.field_name() == Some(field)
    }

    /// Byte offset where the key starts.
    pub fn key_column(&self) -> Option<usize> {
        match &self.kind {
            LineKind::Field { key_column, .. } => Some(*key_column),
            _ => None,
        }
    }
}

/// Parsed `key: value` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLine {
    pub name: String,
    pub value: String,
    pub indent: usize,
    pub key_column: usize,
    pub list_item: bool,
}

/// Recognise `Key: value`, `Key:` and `- Key: value` lines.
pub fn parse_field(line: &str) -> Option<FieldLine> {
    let caps = FIELD.captures(line)?;
    let indent = caps.name("indent").map_or(0, |m| m.len());
    let dash = caps.name("dash").map_or(0, |m| m.len());
    let value = caps.name("value").map_or("", |m| m.as_str());
    let value = if value.starts_with('#') { "" } else { value };
    Some(FieldLine {
        name: caps["key"].to_string(),
        value: value.to_string(),
        indent,
        key_column: indent + dash,
        list_item: dash > 0,
    })
}

/// Whether a field value opens a literal or folded block scalar.
pub fn is_block_indicator(value: &str) -> bool {
    BLOCK_INDICATOR.is_match(value)
}

/// Bare scalar from a field value: quotes and trailing comment dropped.
pub fn plain_value(value: &str) -> &str {
    let value = value.split(" #").next().unwrap_or(value).trim();
    value.trim_matches(|c| c == '\'' || c == '"')
}

#[derive(Debug, Clone)]
enum FrameKind {
    Section { name: String, line: usize },
    Architecture(ArchitectureRef),
    Item { line: usize },
}

#[derive(Debug, Clone)]
struct Frame {
    column: usize,
    kind: FrameKind,
}

impl Frame {
    fn is_list(&self) -> bool {
        !matches!(self.kind, FrameKind::Section { .. })
    }
}

/// Classify each line and resolve its context.
pub fn scan<S: AsRef<str>>(lines: &[S]) -> Vec<LineInfo> {
    let mut frames: Vec<Frame> = Vec::new();
    let mut continuation_owner: Option<usize> = None;
    let mut installer_entries = 0;
    let mut infos = Vec::with_capacity(lines.len());

    for (index, raw) in lines.iter().enumerate() {
        let line = raw.as_ref();
        let trimmed = line.trim_start_matches(' ');
        let indent = line.len() - trimmed.len();

        if let Some(owner) = continuation_owner {
            let continues = if trimmed.trim().is_empty() {
                next_content_indent(lines, index + 1).is_some_and(|next| next > owner)
            } else {
                indent > owner
            };
            if continues {
                infos.push(describe(LineKind::ScalarContent, &frames));
                continue;
            }
            continuation_owner = None;
        }

        if trimmed.trim().is_empty() {
            infos.push(describe(LineKind::Blank, &frames));
            continue;
        }
        if trimmed.starts_with('#') {
            infos.push(describe(LineKind::Comment, &frames));
            continue;
        }

        let Some(field) = parse_field(line) else {
            if trimmed == "-" || trimmed.starts_with("- ") {
                pop_for_list_item(&mut frames, indent);
            }
            infos.push(describe(LineKind::Other, &frames));
            continue;
        };

        if field.list_item {
            pop_for_list_item(&mut frames, field.indent);
            let kind = if under_installers(&frames) {
                match entry_architecture(lines, index, &field) {
                    Some(arch) => {
                        installer_entries += 1;
                        FrameKind::Architecture(ArchitectureRef {
                            index: installer_entries,
                            arch,
                        })
                    }
                    None => FrameKind::Item { line: index },
                }
            } else {
                FrameKind::Item { line: index }
            };
            frames.push(Frame {
                column: field.indent,
                kind,
            });
        } else {
            while frames
                .last()
                .is_some_and(|frame| frame.column >= field.key_column)
            {
                frames.pop();
            }
        }

        let opens_section = field.value.is_empty() && !field.list_item;
        let opens_scalar = !field.value.is_empty();
        let kind = LineKind::Field {
            name: field.name.clone(),
            value: field.value.clone(),
            key_column: field.key_column,
            list_item: field.list_item,
        };
        infos.push(describe(kind, &frames));

        if opens_section {
            frames.push(Frame {
                column: field.key_column,
                kind: FrameKind::Section {
                    name: field.name,
                    line: index,
                },
            });
        } else if opens_scalar {
            continuation_owner = Some(field.key_column);
        }
    }

    infos
}

fn describe(kind: LineKind, frames: &[Frame]) -> LineInfo {
    let context = match frames.last() {
        None => ContextKey::TopLevel,
        Some(frame) => match &frame.kind {
            FrameKind::Section { name, line } => ContextKey::Section {
                name: name.clone(),
                line: *line,
            },
            FrameKind::Architecture(arch) => ContextKey::ArchitectureBlock {
                index: arch.index,
                arch: arch.arch.clone(),
            },
            FrameKind::Item { line } => ContextKey::ListItem {
                indent: frame.column,
                line: *line,
            },
        },
    };
    let architecture = frames.iter().rev().find_map(|frame| match &frame.kind {
        FrameKind::Architecture(arch) => Some(arch.clone()),
        _ => None,
    });
    let in_apps_entries = frames.iter().any(|frame| {
        matches!(&frame.kind, FrameKind::Section { name, .. } if name == "AppsAndFeaturesEntries")
    });
    LineInfo {
        kind,
        context,
        architecture,
        in_apps_entries,
    }
}

/// A dash at `column` closes sibling entries and any deeper mapping.
fn pop_for_list_item(frames: &mut Vec<Frame>, column: usize) {
    while let Some(frame) = frames.last() {
        let closes = if frame.is_list() {
            frame.column >= column
        } else {
            frame.column > column
        };
        if !closes {
            break;
        }
        frames.pop();
    }
}

fn under_installers(frames: &[Frame]) -> bool {
    matches!(
        frames.last(),
        Some(Frame { kind: FrameKind::Section { name, .. }, .. }) if name == "Installers"
    )
}

/// `Architecture` value of the installer entry opened at `start`.
fn entry_architecture<S: AsRef<str>>(lines: &[S], start: usize, opener: &FieldLine) -> Option<String> {
    if opener.name == "Architecture" {
        return Some(plain_value(&opener.value).to_string()).filter(|a| !a.is_empty());
    }
    for raw in &lines[start + 1..] {
        let line = raw.as_ref();
        let trimmed = line.trim_start_matches(' ');
        if trimmed.trim().is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - trimmed.len();
        if indent <= opener.indent {
            break;
        }
        if indent != opener.key_column {
            continue;
        }
        if let Some(field) = parse_field(line) {
            if field.name == "Architecture" && !field.list_item {
                return Some(plain_value(&field.value).to_string()).filter(|a| !a.is_empty());
            }
        }
    }
    None
}

fn next_content_indent<S: AsRef<str>>(lines: &[S], from: usize) -> Option<usize> {
    lines.get(from..)?.iter().find_map(|raw| {
        let line = raw.as_ref();
        let trimmed = line.trim_start_matches(' ');
        (!trimmed.trim().is_empty()).then(|| line.len() - trimmed.len())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const INSTALLER: &str = "\
PackageIdentifier: UniKey.UniKey
PackageVersion: 4.6.230919
InstallerType: zip
Installers:
- Architecture: x64
  NestedInstallerType: portable
  NestedInstallerFiles:
  - RelativeFilePath: UniKeyNT.exe
  InstallerUrl: https://unikey.org/x64.zip
  InstallerSha256: AAAA
- Architecture: x86
  InstallerUrl: https://unikey.org/x86.zip
  InstallerSha256: BBBB
ManifestType: installer
ManifestVersion: 1.10.0
";

    fn lines(text: &str) -> Vec<&str> {
        text.lines().collect()
    }

    #[test]
    fn parses_plain_and_list_fields() {
        let field = parse_field("  - ProductCode: '{ABC}'").unwrap();
        assert_eq!(field.name, "ProductCode");
        assert_eq!(field.value, "'{ABC}'");
        assert_eq!(field.indent, 2);
        assert_eq!(field.key_column, 4);
        assert!(field.list_item);

        let field = parse_field("Installers:").unwrap();
        assert!(field.value.is_empty());
        assert!(parse_field("  just text").is_none());
        assert!(parse_field("https://example.com").is_none());
        assert_eq!(parse_field("Tags: # none").unwrap().value, "");
    }

    #[test]
    fn tracks_architecture_blocks() {
        let text = lines(INSTALLER);
        let infos = scan(&text);

        assert_eq!(infos[2].context, ContextKey::TopLevel);
        assert_eq!(
            infos[4].context,
            ContextKey::ArchitectureBlock {
                index: 1,
                arch: "x64".into()
            }
        );
        assert_eq!(infos[8].architecture.as_ref().unwrap().arch, "x64");
        assert_eq!(infos[8].context, infos[4].context);
        assert_eq!(
            infos[7].context,
            ContextKey::ListItem { indent: 2, line: 7 }
        );
        assert_eq!(infos[7].architecture.as_ref().unwrap().index, 1);
        assert_eq!(
            infos[11].context,
            ContextKey::ArchitectureBlock {
                index: 2,
                arch: "x86".into()
            }
        );
        assert_eq!(infos[13].context, ContextKey::TopLevel);
        assert!(infos[13].architecture.is_none());
    }

    #[test]
    fn architecture_need_not_open_the_entry() {
        let text = lines(
            "Installers:\n- Scope: user\n  Architecture: arm64\n  InstallerUrl: https://x\n",
        );
        let infos = scan(&text);
        assert_eq!(
            infos[3].context,
            ContextKey::ArchitectureBlock {
                index: 1,
                arch: "arm64".into()
            }
        );
    }

    #[test]
    fn block_scalar_bodies_are_opaque() {
        let text = lines(
            "ReleaseNotes: |-\n  Fixed: crash\n\n  - Added: thing\nReleaseNotesUrl: https://x\n\n\nTags:\n",
        );
        let infos = scan(&text);
        assert!(infos[0].is_field("ReleaseNotes"));
        assert_eq!(infos[1].kind, LineKind::ScalarContent);
        assert_eq!(infos[2].kind, LineKind::ScalarContent);
        assert_eq!(infos[3].kind, LineKind::ScalarContent);
        assert!(infos[4].is_field("ReleaseNotesUrl"));
        assert_eq!(infos[5].kind, LineKind::Blank);
        assert_eq!(infos[6].kind, LineKind::Blank);
    }

    #[test]
    fn apps_entries_inside_installer_keep_architecture() {
        let text = lines(
            "Installers:\n- Architecture: x86\n  AppsAndFeaturesEntries:\n  - ProductCode: '{A}'\n    DisplayName: App\n",
        );
        let infos = scan(&text);
        assert!(infos[3].in_apps_entries);
        assert_eq!(infos[3].architecture.as_ref().unwrap().arch, "x86");
        assert_eq!(infos[3].context, ContextKey::ListItem { indent: 2, line: 3 });
        assert_eq!(infos[4].context, infos[3].context);
        assert!(!infos[2].in_apps_entries);
    }

    #[test]
    fn nested_sections_are_distinct_per_entry() {
        let text = lines(
            "Installers:\n- Architecture: x64\n  InstallerSwitches:\n    Silent: /S\n- Architecture: x86\n  InstallerSwitches:\n    Silent: /S\n",
        );
        let infos = scan(&text);
        assert_ne!(infos[3].context, infos[6].context);
    }

    #[test]
    fn indicator_and_plain_value_helpers() {
        assert!(is_block_indicator("|-"));
        assert!(is_block_indicator("|2-"));
        assert!(is_block_indicator(">"));
        assert!(!is_block_indicator("|x"));
        assert_eq!(plain_value("'{GUID}'"), "{GUID}");
        assert_eq!(plain_value("x64 # primary"), "x64");
    }
}
