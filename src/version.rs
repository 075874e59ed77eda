/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Parse and order upstream version strings (dotted, dated,
    hyphenated) and derive the template forms used in URLs.

  Security / Safety Notes:
    Pure computation; no I/O performed in this module.

  Dependencies:
    None beyond std.

  Operational Scope:
    Used by the resolver (upstream short-circuit), the template
    renderer, and the materializer (template selection).

  Revision History:
    2026-10-18 COD  Introduced VersionKey ordering.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Total ordering without panics on malformed input
    - Equality defined by meaning, not spelling
============================================================*/

use std::cmp::Ordering;
use std::fmt;

/// One dot/hyphen separated component of a version.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Number(u64),
    /// Non-numeric tag such as `beta` or `rc1`; sorts below any release.
    Tag(String),
}

/// Comparable form of a version string.
///
/// `1.2.3` equals `1.2.3.0`, `2025.10.13` sorts after `2025.9.30`, and
/// `2025-09-16` is read as `2025.9.16`. A trailing tag (`1.2.4-beta`) sorts
/// before the plain release.
#[derive(Debug, Clone)]
pub struct VersionKey {
    raw: String,
    segments: Vec<Segment>,
}

impl VersionKey {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .filter(|rest| rest.starts_with(|c: char| c.is_ascii_digit()))
            .unwrap_or(trimmed);

        let mut segments = Vec::new();
        for part in body.split(['.', '-', '_', '+']) {
            if part.is_empty() {
                continue;
            }
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            let suffix = &part[digits.len()..];
            if !digits.is_empty() {
                segments.push(Segment::Number(digits.parse().unwrap_or(u64::MAX)));
            }
            if !suffix.is_empty() {
                segments.push(Segment::Tag(suffix.to_ascii_lowercase()));
            }
        }

        while matches!(segments.last(), Some(Segment::Number(0))) {
            segments.pop();
        }

        Self {
            raw: trimmed.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl PartialEq for VersionKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for VersionKey {}

impl PartialOrd for VersionKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let mut left = self.segments.iter();
        let mut right = other.segments.iter();
        loop {
            match (left.next(), right.next()) {
                (None, None) => return Ordering::Equal,
                (Some(Segment::Number(a)), Some(Segment::Number(b))) => match a.cmp(b) {
                    Ordering::Equal => continue,
                    other => return other,
                },
                (Some(Segment::Tag(a)), Some(Segment::Tag(b))) => match a.cmp(b) {
                    Ordering::Equal => continue,
                    other => return other,
                },
                // A release component outranks a pre-release tag.
                (Some(Segment::Number(_)), Some(Segment::Tag(_))) => return Ordering::Greater,
                (Some(Segment::Tag(_)), Some(Segment::Number(_))) => return Ordering::Less,
                (Some(Segment::Number(_)), None) => return Ordering::Greater,
                (None, Some(Segment::Number(_))) => return Ordering::Less,
                (Some(Segment::Tag(_)), None) => return Ordering::Less,
                (None, Some(Segment::Tag(_))) => return Ordering::Greater,
            }
        }
    }
}

/// Compare two version strings semantically.
pub fn compare_versions(left: &str, right: &str) -> Ordering {
    VersionKey::parse(left).cmp(&VersionKey::parse(right))
}

/// Pick the highest version from a list of candidates.
pub fn latest_version<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .map(|raw| (VersionKey::parse(raw), raw))
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, raw)| raw)
}

/// Strip leading zeros from every numeric dot part: `7.03.51009.0` → `7.3.51009.0`.
pub fn normalize_parts(version: &str) -> String {
    version
        .split('.')
        .map(|part| {
            if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
                let trimmed = part.trim_start_matches('0');
                if trimmed.is_empty() {
                    "0".to_string()
                } else {
                    trimmed.to_string()
                }
            } else {
                part.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Strip a single trailing `.0`: `2.4.4.0` → `2.4.4`.
pub fn version_short(version: &str) -> &str {
    version.strip_suffix(".0").unwrap_or(version)
}

pub fn version_no_dots(version: &str) -> String {
    version.replace('.', "")
}

pub fn version_major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

pub fn version_major_minor(version: &str) -> String {
    version.split('.').take(2).collect::<Vec<_>>().join(".")
}

/// Append `.0` to a three-part version.
pub fn append_dot_zero(version: &str) -> String {
    if version.split('.').count() == 3 {
        format!("{version}.0")
    } else {
        version.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("1.2.3", "1.2.3.0", Ordering::Equal)]
    #[case("2025.10.13", "2025.9.30", Ordering::Greater)]
    #[case("2025-09-16", "2025.9.16", Ordering::Equal)]
    #[case("2025-09-16", "2025.10.1", Ordering::Less)]
    #[case("1.10.0", "1.9.9", Ordering::Greater)]
    #[case("1.2.4-beta", "1.2.4", Ordering::Less)]
    #[case("1.2.4-beta", "1.2.3", Ordering::Greater)]
    #[case("v7.5.4", "7.5.4.0", Ordering::Equal)]
    #[case("4.6.250531", "4.6.230919", Ordering::Greater)]
    fn orders_versions_semantically(
        #[case] left: &str,
        #[case] right: &str,
        #[case] expected: Ordering,
    ) {
        assert_eq!(compare_versions(left, right), expected);
    }

    #[test]
    fn latest_version_ignores_lexical_order() {
        let dirs = ["2025.9.30", "2025.10.13", "2025.10.2"];
        assert_eq!(latest_version(dirs), Some("2025.10.13"));
        assert_eq!(latest_version(Vec::<&str>::new()), None);
    }

    #[test]
    fn normalizes_zero_padded_parts() {
        assert_eq!(normalize_parts("7.03.51009.0"), "7.3.51009.0");
        assert_eq!(normalize_parts("10.01.100.001"), "10.1.100.1");
        assert_eq!(normalize_parts("1.0.0.0"), "1.0.0.0");
        assert_eq!(normalize_parts("2.0-rc1"), "2.0-rc1");
    }

    #[test]
    fn derives_template_forms() {
        assert_eq!(version_short("2.4.4.0"), "2.4.4");
        assert_eq!(version_short("4.6.250531"), "4.6.250531");
        assert_eq!(version_no_dots("7.5.4.0"), "7540");
        assert_eq!(version_major("7.5.4.0"), "7");
        assert_eq!(version_major_minor("7.5.4.0"), "7.5");
        assert_eq!(append_dot_zero("7.5.4"), "7.5.4.0");
        assert_eq!(append_dot_zero("7.5.4.1"), "7.5.4.1");
    }
}
