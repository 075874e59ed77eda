/*============================================================
  Synavera Project: Syn-Winget
  Module: synwinget::resolver::template
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Render installer and release-notes URL templates from the
    resolved version and resolver metadata.

  Security / Safety Notes:
    Pure string computation.

  Dependencies:
    regex for placeholder detection.

  Operational Scope:
    Called once per architecture by the resolve stage.

  Revision History:
    2026-10-18 COD  Authored placeholder renderer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Unknown placeholders are errors, never silent blanks
============================================================*/

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::error::{Result, SynwingetError};
use crate::version::{version_major, version_major_minor, version_no_dots, version_short};

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("valid placeholder regex"));

/// Placeholder table for a version plus resolver metadata.
///
/// Metadata keys never shadow the built-in version forms.
pub fn template_vars(
    version: &str,
    metadata: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut vars = metadata.clone();
    vars.insert("version".into(), version.to_string());
    vars.insert("versionShort".into(), version_short(version).to_string());
    vars.insert("versionNoDots".into(), version_no_dots(version));
    vars.insert("versionMajor".into(), version_major(version).to_string());
    vars.insert("versionMajorMinor".into(), version_major_minor(version));
    vars
}

/// Substitute every `{name}` in `template`.
pub fn render_template(template: &str, vars: &BTreeMap<String, String>) -> Result<String> {
    let mut missing: Vec<String> = Vec::new();
    let rendered = PLACEHOLDER.replace_all(template, |caps: &Captures| {
        let key = &caps[1];
        match vars.get(key) {
            Some(value) => value.clone(),
            None => {
                missing.push(key.to_string());
                caps[0].to_string()
            }
        }
    });
    if !missing.is_empty() {
        return Err(SynwingetError::Config(format!(
            "Template `{template}` references unknown placeholder(s): {}",
            missing.join(", ")
        )));
    }
    Ok(rendered.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_version_forms_and_metadata() {
        let mut metadata = BTreeMap::new();
        metadata.insert("rcversion".to_string(), "46RC2".to_string());
        metadata.insert("build".to_string(), "250531".to_string());
        let vars = template_vars("4.6.250531", &metadata);
        let url = render_template(
            "https://unikey.org/assets/release/unikey{rcversion}-{build}-arm64.zip",
            &vars,
        )
        .unwrap();
        assert_eq!(
            url,
            "https://unikey.org/assets/release/unikey46RC2-250531-arm64.zip"
        );

        let vars = template_vars("7.5.4.0", &BTreeMap::new());
        assert_eq!(
            render_template("v{versionShort}/{versionNoDots}/{versionMajor}/{versionMajorMinor}", &vars)
                .unwrap(),
            "v7.5.4/7540/7/7.5"
        );
    }

    #[test]
    fn metadata_cannot_shadow_version() {
        let mut metadata = BTreeMap::new();
        metadata.insert("version".to_string(), "bogus".to_string());
        let vars = template_vars("1.2.3", &metadata);
        assert_eq!(render_template("{version}", &vars).unwrap(), "1.2.3");
    }

    #[test]
    fn unknown_placeholder_is_an_error() {
        let vars = template_vars("1.2.3", &BTreeMap::new());
        let err = render_template("https://x/{missing}.exe", &vars).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
