/*============================================================
  Synavera Project: Syn-Winget
  Module: tests::patch_scenarios
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    End-to-end behaviour of the manifest patch engine on
    realistic multi-architecture manifests.
============================================================*/

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rstest::rstest;
use serde_yaml::Value;

use synwinget::logger::Logger;
use synwinget::patch::{
    add_missing_architectures, existing_architectures, normalize_notes, patch_manifest,
    validate_manifest, PatchRequest,
};

const OLD_VERSION: &str = "4.6.230919";
const NEW_VERSION: &str = "4.6.250531";

const HASH_X64: &str = "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const HASH_X86: &str = "BBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
const HASH_ARM64: &str = "CCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";

const UNIKEY_INSTALLER: &str = "\
# yaml-language-server: $schema=https://aka.ms/winget-manifest.installer.1.10.0.schema.json
# UniKey 4.6.230919 portable build (tag v4.6.230919)

PackageIdentifier: UniKey.UniKey
PackageVersion: 4.6.230919
InstallerType: zip
ReleaseDate: 2023-09-19
Installers:
- Architecture: x64
  NestedInstallerType: portable
  NestedInstallerFiles:
  - RelativeFilePath: unikey-4.6.230919/UniKeyNT.exe
    PortableCommandAlias: unikey
  InstallerUrl: https://www.unikey.org/assets/release/unikey-4.6.230919-win64.zip
  InstallerSha256: OLD_HASH_X64
- Architecture: x86
  NestedInstallerType: portable
  NestedInstallerFiles:
  - RelativeFilePath: unikey-4.6.230919/UniKeyNT.exe
    PortableCommandAlias: unikey
  InstallerUrl: https://www.unikey.org/assets/release/unikey-4.6.230919-win32.zip
  InstallerSha256: OLD_HASH_X86
ManifestType: installer
ManifestVersion: 1.10.0
";

const UNIKEY_LOCALE: &str = "\
# yaml-language-server: $schema=https://aka.ms/winget-manifest.defaultLocale.1.10.0.schema.json

PackageIdentifier: UniKey.UniKey
PackageVersion: 4.6.230919
PackageLocale: en-US
Publisher: Pham Kim Long
PackageName: UniKey
License: GPL-3.0
ShortDescription: Vietnamese keyboard input
ReleaseNotes: |-
  Previous release notes
  - first point
ReleaseNotesUrl: https://www.unikey.org/changelog.html
ManifestType: defaultLocale
ManifestVersion: 1.10.0
";

fn release_date() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(2025, 6, 1)
}

fn url(arch: &str) -> String {
    let suffix = match arch {
        "x64" => "win64",
        "x86" => "win32",
        other => other,
    };
    format!("https://www.unikey.org/assets/release/unikey-{NEW_VERSION}-{suffix}.zip")
}

fn unikey_request(archs: &[(&str, &str)]) -> PatchRequest {
    let mut request = PatchRequest::for_version(NEW_VERSION);
    request.release_date = release_date();
    for (arch, hash) in archs {
        request.installer_urls.insert(arch.to_string(), url(arch));
        request.arch_hashes.insert(arch.to_string(), hash.to_string());
    }
    request
}

fn update_installer(content: &str, request: &PatchRequest) -> String {
    let logger = Logger::quiet();
    let patched = patch_manifest(content, request, &logger);
    add_missing_architectures(
        &patched,
        &request.arch_hashes,
        &request.installer_urls,
        &logger,
    )
}

#[test]
fn version_propagates_to_every_occurrence() {
    assert_eq!(UNIKEY_INSTALLER.matches(OLD_VERSION).count(), 7);
    let request = unikey_request(&[("x64", HASH_X64), ("x86", HASH_X86)]);
    let out = patch_manifest(UNIKEY_INSTALLER, &request, &Logger::quiet());
    assert_eq!(out.matches(NEW_VERSION).count(), 7);
    assert_eq!(out.matches(OLD_VERSION).count(), 0);
}

#[test]
fn unikey_release_adds_arm64() {
    let request = unikey_request(&[("x64", HASH_X64), ("x86", HASH_X86), ("arm64", HASH_ARM64)]);
    let out = update_installer(UNIKEY_INSTALLER, &request);

    assert!(!out.contains(OLD_VERSION));
    assert!(!out.contains("OLD_HASH_X64"));
    assert!(!out.contains("OLD_HASH_X86"));
    assert!(out.contains("PackageVersion: 4.6.250531\n"));
    assert!(out.contains("ReleaseDate: 2025-06-01\n"));

    assert_eq!(out.matches("- Architecture: arm64").count(), 1);
    let arm64_at = out.find("- Architecture: arm64").unwrap();
    let trailer_at = out.find("ManifestType: installer").unwrap();
    assert!(arm64_at < trailer_at);

    let arm64_block = &out[arm64_at..trailer_at];
    assert_eq!(
        arm64_block,
        format!(
            "- Architecture: arm64\n  NestedInstallerType: portable\n  NestedInstallerFiles:\n  - RelativeFilePath: unikey-{NEW_VERSION}/UniKeyNT.exe\n    PortableCommandAlias: unikey\n  InstallerUrl: {}\n  InstallerSha256: {HASH_ARM64}\n",
            url("arm64")
        )
    );
    assert!(out.ends_with("ManifestType: installer\nManifestVersion: 1.10.0\n"));
    assert!(out.starts_with("# yaml-language-server: $schema="));

    let parsed: Value = serde_yaml::from_str(&out).unwrap();
    let installers = parsed["Installers"].as_sequence().unwrap();
    assert_eq!(installers.len(), 3);
    assert_eq!(installers[0]["InstallerSha256"].as_str(), Some(HASH_X64));
    assert_eq!(installers[1]["InstallerSha256"].as_str(), Some(HASH_X86));
    assert_eq!(installers[1]["InstallerUrl"].as_str(), Some(url("x86").as_str()));
    assert_eq!(existing_architectures(&out), vec!["x64", "x86", "arm64"]);
    assert!(validate_manifest(&out).is_clean());
}

#[test]
fn duplicate_hash_in_one_block_is_collapsed() {
    let content = "\
PackageVersion: 1.0.0
Installers:
- Architecture: x64
  InstallerUrl: https://x/1.0.0/x64.exe
  InstallerSha256: OLD_FIRST
  InstallerSha256: OLD_SECOND
- Architecture: x86
  InstallerUrl: https://x/1.0.0/x86.exe
  InstallerSha256: OLD_THIRD
ManifestType: installer
";
    let mut request = PatchRequest::for_version("1.1.0");
    request.release_date = release_date();
    request.arch_hashes.insert("x64".into(), HASH_X64.into());
    request.arch_hashes.insert("x86".into(), HASH_X86.into());
    let out = patch_manifest(content, &request, &Logger::quiet());

    assert_eq!(out.matches("InstallerSha256:").count(), 2);
    assert!(!out.contains("OLD_"));
    let first = out.find("InstallerSha256:").unwrap();
    assert!(out[first..].starts_with(&format!("InstallerSha256: {HASH_X64}\n")));
    assert!(out.contains("InstallerUrl: https://x/1.1.0/x64.exe\n"));
}

#[test]
fn fields_absent_from_source_stay_absent() {
    let content = "\
PackageIdentifier: Foo.Bar
PackageVersion: 2.0
Installers:
- Architecture: x64
  InstallerUrl: https://x/2.0/setup.exe
  InstallerSha256: OLD
ManifestType: installer
";
    let mut request = PatchRequest::for_version("2.1");
    request.installer_url = Some("https://x/2.1/setup.exe".into());
    request.installer_sha256 = Some(HASH_X64.into());
    request.signature_sha256 = Some(HASH_X86.into());
    request.product_codes.default = Some("{11111111-2222-3333-4444-555555555555}".into());
    request.release_notes = Some("New things".into());
    request.release_notes_url = Some("https://x/notes".into());
    let out = patch_manifest(content, &request, &Logger::quiet());

    for ghost in [
        "ReleaseDate",
        "ReleaseNotes",
        "ProductCode",
        "SignatureSha256",
    ] {
        assert!(!out.contains(ghost), "{ghost} was invented:\n{out}");
    }
    assert!(out.contains("InstallerUrl: https://x/2.1/setup.exe\n"));
    assert_eq!(out.lines().count(), content.lines().count());
}

#[test]
fn no_op_update_only_touches_release_date() {
    let current = UNIKEY_INSTALLER
        .replace(OLD_VERSION, NEW_VERSION)
        .replace("OLD_HASH_X64", HASH_X64)
        .replace("OLD_HASH_X86", HASH_X86);
    let request = unikey_request(&[("x64", HASH_X64), ("x86", HASH_X86)]);
    let out = update_installer(&current, &request);

    assert_eq!(out.lines().count(), current.lines().count());
    assert_eq!(out, current.replace("ReleaseDate: 2023-09-19", "ReleaseDate: 2025-06-01"));
}

#[test]
fn second_pass_is_stable() {
    let request = unikey_request(&[("x64", HASH_X64), ("x86", HASH_X86), ("arm64", HASH_ARM64)]);
    let once = update_installer(UNIKEY_INSTALLER, &request);
    let twice = update_installer(&once, &request);
    assert_eq!(once, twice);
}

#[rstest]
#[case::colon_and_dash_list("Fixes:\n- Crash on startup: resolved\n- Tray icon flicker")]
#[case::markdown_heading("## What's Changed\n\n* Telex input: faster by @dev in #12\n\n**Full Changelog**: v1...v2")]
#[case::leading_indent("  indented first line\nsecond line")]
#[case::crlf_and_trailing_space("Line one   \r\nLine two\r\n\r\n")]
fn release_notes_round_trip(#[case] notes: &str) {
    let mut request = PatchRequest::for_version(NEW_VERSION);
    request.release_date = release_date();
    request.release_notes = Some(notes.to_string());
    let out = patch_manifest(UNIKEY_LOCALE, &request, &Logger::quiet());

    let parsed: Value = serde_yaml::from_str(&out).unwrap();
    assert_eq!(
        parsed["ReleaseNotes"].as_str(),
        Some(normalize_notes(notes).as_str())
    );
    assert_eq!(parsed["ReleaseNotesUrl"].as_str(), Some("https://www.unikey.org/changelog.html"));
    assert_eq!(parsed["PackageVersion"].as_str(), Some(NEW_VERSION));
    assert_eq!(out.matches("ReleaseNotes:").count(), 1);
    assert!(!out.contains("Previous release notes"));
    assert!(out.ends_with("ManifestType: defaultLocale\nManifestVersion: 1.10.0\n"));
}

#[test]
fn per_architecture_maps_leave_unknown_arches_alone() {
    let mut hashes = BTreeMap::new();
    hashes.insert("x64".to_string(), HASH_X64.to_string());
    let mut request = PatchRequest::for_version(NEW_VERSION);
    request.release_date = release_date();
    request.arch_hashes = hashes;
    let out = patch_manifest(UNIKEY_INSTALLER, &request, &Logger::quiet());

    assert!(out.contains(&format!("InstallerSha256: {HASH_X64}\n")));
    assert!(out.contains("InstallerSha256: OLD_HASH_X86\n"));
}

#[test]
fn two_part_bump_leaves_codes_and_years_alone() {
    let installer = "\
PackageIdentifier: Foo.Bar
PackageVersion: 1.0
InstallerType: msi
UpgradeCode: '{11111111-2222-3333-4444-555555555555}'
Installers:
- Architecture: x64
  InstallerUrl: https://foo.example/releases/1/bar-1.0.msi
  InstallerSha256: OLD
ManifestType: installer
ManifestVersion: 1.10.0
";
    let out = patch_manifest(installer, &PatchRequest::for_version("2.0"), &Logger::quiet());
    assert!(out.contains("UpgradeCode: '{11111111-2222-3333-4444-555555555555}'\n"));
    assert!(out.contains("InstallerUrl: https://foo.example/releases/1/bar-2.0.msi\n"));
    assert!(out.contains("PackageVersion: 2.0\n"));

    let locale = "\
PackageIdentifier: Foo.Bar
PackageVersion: 24.0
PackageLocale: en-US
Copyright: (c) 2024 Foo
ManifestType: defaultLocale
ManifestVersion: 1.10.0
";
    let out = patch_manifest(locale, &PatchRequest::for_version("25.0"), &Logger::quiet());
    assert!(out.contains("Copyright: (c) 2024 Foo\n"));
    assert!(out.contains("PackageVersion: 25.0\n"));
}
