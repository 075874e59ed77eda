/*============================================================
  Synavera Project: Syn-Winget
  Module: tests::materialize
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Template selection and copy/patch of a full manifest triad
    inside a scratch repository tree.
============================================================*/

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use synwinget::config::{PackageConfig, RunnerConfig};
use synwinget::github::GithubClient;
use synwinget::logger::Logger;
use synwinget::materialize::{materialize, materialize_from, select_template};
use synwinget::patch::PatchRequest;

const MANIFEST_PATH: &str = "manifests/f/Foo/Bar";
const HASH: &str = "ABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD";

fn version_manifest(version: &str) -> String {
    format!(
        "PackageIdentifier: Foo.Bar\nPackageVersion: {version}\nDefaultLocale: en-US\nManifestType: version\nManifestVersion: 1.10.0\n"
    )
}

fn installer_manifest(version: &str) -> String {
    format!(
        "PackageIdentifier: Foo.Bar\nPackageVersion: {version}\nInstallerType: msi\nReleaseDate: 2025-01-01\nInstallers:\n- Architecture: x64\n  InstallerUrl: https://foo.example/{version}/bar.msi\n  InstallerSha256: 0000000000000000000000000000000000000000000000000000000000000000\n  ProductCode: '{{OLD}}'\nManifestType: installer\nManifestVersion: 1.10.0\n"
    )
}

fn locale_manifest(version: &str) -> String {
    format!(
        "PackageIdentifier: Foo.Bar\nPackageVersion: {version}\nPackageLocale: en-US\nPublisher: Foo\nPackageName: Bar\nReleaseNotes: old notes\nReleaseNotesUrl: https://foo.example/{version}\nManifestType: defaultLocale\nManifestVersion: 1.10.0\n"
    )
}

fn write_version(root: &Path, version: &str) {
    let dir = root.join(MANIFEST_PATH).join(version);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("Foo.Bar.yaml"), version_manifest(version)).unwrap();
    fs::write(dir.join("Foo.Bar.installer.yaml"), installer_manifest(version)).unwrap();
    fs::write(dir.join("Foo.Bar.locale.en-US.yaml"), locale_manifest(version)).unwrap();
}

fn scratch_repo() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    write_version(root.path(), "1.9.0");
    write_version(root.path(), "1.10.0");
    root
}

fn request() -> PatchRequest {
    let mut request = PatchRequest::for_version("1.11.0");
    request.installer_url = Some("https://foo.example/1.11.0/bar.msi".into());
    request.installer_sha256 = Some(HASH.into());
    request.product_codes.default = Some("{NEW-CODE}".into());
    request.release_notes = Some("Line one\nLine two".into());
    request.release_notes_url = Some("https://foo.example/notes/1.11.0".into());
    request.release_date = NaiveDate::from_ymd_opt(2025, 6, 1);
    request
}

fn config() -> PackageConfig {
    PackageConfig::from_yaml(&format!(
        "packageIdentifier: Foo.Bar\nmanifestPath: {MANIFEST_PATH}\ninstallerUrlTemplate: https://foo.example/{{version}}/bar.msi\n"
    ))
    .unwrap()
}

#[test]
fn template_is_highest_semantic_version() {
    let repo = scratch_repo();
    let (name, _) = select_template(&repo.path().join(MANIFEST_PATH), "1.11.0")
        .unwrap()
        .unwrap();
    assert_eq!(name, "1.10.0");
}

#[test]
fn each_file_gets_its_own_fields() {
    let repo = scratch_repo();
    let package_dir = repo.path().join(MANIFEST_PATH);
    let target = package_dir.join("1.11.0");
    let written = materialize_from(
        &package_dir.join("1.10.0"),
        &target,
        &request(),
        &Logger::quiet(),
    )
    .unwrap();
    assert_eq!(written.len(), 3);

    let version = fs::read_to_string(target.join("Foo.Bar.yaml")).unwrap();
    assert_eq!(version, version_manifest("1.11.0"));

    let installer = fs::read_to_string(target.join("Foo.Bar.installer.yaml")).unwrap();
    assert!(installer.contains("InstallerUrl: https://foo.example/1.11.0/bar.msi\n"));
    assert!(installer.contains(&format!("InstallerSha256: {HASH}\n")));
    assert!(installer.contains("ProductCode: '{NEW-CODE}'\n"));
    assert!(installer.contains("ReleaseDate: 2025-06-01\n"));
    assert!(!installer.contains("ReleaseNotes"));

    let locale = fs::read_to_string(target.join("Foo.Bar.locale.en-US.yaml")).unwrap();
    assert!(locale.contains("ReleaseNotes: |-\n  Line one\n  Line two\n"));
    assert!(locale.contains("ReleaseNotesUrl: https://foo.example/notes/1.11.0\n"));
    assert!(!locale.contains("1.10.0/"));

    let untouched = fs::read_to_string(package_dir.join("1.10.0").join("Foo.Bar.yaml")).unwrap();
    assert_eq!(untouched, version_manifest("1.10.0"));
}

#[test]
fn empty_template_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("template");
    fs::create_dir(&template).unwrap();
    fs::write(template.join("README.md"), "not a manifest").unwrap();
    let result = materialize_from(&template, &dir.path().join("out"), &request(), &Logger::quiet());
    assert!(result.is_err());
}

#[tokio::test]
async fn materialize_uses_local_template() {
    let repo = scratch_repo();
    let settings = RunnerConfig::default();
    let client = GithubClient::new(&settings, None).unwrap();
    let target = materialize(
        repo.path(),
        &config(),
        "1.11.0",
        &request(),
        &client,
        &settings,
        &Logger::quiet(),
    )
    .await
    .unwrap();
    assert_eq!(target, repo.path().join(MANIFEST_PATH).join("1.11.0"));
    assert!(target.join("Foo.Bar.installer.yaml").is_file());
}

#[tokio::test]
async fn existing_target_is_never_overwritten() {
    let repo = scratch_repo();
    let settings = RunnerConfig::default();
    let client = GithubClient::new(&settings, None).unwrap();
    let result = materialize(
        repo.path(),
        &config(),
        "1.10.0",
        &request(),
        &client,
        &settings,
        &Logger::quiet(),
    )
    .await;
    assert!(result.is_err());
    let kept = fs::read_to_string(
        repo.path()
            .join(MANIFEST_PATH)
            .join("1.10.0")
            .join("Foo.Bar.yaml"),
    )
    .unwrap();
    assert_eq!(kept, version_manifest("1.10.0"));
}

#[tokio::test]
async fn no_template_and_no_pin_is_an_error() {
    let repo = tempfile::tempdir().unwrap();
    let settings = RunnerConfig::default();
    let client = GithubClient::new(&settings, None).unwrap();
    let result = materialize(
        repo.path(),
        &config(),
        "1.0.0",
        &request(),
        &client,
        &settings,
        &Logger::quiet(),
    )
    .await;
    assert!(result.is_err());
}
