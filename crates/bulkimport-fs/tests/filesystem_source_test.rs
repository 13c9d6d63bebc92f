//! Enumeration tests for the filesystem source against real directory trees

use bulkimport_fs::{FilesystemImportSource, PARAM_METADATA_SUFFIX, PARAM_SOURCE_DIRECTORY};
use bulkimport_types::{
    ConfigurationError, ImportSource, ItemKind, ItemStream, SourceConfig, StreamEntry, Version,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config_for(root: &Path) -> SourceConfig {
    SourceConfig::new().with(PARAM_SOURCE_DIRECTORY, root.display().to_string())
}

async fn collect(mut stream: Box<dyn ItemStream>) -> Vec<StreamEntry> {
    let mut entries = Vec::new();
    while let Some(entry) = stream.next_item().await {
        entries.push(entry);
    }
    stream.close().await;
    entries
}

fn summarize(entries: &[StreamEntry]) -> Vec<String> {
    entries
        .iter()
        .map(|entry| match entry {
            Ok(item) => format!("{} {}@{}", item.kind, item.target_path, item.version),
            Err(e) => format!("error {}", e.reference.rsplit('/').next().unwrap_or("")),
        })
        .collect()
}

#[tokio::test]
async fn test_versions_share_identity_in_ascending_order() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("report.2.txt"), "second").unwrap();
    fs::write(temp_dir.path().join("report.txt"), "first").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(temp_dir.path())).await.unwrap()).await;

    assert_eq!(
        summarize(&entries),
        vec!["document report.txt@1", "document report.txt@2"]
    );

    let first = entries[0].as_ref().unwrap();
    let content = first.content.as_ref().unwrap();
    assert_eq!(content.size_bytes(), 5);
    assert!(content.origin().unwrap().ends_with("report.txt"));
    assert_eq!(entries[1].as_ref().unwrap().size_bytes(), 6);
}

#[tokio::test]
async fn test_parents_precede_children() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("b/inner")).unwrap();
    fs::create_dir_all(root.join("a")).unwrap();
    fs::write(root.join("a/one.txt"), "1").unwrap();
    fs::write(root.join("b/inner/deep.txt"), "deep").unwrap();
    fs::write(root.join("b/two.txt"), "2").unwrap();
    fs::write(root.join("top.txt"), "top").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;
    let summary = summarize(&entries);

    assert_eq!(
        summary,
        vec![
            "folder a@1",
            "folder b@1",
            "document top.txt@1",
            "document a/one.txt@1",
            "folder b/inner@1",
            "document b/two.txt@1",
            "document b/inner/deep.txt@1",
        ]
    );

    let folder = entries[0].as_ref().unwrap();
    assert_eq!(folder.kind, ItemKind::Folder);
    assert!(folder.content.is_none());
}

#[tokio::test]
async fn test_sidecar_metadata_becomes_properties() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir(root.join("contracts")).unwrap();
    fs::write(
        root.join("contracts.metadata.json"),
        r#"{"cm:title": "Contracts"}"#,
    )
    .unwrap();
    fs::write(root.join("contracts/lease.2.pdf"), "%PDF").unwrap();
    fs::write(
        root.join("contracts/lease.2.pdf.metadata.json"),
        r#"{"cm:author": "Legal", "cm:taggable": ["lease", "2024"]}"#,
    )
    .unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(
        summarize(&entries),
        vec!["folder contracts@1", "document contracts/lease.pdf@2"]
    );

    let folder = entries[0].as_ref().unwrap();
    assert_eq!(folder.properties.first("cm:title"), Some("Contracts"));

    let lease = entries[1].as_ref().unwrap();
    assert_eq!(lease.properties.first("cm:author"), Some("Legal"));
    assert_eq!(lease.properties.get("cm:taggable").unwrap().len(), 2);
}

#[tokio::test]
async fn test_broken_sidecar_fails_only_its_item() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("a.txt"), "a").unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();
    fs::write(root.join("b.txt.metadata.json"), "{ not json").unwrap();
    fs::write(root.join("c.txt"), "c").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(
        summarize(&entries),
        vec![
            "document a.txt@1",
            "error b.txt.metadata.json",
            "document c.txt@1",
        ]
    );
    let error = entries[1].as_ref().unwrap_err();
    assert!(error.message.contains("malformed metadata file"));
}

#[tokio::test]
async fn test_contents_of_failed_folder_are_reported_not_emitted() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::create_dir_all(root.join("docs/drafts")).unwrap();
    fs::write(root.join("docs.metadata.json"), "[1, 2").unwrap();
    fs::write(root.join("docs/readme.txt"), "hello").unwrap();
    fs::write(root.join("docs/drafts/plan.txt"), "plan").unwrap();
    fs::write(root.join("other.txt"), "other").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(
        summarize(&entries),
        vec![
            "error docs.metadata.json",
            "document other.txt@1",
            "error drafts",
            "error readme.txt",
            "error plan.txt",
        ]
    );
    let nested = entries[4].as_ref().unwrap_err();
    assert!(nested.message.contains("parent folder 'docs' failed to enumerate"));
}

#[cfg(unix)]
#[tokio::test]
async fn test_unreadable_entry_drops_its_sidecar() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    std::os::unix::fs::symlink(root.join("missing.txt"), root.join("a.txt")).unwrap();
    fs::write(root.join("a.txt.metadata.json"), r#"{"cm:title": "A"}"#).unwrap();
    fs::write(root.join("b.txt"), "b").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(summarize(&entries), vec!["error a.txt", "document b.txt@1"]);
}

#[tokio::test]
async fn test_custom_metadata_suffix() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("notes.txt"), "n").unwrap();
    fs::write(root.join("notes.txt.props"), r#"{"cm:title": "Notes"}"#).unwrap();
    fs::write(root.join("notes.txt.metadata.json"), r#"{"cm:title": "Ignored"}"#).unwrap();

    let source = FilesystemImportSource::new();
    let config = config_for(root).with(PARAM_METADATA_SUFFIX, ".props");
    let entries = collect(source.open(&config).await.unwrap()).await;

    assert_eq!(
        summarize(&entries),
        vec!["document notes.txt@1", "document notes.txt.metadata.json@1"]
    );
    let notes = entries[0].as_ref().unwrap();
    assert_eq!(notes.properties.first("cm:title"), Some("Notes"));
}

#[tokio::test]
async fn test_invalid_metadata_suffix_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let source = FilesystemImportSource::new();

    for suffix in ["", "meta/data.json"] {
        let error = source
            .open(&config_for(temp_dir.path()).with(PARAM_METADATA_SUFFIX, suffix))
            .await
            .err()
            .unwrap();
        assert!(matches!(
            error,
            ConfigurationError::InvalidParameter { ref name, .. } if name == PARAM_METADATA_SUFFIX
        ));
    }
}

#[tokio::test]
async fn test_metadata_only_items() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(
        root.join("placeholder.doc.metadata.json"),
        r#"{"cm:title": "Placeholder"}"#,
    )
    .unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(summarize(&entries), vec!["document placeholder.doc@1"]);
    let item = entries[0].as_ref().unwrap();
    assert!(item.content.is_none());
    assert_eq!(item.properties.first("cm:title"), Some("Placeholder"));
}

#[tokio::test]
async fn test_duplicate_versions_are_reported() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("report.txt"), "implicit").unwrap();
    fs::write(root.join("report.1.txt"), "explicit").unwrap();

    let source = FilesystemImportSource::new();
    let entries = collect(source.open(&config_for(root)).await.unwrap()).await;

    assert_eq!(entries.len(), 2);
    assert_eq!(entries.iter().filter(|entry| entry.is_ok()).count(), 1);
    let error = entries
        .iter()
        .find_map(|entry| entry.as_ref().err())
        .unwrap();
    assert!(error.message.contains("duplicate version 1 of 'report.txt'"));
}

#[tokio::test]
async fn test_suffix_scheme_and_hidden_entries() {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    fs::write(root.join("report.txt"), "1").unwrap();
    fs::write(root.join("report.txt.v2"), "2").unwrap();
    fs::write(root.join(".hidden"), "h").unwrap();

    let source = FilesystemImportSource::new();
    let config = config_for(root).with("version-scheme", "suffix");
    let entries = collect(source.open(&config).await.unwrap()).await;
    assert_eq!(
        summarize(&entries),
        vec!["document report.txt@1", "document report.txt@2"]
    );

    let config = config_for(root).with("include-hidden", "true");
    let entries = collect(source.open(&config).await.unwrap()).await;
    assert_eq!(
        summarize(&entries),
        vec![
            "document .hidden@1",
            "document report.txt@1",
            "document report.txt.v2@1",
        ]
    );
}

#[tokio::test]
async fn test_configuration_is_validated_before_enumeration() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("plain.txt");
    fs::write(&file, "x").unwrap();
    let source = FilesystemImportSource::new();

    let missing = source.open(&SourceConfig::new()).await.err().unwrap();
    assert_eq!(
        missing,
        ConfigurationError::MissingParameter(PARAM_SOURCE_DIRECTORY.to_string())
    );

    let not_found = source
        .open(&config_for(&temp_dir.path().join("nope")))
        .await
        .err()
        .unwrap();
    assert!(matches!(
        not_found,
        ConfigurationError::InvalidParameter { ref name, .. } if name == PARAM_SOURCE_DIRECTORY
    ));

    let not_a_directory = source.open(&config_for(&file)).await.err().unwrap();
    assert!(not_a_directory.to_string().contains("is not a directory"));

    let bad_scheme = source
        .open(&config_for(temp_dir.path()).with("version-scheme", "dates"))
        .await
        .err()
        .unwrap();
    assert!(bad_scheme.to_string().contains("version-scheme"));
}

#[tokio::test]
async fn test_closed_stream_is_exhausted() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
    fs::write(temp_dir.path().join("b.txt"), "b").unwrap();

    let source = FilesystemImportSource::new();
    let mut stream = source.open(&config_for(temp_dir.path())).await.unwrap();

    assert!(stream.next_item().await.is_some());
    stream.close().await;
    assert!(stream.next_item().await.is_none());
}

#[test]
fn test_version_defaults() {
    assert_eq!(Version::default(), Version::INITIAL);
}
