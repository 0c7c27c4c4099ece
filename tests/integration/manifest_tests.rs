use dupetree::orchestrator::{ScanConfig, ScanOrchestrator, ScanOutcome};
use dupetree::source::{
    DocumentKind, DocumentResolver, HandleSource, Locator, ManifestBuilder, ManifestError,
    ManifestResolver, ResolverError,
};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

const DRIVE: &str = r#"{
  "root": "doc:root",
  "documents": {
    "doc:root": { "name": "Download", "kind": "directory", "children": ["doc:1", "doc:2", "doc:3"] },
    "doc:1": { "name": "a.txt", "kind": "file", "size": 10 },
    "doc:2": { "name": "photos", "kind": "directory", "children": ["doc:4"] },
    "doc:3": { "name": "private", "kind": "directory", "denied": true },
    "doc:4": { "name": "a.txt", "kind": "file", "size": 10 }
  }
}"#;

#[test]
fn test_load_manifest_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("drive.json");
    fs::write(&path, DRIVE).unwrap();

    let resolver = ManifestResolver::load(&path).unwrap();
    assert_eq!(resolver.root_id(), "doc:root");
    assert_eq!(resolver.root_locator(), Locator::Document("doc:root".into()));
    assert_eq!(resolver.document_count(), 5);

    let children = resolver.resolve_children("doc:root").unwrap();
    let names: Vec<_> = children.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["a.txt", "photos", "private"]);
    assert_eq!(children[1].kind, DocumentKind::Directory);
}

#[test]
fn test_denied_directory_refuses_listing() {
    let resolver = ManifestResolver::from_json(DRIVE).unwrap();
    assert!(matches!(
        resolver.resolve_children("doc:3"),
        Err(ResolverError::AccessDenied(id)) if id == "doc:3"
    ));
}

#[test]
fn test_listing_a_file_is_not_found() {
    let resolver = ManifestResolver::from_json(DRIVE).unwrap();
    assert!(matches!(
        resolver.resolve_children("doc:1"),
        Err(ResolverError::NotFound(_))
    ));
}

#[test]
fn test_missing_manifest_file() {
    let dir = tempdir().unwrap();
    let err = ManifestResolver::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ManifestError::Io { .. }));
}

#[test]
fn test_malformed_manifest() {
    let err = ManifestResolver::from_json("{\"root\": 1}").unwrap_err();
    assert!(matches!(err, ManifestError::Parse(_)));
}

#[test]
fn test_manifest_missing_root() {
    let err = ManifestResolver::from_json(r#"{ "root": "r", "documents": {} }"#).unwrap_err();
    assert!(matches!(err, ManifestError::MissingRoot(id) if id == "r"));
}

#[test]
fn test_manifest_root_is_file() {
    let json = r#"{ "root": "r", "documents": { "r": { "name": "x", "kind": "file", "size": 1 } } }"#;
    let err = ManifestResolver::from_json(json).unwrap_err();
    assert!(matches!(err, ManifestError::RootNotADirectory(_)));
}

#[test]
fn test_manifest_unknown_child() {
    let json = r#"{ "root": "r", "documents": {
        "r": { "name": "r", "kind": "directory", "children": ["ghost"] } } }"#;
    let err = ManifestResolver::from_json(json).unwrap_err();
    assert!(matches!(err, ManifestError::UnknownChild { child, .. } if child == "ghost"));
}

#[test]
fn test_manifest_rejects_cycles() {
    let json = r#"{ "root": "r", "documents": {
        "r": { "name": "r", "kind": "directory", "children": ["d"] },
        "d": { "name": "d", "kind": "directory", "children": ["r"] } } }"#;
    let err = ManifestResolver::from_json(json).unwrap_err();
    assert!(matches!(err, ManifestError::MultipleParents(id) if id == "r"));
}

#[test]
fn test_manifest_rejects_shared_child() {
    let json = r#"{ "root": "r", "documents": {
        "r": { "name": "r", "kind": "directory", "children": ["a", "b"] },
        "a": { "name": "a", "kind": "directory", "children": ["f"] },
        "b": { "name": "b", "kind": "directory", "children": ["f"] },
        "f": { "name": "f", "kind": "file", "size": 1 } } }"#;
    let err = ManifestResolver::from_json(json).unwrap_err();
    assert!(matches!(err, ManifestError::MultipleParents(id) if id == "f"));
}

#[test]
fn test_manifest_rejects_children_on_file() {
    let json = r#"{ "root": "r", "documents": {
        "r": { "name": "r", "kind": "directory", "children": ["f"] },
        "f": { "name": "f", "kind": "file", "size": 1, "children": ["g"] },
        "g": { "name": "g", "kind": "file", "size": 1 } } }"#;
    let err = ManifestResolver::from_json(json).unwrap_err();
    assert!(matches!(err, ManifestError::ChildrenOnFile(id) if id == "f"));
}

#[test]
fn test_builder_manifest_serializes_and_reloads() {
    let resolver = ManifestBuilder::new("root")
        .file("root", "f1", "a.txt", 10)
        .directory("root", "d1", "sub")
        .file("d1", "f2", "a.txt", 10)
        .denied("d1")
        .build()
        .unwrap();

    let json = serde_json::to_string(resolver.manifest()).unwrap();
    let reloaded = ManifestResolver::from_json(&json).unwrap();
    assert_eq!(reloaded.manifest(), resolver.manifest());
    assert!(reloaded.resolve_children("d1").is_err());
}

#[test]
fn test_scan_loaded_manifest() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("drive.json");
    fs::write(&path, DRIVE).unwrap();
    let resolver = ManifestResolver::load(&path).unwrap();
    let root = resolver.root_locator();

    let outcome = ScanOrchestrator::new(ScanConfig::default())
        .start_scan(root, Arc::new(HandleSource::new(resolver)))
        .unwrap()
        .wait();

    let ScanOutcome::Completed(report) = outcome else {
        panic!("expected a completed scan, got {:?}", outcome);
    };
    let display = report.groups.display_map();
    assert_eq!(display.len(), 1);
    assert_eq!(display["a.txt | 10"], vec!["doc:1", "doc:4"]);
    assert_eq!(report.summary.unreadable.len(), 1);
    assert_eq!(report.summary.total_files, 2);
}
