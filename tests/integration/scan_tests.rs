use dupetree::duplicates::GroupKey;
use dupetree::orchestrator::{
    ScanConfig, ScanError, ScanFailure, ScanOrchestrator, ScanOutcome, ScanReport, ScanStatus,
};
use dupetree::scanner::{TraversalConfig, TraversalError};
use dupetree::source::{
    DirectSource, DocumentEntry, DocumentResolver, HandleSource, Locator, ManifestBuilder,
    ManifestResolver, ResolverError, SourceError, TreeSource,
};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;

const TIMEOUT: Duration = Duration::from_secs(30);

fn write_file(path: &Path, bytes: usize) {
    File::create(path)
        .unwrap()
        .write_all(&vec![b'x'; bytes])
        .unwrap();
}

fn scan(root: Locator, source: Arc<dyn TreeSource>) -> ScanOutcome {
    let orchestrator = ScanOrchestrator::default();
    let mut handle = orchestrator.start_scan(root, source).unwrap();
    handle.wait_timeout(TIMEOUT).expect("scan did not finish")
}

fn scan_dir(path: &Path) -> ScanReport {
    match scan(
        Locator::Path(path.to_path_buf()),
        Arc::new(DirectSource::new()),
    ) {
        ScanOutcome::Completed(report) => report,
        other => panic!("Expected Completed, got {:?}", other),
    }
}

fn doc(id: &str) -> Locator {
    Locator::Document(id.to_string())
}

#[test]
fn test_scan_worked_example() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), 10);
    fs::create_dir(dir.path().join("b")).unwrap();
    write_file(&dir.path().join("b").join("a.txt"), 10);
    write_file(&dir.path().join("b").join("c.txt"), 5);

    let report = scan_dir(dir.path());

    let map = report.groups.display_map();
    assert_eq!(map.len(), 1);
    assert_eq!(
        map.get("a.txt | 10").unwrap(),
        &vec![
            dir.path().join("a.txt").display().to_string(),
            dir.path().join("b").join("a.txt").display().to_string(),
        ]
    );
    assert_eq!(report.summary.total_files, 3);
    assert_eq!(report.summary.containers_visited, 2);
}

#[test]
fn test_scan_empty_directory() {
    let dir = tempdir().unwrap();
    let report = scan_dir(dir.path());

    assert!(report.groups.is_empty());
    assert_eq!(report.summary.total_files, 0);
    assert_eq!(report.summary.containers_visited, 1);
    assert!(!report.summary.has_unreadable());
}

#[test]
fn test_scan_same_name_different_size() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("x.txt"), 1);
    fs::create_dir(dir.path().join("d")).unwrap();
    write_file(&dir.path().join("d").join("x.txt"), 2);

    let report = scan_dir(dir.path());
    assert!(report.groups.is_empty());
    assert_eq!(report.summary.total_files, 2);
}

#[test]
fn test_scan_same_content_different_name() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("one.txt"), 4);
    write_file(&dir.path().join("two.txt"), 4);

    let report = scan_dir(dir.path());
    assert!(report.groups.is_empty());
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempdir().unwrap();
    for sub in ["a", "b", "c"] {
        fs::create_dir(dir.path().join(sub)).unwrap();
        write_file(&dir.path().join(sub).join("same.bin"), 64);
        write_file(&dir.path().join(sub).join(format!("{}.bin", sub)), 8);
    }

    let first = scan_dir(dir.path());
    let second = scan_dir(dir.path());

    assert_eq!(first.groups, second.groups);
    assert_eq!(first.groups.len(), 1);
    assert_eq!(
        first
            .groups
            .get(&GroupKey::new("same.bin", 64))
            .unwrap()
            .len(),
        3
    );
}

#[test]
fn test_scan_reports_every_file_once() {
    let dir = tempdir().unwrap();
    let mut expected = BTreeSet::new();
    for i in 0..5 {
        let sub = dir.path().join(format!("level{}", i));
        fs::create_dir(&sub).unwrap();
        for j in 0..3 {
            let path = sub.join(format!("f{}.txt", j));
            write_file(&path, j);
            expected.insert(path);
        }
    }

    let source = DirectSource::new();
    let traversal = dupetree::scanner::Traversal::from_locator(
        &source,
        &Locator::Path(dir.path().to_path_buf()),
        TraversalConfig::default(),
    )
    .unwrap();
    let seen: Vec<_> = traversal
        .map(|r| r.unwrap().locator.as_path().unwrap().to_path_buf())
        .collect();

    assert_eq!(seen.len(), expected.len());
    assert_eq!(seen.into_iter().collect::<BTreeSet<_>>(), expected);
}

#[test]
fn test_scan_unreadable_container_degrades() {
    let resolver = ManifestBuilder::new("root")
        .directory("root", "locked", "private")
        .file("locked", "p1", "a.txt", 10)
        .directory("root", "open", "public")
        .file("open", "o1", "a.txt", 10)
        .file("open", "o2", "b.txt", 3)
        .file("root", "r1", "a.txt", 10)
        .denied("locked")
        .build()
        .unwrap();

    let outcome = scan(doc("root"), Arc::new(HandleSource::new(resolver)));
    let ScanOutcome::Completed(report) = outcome else {
        panic!("Expected Completed, got {:?}", outcome);
    };

    let members: Vec<_> = report
        .groups
        .get(&GroupKey::new("a.txt", 10))
        .unwrap()
        .iter()
        .map(|r| r.locator.clone())
        .collect();
    assert_eq!(members, vec![doc("o1"), doc("r1")]);

    assert_eq!(report.summary.unreadable.len(), 1);
    assert!(matches!(
        &report.summary.unreadable[0],
        SourceError::Unreadable { locator, .. } if locator == &doc("locked")
    ));
}

#[test]
fn test_scan_unreadable_root_fails() {
    let resolver = ManifestBuilder::new("root")
        .file("root", "f1", "a.txt", 1)
        .denied("root")
        .build()
        .unwrap();

    let outcome = scan(doc("root"), Arc::new(HandleSource::new(resolver)));
    assert!(matches!(
        outcome,
        ScanOutcome::Failed(ScanFailure::Traversal(TraversalError::RootUnreadable(_)))
    ));
}

#[test]
fn test_scan_missing_directory_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("gone");

    let outcome = scan(
        Locator::Path(missing.clone()),
        Arc::new(DirectSource::new()),
    );
    match outcome {
        ScanOutcome::Failed(failure) => {
            assert!(!failure.is_retryable());
            assert!(failure.to_string().contains("gone"));
        }
        other => panic!("Expected Failed, got {:?}", other),
    }
}

/// Serves a manifest but loses the connection after a number of queries.
struct FlakyResolver {
    inner: ManifestResolver,
    remaining: AtomicUsize,
}

impl DocumentResolver for FlakyResolver {
    fn resolve_children(&self, container: &str) -> Result<Vec<DocumentEntry>, ResolverError> {
        if self.remaining.fetch_sub(1, Ordering::SeqCst) == 0 {
            return Err(ResolverError::Unavailable {
                reason: "connection reset".into(),
            });
        }
        self.inner.resolve_children(container)
    }
}

#[test]
fn test_scan_backend_failure_yields_no_partial_result() {
    let inner = ManifestBuilder::new("root")
        .file("root", "f1", "a.txt", 1)
        .file("root", "f2", "a.txt", 1)
        .directory("root", "d1", "sub")
        .file("d1", "f3", "a.txt", 1)
        .build()
        .unwrap();
    let source = HandleSource::new(FlakyResolver {
        inner,
        remaining: AtomicUsize::new(1),
    });

    let outcome = scan(doc("root"), Arc::new(source));
    match outcome {
        ScanOutcome::Failed(ScanFailure::Traversal(TraversalError::Source(
            SourceError::BackendQuery { locator, reason },
        ))) => {
            assert_eq!(locator, doc("d1"));
            assert_eq!(reason, "connection reset");
        }
        other => panic!("Expected backend failure, got {:?}", other),
    }
}

/// Blocks each listing until the test sends a token.
struct GatedResolver {
    inner: ManifestResolver,
    gate: Mutex<mpsc::Receiver<()>>,
    calls: AtomicUsize,
}

impl DocumentResolver for GatedResolver {
    fn resolve_children(&self, container: &str) -> Result<Vec<DocumentEntry>, ResolverError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _ = self.gate.lock().unwrap().recv();
        self.inner.resolve_children(container)
    }
}

fn gated_tree() -> (mpsc::Sender<()>, Arc<HandleSource<GatedResolver>>) {
    let (tx, rx) = mpsc::channel();
    let inner = ManifestBuilder::new("root")
        .file("root", "f1", "a.txt", 1)
        .directory("root", "d1", "sub")
        .file("d1", "f2", "a.txt", 1)
        .build()
        .unwrap();
    let source = Arc::new(HandleSource::new(GatedResolver {
        inner,
        gate: Mutex::new(rx),
        calls: AtomicUsize::new(0),
    }));
    (tx, source)
}

#[test]
fn test_cancel_mid_scan_yields_cancelled() {
    let (release, source) = gated_tree();
    let orchestrator = ScanOrchestrator::default();
    let mut handle = orchestrator.start_scan(doc("root"), source.clone()).unwrap();

    // Let the root listing finish, then cancel while the worker heads for sub/
    handle.cancel();
    release.send(()).unwrap();
    drop(release);

    assert_eq!(handle.wait_timeout(TIMEOUT), Some(ScanOutcome::Cancelled));
    assert!(source.resolver().calls.load(Ordering::SeqCst) <= 1);
    assert_eq!(orchestrator.status(), ScanStatus::Cancelled);
}

#[test]
fn test_cancel_after_walk_still_cancelled() {
    // The cancel lands while the last container is being listed
    let (release, source) = gated_tree();
    let orchestrator = ScanOrchestrator::default();
    let mut handle = orchestrator.start_scan(doc("root"), source.clone()).unwrap();

    release.send(()).unwrap();
    while source.resolver().calls.load(Ordering::SeqCst) < 2 {
        std::thread::sleep(Duration::from_millis(1));
    }
    handle.cancel();
    release.send(()).unwrap();

    assert_eq!(handle.wait_timeout(TIMEOUT), Some(ScanOutcome::Cancelled));
}

#[test]
fn test_concurrent_start_rejected() {
    let (release, source) = gated_tree();
    let orchestrator = ScanOrchestrator::default();
    let handle = orchestrator.start_scan(doc("root"), source.clone()).unwrap();

    let second = orchestrator.start_scan(doc("root"), source.clone());
    assert!(matches!(second, Err(ScanError::AlreadyInProgress)));
    assert_eq!(
        second.unwrap_err().to_string(),
        "A scan is already in progress"
    );

    drop(release);
    assert!(matches!(handle.wait(), ScanOutcome::Completed(_)));

    // Free again once the first scan is done
    let (release, source) = gated_tree();
    drop(release);
    assert!(orchestrator.start_scan(doc("root"), source).is_ok());
}

#[test]
fn test_shutdown_flag_observed() {
    let dir = tempdir().unwrap();
    write_file(&dir.path().join("a.txt"), 1);

    let flag = Arc::new(AtomicBool::new(true));
    let orchestrator = ScanOrchestrator::new(ScanConfig::default().with_shutdown_flag(flag));
    let outcome = orchestrator
        .start_scan(
            Locator::Path(dir.path().to_path_buf()),
            Arc::new(DirectSource::new()),
        )
        .unwrap()
        .wait();

    assert_eq!(outcome, ScanOutcome::Cancelled);
}

#[test]
fn test_scan_with_filters() {
    let dir = tempdir().unwrap();
    fs::create_dir(dir.path().join("keep")).unwrap();
    fs::create_dir(dir.path().join("skip")).unwrap();
    fs::create_dir(dir.path().join(".cache")).unwrap();
    for sub in ["keep", "skip", ".cache"] {
        write_file(&dir.path().join(sub).join("data.bin"), 100);
        write_file(&dir.path().join(sub).join("tiny.bin"), 1);
    }
    write_file(&dir.path().join("data.bin"), 100);

    let traversal = TraversalConfig::default()
        .with_skip_hidden(true)
        .with_min_size(Some(10))
        .with_ignore_patterns(vec!["skip/".to_string()]);
    let orchestrator = ScanOrchestrator::new(ScanConfig::default().with_traversal(traversal));
    let outcome = orchestrator
        .start_scan(
            Locator::Path(dir.path().to_path_buf()),
            Arc::new(DirectSource::new()),
        )
        .unwrap()
        .wait();

    let ScanOutcome::Completed(report) = outcome else {
        panic!("Expected Completed, got {:?}", outcome);
    };
    assert_eq!(report.summary.total_files, 2);
    assert_eq!(
        report
            .groups
            .get(&GroupKey::new("data.bin", 100))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn test_scan_huge_sizes_complete() {
    let resolver = ManifestBuilder::new("root")
        .file("root", "f1", "big.iso", u64::MAX)
        .directory("root", "d1", "backup")
        .file("d1", "f2", "big.iso", u64::MAX)
        .build()
        .unwrap();

    let outcome = scan(doc("root"), Arc::new(HandleSource::new(resolver)));
    let ScanOutcome::Completed(report) = outcome else {
        panic!("Expected Completed, got {:?}", outcome);
    };

    assert_eq!(report.groups.len(), 1);
    assert!(report.groups.contains_key(&GroupKey::new("big.iso", u64::MAX)));
    assert_eq!(report.summary.total_size, u64::MAX);
    assert_eq!(report.summary.reclaimable_bytes, u64::MAX);
}
