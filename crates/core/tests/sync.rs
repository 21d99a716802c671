//! End-to-end project sync against the in-memory store

use std::path::Path;
use std::sync::{Arc, Mutex};

use bsync_core::{
    Error, ItemEvent, MemoryStore, ProgressSink, ProjectNamespace, SyncOrchestrator, TransferPhase,
    VersioningMode, to_local_relative_path, to_remote_key,
};
use tempfile::TempDir;

#[derive(Default)]
struct ItemLog {
    items: Mutex<Vec<ItemEvent>>,
}

impl ProgressSink for ItemLog {
    fn on_item(&self, event: &ItemEvent) {
        self.items.lock().unwrap().push(event.clone());
    }
}

fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

fn project() -> ProjectNamespace {
    ProjectNamespace::new("proj").unwrap()
}

#[test]
fn path_mapping_round_trips() {
    for relative in ["a.txt", "sub/b.txt", "deep/er/c d.txt", "unicode/файл.txt"] {
        let key = to_remote_key("proj", relative);
        assert_eq!(to_local_relative_path("proj", &key).unwrap(), relative);
    }
    assert_eq!(to_remote_key("proj", "sub\\b.txt"), "proj/sub/b.txt");
}

#[tokio::test]
async fn upload_puts_every_file_under_the_namespace() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "alpha");
    write(temp.path(), "sub/b.txt", "beta");

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let summary = sync.upload_project(&project(), temp.path()).await.unwrap();

    assert_eq!(summary.transferred, 2);
    assert_eq!(store.puts(), vec!["proj/a.txt", "proj/sub/b.txt"]);
    assert_eq!(store.current("proj/sub/b.txt").unwrap(), b"beta");
}

#[tokio::test]
async fn upload_leaves_partial_downloads_behind() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "alpha");
    write(temp.path(), "b.txt.bsync-part", "half written");

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let summary = sync.upload_project(&project(), temp.path()).await.unwrap();

    assert_eq!(summary.transferred, 1);
    assert_eq!(store.puts(), vec!["proj/a.txt"]);
}

#[tokio::test]
async fn upload_aborts_on_first_failure() {
    let temp = TempDir::new().unwrap();
    for name in ["1.txt", "2.txt", "3.txt", "4.txt", "5.txt"] {
        write(temp.path(), name, name);
    }

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    store.fail_put("proj/3.txt");
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let err = sync
        .upload_project(&project(), temp.path())
        .await
        .unwrap_err();

    match &err {
        Error::Transfer { phase, key, .. } => {
            assert_eq!(*phase, TransferPhase::Upload);
            assert_eq!(key, "proj/3.txt");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(store.puts(), vec!["proj/1.txt", "proj/2.txt", "proj/3.txt"]);
    assert!(store.current("proj/4.txt").is_none());
    assert!(store.current("proj/5.txt").is_none());
}

#[tokio::test]
async fn download_creates_directories_and_copies_bytes() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");
    let body: Vec<u8> = (0..=255u8).cycle().take(200_000).collect();

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    store.insert("proj/x/y.txt", body.clone());
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let summary = sync.download_project(&project(), &out).await.unwrap();

    assert_eq!(summary.transferred, 1);
    assert_eq!(summary.bytes, body.len() as u64);
    assert!(out.join("x").is_dir());
    assert_eq!(std::fs::read(out.join("x").join("y.txt")).unwrap(), body);
}

#[tokio::test]
async fn download_pins_every_version_when_enabled() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new(VersioningMode::Enabled));
    let v1 = store.insert("proj/a.txt", "first");
    let v2 = store.insert("proj/a.txt", "second");

    let log = Arc::new(ItemLog::default());
    let sync = SyncOrchestrator::new(store.clone(), "bucket").with_progress(log.clone());

    let summary = sync.download_project(&project(), temp.path()).await.unwrap();
    assert_eq!(summary.transferred, 2);
    assert_eq!(summary.versioning, Some(VersioningMode::Enabled));

    let mut pinned: Vec<_> = store.gets().into_iter().map(|(_, v)| v.unwrap()).collect();
    pinned.sort();
    assert_eq!(pinned, vec![v1, v2]);

    let items = log.items.lock().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i.version_id.is_some()));
    assert_eq!(store.versioning_queries(), 1);
}

#[tokio::test]
async fn download_without_versioning_fetches_live_objects() {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new(VersioningMode::Enabled).with_failing_versioning());
    store.insert("proj/a.txt", "old");
    store.insert("proj/a.txt", "new");
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let summary = sync.download_project(&project(), temp.path()).await.unwrap();

    assert_eq!(summary.versioning, Some(VersioningMode::Unknown));
    assert_eq!(store.gets(), vec![("proj/a.txt".to_string(), None)]);
    assert_eq!(std::fs::read(temp.path().join("a.txt")).unwrap(), b"new");
}

#[tokio::test]
async fn other_namespaces_are_never_touched() {
    let temp = TempDir::new().unwrap();
    write(temp.path(), "a.txt", "mine");

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    store.insert("project/a.txt", "sibling");
    store.insert("other/b.txt", "theirs");
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    sync.upload_project(&project(), temp.path()).await.unwrap();
    let out = temp.path().join("out");
    sync.download_project(&project(), &out).await.unwrap();

    assert_eq!(store.current("project/a.txt").unwrap(), b"sibling");
    assert_eq!(store.current("other/b.txt").unwrap(), b"theirs");
    assert_eq!(store.gets(), vec![("proj/a.txt".to_string(), None)]);
    assert!(!out.join("b.txt").exists());
}

#[tokio::test]
async fn download_rejects_keys_escaping_the_root() {
    let temp = TempDir::new().unwrap();
    let out = temp.path().join("out");

    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    store.insert("proj/../escape.txt", "nope");
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    let err = sync.download_project(&project(), &out).await.unwrap_err();
    assert!(matches!(err, Error::Mapping { .. }));
    assert!(!temp.path().join("escape.txt").exists());
}

#[tokio::test]
async fn round_trip_through_the_store() {
    let source = TempDir::new().unwrap();
    write(source.path(), "notes.md", "# notes");
    write(source.path(), "src/main.rs", "fn main() {}");
    write(source.path(), "src/util/mod.rs", "");

    let target = TempDir::new().unwrap();
    let store = Arc::new(MemoryStore::new(VersioningMode::Disabled));
    let sync = SyncOrchestrator::new(store.clone(), "bucket");

    sync.upload_project(&project(), source.path()).await.unwrap();
    let summary = sync
        .download_project(&project(), target.path())
        .await
        .unwrap();

    assert_eq!(summary.transferred, 3);
    for relative in ["notes.md", "src/main.rs", "src/util/mod.rs"] {
        assert_eq!(
            std::fs::read(source.path().join(relative)).unwrap(),
            std::fs::read(target.path().join(relative)).unwrap()
        );
    }
}
