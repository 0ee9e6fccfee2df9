/*!
 * Local Store Tests
 * Host-directory mapping specifics of the local backend
 */

use std::sync::Arc;

use atelier_core::path::AbsPath;
use atelier_core::storage::{FileData, LocalDirStore, StorageBackend};
use tempfile::TempDir;

fn p(s: &str) -> AbsPath {
    AbsPath::parse(s).unwrap()
}

#[tokio::test]
async fn test_virtual_paths_map_under_the_host_root() {
    let temp = TempDir::new().unwrap();
    let store = LocalDirStore::new(temp.path());

    store.mkdir_recursive(&p("/a/b")).await.unwrap();
    store
        .write_file(&p("/a/b/c.txt"), &FileData::from("host"))
        .await
        .unwrap();

    let on_host = std::fs::read_to_string(temp.path().join("a/b/c.txt")).unwrap();
    assert_eq!(on_host, "host");

    store.unlink(&p("/a")).await.unwrap();
    assert!(!temp.path().join("a").exists());
}

#[tokio::test]
async fn test_reopened_store_sees_prior_content() {
    let temp = TempDir::new().unwrap();
    {
        let store = LocalDirStore::new(temp.path());
        store
            .write_file(&p("/persisted.txt"), &FileData::from("still here"))
            .await
            .unwrap();
    }

    let reopened = LocalDirStore::open(temp.path()).await.unwrap();
    let data = reopened.read_file(&p("/persisted.txt")).await.unwrap();
    assert_eq!(data.as_text(), Some("still here"));
}

#[tokio::test]
async fn test_open_creates_a_missing_root() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("fresh/workspace");

    let store = LocalDirStore::open(&nested).await.unwrap();
    assert!(nested.is_dir());
    assert!(store.read_dir(&AbsPath::root()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_host_changes_show_up_in_reads() {
    let temp = TempDir::new().unwrap();
    let store: Arc<dyn StorageBackend> = Arc::new(LocalDirStore::new(temp.path()));

    // The host side writes behind the backend's back
    std::fs::create_dir(temp.path().join("external")).unwrap();
    std::fs::write(temp.path().join("external/drop.txt"), "surprise").unwrap();

    let entries = store.read_dir(&p("/external")).await.unwrap();
    assert_eq!(entries.len(), 1);
    let data = store.read_file(&p("/external/drop.txt")).await.unwrap();
    assert_eq!(data.as_text(), Some("surprise"));
}
