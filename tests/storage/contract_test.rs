/*!
 * Backend Contract Tests
 * The same guarantees must hold on every backend implementation
 */

use std::sync::Arc;

use atelier_core::path::AbsPath;
use atelier_core::storage::{
    FileData, LocalDirStore, MemoryStore, NodeKind, NullStore, StorageBackend, StoreError,
};
use parking_lot::Mutex;
use tempfile::TempDir;

fn p(s: &str) -> AbsPath {
    AbsPath::parse(s).unwrap()
}

async fn check_missing_paths_surface_not_found(backend: Arc<dyn StorageBackend>) {
    let missing = p("/nope/nothing.txt");
    assert!(matches!(
        backend.stat(&missing).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        backend.read_file(&missing).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        backend.read_dir(&p("/nope")).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        backend.unlink(&missing).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(matches!(
        backend.rename(&missing, &p("/other.txt")).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
    assert!(!backend.exists(&missing).await);
}

async fn check_writes_require_parents(backend: Arc<dyn StorageBackend>) {
    let orphan = p("/no-parent/file.txt");
    assert!(matches!(
        backend
            .write_file(&orphan, &FileData::from("x"))
            .await
            .unwrap_err(),
        StoreError::NotFound(_)
    ));

    backend.mkdir_recursive(&p("/no-parent")).await.unwrap();
    backend
        .write_file(&orphan, &FileData::from("x"))
        .await
        .unwrap();
    assert!(backend.exists(&orphan).await);

    // Renames are just as strict about the target's parent
    assert!(matches!(
        backend
            .rename(&orphan, &p("/still-missing/file.txt"))
            .await
            .unwrap_err(),
        StoreError::NotFound(_)
    ));
}

async fn check_unlink_removes_subtrees(backend: Arc<dyn StorageBackend>) {
    backend.mkdir_recursive(&p("/tree/deep")).await.unwrap();
    backend
        .write_file(&p("/tree/deep/leaf.txt"), &FileData::from("leaf"))
        .await
        .unwrap();
    backend
        .write_file(&p("/tree/top.txt"), &FileData::from("top"))
        .await
        .unwrap();

    backend.unlink(&p("/tree")).await.unwrap();

    assert!(!backend.exists(&p("/tree")).await);
    assert!(!backend.exists(&p("/tree/deep/leaf.txt")).await);
    assert!(matches!(
        backend.read_dir(&p("/tree")).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
}

async fn check_rename_moves_subtrees_and_guards(backend: Arc<dyn StorageBackend>) {
    backend.mkdir_recursive(&p("/old/inner")).await.unwrap();
    backend
        .write_file(&p("/old/inner/a.txt"), &FileData::from("a"))
        .await
        .unwrap();

    backend.rename(&p("/old"), &p("/new")).await.unwrap();
    assert!(!backend.exists(&p("/old")).await);
    let moved = backend.read_file(&p("/new/inner/a.txt")).await.unwrap();
    assert_eq!(moved.as_bytes(), b"a");

    // A directory cannot move into its own subtree
    assert!(backend
        .rename(&p("/new"), &p("/new/inner/trap"))
        .await
        .is_err());

    // An occupied target is refused, not overwritten
    backend.mkdir_recursive(&p("/other")).await.unwrap();
    assert!(matches!(
        backend.rename(&p("/new"), &p("/other")).await.unwrap_err(),
        StoreError::AlreadyExists(_)
    ));
    assert!(backend.exists(&p("/new/inner/a.txt")).await);
}

async fn check_read_dir_is_sorted_and_typed(backend: Arc<dyn StorageBackend>) {
    backend.mkdir_recursive(&p("/list/zeta")).await.unwrap();
    backend
        .write_file(&p("/list/alpha.txt"), &FileData::from(""))
        .await
        .unwrap();
    backend
        .write_file(&p("/list/middle.txt"), &FileData::from(""))
        .await
        .unwrap();

    let entries = backend.read_dir(&p("/list")).await.unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["alpha.txt", "middle.txt", "zeta"]);
    assert_eq!(entries[0].kind, NodeKind::File);
    assert_eq!(entries[2].kind, NodeKind::Dir);
}

async fn run_contract<F>(make: F)
where
    F: Fn() -> Arc<dyn StorageBackend>,
{
    check_missing_paths_surface_not_found(make()).await;
    check_writes_require_parents(make()).await;
    check_unlink_removes_subtrees(make()).await;
    check_rename_moves_subtrees_and_guards(make()).await;
    check_read_dir_is_sorted_and_typed(make()).await;
}

#[tokio::test]
async fn test_memory_backend_contract() {
    run_contract(|| Arc::new(MemoryStore::new()) as Arc<dyn StorageBackend>).await;
}

#[tokio::test]
async fn test_local_backend_contract() {
    // Keep every temp dir alive until the whole suite has run
    let guards = Mutex::new(Vec::new());
    run_contract(|| {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(LocalDirStore::new(dir.path())) as Arc<dyn StorageBackend>;
        guards.lock().push(dir);
        store
    })
    .await;
}

#[tokio::test]
async fn test_null_backend_is_an_empty_root() {
    let store = NullStore;

    assert!(store.stat(&AbsPath::root()).await.unwrap().is_dir());
    assert!(store.read_dir(&AbsPath::root()).await.unwrap().is_empty());

    // Writes are swallowed, reads still miss
    store
        .write_file(&p("/void.txt"), &FileData::from("gone"))
        .await
        .unwrap();
    assert!(matches!(
        store.read_file(&p("/void.txt")).await.unwrap_err(),
        StoreError::NotFound(_)
    ));
}
