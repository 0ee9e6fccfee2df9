/*!
 * Workflow Tests
 * Whole sessions over host storage, observed through an event bus
 */

use std::sync::Arc;

use atelier_core::disk::{CopyMode, Disk, DiskEvent, NewFileSpec};
use atelier_core::events::{ClassKey, EventBus};
use atelier_core::path::AbsPath;
use atelier_core::storage::LocalDirStore;
use parking_lot::Mutex;
use tempfile::TempDir;

fn p(s: &str) -> AbsPath {
    AbsPath::parse(s).unwrap()
}

async fn host_disk(host: &TempDir) -> Disk {
    let disk = Disk::builder(Arc::new(LocalDirStore::new(host.path()))).build();
    disk.init().await.unwrap();
    disk
}

#[tokio::test]
async fn test_editing_session_end_to_end() {
    let host = TempDir::new().unwrap();
    let disk = host_disk(&host).await;

    // Route the disk through a bus, the way a host wires its workspaces.
    // Without an explicit key the connection takes the emitter's own,
    // which a disk labels with its guid.
    let bus: EventBus<DiskEvent> = EventBus::new();
    let class = ClassKey::new("disk");
    let connection = bus.connect(&class, disk.emitter(), None);
    assert_eq!(connection.instance().label(), disk.guid().as_str());
    let kinds: Arc<Mutex<Vec<&'static str>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = kinds.clone();
    let _watch = bus.on_class(&class, move |envelope| sink.lock().push(envelope.kind));

    disk.new_dir(&p("/docs")).await.unwrap();
    disk.new_file(NewFileSpec::new(p("/docs/readme.md")).with_data("We ship Friday"))
        .await
        .unwrap();
    disk.write_file(&p("/docs/readme.md"), "We ship Thursday")
        .await
        .unwrap();

    // The edit reached the host directory
    let on_host = std::fs::read_to_string(host.path().join("docs/readme.md")).unwrap();
    assert_eq!(on_host, "We ship Thursday");

    // Copies into an occupied directory pick numbered names
    assert_eq!(
        disk.copy_file(&p("/docs/readme.md"), &p("/"), CopyMode::Unique)
            .await
            .unwrap(),
        p("/readme.md")
    );
    assert_eq!(
        disk.copy_file(&p("/docs/readme.md"), &p("/"), CopyMode::Unique)
            .await
            .unwrap(),
        p("/readme-1.md")
    );

    // Soft delete parks the copy on the host, restore brings it back
    let parked = disk.trash_file(&p("/readme-1.md")).await.unwrap();
    assert_eq!(parked, p("/.trash/readme-1.md"));
    assert!(host.path().join(".trash/readme-1.md").exists());
    assert!(!host.path().join("readme-1.md").exists());

    let restored = disk.untrash_file(&parked, &p("/readme-1.md")).await.unwrap();
    assert_eq!(restored, p("/readme-1.md"));
    assert!(host.path().join("readme-1.md").exists());

    assert_eq!(
        kinds.lock().as_slice(),
        &["index", "index", "inside-write", "index", "index", "index", "index"]
    );

    // After disconnecting, the bus no longer hears this disk
    assert!(connection.disconnect());
    disk.remove_file(&p("/readme.md")).await.unwrap();
    assert_eq!(kinds.lock().len(), 7);

    disk.tear_down();
}

#[tokio::test]
async fn test_sweep_rewrites_content_on_the_host() {
    let host = TempDir::new().unwrap();
    let disk = host_disk(&host).await;

    disk.write_file(&p("/a/page.html"), "<h1>Launch v1</h1>")
        .await
        .unwrap();
    disk.write_file(&p("/b/page.html"), "<h1>About</h1>")
        .await
        .unwrap();

    let touched = disk.replace_across_files("Launch v1", "Launch v2").await.unwrap();
    assert_eq!(touched, vec![p("/a/page.html")]);

    let rewritten = std::fs::read_to_string(host.path().join("a/page.html")).unwrap();
    assert_eq!(rewritten, "<h1>Launch v2</h1>");
    let untouched = std::fs::read_to_string(host.path().join("b/page.html")).unwrap();
    assert_eq!(untouched, "<h1>About</h1>");
}

#[tokio::test]
async fn test_pruned_walks_hide_the_trash_subtree() {
    let host = TempDir::new().unwrap();
    let disk = host_disk(&host).await;

    disk.write_file(&p("/keep.txt"), "keep").await.unwrap();
    disk.write_file(&p("/drop.txt"), "drop").await.unwrap();
    disk.trash_file(&p("/drop.txt")).await.unwrap();

    let visible: Vec<String> = disk
        .tree()
        .iter_pruned(|node| node.basename != ".trash")
        .map(|node| node.path.to_string())
        .collect();

    // The trash directory is yielded but nothing under it is
    assert!(visible.contains(&"/.trash".to_string()));
    assert!(!visible.iter().any(|path| path.starts_with("/.trash/")));
    assert!(visible.contains(&"/keep.txt".to_string()));

    // An unpruned walk still reaches the parked file
    let all: Vec<String> = disk.tree().iter().map(|n| n.path.to_string()).collect();
    assert!(all.contains(&"/.trash/drop.txt".to_string()));
}

#[tokio::test]
async fn test_batch_create_numbers_duplicate_requests() {
    let host = TempDir::new().unwrap();
    let disk = host_disk(&host).await;

    let created = disk
        .new_files(vec![
            NewFileSpec::new(p("/n.txt")).with_data("1"),
            NewFileSpec::new(p("/n.txt")).with_data("2"),
            NewFileSpec::new(p("/n.txt")).with_data("3"),
        ])
        .await
        .unwrap();

    assert_eq!(created, vec![p("/n.txt"), p("/n-1.txt"), p("/n-2.txt")]);
    assert_eq!(
        std::fs::read_to_string(host.path().join("n-2.txt")).unwrap(),
        "3"
    );
}
