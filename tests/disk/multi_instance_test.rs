/*!
 * Multi-Instance Tests
 * Several views of one disk kept in sync over a remote channel
 */

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atelier_core::disk::{
    Disk, DiskEvent, DiskGuid, IndexTrigger, InstanceId, LoopbackChannel, NewFileSpec,
    RemoteNotice, RemotePayload,
};
use atelier_core::path::AbsPath;
use atelier_core::storage::{
    BackendKind, DirEntry, FileData, MemoryStore, Stat, StorageBackend, StoreResult,
};
use parking_lot::Mutex;

fn p(s: &str) -> AbsPath {
    AbsPath::parse(s).unwrap()
}

/// Two disks sharing one backend and one broadcast domain, as two
/// contexts of the same workspace would
async fn paired_disks() -> (Disk, Disk) {
    let channel = Arc::new(LoopbackChannel::new());
    let guid = DiskGuid::generate();
    let backend = Arc::new(MemoryStore::new());

    let a = Disk::builder(backend.clone())
        .with_guid(guid.clone())
        .with_remote(channel.clone())
        .build();
    let b = Disk::builder(backend)
        .with_guid(guid)
        .with_remote(channel)
        .build();
    a.init().await.unwrap();
    b.init().await.unwrap();
    (a, b)
}

#[tokio::test]
async fn test_foreign_create_reaches_the_other_instance() {
    let (a, b) = paired_disks().await;

    let pending = a.next_index();
    b.new_file(NewFileSpec::new(p("/shared.txt")).with_data("from b"))
        .await
        .unwrap();

    match pending.wait().await {
        Some(DiskEvent::Index(IndexTrigger::Create { paths })) => {
            assert_eq!(paths, vec![p("/shared.txt")]);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    // a re-indexed before announcing
    assert!(a.node_at(&p("/shared.txt")).is_some());
}

#[tokio::test]
async fn test_writes_cross_as_outside_writes_without_echo() {
    let (a, b) = paired_disks().await;
    a.new_file(NewFileSpec::new(p("/doc.txt"))).await.unwrap();

    let a_outside = Arc::new(AtomicUsize::new(0));
    let sink = a_outside.clone();
    a.on_outside_write(&p("/doc.txt"), move || {
        sink.fetch_add(1, Ordering::SeqCst);
    })
    .forget();

    let pending = b.emitter().once(DiskEvent::OUTSIDE_WRITE);
    a.write_file(&p("/doc.txt"), "updated").await.unwrap();

    match pending.wait().await {
        Some(DiskEvent::OutsideWrite { path }) => assert_eq!(path, p("/doc.txt")),
        other => panic!("unexpected event: {:?}", other),
    }

    // The writer never hears its own notice back
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(a_outside.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unrelated_disks_share_a_channel_quietly() {
    let channel = Arc::new(LoopbackChannel::new());
    let a = Disk::builder(Arc::new(MemoryStore::new()))
        .with_remote(channel.clone())
        .build();
    let stranger = Disk::builder(Arc::new(MemoryStore::new()))
        .with_remote(channel)
        .build();
    a.init().await.unwrap();
    stranger.init().await.unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let sink = hits.clone();
    stranger
        .on_dirty(move || {
            sink.fetch_add(1, Ordering::SeqCst);
        })
        .forget();

    a.new_file(NewFileSpec::new(p("/private.txt"))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert!(stranger.node_at(&p("/private.txt")).is_none());
}

// ============================================================================
// Self/foreign attribution
// ============================================================================

/// Backend wrapper that counts directory listings, the backbone of a
/// full rescan
struct CountingBackend {
    inner: MemoryStore,
    read_dirs: AtomicUsize,
}

impl CountingBackend {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            read_dirs: AtomicUsize::new(0),
        }
    }

    fn read_dir_calls(&self) -> usize {
        self.read_dirs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for CountingBackend {
    async fn stat(&self, path: &AbsPath) -> StoreResult<Stat> {
        self.inner.stat(path).await
    }

    async fn read_file(&self, path: &AbsPath) -> StoreResult<FileData> {
        self.inner.read_file(path).await
    }

    async fn write_file(&self, path: &AbsPath, data: &FileData) -> StoreResult<()> {
        self.inner.write_file(path, data).await
    }

    async fn unlink(&self, path: &AbsPath) -> StoreResult<()> {
        self.inner.unlink(path).await
    }

    async fn rename(&self, from: &AbsPath, to: &AbsPath) -> StoreResult<()> {
        self.inner.rename(from, to).await
    }

    async fn read_dir(&self, path: &AbsPath) -> StoreResult<Vec<DirEntry>> {
        self.read_dirs.fetch_add(1, Ordering::SeqCst);
        self.inner.read_dir(path).await
    }

    async fn mkdir_recursive(&self, path: &AbsPath) -> StoreResult<()> {
        self.inner.mkdir_recursive(path).await
    }

    fn kind(&self) -> BackendKind {
        self.inner.kind()
    }
}

#[tokio::test]
async fn test_own_notices_forward_without_rescan() {
    let backend = Arc::new(CountingBackend::new());
    let disk = Disk::builder(backend.clone()).build();
    disk.init().await.unwrap();

    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    disk.emitter()
        .on_any(move |event: &DiskEvent| sink.lock().push(event.clone()))
        .forget();

    let baseline = backend.read_dir_calls();

    // A notice attributed to this very instance: the change already went
    // through this disk, so it is relayed as-is
    disk.absorb_remote(RemoteNotice::new(
        disk.guid().clone(),
        disk.instance().clone(),
        RemotePayload::Write {
            path: p("/doc.txt"),
        },
    ))
    .await;

    assert_eq!(backend.read_dir_calls(), baseline);
    assert_eq!(
        log.lock().as_slice(),
        &[DiskEvent::InsideWrite {
            path: p("/doc.txt"),
        }]
    );

    // The same payload from a foreign instance forces a rescan and
    // surfaces as an outside write
    disk.absorb_remote(RemoteNotice::new(
        disk.guid().clone(),
        InstanceId::generate(),
        RemotePayload::Write {
            path: p("/doc.txt"),
        },
    ))
    .await;

    assert!(backend.read_dir_calls() > baseline);
    let events = log.lock();
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[1],
        DiskEvent::OutsideWrite {
            path: p("/doc.txt"),
        }
    );
}

#[tokio::test]
async fn test_foreign_index_notice_rebuilds_before_forwarding() {
    let backend = Arc::new(MemoryStore::new());
    let disk = Disk::builder(backend.clone()).build();
    disk.init().await.unwrap();

    // Another context created a file behind our back
    backend
        .write_file(&p("/sneaky.txt"), &FileData::from("..."))
        .await
        .unwrap();
    assert!(disk.node_at(&p("/sneaky.txt")).is_none());

    let observed = Arc::new(Mutex::new(None));
    let sink = observed.clone();
    let view = disk.clone();
    disk.on_create(move |paths| {
        // By the time the event fires, the tree already shows the change
        *sink.lock() = Some((paths.to_vec(), view.node_at(&p("/sneaky.txt")).is_some()));
    })
    .forget();

    disk.absorb_remote(RemoteNotice::new(
        disk.guid().clone(),
        InstanceId::generate(),
        RemotePayload::Index(IndexTrigger::Create {
            paths: vec![p("/sneaky.txt")],
        }),
    ))
    .await;

    let observed = observed.lock();
    let (paths, indexed) = observed.as_ref().expect("create listener fired");
    assert_eq!(paths, &[p("/sneaky.txt")]);
    assert!(indexed);
}
