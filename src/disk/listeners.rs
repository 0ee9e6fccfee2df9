/*!
 * Disk Listeners
 * Typed subscription helpers over the raw disk emitter
 */

use super::events::{DiskEvent, IndexTrigger, RenameRecord};
use super::Disk;
use crate::events::{OnceEvent, Subscription};
use crate::path::AbsPath;

impl Disk {
    /// Every index rebuild, with its trigger
    pub fn on_index(&self, f: impl Fn(&IndexTrigger) + Send + Sync + 'static) -> Subscription {
        self.emitter().on(DiskEvent::INDEX, move |event| {
            if let DiskEvent::Index(trigger) = event {
                f(trigger);
            }
        })
    }

    /// Like [`Disk::on_index`], but when a tree already exists the
    /// callback also runs once immediately, with a refresh trigger, so
    /// late subscribers start from the current state instead of the
    /// next change
    pub fn on_latest_index(
        &self,
        f: impl Fn(&IndexTrigger) + Send + Sync + 'static,
    ) -> Subscription {
        if self.root().is_some() {
            f(&IndexTrigger::Refresh);
        }
        self.on_index(f)
    }

    /// Nodes that appeared: creates, copies, restores from trash
    pub fn on_create(&self, f: impl Fn(&[AbsPath]) + Send + Sync + 'static) -> Subscription {
        self.emitter().on(DiskEvent::INDEX, move |event| {
            if let DiskEvent::Index(IndexTrigger::Create { paths }) = event {
                f(paths);
            }
        })
    }

    /// Subtree roots that disappeared: deletes and moves to trash
    pub fn on_delete(&self, f: impl Fn(&[AbsPath]) + Send + Sync + 'static) -> Subscription {
        self.emitter().on(DiskEvent::INDEX, move |event| {
            if let DiskEvent::Index(IndexTrigger::Delete { paths }) = event {
                f(paths);
            }
        })
    }

    /// Renames and moves, no-op records included for batches
    pub fn on_rename(&self, f: impl Fn(&[RenameRecord]) + Send + Sync + 'static) -> Subscription {
        self.emitter().on(DiskEvent::INDEX, move |event| {
            if let DiskEvent::Index(IndexTrigger::Rename { records }) = event {
                f(records);
            }
        })
    }

    /// Content written to `path` through this instance
    pub fn on_inside_write(
        &self,
        path: &AbsPath,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let watched = path.clone();
        self.emitter().on(DiskEvent::INSIDE_WRITE, move |event| {
            if let DiskEvent::InsideWrite { path } = event {
                if *path == watched {
                    f();
                }
            }
        })
    }

    /// Content written to `path` by another context of the same disk
    pub fn on_outside_write(
        &self,
        path: &AbsPath,
        f: impl Fn() + Send + Sync + 'static,
    ) -> Subscription {
        let watched = path.clone();
        self.emitter().on(DiskEvent::OUTSIDE_WRITE, move |event| {
            if let DiskEvent::OutsideWrite { path } = event {
                if *path == watched {
                    f();
                }
            }
        })
    }

    /// Anything changed at all, structure or content
    pub fn on_dirty(&self, f: impl Fn() + Send + Sync + 'static) -> Subscription {
        self.emitter().on_any(move |_| f())
    }

    /// Resolves on the next index rebuild, then detaches
    pub fn next_index(&self) -> OnceEvent<DiskEvent> {
        self.emitter().once(DiskEvent::INDEX)
    }
}
