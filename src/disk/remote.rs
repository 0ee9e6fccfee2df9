/*!
 * Remote Channel
 * Cross-context fan-out of disk notices
 */

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::events::IndexTrigger;
use super::identity::{DiskGuid, InstanceId};
use crate::path::AbsPath;

/// Notices buffered per subscriber before the oldest are dropped
pub const REMOTE_CHANNEL_CAPACITY: usize = 1024;

/// Change description carried across contexts.
///
/// Only structural triggers and content writes travel; virtual-node
/// refreshes stay local to the instance that created them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op", content = "detail")]
pub enum RemotePayload {
    Index(IndexTrigger),
    Write { path: AbsPath },
}

/// One change notice as published on a remote channel.
///
/// `disk_id` identifies the disk (stable across contexts), while
/// `instance_id` identifies the publishing instance. A receiver uses
/// the pair to tell its own notices from foreign views of the same
/// disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNotice {
    pub disk_id: DiskGuid,
    pub instance_id: InstanceId,
    pub payload: RemotePayload,
}

impl RemoteNotice {
    pub fn new(disk_id: DiskGuid, instance_id: InstanceId, payload: RemotePayload) -> Self {
        Self {
            disk_id,
            instance_id,
            payload,
        }
    }
}

/// Transport seam between contexts.
///
/// Publishing never blocks and never fails: a channel with no
/// subscribers drops the notice, a full subscriber queue drops its
/// oldest entries. Subscribers only observe notices published after
/// they subscribed.
pub trait RemoteChannel: Send + Sync {
    fn publish(&self, notice: RemoteNotice);
    fn subscribe(&self) -> broadcast::Receiver<RemoteNotice>;
}

/// In-process channel for wiring several instances together.
///
/// Clones share one underlying channel, so handing a clone to each
/// disk puts them all in the same broadcast domain.
#[derive(Debug, Clone)]
pub struct LoopbackChannel {
    tx: broadcast::Sender<RemoteNotice>,
}

impl LoopbackChannel {
    pub fn new() -> Self {
        Self::with_capacity(REMOTE_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }
}

impl Default for LoopbackChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoteChannel for LoopbackChannel {
    fn publish(&self, notice: RemoteNotice) {
        // Zero subscribers is a valid state, not an error
        let _ = self.tx.send(notice);
    }

    fn subscribe(&self) -> broadcast::Receiver<RemoteNotice> {
        self.tx.subscribe()
    }
}
