mod observer;
pub mod timer;

pub use observer::Observer;

use tokio::sync::broadcast;
use uuid::Uuid;

use crate::entities::Snapshot;

// Identifies one front-end on the bus, so an observer can tell its own
// committed snapshots from everyone else's.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObserverId(Uuid);

impl ObserverId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

#[derive(Clone, Debug)]
pub struct SyncEvent {
    pub origin: ObserverId,
    pub snapshot: Snapshot,
}

// Fan-out of committed snapshots. No ordering is guaranteed across
// observers beyond what the broadcast channel provides per subscriber.
#[derive(Clone, Debug)]
pub struct SyncBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl SyncBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: SyncEvent) {
        // send fails only when nobody is subscribed; a lone observer is fine
        let _ = self.sender.send(event);
    }
}
