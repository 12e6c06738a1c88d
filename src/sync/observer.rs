use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::broadcast;

use crate::api::{AdminAPI, DriverAPI, RideAPI, API};
use crate::engine::{self, Command};
use crate::entities::{Driver, DriverId, DriverRequest, Ride, RideId, RideRequest, Snapshot};
use crate::error::{io_error, not_found_error, Error};
use crate::store::SnapshotStore;
use crate::sync::{ObserverId, SyncBus, SyncEvent};

// One front-end's view of the shared state. Every observer holds a full
// snapshot, commits by replacing it wholesale, and takes whatever the other
// observers publish, last write wins.
pub struct Observer {
    id: ObserverId,
    label: String,
    snapshot: Snapshot,
    store: Arc<dyn SnapshotStore>,
    bus: SyncBus,
    inbox: broadcast::Receiver<SyncEvent>,
}

impl Observer {
    pub fn new(label: &str, bus: SyncBus, store: Arc<dyn SnapshotStore>) -> Self {
        let inbox = bus.subscribe();

        Self {
            id: ObserverId::new(),
            label: label.into(),
            snapshot: Snapshot::default(),
            store,
            bus,
            inbox,
        }
    }

    pub fn id(&self) -> ObserverId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    // Starts from whatever the store holds. A missing or unreadable document
    // means starting fresh; the next commit will write a good one.
    #[tracing::instrument(skip(self), fields(label = %self.label))]
    pub async fn hydrate(&mut self) -> Result<(), Error> {
        match self.store.load().await {
            Ok(Some(snapshot)) => {
                tracing::info!(version = snapshot.version, "hydrated from the store");
                self.snapshot = snapshot;
            }
            Ok(None) => {
                tracing::info!("no stored snapshot, starting fresh");
                self.snapshot = Snapshot::default();
            }
            Err(err) => {
                tracing::warn!(?err, "stored snapshot is unreadable, starting fresh");
                self.snapshot = Snapshot::default();
            }
        }

        Ok(())
    }

    // Runs one command against the local snapshot and, if it goes through,
    // commits the result: bump the version, replace the local copy, tell the
    // other observers, persist. The commit and the broadcast stand even when
    // persisting fails.
    #[tracing::instrument(skip(self, command), fields(label = %self.label))]
    pub async fn submit(&mut self, command: Command) -> Result<(), Error> {
        let mut next = engine::apply(&self.snapshot, command, Utc::now())?;
        next.version = self.snapshot.version + 1;

        self.snapshot = next;
        tracing::info!(version = self.snapshot.version, "committed snapshot");

        self.bus.publish(SyncEvent {
            origin: self.id,
            snapshot: self.snapshot.clone(),
        });

        self.store.save(&self.snapshot).await?;

        Ok(())
    }

    // Blocks until a snapshot from another observer lands, absorbing it.
    pub async fn observe(&mut self) -> Result<(), Error> {
        loop {
            match self.inbox.recv().await {
                Ok(event) => {
                    if self.absorb(event) {
                        return Ok(());
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(label = %self.label, skipped, "observer lagged behind the bus");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(io_error("sync bus closed"));
                }
            }
        }
    }

    // Absorbs everything already queued on the bus without waiting. Returns
    // how many foreign snapshots were taken.
    pub fn drain(&mut self) -> Result<usize, Error> {
        let mut absorbed = 0;

        loop {
            match self.inbox.try_recv() {
                Ok(event) => {
                    if self.absorb(event) {
                        absorbed += 1;
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(absorbed),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(label = %self.label, skipped, "observer lagged behind the bus");
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(io_error("sync bus closed"));
                }
            }
        }
    }

    // Own echoes are skipped; anything else replaces the local snapshot
    // unconditionally. A version that fails to advance means two observers
    // committed from the same base and one update is being thrown away.
    fn absorb(&mut self, event: SyncEvent) -> bool {
        if event.origin == self.id {
            return false;
        }

        if event.snapshot.version <= self.snapshot.version {
            tracing::warn!(
                label = %self.label,
                local = self.snapshot.version,
                incoming = event.snapshot.version,
                "concurrent overwrite, last write wins"
            );
        }

        self.snapshot = event.snapshot;
        true
    }

    fn ride(&self, id: RideId) -> Result<Ride, Error> {
        self.snapshot.ride(id).cloned().ok_or_else(not_found_error)
    }

    fn driver(&self, id: DriverId) -> Result<Driver, Error> {
        self.snapshot.driver(id).cloned().ok_or_else(not_found_error)
    }
}

#[async_trait]
impl RideAPI for Observer {
    async fn add_ride(&mut self, request: RideRequest) -> Result<Ride, Error> {
        self.submit(Command::AddRide(request)).await?;
        self.snapshot
            .rides
            .last()
            .cloned()
            .ok_or_else(not_found_error)
    }

    async fn accept_ride(&mut self, id: RideId, driver_id: DriverId) -> Result<Ride, Error> {
        self.submit(Command::AcceptRide {
            ride_id: id,
            driver_id,
        })
        .await?;
        self.ride(id)
    }

    async fn decline_ride(&mut self, id: RideId, driver_id: DriverId) -> Result<Ride, Error> {
        self.submit(Command::DeclineRide {
            ride_id: id,
            driver_id,
        })
        .await?;
        self.ride(id)
    }

    async fn complete_ride(&mut self, id: RideId) -> Result<Ride, Error> {
        self.submit(Command::CompleteRide { ride_id: id }).await?;
        self.ride(id)
    }

    async fn activate_ride(&mut self, id: RideId) -> Result<Ride, Error> {
        self.submit(Command::ActivateScheduledRide { ride_id: id })
            .await?;
        self.ride(id)
    }
}

#[async_trait]
impl DriverAPI for Observer {
    async fn add_driver(&mut self, request: DriverRequest) -> Result<Driver, Error> {
        self.submit(Command::AddDriver(request)).await?;
        self.snapshot
            .roster
            .in_queue_order()
            .last()
            .cloned()
            .ok_or_else(not_found_error)
    }

    async fn edit_driver(&mut self, id: DriverId, request: DriverRequest) -> Result<Driver, Error> {
        self.submit(Command::EditDriver {
            driver_id: id,
            request,
        })
        .await?;
        self.driver(id)
    }

    async fn remove_driver(&mut self, id: DriverId) -> Result<Driver, Error> {
        // the driver is gone from the snapshot after the commit
        let removed = self.driver(id)?;

        self.submit(Command::RemoveDriver { driver_id: id }).await?;

        Ok(removed)
    }

    async fn toggle_driver_availability(&mut self, id: DriverId) -> Result<Driver, Error> {
        self.submit(Command::ToggleDriverAvailability { driver_id: id })
            .await?;
        self.driver(id)
    }
}

#[async_trait]
impl AdminAPI for Observer {
    async fn change_admin_password(&mut self, new_secret: String) -> Result<(), Error> {
        self.submit(Command::ChangeAdminPassword { new_secret }).await
    }

    async fn change_super_admin_credential(&mut self, new_secret: String) -> Result<(), Error> {
        self.submit(Command::ChangeSuperAdminCredential { new_secret })
            .await
    }
}

impl API for Observer {}

#[cfg(test)]
fn driver_request(i: u32) -> DriverRequest {
    DriverRequest {
        name: format!("Driver {}", i),
        unit_number: format!("{}", 100 + i),
        vehicle_model: "Crown Victoria".to_string(),
        credential: format!("secret-{}", i),
    }
}

#[cfg(test)]
fn ride_request() -> RideRequest {
    RideRequest {
        pickup: "12 Harbour St".to_string(),
        destination: "Airport".to_string(),
        time: "now".to_string(),
        fare: 27.5,
        specific_driver: None,
        scheduled_time: None,
    }
}

#[test]
fn observers_converge_after_a_commit() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

    let mut admin = Observer::new("admin", bus.clone(), store.clone());
    let mut board = Observer::new("board", bus.clone(), store);

    let driver = block_on(admin.add_driver(driver_request(1))).unwrap();
    assert_eq!(driver.id, DriverId(1));
    assert_eq!(admin.snapshot().version, 1);

    block_on(board.observe()).unwrap();
    assert_eq!(board.snapshot().version, 1);
    assert_eq!(board.snapshot().roster.in_queue_order().len(), 1);
}

#[test]
fn an_observer_skips_its_own_echo() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

    let mut solo = Observer::new("solo", bus.clone(), store);
    let mut tap = bus.subscribe();

    block_on(solo.add_ride(ride_request())).unwrap();

    // the commit went out on the bus stamped with the committer's identity
    let event = block_on(tap.recv()).unwrap();
    assert_eq!(event.origin, solo.id());
    assert_eq!(event.snapshot.version, 1);

    assert_eq!(solo.drain().unwrap(), 0);
    assert_eq!(solo.snapshot().version, 1);
}

#[test]
fn racing_commits_end_in_last_write_wins() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

    let mut admin = Observer::new("admin", bus.clone(), store.clone());
    let mut board = Observer::new("board", bus.clone(), store);

    // both commit from version 0 before seeing each other
    block_on(admin.add_driver(driver_request(1))).unwrap();
    block_on(board.add_ride(ride_request())).unwrap();

    assert_eq!(admin.drain().unwrap(), 1);
    assert_eq!(board.drain().unwrap(), 1);

    // each took the other's racing commit, losing its own
    assert_eq!(admin.snapshot().version, 1);
    assert!(admin.snapshot().roster.in_queue_order().is_empty());
    assert_eq!(admin.snapshot().rides.len(), 1);

    assert_eq!(board.snapshot().version, 1);
    assert_eq!(board.snapshot().roster.in_queue_order().len(), 1);
    assert!(board.snapshot().rides.is_empty());
}

#[test]
fn hydrate_takes_the_stored_snapshot() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store = Arc::new(MemoryStore::default());

    let mut stored = Snapshot::default();
    stored.version = 5;
    stored.roster.add(driver_request(1));
    block_on(store.save(&stored)).unwrap();

    let mut observer = Observer::new("admin", bus, store);
    block_on(observer.hydrate()).unwrap();

    assert_eq!(observer.snapshot().version, 5);
    assert_eq!(observer.snapshot().roster.in_queue_order().len(), 1);
}

#[test]
fn hydrate_starts_fresh_without_a_readable_snapshot() {
    use crate::store::{FileStore, MemoryStore};
    use tokio_test::block_on;

    // nothing stored yet
    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());
    let mut observer = Observer::new("admin", bus.clone(), store);

    block_on(observer.hydrate()).unwrap();
    assert_eq!(observer.snapshot().version, 0);

    // a corrupt document on disk
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"}{").unwrap();

    let store: Arc<dyn SnapshotStore> = Arc::new(FileStore::new(path));
    let mut recovering = Observer::new("recovering", bus, store);

    block_on(recovering.hydrate()).unwrap();
    assert_eq!(recovering.snapshot().version, 0);
}

#[test]
fn the_api_returns_the_affected_entities() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

    let mut observer = Observer::new("admin", bus, store);

    let driver = block_on(observer.add_driver(driver_request(1))).unwrap();
    let driver = block_on(observer.toggle_driver_availability(driver.id)).unwrap();
    assert!(driver.is_available);

    let edited = block_on(observer.edit_driver(
        driver.id,
        DriverRequest {
            name: "Renamed".to_string(),
            ..driver_request(1)
        },
    ))
    .unwrap();
    assert_eq!(edited.name, "Renamed");

    // the new ride comes back already offered to the only available driver
    let ride = block_on(observer.add_ride(ride_request())).unwrap();
    assert_eq!(ride.offered_to(), Some(driver.id));

    let ride = block_on(observer.accept_ride(ride.id, driver.id)).unwrap();
    assert!(ride.is_in_progress());

    let ride = block_on(observer.complete_ride(ride.id)).unwrap();
    assert!(ride.is_completed());

    // a scheduled ride is returned dormant and comes back waiting
    let scheduled = block_on(observer.add_ride(RideRequest {
        scheduled_time: Some("06:30".to_string()),
        ..ride_request()
    }))
    .unwrap();
    assert!(scheduled.is_scheduled());

    let activated = block_on(observer.activate_ride(scheduled.id)).unwrap();
    assert!(activated.is_waiting());
    assert_eq!(activated.offered_to(), Some(driver.id));

    // declining as the only available driver puts the offer right back
    let declined = block_on(observer.decline_ride(activated.id, driver.id)).unwrap();
    assert_eq!(declined.offered_to(), Some(driver.id));

    block_on(observer.change_admin_password("hunter2".to_string())).unwrap();
    assert!(observer.snapshot().credentials.admin_matches("hunter2"));

    // remove hands back the driver that no longer exists in the snapshot
    let removed = block_on(observer.remove_driver(driver.id)).unwrap();
    assert_eq!(removed.name, "Renamed");
    assert!(observer.snapshot().roster.in_queue_order().is_empty());
}

#[test]
fn a_rejected_command_changes_nothing() {
    use crate::store::MemoryStore;
    use tokio_test::block_on;

    let bus = SyncBus::new(16);
    let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

    let mut observer = Observer::new("admin", bus.clone(), store.clone());
    let mut partner = Observer::new("board", bus, store);

    let err = block_on(observer.accept_ride(RideId(Utc::now()), DriverId(1))).unwrap_err();
    assert!(err.is_not_found_error());

    assert_eq!(observer.snapshot().version, 0);
    assert_eq!(partner.drain().unwrap(), 0);
}

#[test]
fn a_failed_save_leaves_the_commit_standing() {
    use crate::store::FileStore;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn SnapshotStore> =
        Arc::new(FileStore::new(dir.path().join("missing").join("state.json")));

    let bus = SyncBus::new(16);
    let mut flaky = Observer::new("flaky", bus.clone(), store.clone());
    let mut partner = Observer::new("board", bus, store);

    let err = block_on(flaky.add_ride(ride_request())).unwrap_err();
    assert_eq!(err.code, 2);

    // the local commit went through and was broadcast before the save failed
    assert_eq!(flaky.snapshot().version, 1);
    assert_eq!(flaky.snapshot().rides.len(), 1);
    assert_eq!(partner.drain().unwrap(), 1);
    assert_eq!(partner.snapshot().rides.len(), 1);
}
