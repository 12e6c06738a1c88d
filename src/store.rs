use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::entities::Snapshot;
use crate::error::Error;

#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn load(&self) -> Result<Option<Snapshot>, Error>;
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error>;
}

// One JSON document on disk, replaced through a temp file and rename.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotStore for FileStore {
    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn load(&self) -> Result<Option<Snapshot>, Error> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot))
    }

    #[tracing::instrument(skip_all, fields(path = %self.path.display(), version = snapshot.version))]
    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        let bytes = serde_json::to_vec(snapshot)?;
        let staging = self.path.with_extension("tmp");

        tokio::fs::write(&staging, &bytes).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        Ok(())
    }
}

// In-memory stand-in for tests and the simulation.
#[derive(Default)]
pub struct MemoryStore {
    snapshot: Mutex<Option<Snapshot>>,
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<Snapshot>, Error> {
        Ok(self.snapshot.lock().await.clone())
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), Error> {
        *self.snapshot.lock().await = Some(snapshot.clone());
        Ok(())
    }
}

#[test]
fn file_store_round_trips_the_snapshot() {
    use crate::entities::{DriverId, DriverRequest, Ride, RideId, RideRequest};
    use chrono::Utc;
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("state.json"));

    assert!(block_on(store.load()).unwrap().is_none());

    let mut snapshot = Snapshot::default();
    snapshot.version = 3;
    snapshot.roster.add(DriverRequest {
        name: "Ana".into(),
        unit_number: "12".into(),
        vehicle_model: "Toyota Corolla".into(),
        credential: "12".into(),
    });
    let mut ride = Ride::new(
        RideId(Utc::now()),
        RideRequest {
            pickup: "Calle 10".into(),
            destination: "Terminal".into(),
            time: "13:00".into(),
            fare: 12.0,
            specific_driver: None,
            scheduled_time: None,
        },
    );
    ride.offer_to(Some(DriverId(1))).unwrap();
    snapshot.rides.push(ride);

    block_on(store.save(&snapshot)).unwrap();

    let loaded = block_on(store.load()).unwrap().unwrap();
    assert_eq!(loaded.version, 3);
    assert_eq!(loaded.roster.next_id, 2);
    assert_eq!(loaded.rides[0].id, snapshot.rides[0].id);
    assert_eq!(loaded.rides[0].offered_to(), Some(DriverId(1)));
    assert!(loaded.credentials.admin_matches("Admin"));
}

#[test]
fn file_store_overwrites_previous_saves() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(dir.path().join("state.json"));

    let mut snapshot = Snapshot::default();
    snapshot.version = 1;
    block_on(store.save(&snapshot)).unwrap();
    snapshot.version = 2;
    block_on(store.save(&snapshot)).unwrap();

    assert_eq!(block_on(store.load()).unwrap().unwrap().version, 2);
}

#[test]
fn file_store_surfaces_a_corrupt_document() {
    use tokio_test::block_on;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    std::fs::write(&path, b"not json").unwrap();

    let store = FileStore::new(path);
    let err = block_on(store.load()).unwrap_err();
    assert_eq!(err.code, 3);
}

#[test]
fn memory_store_round_trips_the_snapshot() {
    use tokio_test::block_on;

    let store = MemoryStore::default();
    assert!(block_on(store.load()).unwrap().is_none());

    let mut snapshot = Snapshot::default();
    snapshot.version = 7;
    block_on(store.save(&snapshot)).unwrap();

    assert_eq!(block_on(store.load()).unwrap().unwrap().version, 7);
}
