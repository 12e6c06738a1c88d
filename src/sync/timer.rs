use std::time::Duration;

use chrono::Utc;

use crate::engine::{schedule, Command};
use crate::error::Error;
use crate::sync::Observer;

// The scheduler's loop: absorb whatever the other observers committed, then
// dispatch every scheduled ride whose time has come. Runs until the bus
// closes or the store stops taking writes.
#[tracing::instrument(skip(observer), fields(label = %observer.label()))]
pub async fn run(mut observer: Observer, interval: Duration) -> Result<(), Error> {
    tracing::info!(interval_secs = interval.as_secs(), "activation timer running");

    let mut ticker = tokio::time::interval(interval);

    loop {
        ticker.tick().await;

        observer.drain()?;
        activate_due(&mut observer).await?;
    }
}

async fn activate_due(observer: &mut Observer) -> Result<(), Error> {
    let now = Utc::now();

    for ride_id in schedule::due_activations(observer.snapshot(), now) {
        match observer.submit(Command::ActivateScheduledRide { ride_id }).await {
            Ok(()) => tracing::info!(%ride_id, "dispatched scheduled ride"),
            Err(err) if err.is_rejection() => {
                // another observer got there first
                tracing::warn!(%ride_id, ?err, "scheduled ride no longer activatable, skipping");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(())
}

#[test]
fn the_timer_dispatches_overdue_rides() {
    use std::sync::Arc;

    use tokio_test::block_on;

    use crate::entities::{Ride, RideId, RideRequest, Snapshot};
    use crate::store::{MemoryStore, SnapshotStore};
    use crate::sync::SyncBus;

    block_on(async {
        let bus = SyncBus::new(16);
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

        // created yesterday and scheduled for midnight, so long overdue
        let mut snapshot = Snapshot::default();
        snapshot.rides.push(Ride::new(
            RideId(Utc::now() - chrono::Duration::days(1)),
            RideRequest {
                pickup: "12 Harbour St".to_string(),
                destination: "Airport".to_string(),
                time: "tonight".to_string(),
                fare: 27.5,
                specific_driver: None,
                scheduled_time: Some("00:00".to_string()),
            },
        ));
        store.save(&snapshot).await.unwrap();

        let mut scheduler = Observer::new("scheduler", bus.clone(), store.clone());
        scheduler.hydrate().await.unwrap();
        assert!(scheduler.snapshot().rides[0].is_scheduled());

        let mut watcher = Observer::new("watcher", bus.clone(), store);

        let timer = tokio::spawn(run(scheduler, Duration::from_millis(10)));

        watcher.observe().await.unwrap();
        assert!(watcher.snapshot().rides[0].is_waiting());

        timer.abort();
    });
}
