use std::sync::Arc;

use rand_distr::{Binomial, Distribution, Normal, Uniform};

use crate::api::{DriverAPI, RideAPI};
use crate::entities::{DriverId, DriverRequest, RideRequest};
use crate::error::{io_error, Error};
use crate::store::{MemoryStore, SnapshotStore};
use crate::sync::{Observer, SyncBus};

const CORNERS: [&str; 8] = [
    "Main St and 1st Ave",
    "Main St and 9th Ave",
    "Harbour Rd and Pier 4",
    "Millbrook Plaza",
    "St Vincent's Hospital",
    "Rail Station",
    "Airport Departures",
    "Westgate Mall",
];

fn sample_binomial(n: u64, p: f64) -> u64 {
    let bin = Binomial::new(n, p).unwrap();
    bin.sample(&mut rand::thread_rng())
}

fn sample_corner() -> String {
    let die = Uniform::from(0..CORNERS.len());
    CORNERS[die.sample(&mut rand::thread_rng())].to_string()
}

fn sample_fare() -> f64 {
    let fare_dist: Normal<f64> = Normal::new(22.0, 6.0).unwrap();
    fare_dist.sample(&mut rand::thread_rng()).max(5.0)
}

fn handle_invocation_error<T>(result: Result<T, Error>) {
    match result {
        Ok(_) => {}
        Err(err) => {
            if !err.is_rejection() {
                panic!("unexpected error");
            }

            tracing::warn!("rejected invocation");
        }
    }
}

#[derive(Debug)]
pub struct Report {
    pub completed: usize,
    pub declined: usize,
    pub queue_order: Vec<DriverId>,
}

// Exercises the whole stack in memory: one dispatcher observer feeding rides
// in, one observer per cab accepting, declining and completing. Every
// participant takes its turn on a single task, so each commit lands on the
// latest snapshot and nothing is lost to the last-write-wins race.
pub struct Simulation {
    driver_count: u32,
    ride_count: usize,
}

impl Simulation {
    pub fn new(driver_count: u32, ride_count: usize) -> Self {
        Self {
            driver_count,
            ride_count,
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn run(&self) -> Result<Report, Error> {
        let bus = SyncBus::new(256);
        let store: Arc<dyn SnapshotStore> = Arc::new(MemoryStore::default());

        let mut dispatcher = Observer::new("dispatcher", bus.clone(), store.clone());
        dispatcher.hydrate().await?;

        // put the whole fleet on shift
        let mut fleet = Vec::new();
        for i in 1..=self.driver_count {
            let driver = dispatcher
                .add_driver(DriverRequest {
                    name: format!("Driver {}", i),
                    unit_number: format!("{}", 100 + i),
                    vehicle_model: "Crown Victoria".to_string(),
                    credential: format!("secret-{}", i),
                })
                .await?;

            dispatcher.toggle_driver_availability(driver.id).await?;

            tracing::info!(driver_id = %driver.id, "driver on shift");
            fleet.push(driver.id);
        }

        // each cab joins as its own observer, starting from the stored state
        let mut cabs = Vec::new();
        for driver_id in fleet {
            let mut cab = Observer::new(&format!("cab-{}", driver_id), bus.clone(), store.clone());
            cab.hydrate().await?;
            cabs.push((driver_id, cab));
        }

        let mut published = 0;
        let mut completed = 0;
        let mut declined = 0;

        let mut rounds = 0;
        let max_rounds = 64 + self.ride_count * 16;

        while completed < self.ride_count {
            rounds += 1;
            if rounds > max_rounds {
                return Err(io_error("simulation stalled"));
            }

            if published < self.ride_count {
                let ride = dispatcher
                    .add_ride(RideRequest {
                        pickup: sample_corner(),
                        destination: sample_corner(),
                        time: "now".to_string(),
                        fare: sample_fare(),
                        specific_driver: None,
                        scheduled_time: None,
                    })
                    .await?;

                published += 1;
                tracing::info!(ride_id = %ride.id, "published ride");
            }

            for (driver_id, cab) in cabs.iter_mut() {
                cab.drain()?;

                // a carried ride gets finished before any new offer is taken
                let assigned = cab.snapshot().assignment_for(*driver_id).map(|ride| ride.id);
                if let Some(ride_id) = assigned {
                    tracing::info!(%ride_id, driver_id = %driver_id, "cab completes its ride");
                    cab.complete_ride(ride_id).await?;
                    completed += 1;
                    continue;
                }

                let offer = cab
                    .snapshot()
                    .offers_for(*driver_id)
                    .first()
                    .map(|ride| ride.id);
                if let Some(ride_id) = offer {
                    if sample_binomial(1, 0.7) > 0 {
                        tracing::info!(%ride_id, driver_id = %driver_id, "cab accepts the offer");
                        handle_invocation_error(cab.accept_ride(ride_id, *driver_id).await);
                    } else {
                        tracing::info!(%ride_id, driver_id = %driver_id, "cab declines the offer");
                        handle_invocation_error(cab.decline_ride(ride_id, *driver_id).await);
                        declined += 1;
                    }
                }
            }

            dispatcher.drain()?;
        }

        let queue_order = dispatcher
            .snapshot()
            .drivers_in_queue_order()
            .iter()
            .map(|driver| driver.id)
            .collect();

        tracing::info!(completed, declined, rounds, "simulation finished");

        Ok(Report {
            completed,
            declined,
            queue_order,
        })
    }
}

#[test]
fn a_small_fleet_works_every_ride_to_completion() {
    use tokio_test::block_on;

    let report = block_on(Simulation::new(4, 9).run()).unwrap();

    assert_eq!(report.completed, 9);
    assert_eq!(report.queue_order.len(), 4);

    // rotation permutes the queue, it never loses anybody
    let mut ids: Vec<u32> = report.queue_order.iter().map(|id| id.0).collect();
    ids.sort();
    assert_eq!(ids, vec![1, 2, 3, 4]);
}

#[test]
fn sampled_fares_stay_at_or_above_the_minimum() {
    for _ in 0..64 {
        let fare = sample_fare();

        assert!(fare.is_finite());
        assert!(fare >= 5.0);
    }
}
