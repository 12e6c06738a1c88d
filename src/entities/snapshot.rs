use serde::{Deserialize, Serialize};

use crate::entities::{Credentials, Driver, DriverId, Ride, RideId, Roster};

// The whole shared state as one versioned document. The version is only
// ever bumped by the sync layer on commit, never by the engine.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub version: u64,
    #[serde(default)]
    pub roster: Roster,
    #[serde(default)]
    pub rides: Vec<Ride>,
    #[serde(default)]
    pub credentials: Credentials,
}

impl Snapshot {
    pub fn ride(&self, id: RideId) -> Option<&Ride> {
        self.rides.iter().find(|ride| ride.id == id)
    }

    pub fn ride_mut(&mut self, id: RideId) -> Option<&mut Ride> {
        self.rides.iter_mut().find(|ride| ride.id == id)
    }

    pub fn driver(&self, id: DriverId) -> Option<&Driver> {
        self.roster.driver(id)
    }

    pub fn drivers_in_queue_order(&self) -> &[Driver] {
        self.roster.in_queue_order()
    }

    // Board columns; chronological because rides are stored in id order.

    pub fn scheduled_rides(&self) -> Vec<&Ride> {
        self.rides.iter().filter(|ride| ride.is_scheduled()).collect()
    }

    pub fn waiting_rides(&self) -> Vec<&Ride> {
        self.rides.iter().filter(|ride| ride.is_waiting()).collect()
    }

    pub fn in_progress_rides(&self) -> Vec<&Ride> {
        self.rides
            .iter()
            .filter(|ride| ride.is_in_progress())
            .collect()
    }

    pub fn completed_rides(&self) -> Vec<&Ride> {
        self.rides.iter().filter(|ride| ride.is_completed()).collect()
    }

    pub fn offers_for(&self, driver_id: DriverId) -> Vec<&Ride> {
        self.rides
            .iter()
            .filter(|ride| ride.offered_to() == Some(driver_id))
            .collect()
    }

    pub fn assignment_for(&self, driver_id: DriverId) -> Option<&Ride> {
        self.rides
            .iter()
            .find(|ride| ride.is_in_progress() && ride.driver_of_record() == Some(driver_id))
    }

    pub fn completed_count_for(&self, driver_id: DriverId) -> usize {
        self.rides
            .iter()
            .filter(|ride| ride.is_completed() && ride.driver_of_record() == Some(driver_id))
            .count()
    }
}

#[cfg(test)]
fn board() -> Snapshot {
    use crate::entities::Status;
    use chrono::{Duration, TimeZone, Utc};

    let base = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();
    let ride = |minute: i64, status: Status| Ride {
        id: RideId(base + Duration::minutes(minute)),
        status,
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    Snapshot {
        version: 0,
        roster: Roster::default(),
        rides: vec![
            ride(
                0,
                Status::Completed {
                    driver_id: DriverId(1),
                },
            ),
            ride(
                1,
                Status::InProgress {
                    driver_id: DriverId(1),
                },
            ),
            ride(
                2,
                Status::Waiting {
                    offered_to: Some(DriverId(1)),
                },
            ),
            ride(
                3,
                Status::Scheduled {
                    dispatch_at: "15:30".into(),
                },
            ),
            ride(4, Status::Waiting { offered_to: None }),
        ],
        credentials: Credentials::default(),
    }
}

#[test]
fn board_columns_split_by_status() {
    let snapshot = board();

    assert_eq!(snapshot.scheduled_rides().len(), 1);
    assert_eq!(snapshot.waiting_rides().len(), 2);
    assert_eq!(snapshot.in_progress_rides().len(), 1);
    assert_eq!(snapshot.completed_rides().len(), 1);
}

#[test]
fn per_driver_queries_follow_the_driver_of_record() {
    let snapshot = board();

    let offers = snapshot.offers_for(DriverId(1));
    assert_eq!(offers.len(), 1);
    assert!(offers[0].is_waiting());

    assert!(snapshot.assignment_for(DriverId(1)).is_some());
    assert!(snapshot.assignment_for(DriverId(2)).is_none());

    assert_eq!(snapshot.completed_count_for(DriverId(1)), 1);
    assert_eq!(snapshot.completed_count_for(DriverId(2)), 0);
}

#[test]
fn hydrates_from_an_empty_document() {
    let snapshot: Snapshot = serde_json::from_str("{}").unwrap();

    assert_eq!(snapshot.version, 0);
    assert!(snapshot.rides.is_empty());
    assert!(snapshot.roster.drivers.is_empty());
    assert!(snapshot.credentials.admin_matches("Admin"));
}
