use std::fmt;

use chrono::{DateTime, Duration, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entities::DriverId;
use crate::error::{precondition_failed_error, Error};

// The creation instant doubles as the ride id, which keeps the ride list
// chronological and lets a scheduled ride recover its creation date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RideId(pub DateTime<Utc>);

impl RideId {
    // Same-instant creations and skewed clocks get nudged one millisecond
    // past the newest existing id, so ids stay unique and strictly ordered.
    pub fn next(now: DateTime<Utc>, rides: &[Ride]) -> Self {
        match rides.iter().map(|ride| ride.id).max() {
            Some(newest) if now <= newest.0 => Self(newest.0 + Duration::milliseconds(1)),
            _ => Self(now),
        }
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for RideId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Ride {
    pub id: RideId,
    pub status: Status,
    pub pickup: String,
    pub destination: String,
    pub time: String,
    pub fare: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Status {
    Scheduled { dispatch_at: String },
    Waiting { offered_to: Option<DriverId> },
    InProgress { driver_id: DriverId },
    Completed { driver_id: DriverId },
}

impl Status {
    pub fn name(&self) -> String {
        match self {
            Self::Scheduled { dispatch_at: _ } => "scheduled".into(),
            Self::Waiting { offered_to: _ } => "waiting".into(),
            Self::InProgress { driver_id: _ } => "in_progress".into(),
            Self::Completed { driver_id: _ } => "completed".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RideRequest {
    pub pickup: String,
    pub destination: String,
    pub time: String,
    pub fare: f64,
    pub specific_driver: Option<DriverId>,
    pub scheduled_time: Option<String>,
}

impl RideRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if self.pickup.trim().is_empty()
            || self.destination.trim().is_empty()
            || self.time.trim().is_empty()
        {
            return Err(precondition_failed_error());
        }

        if !self.fare.is_finite() || self.fare < 0.0 {
            return Err(precondition_failed_error());
        }

        if let Some(scheduled_time) = &self.scheduled_time {
            if NaiveTime::parse_from_str(scheduled_time, "%H:%M").is_err() {
                return Err(precondition_failed_error());
            }
        }

        Ok(())
    }
}

impl Ride {
    pub fn new(id: RideId, request: RideRequest) -> Self {
        let status = match request.scheduled_time {
            Some(dispatch_at) => Status::Scheduled { dispatch_at },
            None => Status::Waiting { offered_to: None },
        };

        Self {
            id,
            status,
            pickup: request.pickup,
            destination: request.destination,
            time: request.time,
            fare: request.fare,
        }
    }

    pub fn is_scheduled(&self) -> bool {
        match self.status {
            Status::Scheduled { .. } => true,
            _ => false,
        }
    }

    pub fn is_waiting(&self) -> bool {
        match self.status {
            Status::Waiting { .. } => true,
            _ => false,
        }
    }

    pub fn is_in_progress(&self) -> bool {
        match self.status {
            Status::InProgress { .. } => true,
            _ => false,
        }
    }

    pub fn is_completed(&self) -> bool {
        match self.status {
            Status::Completed { .. } => true,
            _ => false,
        }
    }

    pub fn offered_to(&self) -> Option<DriverId> {
        match self.status {
            Status::Waiting { offered_to } => offered_to,
            _ => None,
        }
    }

    pub fn driver_of_record(&self) -> Option<DriverId> {
        match self.status {
            Status::InProgress { driver_id } => Some(driver_id),
            Status::Completed { driver_id } => Some(driver_id),
            _ => None,
        }
    }

    pub fn dispatch_at(&self) -> Option<&str> {
        match &self.status {
            Status::Scheduled { dispatch_at } => Some(dispatch_at.as_str()),
            _ => None,
        }
    }

    // Anchors the "HH:MM" dispatch time to the creation date. A time of day
    // already past at creation means tomorrow.
    pub fn dispatch_instant(&self) -> Option<DateTime<Utc>> {
        let time = NaiveTime::parse_from_str(self.dispatch_at()?, "%H:%M").ok()?;
        let created = self.id.created_at();
        let instant = created.date_naive().and_time(time).and_utc();

        if instant < created {
            return Some(instant + Duration::hours(24));
        }

        Some(instant)
    }

    #[tracing::instrument]
    pub fn offer_to(&mut self, driver_id: Option<DriverId>) -> Result<(), Error> {
        match self.status {
            Status::Waiting { offered_to: _ } => {
                self.status = Status::Waiting {
                    offered_to: driver_id,
                };
                Ok(())
            }
            _ => Err(precondition_failed_error()),
        }
    }

    #[tracing::instrument]
    pub fn activate(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Scheduled { dispatch_at: _ } => {
                self.status = Status::Waiting { offered_to: None };
                Ok(())
            }
            _ => Err(precondition_failed_error()),
        }
    }

    #[tracing::instrument]
    pub fn assign(&mut self, driver_id: DriverId) -> Result<(), Error> {
        match self.status {
            Status::Waiting {
                offered_to: Some(offeree),
            } if offeree == driver_id => {
                self.status = Status::InProgress { driver_id };
                Ok(())
            }
            _ => Err(precondition_failed_error()),
        }
    }

    #[tracing::instrument]
    pub fn decline(&mut self, driver_id: DriverId) -> Result<(), Error> {
        match self.status {
            Status::Waiting {
                offered_to: Some(offeree),
            } if offeree == driver_id => {
                self.status = Status::Waiting { offered_to: None };
                Ok(())
            }
            _ => Err(precondition_failed_error()),
        }
    }

    // Returns an offered or in-progress ride to the open pool when its
    // driver leaves the roster.
    #[tracing::instrument]
    pub fn hand_back(&mut self) -> Result<(), Error> {
        match self.status {
            Status::Waiting { offered_to: _ } | Status::InProgress { driver_id: _ } => {
                self.status = Status::Waiting { offered_to: None };
                Ok(())
            }
            _ => Err(precondition_failed_error()),
        }
    }

    #[tracing::instrument]
    pub fn complete(&mut self) -> Result<(), Error> {
        match self.status {
            Status::InProgress { driver_id } => {
                self.status = Status::Completed { driver_id };
                Ok(())
            }
            // completing twice is a no-op
            Status::Completed { driver_id: _ } => Ok(()),
            _ => Err(precondition_failed_error()),
        }
    }
}

#[test]
fn ids_stay_strictly_ordered() {
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();

    let first = RideId::next(now, &[]);
    assert_eq!(first, RideId(now));

    let ride = Ride::new(
        first,
        RideRequest {
            pickup: "Calle 10".into(),
            destination: "Terminal".into(),
            time: "13:00".into(),
            fare: 12.0,
            specific_driver: None,
            scheduled_time: None,
        },
    );

    let second = RideId::next(now, &[ride.clone()]);
    assert!(second > first);
    assert_eq!(second.0 - first.0, Duration::milliseconds(1));

    let later = now + Duration::seconds(5);
    let third = RideId::next(later, &[ride]);
    assert_eq!(third, RideId(later));
}

#[test]
fn scheduled_requests_enter_scheduled() {
    use chrono::TimeZone;

    let now = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();
    let ride = Ride::new(
        RideId(now),
        RideRequest {
            pickup: "Calle 10".into(),
            destination: "Terminal".into(),
            time: "14:00".into(),
            fare: 12.0,
            specific_driver: None,
            scheduled_time: Some("14:00".into()),
        },
    );

    assert!(ride.is_scheduled());
    assert_eq!(ride.dispatch_at(), Some("14:00"));
    assert_eq!(ride.offered_to(), None);
}

#[test]
fn dispatch_instant_same_day_and_tomorrow() {
    use chrono::TimeZone;

    let created = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();

    // 14:00 scheduled at 13:00 is later today
    let mut ride = Ride::new(
        RideId(created),
        RideRequest {
            pickup: "Calle 10".into(),
            destination: "Terminal".into(),
            time: "14:00".into(),
            fare: 12.0,
            specific_driver: None,
            scheduled_time: Some("14:00".into()),
        },
    );

    assert_eq!(
        ride.dispatch_instant(),
        Some(Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap())
    );

    // 09:00 scheduled at 13:00 already passed, so it is due tomorrow
    ride.status = Status::Scheduled {
        dispatch_at: "09:00".into(),
    };

    assert_eq!(
        ride.dispatch_instant(),
        Some(Utc.with_ymd_and_hms(2024, 5, 11, 9, 0, 0).unwrap())
    );
}

#[test]
fn only_the_offeree_can_accept() {
    let mut ride = Ride {
        id: RideId(Utc::now()),
        status: Status::Waiting {
            offered_to: Some(DriverId(1)),
        },
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    let err = ride.assign(DriverId(2)).unwrap_err();
    assert_eq!(err.code, 101);
    assert_eq!(ride.offered_to(), Some(DriverId(1)));

    ride.assign(DriverId(1)).unwrap();
    assert!(ride.is_in_progress());
    assert_eq!(ride.driver_of_record(), Some(DriverId(1)));
}

#[test]
fn decline_clears_the_offer() {
    let mut ride = Ride {
        id: RideId(Utc::now()),
        status: Status::Waiting {
            offered_to: Some(DriverId(1)),
        },
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    let err = ride.decline(DriverId(2)).unwrap_err();
    assert_eq!(err.code, 101);

    ride.decline(DriverId(1)).unwrap();
    assert!(ride.is_waiting());
    assert_eq!(ride.offered_to(), None);
}

#[test]
fn complete_is_idempotent() {
    let mut ride = Ride {
        id: RideId(Utc::now()),
        status: Status::InProgress {
            driver_id: DriverId(1),
        },
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    ride.complete().unwrap();
    assert!(ride.is_completed());

    ride.complete().unwrap();
    assert!(ride.is_completed());
    assert_eq!(ride.driver_of_record(), Some(DriverId(1)));
}

#[test]
fn complete_requires_an_active_ride() {
    let mut ride = Ride {
        id: RideId(Utc::now()),
        status: Status::Waiting { offered_to: None },
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    let err = ride.complete().unwrap_err();
    assert_eq!(err.code, 101);
    assert!(ride.is_waiting());
}

#[test]
fn hand_back_reopens_the_ride() {
    let mut ride = Ride {
        id: RideId(Utc::now()),
        status: Status::InProgress {
            driver_id: DriverId(1),
        },
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
    };

    ride.hand_back().unwrap();
    assert!(ride.is_waiting());
    assert_eq!(ride.offered_to(), None);
}

#[test]
fn request_validation_rejects_bad_input() {
    let request = RideRequest {
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
        specific_driver: None,
        scheduled_time: None,
    };

    request.validate().unwrap();

    let mut bad = request.clone();
    bad.pickup = "".into();
    assert_eq!(bad.validate().unwrap_err().code, 101);

    let mut bad = request.clone();
    bad.fare = -1.0;
    assert_eq!(bad.validate().unwrap_err().code, 101);

    let mut bad = request.clone();
    bad.fare = f64::NAN;
    assert_eq!(bad.validate().unwrap_err().code, 101);

    let mut bad = request.clone();
    bad.scheduled_time = Some("half past two".into());
    assert_eq!(bad.validate().unwrap_err().code, 101);

    let mut bad = request;
    bad.scheduled_time = Some("25:00".into());
    assert_eq!(bad.validate().unwrap_err().code, 101);
}
