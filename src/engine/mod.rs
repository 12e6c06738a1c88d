mod drivers;
mod rides;
pub mod schedule;

use chrono::{DateTime, Utc};

use crate::entities::{DriverId, DriverRequest, RideId, RideRequest, Snapshot};
use crate::error::Error;

#[derive(Clone, Debug)]
pub enum Command {
    AddRide(RideRequest),
    AcceptRide {
        ride_id: RideId,
        driver_id: DriverId,
    },
    DeclineRide {
        ride_id: RideId,
        driver_id: DriverId,
    },
    CompleteRide {
        ride_id: RideId,
    },
    ActivateScheduledRide {
        ride_id: RideId,
    },
    AddDriver(DriverRequest),
    EditDriver {
        driver_id: DriverId,
        request: DriverRequest,
    },
    RemoveDriver {
        driver_id: DriverId,
    },
    ToggleDriverAvailability {
        driver_id: DriverId,
    },
    ChangeAdminPassword {
        new_secret: String,
    },
    ChangeSuperAdminCredential {
        new_secret: String,
    },
}

// One atomic transition: either a fully updated copy of the snapshot comes
// back, or the caller's state is left untouched. The version field is the
// sync layer's and is never bumped here.
#[tracing::instrument(skip_all)]
pub fn apply(
    snapshot: &Snapshot,
    command: Command,
    now: DateTime<Utc>,
) -> Result<Snapshot, Error> {
    let mut next = snapshot.clone();

    match command {
        Command::AddRide(request) => rides::add(&mut next, request, now)?,
        Command::AcceptRide { ride_id, driver_id } => rides::accept(&mut next, ride_id, driver_id)?,
        Command::DeclineRide { ride_id, driver_id } => {
            rides::decline(&mut next, ride_id, driver_id)?
        }
        Command::CompleteRide { ride_id } => rides::complete(&mut next, ride_id)?,
        Command::ActivateScheduledRide { ride_id } => rides::activate(&mut next, ride_id)?,
        Command::AddDriver(request) => drivers::add(&mut next, request)?,
        Command::EditDriver { driver_id, request } => drivers::edit(&mut next, driver_id, request)?,
        Command::RemoveDriver { driver_id } => drivers::remove(&mut next, driver_id)?,
        Command::ToggleDriverAvailability { driver_id } => drivers::toggle(&mut next, driver_id)?,
        Command::ChangeAdminPassword { new_secret } => {
            drivers::change_admin_password(&mut next, new_secret)?
        }
        Command::ChangeSuperAdminCredential { new_secret } => {
            drivers::change_super_admin_credential(&mut next, new_secret)?
        }
    }

    Ok(next)
}

// Hands the oldest unoffered waiting ride to the best-positioned available
// driver, if both exist.
fn offer_oldest_unoffered(snapshot: &mut Snapshot) -> Result<(), Error> {
    let offeree = match snapshot.roster.first_available() {
        Some(id) => id,
        None => return Ok(()),
    };

    let maybe_ride = snapshot
        .rides
        .iter_mut()
        .find(|ride| ride.is_waiting() && ride.offered_to().is_none());

    if let Some(ride) = maybe_ride {
        tracing::info!(ride_id = %ride.id, driver_id = %offeree, "offering idle ride");
        ride.offer_to(Some(offeree))?;
    }

    Ok(())
}

#[test]
fn apply_never_mutates_the_given_snapshot() {
    use crate::entities::RideId;

    let snapshot = Snapshot::default();

    let err = apply(
        &snapshot,
        Command::CompleteRide {
            ride_id: RideId(Utc::now()),
        },
        Utc::now(),
    )
    .unwrap_err();
    assert_eq!(err.code, 100);

    let next = apply(
        &snapshot,
        Command::AddDriver(DriverRequest {
            name: "Ana".into(),
            unit_number: "12".into(),
            vehicle_model: "Toyota Corolla".into(),
            credential: "12".into(),
        }),
        Utc::now(),
    )
    .unwrap();

    assert!(snapshot.roster.drivers.is_empty());
    assert_eq!(next.roster.drivers.len(), 1);

    // versioning belongs to the sync layer
    assert_eq!(next.version, snapshot.version);
}
