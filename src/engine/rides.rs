use chrono::{DateTime, Utc};

use crate::entities::{DriverId, Ride, RideId, RideRequest, Snapshot};
use crate::error::{not_found_error, Error};

#[tracing::instrument(skip_all)]
pub fn add(snapshot: &mut Snapshot, request: RideRequest, now: DateTime<Utc>) -> Result<(), Error> {
    request.validate()?;

    if let Some(driver_id) = request.specific_driver {
        if snapshot.roster.driver(driver_id).is_none() {
            tracing::info!(%driver_id, "requested driver is not on the roster, rejecting ride");
            return Err(not_found_error());
        }
    }

    let specific_driver = request.specific_driver;
    let id = RideId::next(now, &snapshot.rides);
    let mut ride = Ride::new(id, request);

    if ride.is_waiting() {
        // a specifically requested driver gets the offer regardless of
        // availability or position; otherwise the queue decides
        let offeree = specific_driver.or_else(|| snapshot.roster.first_available());
        ride.offer_to(offeree)?;

        match offeree {
            Some(driver_id) => tracing::info!(ride_id = %ride.id, %driver_id, "created ride"),
            None => tracing::warn!(ride_id = %ride.id, "created ride with no driver to offer it to"),
        }
    } else {
        tracing::info!(ride_id = %ride.id, status = ride.status.name(), "created ride");
    }

    snapshot.rides.push(ride);

    Ok(())
}

#[tracing::instrument(skip(snapshot))]
pub fn accept(snapshot: &mut Snapshot, ride_id: RideId, driver_id: DriverId) -> Result<(), Error> {
    if snapshot.roster.driver(driver_id).is_none() {
        return Err(not_found_error());
    }

    let ride = snapshot.ride_mut(ride_id).ok_or_else(|| not_found_error())?;
    ride.assign(driver_id)?;

    snapshot.roster.rotate_to_back(driver_id)?;

    tracing::info!(%ride_id, %driver_id, "ride accepted, driver rotated to the back");

    // the new front of the queue can take over an idle ride
    super::offer_oldest_unoffered(snapshot)
}

#[tracing::instrument(skip(snapshot))]
pub fn decline(snapshot: &mut Snapshot, ride_id: RideId, driver_id: DriverId) -> Result<(), Error> {
    if snapshot.roster.driver(driver_id).is_none() {
        return Err(not_found_error());
    }

    {
        let ride = snapshot.ride_mut(ride_id).ok_or_else(|| not_found_error())?;
        ride.decline(driver_id)?;
    }

    snapshot.roster.rotate_to_back(driver_id)?;

    // reassign over the rotated order; the decliner comes back into play
    // only if nobody else is available
    let offeree = snapshot.roster.first_available();
    let ride = snapshot.ride_mut(ride_id).ok_or_else(|| not_found_error())?;
    ride.offer_to(offeree)?;

    match offeree {
        Some(next_driver) => {
            tracing::info!(%ride_id, %driver_id, %next_driver, "ride declined, reoffered")
        }
        None => tracing::warn!(%ride_id, %driver_id, "ride declined with nobody available, ride idles"),
    }

    Ok(())
}

#[tracing::instrument(skip(snapshot))]
pub fn complete(snapshot: &mut Snapshot, ride_id: RideId) -> Result<(), Error> {
    let ride = snapshot.ride_mut(ride_id).ok_or_else(|| not_found_error())?;
    ride.complete()?;

    tracing::info!(%ride_id, "ride completed");
    Ok(())
}

#[tracing::instrument(skip(snapshot))]
pub fn activate(snapshot: &mut Snapshot, ride_id: RideId) -> Result<(), Error> {
    let offeree = snapshot.roster.first_available();

    let ride = snapshot.ride_mut(ride_id).ok_or_else(|| not_found_error())?;
    ride.activate()?;
    ride.offer_to(offeree)?;

    match offeree {
        Some(driver_id) => tracing::info!(%ride_id, %driver_id, "scheduled ride dispatched"),
        None => tracing::warn!(%ride_id, "scheduled ride dispatched with no driver to offer it to"),
    }

    Ok(())
}

#[cfg(test)]
fn fleet(count: u32, available: &[u32]) -> Snapshot {
    use crate::entities::DriverRequest;

    let mut snapshot = Snapshot::default();

    for i in 1..=count {
        snapshot.roster.add(DriverRequest {
            name: format!("Driver {}", i),
            unit_number: format!("{}", i),
            vehicle_model: "Toyota Corolla".into(),
            credential: format!("{}", i),
        });
    }

    for id in available {
        snapshot.roster.toggle(DriverId(*id)).unwrap();
    }

    snapshot
}

#[cfg(test)]
fn ride_request() -> RideRequest {
    RideRequest {
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
        specific_driver: None,
        scheduled_time: None,
    }
}

#[test]
fn add_offers_the_first_available_driver() {
    let mut snapshot = fleet(3, &[2, 3]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();

    let ride = &snapshot.rides[0];
    assert!(ride.is_waiting());
    assert_eq!(ride.offered_to(), Some(DriverId(2)));
}

#[test]
fn add_with_nobody_available_leaves_the_ride_idle() {
    let mut snapshot = fleet(2, &[]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();

    let ride = &snapshot.rides[0];
    assert!(ride.is_waiting());
    assert_eq!(ride.offered_to(), None);
}

#[test]
fn add_for_a_specific_driver_bypasses_the_queue() {
    let mut snapshot = fleet(3, &[1]);

    let mut request = ride_request();
    request.specific_driver = Some(DriverId(3));
    add(&mut snapshot, request, Utc::now()).unwrap();

    // driver 3 is neither available nor at the front and still gets the offer
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(3)));
}

#[test]
fn add_for_an_unknown_driver_is_rejected() {
    let mut snapshot = fleet(2, &[1]);

    let mut request = ride_request();
    request.specific_driver = Some(DriverId(9));

    let err = add(&mut snapshot, request, Utc::now()).unwrap_err();
    assert_eq!(err.code, 100);
    assert!(snapshot.rides.is_empty());
}

#[test]
fn add_with_a_scheduled_time_waits_for_activation() {
    let mut snapshot = fleet(2, &[1, 2]);

    let mut request = ride_request();
    request.scheduled_time = Some("14:00".into());
    request.specific_driver = Some(DriverId(2));
    add(&mut snapshot, request, Utc::now()).unwrap();

    // the requested driver is validated but not recorded; activation
    // offers by queue order
    let ride = &snapshot.rides[0];
    assert!(ride.is_scheduled());
    assert_eq!(ride.dispatch_at(), Some("14:00"));
    assert_eq!(ride.offered_to(), None);
}

#[test]
fn accept_assigns_and_rotates_the_accepter() {
    let mut snapshot = fleet(3, &[1, 2, 3]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));

    accept(&mut snapshot, ride_id, DriverId(1)).unwrap();

    assert!(snapshot.rides[0].is_in_progress());
    assert_eq!(snapshot.rides[0].driver_of_record(), Some(DriverId(1)));

    let order: Vec<DriverId> = snapshot
        .roster
        .in_queue_order()
        .iter()
        .map(|driver| driver.id)
        .collect();
    assert_eq!(order, vec![DriverId(2), DriverId(3), DriverId(1)]);
    assert!(snapshot.roster.positions_are_dense());
}

#[test]
fn accept_by_a_driver_without_the_offer_is_rejected() {
    let mut snapshot = fleet(2, &[1, 2]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    let err = accept(&mut snapshot, ride_id, DriverId(2)).unwrap_err();
    assert!(err.is_precondition_failed_error());

    // nothing moved
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));
    assert_eq!(snapshot.roster.in_queue_order()[0].id, DriverId(1));
}

#[test]
fn accept_hands_the_queue_front_an_idle_ride() {
    let mut snapshot = fleet(2, &[1]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let first = snapshot.rides[0].id;

    // driver 1 goes off shift while still holding the offer
    super::drivers::toggle(&mut snapshot, DriverId(1)).unwrap();

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let second = snapshot.rides[1].id;
    let third = snapshot.rides[2].id;
    assert_eq!(snapshot.rides[1].offered_to(), None);
    assert_eq!(snapshot.rides[2].offered_to(), None);

    // driver 2 comes on shift and picks up the oldest idle ride
    super::drivers::toggle(&mut snapshot, DriverId(2)).unwrap();
    assert_eq!(snapshot.ride(second).unwrap().offered_to(), Some(DriverId(2)));

    // accepting the first ride frees the engine to place the next idle one
    accept(&mut snapshot, first, DriverId(1)).unwrap();
    assert_eq!(snapshot.ride(third).unwrap().offered_to(), Some(DriverId(2)));
}

#[test]
fn decline_rotates_and_reoffers_to_the_new_front() {
    let mut snapshot = fleet(5, &[1, 2, 3, 4, 5]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));

    decline(&mut snapshot, ride_id, DriverId(1)).unwrap();

    // the old second driver now leads and holds the offer
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(2)));

    let order: Vec<DriverId> = snapshot
        .roster
        .in_queue_order()
        .iter()
        .map(|driver| driver.id)
        .collect();
    assert_eq!(
        order,
        vec![
            DriverId(2),
            DriverId(3),
            DriverId(4),
            DriverId(5),
            DriverId(1),
        ]
    );
    assert!(snapshot.roster.positions_are_dense());
}

#[test]
fn decline_by_the_only_available_driver_reoffers_them() {
    let mut snapshot = fleet(3, &[2]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    decline(&mut snapshot, ride_id, DriverId(2)).unwrap();

    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(2)));
    assert_eq!(
        snapshot.roster.driver(DriverId(2)).unwrap().position,
        3,
        "decliner still rotates to the back"
    );
}

#[test]
fn decline_with_nobody_available_idles_the_ride() {
    let mut snapshot = fleet(2, &[1]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    super::drivers::toggle(&mut snapshot, DriverId(1)).unwrap();
    decline(&mut snapshot, ride_id, DriverId(1)).unwrap();

    assert!(snapshot.rides[0].is_waiting());
    assert_eq!(snapshot.rides[0].offered_to(), None);
}

#[test]
fn complete_finishes_an_accepted_ride() {
    let mut snapshot = fleet(1, &[1]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    accept(&mut snapshot, ride_id, DriverId(1)).unwrap();
    complete(&mut snapshot, ride_id).unwrap();

    assert!(snapshot.rides[0].is_completed());
    assert_eq!(snapshot.completed_count_for(DriverId(1)), 1);

    // completing again changes nothing
    complete(&mut snapshot, ride_id).unwrap();
    assert_eq!(snapshot.completed_count_for(DriverId(1)), 1);
}

#[test]
fn complete_rejects_a_ride_that_never_started() {
    let mut snapshot = fleet(1, &[]);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    let err = complete(&mut snapshot, ride_id).unwrap_err();
    assert_eq!(err.code, 101);
    assert!(snapshot.rides[0].is_waiting());
}

#[test]
fn activate_dispatches_by_queue_order() {
    let mut snapshot = fleet(2, &[2]);

    let mut request = ride_request();
    request.scheduled_time = Some("14:00".into());
    add(&mut snapshot, request, Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    activate(&mut snapshot, ride_id).unwrap();

    let ride = &snapshot.rides[0];
    assert!(ride.is_waiting());
    assert_eq!(ride.offered_to(), Some(DriverId(2)));
    assert_eq!(ride.dispatch_at(), None);

    let err = activate(&mut snapshot, ride_id).unwrap_err();
    assert_eq!(err.code, 101);
}

#[test]
fn unknown_ids_are_rejected_without_effect() {
    let mut snapshot = fleet(1, &[1]);
    let missing = RideId(Utc::now());

    assert_eq!(accept(&mut snapshot, missing, DriverId(1)).unwrap_err().code, 100);
    assert_eq!(decline(&mut snapshot, missing, DriverId(1)).unwrap_err().code, 100);
    assert_eq!(complete(&mut snapshot, missing).unwrap_err().code, 100);
    assert_eq!(activate(&mut snapshot, missing).unwrap_err().code, 100);

    add(&mut snapshot, ride_request(), Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;

    assert_eq!(accept(&mut snapshot, ride_id, DriverId(9)).unwrap_err().code, 100);
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));
}
