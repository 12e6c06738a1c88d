use crate::entities::{DriverId, DriverRequest, Snapshot};
use crate::error::{precondition_failed_error, Error};

#[tracing::instrument(skip_all)]
pub fn add(snapshot: &mut Snapshot, request: DriverRequest) -> Result<(), Error> {
    request.validate()?;

    let id = snapshot.roster.add(request);
    tracing::info!(
        driver_id = %id,
        position = snapshot.roster.drivers.len(),
        "driver joined the roster"
    );

    Ok(())
}

#[tracing::instrument(skip(snapshot, request))]
pub fn edit(
    snapshot: &mut Snapshot,
    driver_id: DriverId,
    request: DriverRequest,
) -> Result<(), Error> {
    request.validate()?;
    snapshot.roster.edit(driver_id, request)?;

    tracing::info!(%driver_id, "driver profile updated");
    Ok(())
}

#[tracing::instrument(skip(snapshot))]
pub fn remove(snapshot: &mut Snapshot, driver_id: DriverId) -> Result<(), Error> {
    let removed = snapshot.roster.remove(driver_id)?;

    // every ride the driver was offered or carrying goes back to the pool;
    // completed rides keep their historical driver reference
    let mut handed_back = vec![];
    for ride in snapshot.rides.iter_mut() {
        let held = ride.offered_to() == Some(removed.id)
            || (ride.is_in_progress() && ride.driver_of_record() == Some(removed.id));

        if held {
            ride.hand_back()?;
            handed_back.push(ride.id);
        }
    }

    if !handed_back.is_empty() {
        tracing::warn!(
            %driver_id,
            count = handed_back.len(),
            "removed driver held rides, returning them to the pool"
        );
    }

    if let Some(offeree) = snapshot.roster.first_available() {
        for ride_id in handed_back {
            if let Some(ride) = snapshot.ride_mut(ride_id) {
                ride.offer_to(Some(offeree))?;
            }
        }
    }

    tracing::info!(%driver_id, "driver removed from the roster");
    Ok(())
}

#[tracing::instrument(skip(snapshot))]
pub fn toggle(snapshot: &mut Snapshot, driver_id: DriverId) -> Result<(), Error> {
    let now_available = snapshot.roster.toggle(driver_id)?;
    tracing::info!(%driver_id, now_available, "driver availability toggled");

    // going off shift keeps any outstanding offer with the driver
    if now_available {
        super::offer_oldest_unoffered(snapshot)?;
    }

    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn change_admin_password(snapshot: &mut Snapshot, new_secret: String) -> Result<(), Error> {
    if new_secret.trim().is_empty() {
        return Err(precondition_failed_error());
    }

    snapshot.credentials.admin_password = new_secret;
    tracing::info!("admin password changed");
    Ok(())
}

#[tracing::instrument(skip_all)]
pub fn change_super_admin_credential(
    snapshot: &mut Snapshot,
    new_secret: String,
) -> Result<(), Error> {
    if new_secret.trim().is_empty() {
        return Err(precondition_failed_error());
    }

    snapshot.credentials.super_admin_credential = new_secret;
    tracing::info!("super admin credential changed");
    Ok(())
}

#[cfg(test)]
fn driver_request(i: u32) -> DriverRequest {
    DriverRequest {
        name: format!("Driver {}", i),
        unit_number: format!("{}", i),
        vehicle_model: "Toyota Corolla".into(),
        credential: format!("{}", i),
    }
}

#[cfg(test)]
fn ride_request() -> crate::entities::RideRequest {
    crate::entities::RideRequest {
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
        specific_driver: None,
        scheduled_time: None,
    }
}

#[test]
fn add_joins_the_back_of_the_queue_unavailable() {
    let mut snapshot = Snapshot::default();

    add(&mut snapshot, driver_request(1)).unwrap();
    add(&mut snapshot, driver_request(2)).unwrap();

    let drivers = snapshot.roster.in_queue_order();
    assert_eq!(drivers[0].position, 1);
    assert_eq!(drivers[1].position, 2);
    assert!(!drivers[0].is_available);
    assert!(!drivers[1].is_available);
    assert_eq!(snapshot.roster.next_id, 3);
}

#[test]
fn add_requires_a_complete_profile() {
    let mut snapshot = Snapshot::default();

    let mut request = driver_request(1);
    request.unit_number = "".into();

    let err = add(&mut snapshot, request).unwrap_err();
    assert_eq!(err.code, 101);
    assert!(snapshot.roster.drivers.is_empty());
}

#[test]
fn edit_touches_the_profile_and_nothing_else() {
    let mut snapshot = Snapshot::default();
    add(&mut snapshot, driver_request(1)).unwrap();
    add(&mut snapshot, driver_request(2)).unwrap();

    let mut request = driver_request(1);
    request.name = "Ana Maria".into();
    request.unit_number = "15".into();
    edit(&mut snapshot, DriverId(2), request).unwrap();

    let driver = snapshot.roster.driver(DriverId(2)).unwrap();
    assert_eq!(driver.name, "Ana Maria");
    assert_eq!(driver.unit_number, "15");
    assert_eq!(driver.position, 2);

    let err = edit(&mut snapshot, DriverId(9), driver_request(1)).unwrap_err();
    assert_eq!(err.code, 100);

    let mut request = driver_request(1);
    request.name = "  ".into();
    let err = edit(&mut snapshot, DriverId(1), request).unwrap_err();
    assert_eq!(err.code, 101);
}

#[test]
fn remove_compacts_and_reoffers_a_held_offer() {
    let mut snapshot = Snapshot::default();
    for i in 1..=3 {
        add(&mut snapshot, driver_request(i)).unwrap();
        toggle(&mut snapshot, DriverId(i)).unwrap();
    }

    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));

    remove(&mut snapshot, DriverId(1)).unwrap();

    // the ride stays waiting and moves to the next driver by position
    assert!(snapshot.rides[0].is_waiting());
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(2)));

    assert_eq!(snapshot.roster.drivers.len(), 2);
    assert!(snapshot.roster.positions_are_dense());
}

#[test]
fn remove_hands_back_every_ride_the_driver_held() {
    let mut snapshot = Snapshot::default();
    add(&mut snapshot, driver_request(1)).unwrap();
    add(&mut snapshot, driver_request(2)).unwrap();
    toggle(&mut snapshot, DriverId(1)).unwrap();

    // driver 1 accepts one ride and is offered a second
    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    let first = snapshot.rides[0].id;
    super::rides::accept(&mut snapshot, first, DriverId(1)).unwrap();

    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    let second = snapshot.rides[1].id;
    assert_eq!(snapshot.ride(second).unwrap().offered_to(), Some(DriverId(1)));

    toggle(&mut snapshot, DriverId(2)).unwrap();
    remove(&mut snapshot, DriverId(1)).unwrap();

    // both the assignment and the offer return to waiting and land on driver 2
    assert!(snapshot.ride(first).unwrap().is_waiting());
    assert_eq!(snapshot.ride(first).unwrap().offered_to(), Some(DriverId(2)));
    assert_eq!(snapshot.ride(second).unwrap().offered_to(), Some(DriverId(2)));
}

#[test]
fn remove_leaves_completed_history_in_place() {
    let mut snapshot = Snapshot::default();
    add(&mut snapshot, driver_request(1)).unwrap();
    toggle(&mut snapshot, DriverId(1)).unwrap();

    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    let ride_id = snapshot.rides[0].id;
    super::rides::accept(&mut snapshot, ride_id, DriverId(1)).unwrap();
    super::rides::complete(&mut snapshot, ride_id).unwrap();

    remove(&mut snapshot, DriverId(1)).unwrap();

    // the dangling driver reference is the history, not an error
    assert!(snapshot.rides[0].is_completed());
    assert_eq!(snapshot.rides[0].driver_of_record(), Some(DriverId(1)));
    assert!(snapshot.roster.drivers.is_empty());
}

#[test]
fn toggle_on_picks_up_the_oldest_idle_ride() {
    let mut snapshot = Snapshot::default();
    add(&mut snapshot, driver_request(1)).unwrap();
    add(&mut snapshot, driver_request(2)).unwrap();

    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    let first = snapshot.rides[0].id;
    let second = snapshot.rides[1].id;

    toggle(&mut snapshot, DriverId(2)).unwrap();
    assert_eq!(snapshot.ride(first).unwrap().offered_to(), Some(DriverId(2)));
    assert_eq!(snapshot.ride(second).unwrap().offered_to(), None);

    toggle(&mut snapshot, DriverId(1)).unwrap();
    assert_eq!(snapshot.ride(second).unwrap().offered_to(), Some(DriverId(1)));
}

#[test]
fn toggle_off_keeps_the_outstanding_offer() {
    let mut snapshot = Snapshot::default();
    add(&mut snapshot, driver_request(1)).unwrap();
    toggle(&mut snapshot, DriverId(1)).unwrap();

    super::rides::add(&mut snapshot, ride_request(), chrono::Utc::now()).unwrap();
    toggle(&mut snapshot, DriverId(1)).unwrap();

    assert!(!snapshot.roster.driver(DriverId(1)).unwrap().is_available);
    assert_eq!(snapshot.rides[0].offered_to(), Some(DriverId(1)));
}

#[test]
fn unknown_driver_ids_are_rejected() {
    let mut snapshot = Snapshot::default();

    assert_eq!(remove(&mut snapshot, DriverId(9)).unwrap_err().code, 100);
    assert_eq!(toggle(&mut snapshot, DriverId(9)).unwrap_err().code, 100);
}

#[test]
fn secret_changes_require_a_non_empty_secret() {
    let mut snapshot = Snapshot::default();

    change_admin_password(&mut snapshot, "hunter2".into()).unwrap();
    assert!(snapshot.credentials.admin_matches("hunter2"));
    assert!(!snapshot.credentials.admin_matches("Admin"));

    let err = change_admin_password(&mut snapshot, "  ".into()).unwrap_err();
    assert_eq!(err.code, 101);
    assert!(snapshot.credentials.admin_matches("hunter2"));

    change_super_admin_credential(&mut snapshot, "keymaster".into()).unwrap();
    assert!(snapshot.credentials.super_admin_matches("keymaster"));

    let err = change_super_admin_credential(&mut snapshot, "".into()).unwrap_err();
    assert_eq!(err.code, 101);
}
