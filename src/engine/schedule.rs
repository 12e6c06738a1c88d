use chrono::{DateTime, Utc};

use crate::entities::{RideId, Snapshot};

// Every scheduled ride whose dispatch instant has passed. The caller turns
// each id into an ActivateScheduledRide command; racing activations from
// other observers surface there as rejections, not here.
pub fn due_activations(snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<RideId> {
    snapshot
        .rides
        .iter()
        .filter(|ride| match ride.dispatch_instant() {
            Some(instant) => instant <= now,
            None => false,
        })
        .map(|ride| ride.id)
        .collect()
}

#[test]
fn sweep_finds_only_rides_past_their_dispatch_instant() {
    use crate::entities::{Ride, RideRequest};
    use chrono::{Duration, TimeZone};

    let created = Utc.with_ymd_and_hms(2024, 5, 10, 13, 0, 0).unwrap();
    let request = |scheduled_time: Option<&str>| RideRequest {
        pickup: "Calle 10".into(),
        destination: "Terminal".into(),
        time: "13:00".into(),
        fare: 12.0,
        specific_driver: None,
        scheduled_time: scheduled_time.map(|t| t.into()),
    };

    let mut snapshot = Snapshot::default();
    // due later today at 14:00
    snapshot
        .rides
        .push(Ride::new(RideId(created), request(Some("14:00"))));
    // 09:00 has already passed at creation, so due tomorrow
    snapshot.rides.push(Ride::new(
        RideId(created + Duration::milliseconds(1)),
        request(Some("09:00")),
    ));
    // unscheduled rides never come up
    snapshot.rides.push(Ride::new(
        RideId(created + Duration::milliseconds(2)),
        request(None),
    ));

    let today_14 = snapshot.rides[0].id;
    let tomorrow_9 = snapshot.rides[1].id;

    assert!(due_activations(&snapshot, created).is_empty());

    let at_14 = Utc.with_ymd_and_hms(2024, 5, 10, 14, 0, 0).unwrap();
    assert_eq!(due_activations(&snapshot, at_14), vec![today_14]);

    let next_morning = Utc.with_ymd_and_hms(2024, 5, 11, 9, 0, 0).unwrap();
    assert_eq!(
        due_activations(&snapshot, next_morning),
        vec![today_14, tomorrow_9]
    );
}
