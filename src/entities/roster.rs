use serde::{Deserialize, Serialize};

use crate::entities::{Driver, DriverId, DriverRequest};
use crate::error::{not_found_error, Error};

fn first_id() -> u32 {
    1
}

// Drivers are kept sorted by position; every mutation below preserves
// positions as a dense permutation of 1..=N.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Roster {
    #[serde(default = "first_id")]
    pub next_id: u32,
    #[serde(default)]
    pub drivers: Vec<Driver>,
}

impl Default for Roster {
    fn default() -> Self {
        Self {
            next_id: first_id(),
            drivers: vec![],
        }
    }
}

impl Roster {
    pub fn driver(&self, id: DriverId) -> Option<&Driver> {
        self.drivers.iter().find(|driver| driver.id == id)
    }

    pub fn driver_by_unit(&self, unit_number: &str) -> Option<&Driver> {
        self.drivers
            .iter()
            .find(|driver| driver.unit_number == unit_number)
    }

    pub fn add(&mut self, request: DriverRequest) -> DriverId {
        let id = DriverId(self.next_id);
        self.next_id += 1;

        let position = self.drivers.len() as u32 + 1;
        self.drivers.push(Driver::new(id, position, request));

        id
    }

    pub fn edit(&mut self, id: DriverId, request: DriverRequest) -> Result<(), Error> {
        match self.drivers.iter_mut().find(|driver| driver.id == id) {
            Some(driver) => {
                driver.apply_edit(request);
                Ok(())
            }
            None => Err(not_found_error()),
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn remove(&mut self, id: DriverId) -> Result<Driver, Error> {
        let index = self
            .drivers
            .iter()
            .position(|driver| driver.id == id)
            .ok_or_else(|| not_found_error())?;

        let removed = self.drivers.remove(index);

        // close the gap left by the removed position
        for driver in self.drivers.iter_mut() {
            if driver.position > removed.position {
                driver.position -= 1;
            }
        }

        Ok(removed)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: DriverId) -> Result<bool, Error> {
        match self.drivers.iter_mut().find(|driver| driver.id == id) {
            Some(driver) => {
                driver.is_available = !driver.is_available;
                Ok(driver.is_available)
            }
            None => Err(not_found_error()),
        }
    }

    // The moved driver takes the back of the queue; everyone who was
    // behind the vacated position moves up one.
    #[tracing::instrument(skip(self))]
    pub fn rotate_to_back(&mut self, id: DriverId) -> Result<(), Error> {
        let vacated = self
            .driver(id)
            .map(|driver| driver.position)
            .ok_or_else(|| not_found_error())?;

        let back = self.drivers.len() as u32;

        for driver in self.drivers.iter_mut() {
            if driver.id == id {
                driver.position = back;
            } else if driver.position > vacated {
                driver.position -= 1;
            }
        }

        self.drivers.sort_by_key(|driver| driver.position);
        Ok(())
    }

    pub fn first_available(&self) -> Option<DriverId> {
        self.drivers
            .iter()
            .filter(|driver| driver.is_available)
            .min_by_key(|driver| driver.position)
            .map(|driver| driver.id)
    }

    pub fn in_queue_order(&self) -> &[Driver] {
        &self.drivers
    }

    #[cfg(test)]
    pub fn positions_are_dense(&self) -> bool {
        let mut positions: Vec<u32> = self.drivers.iter().map(|driver| driver.position).collect();
        positions.sort_unstable();
        positions.into_iter().eq(1..=self.drivers.len() as u32)
    }
}

#[cfg(test)]
fn crew(count: u32) -> Roster {
    let mut roster = Roster::default();

    for i in 1..=count {
        roster.add(DriverRequest {
            name: format!("Driver {}", i),
            unit_number: format!("{}", i),
            vehicle_model: "Toyota Corolla".into(),
            credential: format!("{}", i),
        });
    }

    roster
}

#[test]
fn add_assigns_dense_positions_and_fresh_ids() {
    let mut roster = crew(3);

    let ids: Vec<DriverId> = roster.drivers.iter().map(|driver| driver.id).collect();
    assert_eq!(ids, vec![DriverId(1), DriverId(2), DriverId(3)]);
    assert!(roster.positions_are_dense());

    roster.remove(DriverId(2)).unwrap();
    let id = roster.add(DriverRequest {
        name: "Driver 4".into(),
        unit_number: "4".into(),
        vehicle_model: "Kia Rio".into(),
        credential: "4".into(),
    });

    // removed ids are never handed out again
    assert_eq!(id, DriverId(4));
    assert!(roster.positions_are_dense());
}

#[test]
fn remove_compacts_positions() {
    let mut roster = crew(4);

    let removed = roster.remove(DriverId(2)).unwrap();
    assert_eq!(removed.position, 2);

    let order: Vec<(DriverId, u32)> = roster
        .drivers
        .iter()
        .map(|driver| (driver.id, driver.position))
        .collect();
    assert_eq!(
        order,
        vec![(DriverId(1), 1), (DriverId(3), 2), (DriverId(4), 3)]
    );

    let err = roster.remove(DriverId(2)).unwrap_err();
    assert_eq!(err.code, 100);
}

#[test]
fn rotate_to_back_shifts_everyone_behind() {
    let mut roster = crew(5);

    roster.rotate_to_back(DriverId(2)).unwrap();

    let order: Vec<(DriverId, u32)> = roster
        .drivers
        .iter()
        .map(|driver| (driver.id, driver.position))
        .collect();
    assert_eq!(
        order,
        vec![
            (DriverId(1), 1),
            (DriverId(3), 2),
            (DriverId(4), 3),
            (DriverId(5), 4),
            (DriverId(2), 5),
        ]
    );
    assert!(roster.positions_are_dense());
}

#[test]
fn first_available_prefers_the_lowest_position() {
    let mut roster = crew(3);
    assert_eq!(roster.first_available(), None);

    roster.toggle(DriverId(3)).unwrap();
    assert_eq!(roster.first_available(), Some(DriverId(3)));

    roster.toggle(DriverId(2)).unwrap();
    assert_eq!(roster.first_available(), Some(DriverId(2)));

    roster.toggle(DriverId(2)).unwrap();
    assert_eq!(roster.first_available(), Some(DriverId(3)));
}

#[test]
fn driver_by_unit_matches_the_unit_number() {
    let roster = crew(2);

    assert_eq!(roster.driver_by_unit("2").map(|d| d.id), Some(DriverId(2)));
    assert!(roster.driver_by_unit("9").is_none());
}

#[test]
fn hydrates_from_an_empty_document() {
    let roster: Roster = serde_json::from_str("{}").unwrap();

    assert_eq!(roster.next_id, 1);
    assert!(roster.drivers.is_empty());
}
