use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{precondition_failed_error, Error};

// Ids come from the roster's monotonic counter and are never reused,
// so a completed ride can keep referring to a removed driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DriverId(pub u32);

impl fmt::Display for DriverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Driver {
    pub id: DriverId,
    pub name: String,
    pub unit_number: String,
    pub vehicle_model: String,
    pub credential: String,
    pub position: u32,
    pub is_available: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DriverRequest {
    pub name: String,
    pub unit_number: String,
    pub vehicle_model: String,
    pub credential: String,
}

impl Driver {
    pub fn new(id: DriverId, position: u32, request: DriverRequest) -> Self {
        Self {
            id,
            name: request.name,
            unit_number: request.unit_number,
            vehicle_model: request.vehicle_model,
            credential: request.credential,
            position,
            is_available: false,
        }
    }

    // Id, position and availability are not profile fields and stay put.
    pub fn apply_edit(&mut self, request: DriverRequest) {
        self.name = request.name;
        self.unit_number = request.unit_number;
        self.vehicle_model = request.vehicle_model;
        self.credential = request.credential;
    }
}

impl DriverRequest {
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty()
            || self.unit_number.trim().is_empty()
            || self.vehicle_model.trim().is_empty()
            || self.credential.trim().is_empty()
        {
            return Err(precondition_failed_error());
        }

        Ok(())
    }
}

#[test]
fn new_driver_starts_unavailable() {
    let driver = Driver::new(
        DriverId(7),
        3,
        DriverRequest {
            name: "Ana".into(),
            unit_number: "12".into(),
            vehicle_model: "Toyota Corolla".into(),
            credential: "12".into(),
        },
    );

    assert_eq!(driver.id, DriverId(7));
    assert_eq!(driver.position, 3);
    assert_eq!(driver.is_available, false);
}

#[test]
fn edit_replaces_profile_fields_only() {
    let mut driver = Driver::new(
        DriverId(1),
        1,
        DriverRequest {
            name: "Ana".into(),
            unit_number: "12".into(),
            vehicle_model: "Toyota Corolla".into(),
            credential: "12".into(),
        },
    );
    driver.is_available = true;

    driver.apply_edit(DriverRequest {
        name: "Ana Maria".into(),
        unit_number: "15".into(),
        vehicle_model: "Kia Rio".into(),
        credential: "15".into(),
    });

    assert_eq!(driver.name, "Ana Maria");
    assert_eq!(driver.unit_number, "15");
    assert_eq!(driver.id, DriverId(1));
    assert_eq!(driver.position, 1);
    assert_eq!(driver.is_available, true);
}

#[test]
fn request_requires_every_field() {
    let request = DriverRequest {
        name: "Ana".into(),
        unit_number: "  ".into(),
        vehicle_model: "Toyota Corolla".into(),
        credential: "12".into(),
    };

    let err = request.validate().unwrap_err();
    assert_eq!(err.code, 101);
}
