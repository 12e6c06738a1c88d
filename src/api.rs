use async_trait::async_trait;

use crate::entities::{Driver, DriverId, DriverRequest, Ride, RideId, RideRequest};
use crate::error::Error;

#[async_trait]
pub trait RideAPI {
    async fn add_ride(&mut self, request: RideRequest) -> Result<Ride, Error>;

    async fn accept_ride(&mut self, id: RideId, driver_id: DriverId) -> Result<Ride, Error>;

    async fn decline_ride(&mut self, id: RideId, driver_id: DriverId) -> Result<Ride, Error>;

    async fn complete_ride(&mut self, id: RideId) -> Result<Ride, Error>;

    async fn activate_ride(&mut self, id: RideId) -> Result<Ride, Error>;
}

#[async_trait]
pub trait DriverAPI {
    async fn add_driver(&mut self, request: DriverRequest) -> Result<Driver, Error>;

    async fn edit_driver(&mut self, id: DriverId, request: DriverRequest) -> Result<Driver, Error>;

    async fn remove_driver(&mut self, id: DriverId) -> Result<Driver, Error>;

    async fn toggle_driver_availability(&mut self, id: DriverId) -> Result<Driver, Error>;
}

#[async_trait]
pub trait AdminAPI {
    async fn change_admin_password(&mut self, new_secret: String) -> Result<(), Error>;

    async fn change_super_admin_credential(&mut self, new_secret: String) -> Result<(), Error>;
}

pub trait API: RideAPI + DriverAPI + AdminAPI {}
