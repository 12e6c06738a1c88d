mod credentials;
mod driver;
mod ride;
mod roster;
mod snapshot;

pub use credentials::Credentials;
pub use driver::{Driver, DriverId, DriverRequest};
pub use ride::{Ride, RideId, RideRequest, Status};
pub use roster::Roster;
pub use snapshot::Snapshot;
