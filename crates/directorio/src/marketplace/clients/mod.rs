//! Client-side records: contact requests to companies and the client's vehicles.

pub mod requests;
pub mod service;
pub mod vehicles;

pub use requests::{
    ClientRequest, ClientRequestId, ClientRequestStatus, ClientRequestSubmission,
    RequestStatusUpdate,
};
pub use service::ClientService;
pub use vehicles::{Vehicle, VehicleId, VehicleSubmission};
