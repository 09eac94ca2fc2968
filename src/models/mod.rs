//! Request and response models for the gateway API
//!
//! DTOs serialized to and from HTTP bodies.

pub mod requests;
pub mod responses;

pub use requests::ReserveRequest;
pub use responses::{
    ErrorResponse, HealthResponse, RejectionBody, ReservationResponse, StatsResponse,
};
