// ABOUTME: Validated domain types for describing tunnel hops.
// ABOUTME: Endpoints are checked once at construction and never mutated.

mod endpoint;
mod hop_id;

pub use endpoint::{Credential, Endpoint, InvalidEndpointError};
pub use hop_id::HopId;
