//! Invocation payloads for the pod recycler
//!
//! This library defines the JSON shapes exchanged with the trigger:
//! - RecycleRequest: single-target, batch and delete-all requests
//! - InvocationResponse: legacy `{statusCode, body}` or batch `{status, outcomes}` replies

pub mod request;
pub mod response;

pub use request::{PodRef, RecyclePlan, RecycleRequest, RequestShape};
pub use response::{BatchResponse, InvocationResponse, LegacyResponse, OutcomeView};
