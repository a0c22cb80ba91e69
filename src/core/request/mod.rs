//! Resource requests
//!
//! This module turns inbound events into deduplicated fetch requests:
//! - [`key`] - the [`ResourceRequestKey`] dedup identity
//! - [`event`] - [`ResourceEvent`] load/publish variants
//! - [`request`] - [`ResourceRequest`] and batched fetch resolution
//! - [`handler`] - per-resource-type strategies

pub mod event;
pub mod handler;
pub mod key;
pub mod request;

pub use event::{LoadResourceEvent, PublishResourceEvent, ResourceEvent};
pub use handler::{FhirResourceHandler, ResourceTypeHandler};
pub use key::ResourceRequestKey;
pub use request::{ResourceFetcher, ResourceRequest};
