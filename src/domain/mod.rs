//! Domain models and types for the relay.
//!
//! # Overview
//!
//! The domain layer provides:
//! - **Tenants** ([`Tenant`]) and resource id localization
//! - **Resources** ([`Resource`]), an opaque FHIR JSON wrapper
//! - **Raw events** ([`InteropResourceLoadV1`], [`InteropResourcePublishV1`]) and run [`Metadata`]
//! - **Error types** ([`RelayError`], [`EhrError`]) and the [`Result`] alias
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T, RelayError>`]:
//!
//! ```rust
//! use interop_relay::domain::{DataTrigger, Result};
//!
//! fn example() -> Result<DataTrigger> {
//!     let trigger: DataTrigger = "nightly".parse()?;
//!     Ok(trigger)
//! }
//! ```

pub mod errors;
pub mod event;
pub mod resource;
pub mod result;
pub mod tenant;

pub use errors::{EhrError, RelayError};
pub use event::{
    BackfillRequest, DataTrigger, DateRange, FlowOptions, InboundMessage, InteropResourceLoadV1,
    InteropResourcePublishV1, Metadata, Topic, UpstreamReference, LOAD_EVENT_NAME,
    PUBLISH_EVENT_NAME,
};
pub use resource::Resource;
pub use result::Result;
pub use tenant::{is_resource_blocked, Tenant};
