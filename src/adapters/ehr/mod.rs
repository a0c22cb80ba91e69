//! EHR access
//!
//! - [`traits`] - the [`FhirService`] abstraction
//! - [`client`] - HTTP FHIR implementation

pub mod client;
pub mod traits;

pub use client::HttpFhirService;
pub use traits::FhirService;
