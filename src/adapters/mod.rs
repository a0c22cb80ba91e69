//! External system integrations.
//!
//! - [`ehr`] - FHIR access to tenant EHRs
//! - [`publish`] - Destinations for transformed resources
//! - [`events`] - Inbound event topics
//! - [`tenant`] - Tenant lookup and per-tenant configuration
//!
//! # Design Pattern
//!
//! Each integration is a trait with one or more implementations, so the
//! pipeline can be exercised against in-memory fakes.
//!
//! ```rust,no_run
//! use interop_relay::adapters::ehr::{FhirService, HttpFhirService};
//! use interop_relay::config::EhrConfig;
//! use interop_relay::domain::Tenant;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = EhrConfig {
//!     base_url: "https://ehr.example.com/{tenant}/fhir/r4".to_string(),
//!     ..EhrConfig::default()
//! };
//! let ehr = HttpFhirService::new(config)?;
//! let tenant = Tenant::new("tenant", "Example Tenant");
//! let location = ehr.get_by_id(&tenant, "Location", "1234").await?;
//! # Ok(())
//! # }
//! ```

pub mod ehr;
pub mod events;
pub mod publish;
pub mod tenant;
