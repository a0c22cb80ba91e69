//! Core pipeline logic.
//!
//! # Modules
//!
//! - [`request`] - Request keys, resource events and batched fetch resolution
//! - [`transform`] - Per-resource transformation before publishing
//! - [`publish`] - The per-message publisher, run cache and responses
//! - [`reader`] - Priority polling of the inbound event topics
//!
//! # Message Workflow
//!
//! 1. **Read**: [`reader::TopicReader`] picks the next batch of inbound messages
//! 2. **Resolve**: the publisher looks up the tenant and builds a request
//! 3. **Deduplicate**: keys already published in this run are skipped
//! 4. **Fetch**: remaining keys are loaded from the EHR in batched calls
//! 5. **Transform**: each resource is localized; failures drop only that resource
//! 6. **Publish**: survivors go to the publish sink as one batch
//! 7. **Respond**: a [`publish::PublishResponse`] reports the outcome
//!
//! # Example
//!
//! ```rust,no_run
//! use interop_relay::config::load_config;
//! use interop_relay::cli::commands::run::build_pipeline;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = load_config("interop-relay.toml")?;
//! let (reader, publisher) = build_pipeline(&config)?;
//!
//! for message in reader.next_batch().await? {
//!     let response = publisher.process(&message).await?;
//!     println!("{}: {}", response.status, response.message);
//! }
//! # Ok(())
//! # }
//! ```

pub mod publish;
pub mod reader;
pub mod request;
pub mod transform;
