// Interop Relay - EHR resource fetch and publish pipeline
// Copyright (c) 2025 Interop Relay Contributors
// Licensed under the MIT License

//! # Interop Relay
//!
//! Interop Relay loads FHIR resources from tenant EHRs in response to
//! integration events and publishes them, tenant-localized, to a downstream
//! data store.
//!
//! ## Overview
//!
//! For every inbound event the relay:
//! - **Resolves** the tenant and the resources the event asks for
//! - **Deduplicates** against what was already published in the same run
//! - **Fetches** the remaining resources from the EHR in batched calls
//! - **Transforms** each resource, dropping only the ones that fail
//! - **Publishes** the survivors and reports a structured response
//!
//! Events are either *load* events naming one resource directly, or
//! *publish* events announcing an upstream resource whose references this
//! channel follows.
//!
//! ## Architecture
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`core`] - Request resolution, transformation, publishing, topic reading
//! - [`adapters`] - EHR, publish sink, event source and tenant integrations
//! - [`domain`] - Events, resources, tenants and errors
//! - [`config`] - Configuration management
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use interop_relay::cli::commands::run::build_pipeline;
//! use interop_relay::config::load_config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = load_config("interop-relay.toml")?;
//!     let (reader, publisher) = build_pipeline(&config)?;
//!
//!     loop {
//!         let batch = reader.next_batch().await?;
//!         if batch.is_empty() {
//!             break;
//!         }
//!         for message in &batch {
//!             let response = publisher.process(message).await?;
//!             println!("{} {}", response.status, response.message);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Error Handling
//!
//! Fallible operations return [`domain::Result`], an alias over
//! [`domain::RelayError`]. Unknown tenants, missing event names and
//! unrecognized data triggers abort a message with an error; EHR, transform
//! and publish failures are reported through the response instead.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
