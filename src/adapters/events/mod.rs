//! Inbound event sources
//!
//! - [`traits`] - the [`EventSource`] abstraction over the event topics
//! - [`spool`] - a directory spool standing in for the topics locally

pub mod spool;
pub mod traits;

pub use spool::SpoolEventSource;
pub use traits::EventSource;
