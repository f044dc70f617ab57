//! Core traits for the failover controller
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordStore`]: Read and mutate DNS records via a provider API
//! - [`Prober`]: Health-check one node over TLS
//! - [`Resolver`]: Read the addresses currently published for the domain

pub mod prober;
pub mod record_store;
pub mod resolver;

pub use prober::Prober;
pub use record_store::{RecordStore, RecordStoreFactory};
pub use resolver::Resolver;
