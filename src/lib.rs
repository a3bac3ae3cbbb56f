//! varnish-broker - Varnish cache instance provisioning broker
//!
//! This crate provides the broker service that launches Varnish cache
//! instances on EC2, tracks their lifecycle state, and manages host
//! bindings on behalf of client applications.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod instance;
pub mod manager;
pub mod store;

pub use error::{BrokerError, Result};
pub use instance::{Instance, InstanceState};
pub use manager::{AnyManager, InstanceManager};
