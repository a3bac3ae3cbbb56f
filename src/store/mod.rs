//! Instance persistence
//!
//! The manager reads-modifies-writes whole instance records through the
//! [`InstanceStore`] trait; no partial-field updates exist. Uniqueness of
//! names is enforced here, as an atomic insert, so create never needs a
//! racy check-then-act existence probe.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::{open_db, SqliteStore};

#[cfg(test)]
pub use sqlite::open_test_db;

use std::future::Future;

use crate::error::Result;
use crate::instance::Instance;

/// Mapping from instance name to instance record
pub trait InstanceStore: Send + Sync {
    /// Persist a new record; fails with `Conflict` if the name exists
    fn insert(&self, instance: &Instance) -> impl Future<Output = Result<()>> + Send;

    /// Load the record for `name`; fails with `NotFound` if absent
    fn get(&self, name: &str) -> impl Future<Output = Result<Instance>> + Send;

    /// Replace the stored record for an existing name; fails with `NotFound`
    fn update(&self, instance: &Instance) -> impl Future<Output = Result<()>> + Send;

    /// Remove the record (and its bindings with it); fails with `NotFound`
    fn delete(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}
