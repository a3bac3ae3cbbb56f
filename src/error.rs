//! Broker error taxonomy
//!
//! Typed errors for the manager and its collaborators. The HTTP layer maps
//! these to status codes; the core never carries HTTP knowledge itself.

use thiserror::Error;

/// Result alias used throughout the broker core
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors surfaced by the instance manager and its collaborators
#[derive(Debug, Error)]
pub enum BrokerError {
    /// A required request field was missing or empty
    #[error("{0} is required")]
    InvalidInput(&'static str),

    /// No instance record exists for the given name
    #[error("Instance not found")]
    NotFound,

    /// An instance with the given name already exists
    #[error("instance {name} already exists")]
    Conflict { name: String },

    /// Opaque failure from the provisioning backend or the store,
    /// propagated without interpretation
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl BrokerError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, BrokerError::NotFound)
    }

    /// Check if this is a duplicate-name conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, BrokerError::Conflict { .. })
    }
}
