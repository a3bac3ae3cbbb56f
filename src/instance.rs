//! Instance record and lifecycle state

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backend::ProviderHandle;

/// Lifecycle state of a provisioned instance
///
/// Transitions are driven by polling the provisioning backend, never set
/// directly by client requests. `pending → running` and `pending → error`
/// are the only modeled transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstanceState {
    Pending,
    Running,
    Error,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Error => "error",
        }
    }

    /// Parse from the stored string form, returning None for unknown values
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InstanceState::Pending),
            "running" => Some(InstanceState::Running),
            "error" => Some(InstanceState::Error),
            _ => None,
        }
    }
}

/// A provisioned Varnish instance and its host bindings
///
/// The sole persisted entity. `name` is the primary key; `handle` is the
/// backend's own correlation data and is opaque to the manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub name: String,
    pub state: InstanceState,
    pub bound: Vec<String>,
    pub handle: ProviderHandle,
    pub created_at: DateTime<Utc>,
}

impl Instance {
    /// Build a freshly created instance: pending, with no bindings
    pub fn new(name: impl Into<String>, handle: ProviderHandle) -> Self {
        Self {
            name: name.into(),
            state: InstanceState::Pending,
            bound: Vec::new(),
            handle,
            created_at: Utc::now(),
        }
    }
}
