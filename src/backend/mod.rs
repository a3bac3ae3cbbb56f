//! Provisioning backend abstraction
//!
//! The manager talks to the compute provider only through the
//! [`ProvisioningBackend`] trait, so orchestration logic can be tested
//! against a deterministic fake without hitting real AWS.

mod ec2;
mod fake;

pub use ec2::{Ec2Backend, Ec2BackendConfig};
pub use fake::FakeBackend;

use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::error::Result;

/// Provider-side correlation data for one launched resource
///
/// Opaque to the manager: it is handed out by `launch`, persisted on the
/// instance record, and passed back verbatim to `poll` and `terminate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderHandle {
    pub instance_id: String,
}

impl ProviderHandle {
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
        }
    }
}

/// Provider-side view of a launched resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    /// Resource requested, not yet usable
    Booting,
    /// Resource is up and serving
    Ready,
    /// Provisioning failed or the resource is gone
    Failed,
}

/// Operations the broker needs from a compute provider.
///
/// Provisioning is asynchronous: `launch` returns as soon as the provider
/// has accepted the request, and readiness is observed by calling `poll`
/// on demand (pull model, no callbacks).
pub trait ProvisioningBackend: Send + Sync {
    /// Request creation of the underlying resource for `name`
    fn launch(&self, name: &str) -> impl Future<Output = Result<ProviderHandle>> + Send;

    /// Report the provider's current knowledge of the resource
    fn poll(&self, handle: &ProviderHandle) -> impl Future<Output = Result<ProviderState>> + Send;

    /// Best-effort teardown; terminating an unknown or already-terminated
    /// handle is not an error
    fn terminate(&self, handle: &ProviderHandle) -> impl Future<Output = Result<()>> + Send;
}
