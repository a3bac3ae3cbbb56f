//! Instance lifecycle manager
//!
//! Orchestrates the provisioning backend and the instance store into the
//! broker operations. Stored state is never a stale cache: every status
//! query re-polls the backend and persists the result before answering.
//! There is no background scheduler; refresh happens only on demand.

use tracing::{info, warn};

use crate::backend::{
    Ec2Backend, FakeBackend, ProviderState, ProvisioningBackend,
};
use crate::error::{BrokerError, Result};
use crate::instance::{Instance, InstanceState};
use crate::store::{InstanceStore, MemoryStore, SqliteStore};

/// Map the provider's view of a resource onto the instance lifecycle
fn map_provider_state(state: ProviderState) -> InstanceState {
    match state {
        ProviderState::Booting => InstanceState::Pending,
        ProviderState::Ready => InstanceState::Running,
        ProviderState::Failed => InstanceState::Error,
    }
}

/// Lifecycle manager over one store and one provisioning backend
#[derive(Debug, Clone)]
pub struct InstanceManager<S, B> {
    store: S,
    backend: B,
}

impl<S: InstanceStore, B: ProvisioningBackend> InstanceManager<S, B> {
    pub fn new(store: S, backend: B) -> Self {
        Self { store, backend }
    }

    /// Launch a new instance and persist it in `pending` state.
    ///
    /// Name collisions are caught by the store's atomic unique insert rather
    /// than a pre-check, closing the check-then-act race; if the insert does
    /// fail, the just-launched resource is torn down best-effort.
    pub async fn create(&self, name: &str) -> Result<Instance> {
        if name.is_empty() {
            return Err(BrokerError::InvalidInput("name"));
        }

        let handle = self.backend.launch(name).await?;
        let instance = Instance::new(name, handle);

        if let Err(err) = self.store.insert(&instance).await {
            warn!(instance = %name, error = %err, "Insert failed after launch, cleaning up");
            if let Err(term_err) = self.backend.terminate(&instance.handle).await {
                warn!(
                    instance = %name,
                    instance_id = %instance.handle.instance_id,
                    error = %term_err,
                    "Failed to terminate orphaned resource"
                );
            }
            return Err(err);
        }

        info!(instance = %name, instance_id = %instance.handle.instance_id, "Instance created");
        Ok(instance)
    }

    /// Tear down an instance and delete its record.
    ///
    /// Terminate is best-effort: a teardown failure is logged and never
    /// blocks deletion of the record.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let instance = self.store.get(name).await?;

        if let Err(err) = self.backend.terminate(&instance.handle).await {
            warn!(
                instance = %name,
                instance_id = %instance.handle.instance_id,
                error = %err,
                "Failed to terminate instance, deleting record anyway"
            );
        }

        self.store.delete(name).await?;
        info!(instance = %name, "Instance removed");
        Ok(())
    }

    /// Bind an application host to an instance.
    ///
    /// Duplicate binds are allowed; the model does not deduplicate.
    pub async fn bind(&self, name: &str, host: &str) -> Result<()> {
        if host.is_empty() {
            return Err(BrokerError::InvalidInput("app-host"));
        }

        let mut instance = self.store.get(name).await?;
        instance.bound.push(host.to_string());
        self.store.update(&instance).await?;

        info!(instance = %name, host = %host, "Host bound");
        Ok(())
    }

    /// Unbind the first occurrence of `host`; unbinding an absent host is a
    /// no-op, not an error.
    pub async fn unbind(&self, name: &str, host: &str) -> Result<()> {
        let mut instance = self.store.get(name).await?;

        if let Some(pos) = instance.bound.iter().position(|bound| bound == host) {
            instance.bound.remove(pos);
            self.store.update(&instance).await?;
            info!(instance = %name, host = %host, "Host unbound");
        }

        Ok(())
    }

    /// Load an instance record
    pub async fn info(&self, name: &str) -> Result<Instance> {
        self.store.get(name).await
    }

    /// Re-poll the backend, persist any state transition, and return the
    /// current lifecycle state
    pub async fn status(&self, name: &str) -> Result<InstanceState> {
        let mut instance = self.store.get(name).await?;

        let state = map_provider_state(self.backend.poll(&instance.handle).await?);

        if state != instance.state {
            info!(
                instance = %name,
                from = instance.state.as_str(),
                to = state.as_str(),
                "Instance state transition"
            );
            instance.state = state;
            self.store.update(&instance).await?;
        }

        Ok(state)
    }
}

/// The two manager variants the broker can run with, selected once at
/// startup by configuration (unknown names fail construction)
#[derive(Clone)]
pub enum AnyManager {
    /// Real provisioning: EC2 backend over the SQLite store
    Ec2(InstanceManager<SqliteStore, Ec2Backend>),
    /// Deterministic in-memory variant for tests and local runs
    Fake(InstanceManager<MemoryStore, FakeBackend>),
}

impl AnyManager {
    pub async fn create(&self, name: &str) -> Result<Instance> {
        match self {
            AnyManager::Ec2(manager) => manager.create(name).await,
            AnyManager::Fake(manager) => manager.create(name).await,
        }
    }

    pub async fn remove(&self, name: &str) -> Result<()> {
        match self {
            AnyManager::Ec2(manager) => manager.remove(name).await,
            AnyManager::Fake(manager) => manager.remove(name).await,
        }
    }

    pub async fn bind(&self, name: &str, host: &str) -> Result<()> {
        match self {
            AnyManager::Ec2(manager) => manager.bind(name, host).await,
            AnyManager::Fake(manager) => manager.bind(name, host).await,
        }
    }

    pub async fn unbind(&self, name: &str, host: &str) -> Result<()> {
        match self {
            AnyManager::Ec2(manager) => manager.unbind(name, host).await,
            AnyManager::Fake(manager) => manager.unbind(name, host).await,
        }
    }

    pub async fn info(&self, name: &str) -> Result<Instance> {
        match self {
            AnyManager::Ec2(manager) => manager.info(name).await,
            AnyManager::Fake(manager) => manager.info(name).await,
        }
    }

    pub async fn status(&self, name: &str) -> Result<InstanceState> {
        match self {
            AnyManager::Ec2(manager) => manager.status(name).await,
            AnyManager::Fake(manager) => manager.status(name).await,
        }
    }
}
