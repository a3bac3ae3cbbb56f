//! Deterministic in-memory provisioning backend for tests and local runs
//!
//! Launch hands out sequential handles, every launched resource starts out
//! booting, and tests drive state transitions explicitly via `set_state`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::{ProviderHandle, ProviderState, ProvisioningBackend};
use crate::error::Result;

#[derive(Debug, Default)]
struct FakeState {
    next_id: u64,
    states: HashMap<String, ProviderState>,
    terminated: Vec<String>,
}

/// In-memory stand-in for the EC2 backend
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the provider-side state reported for `handle` on the next poll
    pub fn set_state(&self, handle: &ProviderHandle, state: ProviderState) {
        let mut inner = self.state.lock().unwrap();
        inner.states.insert(handle.instance_id.clone(), state);
    }

    /// Handles terminate has been called with, in call order
    pub fn terminated(&self) -> Vec<String> {
        self.state.lock().unwrap().terminated.clone()
    }

    /// Number of resources launched so far
    pub fn launched(&self) -> u64 {
        self.state.lock().unwrap().next_id
    }
}

impl ProvisioningBackend for FakeBackend {
    async fn launch(&self, name: &str) -> Result<ProviderHandle> {
        let mut inner = self.state.lock().unwrap();
        inner.next_id += 1;
        let instance_id = format!("i-fake{:08}-{name}", inner.next_id);
        inner.states.insert(instance_id.clone(), ProviderState::Booting);
        Ok(ProviderHandle::new(instance_id))
    }

    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderState> {
        let inner = self.state.lock().unwrap();
        // Unknown handles read as failed, matching a terminated EC2 instance
        Ok(inner
            .states
            .get(&handle.instance_id)
            .copied()
            .unwrap_or(ProviderState::Failed))
    }

    async fn terminate(&self, handle: &ProviderHandle) -> Result<()> {
        let mut inner = self.state.lock().unwrap();
        inner.states.remove(&handle.instance_id);
        inner.terminated.push(handle.instance_id.clone());
        Ok(())
    }
}
