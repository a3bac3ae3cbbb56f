//! Manager selection and construction
//!
//! The active manager implementation is chosen by name at process start.
//! Unknown names and missing connection parameters fail construction with a
//! descriptive error; nothing is deferred to the first request.

use anyhow::{bail, Context, Result};

use crate::backend::{Ec2Backend, Ec2BackendConfig, FakeBackend};
use crate::manager::{AnyManager, InstanceManager};
use crate::store::{open_db, MemoryStore, SqliteStore};

/// The known manager implementations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerKind {
    /// EC2 backend over the SQLite store
    Ec2,
    /// In-memory backend and store, for tests and local development
    Fake,
}

impl ManagerKind {
    /// Parse a manager name; unknown values are a hard construction error
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "ec2" => Ok(ManagerKind::Ec2),
            "fake" => Ok(ManagerKind::Fake),
            other => bail!("{other} is not a valid manager"),
        }
    }
}

/// Broker configuration, resolved from CLI flags and environment
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Manager implementation name ("ec2" or "fake")
    pub manager: String,
    /// SQLite URL for instance state; defaults to the project data dir
    pub database_url: Option<String>,
    /// AWS region
    pub region: String,
    /// AMI to launch (required for the ec2 manager)
    pub ami_id: Option<String>,
    /// EC2 instance type
    pub instance_type: String,
    /// Optional VPC subnet ID
    pub subnet_id: Option<String>,
    /// Optional security group ID
    pub security_group_id: Option<String>,
}

/// Build the configured manager, wiring its store and backend
pub async fn build_manager(config: &BrokerConfig) -> Result<AnyManager> {
    match ManagerKind::parse(&config.manager)? {
        ManagerKind::Ec2 => {
            let ami_id = config
                .ami_id
                .clone()
                .context("AMI id is required for the ec2 manager (set API_AMI_ID)")?;

            let pool = open_db(config.database_url.as_deref()).await?;
            let backend = Ec2Backend::new(Ec2BackendConfig {
                region: config.region.clone(),
                ami_id,
                instance_type: config.instance_type.clone(),
                subnet_id: config.subnet_id.clone(),
                security_group_id: config.security_group_id.clone(),
            })
            .await;

            Ok(AnyManager::Ec2(InstanceManager::new(
                SqliteStore::new(pool),
                backend,
            )))
        }
        ManagerKind::Fake => Ok(AnyManager::Fake(InstanceManager::new(
            MemoryStore::new(),
            FakeBackend::new(),
        ))),
    }
}
