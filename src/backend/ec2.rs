//! EC2-backed provisioning
//!
//! Launches Varnish cache instances via RunInstances, observes readiness via
//! DescribeInstances, and tears them down via TerminateInstances. Throttled
//! launches are retried with exponential backoff.

use anyhow::Context;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_ec2::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_ec2::operation::run_instances::RunInstancesError;
use aws_sdk_ec2::types::{
    InstanceStateName, InstanceType, ResourceType, Tag, TagSpecification,
};
use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use chrono::Utc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProviderHandle, ProviderState, ProvisioningBackend};
use crate::error::Result;

/// Tag key for tool identification - all broker-created resources have this
const TAG_TOOL: &str = "varnish-broker:tool";

/// Tag value for tool identification
const TAG_TOOL_VALUE: &str = "varnish-broker";

/// Tag key for the broker-side instance name
const TAG_INSTANCE_NAME: &str = "varnish-broker:instance";

/// Tag key for creation timestamp (RFC 3339 format)
const TAG_CREATED_AT: &str = "varnish-broker:created-at";

/// Cloud-init script that installs and starts Varnish on first boot
const USER_DATA: &str = r#"#!/bin/sh
set -e
apt-get update -qq
apt-get install -y -qq varnish
systemctl enable --now varnish
"#;

/// EC2 error codes signalling the instance no longer exists
const NOT_FOUND_CODES: &[&str] = &["InvalidInstanceID.NotFound", "InvalidInstanceID.Malformed"];

/// EC2 error codes for rate limiting (retryable with backoff)
const THROTTLING_CODES: &[&str] = &["Throttling", "ThrottlingException", "RequestLimitExceeded"];

/// Configuration for the EC2 backend
#[derive(Debug, Clone)]
pub struct Ec2BackendConfig {
    /// AWS region to launch in
    pub region: String,
    /// AMI to boot (must be a Debian/Ubuntu image for the user data script)
    pub ami_id: String,
    /// EC2 instance type (e.g., "t3.micro")
    pub instance_type: String,
    /// Optional VPC subnet ID
    pub subnet_id: Option<String>,
    /// Optional security group ID
    pub security_group_id: Option<String>,
}

/// EC2 client for managing Varnish cache instances
#[derive(Clone)]
pub struct Ec2Backend {
    client: aws_sdk_ec2::Client,
    config: Ec2BackendConfig,
}

impl Ec2Backend {
    /// Create a new EC2 backend (loads AWS credentials from the environment)
    pub async fn new(config: Ec2BackendConfig) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        Self {
            client: aws_sdk_ec2::Client::new(&sdk_config),
            config,
        }
    }

    /// Perform the actual RunInstances call, returning the typed SDK error
    /// so the retry policy can classify throttling
    async fn run_instances(
        &self,
        name: &str,
    ) -> std::result::Result<String, LaunchError> {
        let instance_type: InstanceType = self
            .config
            .instance_type
            .parse()
            .map_err(|_| LaunchError::InvalidInstanceType(self.config.instance_type.clone()))?;

        let user_data_b64 = base64::engine::general_purpose::STANDARD.encode(USER_DATA);
        let created_at = Utc::now().to_rfc3339();

        let mut request = self
            .client
            .run_instances()
            .image_id(&self.config.ami_id)
            .instance_type(instance_type)
            .min_count(1)
            .max_count(1)
            .user_data(user_data_b64)
            .tag_specifications(
                TagSpecification::builder()
                    .resource_type(ResourceType::Instance)
                    .tags(Tag::builder().key(TAG_TOOL).value(TAG_TOOL_VALUE).build())
                    .tags(Tag::builder().key(TAG_INSTANCE_NAME).value(name).build())
                    .tags(Tag::builder().key(TAG_CREATED_AT).value(&created_at).build())
                    .tags(
                        Tag::builder()
                            .key("Name")
                            .value(format!("varnish-{name}"))
                            .build(),
                    )
                    .build(),
            );

        if let Some(subnet) = &self.config.subnet_id {
            request = request.subnet_id(subnet);
        }

        if let Some(sg) = &self.config.security_group_id {
            request = request.security_group_ids(sg);
        }

        let response = request.send().await.map_err(LaunchError::Sdk)?;

        let instance_id = response
            .instances()
            .first()
            .and_then(|i| i.instance_id())
            .ok_or(LaunchError::NoInstanceReturned)?
            .to_string();

        Ok(instance_id)
    }
}

/// Launch failure, kept typed so the backoff policy can see throttling codes
#[derive(Debug, thiserror::Error)]
enum LaunchError {
    #[error("Invalid instance type: {0}")]
    InvalidInstanceType(String),
    #[error("RunInstances returned no instance")]
    NoInstanceReturned,
    #[error(transparent)]
    Sdk(#[from] SdkError<RunInstancesError>),
}

impl LaunchError {
    fn is_throttled(&self) -> bool {
        match self {
            LaunchError::Sdk(err) => err
                .code()
                .is_some_and(|code| THROTTLING_CODES.contains(&code)),
            _ => false,
        }
    }
}

impl ProvisioningBackend for Ec2Backend {
    async fn launch(&self, name: &str) -> Result<ProviderHandle> {
        info!(
            instance = %name,
            ami = %self.config.ami_id,
            instance_type = %self.config.instance_type,
            "Launching Varnish instance"
        );

        let instance_id = (|| self.run_instances(name))
            .retry(
                ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(2))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(5),
            )
            .when(LaunchError::is_throttled)
            .notify(|err, dur| {
                warn!(delay = ?dur, error = %err, "AWS rate limited, backing off...");
            })
            .await
            .context("Failed to launch instance")?;

        info!(instance = %name, instance_id = %instance_id, "Instance launched");

        Ok(ProviderHandle::new(instance_id))
    }

    async fn poll(&self, handle: &ProviderHandle) -> Result<ProviderState> {
        let response = self
            .client
            .describe_instances()
            .instance_ids(&handle.instance_id)
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                // An instance EC2 no longer knows about is gone, not an error
                let service_err = err.into_service_error();
                if service_err
                    .code()
                    .is_some_and(|code| NOT_FOUND_CODES.contains(&code))
                {
                    debug!(instance_id = %handle.instance_id, "Instance unknown to EC2");
                    return Ok(ProviderState::Failed);
                }
                return Err(anyhow::Error::from(service_err)
                    .context("Failed to describe instance")
                    .into());
            }
        };

        let state = response
            .reservations()
            .first()
            .and_then(|r| r.instances().first())
            .and_then(|i| i.state())
            .and_then(|s| s.name())
            .cloned()
            .unwrap_or(InstanceStateName::Pending);

        debug!(instance_id = %handle.instance_id, state = ?state, "Polled instance state");

        Ok(match state {
            InstanceStateName::Pending => ProviderState::Booting,
            InstanceStateName::Running => ProviderState::Ready,
            _ => ProviderState::Failed,
        })
    }

    async fn terminate(&self, handle: &ProviderHandle) -> Result<()> {
        let result = self
            .client
            .terminate_instances()
            .instance_ids(&handle.instance_id)
            .send()
            .await;

        match result {
            Ok(_) => {
                info!(instance_id = %handle.instance_id, "Instance terminated");
                Ok(())
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err
                    .code()
                    .is_some_and(|code| NOT_FOUND_CODES.contains(&code))
                {
                    // Already gone; terminate is idempotent
                    debug!(instance_id = %handle.instance_id, "Instance already terminated");
                    return Ok(());
                }
                Err(anyhow::Error::from(service_err)
                    .context("Failed to terminate instance")
                    .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttling_codes_are_retryable() {
        for code in THROTTLING_CODES {
            assert!(!NOT_FOUND_CODES.contains(code));
        }
    }

    #[test]
    fn user_data_installs_varnish() {
        assert!(USER_DATA.starts_with("#!/bin/sh"));
        assert!(USER_DATA.contains("apt-get install -y -qq varnish"));
    }
}
