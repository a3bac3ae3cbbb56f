//! varnish-broker: Varnish cache instance provisioning broker
//!
//! Serves the tsuru service-broker HTTP API, provisioning one EC2-backed
//! Varnish instance per service resource.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use varnish_broker::api;
use varnish_broker::config::{build_manager, BrokerConfig};

#[derive(Parser, Debug)]
#[command(name = "varnish-broker")]
#[command(about = "Varnish cache instance provisioning broker")]
#[command(version)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "API_LISTEN", default_value = "0.0.0.0:8080")]
    listen: String,

    /// Manager implementation ("ec2" or "fake")
    #[arg(long, env = "API_MANAGER", default_value = "ec2")]
    manager: String,

    /// SQLite URL for instance state (default: project data dir)
    #[arg(long, env = "API_DATABASE_URL")]
    database_url: Option<String>,

    /// AWS region
    #[arg(long, env = "API_REGION", default_value = "us-east-1")]
    region: String,

    /// AMI to launch Varnish instances from (required for the ec2 manager)
    #[arg(long, env = "API_AMI_ID")]
    ami_id: Option<String>,

    /// EC2 instance type
    #[arg(long, env = "API_INSTANCE_TYPE", default_value = "t3.micro")]
    instance_type: String,

    /// VPC subnet ID for launched instances (default VPC if not specified)
    #[arg(long, env = "API_SUBNET_ID")]
    subnet_id: Option<String>,

    /// Security group ID for launched instances
    #[arg(long, env = "API_SECURITY_GROUP_ID")]
    security_group_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = BrokerConfig {
        manager: args.manager,
        database_url: args.database_url,
        region: args.region,
        ami_id: args.ami_id,
        instance_type: args.instance_type,
        subnet_id: args.subnet_id,
        security_group_id: args.security_group_id,
    };

    // Construction failures (unknown manager, missing parameters) abort
    // startup before the listener binds
    let manager = build_manager(&config).await?;

    info!(
        listen = %args.listen,
        manager = %config.manager,
        region = %config.region,
        "Starting varnish-broker"
    );

    let listener = tokio::net::TcpListener::bind(&args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;

    axum::serve(listener, api::router(manager))
        .await
        .context("Server error")?;

    Ok(())
}
