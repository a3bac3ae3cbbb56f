//! SQLite-backed instance store
//!
//! Uses sqlx for async database access with a connection pool. Bound hosts
//! and the provider handle are stored as JSON text columns; the name column
//! is the primary key, so duplicate inserts surface as unique violations.

use anyhow::{Context as _, Result as AnyResult};
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use super::InstanceStore;
use crate::backend::ProviderHandle;
use crate::error::{BrokerError, Result};
use crate::instance::{Instance, InstanceState};

/// Database connection pool type alias
pub type DbPool = SqlitePool;

/// Get the default state database path
fn default_db_path() -> AnyResult<PathBuf> {
    let proj_dirs =
        ProjectDirs::from("", "", "varnish-broker").context("Failed to get project directories")?;

    let state_dir = proj_dirs.data_local_dir();
    fs::create_dir_all(state_dir).context("Failed to create state directory")?;

    Ok(state_dir.join("state.db"))
}

/// Open the instance database, creating it if needed.
///
/// `database_url` overrides the default location under the project data dir.
pub async fn open_db(database_url: Option<&str>) -> AnyResult<DbPool> {
    let db_url = match database_url {
        Some(url) => url.to_string(),
        None => {
            let path = default_db_path()?;
            format!("sqlite://{}?mode=rwc", path.display())
        }
    };

    let options = SqliteConnectOptions::from_str(&db_url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("Failed to open instance database")?;

    setup_schema(&pool).await?;

    Ok(pool)
}

/// Create an in-memory database for testing
#[cfg(test)]
pub async fn open_test_db() -> AnyResult<DbPool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.create_if_missing(true);

    // Single connection so the in-memory database outlives individual queries
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    setup_schema(&pool).await?;

    Ok(pool)
}

/// Setup database schema
async fn setup_schema(pool: &DbPool) -> AnyResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instances (
            name TEXT PRIMARY KEY,
            state TEXT NOT NULL,
            bound TEXT NOT NULL,
            handle TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// SQLite-backed implementation of [`InstanceStore`]
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: DbPool,
}

impl SqliteStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_instance(row: &sqlx::sqlite::SqliteRow) -> Result<Instance> {
    let name: String = row.try_get("name").map_err(anyhow::Error::from)?;
    let state: String = row.try_get("state").map_err(anyhow::Error::from)?;
    let bound: String = row.try_get("bound").map_err(anyhow::Error::from)?;
    let handle: String = row.try_get("handle").map_err(anyhow::Error::from)?;
    let created_at: String = row.try_get("created_at").map_err(anyhow::Error::from)?;

    let state = InstanceState::parse(&state)
        .ok_or_else(|| anyhow::anyhow!("Unknown instance state in store: {state}"))?;
    let bound: Vec<String> = serde_json::from_str(&bound).map_err(anyhow::Error::from)?;
    let handle: ProviderHandle = serde_json::from_str(&handle).map_err(anyhow::Error::from)?;
    let created_at = DateTime::parse_from_rfc3339(&created_at)
        .map_err(anyhow::Error::from)?
        .with_timezone(&Utc);

    Ok(Instance {
        name,
        state,
        bound,
        handle,
        created_at,
    })
}

impl InstanceStore for SqliteStore {
    async fn insert(&self, instance: &Instance) -> Result<()> {
        let bound = serde_json::to_string(&instance.bound).map_err(anyhow::Error::from)?;
        let handle = serde_json::to_string(&instance.handle).map_err(anyhow::Error::from)?;

        let result = sqlx::query(
            "INSERT INTO instances (name, state, bound, handle, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&instance.name)
        .bind(instance.state.as_str())
        .bind(&bound)
        .bind(&handle)
        .bind(instance.created_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(BrokerError::Conflict {
                    name: instance.name.clone(),
                })
            }
            Err(err) => Err(anyhow::Error::from(err)
                .context("Failed to insert instance")
                .into()),
        }
    }

    async fn get(&self, name: &str) -> Result<Instance> {
        let row = sqlx::query("SELECT name, state, bound, handle, created_at FROM instances WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        match row {
            Some(row) => row_to_instance(&row),
            None => Err(BrokerError::NotFound),
        }
    }

    async fn update(&self, instance: &Instance) -> Result<()> {
        let bound = serde_json::to_string(&instance.bound).map_err(anyhow::Error::from)?;
        let handle = serde_json::to_string(&instance.handle).map_err(anyhow::Error::from)?;

        let result = sqlx::query(
            "UPDATE instances SET state = ?, bound = ?, handle = ? WHERE name = ?",
        )
        .bind(instance.state.as_str())
        .bind(&bound)
        .bind(&handle)
        .bind(&instance.name)
        .execute(&self.pool)
        .await
        .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::NotFound);
        }

        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM instances WHERE name = ?")
            .bind(name)
            .execute(&self.pool)
            .await
            .map_err(anyhow::Error::from)?;

        if result.rows_affected() == 0 {
            return Err(BrokerError::NotFound);
        }

        Ok(())
    }
}
