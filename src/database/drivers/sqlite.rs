//! SQLite driver factory
//!
//! Connections come from one `SqlitePool` per database file. Clearing the
//! pools closes every pooled connection so the file can be renamed or
//! deleted.

use crate::database::connection::{AdminConnection, ConnectionString, DriverFactory};
use crate::error::{ForgeError, Result};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Connection, Row, Sqlite, SqliteConnection};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;

/// Maximum pooled connections per database file
const MAX_CONNECTIONS: u32 = 4;

/// SQLite driver backed by sqlx
pub struct SqliteDriver {
    pools: Mutex<HashMap<PathBuf, SqlitePool>>,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            pools: Mutex::new(HashMap::new()),
        }
    }

    fn database_path(connection_string: &ConnectionString) -> Result<PathBuf> {
        connection_string
            .get("Data Source")
            .or_else(|| connection_string.get("Dbq"))
            .map(PathBuf::from)
            .ok_or_else(|| ForgeError::Config("SQLite connection string has no Data Source".into()))
    }

    async fn pool_for(&self, path: &Path) -> Result<SqlitePool> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(path) {
            return Ok(pool.clone());
        }

        let options = SqliteConnectOptions::new().filename(path).create_if_missing(false);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|e| ForgeError::connection(format!("opening {}", path.display()), e))?;
        pools.insert(path.to_path_buf(), pool.clone());
        Ok(pool)
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DriverFactory for SqliteDriver {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn connect(&self, connection_string: &ConnectionString) -> Result<Box<dyn AdminConnection>> {
        let path = Self::database_path(connection_string)?;
        if !path.exists() {
            return Err(ForgeError::connection(
                "sqlite",
                format!("database file {} does not exist", path.display()),
            ));
        }
        let pool = self.pool_for(&path).await?;
        let conn = pool.acquire().await?;
        Ok(Box::new(SqliteAdminConnection { conn }))
    }

    async fn initialize_file(&self, path: &Path, _connection_string: &ConnectionString) -> Result<()> {
        let options = SqliteConnectOptions::new().filename(path).create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| ForgeError::connection(format!("creating {}", path.display()), e))?;
        sqlx::query("PRAGMA user_version = 0").execute(&mut conn).await?;
        conn.close().await?;
        debug!(path = %path.display(), "Initialized SQLite database file");
        Ok(())
    }

    async fn clear_pools(&self, connection_string: &ConnectionString) -> Result<()> {
        let path = Self::database_path(connection_string)?;
        let pool = self.pools.lock().await.remove(&path);
        if let Some(pool) = pool {
            pool.close().await;
            debug!(path = %path.display(), "Closed SQLite pool");
        }
        Ok(())
    }
}

/// Pooled SQLite connection; dropping it returns it to the pool
struct SqliteAdminConnection {
    conn: PoolConnection<Sqlite>,
}

#[async_trait]
impl AdminConnection for SqliteAdminConnection {
    async fn execute(&mut self, sql: &str) -> Result<u64> {
        let result = sqlx::query(sql).execute(&mut *self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn query_column(&mut self, sql: &str) -> Result<Vec<String>> {
        let rows = sqlx::query(sql).fetch_all(&mut *self.conn).await?;
        rows.iter()
            .map(|row| match row.try_get::<String, _>(0) {
                Ok(value) => Ok(value),
                Err(_) => Ok(row.try_get::<i64, _>(0)?.to_string()),
            })
            .collect()
    }

    async fn close(self: Box<Self>) -> Result<()> {
        drop(self.conn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cs_for(path: &Path) -> ConnectionString {
        let mut cs = ConnectionString::new();
        cs.push("Data Source", path.display().to_string());
        cs
    }

    #[tokio::test]
    async fn test_initialize_connect_and_clear() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.db");
        let driver = SqliteDriver::new();

        driver.initialize_file(&path, &cs_for(&path)).await.unwrap();
        assert!(path.exists());

        let mut conn = driver.connect(&cs_for(&path)).await.unwrap();
        conn.execute("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)").await.unwrap();
        let tables = conn
            .query_column("SELECT name FROM sqlite_master WHERE type = 'table'")
            .await
            .unwrap();
        assert_eq!(tables, vec!["t".to_string()]);
        conn.close().await.unwrap();

        driver.clear_pools(&cs_for(&path)).await.unwrap();
        assert!(driver.pools.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_connect_to_missing_file_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.db");
        let result = SqliteDriver::new().connect(&cs_for(&path)).await;
        assert!(matches!(result, Err(ForgeError::Connection { .. })));
    }
}
