// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # SQLite Cluster Repository
//!
//! Production `ClusterRepository` backed by one SQLite file per tenant at
//! `<project_dir>/<tenant>/<tenant>.db`, holding a single `clusterInfo`
//! table.
//!
//! Tenants never share a file, so no cross-tenant locking exists. Writes to
//! the same file are serialized through a per-path async mutex so only one
//! transaction is active per store at a time.

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{Connection, Row};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::path_sanitizer::join_segments;
use crate::domain::repository::{ClusterRepository, RepositoryError};
use crate::domain::service::{ClusterRecord, ContainerId, StoredCluster, TenantId};

const CREATE_CLUSTER_INFO: &str = r#"
    CREATE TABLE IF NOT EXISTS clusterInfo (
        id INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT,
        clusterId TEXT,
        name TEXT,
        port INTEGER
    )
"#;

pub struct SqliteClusterRepository {
    root: PathBuf,
    write_locks: Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl SqliteClusterRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Location of a tenant's store.
    pub fn store_path(&self, tenant_id: &TenantId) -> Result<PathBuf, RepositoryError> {
        let tenant = tenant_id.as_str();
        let dir = join_segments(&self.root, &[tenant])
            .map_err(|e| RepositoryError::InvalidTenant(e.to_string()))?;
        Ok(dir.join(format!("{}.db", tenant)))
    }

    fn write_lock(&self, path: &Path) -> Arc<tokio::sync::Mutex<()>> {
        self.write_locks
            .lock()
            .entry(path.to_path_buf())
            .or_default()
            .clone()
    }

    async fn open(path: &Path) -> Result<SqliteConnection, RepositoryError> {
        let open_error = |reason: String| RepositoryError::Open {
            path: path.display().to_string(),
            reason,
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| open_error(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .map_err(|e| open_error(e.to_string()))?;

        sqlx::query(CREATE_CLUSTER_INFO)
            .execute(&mut conn)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to create clusterInfo: {}", e)))?;

        Ok(conn)
    }
}

#[async_trait]
impl ClusterRepository for SqliteClusterRepository {
    async fn record(&self, tenant_id: &TenantId, record: &ClusterRecord) -> Result<(), RepositoryError> {
        let path = self.store_path(tenant_id)?;
        let lock = self.write_lock(&path);
        let _guard = lock.lock().await;

        let mut conn = Self::open(&path).await?;
        let mut tx = conn.begin().await?;
        sqlx::query("INSERT INTO clusterInfo (clusterId, name, port) VALUES (?, ?, ?)")
            .bind(record.cluster_id.as_str())
            .bind(&record.name)
            .bind(i64::from(record.port))
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::Database(format!("Failed to insert cluster: {}", e)))?;
        tx.commit().await?;
        conn.close().await?;

        info!(
            tenant_id = %tenant_id,
            cluster_id = %record.cluster_id,
            port = record.port,
            "Recorded cluster"
        );
        Ok(())
    }

    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<StoredCluster>, RepositoryError> {
        let path = self.store_path(tenant_id)?;
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            debug!(tenant_id = %tenant_id, "No store for tenant");
            return Ok(Vec::new());
        }

        let mut conn = Self::open(&path).await?;
        let rows = sqlx::query("SELECT id, clusterId, name, port FROM clusterInfo ORDER BY id")
            .fetch_all(&mut conn)
            .await?;
        conn.close().await?;

        rows.iter()
            .map(|row| -> Result<StoredCluster, RepositoryError> {
                let port: i64 = row.try_get("port")?;
                let port = u16::try_from(port)
                    .map_err(|_| RepositoryError::Database(format!("port {} out of range", port)))?;
                Ok(StoredCluster {
                    id: row.try_get("id")?,
                    record: ClusterRecord {
                        cluster_id: ContainerId::new(row.try_get::<String, _>("clusterId")?),
                        name: row.try_get("name")?,
                        port,
                    },
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, port: u16) -> ClusterRecord {
        ClusterRecord {
            cluster_id: ContainerId::new(id),
            name: "postgres".to_string(),
            port,
        }
    }

    #[tokio::test]
    async fn test_record_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteClusterRepository::new(dir.path());
        let tenant = TenantId::new("u1");

        repo.record(&tenant, &record("abc123", 5432)).await.unwrap();
        repo.record(&tenant, &record("def456", 5433)).await.unwrap();

        let stored = repo.list(&tenant).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].record, record("abc123", 5432));
        assert_eq!(stored[1].record.port, 5433);
        assert!(stored[0].id < stored[1].id);
        assert!(dir.path().join("u1").join("u1.db").exists());
    }

    #[tokio::test]
    async fn test_tenants_use_disjoint_stores() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteClusterRepository::new(dir.path());

        repo.record(&TenantId::new("u1"), &record("abc", 5432)).await.unwrap();

        assert!(repo.list(&TenantId::new("u2")).await.unwrap().is_empty());
        assert!(!dir.path().join("u2").exists());
    }

    #[tokio::test]
    async fn test_invalid_tenant_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let repo = SqliteClusterRepository::new(dir.path());

        let err = repo
            .record(&TenantId::new("../escape"), &record("abc", 5432))
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidTenant(_)));
        assert!(repo.store_path(&TenantId::new("a/b")).is_err());
        assert_eq!(
            repo.store_path(&TenantId::new("u1")).unwrap(),
            dir.path().join("u1").join("u1.db")
        );
    }

    #[tokio::test]
    async fn test_concurrent_writes_same_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Arc::new(SqliteClusterRepository::new(dir.path()));
        let tenant = TenantId::new("u1");

        let mut handles = Vec::new();
        for i in 0..8u16 {
            let repo = repo.clone();
            let tenant = tenant.clone();
            handles.push(tokio::spawn(async move {
                repo.record(&tenant, &record(&format!("c{}", i), 5432 + i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(repo.list(&tenant).await.unwrap().len(), 8);
    }
}
