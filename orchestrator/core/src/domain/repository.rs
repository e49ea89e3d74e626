// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contract for provisioned clusters. Each tenant owns a
//! separate store; the interface is keyed by [`TenantId`] and the
//! implementation decides where that tenant's store lives.
//!
//! | Trait | Record | Implementations |
//! |-------|--------|----------------|
//! | `ClusterRepository` | `ClusterRecord` | `SqliteClusterRepository` |

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::service::{ClusterRecord, StoredCluster, TenantId};

#[async_trait]
pub trait ClusterRepository: Send + Sync {
    /// Append one record to the tenant's store inside a single transaction.
    async fn record(&self, tenant_id: &TenantId, record: &ClusterRecord) -> Result<(), RepositoryError>;

    /// All records in the tenant's store, oldest first.
    async fn list(&self, tenant_id: &TenantId) -> Result<Vec<StoredCluster>, RepositoryError>;
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid tenant: {0}")]
    InvalidTenant(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}
