// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! DNS registration contract for provisioned services.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::service::TenantId;

/// An `A` record pointing a service name at the host address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Record name relative to the zone, `<tenant>-<service>`
    pub name: String,
    /// IPv4 address the record resolves to
    pub content: String,
}

impl DnsRecord {
    pub fn for_service(tenant_id: &TenantId, service_name: &str, content: impl Into<String>) -> Self {
        Self {
            name: format!("{}-{}", tenant_id, service_name),
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS request failed: {0}")]
    Request(String),

    #[error("DNS API rejected the record: {0}")]
    Rejected(String),
}

#[async_trait]
pub trait DnsProvider: Send + Sync {
    async fn create_a_record(&self, record: &DnsRecord) -> Result<(), DnsError>;
}
