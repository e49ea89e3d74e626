// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain events emitted while provisioning.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::provisioning::{ProvisioningId, ProvisioningState};
use crate::domain::service::{ContainerId, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProvisioningEvent {
    StateChanged {
        provisioning_id: ProvisioningId,
        tenant_id: TenantId,
        state: ProvisioningState,
        at: DateTime<Utc>,
    },
    Completed {
        provisioning_id: ProvisioningId,
        tenant_id: TenantId,
        port: u16,
        container_id: ContainerId,
        at: DateTime<Utc>,
    },
    Failed {
        provisioning_id: ProvisioningId,
        tenant_id: TenantId,
        /// State the workflow was in when it failed
        failed_in: ProvisioningState,
        error_kind: String,
        reason: String,
        at: DateTime<Utc>,
    },
}

impl ProvisioningEvent {
    pub fn provisioning_id(&self) -> ProvisioningId {
        match self {
            ProvisioningEvent::StateChanged { provisioning_id, .. }
            | ProvisioningEvent::Completed { provisioning_id, .. }
            | ProvisioningEvent::Failed { provisioning_id, .. } => *provisioning_id,
        }
    }
}
