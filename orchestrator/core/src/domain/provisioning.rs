// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Aggregate
//!
//! Tracks one provisioning call through its workflow:
//!
//! ```text
//! Validating -> Allocating -> Rendering -> Launching -> Persisting -> Completed
//!      \____________\____________\____________\____________\______-> Failed
//! ```
//!
//! Every non-terminal state may fail. There are no retries: a failure is
//! terminal for the request and is surfaced to the caller as a
//! [`ProvisioningError`].
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** State machine and error taxonomy of the provisioning workflow

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::service::TenantId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvisioningId(pub Uuid);

impl ProvisioningId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ProvisioningId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProvisioningId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningState {
    Validating,
    Allocating,
    Rendering,
    Launching,
    Persisting,
    Completed,
    Failed,
}

impl ProvisioningState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProvisioningState::Completed | ProvisioningState::Failed)
    }

    /// Successor on the happy path; `None` for terminal states.
    pub fn next(&self) -> Option<ProvisioningState> {
        match self {
            ProvisioningState::Validating => Some(ProvisioningState::Allocating),
            ProvisioningState::Allocating => Some(ProvisioningState::Rendering),
            ProvisioningState::Rendering => Some(ProvisioningState::Launching),
            ProvisioningState::Launching => Some(ProvisioningState::Persisting),
            ProvisioningState::Persisting => Some(ProvisioningState::Completed),
            ProvisioningState::Completed | ProvisioningState::Failed => None,
        }
    }
}

impl fmt::Display for ProvisioningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProvisioningState::Validating => "validating",
            ProvisioningState::Allocating => "allocating",
            ProvisioningState::Rendering => "rendering",
            ProvisioningState::Launching => "launching",
            ProvisioningState::Persisting => "persisting",
            ProvisioningState::Completed => "completed",
            ProvisioningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid provisioning transition from {from}")]
pub struct TransitionError {
    pub from: ProvisioningState,
}

/// One provisioning call. Owned by the orchestrator for the duration of the
/// call and never shared between concurrent calls.
#[derive(Debug, Clone)]
pub struct Provisioning {
    pub id: ProvisioningId,
    pub tenant_id: TenantId,
    state: ProvisioningState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Provisioning {
    pub fn new(tenant_id: TenantId) -> Self {
        Self {
            id: ProvisioningId::new(),
            tenant_id,
            state: ProvisioningState::Validating,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// Move to the next happy-path state.
    pub fn advance(&mut self) -> Result<ProvisioningState, TransitionError> {
        let next = self.state.next().ok_or(TransitionError { from: self.state })?;
        self.state = next;
        if next.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
        Ok(next)
    }

    /// Move to `Failed`. Returns the state the failure happened in.
    pub fn fail(&mut self) -> Result<ProvisioningState, TransitionError> {
        if self.state.is_terminal() {
            return Err(TransitionError { from: self.state });
        }
        let failed_in = self.state;
        self.state = ProvisioningState::Failed;
        self.ended_at = Some(Utc::now());
        Ok(failed_in)
    }
}

/// Every way a provisioning call can fail. Each variant is recoverable at
/// the HTTP boundary; none of them terminates the process.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProvisioningError {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("All ports in [{start}, {end}) are occupied")]
    ResourceExhausted { start: u16, end: u16 },

    #[error("Error preparing service: {0}")]
    Render(String),

    #[error("Container engine preflight failed: {0}")]
    Preflight(String),

    #[error("Compose document validation failed: {0}")]
    ComposeValidation(String),

    #[error("Error starting service: {0}")]
    Launch(String),

    #[error("Error getting container id: {0}")]
    IdentifierLookup(String),

    #[error("Error recording cluster: {0}")]
    Persist(String),
}

impl ProvisioningError {
    /// Stable name of the error class, used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            ProvisioningError::Authorization(_) => "authorization",
            ProvisioningError::Validation(_) => "validation",
            ProvisioningError::ResourceExhausted { .. } => "resource_exhausted",
            ProvisioningError::Render(_) => "render",
            ProvisioningError::Preflight(_) => "preflight",
            ProvisioningError::ComposeValidation(_) => "compose_validation",
            ProvisioningError::Launch(_) => "launch",
            ProvisioningError::IdentifierLookup(_) => "identifier_lookup",
            ProvisioningError::Persist(_) => "persist",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_reaches_completed() {
        let mut provisioning = Provisioning::new(TenantId::new("u1"));
        let mut seen = vec![provisioning.state()];
        while !provisioning.state().is_terminal() {
            seen.push(provisioning.advance().unwrap());
        }
        assert_eq!(
            seen,
            vec![
                ProvisioningState::Validating,
                ProvisioningState::Allocating,
                ProvisioningState::Rendering,
                ProvisioningState::Launching,
                ProvisioningState::Persisting,
                ProvisioningState::Completed,
            ]
        );
        assert!(provisioning.ended_at.is_some());
    }

    #[test]
    fn test_fail_from_any_non_terminal_state() {
        let mut provisioning = Provisioning::new(TenantId::new("u1"));
        provisioning.advance().unwrap();
        provisioning.advance().unwrap();
        assert_eq!(provisioning.fail(), Ok(ProvisioningState::Rendering));
        assert_eq!(provisioning.state(), ProvisioningState::Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let mut provisioning = Provisioning::new(TenantId::new("u1"));
        provisioning.fail().unwrap();
        assert!(provisioning.advance().is_err());
        assert!(provisioning.fail().is_err());
    }
}
