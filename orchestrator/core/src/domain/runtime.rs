// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Container engine contract.
//!
//! The orchestrator talks to the host's container engine only through
//! [`ContainerEngine`], so a different engine or a test double can be
//! substituted without touching the provisioning workflow.

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

use crate::domain::service::ContainerId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContainerEngineError {
    #[error("{0} is not installed or not on PATH")]
    BinaryNotFound(String),

    #[error("`{command}` exited with code {exit_code:?}: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("`{command}` did not finish within {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("Failed to run `{command}`: {reason}")]
    Spawn { command: String, reason: String },
}

/// Captured output of a finished engine command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

/// One compose project: the document plus the project name the engine
/// groups its containers under. Distinct services must use distinct
/// project names or the engine treats them as the same deployment.
#[derive(Debug, Clone, Copy)]
pub struct ComposeProject<'a> {
    pub name: &'a str,
    pub file: &'a Path,
}

#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// Confirm the engine and its compose front end are installed.
    async fn preflight(&self) -> Result<(), ContainerEngineError>;

    /// Parse and resolve the compose document without starting anything.
    async fn validate(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError>;

    /// Bring the described services up in detached mode.
    async fn up(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError>;

    /// Identifier of the container running `service` in `project`, if any.
    async fn container_id(
        &self,
        project: ComposeProject<'_>,
        service: &str,
    ) -> Result<Option<ContainerId>, ContainerEngineError>;
}
