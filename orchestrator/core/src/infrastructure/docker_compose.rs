// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Docker Compose container engine adapter.
//!
//! Drives the host's `docker-compose` and `docker` binaries as child
//! processes. Every command runs under a timeout; a command that outlives
//! it is reported as [`ContainerEngineError::Timeout`] and left to finish
//! on its own.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::domain::node_config::EngineConfig;
use crate::domain::runtime::{CommandOutput, ComposeProject, ContainerEngine, ContainerEngineError};
use crate::domain::service::ContainerId;

pub struct DockerComposeEngine {
    docker_binary: String,
    compose_binary: String,
    command_timeout: Duration,
}

impl DockerComposeEngine {
    pub fn new(docker_binary: impl Into<String>, compose_binary: impl Into<String>, command_timeout: Duration) -> Self {
        Self {
            docker_binary: docker_binary.into(),
            compose_binary: compose_binary.into(),
            command_timeout,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.docker_binary.clone(),
            config.compose_binary.clone(),
            config.command_timeout(),
        )
    }

    async fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, ContainerEngineError> {
        let command_line = std::iter::once(program)
            .chain(args.iter().copied())
            .collect::<Vec<_>>()
            .join(" ");
        debug!(command = %command_line, "Running container engine command");

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let output = match tokio::time::timeout(self.command_timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ContainerEngineError::Spawn {
                    command: command_line,
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                return Err(ContainerEngineError::Timeout {
                    command: command_line,
                    timeout_secs: self.command_timeout.as_secs(),
                })
            }
        };

        let captured = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !output.status.success() {
            return Err(ContainerEngineError::CommandFailed {
                command: command_line,
                exit_code: output.status.code(),
                stderr: captured.stderr.trim().to_string(),
            });
        }

        Ok(captured)
    }

    fn compose_args<'a>(project: &'a str, compose_file: &'a str, tail: &[&'a str]) -> Vec<&'a str> {
        let mut args = vec!["-p", project, "-f", compose_file];
        args.extend_from_slice(tail);
        args
    }
}

#[async_trait]
impl ContainerEngine for DockerComposeEngine {
    async fn preflight(&self) -> Result<(), ContainerEngineError> {
        for binary in [&self.compose_binary, &self.docker_binary] {
            let path = which::which(binary)
                .map_err(|_| ContainerEngineError::BinaryNotFound(binary.clone()))?;
            debug!(binary = %binary, path = %path.display(), "Found container engine binary");
        }
        Ok(())
    }

    async fn validate(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
        let file = project.file.to_string_lossy();
        self.run(&self.compose_binary, &Self::compose_args(project.name, &file, &["config"]))
            .await
    }

    async fn up(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
        let file = project.file.to_string_lossy();
        let output = self
            .run(&self.compose_binary, &Self::compose_args(project.name, &file, &["up", "-d"]))
            .await?;
        info!(project = project.name, compose_file = %project.file.display(), "Compose services started");
        Ok(output)
    }

    async fn container_id(
        &self,
        project: ComposeProject<'_>,
        service: &str,
    ) -> Result<Option<ContainerId>, ContainerEngineError> {
        let file = project.file.to_string_lossy();
        let output = self
            .run(
                &self.compose_binary,
                &Self::compose_args(project.name, &file, &["ps", "-q", service]),
            )
            .await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ContainerId::new))
    }
}
