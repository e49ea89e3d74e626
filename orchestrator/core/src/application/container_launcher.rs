// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use std::sync::Arc;
use tracing::{debug, info};

use crate::domain::provisioning::ProvisioningError;
use crate::domain::runtime::{ComposeProject, ContainerEngine, ContainerEngineError};
use crate::domain::service::ContainerId;

/// Brings a rendered compose document up through the container engine.
///
/// Phases run in order and the first failure stops the launch:
/// preflight, validate, up, then a lookup of the id of the container
/// running the named service. Sidecars in the same project are ignored.
/// A command that hangs past its timeout is a launch failure whatever
/// phase it was in.
pub struct ContainerLauncher {
    engine: Arc<dyn ContainerEngine>,
}

impl ContainerLauncher {
    pub fn new(engine: Arc<dyn ContainerEngine>) -> Self {
        Self { engine }
    }

    pub async fn launch(
        &self,
        project: ComposeProject<'_>,
        service: &str,
    ) -> Result<ContainerId, ProvisioningError> {
        self.engine
            .preflight()
            .await
            .map_err(|e| ProvisioningError::Preflight(e.to_string()))?;

        let validated = self.engine.validate(project).await.map_err(|e| match e {
            ContainerEngineError::Timeout { .. } => ProvisioningError::Launch(e.to_string()),
            _ => ProvisioningError::ComposeValidation(e.to_string()),
        })?;
        debug!(bytes = validated.stdout.len(), "Compose document validated");

        let started = self
            .engine
            .up(project)
            .await
            .map_err(|e| ProvisioningError::Launch(e.to_string()))?;
        if !started.stderr.trim().is_empty() {
            // compose reports progress on stderr even on success
            debug!(stderr = %started.stderr.trim(), "compose up output");
        }

        let container_id = self
            .engine
            .container_id(project, service)
            .await
            .map_err(|e| match e {
                ContainerEngineError::Timeout { .. } => ProvisioningError::Launch(e.to_string()),
                _ => ProvisioningError::IdentifierLookup(e.to_string()),
            })?
            .ok_or_else(|| {
                ProvisioningError::IdentifierLookup(format!("engine reported no container for {}", service))
            })?;

        info!(project = project.name, container_id = %container_id, "Container launched");
        Ok(container_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::runtime::CommandOutput;
    use std::path::Path;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ScriptedEngine {
        preflight: Option<ContainerEngineError>,
        validate: Option<ContainerEngineError>,
        up: Option<ContainerEngineError>,
        id_prefix: Option<String>,
        calls: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl ContainerEngine for ScriptedEngine {
        async fn preflight(&self) -> Result<(), ContainerEngineError> {
            self.calls.lock().push("preflight");
            self.preflight.clone().map_or(Ok(()), Err)
        }

        async fn validate(&self, _project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
            self.calls.lock().push("validate");
            self.validate.clone().map_or(Ok(CommandOutput::default()), Err)
        }

        async fn up(&self, _project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
            self.calls.lock().push("up");
            self.up.clone().map_or(Ok(CommandOutput::default()), Err)
        }

        async fn container_id(
            &self,
            _project: ComposeProject<'_>,
            service: &str,
        ) -> Result<Option<ContainerId>, ContainerEngineError> {
            self.calls.lock().push("container_id");
            Ok(self.id_prefix.clone().map(|id| ContainerId::new(format!("{}-{}", id, service))))
        }
    }

    async fn launch(engine: ScriptedEngine) -> (Result<ContainerId, ProvisioningError>, Vec<&'static str>) {
        let engine = Arc::new(engine);
        let launcher = ContainerLauncher::new(engine.clone());
        let project = ComposeProject {
            name: "spinup-u1-postgres",
            file: Path::new("/tmp/docker-compose.yml"),
        };
        let result = launcher.launch(project, "postgres").await;
        let calls = engine.calls.lock().clone();
        (result, calls)
    }

    #[tokio::test]
    async fn test_successful_launch_runs_all_phases() {
        let (result, calls) = launch(ScriptedEngine {
            id_prefix: Some("f00dcafe".to_string()),
            ..Default::default()
        })
        .await;

        assert_eq!(result.unwrap(), ContainerId::new("f00dcafe-postgres"));
        assert_eq!(calls, vec!["preflight", "validate", "up", "container_id"]);
    }

    #[tokio::test]
    async fn test_preflight_failure_stops_early() {
        let (result, calls) = launch(ScriptedEngine {
            preflight: Some(ContainerEngineError::BinaryNotFound("docker-compose".to_string())),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ProvisioningError::Preflight(_))));
        assert_eq!(calls, vec!["preflight"]);
    }

    #[tokio::test]
    async fn test_malformed_document() {
        let (result, calls) = launch(ScriptedEngine {
            validate: Some(ContainerEngineError::CommandFailed {
                command: "docker-compose -f x config".to_string(),
                exit_code: Some(1),
                stderr: "services must be a mapping".to_string(),
            }),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ProvisioningError::ComposeValidation(msg)) if msg.contains("mapping")));
        assert_eq!(calls, vec!["preflight", "validate"]);
    }

    #[tokio::test]
    async fn test_up_failure_carries_stderr() {
        let (result, _) = launch(ScriptedEngine {
            up: Some(ContainerEngineError::CommandFailed {
                command: "docker-compose -f x up -d".to_string(),
                exit_code: Some(1),
                stderr: "port is already allocated".to_string(),
            }),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ProvisioningError::Launch(msg)) if msg.contains("already allocated")));
    }

    #[tokio::test]
    async fn test_hung_validate_is_launch_error() {
        let (result, _) = launch(ScriptedEngine {
            validate: Some(ContainerEngineError::Timeout {
                command: "docker-compose -f x config".to_string(),
                timeout_secs: 120,
            }),
            ..Default::default()
        })
        .await;

        assert!(matches!(result, Err(ProvisioningError::Launch(_))));
    }

    #[tokio::test]
    async fn test_empty_identifier() {
        let (result, _) = launch(ScriptedEngine::default()).await;
        assert!(matches!(result, Err(ProvisioningError::IdentifierLookup(_))));
    }
}
