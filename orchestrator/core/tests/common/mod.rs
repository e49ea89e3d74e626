// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared doubles for the provisioning integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use spinup_core::application::container_launcher::ContainerLauncher;
use spinup_core::application::provisioning::{ProvisioningSettings, StandardProvisioningService};
use spinup_core::domain::auth::{AuthError, TokenVerifier};
use spinup_core::domain::dns::{DnsError, DnsProvider, DnsRecord};
use spinup_core::domain::ports::{PortProbe, PortRange, PortStatus};
use spinup_core::domain::repository::{ClusterRepository, RepositoryError};
use spinup_core::domain::runtime::{
    CommandOutput, ComposeProject, ContainerEngine, ContainerEngineError,
};
use spinup_core::domain::service::{
    ClusterRecord, ContainerId, DatabaseResource, DatabaseVersion, ServiceRequest, StoredCluster,
    TenantId,
};
use spinup_core::infrastructure::compose_renderer::ComposeRenderer;
use spinup_core::infrastructure::event_bus::EventBus;
use spinup_core::infrastructure::port_allocator::PortAllocator;
use spinup_core::infrastructure::repositories::SqliteClusterRepository;

/// Id the fake engine reports for any service other than the database.
pub const SIDECAR_CONTAINER_ID: &str = "5idecar";

/// Container engine double recording every call it receives.
///
/// `container_id` is reported for the `postgres` service only.
pub struct FakeEngine {
    pub installed: bool,
    pub container_id: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub fn healthy(container_id: &str) -> Self {
        Self {
            installed: true,
            container_id: Some(container_id.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn missing() -> Self {
        Self {
            installed: false,
            container_id: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl ContainerEngine for FakeEngine {
    async fn preflight(&self) -> Result<(), ContainerEngineError> {
        self.calls.lock().push("preflight".to_string());
        if self.installed {
            Ok(())
        } else {
            Err(ContainerEngineError::BinaryNotFound("docker-compose".to_string()))
        }
    }

    async fn validate(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
        self.calls
            .lock()
            .push(format!("validate {} {}", project.name, project.file.display()));
        Ok(CommandOutput::default())
    }

    async fn up(&self, project: ComposeProject<'_>) -> Result<CommandOutput, ContainerEngineError> {
        self.calls
            .lock()
            .push(format!("up {} {}", project.name, project.file.display()));
        Ok(CommandOutput::default())
    }

    async fn container_id(
        &self,
        project: ComposeProject<'_>,
        service: &str,
    ) -> Result<Option<ContainerId>, ContainerEngineError> {
        self.calls
            .lock()
            .push(format!("container_id {} {}", project.name, service));
        if service == "postgres" {
            Ok(self.container_id.clone().map(ContainerId::new))
        } else {
            Ok(Some(ContainerId::new(SIDECAR_CONTAINER_ID)))
        }
    }
}

/// Port probe reporting a configurable set of ports as bound.
#[derive(Default)]
pub struct FakeProbe {
    pub in_use: Mutex<HashSet<u16>>,
    pub probes: Mutex<usize>,
}

impl FakeProbe {
    pub fn with_in_use(ports: impl IntoIterator<Item = u16>) -> Self {
        Self {
            in_use: Mutex::new(ports.into_iter().collect()),
            probes: Mutex::new(0),
        }
    }

    pub fn probe_count(&self) -> usize {
        *self.probes.lock()
    }
}

#[async_trait]
impl PortProbe for FakeProbe {
    async fn probe(&self, port: u16) -> PortStatus {
        *self.probes.lock() += 1;
        if self.in_use.lock().contains(&port) {
            PortStatus::InUse
        } else {
            PortStatus::Refused
        }
    }
}

/// Accepts tokens of the form `token-<tenant>`.
pub struct StaticVerifier;

impl TokenVerifier for StaticVerifier {
    fn verify(&self, token: &str) -> Result<TenantId, AuthError> {
        token
            .strip_prefix("token-")
            .filter(|tenant| !tenant.is_empty())
            .map(TenantId::new)
            .ok_or_else(|| AuthError::InvalidToken("signature mismatch".to_string()))
    }
}

/// DNS double recording created records; optionally failing.
#[derive(Default)]
pub struct RecordingDns {
    pub fail: bool,
    pub records: Mutex<Vec<DnsRecord>>,
}

#[async_trait]
impl DnsProvider for RecordingDns {
    async fn create_a_record(&self, record: &DnsRecord) -> Result<(), DnsError> {
        if self.fail {
            return Err(DnsError::Rejected("zone is locked".to_string()));
        }
        self.records.lock().push(record.clone());
        Ok(())
    }
}

/// Cluster store whose writes always fail.
#[derive(Default)]
pub struct FailingRepository {
    pub attempts: Mutex<usize>,
}

#[async_trait]
impl ClusterRepository for FailingRepository {
    async fn record(&self, _tenant_id: &TenantId, _record: &ClusterRecord) -> Result<(), RepositoryError> {
        *self.attempts.lock() += 1;
        Err(RepositoryError::Database("disk I/O error".to_string()))
    }

    async fn list(&self, _tenant_id: &TenantId) -> Result<Vec<StoredCluster>, RepositoryError> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub engine: Arc<FakeEngine>,
    pub probe: Arc<FakeProbe>,
    pub allocator: Arc<PortAllocator>,
    pub repository: Arc<SqliteClusterRepository>,
    pub event_bus: EventBus,
    pub settings: ProvisioningSettings,
}

impl Harness {
    pub fn new(engine: FakeEngine, in_use: &[u16]) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let probe = Arc::new(FakeProbe::with_in_use(in_use.iter().copied()));
        let allocator = Arc::new(PortAllocator::new(
            PortRange::new(5432, 5440),
            probe.clone(),
            Duration::from_secs(300),
        ));
        let repository = Arc::new(SqliteClusterRepository::new(dir.path()));
        let settings = ProvisioningSettings {
            project_dir: dir.path().to_path_buf(),
            architecture: "amd64".to_string(),
            bind_confirm_timeout: Duration::ZERO,
            dns_record_content: "34.203.202.32".to_string(),
            dns_domain: "spinup.host".to_string(),
        };

        Self {
            dir,
            engine: Arc::new(engine),
            probe,
            allocator,
            repository,
            event_bus: EventBus::new(64),
            settings,
        }
    }

    pub fn service(&self) -> StandardProvisioningService {
        self.service_with(ComposeRenderer::new(), self.repository.clone())
    }

    /// Service wired to a specific renderer and cluster store.
    pub fn service_with(
        &self,
        renderer: ComposeRenderer,
        repository: Arc<dyn ClusterRepository>,
    ) -> StandardProvisioningService {
        StandardProvisioningService::new(
            self.settings.clone(),
            self.allocator.clone(),
            Arc::new(renderer),
            ContainerLauncher::new(self.engine.clone()),
            repository,
            self.event_bus.clone(),
        )
    }

    pub fn project_dir(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    pub fn compose_file(&self, tenant: &str, name: &str) -> PathBuf {
        self.dir.path().join(tenant).join(name).join("docker-compose.yml")
    }
}

pub fn sample_request(user: &str) -> ServiceRequest {
    ServiceRequest {
        name: "postgres".to_string(),
        duration: 200,
        resource: DatabaseResource {
            memory: "32MB".to_string(),
            storage: 200,
            version: DatabaseVersion { maj: 9, min: 6 },
            port: None,
            container_id: None,
        },
        user_id: TenantId::new(user),
    }
}

pub const SAMPLE_BODY: &str = r#"{
    "name": "postgres",
    "duration": 200,
    "resource": {"memory": "32MB", "storage": 200, "version": {"maj": 9, "min": 6}},
    "userid": "u1"
}"#;
