// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Provisioning Service
//!
//! Sequences one provisioning call end to end:
//! validate the request, allocate a port, render the compose document,
//! launch it, record the cluster and build the response.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Orchestrates PortAllocator, ComposeRenderer, ContainerLauncher
//!   and ClusterRepository
//! - **Integration:** HTTP handlers → ProvisioningService → infrastructure adapters
//!
//! A tenant holds at most one cluster per name. A second request for a name
//! that is recorded or still being provisioned is rejected before a port
//! is allocated.
//!
//! There are no retries and no rollback. A failure in any state ends the
//! call; files already rendered and containers already started stay in
//! place.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::application::container_launcher::ContainerLauncher;
use crate::domain::dns::{DnsProvider, DnsRecord};
use crate::domain::events::ProvisioningEvent;
use crate::domain::node_config::NodeConfigSpec;
use crate::domain::path_sanitizer::{join_segments, validate_segment, IdentifierError};
use crate::domain::provisioning::{Provisioning, ProvisioningError};
use crate::domain::repository::{ClusterRepository, RepositoryError};
use crate::domain::runtime::ComposeProject;
use crate::domain::service::{
    ClusterRecord, DatabaseEngine, ProvisionedService, ServiceRequest, StoredCluster, TenantId,
};
use crate::infrastructure::compose_renderer::{ComposeContext, ComposeRenderer};
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::port_allocator::PortAllocator;

/// File holding a tenant's tunnel secret, inside the tenant directory
pub const TUNNEL_SECRET_FILE: &str = "tunnel.secret";

/// Host name reported when no DNS record was created
pub const LOCAL_HOST_NAME: &str = "localhost";

#[async_trait]
pub trait ProvisioningService: Send + Sync {
    /// Provision a database for `caller`, the tenant the bearer token was issued to.
    async fn create_service(
        &self,
        caller: &TenantId,
        request: ServiceRequest,
    ) -> Result<ProvisionedService, ProvisioningError>;

    /// Clusters recorded in the caller's store.
    async fn list_clusters(&self, caller: &TenantId) -> Result<Vec<StoredCluster>, ProvisioningError>;
}

/// Host settings the workflow reads. Built once from configuration.
#[derive(Debug, Clone)]
pub struct ProvisioningSettings {
    pub project_dir: PathBuf,
    pub architecture: String,
    pub bind_confirm_timeout: Duration,
    pub dns_record_content: String,
    pub dns_domain: String,
}

impl ProvisioningSettings {
    pub fn from_spec(spec: &NodeConfigSpec) -> Self {
        Self {
            project_dir: spec.project_dir.clone(),
            architecture: spec.architecture.clone(),
            bind_confirm_timeout: spec.ports.bind_confirm_timeout(),
            dns_record_content: spec.dns.record_content.clone(),
            dns_domain: spec.dns.domain.clone(),
        }
    }
}

pub struct StandardProvisioningService {
    settings: ProvisioningSettings,
    allocator: Arc<PortAllocator>,
    renderer: Arc<ComposeRenderer>,
    launcher: ContainerLauncher,
    repository: Arc<dyn ClusterRepository>,
    dns: Option<Arc<dyn DnsProvider>>,
    event_bus: EventBus,
    in_flight: Mutex<HashSet<(TenantId, String)>>,
}

/// Marks a tenant's cluster name as being provisioned until dropped.
struct InFlightClaim<'a> {
    in_flight: &'a Mutex<HashSet<(TenantId, String)>>,
    key: (TenantId, String),
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.key);
    }
}

impl StandardProvisioningService {
    pub fn new(
        settings: ProvisioningSettings,
        allocator: Arc<PortAllocator>,
        renderer: Arc<ComposeRenderer>,
        launcher: ContainerLauncher,
        repository: Arc<dyn ClusterRepository>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            settings,
            allocator,
            renderer,
            launcher,
            repository,
            dns: None,
            event_bus,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Register services in DNS after they are recorded.
    pub fn with_dns(mut self, dns: Arc<dyn DnsProvider>) -> Self {
        self.dns = Some(dns);
        self
    }

    fn enter_next_state(&self, run: &mut Provisioning) {
        match run.advance() {
            Ok(state) => {
                debug!(state = %state, "Provisioning state changed");
                self.event_bus.publish(ProvisioningEvent::StateChanged {
                    provisioning_id: run.id,
                    tenant_id: run.tenant_id.clone(),
                    state,
                    at: Utc::now(),
                });
            }
            Err(e) => warn!(error = %e, "Ignoring provisioning transition"),
        }
    }

    fn validate(caller: &TenantId, request: &ServiceRequest) -> Result<DatabaseEngine, ProvisioningError> {
        if &request.user_id != caller {
            return Err(ProvisioningError::Authorization(format!(
                "user {} cannot provision for {}",
                caller, request.user_id
            )));
        }
        let engine = request.engine().map_err(ProvisioningError::Validation)?;
        request
            .user_id
            .validate()
            .map_err(|e| ProvisioningError::Validation(e.to_string()))?;
        validate_segment("name", request.cluster_name())
            .map_err(|e| ProvisioningError::Validation(e.to_string()))?;
        request
            .resource
            .validate_memory()
            .map_err(ProvisioningError::Validation)?;
        Ok(engine)
    }

    fn already_exists(request: &ServiceRequest) -> ProvisioningError {
        ProvisioningError::Validation(format!(
            "user {} already has a {} cluster",
            request.user_id,
            request.cluster_name()
        ))
    }

    /// Reserve the tenant's cluster name for this call.
    async fn claim(&self, request: &ServiceRequest) -> Result<InFlightClaim<'_>, ProvisioningError> {
        let key = (request.user_id.clone(), request.cluster_name().to_string());
        if !self.in_flight.lock().insert(key.clone()) {
            return Err(Self::already_exists(request));
        }
        let claim = InFlightClaim {
            in_flight: &self.in_flight,
            key,
        };

        let recorded = self
            .repository
            .list(&request.user_id)
            .await
            .map_err(|e| ProvisioningError::Persist(e.to_string()))?;
        if recorded
            .iter()
            .any(|stored| stored.record.name == request.cluster_name())
        {
            return Err(Self::already_exists(request));
        }
        Ok(claim)
    }

    /// Tunnel secret for the tenant, if one has been issued.
    async fn tunnel_secret(&self, tenant_id: &TenantId) -> Result<Option<String>, ProvisioningError> {
        let path = self
            .settings
            .project_dir
            .join(tenant_id.as_str())
            .join(TUNNEL_SECRET_FILE);
        match tokio::fs::read_to_string(&path).await {
            Ok(secret) => {
                let secret = secret.trim().to_string();
                Ok((!secret.is_empty()).then_some(secret))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ProvisioningError::Render(format!(
                "reading {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn service_dir(&self, request: &ServiceRequest) -> Result<PathBuf, ProvisioningError> {
        service_directory(&self.settings.project_dir, &request.user_id, request.cluster_name())
            .map_err(|e| ProvisioningError::Validation(e.to_string()))
    }

    async fn register_dns(&self, tenant_id: &TenantId, name: &str) -> String {
        let Some(dns) = &self.dns else {
            return LOCAL_HOST_NAME.to_string();
        };
        let record = DnsRecord::for_service(tenant_id, name, self.settings.dns_record_content.clone());
        match dns.create_a_record(&record).await {
            Ok(()) => format!("{}.{}", record.name, self.settings.dns_domain),
            Err(e) => {
                warn!(error = %e, record = %record.name, "DNS registration failed, reporting localhost");
                LOCAL_HOST_NAME.to_string()
            }
        }
    }

    async fn run(
        &self,
        run: &mut Provisioning,
        caller: &TenantId,
        mut request: ServiceRequest,
    ) -> Result<ProvisionedService, ProvisioningError> {
        let engine = Self::validate(caller, &request)?;
        let _claim = self.claim(&request).await?;
        let service_dir = self.service_dir(&request)?;

        self.enter_next_state(run);
        let lease = self.allocator.allocate().await?;
        request.resource.port = Some(lease.port());

        self.enter_next_state(run);
        let secret = self.tunnel_secret(&request.user_id).await?;
        let context = ComposeContext::new(
            &request,
            engine,
            lease.port(),
            &self.settings.project_dir,
            &self.settings.architecture,
            secret,
        );
        let compose_file = self
            .renderer
            .render(&context, &service_dir)
            .await
            .map_err(|e| ProvisioningError::Render(e.to_string()))?;

        self.enter_next_state(run);
        let project = ComposeProject {
            name: &context.project,
            file: &compose_file,
        };
        let container_id = self.launcher.launch(project, request.cluster_name()).await?;
        request.resource.container_id = Some(container_id.clone());

        // the reservation now waits for the service to bind, off the request path
        tokio::spawn(lease.release_when_bound(
            self.allocator.probe(),
            self.settings.bind_confirm_timeout,
        ));

        self.enter_next_state(run);
        let port = context.port;
        let record = ClusterRecord {
            cluster_id: container_id.clone(),
            name: request.cluster_name().to_string(),
            port,
        };
        self.repository
            .record(&request.user_id, &record)
            .await
            .map_err(|e| ProvisioningError::Persist(e.to_string()))?;

        let host_name = self.register_dns(&request.user_id, request.cluster_name()).await;

        self.enter_next_state(run);
        Ok(ProvisionedService {
            host_name,
            port,
            container_id,
        })
    }
}

#[async_trait]
impl ProvisioningService for StandardProvisioningService {
    async fn create_service(
        &self,
        caller: &TenantId,
        request: ServiceRequest,
    ) -> Result<ProvisionedService, ProvisioningError> {
        let mut run = Provisioning::new(request.user_id.clone());
        let span = info_span!(
            "provision",
            request_id = %run.id,
            tenant_id = %request.user_id,
            name = %request.name,
        );

        async move {
            info!("Provisioning service");
            self.event_bus.publish(ProvisioningEvent::StateChanged {
                provisioning_id: run.id,
                tenant_id: run.tenant_id.clone(),
                state: run.state(),
                at: Utc::now(),
            });

            match self.run(&mut run, caller, request).await {
                Ok(service) => {
                    info!(
                        port = service.port,
                        container_id = %service.container_id,
                        host_name = %service.host_name,
                        "Service provisioned"
                    );
                    self.event_bus.publish(ProvisioningEvent::Completed {
                        provisioning_id: run.id,
                        tenant_id: run.tenant_id.clone(),
                        port: service.port,
                        container_id: service.container_id.clone(),
                        at: Utc::now(),
                    });
                    Ok(service)
                }
                Err(err) => {
                    let failed_in = run.fail().unwrap_or_else(|_| run.state());
                    warn!(
                        state = %failed_in,
                        error_kind = err.kind(),
                        error = %err,
                        "Provisioning failed"
                    );
                    self.event_bus.publish(ProvisioningEvent::Failed {
                        provisioning_id: run.id,
                        tenant_id: run.tenant_id.clone(),
                        failed_in,
                        error_kind: err.kind().to_string(),
                        reason: err.to_string(),
                        at: Utc::now(),
                    });
                    Err(err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn list_clusters(&self, caller: &TenantId) -> Result<Vec<StoredCluster>, ProvisioningError> {
        self.repository.list(caller).await.map_err(|e| match e {
            RepositoryError::InvalidTenant(msg) => ProvisioningError::Validation(msg),
            other => ProvisioningError::Persist(other.to_string()),
        })
    }
}

/// Directory a service's compose document is rendered into.
pub fn service_directory(
    project_dir: &Path,
    tenant_id: &TenantId,
    name: &str,
) -> Result<PathBuf, IdentifierError> {
    join_segments(project_dir, &[tenant_id.as_str(), name])
}
