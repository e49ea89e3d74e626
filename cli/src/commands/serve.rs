// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! HTTP server wiring
//!
//! Builds every collaborator once from the loaded configuration and hands
//! them to the router. Nothing here is reachable from a request.

use anyhow::{Context, Result};
use clap::Args;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use spinup_core::application::container_launcher::ContainerLauncher;
use spinup_core::application::provisioning::{ProvisioningSettings, StandardProvisioningService};
use spinup_core::domain::node_config::NodeConfigManifest;
use spinup_core::infrastructure::cloudflare_dns::CloudflareDnsClient;
use spinup_core::infrastructure::docker_compose::DockerComposeEngine;
use spinup_core::infrastructure::event_bus::EventBus;
use spinup_core::infrastructure::jwt::JwtTokenVerifier;
use spinup_core::infrastructure::repositories::SqliteClusterRepository;
use spinup_core::infrastructure::{ComposeRenderer, PortAllocator, TcpPortProbe};
use spinup_core::presentation::api::app;

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Address to bind (overrides spec.network.bind_address)
    #[arg(long, env = "SPINUP_HOST")]
    pub host: Option<String>,

    /// Port to bind (overrides spec.network.port)
    #[arg(long, env = "SPINUP_PORT")]
    pub port: Option<u16>,
}

pub async fn run(mut config: NodeConfigManifest, args: ServeArgs) -> Result<()> {
    if let Some(host) = args.host {
        config.spec.network.bind_address = host;
    }
    if let Some(port) = args.port {
        config.spec.network.port = port;
    }
    config.validate().context("Configuration validation failed")?;

    let config = Arc::new(config);
    let spec = &config.spec;

    info!(
        project_dir = %spec.project_dir.display(),
        architecture = %spec.architecture,
        "Starting spinup host"
    );

    let public_key = spec.public_key_path();
    let verifier = JwtTokenVerifier::from_file(&public_key)
        .with_context(|| format!("Failed to load token public key from {}", public_key.display()))?;

    let probe = Arc::new(TcpPortProbe::new(spec.ports.dial_timeout()));
    let allocator = Arc::new(PortAllocator::new(
        spec.ports.range(),
        probe,
        spec.ports.reservation_ttl(),
    ));
    let renderer = Arc::new(ComposeRenderer::from_config(spec.compose.template_path.as_deref()));
    let engine = Arc::new(DockerComposeEngine::from_config(&spec.engine));
    let repository = Arc::new(SqliteClusterRepository::new(spec.project_dir.clone()));
    let event_bus = EventBus::with_default_capacity();

    let mut service = StandardProvisioningService::new(
        ProvisioningSettings::from_spec(spec),
        allocator,
        renderer,
        ContainerLauncher::new(engine),
        repository,
        event_bus,
    );
    match CloudflareDnsClient::from_config(&spec.dns) {
        Some(client) => {
            info!(domain = %spec.dns.domain, "DNS registration enabled");
            service = service.with_dns(Arc::new(client));
        }
        None if spec.dns.enabled => warn!("DNS enabled without credentials, skipping registration"),
        None => {}
    }

    let router = app(Arc::new(service), Arc::new(verifier));

    let addr = format!("{}:{}", spec.network.bind_address, spec.network.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("spinup listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("spinup shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
