// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Compose Renderer
//!
//! Renders the compose document describing one database service, using
//! Handlebars for placeholder substitution.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Turn a validated service request into a compose file on disk
//! - **Integration:** ServiceRequest + allocated port → `docker-compose.yml` → ContainerLauncher
//!
//! # Supported Placeholders
//!
//! - `{{path}}` - Project root directory
//! - `{{user_id}}` - Tenant identifier
//! - `{{architecture}}` - Image architecture prefix (e.g. `amd64`)
//! - `{{name}}` - Database name
//! - `{{port}}` - Allocated host port
//! - `{{secret}}` - Tenant tunnel secret, empty when the tenant has none
//! - `{{major}}`, `{{minor}}` - Engine version
//! - `{{memory}}`, `{{storage}}`, `{{duration}}` - Requested resources
//! - `{{container_port}}` - Port the engine listens on inside the container
//!
//! Rendering runs in strict mode: a template that references a variable
//! outside this set fails instead of producing an incomplete document.

use handlebars::Handlebars;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::domain::service::{DatabaseEngine, ServiceRequest};

/// Fixed name of the rendered document inside a service directory
pub const COMPOSE_FILE_NAME: &str = "docker-compose.yml";

const BUILTIN_TEMPLATE: &str = include_str!("../../templates/docker-compose.yml.hbs");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to load compose template {path:?}: {reason}")]
    TemplateLoad { path: PathBuf, reason: String },

    #[error("Failed to render compose template: {0}")]
    Template(String),

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ============================================================================
// Template Context
// ============================================================================

/// Substitution variables for one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeContext {
    pub project: String,
    pub path: String,
    pub user_id: String,
    pub architecture: String,
    pub name: String,
    pub port: u16,
    pub secret: String,
    pub major: u32,
    pub minor: u32,
    pub memory: String,
    pub storage: u64,
    pub duration: u64,
    pub container_port: u16,
}

impl ComposeContext {
    pub fn new(
        request: &ServiceRequest,
        engine: DatabaseEngine,
        port: u16,
        project_dir: &Path,
        architecture: &str,
        secret: Option<String>,
    ) -> Self {
        Self {
            project: request.project_name(),
            path: project_dir.display().to_string(),
            user_id: request.user_id.to_string(),
            architecture: architecture.to_string(),
            name: request.cluster_name().to_string(),
            port,
            secret: secret.unwrap_or_default(),
            major: request.resource.version.maj,
            minor: request.resource.version.min,
            memory: request.resource.memory.clone(),
            storage: request.resource.storage,
            duration: request.duration,
            container_port: engine.container_port(),
        }
    }
}

// ============================================================================
// Renderer
// ============================================================================

enum TemplateSource {
    Builtin,
    File(PathBuf),
}

pub struct ComposeRenderer {
    handlebars: Handlebars<'static>,
    source: TemplateSource,
}

impl ComposeRenderer {
    /// Renderer using the built-in template
    pub fn new() -> Self {
        Self::with_source(TemplateSource::Builtin)
    }

    /// Renderer reading its template from `path` on every render
    pub fn from_template_file(path: impl Into<PathBuf>) -> Self {
        Self::with_source(TemplateSource::File(path.into()))
    }

    /// Renderer for an optional override path, falling back to the built-in template
    pub fn from_config(template_path: Option<&Path>) -> Self {
        match template_path {
            Some(path) => Self::from_template_file(path),
            None => Self::new(),
        }
    }

    fn with_source(source: TemplateSource) -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(true);
        // YAML output, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars, source }
    }

    async fn load_template(&self) -> Result<String, RenderError> {
        match &self.source {
            TemplateSource::Builtin => Ok(BUILTIN_TEMPLATE.to_string()),
            TemplateSource::File(path) => {
                tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| RenderError::TemplateLoad {
                        path: path.clone(),
                        reason: e.to_string(),
                    })
            }
        }
    }

    /// Render the document without touching the destination
    pub async fn render_to_string(&self, context: &ComposeContext) -> Result<String, RenderError> {
        let template = self.load_template().await?;
        self.handlebars
            .render_template(&template, context)
            .map_err(|e| RenderError::Template(e.to_string()))
    }

    /// Render into `destination/docker-compose.yml`, creating the directory
    /// when absent and overwriting any earlier document.
    pub async fn render(&self, context: &ComposeContext, destination: &Path) -> Result<PathBuf, RenderError> {
        let document = self.render_to_string(context).await?;

        tokio::fs::create_dir_all(destination)
            .await
            .map_err(|source| RenderError::Io {
                path: destination.to_path_buf(),
                source,
            })?;

        let file = destination.join(COMPOSE_FILE_NAME);
        tokio::fs::write(&file, document)
            .await
            .map_err(|source| RenderError::Io {
                path: file.clone(),
                source,
            })?;

        debug!(path = %file.display(), "Rendered compose document");
        Ok(file)
    }
}

impl Default for ComposeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::service::{DatabaseResource, DatabaseVersion, TenantId};

    fn request() -> ServiceRequest {
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
            user_id: TenantId::new("u1"),
        }
    }

    fn context(secret: Option<&str>) -> ComposeContext {
        ComposeContext::new(
            &request(),
            DatabaseEngine::Postgres,
            5433,
            Path::new("/srv/spinup"),
            "amd64",
            secret.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_builtin_template_substitution() {
        let renderer = ComposeRenderer::new();
        let document = renderer.render_to_string(&context(None)).await.unwrap();

        assert!(document.contains("image: amd64/postgres:9.6"));
        assert!(document.contains("\"5433:5432\""));
        assert!(document.contains("mem_limit: \"32MB\""));
        assert!(document.contains("/srv/spinup/u1/postgres/data"));
        assert!(document.contains("container_name: spinup-u1-postgres\n"));
        assert!(!document.contains("cloudflared"));
    }

    #[tokio::test]
    async fn test_tunnel_sidecar_with_secret() {
        let renderer = ComposeRenderer::new();
        let document = renderer.render_to_string(&context(Some("s3cr3t"))).await.unwrap();

        assert!(document.contains("cloudflare/cloudflared"));
        assert!(document.contains("--token s3cr3t"));
        assert!(document.contains("container_name: spinup-u1-postgres-tunnel"));
    }

    #[tokio::test]
    async fn test_render_is_deterministic_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let destination = dir.path().join("u1").join("postgres");
        let renderer = ComposeRenderer::new();

        let first = renderer.render(&context(None), &destination).await.unwrap();
        let first_bytes = std::fs::read(&first).unwrap();

        std::fs::write(&first, "stale").unwrap();
        let second = renderer.render(&context(None), &destination).await.unwrap();
        let second_bytes = std::fs::read(&second).unwrap();

        assert_eq!(first, destination.join(COMPOSE_FILE_NAME));
        assert_eq!(first_bytes, second_bytes);
    }

    #[tokio::test]
    async fn test_missing_template_file() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = ComposeRenderer::from_template_file(dir.path().join("absent.hbs"));

        let err = renderer.render_to_string(&context(None)).await.unwrap_err();
        assert!(matches!(err, RenderError::TemplateLoad { .. }));
    }

    #[tokio::test]
    async fn test_unknown_variable_fails_in_strict_mode() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("compose.hbs");
        std::fs::write(&template, "image: {{image_override}}\n").unwrap();
        let renderer = ComposeRenderer::from_template_file(&template);

        let err = renderer.render_to_string(&context(None)).await.unwrap_err();
        assert!(matches!(err, RenderError::Template(_)));
    }
}
