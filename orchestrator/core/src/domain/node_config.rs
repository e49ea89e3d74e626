// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Node Configuration Types
//
// Defines the configuration schema for a spinup host, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Project root and target architecture for rendered services
// - Token key material, port range, container engine and DNS settings
//
// The manifest is loaded once at process start and shared immutably with
// every collaborator for the lifetime of the process.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::domain::ports::PortRange;

pub const API_VERSION: &str = "spinup.host/v1";
pub const KIND: &str = "SpinupConfig";

/// Architectures with published database images
pub const SUPPORTED_ARCHITECTURES: &[&str] = &["amd64", "arm64v8", "arm32v7"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration at {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Failed to write configuration at {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level Kubernetes-style configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigManifest {
    /// API version (must be "spinup.host/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "SpinupConfig")
    pub kind: String,

    pub metadata: ManifestMetadata,

    pub spec: NodeConfigSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestMetadata {
    /// Human-readable host name
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfigSpec {
    /// Root directory holding key material, tenant stores and rendered services
    #[serde(default = "default_project_dir")]
    pub project_dir: PathBuf,

    /// Image architecture prefix (one of amd64, arm64v8, arm32v7)
    #[serde(default = "default_architecture")]
    pub architecture: String,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub ports: PortsConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub compose: ComposeConfig,

    #[serde(default)]
    pub dns: DnsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_api_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// PEM public key used to verify bearer tokens
    /// Default: <project_dir>/app.rsa.pub
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_key_path: Option<PathBuf>,

    /// PEM private key used by `spinup token issue`
    /// Default: <project_dir>/app.rsa
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key_path: Option<PathBuf>,

    /// Lifetime of issued tokens in seconds
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortsConfig {
    /// First port handed out (inclusive)
    #[serde(default = "default_port_start")]
    pub start: u16,

    /// End of the range (exclusive)
    #[serde(default = "default_port_end")]
    pub end: u16,

    /// Connection timeout when probing a candidate port
    #[serde(default = "default_dial_timeout_ms")]
    pub dial_timeout_ms: u64,

    /// Upper bound on how long an in-process reservation may live
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_secs: u64,

    /// How long to wait for a launched service to bind its port before
    /// releasing the reservation anyway
    #[serde(default = "default_bind_confirm_timeout_ms")]
    pub bind_confirm_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_docker_binary")]
    pub docker_binary: String,

    #[serde(default = "default_compose_binary")]
    pub compose_binary: String,

    /// Timeout applied to every engine command
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComposeConfig {
    /// Handlebars template overriding the built-in compose template
    #[serde(skip_serializing_if = "Option::is_none")]
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Address every service record points at
    #[serde(default = "default_record_content")]
    pub record_content: String,

    /// Zone domain used to build reported host names
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default = "default_dns_api_base_url")]
    pub api_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "trace")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format ("json" or "text")
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_project_dir() -> PathBuf {
    PathBuf::from("/var/lib/spinup")
}

fn default_architecture() -> String {
    "amd64".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    4434
}

fn default_token_ttl() -> u64 {
    24 * 60 * 60
}

fn default_port_start() -> u16 {
    5432
}

fn default_port_end() -> u16 {
    5440
}

fn default_dial_timeout_ms() -> u64 {
    3000
}

fn default_reservation_ttl() -> u64 {
    300
}

fn default_bind_confirm_timeout_ms() -> u64 {
    10_000
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_compose_binary() -> String {
    "docker-compose".to_string()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_record_content() -> String {
    "34.203.202.32".to_string()
}

fn default_domain() -> String {
    "spinup.host".to_string()
}

fn default_dns_api_base_url() -> String {
    "https://api.cloudflare.com/client/v4".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_api_port(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            public_key_path: None,
            private_key_path: None,
            token_ttl_secs: default_token_ttl(),
        }
    }
}

impl Default for PortsConfig {
    fn default() -> Self {
        Self {
            start: default_port_start(),
            end: default_port_end(),
            dial_timeout_ms: default_dial_timeout_ms(),
            reservation_ttl_secs: default_reservation_ttl(),
            bind_confirm_timeout_ms: default_bind_confirm_timeout_ms(),
        }
    }
}

impl PortsConfig {
    pub fn range(&self) -> PortRange {
        PortRange::new(self.start, self.end)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms)
    }

    pub fn reservation_ttl(&self) -> Duration {
        Duration::from_secs(self.reservation_ttl_secs)
    }

    pub fn bind_confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.bind_confirm_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            docker_binary: default_docker_binary(),
            compose_binary: default_compose_binary(),
            command_timeout_secs: default_command_timeout(),
        }
    }
}

impl EngineConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            zone_id: None,
            api_token: None,
            record_content: default_record_content(),
            domain: default_domain(),
            api_base_url: default_dns_api_base_url(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for NodeConfigSpec {
    fn default() -> Self {
        Self {
            project_dir: default_project_dir(),
            architecture: default_architecture(),
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            ports: PortsConfig::default(),
            engine: EngineConfig::default(),
            compose: ComposeConfig::default(),
            dns: DnsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl NodeConfigSpec {
    pub fn public_key_path(&self) -> PathBuf {
        self.auth
            .public_key_path
            .clone()
            .unwrap_or_else(|| self.project_dir.join("app.rsa.pub"))
    }

    pub fn private_key_path(&self) -> PathBuf {
        self.auth
            .private_key_path
            .clone()
            .unwrap_or_else(|| self.project_dir.join("app.rsa"))
    }
}

impl Default for NodeConfigManifest {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: "spinup".to_string(),
                labels: None,
            },
            spec: NodeConfigSpec::default(),
        }
    }
}

impl NodeConfigManifest {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Discover configuration file using precedence order
    /// 1. SPINUP_CONFIG_PATH environment variable
    /// 2. ./spinup-config.yaml (working directory)
    /// 3. ~/.spinup/config.yaml (user home)
    /// 4. /etc/spinup/config.yaml
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SPINUP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./spinup-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".spinup").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/spinup/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default.
    /// Environment overrides are applied in every case.
    pub fn load_or_default(cli_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            Self::from_yaml_file(&path)?
        } else if let Some(path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", path);
            Self::from_yaml_file(path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply the deployment variables, reading them through `lookup`.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("SPINUP_PROJECT_DIR") {
            tracing::info!("Environment override: SPINUP_PROJECT_DIR={}", dir);
            self.spec.project_dir = PathBuf::from(dir);
        }
        if let Some(arch) = lookup("ARCHITECTURE") {
            tracing::info!("Environment override: ARCHITECTURE={}", arch);
            self.spec.architecture = arch;
        }
        if let Some(token) = lookup("CF_AUTHORIZATION_TOKEN") {
            tracing::info!("Environment override: CF_AUTHORIZATION_TOKEN=<redacted>");
            self.spec.dns.api_token = Some(token);
        }
        if let Some(zone) = lookup("CF_ZONE_ID") {
            tracing::info!("Environment override: CF_ZONE_ID={}", zone);
            self.spec.dns.zone_id = Some(zone);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if self.api_version != API_VERSION {
            return invalid(format!(
                "apiVersion '{}' must be '{}'",
                self.api_version, API_VERSION
            ));
        }
        if self.kind != KIND {
            return invalid(format!("kind '{}' must be '{}'", self.kind, KIND));
        }
        if self.metadata.name.is_empty() {
            return invalid("metadata.name cannot be empty".to_string());
        }

        let spec = &self.spec;
        if spec.project_dir.as_os_str().is_empty() {
            return invalid("spec.project_dir cannot be empty".to_string());
        }
        if !SUPPORTED_ARCHITECTURES.contains(&spec.architecture.as_str()) {
            return invalid(format!(
                "spec.architecture '{}' is not one of {:?}",
                spec.architecture, SUPPORTED_ARCHITECTURES
            ));
        }
        if spec.ports.range().is_empty() {
            return invalid(format!(
                "spec.ports range [{}, {}) is empty",
                spec.ports.start, spec.ports.end
            ));
        }
        if spec.engine.command_timeout_secs == 0 {
            return invalid("spec.engine.command_timeout_secs must be greater than zero".to_string());
        }
        if spec.dns.enabled {
            if spec.dns.zone_id.as_deref().unwrap_or("").is_empty() {
                return invalid("spec.dns.zone_id is required when DNS is enabled".to_string());
            }
            if spec.dns.api_token.as_deref().unwrap_or("").is_empty() {
                return invalid("spec.dns.api_token is required when DNS is enabled".to_string());
            }
        }
        if !matches!(spec.logging.format.as_str(), "json" | "text") {
            return invalid(format!(
                "spec.logging.format '{}' must be 'json' or 'text'",
                spec.logging.format
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest() {
        let manifest = NodeConfigManifest::default();
        assert_eq!(manifest.api_version, API_VERSION);
        assert_eq!(manifest.kind, KIND);
        assert_eq!(manifest.spec.ports.range(), PortRange::new(5432, 5440));
        assert_eq!(manifest.spec.engine.compose_binary, "docker-compose");
        assert!(!manifest.spec.dns.enabled);
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_minimal_yaml_fills_defaults() {
        let yaml = r#"
apiVersion: spinup.host/v1
kind: SpinupConfig
metadata:
  name: edge-1
spec:
  project_dir: /srv/spinup
  architecture: arm64v8
  ports:
    start: 6000
    end: 6004
"#;
        let manifest = NodeConfigManifest::from_yaml_str(yaml).unwrap();
        assert_eq!(manifest.spec.project_dir, PathBuf::from("/srv/spinup"));
        assert_eq!(manifest.spec.ports.range().len(), 4);
        assert_eq!(manifest.spec.ports.dial_timeout(), Duration::from_secs(3));
        assert_eq!(manifest.spec.network.port, 4434);
        assert_eq!(manifest.spec.auth.token_ttl_secs, 86400);
        assert_eq!(
            manifest.spec.public_key_path(),
            PathBuf::from("/srv/spinup/app.rsa.pub")
        );
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut manifest = NodeConfigManifest::default();
        let vars: HashMap<&str, &str> = HashMap::from([
            ("SPINUP_PROJECT_DIR", "/data/spinup"),
            ("ARCHITECTURE", "arm32v7"),
            ("CF_ZONE_ID", "zone-1"),
        ]);
        manifest.apply_overrides(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(manifest.spec.project_dir, PathBuf::from("/data/spinup"));
        assert_eq!(manifest.spec.architecture, "arm32v7");
        assert_eq!(manifest.spec.dns.zone_id.as_deref(), Some("zone-1"));
        assert!(manifest.spec.dns.api_token.is_none());
        assert_eq!(manifest.spec.private_key_path(), PathBuf::from("/data/spinup/app.rsa"));
    }

    #[test]
    fn test_validation() {
        let mut manifest = NodeConfigManifest::default();

        manifest.api_version = "wrong/v1".to_string();
        assert!(manifest.validate().is_err());
        manifest.api_version = API_VERSION.to_string();

        manifest.spec.architecture = "sparc".to_string();
        assert!(manifest.validate().is_err());
        manifest.spec.architecture = "amd64".to_string();

        manifest.spec.ports.end = manifest.spec.ports.start;
        assert!(manifest.validate().is_err());
        manifest.spec.ports.end = 5440;

        manifest.spec.dns.enabled = true;
        assert!(manifest.validate().is_err());
        manifest.spec.dns.zone_id = Some("zone".to_string());
        manifest.spec.dns.api_token = Some("token".to_string());
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spinup-config.yaml");
        let mut manifest = NodeConfigManifest::default();
        manifest.spec.architecture = "arm64v8".to_string();
        manifest.to_yaml_file(&path).unwrap();

        let loaded = NodeConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded.spec.architecture, "arm64v8");
        assert!(NodeConfigManifest::from_yaml_file(dir.path().join("missing.yaml")).is_err());
    }
}
