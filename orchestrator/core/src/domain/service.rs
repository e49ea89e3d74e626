// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Service Domain Types
//!
//! The request a tenant submits to provision a database, the resource shape
//! it asks for, and the records produced once the database is running.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Value objects flowing through the provisioning workflow
//!
//! `ServiceRequest` is the wire shape of `POST /createservice`. Field names
//! follow the public JSON contract (`userid`, `resource.version.maj`, ...),
//! so serde renames are used instead of Rust-style names on the wire.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::path_sanitizer::{IdentifierError, validate_segment};

/// Tenant identifier, taken from the `sub` claim of the caller's token and
/// from the `userid` field of the request body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(pub String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tenant identifiers become directory names, so they must be a single
    /// safe path segment.
    pub fn validate(&self) -> Result<(), IdentifierError> {
        validate_segment("userid", &self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier the container engine assigned to a launched container.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContainerId(pub String);

impl ContainerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Database engines this host knows how to provision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseEngine {
    Postgres,
}

impl DatabaseEngine {
    pub const SUPPORTED: &'static [DatabaseEngine] = &[DatabaseEngine::Postgres];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseEngine::Postgres => "postgres",
        }
    }

    /// Port the engine listens on inside its container.
    pub fn container_port(&self) -> u16 {
        match self {
            DatabaseEngine::Postgres => 5432,
        }
    }
}

impl FromStr for DatabaseEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" => Ok(DatabaseEngine::Postgres),
            other => Err(format!("currently we don't support {}", other)),
        }
    }
}

impl fmt::Display for DatabaseEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseVersion {
    pub maj: u32,
    pub min: u32,
}

impl fmt::Display for DatabaseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.maj, self.min)
    }
}

/// Resource shape requested for the database.
///
/// `port` and `container_id` are never supplied by the caller: the
/// orchestrator fills them in after allocation and launch respectively.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseResource {
    /// Memory limit in the container engine's notation (e.g. `32MB`)
    pub memory: String,
    /// Storage quota
    pub storage: u64,
    pub version: DatabaseVersion,
    #[serde(skip)]
    pub port: Option<u16>,
    #[serde(skip)]
    pub container_id: Option<ContainerId>,
}

/// Memory limits accepted by the container engine: digits plus an optional unit.
const MEMORY_LIMIT_PATTERN: &str = r"^(?i)[0-9]+(b|k|kb|m|mb|g|gb)?$";

impl DatabaseResource {
    /// The memory limit is written verbatim into the compose document, so
    /// only a plain quantity such as `32MB` or `1g` is accepted.
    pub fn validate_memory(&self) -> Result<(), String> {
        let pattern = Regex::new(MEMORY_LIMIT_PATTERN).map_err(|e| e.to_string())?;
        if pattern.is_match(&self.memory) {
            Ok(())
        } else {
            Err(format!(
                "resource.memory {:?} is not a memory quantity such as 32MB or 1g",
                self.memory
            ))
        }
    }
}

/// Body of `POST /createservice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceRequest {
    /// Requested database engine, also used as the cluster name
    pub name: String,
    /// Requested lifetime of the service
    pub duration: u64,
    pub resource: DatabaseResource,
    #[serde(rename = "userid")]
    pub user_id: TenantId,
}

impl ServiceRequest {
    /// Resolve the requested engine against the supported set.
    pub fn engine(&self) -> Result<DatabaseEngine, String> {
        self.name.parse()
    }

    /// Name of the cluster on disk and in the metadata store.
    pub fn cluster_name(&self) -> &str {
        &self.name
    }

    pub fn project_name(&self) -> String {
        compose_project_name(&self.user_id, self.cluster_name())
    }
}

/// Compose project name for one tenant's cluster.
///
/// Compose only accepts lowercase project names, so `_` is doubled and an
/// uppercase letter becomes `_` plus its lowercase form. Tenants that
/// differ only in case therefore never share a project.
pub fn compose_project_name(tenant_id: &TenantId, name: &str) -> String {
    let mut project = String::from("spinup-");
    for c in tenant_id.as_str().chars() {
        match c {
            '_' => project.push_str("__"),
            c if c.is_ascii_uppercase() => {
                project.push('_');
                project.push(c.to_ascii_lowercase());
            }
            c => project.push(c),
        }
    }
    project.push('-');
    project.push_str(&name.to_ascii_lowercase());
    project
}

/// Outward-facing result of a successful provision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionedService {
    #[serde(rename = "HostName")]
    pub host_name: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "ContainerID")]
    pub container_id: ContainerId,
}

/// Durable row describing one provisioned cluster in a tenant's store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterRecord {
    #[serde(rename = "ClusterID")]
    pub cluster_id: ContainerId,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Port")]
    pub port: u16,
}

/// A `ClusterRecord` as read back from a store, with its row id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCluster {
    pub id: i64,
    #[serde(flatten)]
    pub record: ClusterRecord,
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &str = r#"{
        "name": "postgres",
        "duration": 200,
        "resource": {"memory": "32MB", "storage": 200, "version": {"maj": 9, "min": 6}},
        "userid": "u1"
    }"#;

    #[test]
    fn test_parse_wire_request() {
        let request: ServiceRequest = serde_json::from_str(BODY).unwrap();
        assert_eq!(request.user_id, TenantId::new("u1"));
        assert_eq!(request.resource.version, DatabaseVersion { maj: 9, min: 6 });
        assert_eq!(request.resource.memory, "32MB");
        assert!(request.resource.port.is_none());
        assert_eq!(request.engine().unwrap(), DatabaseEngine::Postgres);
    }

    #[test]
    fn test_caller_cannot_supply_port() {
        let body = r#"{
            "name": "postgres",
            "duration": 200,
            "resource": {"memory": "32MB", "storage": 200, "version": {"maj": 9, "min": 6}, "port": 1},
            "userid": "u1"
        }"#;
        assert!(serde_json::from_str::<ServiceRequest>(body).is_err());
    }

    #[test]
    fn test_unsupported_engine() {
        let mut request: ServiceRequest = serde_json::from_str(BODY).unwrap();
        request.name = "mysql".to_string();
        let err = request.engine().unwrap_err();
        assert!(err.contains("mysql"));
    }

    #[test]
    fn test_memory_quantities() {
        let mut request: ServiceRequest = serde_json::from_str(BODY).unwrap();
        for ok in ["32MB", "512m", "1g", "1GB", "1048576", "64kb"] {
            request.resource.memory = ok.to_string();
            assert!(request.resource.validate_memory().is_ok(), "{}", ok);
        }
        for bad in ["", "MB", "32 MB", "32MB\n    privileged: true", "-1m", "32tb", "1.5g"] {
            request.resource.memory = bad.to_string();
            assert!(request.resource.validate_memory().is_err(), "{:?}", bad);
        }
    }

    #[test]
    fn test_project_names_are_distinct_per_tenant() {
        let name = |tenant: &str| compose_project_name(&TenantId::new(tenant), "postgres");
        assert_eq!(name("u1"), "spinup-u1-postgres");
        assert_ne!(name("u1"), name("u2"));
        assert_ne!(name("U1"), name("u1"));
        assert_ne!(name("U1"), name("_u1"));
        assert!(name("Team_A").chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_'));
    }

    #[test]
    fn test_response_uses_public_field_names() {
        let response = ProvisionedService {
            host_name: "localhost".to_string(),
            port: 5432,
            container_id: ContainerId::new("abc123"),
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["HostName"], "localhost");
        assert_eq!(value["Port"], 5432);
        assert_eq!(value["ContainerID"], "abc123");
    }
}
