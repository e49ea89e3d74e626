// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Cloudflare DNS Client
//!
//! Creates `A` records for provisioned services through the Cloudflare v4 API.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Adapter for the `DnsProvider` port
//! - **Integration:** ServiceOrchestrator → Cloudflare `POST /zones/{zone}/dns_records`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::dns::{DnsError, DnsProvider, DnsRecord};
use crate::domain::node_config::DnsConfig;

#[derive(Debug, Serialize)]
struct CreateRecordRequest<'a> {
    #[serde(rename = "type")]
    record_type: &'static str,
    name: &'a str,
    content: &'a str,
    ttl: u32,
    proxied: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

pub struct CloudflareDnsClient {
    client: Client,
    base_url: String,
    zone_id: String,
    api_token: String,
}

impl CloudflareDnsClient {
    pub fn new(base_url: impl Into<String>, zone_id: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            zone_id: zone_id.into(),
            api_token: api_token.into(),
        }
    }

    /// Client for an enabled DNS section; `None` when DNS is disabled or
    /// credentials are missing.
    pub fn from_config(config: &DnsConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let zone_id = config.zone_id.as_deref().filter(|z| !z.is_empty())?;
        let api_token = config.api_token.as_deref().filter(|t| !t.is_empty())?;
        Some(Self::new(config.api_base_url.clone(), zone_id, api_token))
    }
}

#[async_trait]
impl DnsProvider for CloudflareDnsClient {
    async fn create_a_record(&self, record: &DnsRecord) -> Result<(), DnsError> {
        let url = format!("{}/zones/{}/dns_records", self.base_url, self.zone_id);
        let body = CreateRecordRequest {
            record_type: "A",
            name: &record.name,
            content: &record.content,
            ttl: 1,
            proxied: false,
        };
        debug!(name = %record.name, content = %record.content, "Creating DNS record");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| DnsError::Request(e.to_string()))?;

        let status = response.status();
        let parsed: Option<ApiResponse> = response.json().await.ok();

        match parsed {
            Some(api) if status.is_success() && api.success => {
                info!(name = %record.name, "DNS record created");
                Ok(())
            }
            Some(api) => {
                let reasons = api
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.code, e.message))
                    .collect::<Vec<_>>()
                    .join("; ");
                Err(DnsError::Rejected(format!("HTTP {}: {}", status, reasons)))
            }
            None => Err(DnsError::Rejected(format!("HTTP {} with unreadable body", status))),
        }
    }
}
