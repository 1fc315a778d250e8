//! Tailscale control-plane client
//!
//! Wraps `GET /api/v2/tailnet/{tailnet}/devices` using [`reqwest`].

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{MeshError, MeshNode, MeshStatusSource};
use crate::config::MeshConfig;

pub const DEFAULT_API_URL: &str = "https://api.tailscale.com";

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    #[serde(default)]
    devices: Vec<MeshNode>,
}

/// HTTP client for one tailnet
pub struct TailscaleClient {
    client: reqwest::Client,
    api_url: String,
    tailnet: String,
    api_key: String,
}

impl TailscaleClient {
    /// * `api_url` - Base URL without trailing slash, e.g. `https://api.tailscale.com`.
    pub fn new(api_url: &str, tailnet: &str, api_key: &str) -> Self {
        Self::with_client(reqwest::Client::new(), api_url, tailnet, api_key)
    }

    pub fn with_client(client: reqwest::Client, api_url: &str, tailnet: &str, api_key: &str) -> Self {
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            tailnet: tailnet.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Build a client from configuration, with `api_key` overriding the
    /// configured key when given
    pub fn from_config(config: &MeshConfig, api_key: Option<&str>) -> Result<Self, MeshError> {
        let key = api_key
            .map(str::to_string)
            .or_else(|| config.api_key.clone())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| MeshError::MissingCredentials {
                message: "set mesh.api_key, SITE_OPS_MESH__API_KEY or TAILSCALE_API_KEY".to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self::with_client(client, &config.api_url, &config.tailnet, &key))
    }

    pub fn devices_url(&self) -> String {
        format!("{}/api/v2/tailnet/{}/devices", self.api_url, self.tailnet)
    }
}

#[async_trait]
impl MeshStatusSource for TailscaleClient {
    async fn list_nodes(&self) -> Result<Vec<MeshNode>, MeshError> {
        let url = self.devices_url();
        debug!(url = %url, "Querying Tailscale devices");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(MeshError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let payload: DevicesResponse = response.json().await?;
        debug!(nodes = payload.devices.len(), "Tailscale devices received");
        Ok(payload.devices)
    }
}
