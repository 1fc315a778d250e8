//! VPN mesh status sources
//!
//! The status sync only needs to know which hostnames are online. The
//! [`MeshStatusSource`] trait keeps the Tailscale HTTP client swappable for a
//! mock in tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

pub mod tailscale;

pub use tailscale::TailscaleClient;

/// A node as reported by the mesh control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshNode {
    pub hostname: String,
    #[serde(default)]
    pub online: bool,
}

#[derive(Debug, Error)]
pub enum MeshError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Mesh API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("Mesh API credentials are missing: {message}")]
    MissingCredentials { message: String },
}

#[cfg_attr(test, automock)]
#[async_trait]
pub trait MeshStatusSource: Send + Sync {
    /// Every node currently known to the mesh
    async fn list_nodes(&self) -> Result<Vec<MeshNode>, MeshError>;
}
