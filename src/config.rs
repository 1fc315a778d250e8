use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::mesh::tailscale::DEFAULT_API_URL;
use crate::scripts::decommission::{DEFAULT_RELOCATION_ROLE, DEFAULT_STORAGE_SITE};
use crate::scripts::mesh_sync::DEFAULT_MESH_TAG;
use crate::scripts::VersionField;

/// Main configuration structure for site-ops
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteOpsConfig {
    /// Where the inventory lives
    pub inventory: InventoryConfig,
    /// Site decommissioning settings
    pub decommission: DecommissionConfig,
    /// Version report settings
    pub reports: ReportConfig,
    /// VPN mesh (Tailscale) settings
    pub mesh: MeshConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// Database settings (used by the sqlite backend)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// JSON snapshot file, rewritten after every change
    Snapshot,
    /// SQLite database (requires the `database` feature)
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryConfig {
    pub backend: StoreBackend,
    /// Path of the JSON snapshot for the snapshot backend
    pub snapshot_path: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DecommissionConfig {
    /// Site that receives relocated devices
    pub storage_site: String,
    /// Only devices with this role are relocated
    pub relocation_role: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReportConfig {
    /// Devices carrying this tag appear in the version report
    pub device_tag: String,
    /// Custom fields shown as report columns
    pub version_fields: Vec<VersionField>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MeshConfig {
    /// Tailscale API base URL
    pub api_url: String,
    /// Tailnet whose devices are queried
    pub tailnet: String,
    /// API key (can be set via env var)
    pub api_key: Option<String>,
    /// Devices carrying this tag follow their mesh node status
    pub device_tag: String,
    /// HTTP request timeout
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub json_logs: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for SiteOpsConfig {
    fn default() -> Self {
        Self {
            inventory: InventoryConfig {
                backend: StoreBackend::Snapshot,
                snapshot_path: "inventory.json".to_string(),
            },
            decommission: DecommissionConfig {
                storage_site: DEFAULT_STORAGE_SITE.to_string(),
                relocation_role: DEFAULT_RELOCATION_ROLE.to_string(),
            },
            reports: ReportConfig {
                device_tag: "Server".to_string(),
                version_fields: vec![
                    VersionField::new("cartwatch_version", "Cartwatch"),
                    VersionField::new("cartwatch_admin_version", "Cartwatch Admin"),
                ],
            },
            mesh: MeshConfig {
                api_url: DEFAULT_API_URL.to_string(),
                tailnet: "tail84d4c.ts.net".to_string(),
                api_key: None, // Will be read from env var
                device_tag: DEFAULT_MESH_TAG.to_string(),
                timeout_seconds: 30,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
            },
            database: Some(DatabaseConfig {
                url: "sqlite://site-ops.db".to_string(),
                max_connections: 5,
                auto_migrate: true,
            }),
        }
    }
}

impl SiteOpsConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration file (site-ops.toml)
    /// 3. Environment variables (prefixed with SITE_OPS_, nested keys split by `__`)
    pub fn load() -> Result<Self> {
        let file = Path::new("site-ops.toml");
        Self::load_from(file.exists().then_some(file))
    }

    /// Same as [`SiteOpsConfig::load`] with an explicit configuration file
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("SITE_OPS")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut site_ops_config: SiteOpsConfig = builder.build()?.try_deserialize()?;

        // The Tailscale key is commonly exported under its own name
        if site_ops_config.mesh.api_key.is_none() {
            if let Ok(key) = std::env::var("TAILSCALE_API_KEY") {
                site_ops_config.mesh.api_key = Some(key);
            }
        }

        Ok(site_ops_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<SiteOpsConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = SiteOpsConfig::load_env_file();
        SiteOpsConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static SiteOpsConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-ops.toml");
        std::fs::write(
            &path,
            r#"
[decommission]
storage_site = "Warehouse"
relocation_role = "Server"

[mesh]
tailnet = "corp.ts.net"
"#,
        )
        .unwrap();

        let config = SiteOpsConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.decommission.storage_site, "Warehouse");
        assert_eq!(config.mesh.tailnet, "corp.ts.net");
        // Untouched sections keep their defaults
        assert_eq!(config.mesh.api_url, DEFAULT_API_URL);
        assert_eq!(config.reports.version_fields.len(), 2);
        assert_eq!(config.inventory.backend, StoreBackend::Snapshot);
    }

    #[test]
    fn test_saved_config_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("site-ops.toml");
        let mut original = SiteOpsConfig::default();
        original.decommission.relocation_role = "Appliance".to_string();
        original.save_to_file(&path).unwrap();

        let loaded = SiteOpsConfig::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.decommission.relocation_role, "Appliance");
        assert_eq!(loaded.reports.device_tag, "Server");
    }
}
