use anyhow::Result;

use crate::config::{SiteOpsConfig, StoreBackend};
use crate::inventory::{InventoryStore, MemoryStore};
use crate::scripts::ScriptLog;

pub mod decommission;
pub mod init;
pub mod mesh_sync;
pub mod provision;
pub mod versions;

pub use decommission::DecommissionCommand;
pub use init::InitCommand;
pub use mesh_sync::MeshSyncCommand;
pub use provision::ProvisionCommand;
pub use versions::VersionsCommand;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}

/// Open the inventory store selected by the configuration
pub async fn open_store(config: &SiteOpsConfig) -> Result<Box<dyn InventoryStore>> {
    match config.inventory.backend {
        StoreBackend::Snapshot => {
            let path = &config.inventory.snapshot_path;
            let store = MemoryStore::open(path).await.map_err(|e| {
                anyhow::anyhow!(
                    "Failed to open inventory snapshot '{path}': {e}\n   → Create one with: site-ops init"
                )
            })?;
            Ok(Box::new(store))
        }
        #[cfg(feature = "database")]
        StoreBackend::Sqlite => {
            let db = config
                .database
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("inventory.backend is sqlite but [database] is not configured"))?;
            let store = crate::database::SqliteInventoryStore::connect(
                &db.url,
                db.max_connections,
                db.auto_migrate,
            )
            .await?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "database"))]
        StoreBackend::Sqlite => Err(anyhow::anyhow!(
            "inventory.backend is sqlite but site-ops was built without the 'database' feature"
        )),
    }
}

/// Print every log entry followed by a blank line
pub fn print_log(log: &ScriptLog) {
    for entry in log.entries() {
        println!("{entry}");
    }
    if !log.entries().is_empty() {
        println!();
    }
}

pub async fn show_usage() -> Result<()> {
    println!("🗂️  site-ops - Inventory Automation");
    println!();
    println!("Workflows:");
    println!("  🏗️  site-ops provision <name> --camera-subnet .. --pos-subnet ..   # New site");
    println!("  📦 site-ops decommission <site> [--delete]                         # Retire a site");
    println!("  📋 site-ops versions                                               # Version report");
    println!("  🔗 site-ops mesh-sync [--dry-run]                                  # Tailscale status");
    println!();
    println!("Setup:");
    println!("  ⚙️  site-ops init      # Write site-ops.toml and a seeded inventory snapshot");
    println!();
    println!("💡 Every workflow prints what it changed; use --dry-run where offered to preview.");
    Ok(())
}
