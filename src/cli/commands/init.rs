use anyhow::Result;
use std::path::{Path, PathBuf};

use super::Command;
use crate::config::{SiteOpsConfig, StoreBackend};
use crate::inventory::{InventoryStore, MemoryStore, NewSite, SiteStatus};
use crate::scripts::slugify;

pub struct InitCommand {
    pub config: SiteOpsConfig,
    pub config_path: PathBuf,
    pub force: bool,
}

impl InitCommand {
    pub fn new(config: SiteOpsConfig, config_path: PathBuf) -> Self {
        Self {
            config,
            config_path,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Empty inventory holding only the storage site and the relocation role
    pub async fn seed_inventory(&self) -> Result<MemoryStore> {
        let store = MemoryStore::new();
        let storage = &self.config.decommission.storage_site;
        store
            .create_site(NewSite::new(storage, &slugify(storage), SiteStatus::Active))
            .await?;
        store
            .create_role(&self.config.decommission.relocation_role)
            .await?;
        Ok(store)
    }

    fn should_write(&self, path: &Path) -> bool {
        if path.exists() && !self.force {
            println!("⏭️  {} already exists (use --force to overwrite)", path.display());
            return false;
        }
        true
    }
}

impl Command for InitCommand {
    async fn execute(&self) -> Result<()> {
        println!("⚙️  Initializing site-ops");
        println!();

        if self.should_write(&self.config_path) {
            self.config.save_to_file(&self.config_path)?;
            println!("✅ Wrote configuration to {}", self.config_path.display());
        }

        if self.config.inventory.backend == StoreBackend::Snapshot {
            let snapshot = Path::new(&self.config.inventory.snapshot_path);
            if self.should_write(snapshot) {
                let store = self.seed_inventory().await?;
                store.save_to(snapshot).await?;
                println!(
                    "✅ Wrote inventory snapshot to {} with storage site '{}' and role '{}'",
                    snapshot.display(),
                    self.config.decommission.storage_site,
                    self.config.decommission.relocation_role
                );
            }
        } else {
            println!("ℹ️  Inventory backend is {:?}; no snapshot written", self.config.inventory.backend);
        }

        println!();
        println!("💡 Next: site-ops provision <name> --camera-subnet .. --pos-subnet ..");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_writes_config_and_seeded_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SiteOpsConfig::default();
        config.inventory.snapshot_path = dir
            .path()
            .join("inventory.json")
            .to_string_lossy()
            .to_string();
        let config_path = dir.path().join("site-ops.toml");

        InitCommand::new(config.clone(), config_path.clone())
            .execute()
            .await
            .unwrap();

        assert!(config_path.exists());
        let store = MemoryStore::open(&config.inventory.snapshot_path).await.unwrap();
        let storage = store.get_site_by_name("Storage Site").await.unwrap().unwrap();
        assert_eq!(storage.slug, "storage-site");
        assert!(store.get_role_by_name("Server").await.unwrap().is_some());
    }
}
