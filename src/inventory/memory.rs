// In-memory inventory graph with optional JSON snapshot persistence

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tokio::fs;
use tracing::{debug, info};

use super::store::{validate_cidr, validate_site_name, InventoryStore, StoreError};
use super::types::*;

/// Every inventory record, keyed by id
///
/// Child records point at their site by id; there are no back references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default = "first_id")]
    next_id: u64,
    #[serde(default)]
    pub sites: BTreeMap<SiteId, Site>,
    #[serde(default)]
    pub devices: BTreeMap<DeviceId, Device>,
    #[serde(default)]
    pub roles: BTreeMap<RoleId, Role>,
    #[serde(default)]
    pub platforms: BTreeMap<PlatformId, Platform>,
    #[serde(default)]
    pub racks: BTreeMap<RackId, Rack>,
    #[serde(default)]
    pub vrfs: BTreeMap<VrfId, Vrf>,
    #[serde(default)]
    pub prefixes: BTreeMap<PrefixId, Prefix>,
    #[serde(default)]
    pub contacts: BTreeMap<ContactId, Contact>,
}

fn first_id() -> u64 {
    1
}

impl Inventory {
    fn allocate_id(&mut self) -> u64 {
        // Snapshots written by hand may omit next_id
        let highest = [
            self.sites.keys().next_back(),
            self.devices.keys().next_back(),
            self.roles.keys().next_back(),
            self.platforms.keys().next_back(),
            self.racks.keys().next_back(),
            self.vrfs.keys().next_back(),
            self.prefixes.keys().next_back(),
            self.contacts.keys().next_back(),
        ]
        .into_iter()
        .flatten()
        .copied()
        .max()
        .unwrap_or(0);

        let id = self.next_id.max(highest + 1).max(1);
        self.next_id = id + 1;
        id
    }

    fn require_site(&self, id: SiteId) -> Result<&Site, StoreError> {
        self.sites
            .get(&id)
            .ok_or(StoreError::NotFound { kind: "Site", id })
    }

    fn check_site_unique(&self, id: Option<SiteId>, name: &str, slug: &str) -> Result<(), StoreError> {
        for site in self.sites.values().filter(|s| Some(s.id) != id) {
            if site.name == name {
                return Err(StoreError::Duplicate {
                    kind: "Site",
                    field: "name",
                    value: name.to_string(),
                });
            }
            if site.slug == slug {
                return Err(StoreError::Duplicate {
                    kind: "Site",
                    field: "slug",
                    value: slug.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// [`InventoryStore`] over an [`Inventory`] held in memory
///
/// When opened from a snapshot file, every mutation is written back to that
/// file before the call returns.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inventory: Mutex<Inventory>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_inventory(inventory: Inventory) -> Self {
        Self {
            inventory: Mutex::new(inventory),
            snapshot_path: None,
        }
    }

    /// Load a snapshot file and keep writing changes back to it
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let content = fs::read_to_string(&path).await?;
        let inventory: Inventory = serde_json::from_str(&content)?;

        info!(
            path = %path.display(),
            sites = inventory.sites.len(),
            devices = inventory.devices.len(),
            "Loaded inventory snapshot"
        );

        Ok(Self {
            inventory: Mutex::new(inventory),
            snapshot_path: Some(path),
        })
    }

    /// Write the current inventory to `path`
    pub async fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), StoreError> {
        let serialized = serde_json::to_string_pretty(&*self.lock())?;
        write_replacing(path.as_ref(), serialized).await
    }

    /// Copy of the current inventory
    pub fn snapshot(&self) -> Inventory {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inventory> {
        // A panic mid-mutation leaves the graph as it was at the panic point
        self.inventory.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn persist(&self) -> Result<(), StoreError> {
        if let Some(path) = &self.snapshot_path {
            let serialized = serde_json::to_string_pretty(&*self.lock())?;
            write_replacing(path, serialized).await?;
            debug!(path = %path.display(), "Inventory snapshot written");
        }
        Ok(())
    }
}

/// Path of the scratch file a snapshot is written to before it replaces `path`
fn temp_path(path: &Path) -> PathBuf {
    PathBuf::from(format!("{}.tmp", path.display()))
}

/// Write to a temporary file first, then rename over `path`; an interrupted
/// write leaves the previous snapshot intact
async fn write_replacing(path: &Path, serialized: String) -> Result<(), StoreError> {
    let temp_file = temp_path(path);
    fs::write(&temp_file, serialized).await?;
    fs::rename(&temp_file, path).await?;
    Ok(())
}

#[async_trait]
impl InventoryStore for MemoryStore {
    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        Ok(self.lock().sites.get(&id).cloned())
    }

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>, StoreError> {
        Ok(self.lock().sites.values().find(|s| s.name == name).cloned())
    }

    async fn get_site_by_slug(&self, slug: &str) -> Result<Option<Site>, StoreError> {
        Ok(self.lock().sites.values().find(|s| s.slug == slug).cloned())
    }

    async fn create_site(&self, site: NewSite) -> Result<Site, StoreError> {
        validate_site_name(&site.name)?;
        let created = {
            let mut inventory = self.lock();
            inventory.check_site_unique(None, &site.name, &site.slug)?;
            let created = Site {
                id: inventory.allocate_id(),
                name: site.name,
                slug: site.slug,
                status: site.status,
                description: site.description,
                physical_address: site.physical_address,
                contact: None,
                custom_fields: CustomFields::new(),
            };
            inventory.sites.insert(created.id, created.clone());
            created
        };
        self.persist().await?;
        Ok(created)
    }

    async fn update_site(&self, site: &Site) -> Result<(), StoreError> {
        validate_site_name(&site.name)?;
        {
            let mut inventory = self.lock();
            inventory.require_site(site.id)?;
            inventory.check_site_unique(Some(site.id), &site.name, &site.slug)?;
            if let Some(contact) = site.contact {
                if !inventory.contacts.contains_key(&contact) {
                    return Err(StoreError::NotFound { kind: "Contact", id: contact });
                }
            }
            inventory.sites.insert(site.id, site.clone());
        }
        self.persist().await
    }

    async fn delete_site(&self, id: SiteId) -> Result<(), StoreError> {
        {
            let mut inventory = self.lock();
            let site = inventory.require_site(id)?;

            let devices = inventory.devices.values().filter(|d| d.site == id).count();
            let racks = inventory.racks.values().filter(|r| r.site == id).count();
            let prefixes = inventory.prefixes.values().filter(|p| p.site == id).count();
            if devices + racks + prefixes > 0 {
                return Err(StoreError::SiteInUse {
                    site: site.name.clone(),
                    devices,
                    racks,
                    prefixes,
                });
            }

            inventory.sites.remove(&id);
        }
        self.persist().await
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        Ok(self.lock().roles.values().find(|r| r.name == name).cloned())
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        let role = {
            let mut inventory = self.lock();
            if inventory.roles.values().any(|r| r.name == name) {
                return Err(StoreError::Duplicate {
                    kind: "Role",
                    field: "name",
                    value: name.to_string(),
                });
            }
            let role = Role {
                id: inventory.allocate_id(),
                name: name.to_string(),
            };
            inventory.roles.insert(role.id, role.clone());
            role
        };
        self.persist().await?;
        Ok(role)
    }

    async fn get_platform(&self, id: PlatformId) -> Result<Option<Platform>, StoreError> {
        Ok(self.lock().platforms.get(&id).cloned())
    }

    async fn create_platform(&self, name: &str) -> Result<Platform, StoreError> {
        let platform = {
            let mut inventory = self.lock();
            let platform = Platform {
                id: inventory.allocate_id(),
                name: name.to_string(),
            };
            inventory.platforms.insert(platform.id, platform.clone());
            platform
        };
        self.persist().await?;
        Ok(platform)
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        let mut devices: Vec<Device> = self
            .lock()
            .devices
            .values()
            .filter(|d| filter.matches(d))
            .cloned()
            .collect();
        devices.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(devices)
    }

    async fn create_device(&self, device: NewDevice) -> Result<Device, StoreError> {
        let created = {
            let mut inventory = self.lock();
            inventory.require_site(device.site)?;
            if !inventory.roles.contains_key(&device.role) {
                return Err(StoreError::NotFound { kind: "Role", id: device.role });
            }
            let created = Device {
                id: inventory.allocate_id(),
                name: device.name,
                site: device.site,
                role: device.role,
                platform: device.platform,
                status: device.status,
                tags: device.tags,
                custom_fields: device.custom_fields,
            };
            inventory.devices.insert(created.id, created.clone());
            created
        };
        self.persist().await?;
        Ok(created)
    }

    async fn update_device(&self, device: &Device) -> Result<(), StoreError> {
        {
            let mut inventory = self.lock();
            if !inventory.devices.contains_key(&device.id) {
                return Err(StoreError::NotFound { kind: "Device", id: device.id });
            }
            inventory.require_site(device.site)?;
            inventory.devices.insert(device.id, device.clone());
        }
        self.persist().await
    }

    async fn delete_devices_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        let removed = {
            let mut inventory = self.lock();
            let before = inventory.devices.len();
            inventory.devices.retain(|_, d| d.site != site);
            before - inventory.devices.len()
        };
        self.persist().await?;
        Ok(removed)
    }

    async fn list_racks(&self, site: SiteId) -> Result<Vec<Rack>, StoreError> {
        Ok(self
            .lock()
            .racks
            .values()
            .filter(|r| r.site == site)
            .cloned()
            .collect())
    }

    async fn create_rack(&self, name: &str, site: SiteId) -> Result<Rack, StoreError> {
        let rack = {
            let mut inventory = self.lock();
            inventory.require_site(site)?;
            let rack = Rack {
                id: inventory.allocate_id(),
                name: name.to_string(),
                site,
            };
            inventory.racks.insert(rack.id, rack.clone());
            rack
        };
        self.persist().await?;
        Ok(rack)
    }

    async fn delete_racks_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        let removed = {
            let mut inventory = self.lock();
            let before = inventory.racks.len();
            inventory.racks.retain(|_, r| r.site != site);
            before - inventory.racks.len()
        };
        self.persist().await?;
        Ok(removed)
    }

    async fn create_vrf(&self, vrf: NewVrf) -> Result<Vrf, StoreError> {
        let created = {
            let mut inventory = self.lock();
            let created = Vrf {
                id: inventory.allocate_id(),
                name: vrf.name,
                description: vrf.description,
                enforce_unique: vrf.enforce_unique,
            };
            inventory.vrfs.insert(created.id, created.clone());
            created
        };
        self.persist().await?;
        Ok(created)
    }

    async fn list_prefixes(&self, site: SiteId) -> Result<Vec<Prefix>, StoreError> {
        Ok(self
            .lock()
            .prefixes
            .values()
            .filter(|p| p.site == site)
            .cloned()
            .collect())
    }

    async fn create_prefix(&self, prefix: NewPrefix) -> Result<Prefix, StoreError> {
        validate_cidr(&prefix.prefix)?;
        let created = {
            let mut inventory = self.lock();
            inventory.require_site(prefix.site)?;
            if let Some(vrf) = prefix.vrf {
                if !inventory.vrfs.contains_key(&vrf) {
                    return Err(StoreError::NotFound { kind: "VRF", id: vrf });
                }
            }
            let created = Prefix {
                id: inventory.allocate_id(),
                prefix: prefix.prefix,
                site: prefix.site,
                vrf: prefix.vrf,
                description: prefix.description,
            };
            inventory.prefixes.insert(created.id, created.clone());
            created
        };
        self.persist().await?;
        Ok(created)
    }

    async fn delete_prefixes_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        let removed = {
            let mut inventory = self.lock();
            let before = inventory.prefixes.len();
            inventory.prefixes.retain(|_, p| p.site != site);
            before - inventory.prefixes.len()
        };
        self.persist().await?;
        Ok(removed)
    }

    async fn create_contact(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let created = {
            let mut inventory = self.lock();
            let created = Contact {
                id: inventory.allocate_id(),
                name: contact.name,
                phone: contact.phone,
                email: contact.email,
            };
            inventory.contacts.insert(created.id, created.clone());
            created
        };
        self.persist().await?;
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_site_names_and_slugs_are_unique() {
        let store = MemoryStore::new();
        store
            .create_site(NewSite::new("Branch 1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();

        let by_name = store
            .create_site(NewSite::new("Branch 1", "branch-one", SiteStatus::Active))
            .await;
        assert!(matches!(by_name, Err(StoreError::Duplicate { field: "name", .. })));

        let by_slug = store
            .create_site(NewSite::new("Branch One", "branch-1", SiteStatus::Active))
            .await;
        assert!(matches!(by_slug, Err(StoreError::Duplicate { field: "slug", .. })));

        let empty = store
            .create_site(NewSite::new("  ", "blank", SiteStatus::Active))
            .await;
        assert!(matches!(empty, Err(StoreError::Validation { .. })));
    }

    #[tokio::test]
    async fn test_delete_site_refuses_while_records_remain() {
        let store = MemoryStore::new();
        let site = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        let role = store.create_role("Server").await.unwrap();
        store
            .create_device(NewDevice::new("srv-01", site.id, role.id, DeviceStatus::Active))
            .await
            .unwrap();
        store.create_rack("R1", site.id).await.unwrap();

        let err = store.delete_site(site.id).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::SiteInUse { devices: 1, racks: 1, prefixes: 0, .. }
        ));

        assert_eq!(store.delete_devices_at_site(site.id).await.unwrap(), 1);
        assert_eq!(store.delete_racks_at_site(site.id).await.unwrap(), 1);
        store.delete_site(site.id).await.unwrap();
        assert!(store.get_site(site.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_child_records_require_existing_site() {
        let store = MemoryStore::new();
        let role = store.create_role("Server").await.unwrap();

        let device = store
            .create_device(NewDevice::new("orphan", 99, role.id, DeviceStatus::Active))
            .await;
        assert!(matches!(device, Err(StoreError::NotFound { kind: "Site", id: 99 })));

        let prefix = store
            .create_prefix(NewPrefix {
                prefix: "10.0.0.0/24".to_string(),
                site: 99,
                vrf: None,
                description: String::new(),
            })
            .await;
        assert!(matches!(prefix, Err(StoreError::NotFound { kind: "Site", .. })));
    }

    #[tokio::test]
    async fn test_list_devices_orders_by_name() {
        let store = MemoryStore::new();
        let site = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        let role = store.create_role("Server").await.unwrap();
        for name in ["srv-c", "srv-a", "srv-b"] {
            store
                .create_device(NewDevice::new(name, site.id, role.id, DeviceStatus::Active))
                .await
                .unwrap();
        }

        let names: Vec<String> = store
            .list_devices(&DeviceFilter::at_site(site.id))
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["srv-a", "srv-b", "srv-c"]);
    }

    #[tokio::test]
    async fn test_snapshot_is_written_through() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        MemoryStore::new().save_to(&path).await.unwrap();

        let store = MemoryStore::open(&path).await.unwrap();
        let site = store
            .create_site(NewSite::new("Storage Site", "storage-site", SiteStatus::Active))
            .await
            .unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        let loaded = reopened.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(loaded.name, "Storage Site");

        // Ids keep increasing after a reload
        let role = reopened.create_role("Server").await.unwrap();
        assert!(role.id > site.id);
    }

    #[tokio::test]
    async fn test_snapshot_replaced_without_leftover_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        MemoryStore::new().save_to(&path).await.unwrap();

        let store = MemoryStore::open(&path).await.unwrap();
        for (name, slug) in [("Branch 1", "branch-1"), ("Branch 2", "branch-2")] {
            store
                .create_site(NewSite::new(name, slug, SiteStatus::Active))
                .await
                .unwrap();
        }

        assert!(!temp_path(&path).exists());
        let reopened = MemoryStore::open(&path).await.unwrap();
        assert_eq!(reopened.snapshot().sites.len(), 2);
    }

    #[tokio::test]
    async fn test_interrupted_write_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        let store = MemoryStore::new();
        store
            .create_site(NewSite::new("Storage Site", "storage-site", SiteStatus::Active))
            .await
            .unwrap();
        store.save_to(&path).await.unwrap();

        // A write cut short only ever touches the scratch file
        std::fs::write(temp_path(&path), "{\"sites\": {").unwrap();

        let reopened = MemoryStore::open(&path).await.unwrap();
        assert!(reopened
            .get_site_by_name("Storage Site")
            .await
            .unwrap()
            .is_some());

        // The next write replaces the stale scratch file
        reopened.create_role("Server").await.unwrap();
        assert!(!temp_path(&path).exists());
    }
}
