//! Site decommissioning
//!
//! Moves the devices of one role from a site to the storage site, flags the
//! site as decommissioning and, on request, removes the site together with
//! everything it still owns.

use std::fmt;
use tracing::debug;

use crate::config::DecommissionConfig;
use crate::inventory::{DeviceFilter, DeviceStatus, InventoryStore, SiteStatus};

use super::{ScriptError, ScriptLog};

pub const DEFAULT_STORAGE_SITE: &str = "Storage Site";
pub const DEFAULT_RELOCATION_ROLE: &str = "Server";

#[derive(Debug, Clone)]
pub struct DecommissionRequest {
    /// Name of the site being retired
    pub site: String,
    /// Remove the site, its racks, remaining devices and prefixes after the move
    pub delete_after_move: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionCounts {
    pub racks: usize,
    pub devices: usize,
    pub prefixes: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecommissionSummary {
    pub site: String,
    pub storage_site: String,
    /// Names of the devices relocated to the storage site
    pub moved: Vec<String>,
    pub deleted: Option<DeletionCounts>,
}

impl fmt::Display for DecommissionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Moved {} devices from '{}' to '{}'",
            self.moved.len(),
            self.site,
            self.storage_site
        )?;
        match &self.deleted {
            Some(counts) => write!(
                f,
                "; deleted site with {} racks, {} devices and {} prefixes",
                counts.racks, counts.devices, counts.prefixes
            ),
            None => write!(f, "; site marked {}", SiteStatus::Decommissioning),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SiteDecommission {
    storage_site: String,
    relocation_role: String,
}

impl Default for SiteDecommission {
    fn default() -> Self {
        Self::new(DEFAULT_STORAGE_SITE, DEFAULT_RELOCATION_ROLE)
    }
}

impl SiteDecommission {
    pub fn new(storage_site: &str, relocation_role: &str) -> Self {
        Self {
            storage_site: storage_site.to_string(),
            relocation_role: relocation_role.to_string(),
        }
    }

    pub fn from_config(config: &DecommissionConfig) -> Self {
        Self::new(&config.storage_site, &config.relocation_role)
    }

    pub async fn run(
        &self,
        store: &dyn InventoryStore,
        request: &DecommissionRequest,
        log: &mut ScriptLog,
    ) -> Result<DecommissionSummary, ScriptError> {
        // Every precondition is checked before the first write
        let storage_site = match store.get_site_by_name(&self.storage_site).await {
            Ok(Some(site)) => site,
            Ok(None) => {
                return Err(fail(
                    log,
                    ScriptError::configuration(format!(
                        "Storage site '{}' does not exist. Please check the site name.",
                        self.storage_site
                    )),
                ))
            }
            Err(e) => return Err(fail(log, e.into())),
        };

        if request.site == storage_site.name {
            return Err(fail(
                log,
                ScriptError::invalid_request(
                    "The decommission site and storage site must be different.",
                ),
            ));
        }

        let role = match store.get_role_by_name(&self.relocation_role).await {
            Ok(Some(role)) => role,
            Ok(None) => {
                return Err(fail(
                    log,
                    ScriptError::configuration(format!(
                        "Device role '{}' does not exist.",
                        self.relocation_role
                    )),
                ))
            }
            Err(e) => return Err(fail(log, e.into())),
        };

        let mut site = match store.get_site_by_name(&request.site).await {
            Ok(Some(site)) => site,
            Ok(None) => {
                return Err(fail(
                    log,
                    ScriptError::invalid_request(format!(
                        "Site '{}' does not exist.",
                        request.site
                    )),
                ))
            }
            Err(e) => return Err(fail(log, e.into())),
        };

        let devices = store
            .list_devices(&DeviceFilter::at_site(site.id).with_role(role.id))
            .await
            .map_err(|e| fail(log, e.into()))?;
        debug!(site = %site.name, role = %role.name, count = devices.len(), "Selected devices to relocate");

        let mut moved = Vec::with_capacity(devices.len());
        if devices.is_empty() {
            log.info(format!(
                "No '{}' devices found at site '{}'. Nothing to move.",
                role.name, site.name
            ));
        } else {
            for mut device in devices {
                device.site = storage_site.id;
                device.status = DeviceStatus::Decommissioning;
                store
                    .update_device(&device)
                    .await
                    .map_err(|e| fail(log, e.into()))?;
                log.success(format!(
                    "Moved device '{}' from '{}' to '{}'.",
                    device.name, site.name, storage_site.name
                ));
                moved.push(device.name);
            }
            log.info(format!(
                "Successfully moved {} devices from '{}' to '{}'.",
                moved.len(),
                site.name,
                storage_site.name
            ));
        }

        site.status = SiteStatus::Decommissioning;
        store.update_site(&site).await.map_err(|e| fail(log, e.into()))?;
        log.success(format!(
            "Updated site status of '{}' to 'Decommissioning'.",
            site.name
        ));

        let deleted = if request.delete_after_move {
            let racks = store
                .delete_racks_at_site(site.id)
                .await
                .map_err(|e| fail(log, e.into()))?;
            // Devices outside the relocation role are still attached here
            let devices = store
                .delete_devices_at_site(site.id)
                .await
                .map_err(|e| fail(log, e.into()))?;
            let prefixes = store
                .delete_prefixes_at_site(site.id)
                .await
                .map_err(|e| fail(log, e.into()))?;
            store
                .delete_site(site.id)
                .await
                .map_err(|e| fail(log, e.into()))?;

            log.success(format!(
                "Deleted site '{}', {} racks, {} devices, and {} IP prefixes.",
                site.name, racks, devices, prefixes
            ));
            Some(DeletionCounts {
                racks,
                devices,
                prefixes,
            })
        } else {
            None
        };

        Ok(DecommissionSummary {
            site: site.name,
            storage_site: storage_site.name,
            moved,
            deleted,
        })
    }
}

fn fail(log: &mut ScriptLog, error: ScriptError) -> ScriptError {
    log.failure(error.to_string());
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{
        Device, DeviceFilter, MemoryStore, MockInventoryStore, NewDevice, NewPrefix, NewSite,
        Role, Site, StoreError,
    };
    use crate::scripts::LogLevel;

    struct Fixture {
        store: MemoryStore,
        branch: Site,
        warehouse: Site,
    }

    /// Warehouse storage site, Branch-1 with three servers, one switch, a
    /// rack and a prefix
    async fn branch_fixture() -> Fixture {
        let store = MemoryStore::new();
        let warehouse = store
            .create_site(NewSite::new("Warehouse", "warehouse", SiteStatus::Active))
            .await
            .unwrap();
        let branch = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        let server = store.create_role("Server").await.unwrap();
        let switch = store.create_role("Switch").await.unwrap();

        for name in ["srv-01", "srv-02", "srv-03"] {
            store
                .create_device(NewDevice::new(name, branch.id, server.id, DeviceStatus::Active))
                .await
                .unwrap();
        }
        store
            .create_device(NewDevice::new("sw-01", branch.id, switch.id, DeviceStatus::Active))
            .await
            .unwrap();
        store.create_rack("R1", branch.id).await.unwrap();
        store
            .create_prefix(NewPrefix {
                prefix: "10.1.0.0/24".to_string(),
                site: branch.id,
                vrf: None,
                description: String::new(),
            })
            .await
            .unwrap();

        Fixture {
            store,
            branch,
            warehouse,
        }
    }

    fn script() -> SiteDecommission {
        SiteDecommission::new("Warehouse", "Server")
    }

    fn request(site: &str, delete_after_move: bool) -> DecommissionRequest {
        DecommissionRequest {
            site: site.to_string(),
            delete_after_move,
        }
    }

    async fn devices_at(store: &MemoryStore, site: &Site) -> Vec<Device> {
        store.list_devices(&DeviceFilter::at_site(site.id)).await.unwrap()
    }

    #[tokio::test]
    async fn test_moves_role_devices_and_keeps_site() {
        let fx = branch_fixture().await;
        let mut log = ScriptLog::new();

        let summary = script()
            .run(&fx.store, &request("Branch-1", false), &mut log)
            .await
            .unwrap();

        assert_eq!(summary.moved, vec!["srv-01", "srv-02", "srv-03"]);
        assert_eq!(summary.deleted, None);

        let relocated = devices_at(&fx.store, &fx.warehouse).await;
        assert_eq!(relocated.len(), 3);
        assert!(relocated
            .iter()
            .all(|d| d.status == DeviceStatus::Decommissioning));

        let remaining = devices_at(&fx.store, &fx.branch).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].name, "sw-01");
        assert_eq!(remaining[0].status, DeviceStatus::Active);

        let branch = fx.store.get_site(fx.branch.id).await.unwrap().unwrap();
        assert_eq!(branch.status, SiteStatus::Decommissioning);
        assert_eq!(log.count(LogLevel::Success), 4);
        assert!(!log.has_failures());
    }

    #[tokio::test]
    async fn test_delete_after_move_removes_site_and_dependents() {
        let fx = branch_fixture().await;
        let mut log = ScriptLog::new();

        let summary = script()
            .run(&fx.store, &request("Branch-1", true), &mut log)
            .await
            .unwrap();

        assert_eq!(summary.moved.len(), 3);
        assert_eq!(
            summary.deleted,
            Some(DeletionCounts {
                racks: 1,
                devices: 1,
                prefixes: 1
            })
        );

        assert!(fx.store.get_site(fx.branch.id).await.unwrap().is_none());
        assert!(devices_at(&fx.store, &fx.branch).await.is_empty());
        assert!(fx.store.list_racks(fx.branch.id).await.unwrap().is_empty());
        assert!(fx.store.list_prefixes(fx.branch.id).await.unwrap().is_empty());
        // Relocated devices survive the cascade
        assert_eq!(devices_at(&fx.store, &fx.warehouse).await.len(), 3);
        assert!(log
            .entries()
            .last()
            .unwrap()
            .message
            .contains("1 racks, 1 devices, and 1 IP prefixes"));
    }

    #[tokio::test]
    async fn test_missing_storage_site_is_configuration_error() {
        let fx = branch_fixture().await;
        let before = fx.store.snapshot();
        let mut log = ScriptLog::new();

        let err = SiteDecommission::new("Storage Site", "Server")
            .run(&fx.store, &request("Branch-1", true), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Configuration { .. }));
        assert!(log.has_failures());
        let after = fx.store.snapshot();
        assert_eq!(before.devices, after.devices);
        assert_eq!(before.sites, after.sites);
    }

    #[tokio::test]
    async fn test_target_equal_to_storage_is_rejected() {
        let fx = branch_fixture().await;
        let before = fx.store.snapshot();
        let mut log = ScriptLog::new();

        let err = script()
            .run(&fx.store, &request("Warehouse", true), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::InvalidRequest { .. }));
        assert_eq!(before.sites, fx.store.snapshot().sites);
        assert_eq!(before.devices, fx.store.snapshot().devices);
    }

    #[tokio::test]
    async fn test_missing_role_is_configuration_error() {
        let fx = branch_fixture().await;
        let mut log = ScriptLog::new();

        let err = SiteDecommission::new("Warehouse", "Firewall")
            .run(&fx.store, &request("Branch-1", false), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Configuration { .. }));
        assert_eq!(devices_at(&fx.store, &fx.branch).await.len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_target_is_invalid_request() {
        let fx = branch_fixture().await;
        let mut log = ScriptLog::new();

        let err = script()
            .run(&fx.store, &request("Branch-9", false), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_no_matching_devices_is_a_no_op_move() {
        let store = MemoryStore::new();
        store
            .create_site(NewSite::new("Warehouse", "warehouse", SiteStatus::Active))
            .await
            .unwrap();
        let empty = store
            .create_site(NewSite::new("Kiosk", "kiosk", SiteStatus::Active))
            .await
            .unwrap();
        store.create_role("Server").await.unwrap();
        let mut log = ScriptLog::new();

        let summary = script()
            .run(&store, &request("Kiosk", false), &mut log)
            .await
            .unwrap();

        assert!(summary.moved.is_empty());
        assert_eq!(log.entries()[0].level, LogLevel::Info);
        assert!(log.entries()[0].message.contains("Nothing to move"));
        let kiosk = store.get_site(empty.id).await.unwrap().unwrap();
        assert_eq!(kiosk.status, SiteStatus::Decommissioning);
    }

    #[tokio::test]
    async fn test_status_update_failure_stops_before_deletion() {
        let mut store = MockInventoryStore::new();
        store.expect_get_site_by_name().returning(|name| {
            let id = if name == "Warehouse" { 1 } else { 2 };
            Ok(Some(Site {
                id,
                name: name.to_string(),
                slug: name.to_lowercase(),
                status: SiteStatus::Active,
                description: String::new(),
                physical_address: String::new(),
                contact: None,
                custom_fields: Default::default(),
            }))
        });
        store.expect_get_role_by_name().returning(|name| {
            Ok(Some(Role {
                id: 10,
                name: name.to_string(),
            }))
        });
        store.expect_list_devices().returning(|_| Ok(Vec::new()));
        store
            .expect_update_site()
            .times(1)
            .returning(|_| Err(StoreError::validation("status rejected")));
        store.expect_delete_racks_at_site().never();
        store.expect_delete_site().never();
        let mut log = ScriptLog::new();

        let err = script()
            .run(&store, &request("Branch-1", true), &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Store(StoreError::Validation { .. })));
        assert_eq!(log.entries().last().unwrap().level, LogLevel::Failure);
    }
}
