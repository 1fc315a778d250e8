//! Device status sync against the VPN mesh
//!
//! Tagged devices follow the online state of the mesh node with the same
//! hostname: online nodes are Active, offline nodes are Offline.

use chrono::{SecondsFormat, Utc};
use std::collections::HashMap;
use std::fmt;

use crate::config::MeshConfig;
use crate::inventory::{DeviceFilter, DeviceStatus, InventoryStore};
use crate::mesh::MeshStatusSource;

use super::{ScriptError, ScriptLog};

pub const LAST_SYNC_FIELD: &str = "tailscale_last_sync";
pub const DEFAULT_MESH_TAG: &str = "tailscale";

/// Statuses the sync is allowed to change; anything else is left to people
const SYNCED_STATUSES: [DeviceStatus; 2] = [DeviceStatus::Active, DeviceStatus::Offline];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshSyncSummary {
    pub updated: usize,
    /// Changes a dry run would have made
    pub would_update: usize,
    pub unchanged: usize,
    /// Devices without a matching mesh node
    pub missing: Vec<String>,
    pub stamped: usize,
}

impl fmt::Display for MeshSyncSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Updated {} devices ({} would update, {} unchanged, {} not in mesh)",
            self.updated,
            self.would_update,
            self.unchanged,
            self.missing.len()
        )
    }
}

#[derive(Debug, Clone)]
pub struct MeshStatusSync {
    device_tag: String,
}

impl Default for MeshStatusSync {
    fn default() -> Self {
        Self::new(DEFAULT_MESH_TAG)
    }
}

impl MeshStatusSync {
    pub fn new(device_tag: &str) -> Self {
        Self {
            device_tag: device_tag.to_string(),
        }
    }

    pub fn from_config(config: &MeshConfig) -> Self {
        Self::new(&config.device_tag)
    }

    pub async fn run(
        &self,
        store: &dyn InventoryStore,
        mesh: &dyn MeshStatusSource,
        commit: bool,
        log: &mut ScriptLog,
    ) -> Result<MeshSyncSummary, ScriptError> {
        let nodes = match mesh.list_nodes().await {
            Ok(nodes) => nodes,
            Err(e) => {
                log.failure(format!("Failed to query Tailscale API: {e}"));
                return Err(e.into());
            }
        };
        let online: HashMap<String, bool> = nodes
            .into_iter()
            .map(|node| (node.hostname.to_lowercase(), node.online))
            .collect();

        let devices = store
            .list_devices(&DeviceFilter::tagged(&self.device_tag).with_statuses(&SYNCED_STATUSES))
            .await
            .map_err(|e| {
                log.failure(format!("Failed to list '{}' devices: {e}", self.device_tag));
                ScriptError::from(e)
            })?;

        let mut summary = MeshSyncSummary::default();
        for mut device in devices {
            let Some(&is_online) = online.get(&device.name.to_lowercase()) else {
                log.warning(format!("Device {} not found in Tailscale nodes", device.name));
                summary.missing.push(device.name);
                continue;
            };

            let desired = if is_online {
                DeviceStatus::Active
            } else {
                DeviceStatus::Offline
            };
            if device.status == desired {
                summary.unchanged += 1;
                continue;
            }

            let previous = device.status;
            if commit {
                device.status = desired;
                if let Err(e) = store.update_device(&device).await {
                    log.failure(format!("Failed to update {}: {e}", device.name));
                    return Err(e.into());
                }
                summary.updated += 1;
                log.success(format!(
                    "Updated {} status from {previous} to {desired}",
                    device.name
                ));
            } else {
                summary.would_update += 1;
                log.info(format!(
                    "Would update {} status from {previous} to {desired}",
                    device.name
                ));
            }
        }

        if commit {
            log.success(format!("Updated {} devices", summary.updated));
            summary.stamped = self.stamp_last_sync(store, log).await?;
        }

        Ok(summary)
    }

    /// Record the sync time on every tagged device, whatever its status
    async fn stamp_last_sync(
        &self,
        store: &dyn InventoryStore,
        log: &mut ScriptLog,
    ) -> Result<usize, ScriptError> {
        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
        let devices = store
            .list_devices(&DeviceFilter::tagged(&self.device_tag))
            .await
            .map_err(|e| {
                log.failure(format!("Failed to list '{}' devices: {e}", self.device_tag));
                ScriptError::from(e)
            })?;

        let mut stamped = 0;
        for mut device in devices {
            device
                .custom_fields
                .insert(LAST_SYNC_FIELD.to_string(), now.clone());
            if let Err(e) = store.update_device(&device).await {
                log.failure(format!("Failed to stamp {}: {e}", device.name));
                return Err(e.into());
            }
            stamped += 1;
        }
        Ok(stamped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{
        Device, MemoryStore, MockInventoryStore, NewDevice, NewSite, SiteStatus, StoreError,
    };
    use crate::mesh::{MeshError, MeshNode, MockMeshStatusSource};
    use crate::scripts::LogLevel;

    fn node(hostname: &str, online: bool) -> MeshNode {
        MeshNode {
            hostname: hostname.to_string(),
            online,
        }
    }

    fn mesh_with(nodes: Vec<MeshNode>) -> MockMeshStatusSource {
        let mut mesh = MockMeshStatusSource::new();
        mesh.expect_list_nodes()
            .times(1)
            .returning(move || Ok(nodes.clone()));
        mesh
    }

    async fn fleet() -> MemoryStore {
        let store = MemoryStore::new();
        let site = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        let role = store.create_role("Server").await.unwrap();
        let devices = [
            ("POS-01", DeviceStatus::Active, true),
            ("pos-02", DeviceStatus::Offline, true),
            ("pos-03", DeviceStatus::Active, true),
            ("pos-04", DeviceStatus::Active, true),
            ("pos-05", DeviceStatus::Planned, true),
            ("cam-01", DeviceStatus::Active, false),
        ];
        for (name, status, tagged) in devices {
            let mut device = NewDevice::new(name, site.id, role.id, status);
            if tagged {
                device = device.with_tag("tailscale");
            }
            store.create_device(device).await.unwrap();
        }
        store
    }

    async fn device(store: &MemoryStore, name: &str) -> Device {
        store
            .list_devices(&DeviceFilter::default())
            .await
            .unwrap()
            .into_iter()
            .find(|d| d.name == name)
            .unwrap()
    }

    fn nodes() -> Vec<MeshNode> {
        vec![
            node("pos-01", false),
            node("pos-02", true),
            node("pos-03", true),
            node("pos-05", false),
            node("cam-01", false),
        ]
    }

    #[tokio::test]
    async fn test_commit_flips_statuses_and_stamps_devices() {
        let store = fleet().await;
        let mesh = mesh_with(nodes());
        let mut log = ScriptLog::new();

        let summary = MeshStatusSync::default()
            .run(&store, &mesh, true, &mut log)
            .await
            .unwrap();

        assert_eq!(summary.updated, 2);
        assert_eq!(summary.unchanged, 1);
        assert_eq!(summary.missing, vec!["pos-04"]);
        assert_eq!(summary.stamped, 5);

        assert_eq!(device(&store, "POS-01").await.status, DeviceStatus::Offline);
        assert_eq!(device(&store, "pos-02").await.status, DeviceStatus::Active);
        // Planned devices and untagged devices are left alone
        assert_eq!(device(&store, "pos-05").await.status, DeviceStatus::Planned);
        let camera = device(&store, "cam-01").await;
        assert_eq!(camera.status, DeviceStatus::Active);
        assert!(!camera.custom_fields.contains_key(LAST_SYNC_FIELD));
        assert!(device(&store, "pos-05")
            .await
            .custom_fields
            .contains_key(LAST_SYNC_FIELD));

        assert_eq!(log.count(LogLevel::Warning), 1);
    }

    #[tokio::test]
    async fn test_dry_run_changes_nothing() {
        let store = fleet().await;
        let before = store.snapshot().devices;
        let mesh = mesh_with(nodes());
        let mut log = ScriptLog::new();

        let summary = MeshStatusSync::default()
            .run(&store, &mesh, false, &mut log)
            .await
            .unwrap();

        assert_eq!(summary.updated, 0);
        assert_eq!(summary.would_update, 2);
        assert_eq!(summary.stamped, 0);
        assert_eq!(store.snapshot().devices, before);
        assert!(log
            .entries()
            .iter()
            .any(|e| e.message == "Would update POS-01 status from active to offline"));
    }

    #[tokio::test]
    async fn test_mesh_failure_is_reported() {
        let store = fleet().await;
        let mut mesh = MockMeshStatusSource::new();
        mesh.expect_list_nodes().returning(|| {
            Err(MeshError::Api {
                status: 401,
                body: "invalid key".to_string(),
            })
        });
        let mut log = ScriptLog::new();

        let err = MeshStatusSync::default()
            .run(&store, &mesh, true, &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Mesh(MeshError::Api { status: 401, .. })));
        assert!(log.entries()[0].message.starts_with("Failed to query Tailscale API"));
    }

    #[tokio::test]
    async fn test_stamp_listing_failure_is_logged() {
        let mut store = MockInventoryStore::new();
        store.expect_list_devices().returning(|filter| {
            if filter.statuses.is_empty() {
                Err(StoreError::Io(std::io::Error::other("disk unavailable")))
            } else {
                Ok(Vec::new())
            }
        });
        let mesh = mesh_with(Vec::new());
        let mut log = ScriptLog::new();

        let err = MeshStatusSync::default()
            .run(&store, &mesh, true, &mut log)
            .await
            .unwrap_err();

        assert!(matches!(err, ScriptError::Store(StoreError::Io(_))));
        let last = log.entries().last().unwrap();
        assert_eq!(last.level, LogLevel::Failure);
        assert!(last.message.starts_with("Failed to list 'tailscale' devices"));
    }
}
