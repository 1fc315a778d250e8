#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use sqlx::{
    migrate::MigrateDatabase, sqlite::SqlitePoolOptions, sqlite::SqliteRow, Row, SqlitePool,
};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::inventory::{
    store::validate_site_name, validate_cidr, Contact, Device, DeviceFilter, DeviceStatus,
    InventoryStore, NewContact, NewDevice, NewPrefix, NewSite, NewVrf, Platform, PlatformId,
    Prefix, Rack, Role, Site, SiteId, SiteStatus, StoreError, Vrf,
};

#[cfg(feature = "database")]
/// SQLite-backed inventory store
pub struct SqliteInventoryStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteInventoryStore {
    /// Connect, creating the database file and running migrations if asked
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        auto_migrate: bool,
    ) -> Result<Self, StoreError> {
        // Create database if it doesn't exist
        if !database_url.contains(":memory:") && !sqlx::Sqlite::database_exists(database_url).await? {
            info!("Creating database at {}", database_url);
            sqlx::Sqlite::create_database(database_url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        // Run migrations if enabled
        if auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(sqlx::Error::from)?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    async fn count_at_site(&self, table: &str, site: SiteId) -> Result<usize, StoreError> {
        let count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM {table} WHERE site_id = ?1"
        ))
        .bind(site as i64)
        .fetch_one(&self.pool)
        .await?;
        Ok(count as usize)
    }

    async fn delete_at_site(&self, table: &str, site: SiteId) -> Result<usize, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE site_id = ?1"))
            .bind(site as i64)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn ensure_site_unique(
        &self,
        id: Option<SiteId>,
        name: &str,
        slug: &str,
    ) -> Result<(), StoreError> {
        let row = sqlx::query(
            r#"
            SELECT name, slug FROM sites
            WHERE (name = ?1 OR slug = ?2) AND id != ?3
            LIMIT 1
            "#,
        )
        .bind(name)
        .bind(slug)
        .bind(id.map(|i| i as i64).unwrap_or(-1))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            let existing: String = row.get("name");
            let (field, value) = if existing == name {
                ("name", name)
            } else {
                ("slug", slug)
            };
            return Err(StoreError::Duplicate {
                kind: "Site",
                field,
                value: value.to_string(),
            });
        }
        Ok(())
    }

    async fn ensure_site_exists(&self, id: SiteId) -> Result<(), StoreError> {
        if self.get_site(id).await?.is_none() {
            return Err(StoreError::NotFound { kind: "Site", id });
        }
        Ok(())
    }
}

#[cfg(feature = "database")]
fn site_from_row(row: &SqliteRow) -> Result<Site, StoreError> {
    let status: String = row.get("status");
    let custom_fields: String = row.get("custom_fields");
    let contact: Option<i64> = row.get("contact_id");
    Ok(Site {
        id: row.get::<i64, _>("id") as u64,
        name: row.get("name"),
        slug: row.get("slug"),
        status: SiteStatus::parse(&status)
            .ok_or_else(|| StoreError::validation(format!("unknown site status '{status}'")))?,
        description: row.get("description"),
        physical_address: row.get("physical_address"),
        contact: contact.map(|c| c as u64),
        custom_fields: serde_json::from_str(&custom_fields)?,
    })
}

#[cfg(feature = "database")]
fn device_from_row(row: &SqliteRow) -> Result<Device, StoreError> {
    let status: String = row.get("status");
    let tags: String = row.get("tags");
    let custom_fields: String = row.get("custom_fields");
    let platform: Option<i64> = row.get("platform_id");
    Ok(Device {
        id: row.get::<i64, _>("id") as u64,
        name: row.get("name"),
        site: row.get::<i64, _>("site_id") as u64,
        role: row.get::<i64, _>("role_id") as u64,
        platform: platform.map(|p| p as u64),
        status: DeviceStatus::parse(&status)
            .ok_or_else(|| StoreError::validation(format!("unknown device status '{status}'")))?,
        tags: serde_json::from_str(&tags)?,
        custom_fields: serde_json::from_str(&custom_fields)?,
    })
}

#[cfg(feature = "database")]
fn prefix_from_row(row: &SqliteRow) -> Prefix {
    let vrf: Option<i64> = row.get("vrf_id");
    Prefix {
        id: row.get::<i64, _>("id") as u64,
        prefix: row.get("prefix"),
        site: row.get::<i64, _>("site_id") as u64,
        vrf: vrf.map(|v| v as u64),
        description: row.get("description"),
    }
}

#[cfg(feature = "database")]
#[async_trait]
impl InventoryStore for SqliteInventoryStore {
    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError> {
        let row = sqlx::query("SELECT * FROM sites WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>, StoreError> {
        let row = sqlx::query("SELECT * FROM sites WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn get_site_by_slug(&self, slug: &str) -> Result<Option<Site>, StoreError> {
        let row = sqlx::query("SELECT * FROM sites WHERE slug = ?1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(site_from_row).transpose()
    }

    async fn create_site(&self, site: NewSite) -> Result<Site, StoreError> {
        validate_site_name(&site.name)?;
        self.ensure_site_unique(None, &site.name, &site.slug).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO sites (name, slug, status, description, physical_address, custom_fields)
            VALUES (?1, ?2, ?3, ?4, ?5, '{}')
            "#,
        )
        .bind(&site.name)
        .bind(&site.slug)
        .bind(site.status.as_str())
        .bind(&site.description)
        .bind(&site.physical_address)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid() as u64;
        self.get_site(id)
            .await?
            .ok_or(StoreError::NotFound { kind: "Site", id })
    }

    async fn update_site(&self, site: &Site) -> Result<(), StoreError> {
        validate_site_name(&site.name)?;
        self.ensure_site_unique(Some(site.id), &site.name, &site.slug).await?;

        let result = sqlx::query(
            r#"
            UPDATE sites
            SET name = ?1, slug = ?2, status = ?3, description = ?4,
                physical_address = ?5, contact_id = ?6, custom_fields = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&site.name)
        .bind(&site.slug)
        .bind(site.status.as_str())
        .bind(&site.description)
        .bind(&site.physical_address)
        .bind(site.contact.map(|c| c as i64))
        .bind(serde_json::to_string(&site.custom_fields)?)
        .bind(site.id as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "Site", id: site.id });
        }
        Ok(())
    }

    async fn delete_site(&self, id: SiteId) -> Result<(), StoreError> {
        let site = self
            .get_site(id)
            .await?
            .ok_or(StoreError::NotFound { kind: "Site", id })?;

        let devices = self.count_at_site("devices", id).await?;
        let racks = self.count_at_site("racks", id).await?;
        let prefixes = self.count_at_site("prefixes", id).await?;
        if devices + racks + prefixes > 0 {
            return Err(StoreError::SiteInUse {
                site: site.name,
                devices,
                racks,
                prefixes,
            });
        }

        sqlx::query("DELETE FROM sites WHERE id = ?1")
            .bind(id as i64)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Role {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
        }))
    }

    async fn create_role(&self, name: &str) -> Result<Role, StoreError> {
        if self.get_role_by_name(name).await?.is_some() {
            return Err(StoreError::Duplicate {
                kind: "Role",
                field: "name",
                value: name.to_string(),
            });
        }
        let result = sqlx::query("INSERT INTO roles (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Role {
            id: result.last_insert_rowid() as u64,
            name: name.to_string(),
        })
    }

    async fn get_platform(&self, id: PlatformId) -> Result<Option<Platform>, StoreError> {
        let row = sqlx::query("SELECT id, name FROM platforms WHERE id = ?1")
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| Platform {
            id: row.get::<i64, _>("id") as u64,
            name: row.get("name"),
        }))
    }

    async fn create_platform(&self, name: &str) -> Result<Platform, StoreError> {
        let result = sqlx::query("INSERT INTO platforms (name) VALUES (?1)")
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(Platform {
            id: result.last_insert_rowid() as u64,
            name: name.to_string(),
        })
    }

    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError> {
        // Site and role narrow the query; tags and statuses are checked on the records
        let rows = sqlx::query(
            r#"
            SELECT * FROM devices
            WHERE (?1 IS NULL OR site_id = ?1) AND (?2 IS NULL OR role_id = ?2)
            ORDER BY name ASC, id ASC
            "#,
        )
        .bind(filter.site.map(|s| s as i64))
        .bind(filter.role.map(|r| r as i64))
        .fetch_all(&self.pool)
        .await?;

        let mut devices = Vec::with_capacity(rows.len());
        for row in &rows {
            let device = device_from_row(row)?;
            if filter.matches(&device) {
                devices.push(device);
            }
        }
        Ok(devices)
    }

    async fn create_device(&self, device: NewDevice) -> Result<Device, StoreError> {
        self.ensure_site_exists(device.site).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO devices (name, site_id, role_id, platform_id, status, tags, custom_fields)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&device.name)
        .bind(device.site as i64)
        .bind(device.role as i64)
        .bind(device.platform.map(|p| p as i64))
        .bind(device.status.as_str())
        .bind(serde_json::to_string(&device.tags)?)
        .bind(serde_json::to_string(&device.custom_fields)?)
        .execute(&self.pool)
        .await?;

        Ok(Device {
            id: result.last_insert_rowid() as u64,
            name: device.name,
            site: device.site,
            role: device.role,
            platform: device.platform,
            status: device.status,
            tags: device.tags,
            custom_fields: device.custom_fields,
        })
    }

    async fn update_device(&self, device: &Device) -> Result<(), StoreError> {
        self.ensure_site_exists(device.site).await?;

        let result = sqlx::query(
            r#"
            UPDATE devices
            SET name = ?1, site_id = ?2, role_id = ?3, platform_id = ?4,
                status = ?5, tags = ?6, custom_fields = ?7
            WHERE id = ?8
            "#,
        )
        .bind(&device.name)
        .bind(device.site as i64)
        .bind(device.role as i64)
        .bind(device.platform.map(|p| p as i64))
        .bind(device.status.as_str())
        .bind(serde_json::to_string(&device.tags)?)
        .bind(serde_json::to_string(&device.custom_fields)?)
        .bind(device.id as i64)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound { kind: "Device", id: device.id });
        }
        Ok(())
    }

    async fn delete_devices_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        self.delete_at_site("devices", site).await
    }

    async fn list_racks(&self, site: SiteId) -> Result<Vec<Rack>, StoreError> {
        let rows = sqlx::query("SELECT id, name, site_id FROM racks WHERE site_id = ?1 ORDER BY id")
            .bind(site as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| Rack {
                id: row.get::<i64, _>("id") as u64,
                name: row.get("name"),
                site: row.get::<i64, _>("site_id") as u64,
            })
            .collect())
    }

    async fn create_rack(&self, name: &str, site: SiteId) -> Result<Rack, StoreError> {
        self.ensure_site_exists(site).await?;
        let result = sqlx::query("INSERT INTO racks (name, site_id) VALUES (?1, ?2)")
            .bind(name)
            .bind(site as i64)
            .execute(&self.pool)
            .await?;
        Ok(Rack {
            id: result.last_insert_rowid() as u64,
            name: name.to_string(),
            site,
        })
    }

    async fn delete_racks_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        self.delete_at_site("racks", site).await
    }

    async fn create_vrf(&self, vrf: NewVrf) -> Result<Vrf, StoreError> {
        let result = sqlx::query(
            "INSERT INTO vrfs (name, description, enforce_unique) VALUES (?1, ?2, ?3)",
        )
        .bind(&vrf.name)
        .bind(&vrf.description)
        .bind(vrf.enforce_unique)
        .execute(&self.pool)
        .await?;
        Ok(Vrf {
            id: result.last_insert_rowid() as u64,
            name: vrf.name,
            description: vrf.description,
            enforce_unique: vrf.enforce_unique,
        })
    }

    async fn list_prefixes(&self, site: SiteId) -> Result<Vec<Prefix>, StoreError> {
        let rows = sqlx::query("SELECT * FROM prefixes WHERE site_id = ?1 ORDER BY id")
            .bind(site as i64)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(prefix_from_row).collect())
    }

    async fn create_prefix(&self, prefix: NewPrefix) -> Result<Prefix, StoreError> {
        validate_cidr(&prefix.prefix)?;
        self.ensure_site_exists(prefix.site).await?;

        let result = sqlx::query(
            "INSERT INTO prefixes (prefix, site_id, vrf_id, description) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&prefix.prefix)
        .bind(prefix.site as i64)
        .bind(prefix.vrf.map(|v| v as i64))
        .bind(&prefix.description)
        .execute(&self.pool)
        .await?;

        Ok(Prefix {
            id: result.last_insert_rowid() as u64,
            prefix: prefix.prefix,
            site: prefix.site,
            vrf: prefix.vrf,
            description: prefix.description,
        })
    }

    async fn delete_prefixes_at_site(&self, site: SiteId) -> Result<usize, StoreError> {
        self.delete_at_site("prefixes", site).await
    }

    async fn create_contact(&self, contact: NewContact) -> Result<Contact, StoreError> {
        let result = sqlx::query("INSERT INTO contacts (name, phone, email) VALUES (?1, ?2, ?3)")
            .bind(&contact.name)
            .bind(&contact.phone)
            .bind(&contact.email)
            .execute(&self.pool)
            .await?;
        Ok(Contact {
            id: result.last_insert_rowid() as u64,
            name: contact.name,
            phone: contact.phone,
            email: contact.email,
        })
    }

    async fn close(&self) {
        info!("Closing database connections");
        self.pool.close().await;
    }
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::scripts::{DecommissionRequest, ScriptLog, SiteDecommission};

    #[tokio::test]
    async fn test_close_releases_pool() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("inventory.db").display());
        let store = SqliteInventoryStore::connect(&url, 2, true).await.unwrap();
        store
            .create_site(NewSite::new("Storage Site", "storage-site", SiteStatus::Active))
            .await
            .unwrap();

        store.close().await;
        assert!(store.pool.is_closed());
        assert!(store.get_site_by_name("Storage Site").await.is_err());

        // Data written before closing is on disk for the next run
        let reopened = SqliteInventoryStore::connect(&url, 1, true).await.unwrap();
        assert!(reopened
            .get_site_by_name("Storage Site")
            .await
            .unwrap()
            .is_some());
        reopened.close().await;
    }

    async fn memory_store() -> SqliteInventoryStore {
        // One connection, otherwise every pooled connection sees its own database
        SqliteInventoryStore::connect("sqlite::memory:", 1, true)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_site_round_trips_through_sqlite() {
        let store = memory_store().await;
        let mut site = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        site.custom_fields
            .insert("site_pos_network_subnet".to_string(), "7".to_string());
        site.status = SiteStatus::Decommissioning;
        store.update_site(&site).await.unwrap();

        let loaded = store.get_site_by_slug("branch-1").await.unwrap().unwrap();
        assert_eq!(loaded, site);

        let duplicate = store
            .create_site(NewSite::new("Branch-1", "other", SiteStatus::Active))
            .await;
        assert!(matches!(duplicate, Err(StoreError::Duplicate { field: "name", .. })));
    }

    #[tokio::test]
    async fn test_decommission_against_sqlite() {
        let store = memory_store().await;
        store
            .create_site(NewSite::new("Warehouse", "warehouse", SiteStatus::Active))
            .await
            .unwrap();
        let branch = store
            .create_site(NewSite::new("Branch-1", "branch-1", SiteStatus::Active))
            .await
            .unwrap();
        let server = store.create_role("Server").await.unwrap();
        let switch = store.create_role("Switch").await.unwrap();
        store
            .create_device(NewDevice::new("srv-01", branch.id, server.id, DeviceStatus::Active))
            .await
            .unwrap();
        store
            .create_device(NewDevice::new("sw-01", branch.id, switch.id, DeviceStatus::Active))
            .await
            .unwrap();
        store.create_rack("R1", branch.id).await.unwrap();

        let mut log = ScriptLog::new();
        let summary = SiteDecommission::new("Warehouse", "Server")
            .run(
                &store,
                &DecommissionRequest {
                    site: "Branch-1".to_string(),
                    delete_after_move: true,
                },
                &mut log,
            )
            .await
            .unwrap();

        assert_eq!(summary.moved, vec!["srv-01"]);
        let counts = summary.deleted.unwrap();
        assert_eq!((counts.racks, counts.devices, counts.prefixes), (1, 1, 0));
        assert!(store.get_site(branch.id).await.unwrap().is_none());
    }
}
