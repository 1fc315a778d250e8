//! Inventory data-store abstraction
//!
//! Workflows only talk to the inventory through [`InventoryStore`], so the
//! same script code runs against the in-memory/snapshot store, the SQLite
//! store, or a mock in tests.

use async_trait::async_trait;
use thiserror::Error;

#[cfg(test)]
use mockall::automock;

use super::types::*;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: u64 },
    #[error("{kind} with {field} '{value}' already exists")]
    Duplicate {
        kind: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Validation failed: {message}")]
    Validation { message: String },
    #[error("Site '{site}' still owns {devices} devices, {racks} racks and {prefixes} prefixes")]
    SiteInUse {
        site: String,
        devices: usize,
        racks: usize,
        prefixes: usize,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[cfg(feature = "database")]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        StoreError::Validation {
            message: message.into(),
        }
    }
}

/// Typed record access for the inventory
///
/// Every mutating call is persisted before it returns; there is no
/// transaction spanning several calls.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn get_site(&self, id: SiteId) -> Result<Option<Site>, StoreError>;

    async fn get_site_by_name(&self, name: &str) -> Result<Option<Site>, StoreError>;

    async fn get_site_by_slug(&self, slug: &str) -> Result<Option<Site>, StoreError>;

    async fn create_site(&self, site: NewSite) -> Result<Site, StoreError>;

    /// Persist every field of an existing site
    async fn update_site(&self, site: &Site) -> Result<(), StoreError>;

    /// Delete a site that no longer owns any devices, racks or prefixes
    async fn delete_site(&self, id: SiteId) -> Result<(), StoreError>;

    async fn get_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    async fn create_role(&self, name: &str) -> Result<Role, StoreError>;

    async fn get_platform(&self, id: PlatformId) -> Result<Option<Platform>, StoreError>;

    async fn create_platform(&self, name: &str) -> Result<Platform, StoreError>;

    /// Devices matching the filter, ordered by name
    async fn list_devices(&self, filter: &DeviceFilter) -> Result<Vec<Device>, StoreError>;

    async fn create_device(&self, device: NewDevice) -> Result<Device, StoreError>;

    async fn update_device(&self, device: &Device) -> Result<(), StoreError>;

    /// Returns the number of devices removed
    async fn delete_devices_at_site(&self, site: SiteId) -> Result<usize, StoreError>;

    async fn list_racks(&self, site: SiteId) -> Result<Vec<Rack>, StoreError>;

    async fn create_rack(&self, name: &str, site: SiteId) -> Result<Rack, StoreError>;

    /// Returns the number of racks removed
    async fn delete_racks_at_site(&self, site: SiteId) -> Result<usize, StoreError>;

    async fn create_vrf(&self, vrf: NewVrf) -> Result<Vrf, StoreError>;

    async fn list_prefixes(&self, site: SiteId) -> Result<Vec<Prefix>, StoreError>;

    async fn create_prefix(&self, prefix: NewPrefix) -> Result<Prefix, StoreError>;

    /// Returns the number of prefixes removed
    async fn delete_prefixes_at_site(&self, site: SiteId) -> Result<usize, StoreError>;

    async fn create_contact(&self, contact: NewContact) -> Result<Contact, StoreError>;

    /// Release connections held by the store; nothing is written afterwards
    async fn close(&self) {}
}

/// Check that a prefix is written as `address/length` with a length that fits
/// the address family
pub fn validate_cidr(prefix: &str) -> Result<(), StoreError> {
    let (address, length) = prefix
        .split_once('/')
        .ok_or_else(|| StoreError::validation(format!("'{prefix}' is missing a prefix length")))?;

    let address: std::net::IpAddr = address
        .parse()
        .map_err(|_| StoreError::validation(format!("'{address}' is not an IP address")))?;
    let length: u8 = length
        .parse()
        .map_err(|_| StoreError::validation(format!("'{length}' is not a prefix length")))?;

    let max = if address.is_ipv4() { 32 } else { 128 };
    if length > max {
        return Err(StoreError::validation(format!(
            "prefix length {length} exceeds {max} for {address}"
        )));
    }

    Ok(())
}

pub fn validate_site_name(name: &str) -> Result<(), StoreError> {
    if name.trim().is_empty() {
        return Err(StoreError::validation("site name must not be empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_cidr() {
        assert!(validate_cidr("192.168.1.0/24").is_ok());
        assert!(validate_cidr("2001:db8::/48").is_ok());
        assert!(validate_cidr("192.168.1.0").is_err());
        assert!(validate_cidr("192.168.1.0/33").is_err());
        assert!(validate_cidr("camera/24").is_err());
        assert!(validate_cidr("10.0.0.0/x").is_err());
    }

    #[test]
    fn test_site_in_use_message() {
        let err = StoreError::SiteInUse {
            site: "Branch-1".to_string(),
            devices: 1,
            racks: 2,
            prefixes: 0,
        };
        assert_eq!(
            err.to_string(),
            "Site 'Branch-1' still owns 1 devices, 2 racks and 0 prefixes"
        );
    }
}
