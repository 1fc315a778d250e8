// Inventory records and their closed status types

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub type SiteId = u64;
pub type DeviceId = u64;
pub type RoleId = u64;
pub type PlatformId = u64;
pub type RackId = u64;
pub type VrfId = u64;
pub type PrefixId = u64;
pub type ContactId = u64;

/// Free-form custom field values keyed by field name
pub type CustomFields = BTreeMap<String, String>;

/// Lifecycle status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Planned,
    Staging,
    Active,
    Decommissioning,
    Retired,
}

impl SiteStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteStatus::Planned => "planned",
            SiteStatus::Staging => "staging",
            SiteStatus::Active => "active",
            SiteStatus::Decommissioning => "decommissioning",
            SiteStatus::Retired => "retired",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "planned" => Some(SiteStatus::Planned),
            "staging" => Some(SiteStatus::Staging),
            "active" => Some(SiteStatus::Active),
            "decommissioning" => Some(SiteStatus::Decommissioning),
            "retired" => Some(SiteStatus::Retired),
            _ => None,
        }
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational status of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Offline,
    Active,
    Planned,
    Staged,
    Failed,
    Inventory,
    Decommissioning,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Offline => "offline",
            DeviceStatus::Active => "active",
            DeviceStatus::Planned => "planned",
            DeviceStatus::Staged => "staged",
            DeviceStatus::Failed => "failed",
            DeviceStatus::Inventory => "inventory",
            DeviceStatus::Decommissioning => "decommissioning",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "offline" => Some(DeviceStatus::Offline),
            "active" => Some(DeviceStatus::Active),
            "planned" => Some(DeviceStatus::Planned),
            "staged" => Some(DeviceStatus::Staged),
            "failed" => Some(DeviceStatus::Failed),
            "inventory" => Some(DeviceStatus::Inventory),
            "decommissioning" => Some(DeviceStatus::Decommissioning),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub slug: String,
    pub status: SiteStatus,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub physical_address: String,
    #[serde(default)]
    pub contact: Option<ContactId>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub site: SiteId,
    pub role: RoleId,
    #[serde(default)]
    pub platform: Option<PlatformId>,
    pub status: DeviceStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub custom_fields: CustomFields,
}

impl Device {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub id: PlatformId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rack {
    pub id: RackId,
    pub name: String,
    pub site: SiteId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vrf {
    pub id: VrfId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enforce_unique: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefix {
    pub id: PrefixId,
    pub prefix: String,
    pub site: SiteId,
    #[serde(default)]
    pub vrf: Option<VrfId>,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: String,
}

// Drafts carry everything but the store-assigned id

#[derive(Debug, Clone)]
pub struct NewSite {
    pub name: String,
    pub slug: String,
    pub status: SiteStatus,
    pub description: String,
    pub physical_address: String,
}

impl NewSite {
    pub fn new(name: &str, slug: &str, status: SiteStatus) -> Self {
        Self {
            name: name.to_string(),
            slug: slug.to_string(),
            status,
            description: String::new(),
            physical_address: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewDevice {
    pub name: String,
    pub site: SiteId,
    pub role: RoleId,
    pub platform: Option<PlatformId>,
    pub status: DeviceStatus,
    pub tags: BTreeSet<String>,
    pub custom_fields: CustomFields,
}

impl NewDevice {
    pub fn new(name: &str, site: SiteId, role: RoleId, status: DeviceStatus) -> Self {
        Self {
            name: name.to_string(),
            site,
            role,
            platform: None,
            status,
            tags: BTreeSet::new(),
            custom_fields: CustomFields::new(),
        }
    }

    pub fn with_platform(mut self, platform: PlatformId) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.tags.insert(tag.to_string());
        self
    }

    pub fn with_custom_field(mut self, key: &str, value: &str) -> Self {
        self.custom_fields.insert(key.to_string(), value.to_string());
        self
    }
}

#[derive(Debug, Clone)]
pub struct NewVrf {
    pub name: String,
    pub description: String,
    pub enforce_unique: bool,
}

#[derive(Debug, Clone)]
pub struct NewPrefix {
    pub prefix: String,
    pub site: SiteId,
    pub vrf: Option<VrfId>,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct NewContact {
    pub name: String,
    pub phone: String,
    pub email: String,
}

/// Criteria for selecting devices; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceFilter {
    pub site: Option<SiteId>,
    pub role: Option<RoleId>,
    pub tag: Option<String>,
    pub statuses: Vec<DeviceStatus>,
}

impl DeviceFilter {
    pub fn at_site(site: SiteId) -> Self {
        Self {
            site: Some(site),
            ..Self::default()
        }
    }

    pub fn tagged(tag: &str) -> Self {
        Self {
            tag: Some(tag.to_string()),
            ..Self::default()
        }
    }

    pub fn with_role(mut self, role: RoleId) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_statuses(mut self, statuses: &[DeviceStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn matches(&self, device: &Device) -> bool {
        self.site.map_or(true, |site| device.site == site)
            && self.role.map_or(true, |role| device.role == role)
            && self.tag.as_deref().map_or(true, |tag| device.has_tag(tag))
            && (self.statuses.is_empty() || self.statuses.contains(&device.status))
    }
}
