//! New site provisioning
//!
//! Creates a planned site with its own VRF and the two subnets every branch
//! gets (cameras and point-of-sale), then links the subnets from the site's
//! custom fields.

use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

use crate::inventory::{
    validate_cidr, InventoryStore, NewContact, NewPrefix, NewSite, NewVrf, SiteId, SiteStatus,
    StoreError,
};

use super::{ScriptError, ScriptLog};

pub const CAMERA_SUBNET_FIELD: &str = "site_camera_network_subnet";
pub const POS_SUBNET_FIELD: &str = "site_pos_network_subnet";

static STRIP_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_\s-]").expect("valid slug pattern"));
static SEPARATOR_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s]+").expect("valid separator pattern"));

/// Lowercase URL-safe form of a name: `"Site Name 1"` becomes `"site-name-1"`
///
/// Accented letters fold to their ASCII base (`"Zürich"` becomes `"zurich"`);
/// anything without an ASCII decomposition is dropped.
pub fn slugify(name: &str) -> String {
    let folded: String = name.nfkd().filter(char::is_ascii).collect();
    let lowered = folded.to_lowercase();
    let stripped = STRIP_CHARS.replace_all(&lowered, "");
    let joined = SEPARATOR_RUNS.replace_all(&stripped, "-");
    joined.trim_matches(|c| c == '-' || c == '_').to_string()
}

#[derive(Debug, Clone, Default)]
pub struct ContactDetails {
    pub name: String,
    pub phone: String,
    pub email: String,
}

#[derive(Debug, Clone, Default)]
pub struct ProvisionRequest {
    pub name: String,
    pub description: String,
    pub physical_address: String,
    pub contact: Option<ContactDetails>,
    pub camera_subnet: String,
    pub pos_subnet: String,
}

impl ProvisionRequest {
    /// (label, site custom field, CIDR) for each subnet the site receives
    fn subnets(&self) -> [(&'static str, &'static str, &str); 2] {
        [
            ("Camera", CAMERA_SUBNET_FIELD, self.camera_subnet.trim()),
            ("POS", POS_SUBNET_FIELD, self.pos_subnet.trim()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionSummary {
    pub site: String,
    pub slug: String,
    /// Absent on a dry run
    pub site_id: Option<SiteId>,
    pub vrf: String,
    pub prefixes: Vec<String>,
    pub contact: Option<String>,
    pub committed: bool,
}

impl fmt::Display for ProvisionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.committed {
            write!(
                f,
                "Site '{}' created with VRF '{}' and subnets {}",
                self.site,
                self.vrf,
                self.prefixes.join(", ")
            )
        } else {
            write!(
                f,
                "Dry run: site '{}' would be created with VRF '{}' and subnets {}",
                self.site,
                self.vrf,
                self.prefixes.join(", ")
            )
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SiteProvisioning;

impl SiteProvisioning {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        store: &dyn InventoryStore,
        request: &ProvisionRequest,
        commit: bool,
        log: &mut ScriptLog,
    ) -> Result<ProvisionSummary, ScriptError> {
        let name = request.name.trim();
        let slug = slugify(name);
        if let Err(e) = self.validate(store, request, name, &slug).await {
            log.failure(e.to_string());
            return Err(e);
        }

        let vrf_name = format!("{slug}_vrf");
        let contact_name = request
            .contact
            .as_ref()
            .map(|c| c.name.trim().to_string())
            .filter(|n| !n.is_empty());
        let prefixes: Vec<String> = request
            .subnets()
            .iter()
            .map(|(_, _, cidr)| cidr.to_string())
            .collect();

        if !commit {
            log.info(format!("Would create site '{name}' with slug '{slug}' (status planned)."));
            if let Some(contact) = &contact_name {
                log.info(format!("Would assign contact '{contact}' to the site."));
            }
            log.info(format!("Would create VRF '{vrf_name}'."));
            for (label, _, cidr) in request.subnets() {
                log.info(format!("Would create {label} subnet {cidr} in VRF '{vrf_name}'."));
            }
            return Ok(ProvisionSummary {
                site: name.to_string(),
                slug,
                site_id: None,
                vrf: vrf_name,
                prefixes,
                contact: contact_name,
                committed: false,
            });
        }

        let result = self
            .create(store, request, name, &slug, &vrf_name, log)
            .await;
        match result {
            Ok(site_id) => Ok(ProvisionSummary {
                site: name.to_string(),
                slug,
                site_id: Some(site_id),
                vrf: vrf_name,
                prefixes,
                contact: contact_name,
                committed: true,
            }),
            Err(e) => {
                log.failure(e.to_string());
                Err(e)
            }
        }
    }

    async fn validate(
        &self,
        store: &dyn InventoryStore,
        request: &ProvisionRequest,
        name: &str,
        slug: &str,
    ) -> Result<(), ScriptError> {
        if name.is_empty() {
            return Err(ScriptError::validation("Site name is required."));
        }
        if slug.is_empty() {
            return Err(ScriptError::validation(format!(
                "Site name '{name}' does not produce a usable slug."
            )));
        }
        if store.get_site_by_name(name).await?.is_some() {
            return Err(ScriptError::validation(format!(
                "A site named '{name}' already exists."
            )));
        }
        if store.get_site_by_slug(slug).await?.is_some() {
            return Err(ScriptError::validation(format!(
                "A site with slug '{slug}' already exists."
            )));
        }
        for (label, _, cidr) in request.subnets() {
            validate_cidr(cidr).map_err(|e| {
                let reason = match e {
                    StoreError::Validation { message } => message,
                    other => other.to_string(),
                };
                ScriptError::validation(format!("{label} subnet is invalid: {reason}"))
            })?;
        }
        Ok(())
    }

    async fn create(
        &self,
        store: &dyn InventoryStore,
        request: &ProvisionRequest,
        name: &str,
        slug: &str,
        vrf_name: &str,
        log: &mut ScriptLog,
    ) -> Result<SiteId, ScriptError> {
        let mut site = store
            .create_site(NewSite {
                name: name.to_string(),
                slug: slug.to_string(),
                status: SiteStatus::Planned,
                description: request.description.trim().to_string(),
                physical_address: request.physical_address.trim().to_string(),
            })
            .await?;
        log.success(format!(
            "Site '{}' created successfully with slug '{}'.",
            site.name, site.slug
        ));

        if let Some(details) = request.contact.as_ref().filter(|c| !c.name.trim().is_empty()) {
            let contact = store
                .create_contact(NewContact {
                    name: details.name.trim().to_string(),
                    phone: details.phone.trim().to_string(),
                    email: details.email.trim().to_string(),
                })
                .await?;
            site.contact = Some(contact.id);
            log.success(format!("Contact '{}' created for site '{}'.", contact.name, site.name));
        }

        let vrf = store
            .create_vrf(NewVrf {
                name: vrf_name.to_string(),
                description: format!("VRF for site {}", site.name),
                enforce_unique: false,
            })
            .await?;
        log.success(format!("VRF '{}' created successfully.", vrf.name));

        for (label, field, cidr) in request.subnets() {
            let prefix = store
                .create_prefix(NewPrefix {
                    prefix: cidr.to_string(),
                    site: site.id,
                    vrf: Some(vrf.id),
                    description: format!("{label} subnet for site {}", site.name),
                })
                .await?;
            site.custom_fields
                .insert(field.to_string(), prefix.id.to_string());
            log.success(format!(
                "Subnet {} created and assigned to site '{}' as {} subnet in VRF '{}'.",
                prefix.prefix, site.name, label, vrf.name
            ));
        }

        store.update_site(&site).await?;
        log.success(format!(
            "Custom fields '{CAMERA_SUBNET_FIELD}' and '{POS_SUBNET_FIELD}' assigned to the site."
        ));

        Ok(site.id)
    }
}
