//! Inventory automation scripts
//!
//! Each script is a single pass over the inventory. Scripts record what they
//! do in a [`ScriptLog`] owned by the caller, so the operator sees every step
//! that completed even when a later step fails. Writes are persisted one by
//! one; a failed run is not rolled back.

pub mod decommission;
pub mod error;
pub mod log;
pub mod mesh_sync;
pub mod provision;
pub mod versions;

pub use decommission::{DecommissionRequest, DecommissionSummary, DeletionCounts, SiteDecommission};
pub use error::ScriptError;
pub use log::{LogEntry, LogLevel, ScriptLog};
pub use mesh_sync::{MeshStatusSync, MeshSyncSummary};
pub use provision::{slugify, ContactDetails, ProvisionRequest, ProvisionSummary, SiteProvisioning};
pub use versions::{PlatformVersionReport, VersionField, VersionReport, VersionRow};
