// site-ops library - inventory automation workflows
// This exposes the core components for testing and integration

pub mod cli;
pub mod config;
pub mod database;
pub mod inventory;
pub mod mesh;
pub mod scripts;
pub mod telemetry;

// Re-export key types for easy access
pub use config::SiteOpsConfig;
pub use inventory::{InventoryStore, MemoryStore, StoreError};
pub use mesh::{MeshStatusSource, TailscaleClient};
pub use scripts::{
    MeshStatusSync, PlatformVersionReport, ScriptError, ScriptLog, SiteDecommission,
    SiteProvisioning,
};

#[cfg(feature = "database")]
pub use database::SqliteInventoryStore;
