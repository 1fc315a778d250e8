//! Inventory model and storage
//!
//! Sites own devices, racks and prefixes by id. Stores enforce the
//! ownership rules (no orphaned children, no deleting a site that still owns
//! records) so workflows cannot leave the graph inconsistent.

pub mod memory;
pub mod store;
pub mod types;

pub use memory::{Inventory, MemoryStore};
pub use store::{validate_cidr, InventoryStore, StoreError};
pub use types::*;

#[cfg(test)]
pub use store::MockInventoryStore;
