use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

#[derive(Parser)]
#[command(name = "site-ops")]
#[command(about = "Inventory automation for sites, devices and subnets")]
#[command(long_about = "site-ops runs the routine inventory workflows: provisioning new sites, \
                       retiring old ones, reporting installed software versions and syncing \
                       device status with the Tailscale mesh.")]
pub struct Cli {
    /// Configuration file (defaults to ./site-ops.toml when present)
    #[arg(long, global = true, help = "Path to a site-ops TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move devices off a site into storage and mark the site as decommissioning
    Decommission {
        /// Name of the site to retire
        site: String,
        /// Delete the site and its racks, devices and prefixes after the move
        #[arg(long, help = "Delete the site and all related items after moving devices")]
        delete: bool,
    },
    /// Create a planned site with its VRF and camera/POS subnets
    Provision {
        /// Name of the new site
        name: String,
        #[arg(long, default_value = "", help = "Description of the site")]
        description: String,
        #[arg(long, default_value = "", help = "Physical address of the site")]
        address: String,
        #[arg(long, help = "Contact person name")]
        contact_name: Option<String>,
        #[arg(long, requires = "contact_name", help = "Contact person phone")]
        contact_phone: Option<String>,
        #[arg(long, requires = "contact_name", help = "Contact person email")]
        contact_email: Option<String>,
        #[arg(long, help = "Subnet for cameras (e.g. 192.168.1.0/24)")]
        camera_subnet: String,
        #[arg(long, help = "Subnet for POS (e.g. 192.168.2.0/24)")]
        pos_subnet: String,
        /// Show what would be created without making changes
        #[arg(long, help = "Validate and show what would be created without making changes")]
        dry_run: bool,
    },
    /// Show software versions installed on tagged servers
    Versions {
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// Sync device status with Tailscale node online state
    MeshSync {
        /// Overrides mesh.api_key and TAILSCALE_API_KEY
        #[arg(long, help = "Tailscale API key")]
        api_key: Option<String>,
        /// Show what would change without making changes
        #[arg(long, help = "Preview status changes without saving them")]
        dry_run: bool,
    },
    /// Write a starter configuration and an inventory snapshot seeded with the storage site
    Init {
        #[arg(long, help = "Overwrite existing configuration and snapshot")]
        force: bool,
    },
}
