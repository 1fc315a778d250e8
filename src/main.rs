use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use site_ops::cli::commands::{
    show_usage, Command, DecommissionCommand, InitCommand, MeshSyncCommand, ProvisionCommand,
    VersionsCommand,
};
use site_ops::cli::{Cli, Commands};
use site_ops::config::{self, SiteOpsConfig};
use site_ops::scripts::{ContactDetails, ProvisionRequest};
use site_ops::telemetry;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            SiteOpsConfig::load_env_file()?;
            SiteOpsConfig::load_from(Some(path.as_path()))?
        }
        None => config::config()?.clone(),
    };
    telemetry::init_telemetry(&config.observability)?;

    let runtime = tokio::runtime::Runtime::new()?;
    match cli.command {
        // No subcommand: explain what is available
        None => runtime.block_on(show_usage()),
        Some(Commands::Decommission { site, delete }) => runtime.block_on(
            DecommissionCommand::new(config, site)
                .with_delete(delete)
                .execute(),
        ),
        Some(Commands::Provision {
            name,
            description,
            address,
            contact_name,
            contact_phone,
            contact_email,
            camera_subnet,
            pos_subnet,
            dry_run,
        }) => {
            let request = ProvisionRequest {
                name,
                description,
                physical_address: address,
                contact: contact_name.map(|name| ContactDetails {
                    name,
                    phone: contact_phone.unwrap_or_default(),
                    email: contact_email.unwrap_or_default(),
                }),
                camera_subnet,
                pos_subnet,
            };
            runtime.block_on(
                ProvisionCommand::new(config, request)
                    .with_dry_run(dry_run)
                    .execute(),
            )
        }
        Some(Commands::Versions { json }) => {
            runtime.block_on(VersionsCommand::new(config).with_json(json).execute())
        }
        Some(Commands::MeshSync { api_key, dry_run }) => runtime.block_on(
            MeshSyncCommand::new(config)
                .with_api_key(api_key)
                .with_dry_run(dry_run)
                .execute(),
        ),
        Some(Commands::Init { force }) => {
            let config_path = cli
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from("site-ops.toml"));
            runtime.block_on(
                InitCommand::new(config, config_path)
                    .with_force(force)
                    .execute(),
            )
        }
    }
}
