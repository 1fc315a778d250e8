use anyhow::Result;
use tracing::Instrument;

use super::{open_store, print_log, Command};
use crate::config::SiteOpsConfig;
use crate::mesh::TailscaleClient;
use crate::scripts::{MeshStatusSync, ScriptLog};
use crate::telemetry::{create_run_span, generate_correlation_id};

pub struct MeshSyncCommand {
    pub config: SiteOpsConfig,
    pub api_key: Option<String>,
    pub dry_run: bool,
}

impl MeshSyncCommand {
    pub fn new(config: SiteOpsConfig) -> Self {
        Self {
            config,
            api_key: None,
            dry_run: false,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Command for MeshSyncCommand {
    async fn execute(&self) -> Result<()> {
        if self.dry_run {
            println!("🔍 DRY RUN - Tailscale status sync for tailnet {}", self.config.mesh.tailnet);
        } else {
            println!("🔗 Tailscale status sync for tailnet {}", self.config.mesh.tailnet);
        }
        println!();

        let mesh = TailscaleClient::from_config(&self.config.mesh, self.api_key.as_deref())?;
        let store = open_store(&self.config).await?;

        let correlation_id = generate_correlation_id();
        let span = create_run_span("mesh_sync", None, &correlation_id);
        span.record("commit", !self.dry_run);

        let mut log = ScriptLog::new();
        let result = MeshStatusSync::from_config(&self.config.mesh)
            .run(store.as_ref(), &mesh, !self.dry_run, &mut log)
            .instrument(span)
            .await;
        store.close().await;
        print_log(&log);

        let summary = result?;
        println!("🎯 {summary}");
        Ok(())
    }
}
