use anyhow::Result;
use tracing::Instrument;

use super::{open_store, print_log, Command};
use crate::config::SiteOpsConfig;
use crate::scripts::{DecommissionRequest, ScriptLog, SiteDecommission};
use crate::telemetry::{create_run_span, generate_correlation_id};

pub struct DecommissionCommand {
    pub config: SiteOpsConfig,
    pub site: String,
    pub delete: bool,
}

impl DecommissionCommand {
    pub fn new(config: SiteOpsConfig, site: String) -> Self {
        Self {
            config,
            site,
            delete: false,
        }
    }

    pub fn with_delete(mut self, delete: bool) -> Self {
        self.delete = delete;
        self
    }
}

impl Command for DecommissionCommand {
    async fn execute(&self) -> Result<()> {
        println!("📦 Decommissioning site '{}'", self.site);
        if self.delete {
            println!("   🗑️  Site and related items will be deleted after the move");
        }
        println!();

        let store = open_store(&self.config).await?;
        let script = SiteDecommission::from_config(&self.config.decommission);
        let request = DecommissionRequest {
            site: self.site.clone(),
            delete_after_move: self.delete,
        };

        let correlation_id = generate_correlation_id();
        let span = create_run_span("decommission", Some(&self.site), &correlation_id);
        span.record("commit", true);

        let mut log = ScriptLog::new();
        let result = script
            .run(store.as_ref(), &request, &mut log)
            .instrument(span)
            .await;
        store.close().await;
        print_log(&log);

        let summary = result?;
        println!("🎯 {summary}");
        Ok(())
    }
}
