use anyhow::Result;
use tracing::Instrument;

use super::{open_store, print_log, Command};
use crate::config::SiteOpsConfig;
use crate::scripts::{ProvisionRequest, ScriptLog, SiteProvisioning};
use crate::telemetry::{create_run_span, generate_correlation_id};

pub struct ProvisionCommand {
    pub config: SiteOpsConfig,
    pub request: ProvisionRequest,
    pub dry_run: bool,
}

impl ProvisionCommand {
    pub fn new(config: SiteOpsConfig, request: ProvisionRequest) -> Self {
        Self {
            config,
            request,
            dry_run: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

impl Command for ProvisionCommand {
    async fn execute(&self) -> Result<()> {
        if self.dry_run {
            println!("🔍 DRY RUN - provisioning site '{}'", self.request.name);
        } else {
            println!("🏗️  Provisioning site '{}'", self.request.name);
        }
        println!();

        let store = open_store(&self.config).await?;
        let correlation_id = generate_correlation_id();
        let span = create_run_span("provision", Some(&self.request.name), &correlation_id);
        span.record("commit", !self.dry_run);

        let mut log = ScriptLog::new();
        let result = SiteProvisioning::new()
            .run(store.as_ref(), &self.request, !self.dry_run, &mut log)
            .instrument(span)
            .await;
        store.close().await;
        print_log(&log);

        let summary = result?;
        println!("🎯 {summary}");
        Ok(())
    }
}
