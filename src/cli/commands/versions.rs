use anyhow::Result;
use tracing::Instrument;

use super::{open_store, print_log, Command};
use crate::config::SiteOpsConfig;
use crate::scripts::{PlatformVersionReport, ScriptLog};
use crate::telemetry::{create_run_span, generate_correlation_id};

pub struct VersionsCommand {
    pub config: SiteOpsConfig,
    pub json: bool,
}

impl VersionsCommand {
    pub fn new(config: SiteOpsConfig) -> Self {
        Self {
            config,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }
}

impl Command for VersionsCommand {
    async fn execute(&self) -> Result<()> {
        let store = open_store(&self.config).await?;
        let correlation_id = generate_correlation_id();
        let span = create_run_span("versions", None, &correlation_id);

        let mut log = ScriptLog::new();
        let result = PlatformVersionReport::from_config(&self.config.reports)
            .run(store.as_ref(), &mut log)
            .instrument(span)
            .await;
        store.close().await;
        // Keep --json output parseable unless the run failed
        if !self.json || result.is_err() {
            print_log(&log);
        }
        let report = result?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
            return Ok(());
        }

        println!("📋 SOFTWARE VERSIONS ({} devices)", report.rows.len());
        println!();
        if report.rows.is_empty() {
            println!(
                "📭 No devices tagged '{}'",
                self.config.reports.device_tag
            );
        } else {
            print!("{report}");
        }
        Ok(())
    }
}
