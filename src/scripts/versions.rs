// Software version report for tagged devices

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::ReportConfig;
use crate::inventory::{DeviceFilter, InventoryStore};

use super::{ScriptError, ScriptLog};

const MISSING: &str = "N/A";

/// A device custom field shown as a report column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionField {
    pub key: String,
    pub header: String,
}

impl VersionField {
    pub fn new(key: &str, header: &str) -> Self {
        Self {
            key: key.to_string(),
            header: header.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRow {
    pub device: String,
    pub platform: String,
    /// One value per configured field, in column order
    pub versions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionReport {
    pub headers: Vec<String>,
    pub rows: Vec<VersionRow>,
}

impl VersionReport {
    fn cells(row: &VersionRow) -> Vec<&str> {
        let mut cells = vec![row.device.as_str(), row.platform.as_str()];
        cells.extend(row.versions.iter().map(String::as_str));
        cells
    }
}

impl fmt::Display for VersionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(Self::cells(row)) {
                *width = (*width).max(cell.chars().count());
            }
        }

        let headers: Vec<&str> = self.headers.iter().map(String::as_str).collect();
        write_row(f, &headers, &widths)?;
        let rule: Vec<String> = widths.iter().map(|w| "─".repeat(*w)).collect();
        writeln!(f, "{}", rule.join("  "))?;
        for row in &self.rows {
            write_row(f, &Self::cells(row), &widths)?;
        }
        Ok(())
    }
}

fn write_row(f: &mut fmt::Formatter<'_>, cells: &[&str], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    writeln!(f, "{}", padded.join("  ").trim_end())
}

#[derive(Debug, Clone)]
pub struct PlatformVersionReport {
    device_tag: String,
    fields: Vec<VersionField>,
}

impl PlatformVersionReport {
    pub fn new(device_tag: &str, fields: Vec<VersionField>) -> Self {
        Self {
            device_tag: device_tag.to_string(),
            fields,
        }
    }

    pub fn from_config(config: &ReportConfig) -> Self {
        Self::new(&config.device_tag, config.version_fields.clone())
    }

    pub async fn run(
        &self,
        store: &dyn InventoryStore,
        log: &mut ScriptLog,
    ) -> Result<VersionReport, ScriptError> {
        let devices = match store.list_devices(&DeviceFilter::tagged(&self.device_tag)).await {
            Ok(devices) => devices,
            Err(e) => {
                log.failure(format!("Failed to list '{}' devices: {e}", self.device_tag));
                return Err(e.into());
            }
        };

        let mut rows = Vec::with_capacity(devices.len());
        for device in devices {
            let platform = match device.platform {
                Some(id) => match store.get_platform(id).await {
                    Ok(platform) => platform.map(|p| p.name),
                    Err(e) => {
                        log.failure(format!("Failed to load platform of {}: {e}", device.name));
                        return Err(e.into());
                    }
                },
                None => None,
            };
            let versions = self
                .fields
                .iter()
                .map(|field| {
                    device
                        .custom_fields
                        .get(&field.key)
                        .cloned()
                        .unwrap_or_else(|| MISSING.to_string())
                })
                .collect();
            rows.push(VersionRow {
                device: device.name,
                platform: platform.unwrap_or_else(|| MISSING.to_string()),
                versions,
            });
        }

        log.info(format!(
            "Reported versions for {} devices tagged '{}'.",
            rows.len(),
            self.device_tag
        ));

        let mut headers = vec!["Device".to_string(), "Platform".to_string()];
        headers.extend(self.fields.iter().map(|f| f.header.clone()));
        Ok(VersionReport { headers, rows })
    }
}
