//! The shipping KPI reconciliation job.
//!
//! [`run_once`] is the whole process lifecycle: load the config, build the
//! clients, run one pass with [`ShippingKpiJob`], persist the advanced
//! watermark. Any error before the save leaves the config file as it was.

mod runner;
mod summary;

use std::path::Path;

use chrono::Utc;

pub use runner::ShippingKpiJob;
pub use summary::RunSummary;

use crate::airtable::AirtableClient;
use crate::config::JobConfig;
use crate::error::JobError;
use crate::logging::JobLogger;
use crate::shipit::ShipItClient;

/// Load the config at `config_path`, reconcile once, and save the config back.
pub async fn run_once(config_path: &Path, logger: impl JobLogger) -> Result<RunSummary, JobError> {
    let started_at = Utc::now();
    let mut config = JobConfig::load(config_path)?;

    let tracker = ShipItClient::with_base_url(config.tracking_base_url.clone())?;
    let store = AirtableClient::with_base_url(
        &config.store_base_url,
        &config.store_base_id,
        config.store_token.clone(),
    )?;

    let job = ShippingKpiJob::new(tracker, store, logger);
    let summary = job.execute(&mut config, started_at).await?;

    config.save(config_path)?;
    Ok(summary)
}
