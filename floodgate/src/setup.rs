use std::collections::BTreeMap;

use anyhow::Context;
use floodgate_config::Config;

/// Print spawn infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        floodgate_log::info!("launching floodgate with built-in defaults");
    } else {
        floodgate_log::info!("launching floodgate from config {}", config.path().display());
    }

    floodgate_log::info!("  persist timeout: {:?}", config.persist_timeout());
    floodgate_log::info!("  force ttls: {}", config.force_ttls());
    floodgate_log::info!(
        "  ingestion window: -{:?} / +{:?}",
        config.ingestion_window().past,
        config.ingestion_window().future,
    );
}

/// Configures statsd reporting when a host is set.
pub fn init_metrics(config: &Config) -> anyhow::Result<()> {
    let Some(host) = config.statsd_host() else {
        return Ok(());
    };

    floodgate_statsd::init(config.statsd_prefix(), host, BTreeMap::new())
        .context("failed to initialize statsd reporting")?;

    Ok(())
}
