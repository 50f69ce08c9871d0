//! Floodgate is the ingestion front door of a distributed time-series metrics
//! store. It accepts raw per-metric JSON batches and pre-aggregated statsd-style
//! bundles, validates and normalizes them into canonical metric records, and hands
//! them to the asynchronous persistence layer under a strict time budget.
//!
//! # Workspace Crates
//!
//! Floodgate is split into the following workspace crates:
//!
//!  - `floodgate`: Main entry point and command line interface.
//!  - `floodgate-common`: Common utilities and shared types.
//!  - `floodgate-config`: Static configuration for the CLI and server.
//!  - `floodgate-log`: Logging facade.
//!  - `floodgate-metrics`: Metrics protocol and processing.
//!  - `floodgate-server`: Endpoints and services.
//!  - `floodgate-statsd`: Internal instrumentation client.

mod cli;
mod setup;

fn main() {
    let exit_code = match cli::execute() {
        Ok(()) => 0,
        Err(error) => {
            // Logging may not be configured yet when config loading fails.
            floodgate_log::init(&floodgate_log::LogConfig::default());
            floodgate_log::error!("{error:#}");
            1
        }
    };

    std::process::exit(exit_code);
}
