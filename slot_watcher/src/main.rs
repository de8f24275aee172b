#![warn(clippy::pedantic)]
mod cycle;
mod error;
mod notifier;

use crate::cycle::{Cycle, CycleSummary, TokioPause};
use crate::error::MainError;
use crate::notifier::EmailNotifier;
use shared::error::InitializationError;
use shared::locations::parse_locations;
use shared::store::NotificationStore;
use shared::ttp::client::AvailabilityClient;
use shared::{Config, load_config};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(InitializationError::from)?;

    let config = load_config().map_err(InitializationError::from)?;

    let res = check_availability(&config).await;
    match res {
        Ok(summary) => info!(
            locations_checked = summary.locations_checked,
            notifications_sent = summary.notifications_sent,
            tracked_keys = summary.tracked_keys,
            persisted = summary.persisted,
            "availability check complete"
        ),
        Err(ref e) => error!(error = ?e, "availability check failed"),
    }

    res.map(|_| ())
}

async fn check_availability(config: &Config) -> Result<CycleSummary, MainError> {
    let locations = parse_locations(&config.locations).targets;
    info!(count = locations.len(), "loaded locations");

    let notifier = EmailNotifier::from_config(&config.smtp)?;
    let client = AvailabilityClient::from_config(&config.availability)?;
    let store = NotificationStore::new(&config.state_file);

    let cycle = Cycle::new(
        client,
        notifier,
        TokioPause,
        Duration::from_secs(config.availability.courtesy_delay_secs),
        config.availability.booking_url.as_str(),
    );

    Ok(cycle.run(&locations, &store).await?)
}
