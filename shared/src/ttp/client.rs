use crate::AvailabilityConfig;
use crate::error::FetchError;
use crate::ttp::SLOTS_PATH;
use crate::ttp::slots::Slot;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::{debug, warn};

/// Read-only client for the scheduler `slots` endpoint.
#[derive(Clone)]
pub struct AvailabilityClient {
    client: Client,
    slots_url: Url,
    limit: u32,
}

impl AvailabilityClient {
    pub fn new(base_url: &str, timeout: Duration, limit: u32) -> Result<Self, FetchError> {
        let raw = format!("{}/{SLOTS_PATH}", base_url.trim_end_matches('/'));
        let slots_url = Url::parse(&raw).map_err(|e| FetchError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            slots_url,
            limit,
        })
    }

    pub fn from_config(config: &AvailabilityConfig) -> Result<Self, FetchError> {
        Self::new(
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
            config.limit,
        )
    }

    /// Soonest slots with at least one opening at `location_id`.
    pub async fn try_fetch(&self, location_id: &str) -> Result<Vec<Slot>, FetchError> {
        let limit = self.limit.to_string();
        let slots = self
            .client
            .get(self.slots_url.clone())
            .query(&[
                ("orderBy", "soonest"),
                ("limit", limit.as_str()),
                ("locationId", location_id),
                ("minimum", "1"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<Slot>>()
            .await?;
        debug!(location = location_id, len = slots.len(), "fetched slots");

        Ok(slots)
    }

    /// Like [`AvailabilityClient::try_fetch`], but a failed request is logged and reported
    /// as no slots.
    pub async fn fetch(&self, location_id: &str) -> Vec<Slot> {
        self.try_fetch(location_id).await.unwrap_or_else(|e| {
            warn!(location = location_id, error = ?e, "failed to fetch slots");
            Vec::default()
        })
    }
}
