use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::error::TrackingError;
use super::types::{ShipmentStatus, classify, parse_api_response};

pub const API_URL: &str = "http://shipit-api.herokuapp.com/api/carriers";

/// Anything that can look up the tracking status of a shipment.
#[allow(async_fn_in_trait)]
pub trait TrackingSource {
    async fn fetch_status(&self, tracking_number: &str) -> Result<ShipmentStatus, TrackingError>;
}

pub struct ShipItClient {
    client: Client,
    base_url: String,
}

impl ShipItClient {
    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(base_url: String) -> Result<Self, TrackingError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

impl TrackingSource for ShipItClient {
    async fn fetch_status(&self, tracking_number: &str) -> Result<ShipmentStatus, TrackingError> {
        let carrier = classify(tracking_number)
            .ok_or_else(|| TrackingError::UnknownCarrierFormat(tracking_number.to_string()))?;

        let url = format!("{}/{}/{}", self.base_url, carrier.as_path(), tracking_number);
        debug!(%carrier, %url, "requesting shipment status");

        let response = self.client.get(&url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TrackingError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        parse_api_response(carrier, &body)
    }
}
