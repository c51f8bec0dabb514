//! Expedia (EPS) connectivity adapter. Same transport shape as the
//! Booking.com adapter but Expedia authenticates with a key/secret header
//! pair and namespaces endpoints by property.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::instrument;
use uuid::Uuid;

use super::{
    AvailabilityPush, ChannelAdapter, ChannelError, ConnectionCheck, InboundBooking, PushOutcome,
    RatePush,
};

const DEFAULT_BASE_URL: &str = "https://services.expediapartnercentral.com/products/v2";

#[derive(Debug, Deserialize)]
struct Credentials {
    property_code: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    accepted: usize,
    #[serde(default)]
    rejected: usize,
    #[serde(default)]
    errors: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct BookingsResponse {
    bookings: Vec<InboundBooking>,
}

pub struct ExpediaAdapter {
    client: Client,
    base_url: String,
}

impl ExpediaAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn parse_credentials(credentials: &str) -> Result<Credentials, ChannelError> {
        serde_json::from_str(credentials)
            .map_err(|e| ChannelError::Protocol(format!("invalid credentials blob: {}", e)))
    }

    async fn post_records(
        &self,
        path: &str,
        creds: &Credentials,
        body: &serde_json::Value,
    ) -> Result<PushOutcome, ChannelError> {
        let url = format!("{}/properties/{}/{}", self.base_url, creds.property_code, path);
        let response = self
            .client
            .post(&url)
            .header("EPS-API-Key", &creds.api_key)
            .header("EPS-API-Secret", &creds.api_secret)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChannelError::Http {
                status: status.as_u16(),
                message,
            });
        }
        let parsed: PushResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        Ok(PushOutcome {
            accepted: parsed.accepted,
            rejected: parsed.rejected,
            errors: parsed.errors,
        })
    }
}

#[async_trait]
impl ChannelAdapter for ExpediaAdapter {
    fn name(&self) -> &'static str {
        "expedia"
    }

    #[instrument(skip(self, credentials, rates), fields(count = rates.len()))]
    async fn push_rates(
        &self,
        _property_id: Uuid,
        credentials: &str,
        rates: &[RatePush],
    ) -> Result<PushOutcome, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        self.post_records("rateplans", &creds, &serde_json::json!({ "rates": rates }))
            .await
    }

    #[instrument(skip(self, credentials, availability), fields(count = availability.len()))]
    async fn push_availability(
        &self,
        _property_id: Uuid,
        credentials: &str,
        availability: &[AvailabilityPush],
    ) -> Result<PushOutcome, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        self.post_records(
            "avail",
            &creds,
            &serde_json::json!({ "availability": availability }),
        )
        .await
    }

    #[instrument(skip(self, credentials))]
    async fn pull_bookings(
        &self,
        _property_id: Uuid,
        credentials: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InboundBooking>, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let mut request = self
            .client
            .get(format!(
                "{}/properties/{}/bookings",
                self.base_url, creds.property_code
            ))
            .header("EPS-API-Key", &creds.api_key)
            .header("EPS-API-Secret", &creds.api_secret);
        if let Some(since) = since {
            request = request.query(&[("since", since.to_rfc3339())]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ChannelError::Http {
                status: status.as_u16(),
                message,
            });
        }
        let parsed: BookingsResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        Ok(parsed.bookings)
    }

    async fn test_connection(&self, credentials: &str) -> Result<ConnectionCheck, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let url = format!("{}/properties/{}", self.base_url, creds.property_code);
        let started = Instant::now();
        let result = self
            .client
            .get(&url)
            .header("EPS-API-Key", &creds.api_key)
            .header("EPS-API-Secret", &creds.api_secret)
            .send()
            .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        match result {
            Ok(response) if response.status().is_success() => Ok(ConnectionCheck {
                success: true,
                latency_ms,
                error: None,
            }),
            Ok(response) => Ok(ConnectionCheck {
                success: false,
                latency_ms,
                error: Some(format!("HTTP {}", response.status())),
            }),
            Err(e) => Ok(ConnectionCheck {
                success: false,
                latency_ms,
                error: Some(e.to_string()),
            }),
        }
    }
}
