//! Booking.com connectivity adapter.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    AvailabilityPush, ChannelAdapter, ChannelError, ConnectionCheck, InboundBooking, PushOutcome,
    RatePush,
};

const DEFAULT_BASE_URL: &str = "https://supply-xml.booking.com/hotels/ota/v1";

#[derive(Debug, Deserialize)]
struct Credentials {
    hotel_id: String,
    api_key: String,
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
struct ReservationsResponse {
    reservations: Vec<InboundBooking>,
}

pub struct BookingComAdapter {
    client: Client,
    base_url: String,
}

impl BookingComAdapter {
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

    async fn push(
        &self,
        path: &str,
        creds: &Credentials,
        body: &serde_json::Value,
    ) -> Result<PushOutcome, ChannelError> {
        let url = format!("{}/{}/{}", self.base_url, creds.hotel_id, path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&creds.api_key)
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
impl ChannelAdapter for BookingComAdapter {
    fn name(&self) -> &'static str {
        "booking_com"
    }

    #[instrument(skip(self, credentials, rates), fields(count = rates.len()))]
    async fn push_rates(
        &self,
        _property_id: Uuid,
        credentials: &str,
        rates: &[RatePush],
    ) -> Result<PushOutcome, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let body = serde_json::json!({ "rates": rates });
        self.push("rates", &creds, &body).await
    }

    #[instrument(skip(self, credentials, availability), fields(count = availability.len()))]
    async fn push_availability(
        &self,
        _property_id: Uuid,
        credentials: &str,
        availability: &[AvailabilityPush],
    ) -> Result<PushOutcome, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let body = serde_json::json!({ "availability": availability });
        self.push("availability", &creds, &body).await
    }

    #[instrument(skip(self, credentials))]
    async fn pull_bookings(
        &self,
        _property_id: Uuid,
        credentials: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InboundBooking>, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let mut url = format!("{}/{}/reservations", self.base_url, creds.hotel_id);
        if let Some(since) = since {
            url.push_str(&format!("?since={}", since.to_rfc3339()));
        }

        let response = self
            .client
            .get(&url)
            .bearer_auth(&creds.api_key)
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
        let parsed: ReservationsResponse = response
            .json()
            .await
            .map_err(|e| ChannelError::Protocol(e.to_string()))?;
        debug!(count = parsed.reservations.len(), "Pulled reservations");
        Ok(parsed.reservations)
    }

    async fn test_connection(&self, credentials: &str) -> Result<ConnectionCheck, ChannelError> {
        let creds = Self::parse_credentials(credentials)?;
        let url = format!("{}/{}/ping", self.base_url, creds.hotel_id);
        let started = Instant::now();
        let result = self.client.get(&url).bearer_auth(&creds.api_key).send().await;
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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const CREDS: &str = r#"{"hotel_id": "h42", "api_key": "k-secret"}"#;

    fn rate(night: NaiveDate) -> RatePush {
        RatePush {
            room_unit_code: "DLX".to_string(),
            plan_type: "EP".to_string(),
            occupancy_type: "double".to_string(),
            night,
            rate: dec!(120),
            currency: "USD".to_string(),
        }
    }

    #[tokio::test]
    async fn push_rates_reports_channel_outcome() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/h42/rates"))
            .and(header("authorization", "Bearer k-secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accepted": 1,
                "rejected": 1,
                "errors": ["DLX closed out on 2026-09-05"]
            })))
            .mount(&server)
            .await;

        let adapter = BookingComAdapter::with_base_url(&server.uri(), Duration::from_secs(2));
        let night = NaiveDate::from_ymd_opt(2026, 9, 4).unwrap();
        let outcome = adapter
            .push_rates(Uuid::new_v4(), CREDS, &[rate(night)])
            .await
            .unwrap();
        assert_eq!(outcome.accepted, 1);
        assert_eq!(outcome.rejected, 1);
        assert_eq!(outcome.errors.len(), 1);
    }

    #[tokio::test]
    async fn server_error_maps_to_retryable_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/h42/availability"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let adapter = BookingComAdapter::with_base_url(&server.uri(), Duration::from_secs(2));
        let err = adapter
            .push_availability(Uuid::new_v4(), CREDS, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Http { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn pull_bookings_parses_reservations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/h42/reservations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "reservations": [{
                    "external_ref": "BDC-9001",
                    "room_unit_code": "DLX",
                    "guest_name": "Grace Hopper",
                    "guest_email": "grace@example.com",
                    "check_in": "2026-09-10",
                    "check_out": "2026-09-12",
                    "adults": 2,
                    "children": 0,
                    "rooms": 1,
                    "amount": "240"
                }]
            })))
            .mount(&server)
            .await;

        let adapter = BookingComAdapter::with_base_url(&server.uri(), Duration::from_secs(2));
        let bookings = adapter.pull_bookings(Uuid::new_v4(), CREDS, None).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].external_ref, "BDC-9001");
        assert_eq!(bookings[0].amount, Some(dec!(240)));
    }

    #[tokio::test]
    async fn malformed_credentials_fail_without_a_request() {
        let adapter = BookingComAdapter::with_base_url("http://127.0.0.1:9", Duration::from_secs(2));
        let err = adapter
            .push_rates(Uuid::new_v4(), "not json", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ChannelError::Protocol(_)));
    }
}
