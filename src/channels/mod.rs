//! Channel adapter seam.
//!
//! Each external distribution channel (OTA) implements [`ChannelAdapter`];
//! the sync orchestrator only ever talks through the trait. Adapters are
//! transport-only: they push plain rate/availability records and pull
//! normalized inbound bookings, with no knowledge of the booking core.

pub mod agoda;
pub mod booking_com;
pub mod expedia;
pub mod mock;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("channel request timed out")]
    Timeout,
    #[error("channel returned HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("channel protocol error: {0}")]
    Protocol(String),
    #[error("channel unavailable: {0}")]
    Unavailable(String),
}

impl ChannelError {
    /// Timeouts and 5xx/connection failures are worth retrying; protocol
    /// and 4xx errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ChannelError::Timeout | ChannelError::Unavailable(_) => true,
            ChannelError::Http { status, .. } => *status >= 500,
            ChannelError::Protocol(_) => false,
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ChannelError::Timeout
        } else if let Some(status) = e.status() {
            ChannelError::Http {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            ChannelError::Unavailable(e.to_string())
        }
    }
}

/// One nightly rate pushed outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatePush {
    pub room_unit_code: String,
    pub plan_type: String,
    pub occupancy_type: String,
    pub night: NaiveDate,
    pub rate: Decimal,
    pub currency: String,
}

/// One night of availability pushed outward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AvailabilityPush {
    pub room_unit_code: String,
    pub night: NaiveDate,
    pub available: i64,
}

/// A booking pulled inward from a channel, normalized to channel-neutral
/// shape before it reaches the booking core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundBooking {
    /// Channel-side booking identifier; the ingestion dedup key
    pub external_ref: String,
    pub room_unit_code: String,
    pub guest_name: String,
    pub guest_email: String,
    pub check_in: NaiveDate,
    pub check_out: NaiveDate,
    pub adults: i32,
    pub children: i32,
    pub rooms: i32,
    pub amount: Option<Decimal>,
}

/// Result of one push call, as reported by the channel.
#[derive(Debug, Clone, Default)]
pub struct PushOutcome {
    pub accepted: usize,
    pub rejected: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ConnectionCheck {
    pub success: bool,
    pub latency_ms: u64,
    pub error: Option<String>,
}

#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Registry key, e.g. "booking_com".
    fn name(&self) -> &'static str;

    async fn push_rates(
        &self,
        property_id: Uuid,
        credentials: &str,
        rates: &[RatePush],
    ) -> Result<PushOutcome, ChannelError>;

    async fn push_availability(
        &self,
        property_id: Uuid,
        credentials: &str,
        availability: &[AvailabilityPush],
    ) -> Result<PushOutcome, ChannelError>;

    /// Bookings created on the channel since `since`.
    async fn pull_bookings(
        &self,
        property_id: Uuid,
        credentials: &str,
        since: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<Vec<InboundBooking>, ChannelError>;

    async fn test_connection(&self, credentials: &str) -> Result<ConnectionCheck, ChannelError>;
}

/// Adapter lookup by channel name.
#[derive(Default)]
pub struct ChannelRegistry {
    adapters: HashMap<&'static str, Arc<dyn ChannelAdapter>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in production adapters.
    pub fn with_builtin(adapter_timeout: Duration) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(booking_com::BookingComAdapter::new(adapter_timeout)));
        registry.register(Arc::new(expedia::ExpediaAdapter::new(adapter_timeout)));
        registry.register(Arc::new(agoda::AgodaAdapter::new(adapter_timeout)));
        registry
    }

    pub fn register(&mut self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ChannelAdapter>> {
        self.adapters.get(name).cloned()
    }

    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.adapters.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryability() {
        assert!(ChannelError::Timeout.is_retryable());
        assert!(ChannelError::Unavailable("down".into()).is_retryable());
        assert!(ChannelError::Http {
            status: 503,
            message: "busy".into()
        }
        .is_retryable());
        assert!(!ChannelError::Http {
            status: 401,
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!ChannelError::Protocol("bad xml".into()).is_retryable());
    }

    #[test]
    fn registry_lookup() {
        let registry = ChannelRegistry::with_builtin(Duration::from_secs(5));
        assert!(registry.get("booking_com").is_some());
        assert!(registry.get("expedia").is_some());
        assert!(registry.get("agoda").is_some());
        assert!(registry.get("tripadvisor").is_none());
        assert_eq!(registry.names(), vec!["agoda", "booking_com", "expedia"]);
    }
}
