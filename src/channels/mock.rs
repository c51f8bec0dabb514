//! In-memory channel for tests and local development. Records every push
//! and serves scripted inbound bookings and failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{
    AvailabilityPush, ChannelAdapter, ChannelError, ConnectionCheck, InboundBooking, PushOutcome,
    RatePush,
};

#[derive(Default)]
pub struct MockChannel {
    name: &'static str,
    pub pushed_rates: Mutex<Vec<RatePush>>,
    pub pushed_availability: Mutex<Vec<AvailabilityPush>>,
    inbound: Mutex<Vec<InboundBooking>>,
    fail_pushes: AtomicBool,
    /// Fail this many calls, then succeed (exercises retry paths)
    transient_failures: AtomicUsize,
    pub push_calls: AtomicUsize,
}

impl MockChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn queue_inbound(&self, booking: InboundBooking) {
        self.inbound.lock().unwrap().push(booking);
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_pushes.store(failing, Ordering::SeqCst);
    }

    pub fn fail_next(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), ChannelError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Err(ChannelError::Unavailable("mock channel down".to_string()));
        }
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(ChannelError::Timeout);
        }
        Ok(())
    }
}

#[async_trait]
impl ChannelAdapter for MockChannel {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn push_rates(
        &self,
        _property_id: Uuid,
        _credentials: &str,
        rates: &[RatePush],
    ) -> Result<PushOutcome, ChannelError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.pushed_rates.lock().unwrap().extend_from_slice(rates);
        Ok(PushOutcome {
            accepted: rates.len(),
            ..Default::default()
        })
    }

    async fn push_availability(
        &self,
        _property_id: Uuid,
        _credentials: &str,
        availability: &[AvailabilityPush],
    ) -> Result<PushOutcome, ChannelError> {
        self.push_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        self.pushed_availability
            .lock()
            .unwrap()
            .extend_from_slice(availability);
        Ok(PushOutcome {
            accepted: availability.len(),
            ..Default::default()
        })
    }

    async fn pull_bookings(
        &self,
        _property_id: Uuid,
        _credentials: &str,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<InboundBooking>, ChannelError> {
        self.check_failure()?;
        Ok(self.inbound.lock().unwrap().clone())
    }

    async fn test_connection(&self, _credentials: &str) -> Result<ConnectionCheck, ChannelError> {
        if self.fail_pushes.load(Ordering::SeqCst) {
            return Ok(ConnectionCheck {
                success: false,
                latency_ms: 1,
                error: Some("mock channel down".to_string()),
            });
        }
        Ok(ConnectionCheck {
            success: true,
            latency_ms: 1,
            error: None,
        })
    }
}
