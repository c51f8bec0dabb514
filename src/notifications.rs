//! Notification collaborator interface.
//!
//! Booking and cancellation notices are fire-and-forget: a failure here
//! must never roll back or delay a booking transition. The real transport
//! (email/SMS gateway) lives outside this service; the default
//! implementation records the notice in the structured log.

use async_trait::async_trait;
use tracing::info;

use crate::events::Event;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, event: &Event) -> Result<(), String>;
}

/// Default notifier: structured log lines only.
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: &Event) -> Result<(), String> {
        match event {
            Event::BookingCreated {
                booking_id, source, ..
            } => {
                info!(booking_id = %booking_id, source = %source, "notify: booking created");
            }
            Event::BookingConfirmed { booking_id, .. } => {
                info!(booking_id = %booking_id, "notify: booking confirmed");
            }
            Event::BookingCancelled {
                booking_id,
                reason,
                refund_required,
            } => {
                info!(
                    booking_id = %booking_id,
                    reason = %reason,
                    refund_required = refund_required,
                    "notify: booking cancelled"
                );
            }
            other => {
                info!(event = ?other, "notify: event");
            }
        }
        Ok(())
    }
}
