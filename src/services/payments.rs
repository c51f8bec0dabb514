//! Payment provider webhook gateway.
//!
//! Inbound webhooks carry an HMAC-SHA256 signature over
//! `"{timestamp}.{raw_body}"`. Verification happens against the raw bytes
//! before any parsing; a bad or stale signature is rejected and logged,
//! never processed. Event application is idempotent on the provider's
//! event id, which the payment_events table enforces with a unique column.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::bookings::{BookingService, ConfirmOutcome};

type HmacSha256 = Hmac<Sha256>;

/// Webhook payload from the payment provider.
#[derive(Debug, Clone, Deserialize, utoipa::ToSchema)]
pub struct PaymentWebhookPayload {
    /// Provider's unique event id; the idempotency key
    pub event_id: String,
    /// "payment.captured", "payment.failed" or "refund.created"
    pub event_type: String,
    /// The payment order reference issued at booking creation
    pub order_ref: String,
    pub amount: Option<Decimal>,
}

/// What applying a webhook did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Processed,
    /// Event id seen before; acknowledged without changes.
    Duplicate,
    /// Recognized but deliberately not acted on.
    Ignored(String),
}

pub struct PaymentService {
    bookings: Arc<BookingService>,
    event_sender: EventSender,
    webhook_secret: Option<String>,
    tolerance_secs: u64,
}

impl PaymentService {
    pub fn new(
        bookings: Arc<BookingService>,
        event_sender: EventSender,
        webhook_secret: Option<String>,
        tolerance_secs: u64,
    ) -> Self {
        Self {
            bookings,
            event_sender,
            webhook_secret,
            tolerance_secs,
        }
    }

    /// Verifies the webhook signature against the raw request body.
    ///
    /// The provider signs `"{timestamp}.{body}"`; timestamps older than the
    /// configured tolerance are rejected to blunt replay. With no secret
    /// configured every webhook is rejected: verification fails closed, so
    /// a deployment that forgets `payment_webhook_secret` cannot be fed
    /// unsigned events.
    pub fn verify_signature(&self, body: &[u8], timestamp: &str, signature: &str) -> bool {
        let secret = match &self.webhook_secret {
            Some(s) => s,
            None => {
                warn!("Webhook secret not configured; rejecting webhook");
                return false;
            }
        };

        let ts = match timestamp.parse::<i64>() {
            Ok(ts) => ts,
            Err(_) => return false,
        };
        let age = (Utc::now().timestamp() - ts).unsigned_abs();
        if age > self.tolerance_secs {
            return false;
        }

        let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        mac.update(timestamp.as_bytes());
        mac.update(b".");
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());

        // constant-time compare of equal-length hex strings
        let provided = signature.trim().to_lowercase();
        if provided.len() != expected.len() {
            return false;
        }
        provided
            .bytes()
            .zip(expected.bytes())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Records a rejected webhook as a security event.
    pub async fn reject(&self, reason: &str) {
        warn!(reason, "Webhook rejected");
        if let Err(e) = self
            .event_sender
            .send(Event::WebhookRejected {
                reason: reason.to_string(),
                received_at: Utc::now(),
            })
            .await
        {
            warn!(error = %e, "Failed to emit WebhookRejected");
        }
    }

    /// Routes a verified webhook to the booking state machine.
    #[instrument(skip(self, payload), fields(event_id = %payload.event_id, event_type = %payload.event_type))]
    pub async fn apply(
        &self,
        payload: &PaymentWebhookPayload,
    ) -> Result<WebhookOutcome, ServiceError> {
        let booking = self
            .bookings
            .get_by_payment_order_ref(&payload.order_ref)
            .await?;

        let outcome = match payload.event_type.as_str() {
            "payment.captured" | "payment.authorized" => {
                match self
                    .bookings
                    .confirm(booking.id, &payload.event_id, payload.amount)
                    .await?
                {
                    ConfirmOutcome::DuplicateEvent => WebhookOutcome::Duplicate,
                    ConfirmOutcome::Confirmed
                    | ConfirmOutcome::AlreadyConfirmed
                    | ConfirmOutcome::RefundFlagged => WebhookOutcome::Processed,
                }
            }
            "payment.failed" => {
                if self
                    .bookings
                    .record_payment_failure(booking.id, &payload.event_id)
                    .await?
                {
                    WebhookOutcome::Processed
                } else {
                    WebhookOutcome::Duplicate
                }
            }
            "refund.created" => {
                if self
                    .bookings
                    .apply_refund(booking.id, &payload.event_id, payload.amount)
                    .await?
                {
                    WebhookOutcome::Processed
                } else {
                    WebhookOutcome::Duplicate
                }
            }
            other => {
                info!(event_type = other, "Unhandled webhook event type");
                WebhookOutcome::Ignored(format!("unhandled event type '{}'", other))
            }
        };

        Ok(outcome)
    }
}
