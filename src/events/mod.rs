use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::notifications::Notifier;

/// Events emitted by the booking core. Consumed off-thread by the
/// notification collaborator; the core never blocks on delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    BookingCreated {
        booking_id: Uuid,
        property_id: Uuid,
        source: String,
    },
    BookingConfirmed {
        booking_id: Uuid,
        payment_event_id: String,
    },
    BookingCancelled {
        booking_id: Uuid,
        reason: String,
        refund_required: bool,
    },
    BookingCheckedIn(Uuid),
    BookingCheckedOut(Uuid),
    BookingCompleted(Uuid),
    BookingExpired(Uuid),
    PaymentFailed {
        booking_id: Uuid,
        provider_event_id: String,
    },
    PaymentRefunded {
        booking_id: Uuid,
        provider_event_id: String,
    },
    /// Signature verification failed on an inbound webhook; logged as a
    /// security event, never processed.
    WebhookRejected {
        reason: String,
        received_at: DateTime<Utc>,
    },
    SyncCycleFinished {
        property_id: Uuid,
        channel: String,
        succeeded: bool,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously. Delivery failures are reported to the
    /// caller, which logs and moves on (notification is fire-and-forget).
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Background consumer: drains the event channel and hands each event to
/// the notifier. Notifier failures are logged and never propagated back
/// into the booking core.
pub async fn process_events(mut rx: mpsc::Receiver<Event>, notifier: Arc<dyn Notifier>) {
    info!("Event processor started");
    while let Some(event) = rx.recv().await {
        if let Err(e) = notifier.notify(&event).await {
            warn!(error = %e, "Notification delivery failed (ignored)");
        }
    }
    info!("Event processor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::TracingNotifier;

    #[tokio::test]
    async fn events_flow_through_channel() {
        let (tx, rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        let handle = tokio::spawn(process_events(rx, Arc::new(TracingNotifier)));

        sender
            .send(Event::BookingCompleted(Uuid::new_v4()))
            .await
            .unwrap();
        drop(sender);

        handle.await.unwrap();
    }

    #[tokio::test]
    async fn send_fails_after_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        assert!(sender
            .send(Event::BookingCheckedIn(Uuid::new_v4()))
            .await
            .is_err());
    }
}
