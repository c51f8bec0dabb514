//! Auto-cancellation of pending bookings whose payment window elapsed.
//!
//! The sweep re-checks every candidate with a conditional update, so a
//! payment that lands mid-sweep wins and the booking is skipped. Sweeps
//! are safe to run concurrently and to re-run over the same rows.

use chrono::{Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use tokio::time::interval;
use tracing::{error, info, instrument};

use crate::errors::ServiceError;
use crate::services::bookings::BookingService;

const SWEEP_BATCH: u64 = 200;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SweepReport {
    pub examined: usize,
    pub cancelled: usize,
    /// Candidates that escaped between the scan and the conditional update
    pub skipped: usize,
}

pub struct ExpiryService {
    bookings: Arc<BookingService>,
    grace: Duration,
}

impl ExpiryService {
    pub fn new(bookings: Arc<BookingService>, grace_minutes: i64) -> Self {
        Self {
            bookings,
            grace: Duration::minutes(grace_minutes),
        }
    }

    /// One pass over expired holds.
    #[instrument(skip(self))]
    pub async fn sweep(&self) -> Result<SweepReport, ServiceError> {
        let cutoff = Utc::now() - self.grace;
        let candidates = self.bookings.find_expired(cutoff, SWEEP_BATCH).await?;

        let mut report = SweepReport {
            examined: candidates.len(),
            ..Default::default()
        };
        for booking in candidates {
            if self.bookings.cancel_expired(booking.id).await? {
                report.cancelled += 1;
            } else {
                report.skipped += 1;
            }
        }

        if report.cancelled > 0 {
            counter!("staysync.bookings.expired", report.cancelled as u64);
            info!(
                examined = report.examined,
                cancelled = report.cancelled,
                skipped = report.skipped,
                "Expiry sweep finished"
            );
        }
        Ok(report)
    }
}

/// Background loop driving the sweep at a fixed interval. Errors are
/// logged and the loop keeps going.
pub async fn run_sweeper(service: Arc<ExpiryService>, interval_secs: u64) {
    let mut ticker = interval(std::time::Duration::from_secs(interval_secs.max(1)));
    info!(interval_secs, "Expiry sweeper started");
    loop {
        ticker.tick().await;
        if let Err(e) = service.sweep().await {
            error!(error = %e, "Expiry sweep failed");
        }
    }
}
