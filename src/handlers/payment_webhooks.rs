use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse};
use bytes::Bytes;
use tracing::info;

use crate::errors::ServiceError;
use crate::services::payments::{PaymentWebhookPayload, WebhookOutcome};
use crate::AppState;

/// Payment provider webhook.
///
/// Signature is verified over the raw body before parsing. Duplicate
/// events are acknowledged with 200 so the provider stops retrying.
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = PaymentWebhookPayload,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown payment order", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    let timestamp = headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let signature = headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    if !state
        .services
        .payments
        .verify_signature(&body, timestamp, signature)
    {
        state
            .services
            .payments
            .reject("signature verification failed")
            .await;
        return Err(ServiceError::Unauthorized(
            "invalid webhook signature".to_string(),
        ));
    }

    let payload: PaymentWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("invalid webhook body: {}", e)))?;

    match state.services.payments.apply(&payload).await? {
        WebhookOutcome::Processed => Ok((StatusCode::OK, "ok")),
        WebhookOutcome::Duplicate => {
            info!(event_id = %payload.event_id, "Duplicate webhook acknowledged");
            Ok((StatusCode::OK, "duplicate"))
        }
        WebhookOutcome::Ignored(_) => Ok((StatusCode::OK, "ignored")),
    }
}
