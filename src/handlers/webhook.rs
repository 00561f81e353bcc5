use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha1::Sha1;

use crate::db::queries;
use crate::errors::AppError;
use crate::handlers::bookings::load_booking;
use crate::models::BookingStatus;
use crate::services::lifecycle::{self, BookingEvent};
use crate::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub booking_id: String,
}

/// base64(HMAC-SHA1(secret, body)).
pub fn sign_payload(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = Hmac::<Sha1>::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
}

fn verify_signature(secret: &str, signature: &str, body: &[u8]) -> bool {
    let Ok(expected) = base64::engine::general_purpose::STANDARD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = Hmac::<Sha1>::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

// POST /webhook/payment
pub async fn payment_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    // Verification is skipped when no secret is configured (dev mode)
    let secret = &state.config.webhook_secret;
    if !secret.is_empty() {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if !verify_signature(secret, signature, &body) {
            tracing::warn!("invalid payment webhook signature");
            return Err(AppError::Unauthorized);
        }
    }

    let event: PaymentEvent = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("invalid payload: {e}")))?;
    tracing::info!(event_type = %event.event_type, booking_id = %event.booking_id, "payment webhook received");

    let lifecycle_event = match event.event_type.as_str() {
        "payment.succeeded" => BookingEvent::Confirm,
        "payment.refunded" => BookingEvent::Cancel {
            reason: Some("payment refunded".to_string()),
        },
        other => {
            tracing::debug!(event_type = other, "ignoring payment event");
            return Ok(Json(serde_json::json!({ "received": true, "applied": false })));
        }
    };

    let db = state.db()?;
    let current = load_booking(&db, &event.booking_id)?;

    let already_applied = match lifecycle_event {
        BookingEvent::Confirm => current.status != BookingStatus::Pending,
        _ => current.status == BookingStatus::Cancelled,
    };
    if already_applied {
        return Ok(Json(serde_json::json!({
            "received": true,
            "applied": false,
            "status": current.status,
        })));
    }

    let updated = lifecycle::transition(&current, lifecycle_event, state.clock.now())?;
    queries::update_booking_status(&db, &updated)?;
    Ok(Json(serde_json::json!({
        "received": true,
        "applied": true,
        "status": updated.status,
    })))
}
